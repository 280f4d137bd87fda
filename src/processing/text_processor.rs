//! Text normalisation and tokenisation

use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

const FORM_FEED: char = '\u{000C}';

pub struct TextProcessor {
    stop_words: HashSet<&'static str>,
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextProcessor {
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Normalise extracted document text.
    ///
    /// Runs of horizontal whitespace become one space, lines are trimmed,
    /// blank lines and page breaks collapse to a single `\n`, and all other
    /// control characters are dropped.
    pub fn normalize(&self, text: &str) -> String {
        let unified = Self::normalize_unicode(text);

        let mut lines: Vec<String> = Vec::new();
        for raw_line in unified.split(|c| c == '\n' || c == '\r' || c == FORM_FEED) {
            let line = Self::collapse_line(raw_line);
            if !line.is_empty() {
                lines.push(line);
            }
        }

        lines.join("\n")
    }

    fn collapse_line(line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut pending_space = false;

        for c in line.chars() {
            if c.is_whitespace() {
                pending_space = true;
            } else if c.is_control() {
                continue;
            } else {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }

        out
    }

    fn normalize_unicode(text: &str) -> String {
        text.chars()
            .map(|c| match c {
                '\u{2018}' | '\u{2019}' => '\'',
                '\u{201C}' | '\u{201D}' => '"',
                '\u{2013}' | '\u{2014}' => '-',
                '\u{00A0}' => ' ',
                '\u{2028}' | '\u{2029}' => '\n',
                _ => c,
            })
            .collect()
    }

    /// Lower-cased word tokens in document order, stop words removed
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .map(|w| w.to_lowercase())
            .filter(|w| !self.stop_words.contains(w.as_str()))
            .collect()
    }

    /// Non-empty trimmed lines of already normalised text
    pub fn lines<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "did", "do", "does", "for",
    "from", "had", "has", "have", "he", "i", "in", "is", "it", "its", "of", "on", "or", "she",
    "that", "the", "their", "them", "these", "they", "this", "those", "to", "was", "we", "were",
    "which", "will", "with", "would", "you", "your",
];
