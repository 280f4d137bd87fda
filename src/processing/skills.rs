//! Skill vocabulary and word-boundary-aware skill matching

use crate::error::{Result, ResumeMatchError};
use aho_corasick::{AhoCorasick, MatchKind};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillCategory {
    Programming,
    Frameworks,
    Databases,
    Cloud,
    Data,
    Soft,
    Other,
}

impl SkillCategory {
    pub(crate) fn from_header(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "programming" => Some(SkillCategory::Programming),
            "frameworks" => Some(SkillCategory::Frameworks),
            "databases" => Some(SkillCategory::Databases),
            "cloud" => Some(SkillCategory::Cloud),
            "data" => Some(SkillCategory::Data),
            "soft" => Some(SkillCategory::Soft),
            "other" => Some(SkillCategory::Other),
            _ => None,
        }
    }
}

impl fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SkillCategory::Programming => "programming",
            SkillCategory::Frameworks => "frameworks",
            SkillCategory::Databases => "databases",
            SkillCategory::Cloud => "cloud",
            SkillCategory::Data => "data",
            SkillCategory::Soft => "soft",
            SkillCategory::Other => "other",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillEntry {
    pub canonical: String,
    pub aliases: Vec<String>,
    pub category: SkillCategory,
}

/// Reference list of recognised skills, compiled into a single
/// case-insensitive matcher over canonical names and aliases.
pub struct SkillVocabulary {
    entries: Vec<SkillEntry>,
    matcher: AhoCorasick,
    /// pattern index -> entry index
    pattern_owner: Vec<usize>,
    patterns: Vec<String>,
}

impl SkillVocabulary {
    pub fn new(entries: Vec<SkillEntry>) -> Result<Self> {
        let mut merged: Vec<SkillEntry> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for entry in entries {
            let canonical = normalize_skill(&entry.canonical);
            if canonical.is_empty() {
                continue;
            }
            let idx = *by_name.entry(canonical.clone()).or_insert_with(|| {
                merged.push(SkillEntry {
                    canonical: canonical.clone(),
                    aliases: Vec::new(),
                    category: entry.category,
                });
                merged.len() - 1
            });
            for alias in entry.aliases {
                let alias = normalize_skill(&alias);
                if !alias.is_empty() && alias != canonical && !merged[idx].aliases.contains(&alias) {
                    merged[idx].aliases.push(alias);
                }
            }
        }

        let mut patterns = Vec::new();
        let mut pattern_owner = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (idx, entry) in merged.iter().enumerate() {
            for pattern in std::iter::once(&entry.canonical).chain(entry.aliases.iter()) {
                match seen.get(pattern) {
                    Some(&owner) if owner != idx => warn!(
                        "Skill pattern '{}' already maps to '{}'; ignoring mapping to '{}'",
                        pattern, merged[owner].canonical, entry.canonical
                    ),
                    Some(_) => {}
                    None => {
                        seen.insert(pattern.clone(), idx);
                        patterns.push(pattern.clone());
                        pattern_owner.push(idx);
                    }
                }
            }
        }

        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns)
            .map_err(|e| ResumeMatchError::Configuration(format!("Failed to build skill matcher: {}", e)))?;

        Ok(Self {
            entries: merged,
            matcher,
            pattern_owner,
            patterns,
        })
    }

    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_VOCABULARY)
    }

    /// Load from `source` when given, otherwise the built-in list
    pub fn from_source(source: Option<&Path>) -> Result<Self> {
        match source {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ResumeMatchError::Configuration(format!(
                "Failed to read skill vocabulary '{}': {}",
                path.display(),
                e
            ))
        })?;
        let vocabulary = Self::parse(&content)?;
        info!(
            "Loaded {} skills from vocabulary '{}'",
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }

    /// Parse the line format: `[category]` headers, then `canonical` or
    /// `canonical: alias, alias` lines; lines starting with `#` are comments.
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut category = SkillCategory::Other;

        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                category = SkillCategory::from_header(header).unwrap_or_else(|| {
                    warn!("Unknown skill category '{}' on line {}; using 'other'", header, line_no + 1);
                    SkillCategory::Other
                });
                continue;
            }

            let (canonical, aliases) = match line.split_once(':') {
                Some((name, rest)) => (
                    name,
                    rest.split(',').map(str::to_string).collect::<Vec<_>>(),
                ),
                None => (line, Vec::new()),
            };

            if canonical.trim().is_empty() {
                warn!("Skipping vocabulary line {} with empty skill name", line_no + 1);
                continue;
            }

            entries.push(SkillEntry {
                canonical: canonical.to_string(),
                aliases,
                category,
            });
        }

        Self::new(entries)
    }

    /// Canonical skills mentioned in `text`, matched case-insensitively on
    /// word boundaries.
    pub fn find_skills(&self, text: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();

        for mat in self.matcher.find_iter(text) {
            let pattern = &self.patterns[mat.pattern().as_usize()];
            if is_word_bounded(text, mat.start(), mat.end(), pattern)
                && is_plausible_mention(text, mat.start(), mat.end(), pattern)
            {
                let owner = self.pattern_owner[mat.pattern().as_usize()];
                found.insert(self.entries[owner].canonical.clone());
            }
        }

        found
    }

    /// Map a free-form skill name onto its canonical form when known
    pub fn canonicalize(&self, skill: &str) -> String {
        let normalized = normalize_skill(skill);
        self.patterns
            .iter()
            .position(|p| *p == normalized)
            .map(|i| self.entries[self.pattern_owner[i]].canonical.clone())
            .unwrap_or(normalized)
    }

    /// Canonical forms of `skills`, dropping empty entries
    pub fn canonicalize_all<I, S>(&self, skills: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        skills
            .into_iter()
            .map(|s| self.canonicalize(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn category_of(&self, skill: &str) -> SkillCategory {
        let canonical = self.canonicalize(skill);
        self.entries
            .iter()
            .find(|e| e.canonical == canonical)
            .map(|e| e.category)
            .unwrap_or(SkillCategory::Other)
    }

    pub fn categorize<'a, I>(&self, skills: I) -> HashMap<SkillCategory, Vec<String>>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut grouped: HashMap<SkillCategory, Vec<String>> = HashMap::new();
        for skill in skills {
            grouped.entry(self.category_of(skill)).or_default().push(skill.clone());
        }
        grouped
    }

    pub fn entries(&self) -> &[SkillEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical form of a skill string: trimmed, lower-cased, inner
/// whitespace collapsed
pub fn normalize_skill(skill: &str) -> String {
    skill
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Skill names that double as everyday words or abbreviations. They only
/// count when written exactly like this, and never next to `&` (`R&D`).
const CASE_SENSITIVE_SKILLS: &[(&str, &str)] = &[("go", "Go"), ("r", "R")];

fn is_plausible_mention(text: &str, start: usize, end: usize, pattern: &str) -> bool {
    match CASE_SENSITIVE_SKILLS.iter().find(|(name, _)| *name == pattern) {
        Some((_, written)) => {
            &text[start..end] == *written
                && !text[end..].starts_with('&')
                && !text[..start].ends_with('&')
        }
        None => true,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_word_bounded(text: &str, start: usize, end: usize, pattern: &str) -> bool {
    let starts_with_word = pattern.chars().next().map(is_word_char).unwrap_or(false);
    let ends_with_word = pattern.chars().last().map(is_word_char).unwrap_or(false);

    let before_ok = !starts_with_word
        || text[..start].chars().next_back().map(|c| !is_word_char(c)).unwrap_or(true);
    let after_ok = !ends_with_word
        || text[end..].chars().next().map(|c| !is_word_char(c)).unwrap_or(true);

    before_ok && after_ok
}

const BUILTIN_VOCABULARY: &str = r#"
[programming]
python: python3
java
javascript: js, ecmascript
typescript
c++: cpp
c#: csharp
php
ruby
go: golang
rust
kotlin
swift
scala
r
matlab

[frameworks]
react: reactjs, react.js
angular: angularjs
vue: vuejs, vue.js
node.js: nodejs
express: expressjs, express.js
django
flask
spring: spring boot
laravel
rails: ruby on rails
next.js: nextjs
nuxt.js: nuxtjs
svelte
html: html5
css: css3
bootstrap
tailwind
react native
flutter

[databases]
sql
mysql
postgresql: postgres
mongodb
redis
elasticsearch
oracle
sqlite
cassandra
dynamodb
neo4j

[cloud]
aws: amazon web services
azure
gcp: google cloud
docker
kubernetes: k8s
terraform
ansible
jenkins
ci/cd
devops
microservices
linux
git
github
gitlab

[data]
machine learning
deep learning
data science
ai: artificial intelligence
analytics
tableau
powerbi: power bi
excel
pandas
numpy
scikit-learn: sklearn
tensorflow
pytorch
keras
nlp: natural language processing
computer vision
statistics

[soft]
leadership
communication
teamwork
problem solving
critical thinking
time management
project management
agile
scrum

[other]
figma
prototyping
user experience: ux
"#;
