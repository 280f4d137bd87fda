//! Rule-based extraction of structured resume fields.
//!
//! Each rule is an independent method over normalised text so it can be
//! tested on its own; [`FieldExtractor::extract_fields`] runs them all.

use crate::error::{Result, ResumeMatchError};
use crate::processing::document::{
    ContactInfo, EducationEntry, JobRequirement, ParsedResume, SectionType,
};
use crate::processing::skills::SkillVocabulary;
use crate::processing::text_processor::TextProcessor;
use log::debug;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

const NAME_SCAN_LINES: usize = 5;
const MAX_NAME_WORDS: usize = 4;
const MAX_HIGHLIGHTS: usize = 3;
const MIN_HIGHLIGHT_CHARS: usize = 10;
const MAX_PLAUSIBLE_YEARS: f32 = 60.0;

const NAME_STOP_KEYWORDS: &[&str] = &[
    "experience",
    "education",
    "skills",
    "objective",
    "summary",
    "curriculum",
    "vitae",
    "resume",
    "résumé",
];

pub struct FieldExtractor {
    vocabulary: Arc<SkillVocabulary>,
    processor: TextProcessor,
    email_regex: Regex,
    phone_regex: Regex,
    years_before_keyword: Regex,
    years_after_keyword: Regex,
    job_min_years: Regex,
    degree_regex: Regex,
    institution_regex: Regex,
    segment_separator: Regex,
}

impl FieldExtractor {
    pub fn new(vocabulary: Arc<SkillVocabulary>) -> Result<Self> {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                ResumeMatchError::Configuration(format!("Invalid extraction pattern '{}': {}", pattern, e))
            })
        };

        Ok(Self {
            vocabulary,
            processor: TextProcessor::new(),
            email_regex: build(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")?,
            phone_regex: build(r"(?:\+\d{1,3}[-. ]?)?(?:\(\d{3}\)|\d{3})[-. ]?\d{3}[-. ]?\d{4}")?,
            years_before_keyword: build(
                r"(?i)\b(\d{1,2}(?:\.\d+)?)\s*\+?\s*(?:years?|yrs?)\b(?:\s+(?:of|in))?(?:\s+[a-z][a-z.+#/-]*){0,3}?\s+(?:experience|exp)\b",
            )?,
            years_after_keyword: build(
                r"(?i)\b(?:experience|exp)\s*(?:of|:|-)?\s*\b(\d{1,2}(?:\.\d+)?)\s*\+?\s*(?:years?|yrs?)\b",
            )?,
            job_min_years: build(
                r"(?i)\b(\d{1,2}(?:\.\d+)?)\s*\+?\s*years?\s*(?:of\s*)?experience|minimum\s*(?:of\s*)?\b(\d{1,2}(?:\.\d+)?)\s*\+?\s*years?|at\s*least\s*\b(\d{1,2}(?:\.\d+)?)\s*\+?\s*years?",
            )?,
            degree_regex: build(
                r"(?i)\b(?:bachelor(?:'?s)?|master(?:'?s)?|ph\.?\s?d|doctorate|mba|b\.?sc|m\.?sc|b\.?tech|m\.?tech|b\.?eng|m\.?eng|diploma|degree)\b|\b[bm]\.[sa]\.",
            )?,
            institution_regex: build(
                r"(?i)\b(?:university|college|institute|school|academy|polytechnic)\b",
            )?,
            segment_separator: build(r"\s*(?:[,|;]|\s-\s|\s+at\s+)\s*")?,
        })
    }

    pub fn vocabulary(&self) -> &SkillVocabulary {
        &self.vocabulary
    }

    /// Run every extraction rule over `text`.
    ///
    /// Never fails: ambiguous or empty input degrades to empty fields.
    pub fn extract_fields(&self, text: &str) -> ParsedResume {
        let full_text = self.processor.normalize(text);
        if full_text.is_empty() {
            return ParsedResume::empty();
        }

        let contact = ContactInfo {
            name: self.extract_name(&full_text),
            email: self.extract_email(&full_text),
            phone: self.extract_phone(&full_text),
        };
        let skills = self.extract_skills(&full_text);
        let experience_years = self.extract_experience_years(&full_text);
        let education = self.extract_education(&full_text);
        let experience_highlights = self.extract_experience_highlights(&full_text);

        debug!(
            "Extracted {} skills, {} education entries, experience_years={:?}",
            skills.len(),
            education.len(),
            experience_years
        );

        ParsedResume {
            full_text,
            contact,
            skills,
            experience_years,
            education,
            experience_highlights,
        }
    }

    /// Entry point for callers holding undecoded bytes
    pub fn extract_fields_from_bytes(&self, bytes: &[u8]) -> Result<ParsedResume> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            ResumeMatchError::InvalidInput(format!("resume text is not valid UTF-8: {}", e))
        })?;
        Ok(self.extract_fields(text))
    }

    pub fn extract_email(&self, text: &str) -> Option<String> {
        self.email_regex.find(text).map(|m| m.as_str().to_string())
    }

    /// First match not glued to surrounding digits
    pub fn extract_phone(&self, text: &str) -> Option<String> {
        self.phone_regex
            .find_iter(text)
            .find(|m| {
                let before = text[..m.start()].chars().next_back();
                let after = text[m.end()..].chars().next();
                !before.map(|c| c.is_ascii_digit()).unwrap_or(false)
                    && !after.map(|c| c.is_ascii_digit()).unwrap_or(false)
            })
            .map(|m| m.as_str().trim().to_string())
    }

    pub fn extract_name(&self, text: &str) -> Option<String> {
        self.processor
            .lines(text)
            .into_iter()
            .take(NAME_SCAN_LINES)
            .find(|line| is_name_like(line))
            .map(title_case)
    }

    pub fn extract_skills(&self, text: &str) -> BTreeSet<String> {
        self.vocabulary.find_skills(text)
    }

    /// Largest plausible "N years ... experience" figure, or `None`
    pub fn extract_experience_years(&self, text: &str) -> Option<f32> {
        let before = self.years_before_keyword.captures_iter(text);
        let after = self.years_after_keyword.captures_iter(text);

        before
            .chain(after)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<f32>().ok())
            .filter(|years| (0.0..=MAX_PLAUSIBLE_YEARS).contains(years))
            .fold(None, |best: Option<f32>, years| match best {
                Some(b) if b >= years => Some(b),
                _ => Some(years),
            })
    }

    /// Group degree lines with adjacent institution lines, in document order
    pub fn extract_education(&self, text: &str) -> Vec<EducationEntry> {
        let lines = self.processor.lines(text);
        let in_education = section_membership(&lines, SectionType::Education);
        let is_degree: Vec<bool> = lines.iter().map(|l| self.degree_regex.is_match(l)).collect();
        let is_institution: Vec<bool> = lines.iter().map(|l| self.institution_regex.is_match(l)).collect();
        let is_heading: Vec<bool> = lines.iter().map(|l| SectionType::from_heading(l).is_some()).collect();

        let mut used = vec![false; lines.len()];
        let mut entries = Vec::new();

        // a neighbouring line that names only an institution
        let institution_only =
            |idx: usize, used: &[bool]| !used[idx] && is_institution[idx] && !is_degree[idx] && !is_heading[idx];

        for i in 0..lines.len() {
            if used[i] || is_heading[i] {
                continue;
            }

            if is_degree[i] {
                used[i] = true;

                if is_institution[i] {
                    if let Some(entry) = self.split_degree_line(lines[i]) {
                        entries.push(entry);
                        continue;
                    }
                }

                let neighbour = [i + 1, i.wrapping_sub(1)]
                    .into_iter()
                    .find(|&j| j < lines.len() && institution_only(j, &used));
                if let Some(j) = neighbour {
                    used[j] = true;
                }

                entries.push(EducationEntry {
                    degree: Some(lines[i].to_string()),
                    institution: neighbour.map(|j| lines[j].to_string()),
                });
            } else if is_institution[i] && in_education[i] {
                used[i] = true;

                let next_is_degree = i + 1 < lines.len() && !used[i + 1] && is_degree[i + 1] && !is_institution[i + 1];
                let degree = if next_is_degree {
                    used[i + 1] = true;
                    Some(lines[i + 1].to_string())
                } else {
                    None
                };

                entries.push(EducationEntry {
                    degree,
                    institution: Some(lines[i].to_string()),
                });
            }
        }

        entries
    }

    /// `B.Sc. Computer Science, University of Toronto` -> degree + institution
    fn split_degree_line(&self, line: &str) -> Option<EducationEntry> {
        let segments: Vec<&str> = self
            .segment_separator
            .split(line)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() < 2 {
            return Some(EducationEntry {
                degree: Some(line.to_string()),
                institution: None,
            });
        }

        let inst_idx = segments.iter().position(|s| self.institution_regex.is_match(s))?;
        let degree: Vec<&str> = segments
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != inst_idx)
            .map(|(_, s)| *s)
            .collect();

        Some(EducationEntry {
            degree: Some(degree.join(", ")),
            institution: Some(segments[inst_idx].to_string()),
        })
    }

    /// Up to three substantive lines following the first experience heading
    pub fn extract_experience_highlights(&self, text: &str) -> Vec<String> {
        let lines = self.processor.lines(text);
        let Some(start) = lines
            .iter()
            .position(|l| SectionType::from_heading(l) == Some(SectionType::Experience))
        else {
            return Vec::new();
        };

        lines[start + 1..]
            .iter()
            .take_while(|l| SectionType::from_heading(l).is_none())
            .filter(|l| l.chars().count() > MIN_HIGHLIGHT_CHARS)
            .take(MAX_HIGHLIGHTS)
            .map(|l| l.to_string())
            .collect()
    }

    /// First "N+ years experience" / "minimum N years" / "at least N years"
    /// phrase in the description
    pub fn extract_min_experience_requirement(&self, text: &str) -> Option<f32> {
        let caps = self.job_min_years.captures(text)?;
        (1..=3)
            .filter_map(|g| caps.get(g))
            .next()
            .and_then(|m| m.as_str().parse::<f32>().ok())
            .filter(|years| (0.0..=MAX_PLAUSIBLE_YEARS).contains(years))
    }

    /// Derive a job requirement overlay from its free-text description
    pub fn derive_job_requirement(&self, description: &str) -> JobRequirement {
        let description_text = self.processor.normalize(description);
        let required_skills = self.extract_skills(&description_text);
        let min_experience_years = self.extract_min_experience_requirement(&description_text);

        JobRequirement {
            description_text,
            required_skills,
            min_experience_years,
        }
    }

    /// Copy of `job` with required skills mapped onto vocabulary names, so
    /// caller-supplied `ReactJS` or `Postgres` compare equal to what the
    /// extractor finds in resumes
    pub fn canonical_job(&self, job: &JobRequirement) -> JobRequirement {
        JobRequirement {
            required_skills: self.vocabulary.canonicalize_all(&job.required_skills),
            ..job.clone()
        }
    }

    pub fn canonical_resume(&self, resume: &ParsedResume) -> ParsedResume {
        ParsedResume {
            skills: self.vocabulary.canonicalize_all(&resume.skills),
            ..resume.clone()
        }
    }
}

fn is_name_like(line: &str) -> bool {
    let lower = line.to_lowercase();
    let words = line.split_whitespace().count();

    words > 0
        && words <= MAX_NAME_WORDS
        && line.chars().count() > 2
        && line.chars().any(char::is_alphabetic)
        && !line.contains('@')
        && !line.chars().any(|c| c.is_ascii_digit())
        && !NAME_STOP_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn title_case(line: &str) -> String {
    line.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// For each line, whether it sits under a heading of `section`
fn section_membership(lines: &[&str], section: SectionType) -> Vec<bool> {
    let mut current = None;
    lines
        .iter()
        .map(|line| {
            if let Some(heading) = SectionType::from_heading(line) {
                current = Some(heading);
                false
            } else {
                current == Some(section)
            }
        })
        .collect()
}

impl JobRequirement {
    /// Build a requirement from its description, deriving skills and the
    /// experience minimum with `extractor`'s vocabulary and rules.
    pub fn from_description(description: &str, extractor: &FieldExtractor) -> Self {
        extractor.derive_job_requirement(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(Arc::new(SkillVocabulary::builtin().unwrap())).unwrap()
    }

    #[test]
    fn test_contact_first_match_wins() {
        let ex = extractor();
        let text = "Jane Smith\njane.smith@example.com | (555) 123-4567\nbackup: js@other.org 555.987.6543";

        assert_eq!(ex.extract_email(text).as_deref(), Some("jane.smith@example.com"));
        assert_eq!(ex.extract_phone(text).as_deref(), Some("(555) 123-4567"));
    }

    #[test]
    fn test_phone_ignores_longer_digit_runs() {
        let ex = extractor();
        assert_eq!(ex.extract_phone("Order id 12345678901234"), None);
        assert_eq!(
            ex.extract_phone("Call +1 555-123-4567 anytime").as_deref(),
            Some("+1 555-123-4567")
        );
    }

    #[test]
    fn test_name_heuristic() {
        let ex = extractor();
        assert_eq!(
            ex.extract_name("JANE SMITH\nSenior Engineer\njane@example.com").as_deref(),
            Some("Jane Smith")
        );
        assert_eq!(ex.extract_name("Skills\n555 123 4567\njane@example.com"), None);
    }

    #[test]
    fn test_experience_takes_maximum() {
        let ex = extractor();
        let text = "3 years of experience with Python\nExperience: 7 years in backend systems\n2 yrs experience in Go";
        assert_eq!(ex.extract_experience_years(text), Some(7.0));
    }

    #[test]
    fn test_experience_absent_is_none() {
        let ex = extractor();
        assert_eq!(ex.extract_experience_years("Worked at Acme since 2019"), None);
        assert_eq!(ex.extract_experience_years(""), None);
    }

    #[test]
    fn test_experience_implausible_values_ignored() {
        let ex = extractor();
        assert_eq!(ex.extract_experience_years("99 years of experience"), None);
        assert_eq!(
            ex.extract_experience_years("5.5 years of professional experience"),
            Some(5.5)
        );
    }

    #[test]
    fn test_education_grouping() {
        let ex = extractor();
        let text = "Education\nMassachusetts Institute of Technology\nBachelor of Science in Computer Science\nM.Sc. Data Science, University of Toronto\nPhD in Physics\nStanford University\nExperience\nAcme Corp";

        let entries = ex.extract_education(text);
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            EducationEntry {
                degree: Some("Bachelor of Science in Computer Science".to_string()),
                institution: Some("Massachusetts Institute of Technology".to_string()),
            }
        );
        assert_eq!(
            entries[1],
            EducationEntry {
                degree: Some("M.Sc. Data Science".to_string()),
                institution: Some("University of Toronto".to_string()),
            }
        );
        assert_eq!(entries[2].degree.as_deref(), Some("PhD in Physics"));
        assert_eq!(entries[2].institution.as_deref(), Some("Stanford University"));
    }

    #[test]
    fn test_institution_outside_education_section_ignored() {
        let ex = extractor();
        let text = "Experience\nPartnered with the University of Leeds on research";
        assert!(ex.extract_education(text).is_empty());
    }

    #[test]
    fn test_experience_highlights() {
        let ex = extractor();
        let text = "Work Experience\nSenior Engineer, Acme (2019-2024)\nshort\nLed migration of billing to Rust\nBuilt the data platform\nMentored four engineers\nEducation\nBSc";

        let highlights = ex.extract_experience_highlights(text);
        assert_eq!(
            highlights,
            vec![
                "Senior Engineer, Acme (2019-2024)".to_string(),
                "Led migration of billing to Rust".to_string(),
                "Built the data platform".to_string(),
            ]
        );
    }

    #[test]
    fn test_job_requirement_derivation() {
        let ex = extractor();
        let job = ex.derive_job_requirement(
            "We are hiring a backend engineer.\nRequirements: at least 4 years with Python and PostgreSQL; Docker a plus. 6+ years experience preferred.",
        );

        assert_eq!(job.min_experience_years, Some(4.0));
        for skill in ["python", "postgresql", "docker"] {
            assert!(job.required_skills.contains(skill));
        }
    }

    #[test]
    fn test_extract_fields_empty_text() {
        let ex = extractor();
        let parsed = ex.extract_fields("   \n ");
        assert_eq!(parsed, ParsedResume::empty());
        assert_eq!(parsed.experience_years, None);
    }

    #[test]
    fn test_invalid_utf8_is_invalid_input() {
        let ex = extractor();
        let err = ex.extract_fields_from_bytes(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ResumeMatchError::InvalidInput(_)));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let ex = extractor();
        let text = "Jane Smith\nSkills: Rust, Go, Kubernetes, SQL, Python\n8 years of experience";

        let first = serde_json::to_string(&ex.extract_fields(text)).unwrap();
        let second = serde_json::to_string(&ex.extract_fields(text)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_years_inside_longer_numbers_ignored() {
        let ex = extractor();
        assert_eq!(ex.extract_experience_years("Our firm brings 100 years of experience"), None);
        assert_eq!(ex.extract_experience_years("150 years of experience"), None);
        assert_eq!(ex.extract_experience_years("2019 years experience"), None);
        assert_eq!(ex.extract_experience_years("Experience: 120 years"), None);
        assert_eq!(ex.extract_min_experience_requirement("Requires 2015 years of experience"), None);
        assert_eq!(ex.extract_min_experience_requirement("Minimum 105 years"), None);

        assert_eq!(ex.extract_experience_years("12 years of experience"), Some(12.0));
        assert_eq!(ex.extract_min_experience_requirement("at least 10 years"), Some(10.0));
    }

    #[test]
    fn test_document_title_is_not_a_name() {
        let ex = extractor();
        assert_eq!(
            ex.extract_name("CURRICULUM VITAE\nMaria Garcia\nmaria@example.com").as_deref(),
            Some("Maria Garcia")
        );
        assert_eq!(ex.extract_name("Resume\nTom Lee").as_deref(), Some("Tom Lee"));
    }

    #[test]
    fn test_canonical_job_and_resume() {
        let ex = extractor();
        let job = JobRequirement::new("Full stack role")
            .with_required_skills(["ReactJS", "k8s", "golang", "postgres"]);
        let job = ex.canonical_job(&job);
        let skills: Vec<&str> = job.required_skills.iter().map(String::as_str).collect();
        assert_eq!(skills, vec!["go", "kubernetes", "postgresql", "react"]);
        assert_eq!(job.description_text, "Full stack role");

        let stored: ParsedResume =
            serde_json::from_str(r#"{"full_text":"x","contact":{"name":null,"email":null,"phone":null},"skills":["Python","JS"],"experience_years":null,"education":[],"experience_highlights":[]}"#)
                .unwrap();
        let resume = ex.canonical_resume(&stored);
        assert!(resume.skills.contains("python"));
        assert!(resume.skills.contains("javascript"));
    }
}
