//! Structured resume and job requirement values

use crate::error::{Result, ResumeMatchError};
use crate::processing::skills::normalize_skill;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub degree: Option<String>,
    pub institution: Option<String>,
}

/// Fields extracted from one resume.
///
/// `skills` holds lower-cased canonical names (the set type keeps them
/// deduplicated and ordered). `experience_years` is `None` when the text
/// carries no usable signal; it is never defaulted to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResume {
    pub full_text: String,
    pub contact: ContactInfo,
    pub skills: BTreeSet<String>,
    pub experience_years: Option<f32>,
    /// Document order, not chronological
    pub education: Vec<EducationEntry>,
    pub experience_highlights: Vec<String>,
}

impl ParsedResume {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.full_text.is_empty()
    }

    /// Replace the skill set, normalising entries
    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.skills = normalize_skill_set(skills);
        self
    }

    pub fn with_experience_years(mut self, years: Option<f32>) -> Result<Self> {
        self.experience_years = validate_years("experience_years", years)?;
        Ok(self)
    }
}

/// What a job asks for: free text plus an optional structured overlay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequirement {
    pub description_text: String,
    pub required_skills: BTreeSet<String>,
    pub min_experience_years: Option<f32>,
}

impl JobRequirement {
    pub fn new(description_text: impl Into<String>) -> Self {
        Self {
            description_text: description_text.into(),
            ..Self::default()
        }
    }

    /// Union `skills` into the required set
    pub fn with_required_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.required_skills.extend(normalize_skill_set(skills));
        self
    }

    pub fn with_min_experience_years(mut self, years: Option<f32>) -> Result<Self> {
        self.min_experience_years = validate_years("min_experience_years", years)?;
        Ok(self)
    }
}

fn normalize_skill_set<I, S>(skills: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    skills
        .into_iter()
        .map(|s| normalize_skill(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect()
}

fn validate_years(field: &str, years: Option<f32>) -> Result<Option<f32>> {
    match years {
        Some(y) if !y.is_finite() || y < 0.0 => Err(ResumeMatchError::InvalidInput(format!(
            "{} must be a non-negative number, got {}",
            field, y
        ))),
        other => Ok(other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionType {
    Skills,
    Experience,
    Education,
    Summary,
    Projects,
    Certifications,
}

impl SectionType {
    /// Classify a line as a section heading such as `Work Experience` or
    /// `Skills: Rust, Go`.
    pub fn from_heading(line: &str) -> Option<Self> {
        const HEADINGS: &[(SectionType, &[&str])] = &[
            (SectionType::Skills, &["skills", "technical skills", "core competencies", "expertise"]),
            (
                SectionType::Experience,
                &[
                    "experience",
                    "work experience",
                    "professional experience",
                    "employment",
                    "employment history",
                    "work history",
                    "career history",
                ],
            ),
            (SectionType::Education, &["education", "academic background", "qualifications"]),
            (SectionType::Summary, &["summary", "profile", "objective", "about me", "overview"]),
            (SectionType::Projects, &["projects", "notable projects", "portfolio"]),
            (SectionType::Certifications, &["certifications", "certificates", "licenses"]),
        ];

        let lower = line.trim().to_lowercase();
        let head = match lower.split_once(':') {
            Some((head, _)) => head.trim(),
            None => lower.as_str(),
        };

        HEADINGS
            .iter()
            .find(|(_, names)| names.contains(&head))
            .map(|(section, _)| *section)
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionType::Skills => write!(f, "Skills"),
            SectionType::Experience => write!(f, "Experience"),
            SectionType::Education => write!(f, "Education"),
            SectionType::Summary => write!(f, "Summary"),
            SectionType::Projects => write!(f, "Projects"),
            SectionType::Certifications => write!(f, "Certifications"),
        }
    }
}
