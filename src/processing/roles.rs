//! Role catalog and skill-based role recommendations

use crate::error::{Result, ResumeMatchError};
use crate::processing::skills::{SkillCategory, SkillVocabulary};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;

/// Share of a role's skills a resume must cover before the role is suggested
const MIN_ROLE_MATCH: f32 = 0.2;
const MAX_RECOMMENDATIONS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleProfile {
    pub title: String,
    pub skills: BTreeSet<String>,
    /// How much each skill category counts towards the role
    pub category_weights: Vec<(SkillCategory, f32)>,
    pub salary_range: Option<String>,
    pub growth: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecommendation {
    pub title: String,
    /// Fraction of the role's skills found in the resume
    pub match_score: f32,
    /// Summed weight of the role's categories the resume has any skill in
    pub category_fit: f32,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub salary_range: Option<String>,
    pub growth: Option<String>,
}

pub struct RoleCatalog {
    roles: Vec<RoleProfile>,
}

impl RoleCatalog {
    pub fn new(roles: Vec<RoleProfile>) -> Self {
        Self { roles }
    }

    pub fn builtin(vocabulary: &SkillVocabulary) -> Result<Self> {
        Self::parse(BUILTIN_ROLES, vocabulary)
    }

    /// Load from `source` when given, otherwise the built-in catalog
    pub fn from_source(source: Option<&Path>, vocabulary: &SkillVocabulary) -> Result<Self> {
        match source {
            Some(path) => Self::from_file(path, vocabulary),
            None => Self::builtin(vocabulary),
        }
    }

    pub fn from_file(path: &Path, vocabulary: &SkillVocabulary) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ResumeMatchError::Configuration(format!(
                "Failed to read role catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        let catalog = Self::parse(&content, vocabulary)?;
        info!("Loaded {} roles from '{}'", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Parse `[Role Title]` sections holding `skills:`, `weights:`,
    /// `salary:` and `growth:` lines. Skills are stored canonicalized.
    pub fn parse(content: &str, vocabulary: &SkillVocabulary) -> Result<Self> {
        let mut roles: Vec<RoleProfile> = Vec::new();

        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(title) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let title = title.trim();
                if title.is_empty() {
                    return Err(ResumeMatchError::Configuration(format!(
                        "Empty role title on line {}",
                        line_no + 1
                    )));
                }
                roles.push(RoleProfile {
                    title: title.to_string(),
                    skills: BTreeSet::new(),
                    category_weights: Vec::new(),
                    salary_range: None,
                    growth: None,
                });
                continue;
            }

            let role = roles.last_mut().ok_or_else(|| {
                ResumeMatchError::Configuration(format!(
                    "Role catalog line {} appears before any [role] header",
                    line_no + 1
                ))
            })?;
            let (key, value) = line.split_once(':').ok_or_else(|| {
                ResumeMatchError::Configuration(format!(
                    "Expected 'key: value' on role catalog line {}",
                    line_no + 1
                ))
            })?;
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "skills" => role.skills = vocabulary.canonicalize_all(value.split(',')),
                "weights" => role.category_weights = parse_weights(value, line_no + 1)?,
                "salary" => role.salary_range = Some(value.to_string()),
                "growth" => role.growth = Some(value.to_string()),
                other => warn!("Ignoring unknown role key '{}' on line {}", other, line_no + 1),
            }
        }

        if let Some(role) = roles.iter().find(|r| r.skills.is_empty()) {
            return Err(ResumeMatchError::Configuration(format!(
                "Role '{}' lists no skills",
                role.title
            )));
        }

        Ok(Self::new(roles))
    }

    pub fn roles(&self) -> &[RoleProfile] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Roles covering more than a fifth of their skills with `resume_skills`,
    /// best first: match score, then category fit, then title.
    ///
    /// `resume_skills` must already be canonical.
    pub fn recommend(
        &self,
        resume_skills: &BTreeSet<String>,
        vocabulary: &SkillVocabulary,
    ) -> Vec<RoleRecommendation> {
        if resume_skills.is_empty() {
            return Vec::new();
        }

        let present = vocabulary.categorize(resume_skills);

        let mut recommendations: Vec<RoleRecommendation> = self
            .roles
            .iter()
            .filter_map(|role| {
                let (matched_skills, missing_skills): (Vec<String>, Vec<String>) = role
                    .skills
                    .iter()
                    .cloned()
                    .partition(|skill| resume_skills.contains(skill));

                let match_score = matched_skills.len() as f32 / role.skills.len() as f32;
                if match_score <= MIN_ROLE_MATCH {
                    return None;
                }

                let category_fit: f32 = role
                    .category_weights
                    .iter()
                    .filter(|(category, _)| present.contains_key(category))
                    .map(|(_, weight)| weight)
                    .sum();

                Some(RoleRecommendation {
                    title: role.title.clone(),
                    match_score,
                    category_fit,
                    matched_skills,
                    missing_skills,
                    salary_range: role.salary_range.clone(),
                    growth: role.growth.clone(),
                })
            })
            .collect();

        recommendations.sort_by(compare_recommendations);
        recommendations.truncate(MAX_RECOMMENDATIONS);
        recommendations
    }
}

fn compare_recommendations(a: &RoleRecommendation, b: &RoleRecommendation) -> Ordering {
    b.match_score
        .total_cmp(&a.match_score)
        .then_with(|| b.category_fit.total_cmp(&a.category_fit))
        .then_with(|| a.title.cmp(&b.title))
}

/// `programming=0.4, frameworks=0.3`
fn parse_weights(value: &str, line_no: usize) -> Result<Vec<(SkillCategory, f32)>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let parsed = part.split_once('=').and_then(|(name, weight)| {
                let category = SkillCategory::from_header(name)?;
                let weight: f32 = weight.trim().parse().ok()?;
                (weight.is_finite() && weight >= 0.0).then_some((category, weight))
            });
            parsed.ok_or_else(|| {
                ResumeMatchError::Configuration(format!(
                    "Invalid category weight '{}' on role catalog line {}",
                    part, line_no
                ))
            })
        })
        .collect()
}

const BUILTIN_ROLES: &str = r#"
[Software Developer]
skills: javascript, python, java, react, node.js, sql
weights: programming=0.4, frameworks=0.3, databases=0.2, soft=0.1
salary: $70,000 - $120,000
growth: High

[Data Scientist]
skills: python, machine learning, sql, pandas, numpy, analytics
weights: data=0.5, programming=0.3, databases=0.1, soft=0.1
salary: $80,000 - $140,000
growth: Very High

[DevOps Engineer]
skills: aws, docker, kubernetes, ci/cd, jenkins, terraform
weights: cloud=0.5, programming=0.2, frameworks=0.2, soft=0.1
salary: $85,000 - $130,000
growth: High

[Frontend Developer]
skills: react, javascript, html, css, typescript, vue
weights: frameworks=0.4, programming=0.4, soft=0.2
salary: $65,000 - $110,000
growth: High

[Backend Developer]
skills: node.js, python, java, sql, mongodb, express
weights: programming=0.4, frameworks=0.3, databases=0.2, soft=0.1
salary: $70,000 - $115,000
growth: High

[Product Manager]
skills: project management, agile, scrum, leadership, analytics
weights: soft=0.6, data=0.2, frameworks=0.1, programming=0.1
salary: $90,000 - $150,000
growth: High

[UI/UX Designer]
skills: design, figma, adobe, user experience, prototyping
weights: other=0.4, soft=0.3, frameworks=0.2, programming=0.1
salary: $60,000 - $100,000
growth: Medium

[Machine Learning Engineer]
skills: python, tensorflow, pytorch, machine learning, ai, data science
weights: data=0.6, programming=0.3, cloud=0.1
salary: $95,000 - $160,000
growth: Very High

[Full Stack Developer]
skills: javascript, react, node.js, sql, python, html, css
weights: programming=0.3, frameworks=0.3, databases=0.2, soft=0.2
salary: $75,000 - $125,000
growth: High

[Cloud Architect]
skills: aws, azure, kubernetes, terraform, microservices, devops
weights: cloud=0.6, programming=0.2, soft=0.2
salary: $110,000 - $180,000
growth: Very High
"#;
