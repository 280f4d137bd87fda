//! Resume/job match scoring

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::processing::document::{JobRequirement, ParsedResume};
use crate::processing::embeddings::{EmbeddingEngine, EmbeddingVector};
use crate::processing::skills::normalize_skill;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const SKILL_OVERLAP: &str = "skill_overlap";
pub const SEMANTIC_SIMILARITY: &str = "semantic_similarity";
pub const EXPERIENCE_MATCH: &str = "experience_match";

/// Weight vector for the three sub-scores. Always sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub skill_overlap: f32,
    pub semantic_similarity: f32,
    pub experience_match: f32,
}

impl ScoringWeights {
    pub fn new(skill_overlap: f32, semantic_similarity: f32, experience_match: f32) -> Result<Self> {
        Self::from_config(&ScoringConfig {
            skill_weight: skill_overlap,
            semantic_weight: semantic_similarity,
            experience_weight: experience_match,
        })
    }

    pub fn from_config(config: &ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            skill_overlap: config.skill_weight,
            semantic_similarity: config.semantic_weight,
            experience_match: config.experience_weight,
        })
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        let config = ScoringConfig::default();
        Self {
            skill_overlap: config.skill_weight,
            semantic_similarity: config.semantic_weight,
            experience_match: config.experience_weight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub skill_overlap: f32,
    pub semantic_similarity: f32,
    pub experience_match: f32,
}

impl ScoreBreakdown {
    /// Sub-scores keyed by name
    pub fn as_map(&self) -> BTreeMap<&'static str, f32> {
        BTreeMap::from([
            (SKILL_OVERLAP, self.skill_overlap),
            (SEMANTIC_SIMILARITY, self.semantic_similarity),
            (EXPERIENCE_MATCH, self.experience_match),
        ])
    }

    /// Weighted sum, clamped to [0, 1]
    pub fn combine(&self, weights: &ScoringWeights) -> f32 {
        let total = self.skill_overlap * weights.skill_overlap
            + self.semantic_similarity * weights.semantic_similarity
            + self.experience_match * weights.experience_match;
        total.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchQuality::Excellent => write!(f, "Excellent"),
            MatchQuality::Good => write!(f, "Good"),
            MatchQuality::Fair => write!(f, "Fair"),
            MatchQuality::Poor => write!(f, "Poor"),
        }
    }
}

/// Result of scoring one resume against one job.
///
/// `score` is recomputable from `breakdown` and `weights` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub score: f32,
    pub breakdown: ScoreBreakdown,
    pub weights: ScoringWeights,
    /// Required skills the resume has, sorted
    pub matched_skills: Vec<String>,
    /// Required skills the resume lacks, sorted
    pub missing_skills: Vec<String>,
    pub model_version: String,
}

impl MatchScore {
    pub fn quality(&self) -> MatchQuality {
        if self.score > 0.8 {
            MatchQuality::Excellent
        } else if self.score > 0.6 {
            MatchQuality::Good
        } else if self.score > 0.4 {
            MatchQuality::Fair
        } else {
            MatchQuality::Poor
        }
    }
}

/// Required skills split into (present, missing), compared after
/// normalisation so `Python` from a stored job matches `python`
pub fn partition_skills(
    resume_skills: &BTreeSet<String>,
    required_skills: &BTreeSet<String>,
) -> (Vec<String>, Vec<String>) {
    let have: BTreeSet<String> = resume_skills.iter().map(|s| normalize_skill(s)).collect();
    required_skills
        .iter()
        .map(|s| normalize_skill(s))
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .partition(|skill| have.contains(skill))
}

/// Fraction of required skills present; 1.0 when nothing is required
pub fn skill_overlap(resume_skills: &BTreeSet<String>, required_skills: &BTreeSet<String>) -> f32 {
    let (matched, missing) = partition_skills(resume_skills, required_skills);
    overlap_ratio(&matched, &missing)
}

fn overlap_ratio(matched: &[String], missing: &[String]) -> f32 {
    let required = matched.len() + missing.len();
    if required == 0 {
        return 1.0;
    }
    matched.len() as f32 / required as f32
}

/// Cosine similarity rescaled from [-1, 1] to [0, 1]
pub fn semantic_similarity(resume: &EmbeddingVector, job: &EmbeddingVector) -> Result<f32> {
    let cosine = resume.cosine_similarity(job)?;
    Ok(((cosine + 1.0) / 2.0).clamp(0.0, 1.0))
}

/// Missing data on either side gets the benefit of the doubt
pub fn experience_match(resume_years: Option<f32>, min_years: Option<f32>) -> f32 {
    match (resume_years, min_years) {
        (Some(years), Some(min)) if min > 0.0 => (years / min).clamp(0.0, 1.0),
        _ => 1.0,
    }
}

/// Combines skill, semantic and experience signals into a [`MatchScore`]
#[derive(Clone)]
pub struct ScoringEngine {
    embeddings: EmbeddingEngine,
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(embeddings: EmbeddingEngine, weights: ScoringWeights) -> Self {
        Self { embeddings, weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn embeddings(&self) -> &EmbeddingEngine {
        &self.embeddings
    }

    pub fn score(&self, resume: &ParsedResume, job: &JobRequirement) -> Result<MatchScore> {
        let resume_vector = self.embeddings.embed(&resume.full_text);
        let job_vector = self.embeddings.embed(&job.description_text);
        self.score_with_embeddings(resume, &resume_vector, job, &job_vector)
    }

    /// Score with vectors computed earlier, e.g. cached per document.
    ///
    /// Fails with `IncompatibleEmbeddings` before any combination when the
    /// vectors come from different model versions.
    pub fn score_with_embeddings(
        &self,
        resume: &ParsedResume,
        resume_vector: &EmbeddingVector,
        job: &JobRequirement,
        job_vector: &EmbeddingVector,
    ) -> Result<MatchScore> {
        let semantic = semantic_similarity(resume_vector, job_vector)?;
        let (matched_skills, missing_skills) = partition_skills(&resume.skills, &job.required_skills);

        let breakdown = ScoreBreakdown {
            skill_overlap: overlap_ratio(&matched_skills, &missing_skills),
            semantic_similarity: semantic,
            experience_match: experience_match(resume.experience_years, job.min_experience_years),
        };

        Ok(MatchScore {
            score: breakdown.combine(&self.weights),
            breakdown,
            weights: self.weights,
            matched_skills,
            missing_skills,
            model_version: resume_vector.model_version.clone(),
        })
    }
}
