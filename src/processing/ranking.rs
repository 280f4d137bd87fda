//! Deterministic ranking of scored candidates

use crate::error::{ErrorKind, ResumeMatchError};
use crate::processing::document::{JobRequirement, ParsedResume};
use crate::processing::scoring::{MatchScore, ScoringEngine};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub id: String,
    pub score: MatchScore,
}

/// An item left out of the ranking and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingFailure {
    pub id: String,
    pub kind: ErrorKind,
    pub reason: String,
}

impl RankingFailure {
    pub fn new(id: impl Into<String>, error: &ResumeMatchError) -> Self {
        Self {
            id: id.into(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Entries sorted by score descending, ties by ascending id; failures by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub entries: Vec<RankedEntry>,
    pub failures: Vec<RankingFailure>,
}

impl RankedResult {
    /// Build from unordered scores and failures, applying the ranking order
    pub fn from_parts(mut entries: Vec<RankedEntry>, mut failures: Vec<RankingFailure>) -> Self {
        entries.sort_by(compare_entries);
        failures.sort_by(|a, b| a.id.cmp(&b.id));
        Self { entries, failures }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.failures.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }
}

fn compare_entries(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.score
        .score
        .total_cmp(&a.score.score)
        .then_with(|| a.id.cmp(&b.id))
}

/// Scores one side against many and orders the results.
///
/// Embeds inline on the calling thread with no deadline. Async callers go
/// through `ResumeAnalyzer::rank_resumes` / `recommend_jobs`, which bound
/// each inference and report items that miss it.
pub struct RankingAggregator {
    scoring: ScoringEngine,
}

impl RankingAggregator {
    pub fn new(scoring: ScoringEngine) -> Self {
        Self { scoring }
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    /// Rank resumes for one job
    pub fn rank(&self, job: &JobRequirement, resumes: &[(String, ParsedResume)]) -> RankedResult {
        let embeddings = self.scoring.embeddings();
        let job_vector = embeddings.embed(&job.description_text);

        let mut entries = Vec::with_capacity(resumes.len());
        let mut failures = Vec::new();
        for (id, resume) in resumes {
            let resume_vector = embeddings.embed(&resume.full_text);
            match self
                .scoring
                .score_with_embeddings(resume, &resume_vector, job, &job_vector)
            {
                Ok(score) => entries.push(RankedEntry { id: id.clone(), score }),
                Err(e) => {
                    warn!("Excluding resume '{}' from ranking: {}", id, e);
                    failures.push(RankingFailure::new(id.as_str(), &e));
                }
            }
        }

        debug!("Ranked {} resumes ({} failed)", entries.len(), failures.len());
        RankedResult::from_parts(entries, failures)
    }

    /// Rank jobs for one resume
    pub fn rank_jobs(&self, resume: &ParsedResume, jobs: &[(String, JobRequirement)]) -> RankedResult {
        let embeddings = self.scoring.embeddings();
        let resume_vector = embeddings.embed(&resume.full_text);

        let mut entries = Vec::with_capacity(jobs.len());
        let mut failures = Vec::new();
        for (id, job) in jobs {
            let job_vector = embeddings.embed(&job.description_text);
            match self
                .scoring
                .score_with_embeddings(resume, &resume_vector, job, &job_vector)
            {
                Ok(score) => entries.push(RankedEntry { id: id.clone(), score }),
                Err(e) => {
                    warn!("Excluding job '{}' from ranking: {}", id, e);
                    failures.push(RankingFailure::new(id.as_str(), &e));
                }
            }
        }

        debug!("Ranked {} jobs ({} failed)", entries.len(), failures.len());
        RankedResult::from_parts(entries, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::embeddings::EmbeddingEngine;
    use crate::processing::scoring::{ScoreBreakdown, ScoringWeights};

    fn entry(id: &str, score: f32) -> RankedEntry {
        RankedEntry {
            id: id.to_string(),
            score: MatchScore {
                score,
                breakdown: ScoreBreakdown {
                    skill_overlap: score,
                    semantic_similarity: score,
                    experience_match: score,
                },
                weights: ScoringWeights::default(),
                matched_skills: Vec::new(),
                missing_skills: Vec::new(),
                model_version: "test".to_string(),
            },
        }
    }

    fn aggregator() -> RankingAggregator {
        RankingAggregator::new(ScoringEngine::new(
            EmbeddingEngine::hashed(128, 512),
            ScoringWeights::default(),
        ))
    }

    fn resume(text: &str, skills: &[&str], years: Option<f32>) -> ParsedResume {
        ParsedResume {
            full_text: text.to_string(),
            ..ParsedResume::default()
        }
        .with_skills(skills.iter().copied())
        .with_experience_years(years)
        .unwrap()
    }

    #[test]
    fn test_ties_broken_by_ascending_id() {
        let result = RankedResult::from_parts(
            vec![entry("b", 0.9), entry("a", 0.7), entry("c", 0.9)],
            Vec::new(),
        );
        assert_eq!(result.ids(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let forward = RankedResult::from_parts(
            vec![entry("x", 0.5), entry("y", 0.5), entry("z", 0.8), entry("w", 0.1)],
            Vec::new(),
        );
        let backward = RankedResult::from_parts(
            vec![entry("w", 0.1), entry("z", 0.8), entry("y", 0.5), entry("x", 0.5)],
            Vec::new(),
        );
        assert_eq!(forward, backward);
        assert_eq!(forward.ids(), vec!["z", "x", "y", "w"]);
    }

    #[test]
    fn test_empty_input_gives_empty_result() {
        let aggregator = aggregator();
        let result = aggregator.rank(&JobRequirement::new("Rust engineer"), &[]);
        assert!(result.is_empty());

        let result = aggregator.rank_jobs(&ParsedResume::empty(), &[]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_rank_resumes_for_job() {
        let job = JobRequirement::new("Senior Python engineer with SQL")
            .with_required_skills(["python", "sql"])
            .with_min_experience_years(Some(5.0))
            .unwrap();
        let resumes = vec![
            ("weak".to_string(), resume("Pastry chef", &[], Some(1.0))),
            (
                "strong".to_string(),
                resume("Senior Python engineer, SQL tuning", &["python", "sql"], Some(8.0)),
            ),
            ("partial".to_string(), resume("Python developer", &["python"], Some(2.0))),
        ];

        let aggregator = aggregator();
        let result = aggregator.rank(&job, &resumes);
        assert_eq!(result.ids(), vec!["strong", "partial", "weak"]);
        assert!(result.failures.is_empty());

        let mut reversed = resumes.clone();
        reversed.reverse();
        assert_eq!(aggregator.rank(&job, &reversed), result);
    }

    #[test]
    fn test_rank_jobs_for_resume() {
        let candidate = resume("Data engineer: Spark, Airflow, Python", &["spark", "python"], Some(4.0));
        let jobs = vec![
            (
                "data".to_string(),
                JobRequirement::new("Data engineer with Spark and Python").with_required_skills(["spark", "python"]),
            ),
            (
                "frontend".to_string(),
                JobRequirement::new("Frontend developer React").with_required_skills(["react", "css"]),
            ),
        ];

        let result = aggregator().rank_jobs(&candidate, &jobs);
        assert_eq!(result.ids(), vec!["data", "frontend"]);
        assert_eq!(result.entries[1].score.missing_skills, vec!["css", "react"]);
    }

    #[test]
    fn test_failures_sorted_by_id() {
        let err = ResumeMatchError::CorruptDocument("truncated".to_string());
        let result = RankedResult::from_parts(
            Vec::new(),
            vec![RankingFailure::new("z", &err), RankingFailure::new("m", &err)],
        );
        assert_eq!(result.failures[0].id, "m");
        assert_eq!(result.failures[1].kind, ErrorKind::CorruptDocument);
    }
}
