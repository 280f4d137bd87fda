//! Resume analysis and job matching library

pub mod config;
pub mod error;
pub mod input;
pub mod processing;
pub mod runtime;

pub use config::Config;
pub use error::{ErrorKind, Result, ResumeMatchError};
pub use input::{Document, DocumentFormat, InputManager};
pub use processing::analyzer::{DocumentAnalysis, ResumeAnalyzer, ResumeSubmission};
pub use processing::document::{ContactInfo, EducationEntry, JobRequirement, ParsedResume};
pub use processing::embeddings::{EmbeddingEngine, EmbeddingVector};
pub use processing::roles::{RoleCatalog, RoleRecommendation};
pub use processing::ranking::{RankedEntry, RankedResult, RankingFailure};
pub use processing::scoring::{MatchQuality, MatchScore, ScoreBreakdown, ScoringWeights};
