//! Request-level facade wiring extraction, embedding, scoring and ranking

use crate::config::Config;
use crate::error::{Result, ResumeMatchError};
use crate::input::manager::EXTRACTION_OPERATION;
use crate::input::{Document, InputManager};
use crate::processing::document::{JobRequirement, ParsedResume};
use crate::processing::embeddings::{EmbeddingEngine, EmbeddingVector, INFERENCE_OPERATION};
use crate::processing::fields::FieldExtractor;
use crate::processing::ranking::{RankedEntry, RankedResult, RankingAggregator, RankingFailure};
use crate::processing::roles::{RoleCatalog, RoleRecommendation};
use crate::processing::scoring::{MatchScore, ScoringEngine, ScoringWeights};
use crate::processing::skills::SkillVocabulary;
use crate::runtime::run_blocking;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// One uploaded resume in a batch
#[derive(Debug, Clone)]
pub struct ResumeSubmission {
    pub id: String,
    pub content: Vec<u8>,
    /// Declared format: `pdf`, `docx` or a MIME type
    pub format_tag: String,
}

impl ResumeSubmission {
    pub fn new(id: impl Into<String>, content: Vec<u8>, format_tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content,
            format_tag: format_tag.into(),
        }
    }
}

/// Parsed resume together with the embedding of its text
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAnalysis {
    pub resume: ParsedResume,
    pub embedding: EmbeddingVector,
}

/// Concurrency slot shared by every blocking step of one batch item
type Permit = Arc<OwnedSemaphorePermit>;

/// Entry point used by the surrounding application.
///
/// Cheap to clone; clones share the loaded model and vocabulary.
#[derive(Clone)]
pub struct ResumeAnalyzer {
    input: Arc<InputManager>,
    fields: Arc<FieldExtractor>,
    aggregator: Arc<RankingAggregator>,
    roles: Arc<RoleCatalog>,
    extraction_timeout: Duration,
    inference_timeout: Duration,
    max_concurrency: usize,
}

impl ResumeAnalyzer {
    /// Validate `config`, load the skill vocabulary and the embedding model.
    ///
    /// Any error here means the analyzer must not serve requests.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let engine = EmbeddingEngine::load(&config.models)?;
        Self::with_engine(config, engine)
    }

    /// Build around an already loaded embedding engine
    pub fn with_engine(config: &Config, engine: EmbeddingEngine) -> Result<Self> {
        config.validate()?;

        let vocabulary = SkillVocabulary::from_source(config.processing.skill_vocabulary_source.as_deref())?;
        let roles = RoleCatalog::from_source(config.processing.role_catalog_source.as_deref(), &vocabulary)?;
        info!(
            "Analyzer ready: {} skills, {} roles, model {}",
            vocabulary.len(),
            roles.len(),
            engine.model_version()
        );

        let weights = ScoringWeights::from_config(&config.scoring)?;
        Ok(Self {
            input: Arc::new(InputManager::new()?),
            fields: Arc::new(FieldExtractor::new(Arc::new(vocabulary))?),
            aggregator: Arc::new(RankingAggregator::new(ScoringEngine::new(engine, weights))),
            roles: Arc::new(roles),
            extraction_timeout: config.extraction_timeout(),
            inference_timeout: config.inference_timeout(),
            max_concurrency: config.processing.max_concurrency.max(1),
        })
    }

    pub fn model_version(&self) -> &str {
        self.engine().model_version()
    }

    pub fn field_extractor(&self) -> &FieldExtractor {
        &self.fields
    }

    pub fn scoring(&self) -> &ScoringEngine {
        self.aggregator.scoring()
    }

    pub fn role_catalog(&self) -> &RoleCatalog {
        &self.roles
    }

    fn engine(&self) -> &EmbeddingEngine {
        self.aggregator.scoring().embeddings()
    }

    pub async fn extract_text(&self, document: Document) -> Result<String> {
        Arc::clone(&self.input)
            .extract_text_with_timeout(document, self.extraction_timeout)
            .await
    }

    /// Extract text from `document` and parse its fields
    pub async fn analyze_document(&self, document: Document) -> Result<ParsedResume> {
        let text = self.extract_text(document).await?;
        Ok(self.fields.extract_fields(&text))
    }

    /// Parse a document and embed its text
    pub async fn analyze_with_embedding(&self, document: Document) -> Result<DocumentAnalysis> {
        let resume = self.analyze_document(document).await?;
        let embedding = self
            .engine()
            .embed_with_timeout(resume.full_text.clone(), self.inference_timeout)
            .await?;
        Ok(DocumentAnalysis { resume, embedding })
    }

    /// Structured requirement from a free-text job description
    pub fn parse_job(&self, description: &str) -> JobRequirement {
        self.fields.derive_job_requirement(description)
    }

    /// Score one resume against one job. Skills on both sides are mapped
    /// onto vocabulary names first, so stored or caller-built values
    /// (`ReactJS`, `Python`) compare like extracted ones.
    pub async fn score(&self, resume: &ParsedResume, job: &JobRequirement) -> Result<MatchScore> {
        let resume = self.fields.canonical_resume(resume);
        let job = self.fields.canonical_job(job);

        let engine = self.engine();
        let resume_vector = engine
            .embed_with_timeout(resume.full_text.clone(), self.inference_timeout)
            .await?;
        let job_vector = engine
            .embed_with_timeout(job.description_text.clone(), self.inference_timeout)
            .await?;

        self.scoring()
            .score_with_embeddings(&resume, &resume_vector, &job, &job_vector)
    }

    /// Analyze and rank a batch of uploaded resumes for one job.
    ///
    /// At most `max_concurrency` submissions are processed at once. A
    /// submission that fails extraction or times out is reported in
    /// `failures` and left out of the ranking; only a failure to embed the
    /// job itself fails the whole call.
    pub async fn rank_documents(
        &self,
        job: &JobRequirement,
        submissions: Vec<ResumeSubmission>,
    ) -> Result<RankedResult> {
        let start_time = Instant::now();
        let total = submissions.len();
        if total == 0 {
            return Ok(RankedResult::default());
        }

        let job = self.fields.canonical_job(job);
        let job_vector = self
            .engine()
            .embed_with_timeout(job.description_text.clone(), self.inference_timeout)
            .await?;

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(total);
        for submission in submissions {
            let analyzer = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let id = submission.id.clone();

            let handle = tokio::spawn(async move {
                let permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ResumeMatchError::TaskFailed(e.to_string()))?;
                analyzer.process_submission(submission, Arc::new(permit)).await
            });
            handles.push((id, handle));
        }

        let mut outcomes = Vec::with_capacity(total);
        for (id, handle) in handles {
            let outcome = joined(handle.await).and_then(|analysis| {
                self.scoring().score_with_embeddings(
                    &analysis.resume,
                    &analysis.embedding,
                    &job,
                    &job_vector,
                )
            });
            outcomes.push((id, outcome));
        }

        let result = collect_ranking(outcomes, "Resume");
        info!(
            "Ranked {} of {} resumes in {:.2?}",
            result.entries.len(),
            total,
            start_time.elapsed()
        );
        Ok(result)
    }

    async fn process_submission(&self, submission: ResumeSubmission, permit: Permit) -> Result<DocumentAnalysis> {
        debug!(
            "Processing resume '{}' ({} bytes, declared {})",
            submission.id,
            submission.content.len(),
            submission.format_tag
        );
        let document = Document::from_tag(submission.content, &submission.format_tag)?;

        let input = Arc::clone(&self.input);
        let held = Arc::clone(&permit);
        let text = run_blocking(EXTRACTION_OPERATION, self.extraction_timeout, move || {
            let _held = held;
            input.extract_text(&document)
        })
        .await?;

        let resume = self.fields.extract_fields(&text);
        let embedding = self.embed_holding(resume.full_text.clone(), permit).await?;
        Ok(DocumentAnalysis { resume, embedding })
    }

    /// Embed under the inference deadline. The permit is released when
    /// inference actually ends, which may be after the deadline.
    async fn embed_holding(&self, text: String, permit: Permit) -> Result<EmbeddingVector> {
        let engine = self.engine().clone();
        run_blocking(INFERENCE_OPERATION, self.inference_timeout, move || {
            let _held = permit;
            Ok(engine.embed(&text))
        })
        .await
    }

    /// Embed every item with at most `max_concurrency` inferences in
    /// flight, each under the inference deadline. Outcomes keep input order.
    async fn embed_batch<T>(
        &self,
        items: Vec<(String, T)>,
        text_of: fn(&T) -> &str,
    ) -> Vec<(String, Result<(T, EmbeddingVector)>)>
    where
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(items.len());
        for (id, item) in items {
            let analyzer = self.clone();
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ResumeMatchError::TaskFailed(e.to_string()))?;
                let text = text_of(&item).to_string();
                let vector = analyzer.embed_holding(text, Arc::new(permit)).await?;
                Ok::<_, ResumeMatchError>((item, vector))
            });
            handles.push((id, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            outcomes.push((id, joined(handle.await)));
        }
        outcomes
    }

    /// Rank already parsed resumes for one job.
    ///
    /// A resume whose inference misses the deadline is reported in
    /// `failures`; only a failure to embed the job fails the call.
    pub async fn rank_resumes(
        &self,
        job: &JobRequirement,
        resumes: Vec<(String, ParsedResume)>,
    ) -> Result<RankedResult> {
        if resumes.is_empty() {
            return Ok(RankedResult::default());
        }

        let job = self.fields.canonical_job(job);
        let job_vector = self
            .engine()
            .embed_with_timeout(job.description_text.clone(), self.inference_timeout)
            .await?;

        let resumes = resumes
            .into_iter()
            .map(|(id, resume)| (id, self.fields.canonical_resume(&resume)))
            .collect();
        let outcomes = self
            .embed_batch(resumes, resume_text)
            .await
            .into_iter()
            .map(|(id, embedded)| {
                let score = embedded.and_then(|(resume, resume_vector)| {
                    self.scoring()
                        .score_with_embeddings(&resume, &resume_vector, &job, &job_vector)
                });
                (id, score)
            })
            .collect();

        Ok(collect_ranking(outcomes, "Resume"))
    }

    /// Rank jobs for one resume, best match first.
    ///
    /// Same failure rules as [`Self::rank_resumes`], with the roles swapped.
    pub async fn recommend_jobs(
        &self,
        resume: &ParsedResume,
        jobs: Vec<(String, JobRequirement)>,
    ) -> Result<RankedResult> {
        if jobs.is_empty() {
            return Ok(RankedResult::default());
        }

        let resume = self.fields.canonical_resume(resume);
        let resume_vector = self
            .engine()
            .embed_with_timeout(resume.full_text.clone(), self.inference_timeout)
            .await?;

        let jobs = jobs
            .into_iter()
            .map(|(id, job)| (id, self.fields.canonical_job(&job)))
            .collect();
        let outcomes = self
            .embed_batch(jobs, job_text)
            .await
            .into_iter()
            .map(|(id, embedded)| {
                let score = embedded.and_then(|(job, job_vector)| {
                    self.scoring()
                        .score_with_embeddings(&resume, &resume_vector, &job, &job_vector)
                });
                (id, score)
            })
            .collect();

        Ok(collect_ranking(outcomes, "Job"))
    }

    /// Catalog roles that fit the resume's skills, best first
    pub fn recommend_roles(&self, resume: &ParsedResume) -> Vec<RoleRecommendation> {
        let vocabulary = self.fields.vocabulary();
        let skills = vocabulary.canonicalize_all(&resume.skills);
        let recommendations = self.roles.recommend(&skills, vocabulary);
        debug!(
            "{} role recommendations from {} skills",
            recommendations.len(),
            skills.len()
        );
        recommendations
    }
}

fn resume_text(resume: &ParsedResume) -> &str {
    &resume.full_text
}

fn job_text(job: &JobRequirement) -> &str {
    &job.description_text
}

fn joined<T>(outcome: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    outcome
        .map_err(|e| ResumeMatchError::TaskFailed(e.to_string()))
        .and_then(|result| result)
}

fn collect_ranking(outcomes: Vec<(String, Result<MatchScore>)>, item: &str) -> RankedResult {
    let mut entries = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(score) => entries.push(RankedEntry { id, score }),
            Err(e) => {
                warn!("{} '{}' left out of the ranking: {}", item, id, e);
                failures.push(RankingFailure::new(id, &e));
            }
        }
    }
    RankedResult::from_parts(entries, failures)
}
