//! Remediation orchestrator.
//!
//! Runs the analysis pass, then fans out one [`RemediationJob`] per eligible
//! weak student with bounded parallelism. A failing job only ever affects its
//! own [`DeliveryResult`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::analysis::{self, Analysis};
use crate::classify::Thresholds;
use crate::error::{ProviderError, SchemaError, Stage, StageFailure};
use crate::job::RemediationJob;
use crate::message::{self, MessageTemplate};
use crate::model::WeakStudent;
use crate::report::{self, BatchReport, DeliveryResult, DeliveryStatus};
use crate::schema::AliasTable;
use crate::table::AssessmentTable;
use crate::topics::TopicCatalog;
use crate::traits::{GenerateRequest, Generator, Mailer, Renderer, Retriever};

/// Time allowed for each external call, per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub context_retrieval: Duration,
    pub generation: Duration,
    pub rendering: Duration,
    pub delivery: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            context_retrieval: Duration::from_secs(30),
            generation: Duration::from_secs(60),
            rendering: Duration::from_secs(30),
            delivery: Duration::from_secs(30),
        }
    }
}

impl StageTimeouts {
    /// Topic extraction is local work and has no limit.
    pub fn for_stage(&self, stage: Stage) -> Option<Duration> {
        match stage {
            Stage::TopicExtraction => None,
            Stage::ContextRetrieval => Some(self.context_retrieval),
            Stage::Generation => Some(self.generation),
            Stage::Rendering => Some(self.rendering),
            Stage::Delivery => Some(self.delivery),
        }
    }
}

/// Configuration for the remediation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum concurrent jobs.
    pub parallelism: usize,
    pub timeouts: StageTimeouts,
    /// Optional wall-clock limit for the whole fan-out.
    pub batch_deadline: Option<Duration>,
    /// Passages requested per topic.
    pub retrieval_limit: usize,
    /// Model identifier passed to the generator.
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Signature used in outgoing emails.
    pub sender_name: String,
    pub catalog: TopicCatalog,
    pub thresholds: Thresholds,
    pub aliases: AliasTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            timeouts: StageTimeouts::default(),
            batch_deadline: None,
            retrieval_limit: 3,
            model: "tngtech/deepseek-r1t2-chimera:free".to_string(),
            temperature: 0.3,
            max_tokens: 3000,
            sender_name: "Tata Strive Learning Team".to_string(),
            catalog: TopicCatalog::default(),
            thresholds: Thresholds::default(),
            aliases: AliasTable::default(),
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_job_start(&self, student_id: &str);
    fn on_job_complete(&self, result: &DeliveryResult);
    fn on_batch_complete(&self, total: usize, sent: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_job_start(&self, _: &str) {}
    fn on_job_complete(&self, _: &DeliveryResult) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// The remediation engine.
pub struct RemediationEngine {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    renderer: Arc<dyn Renderer>,
    mailer: Arc<dyn Mailer>,
    config: EngineConfig,
}

impl RemediationEngine {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        renderer: Arc<dyn Renderer>,
        mailer: Arc<dyn Mailer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            renderer,
            mailer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyze `table` and remediate every eligible weak student.
    pub async fn run(
        &self,
        table: &AssessmentTable,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport, SchemaError> {
        self.run_until(table, progress, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops draining jobs once `shutdown`
    /// resolves. The report is then marked partial.
    pub async fn run_until<F>(
        &self,
        table: &AssessmentTable,
        progress: &dyn ProgressReporter,
        shutdown: F,
    ) -> Result<BatchReport, SchemaError>
    where
        F: Future<Output = ()>,
    {
        let analysis = analysis::analyze(table, &self.config.aliases, &self.config.thresholds)?;
        Ok(self.remediate(&analysis, progress, shutdown).await)
    }

    /// Fan out jobs for an already analyzed batch.
    pub async fn remediate<F>(
        &self,
        analysis: &Analysis,
        progress: &dyn ProgressReporter,
        shutdown: F,
    ) -> BatchReport
    where
        F: Future<Output = ()>,
    {
        let start = Instant::now();
        let batch_id = Uuid::new_v4();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        let students: Vec<&WeakStudent> = analysis.eligible_students().collect();
        tracing::info!(
            batch = %batch_id,
            jobs = students.len(),
            parallelism = self.config.parallelism,
            "starting remediation"
        );

        let mut futures = FuturesUnordered::new();
        for (index, student) in students.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let student = (*student).clone();
            futures.push(async move {
                // The pool is never closed while jobs are queued; if it were,
                // the job never started and is reported as abandoned.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, None);
                };
                progress.on_job_start(student.student_id());
                (index, Some(self.run_job(student).await))
            });
        }

        let deadline = self.config.batch_deadline;
        let expired = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);
        tokio::pin!(shutdown);

        let mut slots: Vec<Option<DeliveryResult>> = vec![None; students.len()];
        loop {
            tokio::select! {
                biased;
                next = futures.next() => match next {
                    Some((index, Some(result))) => {
                        progress.on_job_complete(&result);
                        slots[index] = Some(result);
                    }
                    Some((_, None)) => {}
                    None => break,
                },
                _ = &mut expired => {
                    tracing::warn!(batch = %batch_id, "batch deadline reached, abandoning remaining jobs");
                    break;
                }
                _ = &mut shutdown => {
                    tracing::warn!(batch = %batch_id, "shutdown requested, abandoning remaining jobs");
                    break;
                }
            }
        }
        // Dropping the set cancels whatever is still in flight.
        drop(futures);

        let mut results = Vec::with_capacity(slots.len());
        let mut abandoned = Vec::new();
        for (slot, student) in slots.into_iter().zip(&students) {
            match slot {
                Some(result) => results.push(result),
                None => abandoned.push(student.student_id().to_string()),
            }
        }

        let report = report::build_report(batch_id, analysis, results, abandoned);
        let elapsed = start.elapsed();
        progress.on_batch_complete(
            report.email_results.len(),
            report.emails_sent,
            report.failed_count(),
            elapsed,
        );
        tracing::info!(
            batch = %batch_id,
            sent = report.emails_sent,
            failed = report.failed_count(),
            abandoned = report.abandoned.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "remediation finished"
        );
        report
    }

    /// Run one job to a terminal state and convert it into its result.
    ///
    /// A panic inside a collaborator is caught here and recorded as a failure
    /// of the stage that was running.
    async fn run_job(&self, student: WeakStudent) -> DeliveryResult {
        let mut job = RemediationJob::new(student);
        let failure = match AssertUnwindSafe(self.process(&mut job)).catch_unwind().await {
            Ok(Ok(())) => None,
            Ok(Err(failure)) => Some(failure),
            Err(payload) => job.state().next_stage().map(|stage| {
                let message = panic_message(payload.as_ref());
                tracing::error!(student = %job.student.student_id(), %stage, "job panicked: {message}");
                StageFailure::new(stage, format!("panicked: {message}"))
            }),
        };
        if let Some(failure) = failure {
            if let Err(e) = job.fail(failure) {
                tracing::error!("could not record job failure: {e}");
            }
        }

        let status = match job.failure() {
            Some(failure) => DeliveryStatus::Failed(failure.clone()),
            None => DeliveryStatus::Sent,
        };
        DeliveryResult::new(&job.student, status)
    }

    #[tracing::instrument(skip_all, fields(student = %job.student.student_id()))]
    async fn process(&self, job: &mut RemediationJob) -> Result<(), StageFailure> {
        let student_id = job.student.student_id().to_string();
        let questions = job.student.failed_question_texts();
        let subject = self.config.catalog.subject.as_str();

        let topics = self.config.catalog.distinct_topics(&questions);
        advance(job, Stage::TopicExtraction)?;

        let mut contexts = Vec::with_capacity(topics.len());
        for topic in &topics {
            let fetched = self
                .within(
                    Stage::ContextRetrieval,
                    self.retriever.fetch(topic, self.config.retrieval_limit),
                )
                .await?;
            if !fetched.is_empty() {
                contexts.push(fetched.text);
            }
        }
        let context = contexts.join("\n\n");
        tracing::debug!(topics = topics.len(), context_len = context.len(), "context retrieved");
        advance(job, Stage::ContextRetrieval)?;

        let request = GenerateRequest {
            model: self.config.model.clone(),
            system_prompt: message::build_study_prompt(
                subject,
                &student_id,
                &topics,
                &questions,
                &context,
            ),
            prompt: message::STUDY_PROMPT_USER_TURN.to_string(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let generated = self
            .within(Stage::Generation, self.generator.generate(&request))
            .await?;
        tracing::debug!(model = %generated.model, latency_ms = generated.latency_ms, "guide generated");
        advance(job, Stage::Generation)?;

        let document = self
            .within(
                Stage::Rendering,
                self.renderer
                    .render_document(&generated.content, &message::document_title(&student_id)),
            )
            .await?;
        advance(job, Stage::Rendering)?;

        let template = MessageTemplate {
            subject,
            sender_name: &self.config.sender_name,
        };
        let email = template.compose(&job.student.performance, &questions, document);
        let outcome = self
            .within(Stage::Delivery, async {
                Ok(self.mailer.send(&email).await)
            })
            .await?;
        if !outcome.success {
            return Err(StageFailure::new(Stage::Delivery, outcome.detail));
        }
        advance(job, Stage::Delivery)?;

        tracing::info!(detail = %outcome.detail, "study guide delivered");
        Ok(())
    }

    /// Await a collaborator call under the stage's timeout.
    async fn within<T, Fut>(&self, stage: Stage, call: Fut) -> Result<T, StageFailure>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let outcome = match self.config.timeouts.for_stage(stage) {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(StageFailure::timed_out(stage, limit)),
            },
            None => call.await,
        };
        outcome.map_err(|e| {
            let permanent = e
                .downcast_ref::<ProviderError>()
                .is_some_and(ProviderError::is_permanent);
            tracing::warn!(%stage, permanent, "collaborator call failed: {e:#}");
            StageFailure::from_provider(stage, &e)
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn advance(job: &mut RemediationJob, stage: Stage) -> Result<(), StageFailure> {
    job.complete(stage)
        .map_err(|e| StageFailure::new(stage, e.to_string()))
}
