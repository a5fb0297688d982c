//! Due-task execution: drives scheduled tasks through the pipeline.
//!
//! A caller-driven pass over the [`TaskStore`]: pick the pending tasks whose
//! scheduled time has passed, run each one through the post pipeline and
//! report progress back into its record via [`TaskStore::advance`]. Retry
//! policy lives here, not in the tracker: a failed attempt is re-run after a
//! configurable delay until the task's retry cap settles it into `failed`.
//!
//! Execution is sequential; each task is an independent record and no
//! ordering is guaranteed between tasks beyond earliest-due-first.

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::contract::{CopyWriter, IdeaGenerator, ImageGenerator, Publisher};
use crate::pipeline::{run_post_pipeline, PipelineConfig};
use crate::task::{TaskStatus, TaskStore, Transition};

/// How failed attempts are spaced.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay between attempts of the same task.
    pub retry_delay: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            // Matches the historical five-minute retry spacing.
            retry_delay: std::time::Duration::from_secs(300),
        }
    }
}

/// What happened to one task during a processing pass.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    pub task_id: String,
    pub status: TaskStatus,
    pub attempts: u32,
}

/// Process every due task once, retrying failed attempts up to each task's
/// retry cap. Returns a summary per executed task.
pub async fn process_due_tasks<G, W, I, P>(
    store: &mut TaskStore,
    ideas: &G,
    writer: &W,
    imager: &I,
    publisher: &P,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Vec<ExecutionSummary>
where
    G: IdeaGenerator,
    W: CopyWriter,
    I: ImageGenerator,
    P: Publisher,
{
    let due = store.due(now);
    if due.is_empty() {
        return Vec::new();
    }
    info!(count = due.len(), "Processing due tasks");

    let mut summaries = Vec::with_capacity(due.len());
    for task_id in due {
        execute_task(store, &task_id, ideas, writer, imager, publisher, policy).await;
        if let Some(task) = store.get(&task_id) {
            summaries.push(ExecutionSummary {
                task_id: task_id.clone(),
                status: task.status,
                attempts: task.retry_count,
            });
        }
    }
    summaries
}

/// Run one task to a terminal state (completed, or failed after the retry cap).
async fn execute_task<G, W, I, P>(
    store: &mut TaskStore,
    task_id: &str,
    ideas: &G,
    writer: &W,
    imager: &I,
    publisher: &P,
    policy: &RetryPolicy,
) where
    G: IdeaGenerator,
    W: CopyWriter,
    I: ImageGenerator,
    P: Publisher,
{
    if let Err(e) = store.advance(task_id, Transition::Start) {
        error!(task_id = %task_id, error = %e, "Could not start task");
        return;
    }

    loop {
        let (content, image) = match store.get(task_id) {
            Some(task) => (task.content.clone(), task.image.clone()),
            None => return,
        };

        let config = PipelineConfig {
            content: Some(content),
            generate_image: image.is_none(),
            image,
            publish: true,
            ..PipelineConfig::default()
        };

        match run_post_pipeline(&config, ideas, writer, imager, publisher).await {
            Ok(outcome) => {
                for report in &outcome.stages {
                    record_stage(store, task_id, report.stage);
                }
                if let Err(e) = store.advance(task_id, Transition::Completed) {
                    error!(task_id = %task_id, error = %e, "Could not complete task");
                }
                return;
            }
            Err(failure) => {
                // Record the stages the run got past; the failing stage stays open.
                for report in &failure.stages {
                    if report.stage != failure.stage {
                        record_stage(store, task_id, report.stage);
                    }
                }
                if let Err(e) =
                    store.advance(task_id, Transition::AttemptFailed(failure.error.clone()))
                {
                    error!(task_id = %task_id, error = %e, "Could not record attempt failure");
                    return;
                }

                match store.get(task_id).map(|t| t.status) {
                    Some(TaskStatus::Running) => {
                        tokio::time::sleep(policy.retry_delay).await;
                    }
                    // Settled into failed (or disappeared): stop retrying.
                    _ => return,
                }
            }
        }
    }
}

fn record_stage(store: &mut TaskStore, task_id: &str, stage: crate::task::Stage) {
    if let Err(e) = store.advance(task_id, Transition::StageCompleted(stage)) {
        error!(task_id = %task_id, stage = %stage, error = %e, "Could not record stage");
    }
}
