//! High-level pipeline: orchestrates idea → draft → image → publish for one post.
//!
//! This module provides the top-level orchestration logic for producing and
//! publishing a single post. It implements a coordinated pipeline that:
//!   - Resolves the topic (caller-supplied, or from an [`IdeaGenerator`])
//!   - Drafts post copy via a [`CopyWriter`] and validates it against the
//!     platform's copy limits
//!   - Optionally generates an image artifact via an [`ImageGenerator`]
//!   - Optionally publishes via a [`Publisher`]
//!   - Aggregates and returns per-stage outcomes for downstream audit.
//!
//! # Major Types
//! - [`PipelineConfig`]: Bundles payload and stage toggles for a "run"
//! - [`PipelineOutcome`]: Output report with the produced artifacts and stage outcomes
//! - [`PipelineFailure`]: Failure carrying the failing stage and the partial report
//!
//! # Responsibilities
//! - Fail-fast orchestration for content and publishing stages; a failed
//!   image stage is tolerated and the run continues without an image
//! - Invokes logging throughout for traceability (see tracing events)
//! - Does not retry external calls: retry policy belongs to the executor
//!   (see [`crate::scheduler`])
//!
//! # Callable From
//! - Used by both the CLI crate and integration tests
//! - Expects concrete (async) collaborator implementations, or mocks
//!
//! # Error Handling
//! A fatal stage failure returns immediately with the failing stage and the
//! stage reports accumulated so far; callers should log and surface these.

use std::time::Instant;

use tracing::{error, info, warn};

use crate::contract::{CopyWriter, IdeaGenerator, ImageGenerator, PostSubmission, Publisher, PublishedPost};
use crate::prompts;
use crate::task::Stage;

/// How many characters of the post copy are handed to the image generator as
/// the content summary.
const IMAGE_SUMMARY_CHARS: usize = 300;

/// Payload and stage toggles for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Topic to draft about. Resolved from the idea generator when absent.
    pub topic: Option<String>,
    /// Ready-made post copy; skips topic resolution and drafting when present.
    pub content: Option<String>,
    /// Ready-made image artifact; skips image generation when present.
    pub image: Option<String>,
    /// Style override passed through to the collaborators.
    pub style: Option<String>,
    /// Whether to generate an image when none was supplied.
    pub generate_image: bool,
    /// Whether to publish the result.
    pub publish: bool,
    /// Whether deterministic fallback copy may stand in for a failed draft.
    pub fallback_enabled: bool,
}

/// Outcome of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Failed,
    Skipped,
}

/// Per-stage record in the pipeline report.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub error: Option<String>,
    pub duration: std::time::Duration,
}

/// Report of a successful run: the produced artifacts plus stage outcomes.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub topic: Option<String>,
    pub content: String,
    pub image: Option<String>,
    pub post: Option<PublishedPost>,
    pub stages: Vec<StageReport>,
}

/// A fatal stage failure, carrying the partial stage report for audit.
#[derive(Debug)]
pub struct PipelineFailure {
    pub stage: Stage,
    pub error: String,
    pub stages: Vec<StageReport>,
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pipeline failed at {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for PipelineFailure {}

/// Entrypoint: run one post through the pipeline according to config.
pub async fn run_post_pipeline<G, W, I, P>(
    config: &PipelineConfig,
    ideas: &G,
    writer: &W,
    imager: &I,
    publisher: &P,
) -> Result<PipelineOutcome, PipelineFailure>
where
    G: IdeaGenerator,
    W: CopyWriter,
    I: ImageGenerator,
    P: Publisher,
{
    info!("[PIPELINE] Starting post pipeline");
    let mut stages: Vec<StageReport> = Vec::new();

    // --- Stage 1: Content ---
    let started = Instant::now();
    let mut topic = config.topic.clone();
    let content = match &config.content {
        Some(provided) => {
            info!("[PIPELINE] Content supplied by caller, skipping drafting");
            stages.push(StageReport {
                stage: Stage::ContentGeneration,
                outcome: StageOutcome::Skipped,
                error: None,
                duration: started.elapsed(),
            });
            provided.clone()
        }
        None => {
            let resolved_topic = match topic.clone() {
                Some(t) => t,
                None => match ideas.generate_idea(None).await {
                    Ok(idea) => {
                        info!(topic = %idea, "[PIPELINE] Topic resolved from idea generator");
                        idea
                    }
                    Err(e) => {
                        error!(error = ?e, "[PIPELINE][ERROR] Idea generation failed");
                        stages.push(StageReport {
                            stage: Stage::ContentGeneration,
                            outcome: StageOutcome::Failed,
                            error: Some(format!("idea generation failed: {e}")),
                            duration: started.elapsed(),
                        });
                        return Err(PipelineFailure {
                            stage: Stage::ContentGeneration,
                            error: format!("idea generation failed: {e}"),
                            stages,
                        });
                    }
                },
            };
            topic = Some(resolved_topic.clone());

            match draft_with_fallback(writer, &resolved_topic, config).await {
                Ok(draft) => {
                    stages.push(StageReport {
                        stage: Stage::ContentGeneration,
                        outcome: StageOutcome::Completed,
                        error: None,
                        duration: started.elapsed(),
                    });
                    draft
                }
                Err(e) => {
                    error!(error = %e, "[PIPELINE][ERROR] Content generation failed");
                    stages.push(StageReport {
                        stage: Stage::ContentGeneration,
                        outcome: StageOutcome::Failed,
                        error: Some(e.clone()),
                        duration: started.elapsed(),
                    });
                    return Err(PipelineFailure {
                        stage: Stage::ContentGeneration,
                        error: e,
                        stages,
                    });
                }
            }
        }
    };

    // --- Stage 2: Image ---
    let started = Instant::now();
    let image = match &config.image {
        Some(provided) => {
            info!(image = %provided, "[PIPELINE] Image supplied by caller, skipping generation");
            stages.push(StageReport {
                stage: Stage::ImageGeneration,
                outcome: StageOutcome::Skipped,
                error: None,
                duration: started.elapsed(),
            });
            Some(provided.clone())
        }
        None if config.generate_image => {
            let summary: String = content.chars().take(IMAGE_SUMMARY_CHARS).collect();
            match imager.generate_image(&summary, config.style.as_deref()).await {
                Ok(path) => {
                    info!(image = %path, "[PIPELINE] Image generated");
                    stages.push(StageReport {
                        stage: Stage::ImageGeneration,
                        outcome: StageOutcome::Completed,
                        error: None,
                        duration: started.elapsed(),
                    });
                    Some(path)
                }
                Err(e) => {
                    // Tolerated: the post goes out without an image.
                    warn!(error = ?e, "[PIPELINE] Image generation failed, continuing without image");
                    stages.push(StageReport {
                        stage: Stage::ImageGeneration,
                        outcome: StageOutcome::Failed,
                        error: Some(format!("image generation failed: {e}")),
                        duration: started.elapsed(),
                    });
                    None
                }
            }
        }
        None => {
            stages.push(StageReport {
                stage: Stage::ImageGeneration,
                outcome: StageOutcome::Skipped,
                error: None,
                duration: started.elapsed(),
            });
            None
        }
    };

    // --- Stage 3: Publish ---
    let started = Instant::now();
    let post = if config.publish {
        let submission = PostSubmission {
            content: &content,
            image: image.as_deref(),
        };
        match publisher.publish(submission).await {
            Ok(published) => {
                info!(post_id = %published.post_id, "[PIPELINE] Post published");
                stages.push(StageReport {
                    stage: Stage::LinkedinPosting,
                    outcome: StageOutcome::Completed,
                    error: None,
                    duration: started.elapsed(),
                });
                Some(published)
            }
            Err(e) => {
                error!(error = ?e, "[PIPELINE][ERROR] Publishing failed");
                stages.push(StageReport {
                    stage: Stage::LinkedinPosting,
                    outcome: StageOutcome::Failed,
                    error: Some(format!("publishing failed: {e}")),
                    duration: started.elapsed(),
                });
                return Err(PipelineFailure {
                    stage: Stage::LinkedinPosting,
                    error: format!("publishing failed: {e}"),
                    stages,
                });
            }
        }
    } else {
        stages.push(StageReport {
            stage: Stage::LinkedinPosting,
            outcome: StageOutcome::Skipped,
            error: None,
            duration: started.elapsed(),
        });
        None
    };

    info!("[PIPELINE] Post pipeline finished");
    Ok(PipelineOutcome {
        topic,
        content,
        image,
        post,
        stages,
    })
}

/// Draft copy for a topic, validating the result and applying the configured
/// fallback when drafting or validation fails.
async fn draft_with_fallback<W: CopyWriter>(
    writer: &W,
    topic: &str,
    config: &PipelineConfig,
) -> Result<String, String> {
    match writer.draft_post(topic, config.style.as_deref()).await {
        Ok(draft) => match prompts::validate_post_copy(&draft) {
            Ok(stats) => {
                info!(
                    words = stats.word_count,
                    chars = stats.char_count,
                    "[PIPELINE] Draft validated"
                );
                Ok(draft)
            }
            Err(rejection) if config.fallback_enabled => {
                warn!(reason = %rejection, "[PIPELINE] Draft rejected, using fallback copy");
                Ok(prompts::fallback_post_copy(topic))
            }
            Err(rejection) => Err(format!("draft rejected: {rejection}")),
        },
        Err(e) if config.fallback_enabled => {
            warn!(error = ?e, "[PIPELINE] Drafting failed, using fallback copy");
            Ok(prompts::fallback_post_copy(topic))
        }
        Err(e) => Err(format!("drafting failed: {e}")),
    }
}
