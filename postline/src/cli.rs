///
/// This module implements the full CLI interface for postline—handling command
/// parsing, argument validation, main entrypoints, and user-visible invocations.
///
/// All core business logic (data models, pipelines, and the task tracker)
/// lives in the [`postline-core`] crate. This module is strictly for CLI glue,
/// ergonomic argument exposure, and orchestration.
///
/// ## Features
/// - Entry struct [`Cli`] defines all user-facing options and subcommands (see below).
/// - Subcommand routing (`idea`, `draft`, `image`, `post`, `schedule`,
///   `status`, `cancel`, `list`, `run`, `exchange-token`) and argument validation.
/// - Async entrypoint (`run`) for programmatic invocation and integration testing.
/// - Logging, tracing, and structured error output at CLI level.
///
/// ## How To Use
/// - For command-line users: use the installed `postline` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// ## Extending
/// When adding features or subcommands, update [`Commands`] below
/// and keep all non-trivial business logic inside `postline-core`.
///
/// ---
///
/// See crate root docs and [`postline-core`] for overall architecture.
///
/// ---
///
/// [`postline-core`]: ../../postline-core/
/// [`Cli`]: struct.Cli.html
/// [`run`]: fn.run.html
/// [`Commands`]: enum.Commands.html
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;

use postline_core::contract::{
    CopyWriter, IdeaGenerator, ImageGenerator, PostSubmission, Publisher,
};
use postline_core::scheduler::{process_due_tasks, RetryPolicy};
use postline_core::task::{ScheduleRequest, TaskStatus, TaskStore};

use crate::linkedin::{LinkedInClient, OAuthHandler};
use crate::load_config::{load_config, load_config_or_default};
use crate::openai::OpenAiClient;

/// CLI for postline: AI-drafted LinkedIn posts with scheduling and status polling.
#[derive(Parser)]
#[clap(
    name = "postline",
    version,
    about = "Generate, schedule and publish AI-drafted LinkedIn posts"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a single post topic idea
    Idea {
        /// Custom idea prompt overriding the built-in one
        #[clap(long)]
        prompt: Option<String>,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Draft post copy for a topic
    Draft {
        #[clap(long)]
        topic: String,
        /// Style override (defaults to the configured style)
        #[clap(long)]
        style: Option<String>,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Generate an image artifact for a content description
    Image {
        #[clap(long)]
        description: String,
        #[clap(long)]
        style: Option<String>,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Publish a post to LinkedIn immediately
    Post {
        #[clap(long)]
        content: String,
        /// Local path or http(s) URL of an image to attach
        #[clap(long)]
        image: Option<String>,
    },
    /// Schedule a post-creation task for later execution
    Schedule {
        /// ISO-8601 date-time at which the post should go out
        #[clap(long)]
        at: String,
        #[clap(long)]
        content: String,
        #[clap(long)]
        image: Option<String>,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Print the full status report for a task
    Status {
        #[clap(long)]
        task_id: String,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Cancel a scheduled task
    Cancel {
        #[clap(long)]
        task_id: String,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// List tracked tasks, optionally filtered by status
    List {
        /// pending | running | completed | failed | cancelled
        #[clap(long)]
        status: Option<String>,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Poll for due tasks and execute them until interrupted
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Exchange a LinkedIn OAuth authorization code for tokens
    ExchangeToken {
        #[clap(long)]
        code: String,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Idea { prompt, config } => {
            let config = load_config_or_default(config.as_deref())?;
            let client = OpenAiClient::new_from_env(&config)
                .map_err(|e| anyhow::Error::msg(format!("OpenAI client setup failed: {e}")))?;
            let idea = client
                .generate_idea(prompt.as_deref())
                .await
                .map_err(|e| anyhow::Error::msg(format!("Idea generation failed: {e}")))?;
            println!("{idea}");
            Ok(())
        }
        Commands::Draft {
            topic,
            style,
            config,
        } => {
            let config = load_config_or_default(config.as_deref())?;
            let client = OpenAiClient::new_from_env(&config)
                .map_err(|e| anyhow::Error::msg(format!("OpenAI client setup failed: {e}")))?;
            let draft = client
                .draft_post(&topic, style.as_deref())
                .await
                .map_err(|e| anyhow::Error::msg(format!("Drafting failed: {e}")))?;
            println!("{draft}");
            Ok(())
        }
        Commands::Image {
            description,
            style,
            config,
        } => {
            let config = load_config_or_default(config.as_deref())?;
            let client = OpenAiClient::new_from_env(&config)
                .map_err(|e| anyhow::Error::msg(format!("OpenAI client setup failed: {e}")))?;
            let path = client
                .generate_image(&description, style.as_deref())
                .await
                .map_err(|e| anyhow::Error::msg(format!("Image generation failed: {e}")))?;
            println!("{path}");
            Ok(())
        }
        Commands::Post { content, image } => {
            let publisher = LinkedInClient::new_from_env();
            let submission = PostSubmission {
                content: &content,
                image: image.as_deref(),
            };
            let published = publisher
                .publish(submission)
                .await
                .map_err(|e| anyhow::Error::msg(format!("LinkedIn post failed: {e}")))?;
            println!("{}", serde_json::to_string_pretty(&published)?);
            Ok(())
        }
        Commands::Schedule {
            at,
            content,
            image,
            config,
        } => {
            let config = load_config_or_default(config.as_deref())?;
            let mut store = TaskStore::load(&config.store.path, config.schedule.max_retries)?;
            let receipt = store.schedule(ScheduleRequest {
                datetime: at,
                content,
                image,
            })?;
            store.save(&config.store.path)?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            Ok(())
        }
        Commands::Status { task_id, config } => {
            let config = load_config_or_default(config.as_deref())?;
            let store = TaskStore::load(&config.store.path, config.schedule.max_retries)?;
            match store.status(&task_id) {
                Some(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(())
                }
                None => anyhow::bail!("task {task_id} not found"),
            }
        }
        Commands::Cancel { task_id, config } => {
            let config = load_config_or_default(config.as_deref())?;
            let mut store = TaskStore::load(&config.store.path, config.schedule.max_retries)?;
            let cancelled_at = store.cancel(&task_id)?;
            store.save(&config.store.path)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "success": true,
                    "task_id": task_id,
                    "status": "cancelled",
                    "cancelled_at": cancelled_at,
                }))?
            );
            Ok(())
        }
        Commands::List { status, config } => {
            let config = load_config_or_default(config.as_deref())?;
            let store = TaskStore::load(&config.store.path, config.schedule.max_retries)?;
            let filter = status
                .map(|s| s.parse::<TaskStatus>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let tasks = store.list(filter);
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "total_tasks": tasks.len(),
                    "tasks": tasks,
                }))?
            );
            Ok(())
        }
        Commands::Run { config } => {
            let config = load_config(&config)?;
            let mut store = TaskStore::load(&config.store.path, config.schedule.max_retries)?;
            let generator = OpenAiClient::new_from_env(&config)
                .map_err(|e| anyhow::Error::msg(format!("OpenAI client setup failed: {e}")))?;
            let publisher = LinkedInClient::new_from_env();
            let policy = RetryPolicy {
                retry_delay: std::time::Duration::from_secs(config.schedule.retry_delay_secs),
            };
            let poll_interval =
                std::time::Duration::from_secs(config.schedule.poll_interval_secs);

            tracing::info!(
                store = %config.store.path.display(),
                poll_interval_secs = config.schedule.poll_interval_secs,
                "Scheduler loop started"
            );
            loop {
                let summaries = process_due_tasks(
                    &mut store,
                    &generator,
                    &generator,
                    &generator,
                    &publisher,
                    &policy,
                    chrono::Utc::now(),
                )
                .await;
                if !summaries.is_empty() {
                    store.save(&config.store.path)?;
                    for summary in &summaries {
                        tracing::info!(
                            task_id = %summary.task_id,
                            status = %summary.status,
                            attempts = summary.attempts,
                            "Task processed"
                        );
                    }
                }
                tokio::time::sleep(poll_interval).await;
            }
        }
        Commands::ExchangeToken { code } => {
            let mut oauth = OAuthHandler::from_env()
                .map_err(|e| anyhow::Error::msg(format!("LinkedIn OAuth setup failed: {e}")))?;
            let tokens = oauth
                .exchange_code(&code)
                .await
                .map_err(|e| anyhow::Error::msg(format!("Token exchange failed: {e}")))?;
            let masked = tokens
                .access_token
                .as_deref()
                .map(|t| format!("{}...", t.chars().take(20).collect::<String>()));
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "success": true,
                    "message": "Token exchange successful",
                    "token_info": {
                        "access_token": masked,
                        "expires_in": tokens.expires_in,
                        "token_type": tokens.token_type,
                    }
                }))?
            );
            Ok(())
        }
    }
}
