//! Task tracker: scheduled post-creation tasks, their lifecycle and store.
//!
//! A [`TaskStore`] owns the mapping from task id to [`ScheduledTask`] record.
//! It is an explicit object injected into whatever needs it; there is no
//! process-wide state. The store answers point-in-time status queries and
//! exposes [`TaskStore::advance`] for whatever executes a task to report
//! progress into the record.
//!
//! Status transitions are forward-only:
//! pending → running → completed | failed | cancelled. Terminal states accept
//! no further transitions. Retried attempts keep the task `running`;
//! `retry_count` counts failed attempts and is capped by `max_retries`, at
//! which point the task settles into `failed`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

/// The only task type currently tracked.
pub const TASK_TYPE_POST_CREATION: &str = "post_creation";

/// Default cap on failed attempts before a task settles into `failed`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Rough per-stage duration used to derive `estimated_completion`.
const STAGE_ESTIMATE_SECS: i64 = 90;

/// A named step within a task's pipeline, in declared execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ContentGeneration,
    ImageGeneration,
    LinkedinPosting,
}

impl Stage {
    /// The fixed pipeline, in order.
    pub const ALL: [Stage; 3] = [
        Stage::ContentGeneration,
        Stage::ImageGeneration,
        Stage::LinkedinPosting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ContentGeneration => "content_generation",
            Stage::ImageGeneration => "image_generation",
            Stage::LinkedinPosting => "linkedin_posting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Completed, failed and cancelled accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status: {other:?}")),
        }
    }
}

/// One tracked unit of scheduled work. Owned exclusively by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub task_id: String,
    pub task_type: String,
    pub scheduled_time: DateTime<Utc>,
    /// The post copy to publish.
    pub content: String,
    /// Optional image artifact: a local path or http(s) URL.
    pub image: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Prefix of [`Stage::ALL`] passed so far, in declared order.
    pub stages_completed: Vec<Stage>,
}

impl ScheduledTask {
    /// The next undone stage while the task is not terminal.
    pub fn current_stage(&self) -> Option<Stage> {
        if self.status.is_terminal() {
            return None;
        }
        Stage::ALL
            .into_iter()
            .find(|s| !self.stages_completed.contains(s))
    }
}

/// Caller-facing request to schedule one post-creation task.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    /// ISO-8601 date-time string. RFC 3339, or a naive date-time taken as UTC.
    pub datetime: String,
    pub content: String,
    pub image: Option<String>,
}

/// Returned on successful scheduling.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReceipt {
    pub success: bool,
    pub task_id: String,
    pub scheduled_time: DateTime<Utc>,
}

/// Full point-in-time view of one task, including derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_id: String,
    pub task_type: String,
    pub status: TaskStatus,
    pub scheduled_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_message: Option<String>,
    pub is_running: bool,
    pub pipeline_stages: Vec<&'static str>,
    pub current_stage: Option<&'static str>,
    pub stages_completed: Vec<&'static str>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

/// Compact per-task entry for listings.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub status: TaskStatus,
    pub task_type: String,
    pub scheduled_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Internal transition reported by whatever executes a task.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Execution begins: sets `started_at`, status becomes running.
    Start,
    /// A pipeline stage finished (or was passed over); appended in order.
    StageCompleted(Stage),
    /// The run succeeded: terminal, sets `completed_at`.
    Completed,
    /// One attempt failed: bumps `retry_count`, records the error; settles
    /// into `failed` once the retry cap is reached.
    AttemptFailed(String),
}

#[derive(Debug)]
pub enum TaskError {
    /// The scheduling date-time did not parse as ISO-8601.
    InvalidDateTime(String),
    UnknownTask(String),
    /// A transition that the lifecycle does not allow from the current state.
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        detail: String,
    },
    Io(std::io::Error),
    Persist(serde_json::Error),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::InvalidDateTime(raw) => {
                write!(f, "invalid ISO-8601 datetime: {raw:?}")
            }
            TaskError::UnknownTask(id) => write!(f, "task {id} not found"),
            TaskError::InvalidTransition {
                task_id,
                from,
                detail,
            } => write!(f, "invalid transition for task {task_id} (status {from}): {detail}"),
            TaskError::Io(e) => write!(f, "task store I/O error: {e}"),
            TaskError::Persist(e) => write!(f, "task store (de)serialisation error: {e}"),
        }
    }
}

impl std::error::Error for TaskError {}

impl From<std::io::Error> for TaskError {
    fn from(e: std::io::Error) -> Self {
        TaskError::Io(e)
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::Persist(e)
    }
}

/// Parse a caller-supplied ISO-8601 string. RFC 3339 with offset is accepted
/// as-is; a naive date-time (no offset) is interpreted as UTC.
pub fn parse_scheduled_time(raw: &str) -> Result<DateTime<Utc>, TaskError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    raw.parse::<chrono::NaiveDateTime>()
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| TaskError::InvalidDateTime(raw.to_string()))
}

/// Owns all task records: one record per task id, exact-match lookup.
#[derive(Debug)]
pub struct TaskStore {
    tasks: HashMap<String, ScheduledTask>,
    max_retries: u32,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl TaskStore {
    pub fn new(max_retries: u32) -> Self {
        Self {
            tasks: HashMap::new(),
            max_retries,
        }
    }

    /// Load a persisted store from `path`. A missing file yields an empty store.
    pub fn load(path: &Path, max_retries: u32) -> Result<Self, TaskError> {
        if !path.exists() {
            info!(path = %path.display(), "No task store file yet, starting empty");
            return Ok(Self::new(max_retries));
        }
        let raw = std::fs::read_to_string(path)?;
        let tasks: HashMap<String, ScheduledTask> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), count = tasks.len(), "Loaded task store");
        Ok(Self { tasks, max_retries })
    }

    /// Persist the full store to `path` as JSON.
    pub fn save(&self, path: &Path) -> Result<(), TaskError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(&self.tasks)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Validate the request, assign a fresh task id and persist a pending record.
    pub fn schedule(&mut self, req: ScheduleRequest) -> Result<ScheduleReceipt, TaskError> {
        let scheduled_time = parse_scheduled_time(&req.datetime).map_err(|e| {
            warn!(raw = %req.datetime, "Rejected schedule request: unparseable datetime");
            e
        })?;

        let task_id = Uuid::new_v4().to_string();
        let task = ScheduledTask {
            task_id: task_id.clone(),
            task_type: TASK_TYPE_POST_CREATION.to_string(),
            scheduled_time,
            content: req.content,
            image: req.image,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            retry_count: 0,
            max_retries: self.max_retries,
            stages_completed: Vec::new(),
        };
        self.tasks.insert(task_id.clone(), task);

        info!(task_id = %task_id, scheduled_time = %scheduled_time, "Post creation scheduled");
        Ok(ScheduleReceipt {
            success: true,
            task_id,
            scheduled_time,
        })
    }

    /// Full report for one task, derived fields computed against `now`.
    /// Unknown ids yield `None`, never a panic.
    pub fn status_at(&self, task_id: &str, now: DateTime<Utc>) -> Option<TaskReport> {
        let task = self.tasks.get(task_id)?;

        let estimated_completion = match task.status {
            TaskStatus::Pending | TaskStatus::Running => {
                let remaining = (Stage::ALL.len() - task.stages_completed.len()) as i64;
                Some(now + Duration::seconds(remaining * STAGE_ESTIMATE_SECS))
            }
            _ => None,
        };

        Some(TaskReport {
            task_id: task.task_id.clone(),
            task_type: task.task_type.clone(),
            status: task.status,
            scheduled_time: task.scheduled_time,
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            retry_count: task.retry_count,
            max_retries: task.max_retries,
            error_message: task.error_message.clone(),
            is_running: task.status == TaskStatus::Running,
            pipeline_stages: Stage::ALL.iter().map(Stage::as_str).collect(),
            current_stage: task.current_stage().map(|s| s.as_str()),
            stages_completed: task.stages_completed.iter().map(Stage::as_str).collect(),
            estimated_completion,
        })
    }

    /// As [`TaskStore::status_at`], against the wall clock.
    pub fn status(&self, task_id: &str) -> Option<TaskReport> {
        self.status_at(task_id, Utc::now())
    }

    /// Direct read access to one record.
    pub fn get(&self, task_id: &str) -> Option<&ScheduledTask> {
        self.tasks.get(task_id)
    }

    /// Apply a lifecycle transition reported by the executor.
    pub fn advance(&mut self, task_id: &str, transition: Transition) -> Result<(), TaskError> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::UnknownTask(task_id.to_string()))?;

        if task.status.is_terminal() {
            return Err(TaskError::InvalidTransition {
                task_id: task_id.to_string(),
                from: task.status,
                detail: "task is in a terminal state".to_string(),
            });
        }

        match transition {
            Transition::Start => {
                if task.status != TaskStatus::Pending {
                    return Err(TaskError::InvalidTransition {
                        task_id: task_id.to_string(),
                        from: task.status,
                        detail: "only pending tasks can start".to_string(),
                    });
                }
                task.status = TaskStatus::Running;
                task.started_at = Some(Utc::now());
                info!(task_id = %task_id, "Task execution started");
            }
            Transition::StageCompleted(stage) => {
                if task.status != TaskStatus::Running {
                    return Err(TaskError::InvalidTransition {
                        task_id: task_id.to_string(),
                        from: task.status,
                        detail: format!("stage {stage} reported while not running"),
                    });
                }
                if task.stages_completed.contains(&stage) {
                    // Already recorded on an earlier attempt.
                    return Ok(());
                }
                let expected = Stage::ALL
                    .into_iter()
                    .find(|s| !task.stages_completed.contains(s));
                if expected != Some(stage) {
                    return Err(TaskError::InvalidTransition {
                        task_id: task_id.to_string(),
                        from: task.status,
                        detail: format!(
                            "stage {stage} out of order, expected {}",
                            expected.map(|s| s.as_str()).unwrap_or("none")
                        ),
                    });
                }
                task.stages_completed.push(stage);
                info!(task_id = %task_id, stage = %stage, "Pipeline stage completed");
            }
            Transition::Completed => {
                if task.status != TaskStatus::Running {
                    return Err(TaskError::InvalidTransition {
                        task_id: task_id.to_string(),
                        from: task.status,
                        detail: "only running tasks can complete".to_string(),
                    });
                }
                task.status = TaskStatus::Completed;
                task.completed_at = Some(Utc::now());
                info!(task_id = %task_id, "Task completed successfully");
            }
            Transition::AttemptFailed(message) => {
                if task.status != TaskStatus::Running {
                    return Err(TaskError::InvalidTransition {
                        task_id: task_id.to_string(),
                        from: task.status,
                        detail: "attempt failure reported while not running".to_string(),
                    });
                }
                if task.retry_count < task.max_retries {
                    task.retry_count += 1;
                }
                task.error_message = Some(message.clone());
                if task.retry_count >= task.max_retries {
                    task.status = TaskStatus::Failed;
                    task.completed_at = Some(Utc::now());
                    error!(
                        task_id = %task_id,
                        retries = task.retry_count,
                        error = %message,
                        "Task failed permanently"
                    );
                } else {
                    warn!(
                        task_id = %task_id,
                        attempt = task.retry_count,
                        max_retries = task.max_retries,
                        error = %message,
                        "Task attempt failed, will retry"
                    );
                }
            }
        }
        Ok(())
    }

    /// Cancel a non-terminal task. Returns the cancellation timestamp.
    pub fn cancel(&mut self, task_id: &str) -> Result<DateTime<Utc>, TaskError> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::UnknownTask(task_id.to_string()))?;

        if task.status.is_terminal() {
            return Err(TaskError::InvalidTransition {
                task_id: task_id.to_string(),
                from: task.status,
                detail: "task is in a terminal state".to_string(),
            });
        }

        let cancelled_at = Utc::now();
        task.status = TaskStatus::Cancelled;
        task.completed_at = Some(cancelled_at);
        info!(task_id = %task_id, "Task cancelled");
        Ok(cancelled_at)
    }

    /// All tasks, optionally filtered by status, sorted by scheduled time.
    pub fn list(&self, status_filter: Option<TaskStatus>) -> Vec<TaskSummary> {
        let mut entries: Vec<TaskSummary> = self
            .tasks
            .values()
            .filter(|t| status_filter.map_or(true, |s| t.status == s))
            .map(|t| TaskSummary {
                task_id: t.task_id.clone(),
                status: t.status,
                task_type: t.task_type.clone(),
                scheduled_time: t.scheduled_time,
                created_at: t.created_at,
                retry_count: t.retry_count,
                error_message: t.error_message.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.scheduled_time);
        entries
    }

    /// Ids of pending tasks whose scheduled time has passed, earliest first.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut due: Vec<&ScheduledTask> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && t.scheduled_time <= now)
            .collect();
        due.sort_by_key(|t| t.scheduled_time);
        due.into_iter().map(|t| t.task_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
