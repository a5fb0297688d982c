use chrono::Utc;
use tempfile::tempdir;

use postline_core::task::{
    ScheduleRequest, Stage, TaskError, TaskStatus, TaskStore, Transition,
};

fn schedule_one(store: &mut TaskStore, datetime: &str) -> String {
    let receipt = store
        .schedule(ScheduleRequest {
            datetime: datetime.to_string(),
            content: "A post about prefix-free codes and why they matter.".to_string(),
            image: None,
        })
        .expect("valid datetime should schedule");
    assert!(receipt.success);
    receipt.task_id
}

#[test]
fn schedule_with_valid_datetime_is_immediately_pending() {
    let mut store = TaskStore::default();
    let task_id = schedule_one(&mut store, "2026-09-01T09:30:00Z");

    let report = store.status(&task_id).expect("task should be found");
    assert_eq!(report.status, TaskStatus::Pending);
    assert_eq!(report.task_type, "post_creation");
    assert!(!report.is_running);
    assert!(report.started_at.is_none());
    assert!(report.completed_at.is_none());
    assert_eq!(report.retry_count, 0);
    assert!(report.stages_completed.is_empty());
    assert_eq!(
        report.pipeline_stages,
        vec!["content_generation", "image_generation", "linkedin_posting"]
    );
}

#[test]
fn schedule_accepts_naive_datetime_as_utc() {
    let mut store = TaskStore::default();
    let task_id = schedule_one(&mut store, "2026-09-01T09:30:00");
    let report = store.status(&task_id).expect("task should be found");
    assert_eq!(report.scheduled_time.to_rfc3339(), "2026-09-01T09:30:00+00:00");
}

#[test]
fn schedule_rejects_malformed_datetime_and_creates_no_record() {
    let mut store = TaskStore::default();
    let err = store
        .schedule(ScheduleRequest {
            datetime: "not-a-date".to_string(),
            content: "irrelevant".to_string(),
            image: None,
        })
        .expect_err("malformed datetime must be rejected");

    assert!(matches!(err, TaskError::InvalidDateTime(_)));
    assert!(store.is_empty(), "no record may be created on rejection");
}

#[test]
fn status_of_unknown_task_is_not_found() {
    let store = TaskStore::default();
    assert!(store.status("no-such-task").is_none());
}

#[test]
fn completed_task_has_ordered_timestamps() {
    let mut store = TaskStore::default();
    let task_id = schedule_one(&mut store, "2026-09-01T09:30:00Z");

    store.advance(&task_id, Transition::Start).unwrap();
    for stage in Stage::ALL {
        store
            .advance(&task_id, Transition::StageCompleted(stage))
            .unwrap();
    }
    store.advance(&task_id, Transition::Completed).unwrap();

    let report = store.status(&task_id).unwrap();
    assert_eq!(report.status, TaskStatus::Completed);
    let started = report.started_at.expect("started_at must be set");
    let completed = report.completed_at.expect("completed_at must be set");
    assert!(started <= completed, "started_at must not exceed completed_at");
    assert!(report.estimated_completion.is_none());
}

#[test]
fn running_task_reports_current_stage_and_estimate() {
    let mut store = TaskStore::default();
    let task_id = schedule_one(&mut store, "2026-09-01T09:30:00Z");

    store.advance(&task_id, Transition::Start).unwrap();
    store
        .advance(&task_id, Transition::StageCompleted(Stage::ContentGeneration))
        .unwrap();

    let now = Utc::now();
    let report = store.status_at(&task_id, now).unwrap();
    assert!(report.is_running);
    assert_eq!(report.current_stage, Some("image_generation"));
    assert_eq!(report.stages_completed, vec!["content_generation"]);
    let estimate = report
        .estimated_completion
        .expect("running task must carry an estimate");
    assert!(estimate > now);
}

#[test]
fn stages_must_complete_in_declared_order() {
    let mut store = TaskStore::default();
    let task_id = schedule_one(&mut store, "2026-09-01T09:30:00Z");
    store.advance(&task_id, Transition::Start).unwrap();

    let err = store
        .advance(&task_id, Transition::StageCompleted(Stage::LinkedinPosting))
        .expect_err("out-of-order stage must be rejected");
    assert!(matches!(err, TaskError::InvalidTransition { .. }));

    // In-order progression is accepted, and repeats are idempotent.
    store
        .advance(&task_id, Transition::StageCompleted(Stage::ContentGeneration))
        .unwrap();
    store
        .advance(&task_id, Transition::StageCompleted(Stage::ContentGeneration))
        .unwrap();

    let report = store.status(&task_id).unwrap();
    assert_eq!(report.stages_completed, vec!["content_generation"]);
}

#[test]
fn retry_count_is_capped_before_settling_into_failed() {
    let mut store = TaskStore::new(3);
    let task_id = schedule_one(&mut store, "2026-09-01T09:30:00Z");
    store.advance(&task_id, Transition::Start).unwrap();

    for attempt in 1..=3 {
        store
            .advance(
                &task_id,
                Transition::AttemptFailed(format!("attempt {attempt} blew up")),
            )
            .unwrap();
        let task = store.get(&task_id).unwrap();
        assert!(task.retry_count <= task.max_retries);
    }

    let report = store.status(&task_id).unwrap();
    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.retry_count, 3);
    assert_eq!(report.error_message.as_deref(), Some("attempt 3 blew up"));
    assert!(report.completed_at.is_some());

    // Terminal: nothing further is accepted.
    let err = store
        .advance(&task_id, Transition::AttemptFailed("again".to_string()))
        .expect_err("terminal task must reject transitions");
    assert!(matches!(err, TaskError::InvalidTransition { .. }));
}

#[test]
fn cancel_is_terminal_and_rejected_twice() {
    let mut store = TaskStore::default();
    let task_id = schedule_one(&mut store, "2026-09-01T09:30:00Z");

    let cancelled_at = store.cancel(&task_id).expect("pending task can be cancelled");
    let report = store.status(&task_id).unwrap();
    assert_eq!(report.status, TaskStatus::Cancelled);
    assert_eq!(report.completed_at, Some(cancelled_at));

    assert!(store.cancel(&task_id).is_err(), "cancelling twice must fail");
    assert!(
        store.advance(&task_id, Transition::Start).is_err(),
        "cancelled task must not start"
    );
}

#[test]
fn cancel_unknown_task_reports_not_found() {
    let mut store = TaskStore::default();
    let err = store.cancel("missing").expect_err("unknown id must fail");
    assert!(matches!(err, TaskError::UnknownTask(_)));
}

#[test]
fn list_filters_by_status_and_sorts_by_scheduled_time() {
    let mut store = TaskStore::default();
    let late = schedule_one(&mut store, "2026-09-02T09:00:00Z");
    let early = schedule_one(&mut store, "2026-09-01T09:00:00Z");
    store.cancel(&late).unwrap();

    let all = store.list(None);
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].task_id, early, "earliest scheduled task comes first");

    let pending = store.list(Some(TaskStatus::Pending));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].task_id, early);
}

#[test]
fn due_returns_only_pending_tasks_past_their_time() {
    let mut store = TaskStore::default();
    let past = schedule_one(&mut store, "2020-01-01T00:00:00Z");
    let future = schedule_one(&mut store, "2100-01-01T00:00:00Z");
    let cancelled = schedule_one(&mut store, "2020-06-01T00:00:00Z");
    store.cancel(&cancelled).unwrap();

    let due = store.due(Utc::now());
    assert_eq!(due, vec![past]);
    assert!(store.status(&future).is_some());
}

#[test]
fn store_round_trips_through_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tasks.json");

    let mut store = TaskStore::default();
    let task_id = schedule_one(&mut store, "2026-09-01T09:30:00Z");
    store.advance(&task_id, Transition::Start).unwrap();
    store
        .advance(&task_id, Transition::StageCompleted(Stage::ContentGeneration))
        .unwrap();
    store.save(&path).expect("save should succeed");

    let reloaded = TaskStore::load(&path, 3).expect("load should succeed");
    assert_eq!(reloaded.len(), 1);
    let report = reloaded.status(&task_id).expect("task survives reload");
    assert_eq!(report.status, TaskStatus::Running);
    assert_eq!(report.stages_completed, vec!["content_generation"]);
}

#[test]
fn load_of_missing_file_yields_empty_store() {
    let dir = tempdir().unwrap();
    let store = TaskStore::load(&dir.path().join("absent.json"), 3).unwrap();
    assert!(store.is_empty());
}
