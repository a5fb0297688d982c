use postline_core::contract::{
    MockCopyWriter, MockIdeaGenerator, MockImageGenerator, MockPublisher, PostSubmission,
    PublishedPost,
};
use postline_core::pipeline::{run_post_pipeline, PipelineConfig, StageOutcome};
use postline_core::task::Stage;

const VALID_DRAFT: &str = "Here is a generated LinkedIn draft with comfortably more than ten \
words of professional, engaging copy about the chosen topic.";

fn publisher_expecting_image(expect_image: bool) -> MockPublisher {
    let mut publisher = MockPublisher::new();
    publisher
        .expect_publish()
        .returning(move |post: PostSubmission<'_>| {
            assert_eq!(post.image.is_some(), expect_image);
            Ok(PublishedPost {
                post_id: "urn:li:share:42".to_string(),
                had_image: post.image.is_some(),
            })
        });
    publisher
}

#[tokio::test]
async fn provided_content_and_image_publish_without_generation() {
    let ideas = MockIdeaGenerator::new();
    let writer = MockCopyWriter::new();
    let imager = MockImageGenerator::new();
    let publisher = publisher_expecting_image(true);

    let config = PipelineConfig {
        content: Some("Ready-made copy for the post, supplied by the caller directly.".to_string()),
        image: Some("generated_images/existing.png".to_string()),
        publish: true,
        ..PipelineConfig::default()
    };

    let outcome = run_post_pipeline(&config, &ideas, &writer, &imager, &publisher)
        .await
        .expect("pipeline should succeed");

    assert_eq!(outcome.post.as_ref().unwrap().post_id, "urn:li:share:42");
    assert!(outcome.post.unwrap().had_image);

    let outcomes: Vec<(Stage, StageOutcome)> = outcome
        .stages
        .iter()
        .map(|s| (s.stage, s.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            (Stage::ContentGeneration, StageOutcome::Skipped),
            (Stage::ImageGeneration, StageOutcome::Skipped),
            (Stage::LinkedinPosting, StageOutcome::Completed),
        ]
    );
}

#[tokio::test]
async fn topic_is_resolved_from_idea_generator_when_absent() {
    let mut ideas = MockIdeaGenerator::new();
    ideas
        .expect_generate_idea()
        .return_once(|_| Ok("Why small datasets beat big ones".to_string()));

    let mut writer = MockCopyWriter::new();
    writer.expect_draft_post().return_once(|topic, _style| {
        assert!(topic.contains("small datasets"), "resolved topic is passed through");
        Ok(VALID_DRAFT.to_string())
    });

    let imager = MockImageGenerator::new();
    let publisher = MockPublisher::new();

    let config = PipelineConfig {
        publish: false,
        ..PipelineConfig::default()
    };

    let outcome = run_post_pipeline(&config, &ideas, &writer, &imager, &publisher)
        .await
        .expect("pipeline should succeed without publishing");

    assert_eq!(
        outcome.topic.as_deref(),
        Some("Why small datasets beat big ones")
    );
    assert_eq!(outcome.content, VALID_DRAFT);
    assert!(outcome.post.is_none());
}

#[tokio::test]
async fn image_failure_is_tolerated_and_post_goes_out_without_image() {
    let ideas = MockIdeaGenerator::new();
    let writer = MockCopyWriter::new();

    let mut imager = MockImageGenerator::new();
    imager
        .expect_generate_image()
        .return_once(|_, _| Err("image provider down".into()));

    let publisher = publisher_expecting_image(false);

    let config = PipelineConfig {
        content: Some("Caller-supplied copy that is long enough to publish as-is today.".to_string()),
        generate_image: true,
        publish: true,
        ..PipelineConfig::default()
    };

    let outcome = run_post_pipeline(&config, &ideas, &writer, &imager, &publisher)
        .await
        .expect("image failure must not fail the run");

    assert!(outcome.image.is_none());
    let image_stage = outcome
        .stages
        .iter()
        .find(|s| s.stage == Stage::ImageGeneration)
        .unwrap();
    assert_eq!(image_stage.outcome, StageOutcome::Failed);
    assert!(image_stage.error.as_deref().unwrap().contains("image provider down"));
    assert!(outcome.post.unwrap().post_id.starts_with("urn:li:share:"));
}

#[tokio::test]
async fn publish_failure_is_fatal_with_stage_attribution() {
    let ideas = MockIdeaGenerator::new();
    let writer = MockCopyWriter::new();
    let imager = MockImageGenerator::new();

    let mut publisher = MockPublisher::new();
    publisher
        .expect_publish()
        .return_once(|_| Err("LinkedIn API returned status 401".into()));

    let config = PipelineConfig {
        content: Some("Copy that would otherwise be perfectly fine to publish right now.".to_string()),
        publish: true,
        ..PipelineConfig::default()
    };

    let failure = run_post_pipeline(&config, &ideas, &writer, &imager, &publisher)
        .await
        .expect_err("publish failure must fail the run");

    assert_eq!(failure.stage, Stage::LinkedinPosting);
    assert!(failure.error.contains("401"));
}

#[tokio::test]
async fn short_draft_is_rejected_when_fallback_disabled() {
    let ideas = MockIdeaGenerator::new();
    let mut writer = MockCopyWriter::new();
    writer
        .expect_draft_post()
        .return_once(|_, _| Ok("too short".to_string()));

    let imager = MockImageGenerator::new();
    let publisher = MockPublisher::new();

    let config = PipelineConfig {
        topic: Some("data quality".to_string()),
        publish: false,
        fallback_enabled: false,
        ..PipelineConfig::default()
    };

    let failure = run_post_pipeline(&config, &ideas, &writer, &imager, &publisher)
        .await
        .expect_err("an undersized draft must be rejected");

    assert_eq!(failure.stage, Stage::ContentGeneration);
    assert!(failure.error.contains("too short"));
}

#[tokio::test]
async fn failed_draft_falls_back_when_enabled() {
    let ideas = MockIdeaGenerator::new();
    let mut writer = MockCopyWriter::new();
    writer
        .expect_draft_post()
        .return_once(|_, _| Err("model overloaded".into()));

    let imager = MockImageGenerator::new();
    let publisher = MockPublisher::new();

    let config = PipelineConfig {
        topic: Some("data quality".to_string()),
        publish: false,
        fallback_enabled: true,
        ..PipelineConfig::default()
    };

    let outcome = run_post_pipeline(&config, &ideas, &writer, &imager, &publisher)
        .await
        .expect("fallback copy should rescue the run");

    assert!(outcome.content.contains("data quality"));
    let content_stage = outcome
        .stages
        .iter()
        .find(|s| s.stage == Stage::ContentGeneration)
        .unwrap();
    assert_eq!(content_stage.outcome, StageOutcome::Completed);
}
