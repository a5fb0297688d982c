#![allow(unused)]

//! # contract: Universal interfaces for the content pipeline collaborators
//!
//! This module defines the trait seams between the pipeline orchestration and
//! the external services it chains together: an idea/topic generator, a post
//! copy writer, an image generator and a publishing platform.
//!
//! ## Interface & Extensibility
//! - Implement [`IdeaGenerator`], [`CopyWriter`], [`ImageGenerator`] or
//!   [`Publisher`] to plug in new providers (API clients, local models,
//!   test doubles).
//! - All methods are async, returning results and using boxed error types.
//! - Error handling is uniform: all API/caller errors return boxed trait objects.
//! - Meant for both production code and robust mocking in tests.
//!
//! ## Mocking & Testing
//! - The traits are annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests.
//!
//! ## Adding New Providers
//! - Implement the trait for your provider.
//! - Convert all meaningful upstream errors to a boxed error.
//! - Return concrete, understandable error variants on user/config/connection issues.

use async_trait::async_trait;

use mockall::{automock, predicate::*};

/// Error type for generation traits (simple boxed error for now).
pub type GenerateError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for publishing (simple boxed error for now).
pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

/// Represents the minimal data needed to publish one post.
pub struct PostSubmission<'a> {
    /// The post copy, ready to publish.
    pub content: &'a str,
    /// Optional image artifact: a local file path or an http(s) URL.
    pub image: Option<&'a str>,
}

/// Represents the platform's record of a published post.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PublishedPost {
    /// Platform-assigned post identifier (e.g. a LinkedIn ugcPost id).
    pub post_id: String,
    /// Whether an image was attached to the published post.
    pub had_image: bool,
}

/// Trait for generating a single post topic idea.
/// Allows plugging in real, test, or mockable generators.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait IdeaGenerator: Send + Sync {
    /// Generate one topic idea, optionally steered by a custom prompt.
    /// Returns the bare topic text, cleaned of surrounding quotes.
    async fn generate_idea<'a>(&self, custom_prompt: Option<&'a str>)
        -> Result<String, GenerateError>;
}

/// Trait for drafting post copy for a given topic.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CopyWriter: Send + Sync {
    /// Draft post copy for the topic, optionally overriding the configured style.
    async fn draft_post<'a>(
        &self,
        topic: &'a str,
        style: Option<&'a str>,
    ) -> Result<String, GenerateError>;
}

/// Trait for generating an image artifact for a post.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for the given content description and return the
    /// path of the stored artifact.
    async fn generate_image<'a>(
        &self,
        description: &'a str,
        style: Option<&'a str>,
    ) -> Result<String, GenerateError>;
}

/// Trait for publishing a post to the target platform.
/// The implementor is responsible for authentication, media upload and the
/// platform's post-creation sequence.
///
/// The trait is `Send` + `Sync` and intended for async/await usage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a post with optional image. Returns the platform's record of
    /// the created post.
    async fn publish<'a>(
        &self,
        post: PostSubmission<'a>,
    ) -> Result<PublishedPost, PublishError>;
}
