//! Prompt composition and post copy validation.
//!
//! Builds the prompts sent to the text/image generation collaborators and
//! applies the platform's copy limits to generated drafts. The post prompt
//! can be overridden from a file; everything else is composed in-memory.

use std::fmt;
use std::path::Path;

use tracing::{info, warn};

/// Word/character limits applied to generated post copy.
const MIN_WORDS: usize = 10;
const MAX_WORDS: usize = 500;
const MAX_CHARS: usize = 3000;

/// System prompt used for all text generation calls.
pub const SYSTEM_PROMPT: &str = "You are a professional LinkedIn content creator.";

/// Default prompt for generating a single post topic idea.
pub const DEFAULT_IDEA_PROMPT: &str = "\
You are an expert LinkedIn strategist for a personal brand focused on economics, \
data analytics, and small economies.

Generate 1 specific content idea or post topic that:
- Starts with a strong, one-sentence hook
- Solves or reflects on a common problem in data, development, or leadership
- Aligns with principles like integrity, innovation, and growth mindset
- Includes practical insights or relatable anecdotes
- Is relevant to professionals in economics, analytics, or policymaking
- Is optimized for SEO and engagement on LinkedIn

Avoid vague themes. Focus on niche, practical, thought-leader-level insights.

Return ONLY the topic/title of the content idea, nothing else.";

/// Default base prompt for drafting post copy, used when no prompts file is
/// configured or the configured file cannot be read.
pub const DEFAULT_POST_PROMPT: &str = "\
Create a professional LinkedIn post that:
- Is engaging and thought-provoking
- Uses a professional yet conversational tone
- Includes relevant hashtags
- Encourages engagement
- Is between 100-300 words
- Has a clear call-to-action";

/// Tone and style applied to drafted copy.
#[derive(Debug, Clone)]
pub struct StyleProfile {
    pub tone: String,
    pub style: String,
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self {
            tone: "professional".to_string(),
            style: "engaging".to_string(),
        }
    }
}

/// Load the base post prompt, preferring the configured file when readable.
pub fn load_post_prompt(prompts_file: Option<&Path>) -> String {
    match prompts_file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(content) => {
                info!(path = %path.display(), "Loaded post prompt from file");
                content
            }
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "Prompts file unreadable, using default");
                DEFAULT_POST_PROMPT.to_string()
            }
        },
        None => DEFAULT_POST_PROMPT.to_string(),
    }
}

/// Compose the full drafting prompt for a topic.
pub fn compose_post_prompt(
    base_prompt: &str,
    topic: &str,
    style: &str,
    tone: &str,
) -> String {
    format!(
        "{base_prompt}\n\n\
         Topic: {topic}\n\
         Style: {style}\n\
         Tone: {tone}\n\n\
         Generate a LinkedIn post about the given topic that follows the style and tone \
         requirements. Make it authentic, valuable, and engaging for a professional audience."
    )
}

/// Compose the image-generation prompt for a content summary.
pub fn compose_image_prompt(content_summary: &str, style: Option<&str>) -> String {
    let style = style.unwrap_or("professional business");
    format!(
        "Create a professional, LinkedIn-appropriate image for a post about: {content_summary}\n\n\
         Style: {style}\n\
         Requirements:\n\
         - Professional and clean design\n\
         - Suitable for business social media\n\
         - Eye-catching but not overly flashy\n\
         - Include relevant visual metaphors\n\
         - Use corporate-friendly colors\n\
         - Avoid text overlays (text will be in the post)\n\
         - High quality and visually appealing\n\
         - Appropriate for professional networking"
    )
}

/// Basic stats collected while validating a draft.
#[derive(Debug, Clone, Copy)]
pub struct CopyStats {
    pub word_count: usize,
    pub char_count: usize,
}

/// Why a draft was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyRejection {
    Empty,
    TooShort(usize),
    TooLong(usize),
    OverCharLimit(usize),
}

impl fmt::Display for CopyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyRejection::Empty => write!(f, "content is empty"),
            CopyRejection::TooShort(words) => {
                write!(f, "content too short ({words} words, minimum {MIN_WORDS})")
            }
            CopyRejection::TooLong(words) => {
                write!(f, "content too long for LinkedIn ({words} words, maximum {MAX_WORDS})")
            }
            CopyRejection::OverCharLimit(chars) => {
                write!(f, "exceeds LinkedIn character limit ({chars} chars, maximum {MAX_CHARS})")
            }
        }
    }
}

impl std::error::Error for CopyRejection {}

/// Apply the platform limits to a generated draft.
pub fn validate_post_copy(content: &str) -> Result<CopyStats, CopyRejection> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CopyRejection::Empty);
    }

    let word_count = trimmed.split_whitespace().count();
    let char_count = trimmed.chars().count();

    if word_count < MIN_WORDS {
        return Err(CopyRejection::TooShort(word_count));
    }
    if word_count > MAX_WORDS {
        return Err(CopyRejection::TooLong(word_count));
    }
    if char_count > MAX_CHARS {
        return Err(CopyRejection::OverCharLimit(char_count));
    }

    Ok(CopyStats {
        word_count,
        char_count,
    })
}

/// Deterministic stand-in copy used when generation fails and fallback is
/// enabled in configuration.
pub fn fallback_post_copy(topic: &str) -> String {
    let hashtag: String = topic.split_whitespace().collect();
    format!(
        "💡 Thoughts on {topic}\n\n\
         In today's rapidly evolving professional landscape, understanding {topic} has become \
         increasingly important.\n\n\
         Key considerations:\n\
         • Impact on industry practices\n\
         • Future implications\n\
         • Actionable insights\n\n\
         What's your experience with {topic}? Share your thoughts below! 👇\n\n\
         #LinkedIn #Professional #Growth #{hashtag}"
    )
}
