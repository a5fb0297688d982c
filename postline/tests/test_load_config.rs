use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use postline::load_config::{load_config, load_config_or_default};

/// This test ensures that a minimal config file loads with every default filled in.
#[test]
fn test_load_config_minimal_file_uses_defaults() {
    let config_yaml = "{}\n";
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.schedule.max_retries, 3);
    assert_eq!(config.schedule.retry_delay_secs, 300);
    assert_eq!(config.schedule.poll_interval_secs, 30);
    assert_eq!(config.content.tone, "professional");
    assert_eq!(config.content.style, "engaging");
    assert!(config.content.fallback_enabled);
    assert_eq!(config.openai.text_model, "gpt-4-turbo-preview");
    assert_eq!(config.openai.image_model, "dall-e-2");
    assert_eq!(config.images.output_dir, PathBuf::from("generated_images"));
    assert_eq!(config.store.path, PathBuf::from("postline_tasks.json"));
}

/// This test ensures that explicitly configured fields override the defaults.
#[test]
fn test_load_config_overrides_are_applied() {
    let config_yaml = r#"
schedule:
  max_retries: 5
  retry_delay_secs: 60
  poll_interval_secs: 10
content:
  tone: witty
  style: punchy
  prompts_file: ./prompts_linkedin_post.txt
  fallback_enabled: false
openai:
  text_model: gpt-4o
  image_model: dall-e-3
  image_size: 512x512
  image_quality: hd
images:
  output_dir: ./tmp/images
store:
  path: ./tmp/tasks.json
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.schedule.max_retries, 5);
    assert_eq!(config.schedule.retry_delay_secs, 60);
    assert_eq!(config.schedule.poll_interval_secs, 10);
    assert_eq!(config.content.tone, "witty");
    assert_eq!(config.content.style, "punchy");
    assert_eq!(
        config.content.prompts_file,
        Some(PathBuf::from("./prompts_linkedin_post.txt"))
    );
    assert!(!config.content.fallback_enabled);
    assert_eq!(config.openai.text_model, "gpt-4o");
    assert_eq!(config.openai.image_model, "dall-e-3");
    assert_eq!(config.openai.image_size, "512x512");
    assert_eq!(config.openai.image_quality, "hd");
    assert_eq!(config.images.output_dir, PathBuf::from("./tmp/images"));
    assert_eq!(config.store.path, PathBuf::from("./tmp/tasks.json"));
}

/// This test ensures that if the config file is not valid YAML, load_config
/// errors and reports as such.
#[test]
fn test_load_config_errors_for_invalid_file() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"not-yaml: [:::").unwrap();

    let err = load_config(config_file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

/// This test ensures that a missing file is reported as a read failure.
#[test]
fn test_load_config_errors_for_missing_file() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(
        err.to_string().contains("read"),
        "Read error expected, got: {err}"
    );
}

/// Passing no path at all yields the built-in defaults.
#[test]
fn test_load_config_or_default_without_path() {
    let config = load_config_or_default(None).expect("defaults should load");
    assert_eq!(config.schedule.max_retries, 3);
    assert_eq!(config.store.path, PathBuf::from("postline_tasks.json"));
}
