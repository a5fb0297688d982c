#![doc = "LinkedIn integration for CLI and core: bridges the Publisher trait abstraction to the LinkedIn REST API."]
//
//! # Publisher Integration (CLI <-> Core)
//!
//! This module provides the bridge between the CLI workflow and the publish
//! abstraction in [`postline_core::contract`]. It wires up the [`Publisher`]
//! trait for real use against the LinkedIn API, and provides the
//! `LinkedInClient` used by the CLI for networked posting.
//!
//! ## OAuth
//!
//! - [`OAuthHandler`] exchanges an authorization code for tokens against
//!   LinkedIn's token endpoint, persists them as JSON on disk with an
//!   `expires_at` stamp, and refreshes them when expired.
//! - A legacy `LINKEDIN_ACCESS_TOKEN` environment variable is honoured as a
//!   fallback when no OAuth credentials are configured.
//!
//! ## Publish flow
//!
//! `publish` follows the platform's posting sequence: resolve a valid access
//! token, fetch the member id from the userinfo endpoint, optionally register
//! and upload an image asset, then create the ugcPost.

use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use postline_core::contract::{PostSubmission, PublishError, PublishedPost, Publisher};

const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const USERINFO_URL: &str = "https://api.linkedin.com/v2/userinfo";
const REGISTER_UPLOAD_URL: &str = "https://api.linkedin.com/v2/assets?action=registerUpload";
const UGC_POSTS_URL: &str = "https://api.linkedin.com/v2/ugcPosts";

const DEFAULT_TOKEN_PATH: &str = "assets/linkedin_tokens.json";

/// Tokens are treated as expired this many seconds early.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Persisted OAuth token material, as returned by LinkedIn plus our own
/// absolute expiry stamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Handles the LinkedIn OAuth code exchange, refresh and on-disk persistence.
pub struct OAuthHandler {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_path: PathBuf,
    tokens: TokenData,
}

impl OAuthHandler {
    /// Construct from `LINKEDIN_CLIENT_ID`, `LINKEDIN_CLIENT_SECRET` and
    /// `LINKEDIN_CALLBACK_URL`; token storage path overridable via
    /// `LINKEDIN_TOKEN_PATH`.
    pub fn from_env() -> Result<Self, PublishError> {
        dotenvy::dotenv().ok();
        let client_id = env::var("LINKEDIN_CLIENT_ID")
            .map_err(|e| -> PublishError { format!("LINKEDIN_CLIENT_ID missing: {e}").into() })?;
        let client_secret = env::var("LINKEDIN_CLIENT_SECRET").map_err(|e| -> PublishError {
            format!("LINKEDIN_CLIENT_SECRET missing: {e}").into()
        })?;
        let redirect_uri = env::var("LINKEDIN_CALLBACK_URL").map_err(|e| -> PublishError {
            format!("LINKEDIN_CALLBACK_URL missing: {e}").into()
        })?;
        let token_path = env::var("LINKEDIN_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_PATH));

        let tokens = Self::load_tokens(&token_path);
        tracing::info!(
            token_path = %token_path.display(),
            has_access_token = tokens.access_token.is_some(),
            "Initialized LinkedIn OAuth handler from environment"
        );

        Ok(Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            redirect_uri,
            token_path,
            tokens,
        })
    }

    fn load_tokens(path: &Path) -> TokenData {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(tokens) => tokens,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = ?e, "Token file unreadable, starting without tokens");
                    TokenData::default()
                }
            },
            Err(_) => TokenData::default(),
        }
    }

    fn save_tokens(&self) -> std::io::Result<()> {
        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(&self.tokens)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.token_path, raw)
    }

    /// Exchange an authorization code for tokens and persist them.
    pub async fn exchange_code(&mut self, code: &str) -> Result<TokenData, PublishError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "LinkedIn token exchange failed");
            return Err(format!("LinkedIn token exchange returned status {status}: {text}").into());
        }

        let mut tokens: TokenData = response.json().await?;
        tokens.expires_at = tokens
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs - TOKEN_EXPIRY_MARGIN_SECS));
        self.tokens = tokens.clone();
        if let Err(e) = self.save_tokens() {
            tracing::warn!(error = ?e, "Could not persist LinkedIn tokens");
        }
        tracing::info!("LinkedIn token exchange successful");
        Ok(tokens)
    }

    /// Refresh the access token using the stored refresh token.
    pub async fn refresh_access_token(&mut self) -> Result<TokenData, PublishError> {
        let refresh_token = self
            .tokens
            .refresh_token
            .clone()
            .ok_or("no refresh token available")?;

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("LinkedIn token refresh returned status {status}: {text}").into());
        }

        let mut tokens: TokenData = response.json().await?;
        tokens.expires_at = tokens
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs - TOKEN_EXPIRY_MARGIN_SECS));
        // Keep the old refresh token if the response omitted one.
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token);
        }
        self.tokens = tokens.clone();
        if let Err(e) = self.save_tokens() {
            tracing::warn!(error = ?e, "Could not persist LinkedIn tokens");
        }
        tracing::info!("LinkedIn access token refreshed");
        Ok(tokens)
    }

    fn is_token_expired(&self) -> bool {
        match self.tokens.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => true,
        }
    }

    /// A currently-valid access token, refreshing first when expired.
    pub async fn valid_access_token(&mut self) -> Option<String> {
        self.tokens.access_token.as_ref()?;
        if self.is_token_expired() {
            tracing::info!("LinkedIn access token expired, attempting refresh");
            if let Err(e) = self.refresh_access_token().await {
                tracing::warn!(error = %e, "LinkedIn token refresh failed");
                return None;
            }
        }
        self.tokens.access_token.clone()
    }
}

/// Client publishing posts to LinkedIn. Prefers OAuth-managed tokens and
/// falls back to a static `LINKEDIN_ACCESS_TOKEN` from the environment.
pub struct LinkedInClient {
    http: reqwest::Client,
    oauth: Option<Mutex<OAuthHandler>>,
    fallback_token: Option<String>,
}

impl LinkedInClient {
    pub fn new_from_env() -> Self {
        dotenvy::dotenv().ok();
        let oauth = match OAuthHandler::from_env() {
            Ok(handler) => Some(Mutex::new(handler)),
            Err(e) => {
                tracing::warn!(error = %e, "LinkedIn OAuth credentials not found, using legacy token method");
                None
            }
        };
        let fallback_token = env::var("LINKEDIN_ACCESS_TOKEN").ok();
        if oauth.is_none() && fallback_token.is_none() {
            tracing::warn!("No LinkedIn credentials configured, publishing will fail");
        }
        Self {
            http: reqwest::Client::new(),
            oauth,
            fallback_token,
        }
    }

    async fn access_token(&self) -> Option<String> {
        if let Some(oauth) = &self.oauth {
            if let Some(token) = oauth.lock().await.valid_access_token().await {
                return Some(token);
            }
        }
        self.fallback_token.clone()
    }

    /// Member id from the userinfo endpoint (the `sub` claim).
    async fn member_id(&self, access_token: &str) -> Result<String, PublishError> {
        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("LinkedIn userinfo returned status {status}").into());
        }

        let body: serde_json::Value = response.json().await?;
        body.get("sub")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| "LinkedIn userinfo response had no member id".into())
    }

    /// Register an image upload; returns the asset URN and the upload URL.
    async fn register_image_upload(
        &self,
        access_token: &str,
        member_id: &str,
    ) -> Result<(String, String), PublishError> {
        let payload = json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                "owner": format!("urn:li:person:{member_id}"),
                "serviceRelationships": [
                    {
                        "relationshipType": "OWNER",
                        "identifier": "urn:li:userGeneratedContent"
                    }
                ]
            }
        });

        let response = self
            .http
            .post(REGISTER_UPLOAD_URL)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("LinkedIn upload registration returned status {status}").into());
        }

        let body: serde_json::Value = response.json().await?;
        let asset_urn = body
            .pointer("/value/asset")
            .and_then(|v| v.as_str())
            .ok_or("upload registration response had no asset URN")?
            .to_string();
        let upload_url = body
            .pointer(
                "/value/uploadMechanism/com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest/uploadUrl",
            )
            .and_then(|v| v.as_str())
            .ok_or("upload registration response had no upload URL")?
            .to_string();

        tracing::info!(asset = %asset_urn, "Image upload registered");
        Ok((asset_urn, upload_url))
    }

    /// Image bytes from a local file or an http(s) URL.
    async fn image_bytes(&self, image: &str) -> Result<Vec<u8>, PublishError> {
        if image.starts_with("http://") || image.starts_with("https://") {
            let response = self.http.get(image).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(format!("image download returned status {status}").into());
            }
            Ok(response.bytes().await?.to_vec())
        } else {
            tokio::fs::read(image)
                .await
                .map_err(|e| -> PublishError { format!("image file {image:?} unreadable: {e}").into() })
        }
    }

    async fn upload_image_binary(
        &self,
        upload_url: &str,
        access_token: &str,
        bytes: Vec<u8>,
    ) -> Result<(), PublishError> {
        let response = self
            .http
            .put(upload_url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            return Err(format!("image upload returned status {status}").into());
        }
        tracing::info!("Image uploaded successfully");
        Ok(())
    }

    /// Create the ugcPost, with or without an attached image asset.
    async fn create_post(
        &self,
        access_token: &str,
        member_id: &str,
        text: &str,
        asset_urn: Option<&str>,
    ) -> Result<PublishedPost, PublishError> {
        let specific_content = match asset_urn {
            Some(asset) => json!({
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": text },
                    "shareMediaCategory": "IMAGE",
                    "media": [
                        {
                            "status": "READY",
                            "description": { "text": "Generated image for LinkedIn post" },
                            "media": asset,
                            "title": { "text": "LinkedIn Post Image" }
                        }
                    ]
                }
            }),
            None => json!({
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": text },
                    "shareMediaCategory": "NONE"
                }
            }),
        };

        let payload = json!({
            "author": format!("urn:li:person:{member_id}"),
            "lifecycleState": "PUBLISHED",
            "specificContent": specific_content,
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
            }
        });

        let response = self
            .http
            .post(UGC_POSTS_URL)
            .bearer_auth(access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "LinkedIn post creation failed");
            return Err(format!("LinkedIn API returned status {status}: {text}").into());
        }

        let body: serde_json::Value = response.json().await?;
        let post_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        tracing::info!(post_id = %post_id, "Post created successfully");
        Ok(PublishedPost {
            post_id,
            had_image: asset_urn.is_some(),
        })
    }
}

#[async_trait]
impl Publisher for LinkedInClient {
    async fn publish<'a>(
        &self,
        post: PostSubmission<'a>,
    ) -> Result<PublishedPost, PublishError> {
        let access_token = self
            .access_token()
            .await
            .ok_or("LinkedIn access token not configured")?;

        let member_id = self.member_id(&access_token).await?;
        tracing::info!(member_id = %member_id, has_image = post.image.is_some(), "Publishing post");

        let asset_urn = match post.image {
            Some(image) => {
                let (asset_urn, upload_url) =
                    self.register_image_upload(&access_token, &member_id).await?;
                let bytes = self.image_bytes(image).await?;
                self.upload_image_binary(&upload_url, &access_token, bytes)
                    .await?;
                Some(asset_urn)
            }
            None => None,
        };

        self.create_post(&access_token, &member_id, post.content, asset_urn.as_deref())
            .await
    }
}
