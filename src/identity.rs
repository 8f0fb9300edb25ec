//! Player/cat name lookup against the game's REST backend.
//!
//! Names are resolved once per join, before any pool or room lock is taken.
//! A failed lookup never blocks a join: the player gets placeholder names.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::parse_env;
use crate::types::{CatId, PlayerId};

/// Result type for identity lookups
pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response parsing failed: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Names shown to the other players in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub display_name: String,
    pub avatar_name: String,
}

impl Identity {
    /// Stand-in names used when the backend can't tell us who this is
    pub fn placeholder(player_id: &str, cat_id: &str) -> Self {
        Self {
            display_name: format!("Player {}", short_id(player_id)),
            avatar_name: format!("Cat {}", short_id(cat_id)),
        }
    }
}

fn short_id(id: &str) -> String {
    id.chars().take(6).collect()
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, player_id: &str, cat_id: &str) -> IdentityResult<Identity>;

    fn name(&self) -> &str;
}

/// Resolve a joining player's names, degrading to placeholders on any failure
pub async fn resolve_or_placeholder(
    resolver: &dyn IdentityResolver,
    player_id: &str,
    cat_id: &str,
) -> Identity {
    match resolver.resolve(player_id, cat_id).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(
                "Identity lookup via {} failed for {}/{}: {}, using placeholder",
                resolver.name(),
                player_id,
                cat_id,
                e
            );
            Identity::placeholder(player_id, cat_id)
        }
    }
}

/// Looks names up over HTTP:
/// `GET {base}/players/{player_id}` and `GET {base}/cats/{cat_id}`, both answering `{"name": ...}`
pub struct HttpIdentityResolver {
    base_url: reqwest::Url,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct NameRecord {
    name: String,
}

impl HttpIdentityResolver {
    pub fn new(base_url: String, timeout: Duration) -> IdentityResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::ConfigError(e.to_string()))?;

        let base_url = reqwest::Url::parse(base_url.trim())
            .map_err(|e| IdentityError::ConfigError(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(IdentityError::ConfigError(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            timeout,
            client,
        })
    }

    /// `{base}/{collection}/{id}` with the id kept as a single path segment
    fn endpoint(&self, collection: &str, id: &str) -> IdentityResult<reqwest::Url> {
        // Dot segments would be dropped instead of encoded
        if matches!(id, "." | "..") {
            return Err(IdentityError::NotFound(format!("{} {:?}", collection, id)));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IdentityError::ConfigError(self.base_url.to_string()))?
            .pop_if_empty()
            .push(collection)
            .push(id);
        Ok(url)
    }

    async fn fetch_name(&self, url: reqwest::Url) -> IdentityResult<String> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                IdentityError::Timeout(self.timeout)
            } else {
                IdentityError::ApiError(e.to_string())
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(IdentityError::NotFound(url.to_string()));
        }
        if !response.status().is_success() {
            return Err(IdentityError::ApiError(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let record: NameRecord = response
            .json()
            .await
            .map_err(|e| IdentityError::ParseError(e.to_string()))?;

        Ok(record.name)
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve(&self, player_id: &str, cat_id: &str) -> IdentityResult<Identity> {
        let player_url = self.endpoint("players", player_id)?;
        let cat_url = self.endpoint("cats", cat_id)?;
        let (display_name, avatar_name) =
            futures::try_join!(self.fetch_name(player_url), self.fetch_name(cat_url))?;

        Ok(Identity {
            display_name,
            avatar_name,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Fixed in-memory name table, for local play and tests
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    players: HashMap<PlayerId, String>,
    cats: HashMap<CatId, String>,
}

impl StaticIdentityResolver {
    pub fn with_player(mut self, player_id: &str, name: &str) -> Self {
        self.players.insert(player_id.to_string(), name.to_string());
        self
    }

    pub fn with_cat(mut self, cat_id: &str, name: &str) -> Self {
        self.cats.insert(cat_id.to_string(), name.to_string());
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, player_id: &str, cat_id: &str) -> IdentityResult<Identity> {
        let display_name = self
            .players
            .get(player_id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(format!("player {}", player_id)))?;
        let avatar_name = self
            .cats
            .get(cat_id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(format!("cat {}", cat_id)))?;

        Ok(Identity {
            display_name,
            avatar_name,
        })
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Configuration for the identity backend
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Base URL of the REST backend (None = names are always placeholders)
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(3),
        }
    }
}

impl IdentityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let base_url = std::env::var("IDENTITY_BASE_URL").ok().and_then(|url| {
            let trimmed = url.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });

        let timeout = match parse_env::<u64>("IDENTITY_TIMEOUT_SECS") {
            Ok(Some(secs)) => Duration::from_secs(secs),
            Ok(None) => Self::default().timeout,
            Err(e) => {
                tracing::warn!("{}, using default", e);
                Self::default().timeout
            }
        };

        Self { base_url, timeout }
    }

    pub fn build_resolver(&self) -> IdentityResult<Arc<dyn IdentityResolver>> {
        match &self.base_url {
            Some(base_url) => Ok(Arc::new(HttpIdentityResolver::new(
                base_url.clone(),
                self.timeout,
            )?)),
            None => {
                tracing::warn!("IDENTITY_BASE_URL not set, players will get placeholder names");
                Ok(Arc::new(StaticIdentityResolver::default()))
            }
        }
    }
}
