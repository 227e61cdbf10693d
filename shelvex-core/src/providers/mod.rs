//! Online metadata provider seam.
//!
//! The engine never performs HTTP itself: concrete TMDB/TVDB-style
//! clients live outside the core and implement [`MetadataProvider`].
//! The engine only consumes a provider's single best match, and a
//! disabled or failing provider degrades to "no online signal" without
//! affecting offline classification.

use std::collections::HashMap;

use async_trait::async_trait;
use shelvex_model::{ExternalIds, UnitKind};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider request failed: {0}")]
    Request(String),
}

/// Query sent to a provider: whatever the offline pipeline knows so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchQuery {
    pub title: Option<String>,
    pub year: Option<u16>,
    pub ids: ExternalIds,
    pub kind: UnitKind,
}

/// A provider's single best match for a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BestMatch {
    pub title: String,
    pub year: Option<u16>,
    pub ids: ExternalIds,
    /// Episode titles keyed by (season, episode), for shows.
    pub episode_titles: HashMap<(u16, u16), String>,
}

/// Implemented by concrete metadata clients. Rate limiting and caching
/// are the provider's own responsibility.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Return zero-or-one best match for the query.
    async fn best_match(&self, query: &MatchQuery) -> Result<Option<BestMatch>, ProviderError>;
}

/// Fans a query out to the configured providers in order and returns the
/// first match. Failures are logged and skipped so offline classification
/// is never blocked on a provider.
pub struct ProviderManager {
    providers: Vec<Box<dyn MetadataProvider>>,
    enabled: bool,
}

impl ProviderManager {
    pub fn new(providers: Vec<Box<dyn MetadataProvider>>, enabled: bool) -> Self {
        Self { providers, enabled }
    }

    pub fn disabled() -> Self {
        Self {
            providers: Vec::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.providers.is_empty()
    }

    pub async fn best_match(&self, query: &MatchQuery) -> Option<BestMatch> {
        if !self.is_enabled() {
            return None;
        }
        for provider in &self.providers {
            match provider.best_match(query).await {
                Ok(Some(found)) => {
                    debug!("provider {} matched {:?}", provider.name(), found.title);
                    return Some(found);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("provider {} failed, continuing offline: {err}", provider.name());
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("enabled", &self.enabled)
            .field("providers", &self.providers.len())
            .finish()
    }
}
