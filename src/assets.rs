//! Preloads the avatar video clips into memory for zero-latency switching.
//!
//! Clips are fetched one at a time so progress stays monotonic and bandwidth
//! is not saturated during startup. A clip that fails to download degrades to
//! remote-reference playback; preloading as a whole never fails.

use crate::error::BackendError;
use crate::journal::Journal;
use crate::state::AvatarState;
use async_trait::async_trait;
use bytes::Bytes;

/// Where a clip plays from: an in-memory buffer, or the original remote path
/// when the download failed. Playback code treats both the same.
#[derive(Debug, Clone)]
pub enum AssetHandle {
    Cached(Bytes),
    Remote(String),
}

impl AssetHandle {
    pub fn is_cached(&self) -> bool {
        matches!(self, AssetHandle::Cached(_))
    }

    /// The remote path, when this handle fell back to one.
    pub fn remote_url(&self) -> Option<&str> {
        match self {
            AssetHandle::Cached(_) => None,
            AssetHandle::Remote(url) => Some(url),
        }
    }
}

/// One preloaded (or fallen-back) clip. Immutable once created.
#[derive(Debug, Clone)]
pub struct AssetEntry {
    pub state: AvatarState,
    pub resource_name: String,
    pub handle: AssetHandle,
    /// True when the clip made it into memory rather than falling back.
    pub loaded: bool,
}

/// The full state-to-handle mapping produced by preloading.
#[derive(Debug, Clone)]
pub struct AssetCatalog {
    entries: Vec<AssetEntry>,
}

impl AssetCatalog {
    pub fn entry(&self, state: AvatarState) -> &AssetEntry {
        self.entries
            .iter()
            .find(|entry| entry.state == state)
            .expect("catalog holds every avatar state")
    }

    pub fn handle(&self, state: AvatarState) -> &AssetHandle {
        &self.entry(state).handle
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetEntry> {
        self.entries.iter()
    }

    /// How many clips actually live in memory.
    pub fn cached_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.loaded).count()
    }
}

/// Source of raw clip bytes, plus the remote path used on fallback.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch_asset(&self, resource: &str) -> Result<Bytes, BackendError>;

    /// The direct URL a player can stream `resource` from.
    fn asset_url(&self, resource: &str) -> String;
}

/// Fetches the fixed clip set and reports progress as it goes.
pub struct AssetCache {
    journal: Journal,
}

impl AssetCache {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }

    /// Fetch every clip sequentially. `on_progress` fires once per clip,
    /// after success and after fallback alike, so the loaded count reaches
    /// the total exactly once. Always completes with a full catalog.
    pub async fn preload_all<P>(&self, fetcher: &dyn AssetFetcher, mut on_progress: P) -> AssetCatalog
    where
        P: FnMut(AvatarState, usize, usize),
    {
        let total = AvatarState::ALL.len();
        let mut entries = Vec::with_capacity(total);
        let mut loaded = 0usize;

        for state in AvatarState::ALL {
            let resource = state.resource_name();
            let (handle, cached) = match fetcher.fetch_asset(resource).await {
                Ok(bytes) => (AssetHandle::Cached(bytes), true),
                Err(err) => {
                    self.journal.error(format!(
                        "preload failed for {resource}, falling back to remote playback: {err}"
                    ));
                    (AssetHandle::Remote(fetcher.asset_url(resource)), false)
                }
            };
            entries.push(AssetEntry {
                state,
                resource_name: resource.to_string(),
                handle,
                loaded: cached,
            });
            loaded += 1;
            on_progress(state, loaded, total);
        }

        AssetCatalog { entries }
    }
}
