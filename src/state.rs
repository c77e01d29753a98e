use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dashmap::DashMap;

use crate::config::Config;
use crate::embedder::ImageEmbedder;
use crate::index::{build_index, ReferenceIndex};
use crate::uploads::UploadDir;

pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Everything a request handler needs, built once at startup.
///
/// The index and embedder are never mutated after construction; the rate
/// limiter is the only state written by requests.
pub struct AppState {
    pub config: Config,
    pub index: ReferenceIndex,
    pub embedder: Arc<dyn ImageEmbedder>,
    pub uploads: UploadDir,
    /// client → (requests in window, window start)
    rate_limiter: DashMap<String, (u32, Instant)>,
}

impl AppState {
    /// Build the reference index from the configured mapping. Any failure is
    /// fatal: the server must not start with a broken index.
    pub fn build(config: Config, embedder: Arc<dyn ImageEmbedder>) -> Result<Self> {
        log::info!(
            "Building reference index from {} ({} references)",
            config.image_root.display(),
            config.references.len()
        );
        let index = build_index(&config.references, &config.image_root, embedder.as_ref())
            .context("Failed to build reference index")?;
        Self::with_index(config, index, embedder)
    }

    pub fn with_index(
        config: Config,
        index: ReferenceIndex,
        embedder: Arc<dyn ImageEmbedder>,
    ) -> Result<Self> {
        let uploads = UploadDir::new(&config.upload_dir)?;
        let stale = uploads.purge()?;
        if stale > 0 {
            log::info!("Removed {} stale upload(s)", stale);
        }

        Ok(Self {
            config,
            index,
            embedder,
            uploads,
            rate_limiter: DashMap::new(),
        })
    }

    /// Fixed one-minute window per client. A limit of 0 disables limiting.
    pub fn check_rate_limit(&self, client: &str) -> bool {
        let limit = self.config.rate_limit_per_minute;
        if limit == 0 {
            return true;
        }

        let now = Instant::now();
        let mut entry = self
            .rate_limiter
            .entry(client.to_string())
            .or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) > RATE_WINDOW {
            *count = 0;
            *window_start = now;
        }

        if *count >= limit {
            return false;
        }

        *count += 1;
        true
    }

    /// Drop clients whose window ended before `now`. Returns how many were
    /// removed.
    pub fn prune_rate_limits(&self, now: Instant) -> usize {
        let before = self.rate_limiter.len();
        self.rate_limiter
            .retain(|_, (_, start)| now.saturating_duration_since(*start) <= RATE_WINDOW);
        before.saturating_sub(self.rate_limiter.len())
    }

    /// Number of clients currently tracked by the rate limiter.
    pub fn tracked_clients(&self) -> usize {
        self.rate_limiter.len()
    }
}
