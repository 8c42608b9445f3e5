use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::SurfaceId;
use crate::shell::Shell;

/// One visit, as handed to the history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    /// Favicon URL of the page, or the configured fallback marker.
    pub favicon: String,
    pub title: String,
    pub url: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl HistoryEntry {
    pub fn new(favicon: String, title: String, url: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            favicon,
            title,
            url,
            timestamp: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Shell {
    /// Append a history entry for the first visit of `url` by this surface.
    ///
    /// Private windows never write history. Favicon and title lookups are
    /// best-effort and never prevent the entry from being written.
    pub(crate) async fn record_navigation(&self, surface: SurfaceId, url: &str) {
        let Some(window) = self.registry.owner_window(surface) else {
            return;
        };
        if self.registry.is_private(window) {
            log::debug!("Not recording history for private {}", window);
            return;
        }
        // Claimed before the first await so a repeat navigation arriving
        // mid-probe cannot record the same URL twice.
        if !self.registry.claim_url(surface, url) {
            return;
        }

        let favicon = self
            .probe_favicon_url(surface)
            .await
            .unwrap_or_else(|| self.config.history_favicon_fallback.clone());
        let title = match self.services.host.page_state(surface).await {
            Ok(state) => state.title,
            Err(e) => {
                log::debug!("No page state for {} while recording history: {}", surface, e);
                None
            }
        }
        .unwrap_or_else(|| self.config.untitled_title.clone());

        // The surface may have closed or moved into a private window while
        // its metadata was being read.
        let Some(window) = self.registry.owner_window(surface) else {
            log::debug!("{} closed before its visit to {} was recorded", surface, url);
            return;
        };
        if self.registry.is_private(window) {
            log::debug!("{} moved into private {}; visit dropped", surface, window);
            return;
        }

        let entry = HistoryEntry::new(favicon, title, url.to_string());
        log::info!("Recording visit to {} from {}", entry.url, surface);
        if let Err(e) = self.services.history.add_history(entry).await {
            log::warn!("Failed to record history for {}: {}", url, e);
        }
    }
}
