use std::sync::Arc;

use crate::config::ShellConfig;
use crate::favicon::FaviconCache;
use crate::geometry::content_rect;
use crate::host::{ChromeMessage, ContextMenuBuilder, FaviconSource, HistoryStore, Router, SurfaceHost};
use crate::registry::{SurfaceId, WindowId, WindowRegistry};

/// The collaborators a [`Shell`] drives.
///
/// All fields are cheaply cloneable so the same set can be handed to
/// several shells (one per test, for instance).
#[derive(Clone)]
pub struct ShellServices {
    pub host: Arc<dyn SurfaceHost>,
    pub favicons: Arc<dyn FaviconSource>,
    pub history: Arc<dyn HistoryStore>,
    pub router: Arc<dyn Router>,
    pub menus: Arc<dyn ContextMenuBuilder>,
}

/// Tab and window orchestration for one browser process.
///
/// Operations are split across modules by concern: tab lifecycle in
/// `tabs`, geometry in `visibility`, content events in `events`, window
/// merging in `migration` and history in `history`. They all funnel chrome
/// updates through [`Shell::push_tabs`], which always recomputes the full
/// tab list, so concurrent writers converge on the latest state.
pub struct Shell {
    pub(crate) registry: WindowRegistry,
    pub(crate) services: ShellServices,
    pub(crate) config: ShellConfig,
    pub(crate) favicon_cache: FaviconCache,
}

impl Shell {
    pub fn new(services: ShellServices, config: ShellConfig) -> Self {
        let favicon_cache = FaviconCache::new(config.favicon_cache_capacity);
        Self {
            registry: WindowRegistry::new(),
            services,
            config,
            favicon_cache,
        }
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Start tracking a window the runtime has just opened.
    pub fn open_window(&self, window: WindowId, private: bool, chrome: SurfaceId) -> bool {
        let added = self.registry.register_window(window, private, chrome);
        if added {
            log::info!(
                "Tracking {} (chrome {}, private={})",
                window,
                chrome,
                private
            );
        } else {
            log::warn!("{} or its chrome {} is already tracked", window, chrome);
        }
        added
    }

    /// Tear down a window: the runtime closes it and every surface it still
    /// owns is forgotten.
    pub async fn close_window(&self, window: WindowId) {
        if let Err(e) = self.services.host.close_window(window).await {
            log::warn!("Failed to close {}: {}", window, e);
        }
        if let Some(surfaces) = self.registry.remove_window(window) {
            log::info!("Closed {} ({} surfaces)", window, surfaces.len());
        }
    }

    /// Lay a transient overlay over the window's content area, replacing
    /// any overlay already open there. The overlay is never listed as a tab.
    pub async fn open_overlay(&self, window: WindowId, overlay: SurfaceId) -> bool {
        let previous = self.registry.overlay_of(window);
        if !self.registry.set_overlay(window, overlay) {
            log::warn!("Cannot open {} as overlay of {}", overlay, window);
            return false;
        }
        if let Some(previous) = previous {
            self.discard_overlay(window, previous).await;
        }

        let host = &self.services.host;
        if let Err(e) = host.attach(window, overlay).await {
            log::warn!("Failed to attach overlay {} to {}: {}", overlay, window, e);
            if self.registry.overlay_of(window) == Some(overlay) {
                self.registry.clear_overlay(window);
            }
            return false;
        }
        match host.window_bounds(window).await {
            Ok(bounds) => {
                let rect = content_rect(bounds, self.config.chrome_height);
                if let Err(e) = host.set_bounds(overlay, rect).await {
                    log::warn!("Failed to size overlay {}: {}", overlay, e);
                }
                if let Err(e) = host.set_auto_resize(overlay, true).await {
                    log::warn!("Failed to enable auto-resize on overlay {}: {}", overlay, e);
                }
            }
            Err(e) => log::warn!("Failed to read bounds of {}: {}", window, e),
        }
        log::info!("Opened overlay {} in {}", overlay, window);
        true
    }

    /// Close the window's overlay, if one is open.
    pub async fn close_overlay(&self, window: WindowId) -> Option<SurfaceId> {
        let overlay = self.registry.clear_overlay(window)?;
        self.discard_overlay(window, overlay).await;
        Some(overlay)
    }

    async fn discard_overlay(&self, window: WindowId, overlay: SurfaceId) {
        let host = &self.services.host;
        if let Err(e) = host.detach(window, overlay).await {
            log::warn!("Failed to detach overlay {} from {}: {}", overlay, window, e);
        }
        if let Err(e) = host.destroy_surface(overlay).await {
            log::warn!("Failed to destroy overlay {}: {}", overlay, e);
        }
    }

    pub(crate) async fn send_to_chrome(&self, window: WindowId, message: ChromeMessage) {
        let Some(chrome) = self.registry.chrome_of(window) else {
            log::debug!("No chrome for {}; dropping update", window);
            return;
        };
        if let Err(e) = self.services.host.send(chrome, &message).await {
            log::warn!("Failed to update chrome of {}: {}", window, e);
        }
    }

    /// Recompute a window's tab list and push it to its chrome.
    pub(crate) async fn push_tabs(&self, window: WindowId, favicon_override: Option<(SurfaceId, &str)>) {
        let tabs = self.get_tabs(window, favicon_override).await;
        self.send_to_chrome(window, ChromeMessage::TabsUpdated(tabs))
            .await;
    }
}
