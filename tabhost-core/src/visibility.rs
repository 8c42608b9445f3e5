use crate::geometry::{content_rect, Rect};
use crate::registry::SurfaceId;
use crate::shell::Shell;

impl Shell {
    /// Collapse a tab to zero area and stop it tracking window resizes.
    pub async fn hide_tab(&self, tab: SurfaceId) {
        if self.registry.resolve(tab).is_none() {
            log::debug!("hide_tab: unknown {}", tab);
            return;
        }
        let host = &self.services.host;
        if let Err(e) = host.set_bounds(tab, Rect::ZERO).await {
            log::warn!("Failed to hide {}: {}", tab, e);
            return;
        }
        if let Err(e) = host.set_auto_resize(tab, false).await {
            log::warn!("Failed to disable auto-resize on {}: {}", tab, e);
        }
    }

    /// Give a tab its window's content area and let it follow resizes.
    pub async fn show_tab(&self, tab: SurfaceId) {
        let Some(window) = self.registry.owner_window(tab) else {
            log::debug!("show_tab: {} has no window", tab);
            return;
        };
        let host = &self.services.host;
        let window_bounds = match host.window_bounds(window).await {
            Ok(bounds) => bounds,
            Err(e) => {
                log::warn!("Failed to read bounds of {}: {}", window, e);
                return;
            }
        };
        let rect = content_rect(window_bounds, self.config.chrome_height);
        if let Err(e) = host.set_bounds(tab, rect).await {
            log::warn!("Failed to show {}: {}", tab, e);
            return;
        }
        if let Err(e) = host.set_auto_resize(tab, true).await {
            log::warn!("Failed to enable auto-resize on {}: {}", tab, e);
        }
    }

    /// `None` when the tab cannot be resolved or its bounds cannot be read.
    pub async fn is_tab_hidden(&self, tab: SurfaceId) -> Option<bool> {
        self.registry.resolve(tab)?;
        match self.services.host.bounds(tab).await {
            Ok(bounds) => Some(bounds.is_collapsed()),
            Err(e) => {
                log::debug!("Failed to read bounds of {}: {}", tab, e);
                None
            }
        }
    }
}
