use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::host::{ChromeMessage, Partition};
use crate::registry::{SurfaceId, SurfaceRole, WindowId};
use crate::shell::Shell;
use crate::util::placeholder_route;

/// Navigation flags of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub is_loading: bool,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

/// One entry of the tab list pushed to a window's chrome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub id: SurfaceId,
    pub title: String,
    /// Blank for the internal new-tab page.
    pub url: String,
    pub favicon: Option<String>,
    pub navigation: NavigationState,
}

impl Shell {
    /// Open a tab in `window`, either at `url` or on the internal search page.
    ///
    /// Tabs start hidden; callers select them explicitly. Returns `None` if
    /// the window is unknown or the runtime could not create the surface.
    pub async fn create_tab(&self, window: WindowId, url: Option<&str>) -> Option<SurfaceId> {
        let Some(info) = self.registry.window(window) else {
            log::debug!("create_tab: unknown {}", window);
            return None;
        };
        let host = &self.services.host;

        let partition = if info.private {
            let partition = Partition::Isolated(self.config.private_partition.clone());
            if let Err(e) = host.clear_partition(&partition).await {
                log::warn!("Failed to clear private partition: {}", e);
            }
            partition
        } else {
            Partition::Default
        };

        let surface = match host.create_surface(&partition).await {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Failed to create a surface for {}: {}", window, e);
                return None;
            }
        };

        let url = url.filter(|u| !u.is_empty());
        let role = match url {
            Some(u) => SurfaceRole::Content.classify(
                u,
                &self.config.inspector_marker,
                &self.config.new_tab_marker,
            ),
            None => SurfaceRole::Placeholder,
        };

        // The window may have closed while the surface was being created.
        if !self.registry.insert_surface(surface, role, window) {
            log::debug!("{} vanished while creating {}", window, surface);
            self.discard_surface(surface).await;
            return None;
        }
        if let Err(e) = host.attach(window, surface).await {
            log::warn!("Failed to attach {} to {}: {}", surface, window, e);
            self.registry.remove_surface(surface);
            self.discard_surface(surface).await;
            return None;
        }
        if let Err(e) = host.set_bounds(surface, Rect::ZERO).await {
            log::warn!("Failed to size new {}: {}", surface, e);
        }
        if let Err(e) = host.set_auto_resize(surface, false).await {
            log::warn!("Failed to disable auto-resize on new {}: {}", surface, e);
        }
        self.apply_tab_listeners(surface);

        match url {
            Some(u) => {
                if let Err(e) = host.load_url(surface, u).await {
                    log::warn!("Failed to load {} in {}: {}", u, surface, e);
                }
            }
            None => {
                let route = placeholder_route(&self.config.placeholder_token);
                if let Err(e) = self.services.router.load_route(surface, &route).await {
                    log::warn!("Failed to open search page in {}: {}", surface, e);
                }
                self.focus_search(window).await;
            }
        }

        log::info!("Created {} in {}", surface, window);
        Some(surface)
    }

    async fn discard_surface(&self, surface: SurfaceId) {
        if let Err(e) = self.services.host.destroy_surface(surface).await {
            log::warn!("Failed to destroy {}: {}", surface, e);
        }
    }

    /// Show `tab` and hide every other tab in its window.
    ///
    /// Siblings come from the registry rather than from a tab snapshot, so
    /// a sibling whose page cannot be read is still hidden. If the tab
    /// leaves the window while siblings are being hidden, it is neither
    /// shown nor reported.
    pub async fn select_tab(&self, tab: SurfaceId) {
        let Some(info) = self.registry.resolve(tab) else {
            log::debug!("select_tab: unknown {}", tab);
            return;
        };
        let (Some(window), true) = (info.owner, info.role.is_tab()) else {
            log::debug!("select_tab: {} is not a tab", tab);
            return;
        };

        for other in self.registry.tabs_of(window) {
            if other != tab {
                self.hide_tab(other).await;
            }
        }

        if self.registry.owner_window(tab) != Some(window) {
            log::debug!("select_tab: {} left {} mid-selection", tab, window);
            return;
        }
        self.show_tab(tab).await;

        if self.registry.owner_window(tab) != Some(window) {
            log::debug!("select_tab: {} left {} mid-selection", tab, window);
            return;
        }
        self.send_to_chrome(window, ChromeMessage::SelectedTabUpdated(tab))
            .await;
    }

    /// Close a tab and push the shrunken list to its window's chrome.
    pub async fn delete_tab(&self, tab: SurfaceId) {
        let Some(window) = self.registry.owner_window(tab) else {
            log::debug!("delete_tab: {} already gone", tab);
            return;
        };
        self.remove_tab_listeners(tab);

        let host = &self.services.host;
        if let Err(e) = host.detach(window, tab).await {
            log::warn!("Failed to detach {} from {}: {}", tab, window, e);
        }
        self.registry.remove_surface(tab);
        if let Err(e) = host.destroy_surface(tab).await {
            log::warn!("Failed to destroy {}: {}", tab, e);
        }
        log::info!("Deleted {} from {}", tab, window);

        self.push_tabs(window, None).await;
    }

    /// Snapshot of every tab in a window, in attach order.
    ///
    /// Chrome, overlay and inspector surfaces are never listed. A surface
    /// that fails or disappears while being read is skipped, so the list
    /// may be partial but is always returned. `favicon_override` supplies an
    /// icon URL for one surface in place of the one the page declares.
    pub async fn get_tabs(
        &self,
        window: WindowId,
        favicon_override: Option<(SurfaceId, &str)>,
    ) -> Vec<TabSnapshot> {
        let mut tabs = Vec::new();
        for surface in self.registry.tabs_of(window) {
            let state = match self.services.host.page_state(surface).await {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("Skipping {} in tab list: {}", surface, e);
                    continue;
                }
            };
            let override_url = favicon_override
                .filter(|(id, _)| *id == surface)
                .map(|(_, url)| url);
            let favicon = self
                .resolve_favicon(surface, &state.url, override_url)
                .await;

            // Re-read after the awaits above: the surface may have been
            // deleted, moved or re-classified meanwhile.
            let Some(current) = self.registry.resolve(surface) else {
                continue;
            };
            if current.owner != Some(window) || !current.role.is_tab() {
                continue;
            }
            let url = match current.role {
                SurfaceRole::Placeholder => String::new(),
                _ => state.url,
            };

            tabs.push(TabSnapshot {
                id: surface,
                title: state
                    .title
                    .unwrap_or_else(|| self.config.untitled_title.clone()),
                url,
                favicon,
                navigation: NavigationState {
                    is_loading: state.is_loading,
                    can_go_back: state.can_go_back,
                    can_go_forward: state.can_go_forward,
                },
            });
        }
        tabs
    }

    /// First tab in the window that is not hidden. `None` while every tab
    /// is hidden, e.g. between the hide and show halves of a selection.
    pub async fn get_selected_tab(&self, window: WindowId) -> Option<TabSnapshot> {
        let tabs = self.get_tabs(window, None).await;
        for tab in tabs {
            let chrome = self.registry.chrome_of(window)?;
            if tab.id == chrome || self.registry.is_overlay(tab.id) {
                continue;
            }
            if self.is_tab_hidden(tab.id).await == Some(false) {
                return Some(tab);
            }
        }
        None
    }

    /// Push a fresh tab list to every window and close windows left empty.
    pub async fn update_all_windows(&self) {
        for window in self.registry.window_ids() {
            let tabs = self.get_tabs(window, None).await;
            let empty = tabs.is_empty();
            self.send_to_chrome(window, ChromeMessage::TabsUpdated(tabs))
                .await;
            if empty {
                log::info!("{} has no tabs left", window);
                self.close_window(window).await;
            }
        }
    }

    pub async fn go_back(&self, tab: SurfaceId) {
        if self.registry.resolve(tab).is_none() {
            return;
        }
        let host = &self.services.host;
        let can_go_back = host.page_state(tab).await.is_ok_and(|s| s.can_go_back);
        if can_go_back {
            if let Err(e) = host.go_back(tab).await {
                log::warn!("Failed to go back in {}: {}", tab, e);
            }
        }
    }

    pub async fn go_forward(&self, tab: SurfaceId) {
        if self.registry.resolve(tab).is_none() {
            return;
        }
        let host = &self.services.host;
        let can_go_forward = host.page_state(tab).await.is_ok_and(|s| s.can_go_forward);
        if can_go_forward {
            if let Err(e) = host.go_forward(tab).await {
                log::warn!("Failed to go forward in {}: {}", tab, e);
            }
        }
    }

    pub async fn refresh_tab(&self, tab: SurfaceId) {
        if self.registry.resolve(tab).is_none() {
            return;
        }
        if let Err(e) = self.services.host.reload(tab).await {
            log::warn!("Failed to reload {}: {}", tab, e);
        }
    }

    /// Focus the window's chrome and ask it to focus its search field.
    pub async fn focus_search(&self, window: WindowId) {
        let Some(chrome) = self.registry.chrome_of(window) else {
            return;
        };
        if let Err(e) = self.services.host.focus(chrome).await {
            log::warn!("Failed to focus chrome of {}: {}", window, e);
        }
        self.send_to_chrome(window, ChromeMessage::FocusingSearch)
            .await;
    }

    /// Open the inspector for a tab. A docked inspector surface is tracked
    /// as part of the tab's window but never listed as a tab.
    pub async fn open_inspector(&self, tab: SurfaceId) {
        if self.registry.resolve(tab).is_none() {
            return;
        }
        let inspector = match self.services.host.open_inspector(tab).await {
            Ok(inspector) => inspector,
            Err(e) => {
                log::warn!("Failed to open inspector for {}: {}", tab, e);
                return;
            }
        };
        let Some(inspector) = inspector else {
            return;
        };
        let Some(window) = self.registry.owner_window(tab) else {
            return;
        };
        if !self
            .registry
            .insert_surface(inspector, SurfaceRole::Inspector, window)
        {
            log::warn!("Inspector {} for {} could not be tracked", inspector, tab);
        }
    }
}
