use crate::geometry::{chrome_screen_rect, find_drop_target};
use crate::registry::{SurfaceId, WindowId};
use crate::shell::Shell;

/// Result of dropping dragged tabs somewhere on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// The tabs were merged into this window.
    Merged(WindowId),
    /// No window claimed the drop; the caller should open a new window for
    /// the tabs.
    Unhandled,
    /// Nothing to do: no tabs, or their source window is gone.
    Ignored,
}

impl DropOutcome {
    pub fn needs_new_window(self) -> bool {
        matches!(self, DropOutcome::Unhandled)
    }
}

impl Shell {
    /// Move tabs into `target`, then refresh every window and select the
    /// first tab that moved.
    ///
    /// Each tab is handled on its own; ids that no longer resolve are
    /// skipped. Windows emptied by the move are closed.
    pub async fn move_tabs(&self, tab_ids: &[SurfaceId], target: WindowId) {
        if self.registry.window(target).is_none() {
            log::debug!("move_tabs: unknown target {}", target);
            return;
        }
        let host = &self.services.host;

        let mut moved = Vec::new();
        for &tab in tab_ids {
            let Some(source) = self.registry.reparent(tab, target) else {
                log::debug!("move_tabs: cannot move {} to {}", tab, target);
                continue;
            };
            if source != target {
                if let Err(e) = host.detach(source, tab).await {
                    log::warn!("Failed to detach {} from {}: {}", tab, source, e);
                }
                if let Err(e) = host.attach(target, tab).await {
                    log::warn!("Failed to attach {} to {}: {}", tab, target, e);
                    self.restore_owner(tab, source).await;
                    continue;
                }
                log::info!("Moved {} from {} to {}", tab, source, target);
            }
            self.apply_tab_listeners(tab);
            moved.push(tab);
        }

        self.update_all_windows().await;
        if let Some(&first) = moved.first() {
            self.select_tab(first).await;
        }
    }

    /// Put a tab whose move failed back under `source`, in the registry and
    /// in the runtime.
    async fn restore_owner(&self, tab: SurfaceId, source: WindowId) {
        if self.registry.reparent(tab, source).is_none() {
            log::debug!("{} cannot return to {}", tab, source);
            return;
        }
        if let Err(e) = self.services.host.attach(source, tab).await {
            log::warn!("Failed to reattach {} to {}: {}", tab, source, e);
        }
    }

    /// Finish a tab drag: if the cursor is over another window's chrome,
    /// merge the tabs into that window.
    pub async fn handle_move_tabs(&self, tab_ids: &[SurfaceId]) -> DropOutcome {
        let Some(&first) = tab_ids.first() else {
            return DropOutcome::Ignored;
        };
        let Some(source) = self.registry.owner_window(first) else {
            return DropOutcome::Ignored;
        };

        let host = &self.services.host;
        let cursor = host.cursor_position().await;

        let mut candidates = Vec::new();
        for window in self.registry.window_ids() {
            if window == source {
                continue;
            }
            let Some(chrome) = self.registry.chrome_of(window) else {
                continue;
            };
            let (window_bounds, chrome_bounds) =
                match (host.window_bounds(window).await, host.bounds(chrome).await) {
                    (Ok(w), Ok(c)) => (w, c),
                    _ => {
                        log::debug!("Skipping {} as drop target: no bounds", window);
                        continue;
                    }
                };
            candidates.push((window, chrome_screen_rect(window_bounds, chrome_bounds)));
        }

        match find_drop_target(cursor, &candidates) {
            Some(target) => {
                self.move_tabs(tab_ids, target).await;
                DropOutcome::Merged(target)
            }
            None => DropOutcome::Unhandled,
        }
    }
}
