use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::events::Listeners;

/// Host window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

/// Content surface identifier, assigned by the host runtime and never
/// reused within a run. A tab's id is its surface id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// What a surface is, decided when it is registered and refined on every
/// navigation. Tab enumeration looks only at this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceRole {
    /// A regular tab showing web content.
    Content,
    /// The per-window header. Never a tab.
    Chrome,
    /// The transient per-window overlay. Never a tab.
    Overlay,
    /// A docked inspection surface. Never a tab.
    Inspector,
    /// A tab showing the internal new-tab page; listed with a blank URL.
    Placeholder,
}

impl SurfaceRole {
    /// Whether surfaces with this role are listed as tabs.
    pub fn is_tab(self) -> bool {
        matches!(self, SurfaceRole::Content | SurfaceRole::Placeholder)
    }

    /// Role of a surface after it lands on `url`.
    ///
    /// Chrome and overlay surfaces keep their role regardless of URL.
    pub fn classify(self, url: &str, inspector_marker: &str, new_tab_marker: &str) -> SurfaceRole {
        match self {
            SurfaceRole::Chrome | SurfaceRole::Overlay => self,
            _ if !inspector_marker.is_empty() && url.contains(inspector_marker) => {
                SurfaceRole::Inspector
            }
            _ if !new_tab_marker.is_empty() && url.contains(new_tab_marker) => {
                SurfaceRole::Placeholder
            }
            _ => SurfaceRole::Content,
        }
    }
}

/// Point-in-time copy of a surface record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub id: SurfaceId,
    pub role: SurfaceRole,
    pub owner: Option<WindowId>,
}

/// Point-in-time copy of a window record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub private: bool,
    pub chrome: SurfaceId,
    pub overlay: Option<SurfaceId>,
    /// Every attached surface in attach order, chrome and overlay included.
    pub surfaces: Vec<SurfaceId>,
}

#[derive(Debug)]
struct WindowRecord {
    private: bool,
    chrome: SurfaceId,
    overlay: Option<SurfaceId>,
    surfaces: Vec<SurfaceId>,
}

#[derive(Debug)]
struct SurfaceRecord {
    role: SurfaceRole,
    owner: Option<WindowId>,
    listeners: Listeners,
    seen_urls: Vec<String>,
}

impl SurfaceRecord {
    fn new(role: SurfaceRole, owner: WindowId) -> Self {
        Self {
            role,
            owner: Some(owner),
            listeners: Listeners::empty(),
            seen_urls: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    windows: HashMap<WindowId, WindowRecord>,
    window_order: Vec<WindowId>,
    surfaces: HashMap<SurfaceId, SurfaceRecord>,
}

impl RegistryState {
    fn unlink(&mut self, surface: SurfaceId, window: WindowId) {
        if let Some(record) = self.windows.get_mut(&window) {
            record.surfaces.retain(|s| *s != surface);
            if record.overlay == Some(surface) {
                record.overlay = None;
            }
        }
    }
}

/// Process-wide map of windows and the surfaces attached to them.
///
/// Every lookup returns an owned snapshot and every mutation happens inside
/// a single lock section, so callers re-resolve after each await instead of
/// holding onto records.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    state: Mutex<RegistryState>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new window together with its chrome surface.
    ///
    /// Returns `false` if the window or the chrome surface id is already known.
    pub fn register_window(&self, window: WindowId, private: bool, chrome: SurfaceId) -> bool {
        let mut state = self.state.lock();
        if state.windows.contains_key(&window) || state.surfaces.contains_key(&chrome) {
            return false;
        }
        state.windows.insert(
            window,
            WindowRecord {
                private,
                chrome,
                overlay: None,
                surfaces: vec![chrome],
            },
        );
        state.window_order.push(window);
        state
            .surfaces
            .insert(chrome, SurfaceRecord::new(SurfaceRole::Chrome, window));
        true
    }

    /// Forget a window and every surface it still owns. Returns the ids of
    /// the surfaces that went with it.
    pub fn remove_window(&self, window: WindowId) -> Option<Vec<SurfaceId>> {
        let mut state = self.state.lock();
        let record = state.windows.remove(&window)?;
        state.window_order.retain(|w| *w != window);
        for surface in &record.surfaces {
            state.surfaces.remove(surface);
        }
        Some(record.surfaces)
    }

    /// Attach `surface` as the window's overlay, replacing any previous one.
    pub fn set_overlay(&self, window: WindowId, surface: SurfaceId) -> bool {
        let mut state = self.state.lock();
        if state.surfaces.contains_key(&surface) {
            return false;
        }
        let previous = match state.windows.get_mut(&window) {
            Some(record) => {
                record.surfaces.push(surface);
                record.overlay.replace(surface)
            }
            None => return false,
        };
        if let Some(previous) = previous {
            state.unlink(previous, window);
            state.surfaces.remove(&previous);
        }
        state
            .surfaces
            .insert(surface, SurfaceRecord::new(SurfaceRole::Overlay, window));
        true
    }

    /// Drop the window's overlay, returning its id.
    pub fn clear_overlay(&self, window: WindowId) -> Option<SurfaceId> {
        let mut state = self.state.lock();
        let overlay = state.windows.get_mut(&window)?.overlay.take()?;
        state.unlink(overlay, window);
        state.surfaces.remove(&overlay);
        Some(overlay)
    }

    /// Register a surface attached to `owner`. Fails if the window is
    /// unknown or the id is taken.
    pub fn insert_surface(&self, surface: SurfaceId, role: SurfaceRole, owner: WindowId) -> bool {
        let mut state = self.state.lock();
        if state.surfaces.contains_key(&surface) {
            return false;
        }
        match state.windows.get_mut(&owner) {
            Some(record) => record.surfaces.push(surface),
            None => return false,
        }
        state
            .surfaces
            .insert(surface, SurfaceRecord::new(role, owner));
        true
    }

    /// Forget a surface, detaching it from its owner. Its seen-URL set goes
    /// with it.
    pub fn remove_surface(&self, surface: SurfaceId) -> Option<SurfaceInfo> {
        let mut state = self.state.lock();
        let record = state.surfaces.remove(&surface)?;
        if let Some(owner) = record.owner {
            state.unlink(surface, owner);
        }
        Some(SurfaceInfo {
            id: surface,
            role: record.role,
            owner: record.owner,
        })
    }

    /// Move a surface to `target` in one step; it is never attached to two
    /// windows at once. Returns the previous owner.
    pub fn reparent(&self, surface: SurfaceId, target: WindowId) -> Option<WindowId> {
        let mut state = self.state.lock();
        if !state.windows.contains_key(&target) {
            return None;
        }
        let previous = {
            let record = state.surfaces.get(&surface)?;
            if !record.role.is_tab() {
                return None;
            }
            record.owner?
        };
        if previous != target {
            state.unlink(surface, previous);
            if let Some(record) = state.windows.get_mut(&target) {
                record.surfaces.push(surface);
            }
            if let Some(record) = state.surfaces.get_mut(&surface) {
                record.owner = Some(target);
            }
        }
        Some(previous)
    }

    pub fn resolve(&self, surface: SurfaceId) -> Option<SurfaceInfo> {
        let state = self.state.lock();
        state.surfaces.get(&surface).map(|record| SurfaceInfo {
            id: surface,
            role: record.role,
            owner: record.owner,
        })
    }

    pub fn owner_window(&self, surface: SurfaceId) -> Option<WindowId> {
        let state = self.state.lock();
        state.surfaces.get(&surface)?.owner
    }

    pub fn window(&self, window: WindowId) -> Option<WindowInfo> {
        let state = self.state.lock();
        state.windows.get(&window).map(|record| WindowInfo {
            id: window,
            private: record.private,
            chrome: record.chrome,
            overlay: record.overlay,
            surfaces: record.surfaces.clone(),
        })
    }

    /// Windows in registration order.
    pub fn window_ids(&self) -> Vec<WindowId> {
        self.state.lock().window_order.clone()
    }

    /// Surfaces of `window` that are listed as tabs, in attach order.
    /// Empty for unknown windows.
    pub fn tabs_of(&self, window: WindowId) -> Vec<SurfaceId> {
        let state = self.state.lock();
        let Some(record) = state.windows.get(&window) else {
            return Vec::new();
        };
        record
            .surfaces
            .iter()
            .copied()
            .filter(|id| state.surfaces.get(id).is_some_and(|s| s.role.is_tab()))
            .collect()
    }

    /// Unknown windows are treated as not private.
    pub fn is_private(&self, window: WindowId) -> bool {
        let state = self.state.lock();
        state.windows.get(&window).is_some_and(|w| w.private)
    }

    pub fn chrome_of(&self, window: WindowId) -> Option<SurfaceId> {
        let state = self.state.lock();
        state.windows.get(&window).map(|w| w.chrome)
    }

    pub fn overlay_of(&self, window: WindowId) -> Option<SurfaceId> {
        let state = self.state.lock();
        state.windows.get(&window)?.overlay
    }

    pub fn is_overlay(&self, surface: SurfaceId) -> bool {
        let state = self.state.lock();
        state
            .surfaces
            .get(&surface)
            .is_some_and(|s| s.role == SurfaceRole::Overlay)
    }

    /// Re-tag a surface after it landed on `url`. Returns the new role.
    pub fn classify(
        &self,
        surface: SurfaceId,
        url: &str,
        inspector_marker: &str,
        new_tab_marker: &str,
    ) -> Option<SurfaceRole> {
        let mut state = self.state.lock();
        let record = state.surfaces.get_mut(&surface)?;
        record.role = record.role.classify(url, inspector_marker, new_tab_marker);
        Some(record.role)
    }

    /// Replace the surface's listener set. Returns `false` for unknown ids.
    pub fn set_listeners(&self, surface: SurfaceId, listeners: Listeners) -> bool {
        let mut state = self.state.lock();
        match state.surfaces.get_mut(&surface) {
            Some(record) => {
                record.listeners = listeners;
                true
            }
            None => false,
        }
    }

    /// Check whether `listener` is attached and, if it is one-shot, detach
    /// it in the same step.
    pub fn fire_listener(&self, surface: SurfaceId, listener: Listeners) -> bool {
        let mut state = self.state.lock();
        let Some(record) = state.surfaces.get_mut(&surface) else {
            return false;
        };
        if !record.listeners.contains(listener) {
            return false;
        }
        record.listeners.remove(listener & Listeners::ONE_SHOT);
        true
    }

    /// Record `url` as visited by this surface. Returns `true` only the
    /// first time a given URL is claimed by a given surface.
    pub fn claim_url(&self, surface: SurfaceId, url: &str) -> bool {
        let mut state = self.state.lock();
        let Some(record) = state.surfaces.get_mut(&surface) else {
            return false;
        };
        if record.seen_urls.iter().any(|seen| seen == url) {
            return false;
        }
        record.seen_urls.push(url.to_string());
        true
    }

    #[cfg(test)]
    pub(crate) fn has_seen(&self, surface: SurfaceId, url: &str) -> bool {
        let state = self.state.lock();
        state
            .surfaces
            .get(&surface)
            .is_some_and(|s| s.seen_urls.iter().any(|seen| seen == url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_windows() -> WindowRegistry {
        let registry = WindowRegistry::new();
        assert!(registry.register_window(WindowId(1), false, SurfaceId(100)));
        assert!(registry.register_window(WindowId(2), true, SurfaceId(200)));
        registry
    }

    #[test]
    fn register_window_tracks_chrome() {
        let registry = registry_with_windows();
        let info = registry.window(WindowId(1)).unwrap();
        assert_eq!(info.chrome, SurfaceId(100));
        assert_eq!(info.surfaces, vec![SurfaceId(100)]);
        assert_eq!(
            registry.resolve(SurfaceId(100)).unwrap().role,
            SurfaceRole::Chrome
        );
        assert!(!registry.register_window(WindowId(1), false, SurfaceId(101)));
        assert_eq!(registry.window_ids(), vec![WindowId(1), WindowId(2)]);
    }

    #[test]
    fn insert_surface_requires_known_window() {
        let registry = registry_with_windows();
        assert!(!registry.insert_surface(SurfaceId(5), SurfaceRole::Content, WindowId(9)));
        assert!(registry.insert_surface(SurfaceId(5), SurfaceRole::Content, WindowId(1)));
        assert!(!registry.insert_surface(SurfaceId(5), SurfaceRole::Content, WindowId(2)));
        assert_eq!(registry.owner_window(SurfaceId(5)), Some(WindowId(1)));
    }

    #[test]
    fn reparent_moves_ownership_atomically() {
        let registry = registry_with_windows();
        registry.insert_surface(SurfaceId(5), SurfaceRole::Content, WindowId(1));
        assert_eq!(registry.reparent(SurfaceId(5), WindowId(2)), Some(WindowId(1)));
        assert_eq!(registry.owner_window(SurfaceId(5)), Some(WindowId(2)));
        assert!(!registry
            .window(WindowId(1))
            .unwrap()
            .surfaces
            .contains(&SurfaceId(5)));
        assert!(registry
            .window(WindowId(2))
            .unwrap()
            .surfaces
            .contains(&SurfaceId(5)));
    }

    #[test]
    fn reparent_refuses_chrome_and_unknown_targets() {
        let registry = registry_with_windows();
        registry.insert_surface(SurfaceId(5), SurfaceRole::Content, WindowId(1));
        assert_eq!(registry.reparent(SurfaceId(100), WindowId(2)), None);
        assert_eq!(registry.reparent(SurfaceId(5), WindowId(42)), None);
        assert_eq!(registry.reparent(SurfaceId(77), WindowId(2)), None);
        assert_eq!(registry.owner_window(SurfaceId(5)), Some(WindowId(1)));
    }

    #[test]
    fn overlay_replaces_previous() {
        let registry = registry_with_windows();
        assert!(registry.set_overlay(WindowId(1), SurfaceId(10)));
        assert!(registry.set_overlay(WindowId(1), SurfaceId(11)));
        assert_eq!(registry.overlay_of(WindowId(1)), Some(SurfaceId(11)));
        assert!(registry.resolve(SurfaceId(10)).is_none());
        assert!(registry.is_overlay(SurfaceId(11)));
        assert_eq!(registry.clear_overlay(WindowId(1)), Some(SurfaceId(11)));
        assert_eq!(registry.window(WindowId(1)).unwrap().surfaces, vec![SurfaceId(100)]);
    }

    #[test]
    fn tabs_of_lists_only_tab_roles() {
        let registry = registry_with_windows();
        registry.insert_surface(SurfaceId(5), SurfaceRole::Content, WindowId(1));
        registry.insert_surface(SurfaceId(6), SurfaceRole::Inspector, WindowId(1));
        registry.insert_surface(SurfaceId(7), SurfaceRole::Placeholder, WindowId(1));
        registry.set_overlay(WindowId(1), SurfaceId(8));
        assert_eq!(
            registry.tabs_of(WindowId(1)),
            vec![SurfaceId(5), SurfaceId(7)]
        );
        assert!(registry.tabs_of(WindowId(42)).is_empty());
    }

    #[test]
    fn remove_window_drops_owned_surfaces() {
        let registry = registry_with_windows();
        registry.insert_surface(SurfaceId(5), SurfaceRole::Content, WindowId(1));
        let removed = registry.remove_window(WindowId(1)).unwrap();
        assert_eq!(removed, vec![SurfaceId(100), SurfaceId(5)]);
        assert!(registry.resolve(SurfaceId(5)).is_none());
        assert_eq!(registry.window_ids(), vec![WindowId(2)]);
        assert!(registry.remove_window(WindowId(1)).is_none());
    }

    #[test]
    fn classify_follows_markers() {
        assert_eq!(
            SurfaceRole::Content.classify("app://x/inspect-abc", "inspect-abc", "newtab-xyz"),
            SurfaceRole::Inspector
        );
        assert_eq!(
            SurfaceRole::Content.classify("app://newtab-xyz/search", "inspect-abc", "newtab-xyz"),
            SurfaceRole::Placeholder
        );
        assert_eq!(
            SurfaceRole::Placeholder.classify("https://example.com", "inspect-abc", "newtab-xyz"),
            SurfaceRole::Content
        );
        assert_eq!(
            SurfaceRole::Chrome.classify("app://x/inspect-abc", "inspect-abc", "newtab-xyz"),
            SurfaceRole::Chrome
        );
    }

    #[test]
    fn one_shot_listeners_detach_after_firing() {
        let registry = registry_with_windows();
        registry.insert_surface(SurfaceId(5), SurfaceRole::Content, WindowId(1));
        registry.set_listeners(SurfaceId(5), Listeners::all());
        assert!(registry.fire_listener(SurfaceId(5), Listeners::LOAD_FINISH));
        assert!(!registry.fire_listener(SurfaceId(5), Listeners::LOAD_FINISH));
        assert!(registry.fire_listener(SurfaceId(5), Listeners::TITLE));
        assert!(registry.fire_listener(SurfaceId(5), Listeners::TITLE));
        assert!(!registry.fire_listener(SurfaceId(99), Listeners::TITLE));
    }

    #[test]
    fn claimed_urls_are_per_surface_and_die_with_it() {
        let registry = registry_with_windows();
        registry.insert_surface(SurfaceId(5), SurfaceRole::Content, WindowId(1));
        registry.insert_surface(SurfaceId(6), SurfaceRole::Content, WindowId(1));
        assert!(registry.claim_url(SurfaceId(5), "https://example.com"));
        assert!(!registry.claim_url(SurfaceId(5), "https://example.com"));
        assert!(registry.claim_url(SurfaceId(6), "https://example.com"));
        assert!(registry.has_seen(SurfaceId(5), "https://example.com"));
        registry.remove_surface(SurfaceId(5));
        assert!(!registry.has_seen(SurfaceId(5), "https://example.com"));
        assert!(!registry.claim_url(SurfaceId(5), "https://example.com"));
    }
}
