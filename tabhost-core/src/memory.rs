//! In-process host runtime.
//!
//! Keeps windows, surfaces and their page state in memory and records
//! everything the shell asks of it. The headless driver runs scenarios on
//! top of it, and the unit tests use it as their runtime.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::{DEFAULT_INSPECTOR_MARKER, DEFAULT_NEW_TAB_MARKER};
use crate::events::{SurfaceEvent, SurfaceEventEnvelope};
use crate::geometry::{Point, Rect};
use crate::history::HistoryEntry;
use crate::host::{
    ChromeMessage, ContextMenuBuilder, FaviconSource, HistoryStore, PageState, Partition, Router,
    SurfaceHost,
};
use crate::registry::{SurfaceId, WindowId};
use crate::shell::ShellServices;

#[derive(Debug)]
struct MemorySurface {
    partition: Partition,
    window: Option<WindowId>,
    bounds: Rect,
    auto_resize: bool,
    entries: Vec<String>,
    index: usize,
    title: Option<String>,
    loading: bool,
    favicon_url: Option<String>,
    reloads: usize,
}

impl MemorySurface {
    fn new(partition: Partition) -> Self {
        Self {
            partition,
            window: None,
            bounds: Rect::ZERO,
            auto_resize: false,
            entries: Vec::new(),
            index: 0,
            title: None,
            loading: false,
            favicon_url: None,
            reloads: 0,
        }
    }

    fn current_url(&self) -> Option<&str> {
        self.entries.get(self.index).map(String::as_str)
    }

    fn push_entry(&mut self, url: &str) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(url.to_string());
        self.index = self.entries.len() - 1;
        self.title = None;
        self.favicon_url = None;
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_window: u32,
    next_surface: u32,
    windows: HashMap<WindowId, Rect>,
    chromes: HashMap<WindowId, SurfaceId>,
    surfaces: HashMap<SurfaceId, MemorySurface>,
    cursor: Point,
    focused: Option<SurfaceId>,
    sent: Vec<(SurfaceId, ChromeMessage)>,
    cleared_partitions: Vec<Partition>,
    closed_windows: Vec<WindowId>,
    context_menus: Vec<(SurfaceId, String)>,
    routes: Vec<(SurfaceId, String)>,
    icons: HashMap<String, String>,
    icon_fetches: usize,
    failing_page_state: HashSet<SurfaceId>,
    failing_probe: HashSet<SurfaceId>,
    failing_attach: HashSet<WindowId>,
}

impl MemoryState {
    fn surface(&self, surface: SurfaceId) -> Result<&MemorySurface, String> {
        self.surfaces
            .get(&surface)
            .ok_or_else(|| format!("{} does not exist", surface))
    }

    fn surface_mut(&mut self, surface: SurfaceId) -> Result<&mut MemorySurface, String> {
        self.surfaces
            .get_mut(&surface)
            .ok_or_else(|| format!("{} does not exist", surface))
    }

    fn allocate_surface(&mut self, partition: Partition) -> SurfaceId {
        self.next_surface += 1;
        let id = SurfaceId(self.next_surface);
        self.surfaces.insert(id, MemorySurface::new(partition));
        id
    }
}

/// A host runtime that lives entirely in memory.
pub struct MemoryHost {
    state: Mutex<MemoryState>,
    events: Mutex<Option<mpsc::UnboundedSender<SurfaceEventEnvelope>>>,
    internal_host: String,
    inspector_host: String,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            events: Mutex::new(None),
            internal_host: DEFAULT_NEW_TAB_MARKER.to_string(),
            inspector_host: DEFAULT_INSPECTOR_MARKER.to_string(),
        }
    }

    /// Report page lifecycle events on `tx`, the way a real runtime would.
    pub fn with_events(self, tx: mpsc::UnboundedSender<SurfaceEventEnvelope>) -> Self {
        *self.events.lock() = Some(tx);
        self
    }

    fn emit(&self, surface: SurfaceId, events: Vec<SurfaceEvent>) {
        let guard = self.events.lock();
        let Some(tx) = guard.as_ref() else {
            return;
        };
        for event in events {
            if tx.send(SurfaceEventEnvelope { surface, event }).is_err() {
                log::debug!("Event receiver gone; dropping events for {}", surface);
                return;
            }
        }
    }

    fn navigation_events(url: &str) -> Vec<SurfaceEvent> {
        vec![
            SurfaceEvent::DidStartLoading,
            SurfaceEvent::DidNavigate {
                url: url.to_string(),
            },
            SurfaceEvent::DidFinishLoad,
            SurfaceEvent::DidStopLoading,
        ]
    }

    /// Open a window at `bounds` together with its chrome surface, which
    /// spans the window's width at `chrome_height`.
    pub fn open_window(&self, bounds: Rect, chrome_height: i32) -> (WindowId, SurfaceId) {
        let mut state = self.state.lock();
        state.next_window += 1;
        let window = WindowId(state.next_window);
        state.windows.insert(window, bounds);
        let chrome = state.allocate_surface(Partition::Default);
        if let Some(surface) = state.surfaces.get_mut(&chrome) {
            surface.window = Some(window);
            surface.bounds = Rect::new(0, 0, bounds.width, chrome_height);
            surface.auto_resize = true;
        }
        state.chromes.insert(window, chrome);
        (window, chrome)
    }

    /// A surface that exists but is not attached anywhere yet, e.g. an
    /// overlay about to be shown.
    pub fn create_detached_surface(&self) -> SurfaceId {
        self.state.lock().allocate_surface(Partition::Default)
    }

    /// Resize or move a window. Auto-resizing surfaces follow, the way a
    /// tab showing content keeps filling the area below the chrome.
    pub fn set_window_bounds(&self, window: WindowId, bounds: Rect) {
        let mut state = self.state.lock();
        let Some(previous) = state.windows.insert(window, bounds) else {
            state.windows.remove(&window);
            return;
        };
        let dw = bounds.width - previous.width;
        let dh = bounds.height - previous.height;
        let chrome = state.chromes.get(&window).copied();
        for (id, surface) in state.surfaces.iter_mut() {
            if surface.window != Some(window) || !surface.auto_resize {
                continue;
            }
            surface.bounds.width += dw;
            if Some(*id) != chrome {
                surface.bounds.height += dh;
            }
        }
    }

    pub fn set_cursor(&self, point: Point) {
        self.state.lock().cursor = point;
    }

    /// Simulate the page navigating by itself (link click, redirect).
    pub fn navigate(&self, surface: SurfaceId, url: &str) {
        {
            let mut state = self.state.lock();
            let Ok(record) = state.surface_mut(surface) else {
                return;
            };
            record.push_entry(url);
        }
        self.emit(surface, Self::navigation_events(url));
    }

    pub fn set_title(&self, surface: SurfaceId, title: &str) {
        {
            let mut state = self.state.lock();
            let Ok(record) = state.surface_mut(surface) else {
                return;
            };
            record.title = Some(title.to_string());
        }
        self.emit(
            surface,
            vec![SurfaceEvent::PageTitleUpdated {
                title: title.to_string(),
            }],
        );
    }

    pub fn set_favicon(&self, surface: SurfaceId, favicon_url: &str) {
        {
            let mut state = self.state.lock();
            let Ok(record) = state.surface_mut(surface) else {
                return;
            };
            record.favicon_url = Some(favicon_url.to_string());
        }
        self.emit(
            surface,
            vec![SurfaceEvent::PageFaviconUpdated {
                favicons: vec![favicon_url.to_string()],
            }],
        );
    }

    pub fn set_loading(&self, surface: SurfaceId, loading: bool) {
        if let Ok(record) = self.state.lock().surface_mut(surface) {
            record.loading = loading;
        }
    }

    /// Make `favicon_url` resolve to `data`.
    pub fn register_icon(&self, favicon_url: &str, data: &str) {
        self.state
            .lock()
            .icons
            .insert(favicon_url.to_string(), data.to_string());
    }

    /// Make page-state reads for `surface` fail from now on.
    pub fn fail_page_state(&self, surface: SurfaceId) {
        self.state.lock().failing_page_state.insert(surface);
    }

    /// Refuse to attach anything to `window` from now on.
    pub fn fail_attach(&self, window: WindowId) {
        self.state.lock().failing_attach.insert(window);
    }

    /// Make favicon probes for `surface` fail from now on.
    pub fn fail_probe(&self, surface: SurfaceId) {
        self.state.lock().failing_probe.insert(surface);
    }

    pub fn sent(&self) -> Vec<(SurfaceId, ChromeMessage)> {
        self.state.lock().sent.clone()
    }

    /// Messages delivered to the chrome of `window`, oldest first.
    pub fn sent_to(&self, window: WindowId) -> Vec<ChromeMessage> {
        let state = self.state.lock();
        let Some(chrome) = state.chromes.get(&window).copied() else {
            return Vec::new();
        };
        state
            .sent
            .iter()
            .filter(|(to, _)| *to == chrome)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    pub fn chrome_of(&self, window: WindowId) -> Option<SurfaceId> {
        self.state.lock().chromes.get(&window).copied()
    }

    pub fn bounds_of(&self, surface: SurfaceId) -> Option<Rect> {
        self.state.lock().surfaces.get(&surface).map(|s| s.bounds)
    }

    pub fn auto_resize_of(&self, surface: SurfaceId) -> Option<bool> {
        self.state.lock().surfaces.get(&surface).map(|s| s.auto_resize)
    }

    pub fn window_bounds_of(&self, window: WindowId) -> Option<Rect> {
        self.state.lock().windows.get(&window).copied()
    }

    pub fn window_of(&self, surface: SurfaceId) -> Option<WindowId> {
        self.state.lock().surfaces.get(&surface)?.window
    }

    pub fn partition_of(&self, surface: SurfaceId) -> Option<Partition> {
        self.state
            .lock()
            .surfaces
            .get(&surface)
            .map(|s| s.partition.clone())
    }

    pub fn current_url(&self, surface: SurfaceId) -> Option<String> {
        let state = self.state.lock();
        state.surfaces.get(&surface)?.current_url().map(String::from)
    }

    pub fn reloads(&self, surface: SurfaceId) -> usize {
        self.state
            .lock()
            .surfaces
            .get(&surface)
            .map_or(0, |s| s.reloads)
    }

    pub fn surface_exists(&self, surface: SurfaceId) -> bool {
        self.state.lock().surfaces.contains_key(&surface)
    }

    pub fn focused(&self) -> Option<SurfaceId> {
        self.state.lock().focused
    }

    pub fn cleared_partitions(&self) -> Vec<Partition> {
        self.state.lock().cleared_partitions.clone()
    }

    pub fn closed_windows(&self) -> Vec<WindowId> {
        self.state.lock().closed_windows.clone()
    }

    pub fn context_menus(&self) -> Vec<(SurfaceId, String)> {
        self.state.lock().context_menus.clone()
    }

    pub fn routes(&self) -> Vec<(SurfaceId, String)> {
        self.state.lock().routes.clone()
    }

    pub fn icon_fetches(&self) -> usize {
        self.state.lock().icon_fetches
    }
}

#[async_trait]
impl SurfaceHost for MemoryHost {
    async fn create_surface(&self, partition: &Partition) -> Result<SurfaceId, String> {
        Ok(self.state.lock().allocate_surface(partition.clone()))
    }

    async fn clear_partition(&self, partition: &Partition) -> Result<(), String> {
        self.state.lock().cleared_partitions.push(partition.clone());
        Ok(())
    }

    async fn destroy_surface(&self, surface: SurfaceId) -> Result<(), String> {
        let mut state = self.state.lock();
        state
            .surfaces
            .remove(&surface)
            .map(|_| ())
            .ok_or_else(|| format!("{} does not exist", surface))
    }

    async fn attach(&self, window: WindowId, surface: SurfaceId) -> Result<(), String> {
        let mut state = self.state.lock();
        if !state.windows.contains_key(&window) {
            return Err(format!("{} does not exist", window));
        }
        if state.failing_attach.contains(&window) {
            return Err(format!("{} refused the surface", window));
        }
        state.surface_mut(surface)?.window = Some(window);
        Ok(())
    }

    async fn detach(&self, window: WindowId, surface: SurfaceId) -> Result<(), String> {
        let mut state = self.state.lock();
        let record = state.surface_mut(surface)?;
        if record.window == Some(window) {
            record.window = None;
        }
        Ok(())
    }

    async fn set_bounds(&self, surface: SurfaceId, bounds: Rect) -> Result<(), String> {
        self.state.lock().surface_mut(surface)?.bounds = bounds;
        Ok(())
    }

    async fn set_auto_resize(&self, surface: SurfaceId, enabled: bool) -> Result<(), String> {
        self.state.lock().surface_mut(surface)?.auto_resize = enabled;
        Ok(())
    }

    async fn bounds(&self, surface: SurfaceId) -> Result<Rect, String> {
        Ok(self.state.lock().surface(surface)?.bounds)
    }

    async fn window_bounds(&self, window: WindowId) -> Result<Rect, String> {
        self.state
            .lock()
            .windows
            .get(&window)
            .copied()
            .ok_or_else(|| format!("{} does not exist", window))
    }

    async fn cursor_position(&self) -> Point {
        self.state.lock().cursor
    }

    async fn close_window(&self, window: WindowId) -> Result<(), String> {
        let mut state = self.state.lock();
        if state.windows.remove(&window).is_none() {
            return Err(format!("{} does not exist", window));
        }
        state.surfaces.retain(|_, s| s.window != Some(window));
        state.closed_windows.push(window);
        Ok(())
    }

    async fn load_url(&self, surface: SurfaceId, url: &str) -> Result<(), String> {
        self.state.lock().surface_mut(surface)?.push_entry(url);
        self.emit(surface, Self::navigation_events(url));
        Ok(())
    }

    async fn page_state(&self, surface: SurfaceId) -> Result<PageState, String> {
        let state = self.state.lock();
        if state.failing_page_state.contains(&surface) {
            return Err(format!("{} is not responding", surface));
        }
        let record = state.surface(surface)?;
        Ok(PageState {
            title: record.title.clone(),
            url: record.current_url().unwrap_or_default().to_string(),
            is_loading: record.loading,
            can_go_back: record.index > 0,
            can_go_forward: record.index + 1 < record.entries.len(),
        })
    }

    async fn go_back(&self, surface: SurfaceId) -> Result<(), String> {
        let url = {
            let mut state = self.state.lock();
            let record = state.surface_mut(surface)?;
            if record.index == 0 {
                return Err("no earlier entry".to_string());
            }
            record.index -= 1;
            record.title = None;
            record.current_url().unwrap_or_default().to_string()
        };
        self.emit(surface, Self::navigation_events(&url));
        Ok(())
    }

    async fn go_forward(&self, surface: SurfaceId) -> Result<(), String> {
        let url = {
            let mut state = self.state.lock();
            let record = state.surface_mut(surface)?;
            if record.index + 1 >= record.entries.len() {
                return Err("no later entry".to_string());
            }
            record.index += 1;
            record.title = None;
            record.current_url().unwrap_or_default().to_string()
        };
        self.emit(surface, Self::navigation_events(&url));
        Ok(())
    }

    async fn reload(&self, surface: SurfaceId) -> Result<(), String> {
        self.state.lock().surface_mut(surface)?.reloads += 1;
        self.emit(
            surface,
            vec![SurfaceEvent::DidStartLoading, SurfaceEvent::DidStopLoading],
        );
        Ok(())
    }

    async fn focus(&self, surface: SurfaceId) -> Result<(), String> {
        let mut state = self.state.lock();
        state.surface(surface)?;
        state.focused = Some(surface);
        Ok(())
    }

    async fn open_inspector(&self, surface: SurfaceId) -> Result<Option<SurfaceId>, String> {
        let mut state = self.state.lock();
        let window = state.surface(surface)?.window;
        let Some(window) = window else {
            return Ok(None);
        };
        let inspector = state.allocate_surface(Partition::Default);
        let url = format!("tabhost://{}/inspect?target={}", self.inspector_host, surface.0);
        if let Some(record) = state.surfaces.get_mut(&inspector) {
            record.window = Some(window);
            record.push_entry(&url);
        }
        Ok(Some(inspector))
    }

    async fn send(&self, surface: SurfaceId, message: &ChromeMessage) -> Result<(), String> {
        let mut state = self.state.lock();
        state.surface(surface)?;
        state.sent.push((surface, message.clone()));
        Ok(())
    }
}

#[async_trait]
impl FaviconSource for MemoryHost {
    async fn probe(&self, surface: SurfaceId) -> Result<Option<String>, String> {
        let state = self.state.lock();
        if state.failing_probe.contains(&surface) {
            return Err(format!("script execution failed in {}", surface));
        }
        Ok(state.surface(surface)?.favicon_url.clone())
    }

    async fn fetch(&self, _page_url: &str, favicon_url: &str) -> Result<Option<String>, String> {
        let mut state = self.state.lock();
        state.icon_fetches += 1;
        Ok(state.icons.get(favicon_url).cloned())
    }
}

#[async_trait]
impl Router for MemoryHost {
    async fn load_route(&self, surface: SurfaceId, route: &str) -> Result<(), String> {
        let url = format!("tabhost://{}/{}", self.internal_host, route);
        {
            let mut state = self.state.lock();
            state.surface_mut(surface)?.push_entry(&url);
            state.routes.push((surface, route.to_string()));
        }
        self.emit(surface, Self::navigation_events(&url));
        Ok(())
    }
}

impl ContextMenuBuilder for MemoryHost {
    fn show(&self, surface: SurfaceId, scope: &str) {
        self.state
            .lock()
            .context_menus
            .push((surface, scope.to_string()));
    }
}

/// History kept in a vector.
#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
    failing: Mutex<bool>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().clone()
    }

    /// Reject every write while set.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn add_history(&self, entry: HistoryEntry) -> Result<(), String> {
        if *self.failing.lock() {
            return Err("history store unavailable".to_string());
        }
        self.entries.lock().push(entry);
        Ok(())
    }
}

/// Wire a [`MemoryHost`] and [`MemoryHistory`] into a service set.
pub fn memory_services(host: &Arc<MemoryHost>, history: &Arc<MemoryHistory>) -> ShellServices {
    ShellServices {
        host: host.clone(),
        favicons: host.clone(),
        history: history.clone(),
        router: host.clone(),
        menus: host.clone(),
    }
}
