//! Seams to the host runtime and the other collaborators the shell drives.
//!
//! Every call here may suspend, and other events can run while it does.
//! Callers must not assume anything they looked up before the call still
//! holds after it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::history::HistoryEntry;
use crate::registry::{SurfaceId, WindowId};
use crate::tabs::TabSnapshot;

/// Storage partition a content surface is created in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Partition {
    /// The persistent default partition.
    Default,
    /// A named, non-persistent partition.
    Isolated(String),
}

/// What the runtime currently reports for a content surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageState {
    /// `None` until the page supplies a title.
    pub title: Option<String>,
    pub url: String,
    pub is_loading: bool,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

/// Messages pushed to a window's chrome surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "kebab-case")]
pub enum ChromeMessage {
    SelectedTabUpdated(SurfaceId),
    TabsUpdated(Vec<TabSnapshot>),
    FocusingSearch,
}

/// The runtime that owns real windows and content surfaces.
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    /// Create a detached content surface. The runtime assigns its id.
    async fn create_surface(&self, partition: &Partition) -> Result<SurfaceId, String>;
    async fn clear_partition(&self, partition: &Partition) -> Result<(), String>;
    async fn destroy_surface(&self, surface: SurfaceId) -> Result<(), String>;

    async fn attach(&self, window: WindowId, surface: SurfaceId) -> Result<(), String>;
    async fn detach(&self, window: WindowId, surface: SurfaceId) -> Result<(), String>;

    async fn set_bounds(&self, surface: SurfaceId, bounds: Rect) -> Result<(), String>;
    /// Whether the surface follows its window's size from now on.
    async fn set_auto_resize(&self, surface: SurfaceId, enabled: bool) -> Result<(), String>;
    async fn bounds(&self, surface: SurfaceId) -> Result<Rect, String>;
    /// Screen position and size of a window.
    async fn window_bounds(&self, window: WindowId) -> Result<Rect, String>;
    async fn cursor_position(&self) -> Point;
    async fn close_window(&self, window: WindowId) -> Result<(), String>;

    async fn load_url(&self, surface: SurfaceId, url: &str) -> Result<(), String>;
    async fn page_state(&self, surface: SurfaceId) -> Result<PageState, String>;
    async fn go_back(&self, surface: SurfaceId) -> Result<(), String>;
    async fn go_forward(&self, surface: SurfaceId) -> Result<(), String>;
    async fn reload(&self, surface: SurfaceId) -> Result<(), String>;
    async fn focus(&self, surface: SurfaceId) -> Result<(), String>;
    /// Open the inspector for a surface. Returns the inspector's own surface
    /// when the runtime docks it inside the window.
    async fn open_inspector(&self, surface: SurfaceId) -> Result<Option<SurfaceId>, String>;

    async fn send(&self, surface: SurfaceId, message: &ChromeMessage) -> Result<(), String>;
}

/// Best-effort favicon lookup.
#[async_trait]
pub trait FaviconSource: Send + Sync {
    /// Icon URL declared by the page currently loaded in `surface`.
    async fn probe(&self, surface: SurfaceId) -> Result<Option<String>, String>;
    /// Fetch and encode the icon at `favicon_url` for a page at `page_url`.
    async fn fetch(&self, page_url: &str, favicon_url: &str) -> Result<Option<String>, String>;
}

/// Write-only history storage.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn add_history(&self, entry: HistoryEntry) -> Result<(), String>;
}

/// Loads internal pages by route.
#[async_trait]
pub trait Router: Send + Sync {
    async fn load_route(&self, surface: SurfaceId, route: &str) -> Result<(), String>;
}

/// Fire-and-forget context menu.
pub trait ContextMenuBuilder: Send + Sync {
    fn show(&self, surface: SurfaceId, scope: &str);
}
