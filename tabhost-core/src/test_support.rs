use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::ShellConfig;
use crate::geometry::{Point, Rect};
use crate::host::{ChromeMessage, FaviconSource, PageState, Partition, SurfaceHost};
use crate::memory::{memory_services, MemoryHistory, MemoryHost};
use crate::registry::{SurfaceId, WindowId};
use crate::shell::{Shell, ShellServices};
use crate::tabs::TabSnapshot;

pub const WINDOW_BOUNDS: Rect = Rect {
    x: 100,
    y: 100,
    width: 1200,
    height: 800,
};

/// Runtime calls that can be held open by [`GatedHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    PageState,
    SetBounds,
    Probe,
}

struct Gate {
    call: Call,
    surface: SurfaceId,
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// A call suspended inside the runtime.
pub struct Pause {
    reached: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl Pause {
    /// Wait for the gated call to start, run `during` while it is
    /// suspended, then let it finish.
    pub async fn during(self, during: impl FnOnce()) {
        self.reached.await.expect("gated call was never made");
        during();
        let _ = self.release.send(());
    }
}

/// Passes every call through to a [`MemoryHost`], except that one chosen
/// call can be held open so the test can change shell state under it.
pub struct GatedHost {
    inner: Arc<MemoryHost>,
    gate: Mutex<Option<Gate>>,
}

impl GatedHost {
    pub fn new(inner: Arc<MemoryHost>) -> Self {
        Self {
            inner,
            gate: Mutex::new(None),
        }
    }

    /// Hold the next `call` made for `surface`.
    pub fn pause(&self, call: Call, surface: SurfaceId) -> Pause {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.gate.lock() = Some(Gate {
            call,
            surface,
            reached: reached_tx,
            release: release_rx,
        });
        Pause {
            reached: reached_rx,
            release: release_tx,
        }
    }

    async fn checkpoint(&self, call: Call, surface: SurfaceId) {
        let gate = {
            let mut slot = self.gate.lock();
            match slot.as_ref() {
                Some(gate) if gate.call == call && gate.surface == surface => slot.take(),
                _ => None,
            }
        };
        if let Some(gate) = gate {
            let _ = gate.reached.send(());
            let _ = gate.release.await;
        }
    }
}

#[async_trait]
impl SurfaceHost for GatedHost {
    async fn create_surface(&self, partition: &Partition) -> Result<SurfaceId, String> {
        self.inner.create_surface(partition).await
    }

    async fn clear_partition(&self, partition: &Partition) -> Result<(), String> {
        self.inner.clear_partition(partition).await
    }

    async fn destroy_surface(&self, surface: SurfaceId) -> Result<(), String> {
        self.inner.destroy_surface(surface).await
    }

    async fn attach(&self, window: WindowId, surface: SurfaceId) -> Result<(), String> {
        self.inner.attach(window, surface).await
    }

    async fn detach(&self, window: WindowId, surface: SurfaceId) -> Result<(), String> {
        self.inner.detach(window, surface).await
    }

    async fn set_bounds(&self, surface: SurfaceId, bounds: Rect) -> Result<(), String> {
        self.checkpoint(Call::SetBounds, surface).await;
        self.inner.set_bounds(surface, bounds).await
    }

    async fn set_auto_resize(&self, surface: SurfaceId, enabled: bool) -> Result<(), String> {
        self.inner.set_auto_resize(surface, enabled).await
    }

    async fn bounds(&self, surface: SurfaceId) -> Result<Rect, String> {
        self.inner.bounds(surface).await
    }

    async fn window_bounds(&self, window: WindowId) -> Result<Rect, String> {
        self.inner.window_bounds(window).await
    }

    async fn cursor_position(&self) -> Point {
        self.inner.cursor_position().await
    }

    async fn close_window(&self, window: WindowId) -> Result<(), String> {
        self.inner.close_window(window).await
    }

    async fn load_url(&self, surface: SurfaceId, url: &str) -> Result<(), String> {
        self.inner.load_url(surface, url).await
    }

    async fn page_state(&self, surface: SurfaceId) -> Result<PageState, String> {
        self.checkpoint(Call::PageState, surface).await;
        self.inner.page_state(surface).await
    }

    async fn go_back(&self, surface: SurfaceId) -> Result<(), String> {
        self.inner.go_back(surface).await
    }

    async fn go_forward(&self, surface: SurfaceId) -> Result<(), String> {
        self.inner.go_forward(surface).await
    }

    async fn reload(&self, surface: SurfaceId) -> Result<(), String> {
        self.inner.reload(surface).await
    }

    async fn focus(&self, surface: SurfaceId) -> Result<(), String> {
        self.inner.focus(surface).await
    }

    async fn open_inspector(&self, surface: SurfaceId) -> Result<Option<SurfaceId>, String> {
        self.inner.open_inspector(surface).await
    }

    async fn send(&self, surface: SurfaceId, message: &ChromeMessage) -> Result<(), String> {
        self.inner.send(surface, message).await
    }
}

#[async_trait]
impl FaviconSource for GatedHost {
    async fn probe(&self, surface: SurfaceId) -> Result<Option<String>, String> {
        self.checkpoint(Call::Probe, surface).await;
        self.inner.probe(surface).await
    }

    async fn fetch(&self, page_url: &str, favicon_url: &str) -> Result<Option<String>, String> {
        self.inner.fetch(page_url, favicon_url).await
    }
}

/// A shell wired to an in-memory runtime with default settings.
pub struct Fixture {
    pub shell: Shell,
    pub host: Arc<MemoryHost>,
    pub history: Arc<MemoryHistory>,
    pub gate: Arc<GatedHost>,
}

impl Fixture {
    pub fn new() -> Self {
        let host = Arc::new(MemoryHost::new());
        let history = Arc::new(MemoryHistory::new());
        let gate = Arc::new(GatedHost::new(host.clone()));
        let services = ShellServices {
            host: gate.clone(),
            favicons: gate.clone(),
            ..memory_services(&host, &history)
        };
        let shell = Shell::new(services, ShellConfig::default());
        Self {
            shell,
            host,
            history,
            gate,
        }
    }

    pub fn open_window(&self, private: bool) -> WindowId {
        let chrome_height = self.shell.config().chrome_height;
        let (window, chrome) = self.host.open_window(WINDOW_BOUNDS, chrome_height);
        assert!(self.shell.open_window(window, private, chrome));
        window
    }

    pub fn chrome_of(&self, window: WindowId) -> SurfaceId {
        self.host.chrome_of(window).expect("window has chrome")
    }

    /// The most recent tab list pushed to the window's chrome.
    pub fn last_tabs(&self, window: WindowId) -> Option<Vec<TabSnapshot>> {
        self.host
            .sent_to(window)
            .into_iter()
            .rev()
            .find_map(|message| match message {
                ChromeMessage::TabsUpdated(tabs) => Some(tabs),
                _ => None,
            })
    }

    pub fn tab_updates(&self, window: WindowId) -> usize {
        self.host
            .sent_to(window)
            .iter()
            .filter(|message| matches!(message, ChromeMessage::TabsUpdated(_)))
            .count()
    }
}
