use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::registry::SurfaceId;
use crate::shell::Shell;

bitflags! {
    /// Content events a surface is currently listening for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Listeners: u16 {
        const TITLE = 1 << 0;
        const LOAD_START = 1 << 1;
        const LOAD_FINISH = 1 << 2;
        const LOAD_STOP = 1 << 3;
        const LOAD_FAIL = 1 << 4;
        const CONTEXT_MENU = 1 << 5;
        const NAVIGATE = 1 << 6;
        const FAVICON = 1 << 7;

        /// Listeners that detach themselves after their first event.
        const ONE_SHOT = Self::LOAD_FINISH.bits() | Self::LOAD_STOP.bits();
    }
}

/// Lifecycle events reported by the runtime for a content surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SurfaceEvent {
    PageTitleUpdated { title: String },
    DidStartLoading,
    DidFinishLoad,
    DidStopLoading,
    DidFailLoad { error_code: i32, description: String },
    ContextMenu,
    DidNavigate { url: String },
    PageFaviconUpdated { favicons: Vec<String> },
}

impl SurfaceEvent {
    pub fn listener(&self) -> Listeners {
        match self {
            SurfaceEvent::PageTitleUpdated { .. } => Listeners::TITLE,
            SurfaceEvent::DidStartLoading => Listeners::LOAD_START,
            SurfaceEvent::DidFinishLoad => Listeners::LOAD_FINISH,
            SurfaceEvent::DidStopLoading => Listeners::LOAD_STOP,
            SurfaceEvent::DidFailLoad { .. } => Listeners::LOAD_FAIL,
            SurfaceEvent::ContextMenu => Listeners::CONTEXT_MENU,
            SurfaceEvent::DidNavigate { .. } => Listeners::NAVIGATE,
            SurfaceEvent::PageFaviconUpdated { .. } => Listeners::FAVICON,
        }
    }
}

/// A [`SurfaceEvent`] tagged with the surface that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceEventEnvelope {
    pub surface: SurfaceId,
    #[serde(flatten)]
    pub event: SurfaceEvent,
}

impl Shell {
    /// Attach the full listener set to a surface, replacing whatever it had.
    ///
    /// Returns `false` if the surface is not attached to a window with a
    /// chrome surface; such a surface has nowhere to report to.
    pub fn apply_tab_listeners(&self, surface: SurfaceId) -> bool {
        let Some(window) = self.registry.owner_window(surface) else {
            return false;
        };
        if self.registry.chrome_of(window).is_none() {
            return false;
        }
        self.registry.set_listeners(surface, Listeners::all())
    }

    /// Detach every listener. Events that arrive afterwards are dropped.
    pub fn remove_tab_listeners(&self, surface: SurfaceId) {
        self.registry.set_listeners(surface, Listeners::empty());
    }

    /// Route one content event to its effect.
    pub async fn dispatch(&self, surface: SurfaceId, event: SurfaceEvent) {
        if !self.registry.fire_listener(surface, event.listener()) {
            log::debug!("No listener on {} for {:?}; dropped", surface, event);
            return;
        }

        match event {
            SurfaceEvent::PageTitleUpdated { .. }
            | SurfaceEvent::DidStartLoading
            | SurfaceEvent::DidFinishLoad
            | SurfaceEvent::DidStopLoading => self.refresh_owner(surface, None).await,
            SurfaceEvent::DidFailLoad {
                error_code,
                description,
            } => {
                log::warn!(
                    "Load failed in {} ({}): {}",
                    surface,
                    error_code,
                    description
                );
                self.refresh_owner(surface, None).await;
            }
            SurfaceEvent::ContextMenu => {
                self.services
                    .menus
                    .show(surface, &self.config.context_menu_scope);
            }
            SurfaceEvent::DidNavigate { url } => {
                self.registry.classify(
                    surface,
                    &url,
                    &self.config.inspector_marker,
                    &self.config.new_tab_marker,
                );
                self.record_navigation(surface, &url).await;
            }
            SurfaceEvent::PageFaviconUpdated { favicons } => {
                let favicon = favicons.first().map(String::as_str);
                self.refresh_owner(surface, favicon).await;
            }
        }
    }

    /// Drain runtime events until the sender side closes. Events are handled
    /// one at a time, in arrival order.
    pub async fn run_events(&self, mut rx: mpsc::UnboundedReceiver<SurfaceEventEnvelope>) {
        while let Some(envelope) = rx.recv().await {
            self.dispatch(envelope.surface, envelope.event).await;
        }
        log::debug!("Surface event channel closed");
    }

    async fn refresh_owner(&self, surface: SurfaceId, favicon: Option<&str>) {
        let Some(window) = self.registry.owner_window(surface) else {
            return;
        };
        self.push_tabs(window, favicon.map(|url| (surface, url)))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ChromeMessage;
    use crate::test_support::Fixture;

    #[test]
    fn envelope_wire_format() {
        let envelope = SurfaceEventEnvelope {
            surface: SurfaceId(3),
            event: SurfaceEvent::DidNavigate {
                url: "https://example.com".into(),
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"surface": 3, "event": "did-navigate", "url": "https://example.com"})
        );
        let back: SurfaceEventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[tokio::test]
    async fn content_events_push_tab_lists() {
        let fx = Fixture::new();
        let window = fx.open_window(false);
        let tab = fx.shell.create_tab(window, Some("https://example.com")).await.unwrap();
        fx.host.set_title(tab, "Example Domain");
        fx.host.clear_sent();

        fx.shell
            .dispatch(
                tab,
                SurfaceEvent::PageTitleUpdated {
                    title: "Example Domain".into(),
                },
            )
            .await;

        let tabs = fx.last_tabs(window).unwrap();
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].title, "Example Domain");
    }

    #[tokio::test]
    async fn one_shot_load_events_fire_once() {
        let fx = Fixture::new();
        let window = fx.open_window(false);
        let tab = fx.shell.create_tab(window, Some("https://example.com")).await.unwrap();
        fx.host.clear_sent();

        fx.shell.dispatch(tab, SurfaceEvent::DidStopLoading).await;
        fx.shell.dispatch(tab, SurfaceEvent::DidStopLoading).await;
        fx.shell.dispatch(tab, SurfaceEvent::DidFinishLoad).await;
        fx.shell.dispatch(tab, SurfaceEvent::DidFinishLoad).await;
        fx.shell.dispatch(tab, SurfaceEvent::DidStartLoading).await;
        fx.shell.dispatch(tab, SurfaceEvent::DidStartLoading).await;

        assert_eq!(fx.tab_updates(window), 4);
    }

    #[tokio::test]
    async fn removed_listeners_drop_late_events() {
        let fx = Fixture::new();
        let window = fx.open_window(false);
        let tab = fx.shell.create_tab(window, Some("https://example.com")).await.unwrap();
        fx.shell.remove_tab_listeners(tab);
        fx.host.clear_sent();

        fx.shell.dispatch(tab, SurfaceEvent::DidStartLoading).await;
        fx.shell
            .dispatch(
                tab,
                SurfaceEvent::DidNavigate {
                    url: "https://example.org".into(),
                },
            )
            .await;

        assert_eq!(fx.tab_updates(window), 0);
        assert!(fx.history.entries().is_empty());
    }

    #[tokio::test]
    async fn events_for_unknown_surfaces_are_ignored() {
        let fx = Fixture::new();
        let window = fx.open_window(false);
        fx.host.clear_sent();
        fx.shell
            .dispatch(SurfaceId(4242), SurfaceEvent::DidStartLoading)
            .await;
        assert_eq!(fx.tab_updates(window), 0);
    }

    #[tokio::test]
    async fn context_menu_uses_body_scope() {
        let fx = Fixture::new();
        let window = fx.open_window(false);
        let tab = fx.shell.create_tab(window, Some("https://example.com")).await.unwrap();

        fx.shell.dispatch(tab, SurfaceEvent::ContextMenu).await;
        assert_eq!(fx.host.context_menus(), vec![(tab, "body".to_string())]);
    }

    #[tokio::test]
    async fn failed_load_still_refreshes() {
        let fx = Fixture::new();
        let window = fx.open_window(false);
        let tab = fx.shell.create_tab(window, Some("https://example.com")).await.unwrap();
        fx.host.clear_sent();

        fx.shell
            .dispatch(
                tab,
                SurfaceEvent::DidFailLoad {
                    error_code: -105,
                    description: "ERR_NAME_NOT_RESOLVED".into(),
                },
            )
            .await;
        assert_eq!(fx.tab_updates(window), 1);
    }

    #[tokio::test]
    async fn favicon_update_only_overrides_its_own_tab() {
        let fx = Fixture::new();
        let window = fx.open_window(false);
        let first = fx.shell.create_tab(window, Some("https://a.example")).await.unwrap();
        let second = fx.shell.create_tab(window, Some("https://b.example")).await.unwrap();
        fx.host.register_icon("https://a.example/new.png", "NEW");
        fx.host.register_icon("https://b.example/favicon.ico", "B");

        fx.shell
            .dispatch(
                first,
                SurfaceEvent::PageFaviconUpdated {
                    favicons: vec!["https://a.example/new.png".into()],
                },
            )
            .await;

        let tabs = fx.last_tabs(window).unwrap();
        let favicon_of = |id| {
            tabs.iter()
                .find(|t| t.id == id)
                .and_then(|t| t.favicon.clone())
        };
        assert_eq!(favicon_of(first).as_deref(), Some("NEW"));
        assert_eq!(favicon_of(second).as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn run_events_preserves_order() {
        let fx = Fixture::new();
        let window = fx.open_window(false);
        let tab = fx.shell.create_tab(window, Some("https://example.com")).await.unwrap();
        fx.host.clear_sent();

        let (tx, rx) = mpsc::unbounded_channel();
        for event in [
            SurfaceEvent::DidStartLoading,
            SurfaceEvent::DidNavigate {
                url: "https://example.com/next".into(),
            },
            SurfaceEvent::DidStopLoading,
        ] {
            tx.send(SurfaceEventEnvelope {
                surface: tab,
                event,
            })
            .unwrap();
        }
        drop(tx);
        fx.shell.run_events(rx).await;

        assert_eq!(fx.tab_updates(window), 2);
        assert_eq!(fx.history.entries().len(), 1);
        assert!(matches!(
            fx.host.sent_to(window).last(),
            Some(ChromeMessage::TabsUpdated(_))
        ));
    }
}
