//! Scripted runs of the shell against the in-memory runtime.
//!
//! A scenario is a JSON document listing steps. Windows and tabs are
//! referred to by names the scenario picks; every message the shell sends
//! to a chrome surface, every drop outcome and the final history are
//! written to stdout as JSON lines.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tabhost_core::memory::{MemoryHistory, MemoryHost};
use tabhost_core::{
    DropOutcome, Point, Rect, Shell, ShellConfig, SurfaceEventEnvelope, SurfaceId, WindowId,
};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: Option<ShellConfig>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    OpenWindow {
        name: String,
        #[serde(default)]
        private: bool,
        #[serde(default = "default_bounds")]
        bounds: Rect,
    },
    MoveWindow { window: String, bounds: Rect },
    CloseWindow { window: String },
    CreateTab {
        window: String,
        name: String,
        #[serde(default)]
        url: Option<String>,
    },
    SelectTab { tab: String },
    DeleteTab { tab: String },
    Navigate { tab: String, url: String },
    SetTitle { tab: String, title: String },
    SetFavicon { tab: String, url: String },
    GoBack { tab: String },
    GoForward { tab: String },
    Refresh { tab: String },
    Inspect { tab: String },
    OpenOverlay { window: String },
    CloseOverlay { window: String },
    MoveTabs { tabs: Vec<String>, window: String },
    DropTabs { tabs: Vec<String>, cursor: Point },
    UpdateAll,
}

fn default_bounds() -> Rect {
    Rect::new(100, 100, 1200, 800)
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&contents)
            .map_err(|e| format!("Invalid scenario {}: {}", path.display(), e))
    }

    /// Two windows, a few visits and a tab dragged from one to the other.
    pub fn demo() -> Self {
        let window = |name: &str, x| Step::OpenWindow {
            name: name.into(),
            private: false,
            bounds: Rect::new(x, 100, 1000, 700),
        };
        let tab = |window: &str, name: &str, url: Option<&str>| Step::CreateTab {
            window: window.into(),
            name: name.into(),
            url: url.map(String::from),
        };
        Self {
            config: None,
            steps: vec![
                window("left", 0),
                window("right", 1100),
                tab("left", "blank", None),
                tab("left", "docs", Some("https://docs.rs")),
                tab("right", "crates", Some("https://crates.io")),
                Step::SetTitle {
                    tab: "docs".into(),
                    title: "Docs.rs".into(),
                },
                Step::SelectTab { tab: "docs".into() },
                Step::Navigate {
                    tab: "blank".into(),
                    url: "https://www.rust-lang.org".into(),
                },
                Step::DropTabs {
                    tabs: vec!["docs".into()],
                    cursor: Point::new(1200, 140),
                },
            ],
        }
    }
}

pub struct Runner {
    shell: Shell,
    host: Arc<MemoryHost>,
    history: Arc<MemoryHistory>,
    events: mpsc::UnboundedReceiver<SurfaceEventEnvelope>,
    windows: HashMap<String, WindowId>,
    tabs: HashMap<String, SurfaceId>,
    reported: usize,
}

impl Runner {
    pub fn new(
        shell: Shell,
        host: Arc<MemoryHost>,
        history: Arc<MemoryHistory>,
        events: mpsc::UnboundedReceiver<SurfaceEventEnvelope>,
    ) -> Self {
        Self {
            shell,
            host,
            history,
            events,
            windows: HashMap::new(),
            tabs: HashMap::new(),
            reported: 0,
        }
    }

    pub async fn run(&mut self, scenario: &Scenario) -> Result<(), String> {
        for (index, step) in scenario.steps.iter().enumerate() {
            log::debug!("Step {}: {:?}", index, step);
            self.step(step)
                .await
                .map_err(|e| format!("step {}: {}", index, e))?;
            self.drain_events().await;
            self.report_messages();
        }
        for entry in self.history.entries() {
            emit(json!({"history": entry}));
        }
        Ok(())
    }

    async fn step(&mut self, step: &Step) -> Result<(), String> {
        match step {
            Step::OpenWindow {
                name,
                private,
                bounds,
            } => {
                let chrome_height = self.shell.config().chrome_height;
                let (window, chrome) = self.host.open_window(*bounds, chrome_height);
                if !self.shell.open_window(window, *private, chrome) {
                    return Err(format!("could not track window {}", name));
                }
                self.windows.insert(name.clone(), window);
            }
            Step::MoveWindow { window, bounds } => {
                let window = self.window(window)?;
                self.host.set_window_bounds(window, *bounds);
            }
            Step::CloseWindow { window } => {
                let window = self.window(window)?;
                self.shell.close_window(window).await;
            }
            Step::CreateTab { window, name, url } => {
                let window = self.window(window)?;
                let tab = self
                    .shell
                    .create_tab(window, url.as_deref())
                    .await
                    .ok_or_else(|| format!("could not create tab {}", name))?;
                self.tabs.insert(name.clone(), tab);
            }
            Step::SelectTab { tab } => self.shell.select_tab(self.tab(tab)?).await,
            Step::DeleteTab { tab } => self.shell.delete_tab(self.tab(tab)?).await,
            Step::Navigate { tab, url } => self.host.navigate(self.tab(tab)?, url),
            Step::SetTitle { tab, title } => self.host.set_title(self.tab(tab)?, title),
            Step::SetFavicon { tab, url } => self.host.set_favicon(self.tab(tab)?, url),
            Step::GoBack { tab } => self.shell.go_back(self.tab(tab)?).await,
            Step::GoForward { tab } => self.shell.go_forward(self.tab(tab)?).await,
            Step::Refresh { tab } => self.shell.refresh_tab(self.tab(tab)?).await,
            Step::Inspect { tab } => self.shell.open_inspector(self.tab(tab)?).await,
            Step::OpenOverlay { window } => {
                let window = self.window(window)?;
                let overlay = self.host.create_detached_surface();
                if !self.shell.open_overlay(window, overlay).await {
                    return Err(format!("could not open overlay in {}", window));
                }
            }
            Step::CloseOverlay { window } => {
                let window = self.window(window)?;
                if self.shell.close_overlay(window).await.is_none() {
                    log::debug!("No overlay open in {}", window);
                }
            }
            Step::MoveTabs { tabs, window } => {
                let ids = self.tab_list(tabs)?;
                let window = self.window(window)?;
                self.shell.move_tabs(&ids, window).await;
            }
            Step::DropTabs { tabs, cursor } => {
                let ids = self.tab_list(tabs)?;
                self.host.set_cursor(*cursor);
                let outcome = self.shell.handle_move_tabs(&ids).await;
                self.report_drop(outcome);
            }
            Step::UpdateAll => self.shell.update_all_windows().await,
        }
        Ok(())
    }

    async fn drain_events(&mut self) {
        while let Ok(envelope) = self.events.try_recv() {
            self.shell
                .dispatch(envelope.surface, envelope.event)
                .await;
        }
    }

    fn report_messages(&mut self) {
        let sent = self.host.sent();
        for (chrome, message) in sent.iter().skip(self.reported) {
            emit(json!({"chrome": chrome, "message": message}));
        }
        self.reported = sent.len();
    }

    fn report_drop(&self, outcome: DropOutcome) {
        let value = match outcome {
            DropOutcome::Merged(window) => json!({"drop": "merged", "window": window}),
            DropOutcome::Unhandled => json!({"drop": "unhandled"}),
            DropOutcome::Ignored => json!({"drop": "ignored"}),
        };
        emit(value);
    }

    fn window(&self, name: &str) -> Result<WindowId, String> {
        self.windows
            .get(name)
            .copied()
            .ok_or_else(|| format!("unknown window {:?}", name))
    }

    fn tab(&self, name: &str) -> Result<SurfaceId, String> {
        self.tabs
            .get(name)
            .copied()
            .ok_or_else(|| format!("unknown tab {:?}", name))
    }

    fn tab_list(&self, names: &[String]) -> Result<Vec<SurfaceId>, String> {
        names.iter().map(|name| self.tab(name)).collect()
    }
}

fn emit(value: serde_json::Value) {
    println!("{}", value);
}
