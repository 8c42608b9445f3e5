pub mod config;
pub mod events;
pub mod favicon;
pub mod geometry;
pub mod history;
pub mod host;
pub mod memory;
pub mod migration;
pub mod registry;
pub mod shell;
pub mod tabs;
pub mod util;
pub mod visibility;

pub use config::ShellConfig;
pub use events::{Listeners, SurfaceEvent, SurfaceEventEnvelope};
pub use geometry::{Point, Rect};
pub use history::HistoryEntry;
pub use host::{ChromeMessage, PageState, Partition};
pub use migration::DropOutcome;
pub use registry::{SurfaceId, SurfaceRole, WindowId, WindowRegistry};
pub use shell::{Shell, ShellServices};
pub use tabs::{NavigationState, TabSnapshot};

#[cfg(test)]
pub(crate) mod test_support;
