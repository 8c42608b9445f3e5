use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Marker carried in the URL of the internal new-tab page.
pub const DEFAULT_NEW_TAB_MARKER: &str = "c8c75395-ae19-435d-8683-21109a112d6e";
/// Marker carried in the URL of docked inspection surfaces.
pub const DEFAULT_INSPECTOR_MARKER: &str = "f1f0313f-8a5b-4ffd-b137-167fb439ddb0";
/// Verification token the internal search page expects in its route.
pub const DEFAULT_PLACEHOLDER_TOKEN: &str = "6713de00-4386-4a9f-aeb9-0949b3e71eb7";

/// Shell behaviour knobs, persisted to `~/.config/tabhost/shell.json`.
///
/// Missing fields fall back to their `Default` values, so older files keep
/// loading as new fields are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Height of the chrome strip above every tab's content area.
    pub chrome_height: i32,
    /// Title reported for a tab whose page has not supplied one yet.
    pub untitled_title: String,
    pub inspector_marker: String,
    pub new_tab_marker: String,
    pub placeholder_token: String,
    /// Storage partition used by tabs in private windows. Cleared every time
    /// a private tab is created.
    pub private_partition: String,
    /// Favicon value written to history when the page exposes none.
    pub history_favicon_fallback: String,
    pub context_menu_scope: String,
    pub favicon_cache_capacity: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            chrome_height: 80,
            untitled_title: String::from("no title"),
            inspector_marker: String::from(DEFAULT_INSPECTOR_MARKER),
            new_tab_marker: String::from(DEFAULT_NEW_TAB_MARKER),
            placeholder_token: String::from(DEFAULT_PLACEHOLDER_TOKEN),
            private_partition: String::from("empty-session"),
            history_favicon_fallback: String::from("navigated"),
            context_menu_scope: String::from("body"),
            favicon_cache_capacity: 128,
        }
    }
}

impl ShellConfig {
    /// Load the user's config, or defaults if there is none.
    pub fn load() -> Self {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<ShellConfig>(&contents) {
            Ok(cfg) => cfg.sanitized(),
            Err(e) => {
                log::warn!("Invalid shell config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn sanitized(mut self) -> Self {
        if self.chrome_height < 0 {
            log::warn!(
                "Ignoring negative chrome_height {}; using default",
                self.chrome_height
            );
            self.chrome_height = Self::default().chrome_height;
        }
        if self.favicon_cache_capacity == 0 {
            self.favicon_cache_capacity = 1;
        }
        self
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tabhost").join("shell.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ShellConfig::load_from(&dir.path().join("nope.json"));
        assert_eq!(cfg, ShellConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chrome_height": 64, "untitled_title": "Untitled"}}"#).unwrap();
        let cfg = ShellConfig::load_from(file.path());
        assert_eq!(cfg.chrome_height, 64);
        assert_eq!(cfg.untitled_title, "Untitled");
        assert_eq!(cfg.new_tab_marker, DEFAULT_NEW_TAB_MARKER);
        assert_eq!(cfg.private_partition, "empty-session");
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert_eq!(ShellConfig::load_from(file.path()), ShellConfig::default());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chrome_height": -5, "favicon_cache_capacity": 0}}"#).unwrap();
        let cfg = ShellConfig::load_from(file.path());
        assert_eq!(cfg.chrome_height, 80);
        assert_eq!(cfg.favicon_cache_capacity, 1);
    }
}
