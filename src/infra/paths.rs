// src/infra/paths.rs — Config and state path management
//
// All paths respect the TIMESLIP_HOME environment variable for isolation.
// When TIMESLIP_HOME is set, config and local snapshots live under it.
// When unset, config uses ~/.timeslip/ and snapshots use XDG_DATA_HOME/timeslip.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<Option<ProjectDirs>> = OnceLock::new();

fn project_dirs() -> Option<&'static ProjectDirs> {
    PROJECT_DIRS
        .get_or_init(|| ProjectDirs::from("", "", "timeslip"))
        .as_ref()
}

/// Returns the TIMESLIP_HOME override, if set.
fn timeslip_home() -> Option<PathBuf> {
    std::env::var_os("TIMESLIP_HOME").map(PathBuf::from)
}

/// Home directory, or the working directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $TIMESLIP_HOME/ or ~/.timeslip/
pub fn config_dir() -> PathBuf {
    if let Some(home) = timeslip_home() {
        return home;
    }
    dirs_home().join(".timeslip")
}

/// Data directory: $TIMESLIP_HOME/data/ or ~/.local/share/timeslip/
pub fn data_dir() -> PathBuf {
    if let Some(home) = timeslip_home() {
        return home.join("data");
    }
    match project_dirs() {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Directory holding local tracking snapshots (one JSON file per key).
pub fn snapshots_dir() -> PathBuf {
    data_dir().join("snapshots")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir(), snapshots_dir()] {
        tokio::fs::create_dir_all(&dir).await?;
    }
    Ok(())
}
