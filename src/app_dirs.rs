use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// Log file under $HOME/.local/state/slotgrid (stderr is unusable while
    /// the alternate screen is active).
    pub fn log_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("slotgrid");
            Some(state_dir.join("slotgrid.log"))
        } else {
            ProjectDirs::from("", "", "slotgrid")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("slotgrid.log"))
        }
    }
}
