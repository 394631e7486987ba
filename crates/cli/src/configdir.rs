//! Per-OS application directory resolution. Grounded in `configdir/configdir.go`
//! (itself a port of `go-appdir`); `directories` is the idiomatic Rust
//! equivalent rather than hand-rolled path joining per platform.

use std::path::PathBuf;

use directories::ProjectDirs;

pub struct AppDirs {
    dirs: Option<ProjectDirs>,
}

impl AppDirs {
    pub fn new(name: &str) -> Self {
        Self { dirs: ProjectDirs::from("com", "thresher", name) }
    }

    pub fn user_config(&self) -> PathBuf {
        self.dirs.as_ref().map(|d| d.config_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn user_cache(&self) -> PathBuf {
        self.dirs.as_ref().map(|d| d.cache_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn user_data(&self) -> PathBuf {
        self.dirs.as_ref().map(|d| d.data_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn user_logs(&self) -> PathBuf {
        // `directories` has no dedicated logs dir on every platform; a
        // `logs/` subdirectory of the data dir matches what most CLIs do.
        self.user_data().join("logs")
    }
}
