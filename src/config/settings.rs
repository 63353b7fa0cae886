use crate::core::errors::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// User-editable server configuration, persisted as pretty JSON.
///
/// Field names are the wire format consumed by the settings dialog; changing
/// them breaks saved configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub root_path: String,
    pub indexing_enabled: bool,
    pub file_watcher_enabled: bool,
    /// When true, `filter` is a whitelist: only matching paths are indexed.
    /// When false it is a blacklist.
    pub filter_mode_whitelist: bool,
    pub filter: Vec<String>,
    pub included_extensions: Vec<String>,
    pub exclude_hidden_files: bool,
    /// Hosts allowed to talk to the server. An empty list allows everyone.
    pub authorized_hosts: Vec<String>,
    pub cors_enabled: bool,
}

impl Settings {
    /// Reads the settings file, resetting it to defaults when it is missing
    /// or unparseable. Startup must never fail on a bad configuration file.
    pub fn load_or_reset(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("configuration file does not exist, writing defaults");
            let settings = Self::default();
            settings.save(path)?;
            return Ok(settings);
        }

        let contents = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Settings>(&contents) {
            Ok(settings) => {
                debug!("configuration loaded from {}", path.display());
                Ok(settings)
            }
            Err(e) => {
                warn!("configuration file is invalid ({e}), resetting to defaults");
                let settings = Self::default();
                settings.save(path)?;
                Ok(settings)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        debug!("saving configuration to {}", path.display());
        let contents =
            serde_json::to_string_pretty(self).map_err(|e| anyhow::anyhow!(e))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut filter: Vec<String> = [
            "/dev/**/*",
            "/proc/**/*",
            "/sys/**/*",
            "/run/**/*",
            "/mnt/**/*",
            "/media/**/*",
            "/lost+found/**/*",
            "/var/log/**/*",
            "/var/cache/**/*",
            "C:/Windows/**/*",
            "C:/Windows.old/**/*",
            "C:/ProgramData/Microsoft/**/*",
            "C:/System Volume Information/**/*",
            "C:/Recovery/**/*",
            "C:/PerfLogs/**/*",
            "**/*.log",
            "**/*.db*",
            "**/*.dat",
            "**/*.lock",
            "**/*.tmp",
            "**/*.bak",
            "**/Temp/**",
            "**/tmp/**",
            "**/temp/**",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        // Never index the directory the server itself runs from.
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            filter.push(format!(
                "{}/**/*",
                exe_dir.to_string_lossy().replace('\\', "/")
            ));
        }

        Self {
            port: 7667,
            root_path: "/".to_string(),
            indexing_enabled: true,
            file_watcher_enabled: true,
            filter_mode_whitelist: false,
            filter,
            included_extensions: vec![
                ".txt".to_string(),
                ".pdf".to_string(),
                ".doc".to_string(),
                ".docx".to_string(),
                ".jpg".to_string(),
                ".png".to_string(),
                ".mp4".to_string(),
                ".mp3".to_string(),
            ],
            exclude_hidden_files: true,
            authorized_hosts: vec!["127.0.0.1".to_string(), "localhost".to_string()],
            cors_enabled: true,
        }
    }
}

/// Cheaply cloneable handle to the live configuration and its backing file.
#[derive(Clone)]
pub struct SharedSettings {
    path: Arc<PathBuf>,
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = Settings::load_or_reset(&path)?;
        Ok(Self {
            path: Arc::new(path),
            inner: Arc::new(RwLock::new(settings)),
        })
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Persists `settings` and makes it the live configuration.
    pub fn replace(&self, settings: Settings) -> Result<()> {
        settings.save(&self.path)?;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = settings;
        Ok(())
    }

    /// Re-reads the settings file from disk.
    pub fn reload(&self) -> Result<Settings> {
        let settings = Settings::load_or_reset(&self.path)?;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        Ok(settings)
    }

    pub fn reset(&self) -> Result<Settings> {
        let settings = Settings::default();
        self.replace(settings.clone())?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_writes_defaults() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        let path = dir.path().join("app-config.json");

        let settings = Settings::load_or_reset(&path)?;
        assert_eq!(settings.port, 7667);
        assert!(path.exists(), "defaults should be written back to disk");
        Ok(())
    }

    #[test]
    fn round_trip_preserves_fields() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        let path = dir.path().join("app-config.json");

        let mut settings = Settings::default();
        settings.port = 9001;
        settings.root_path = "/srv/files".to_string();
        settings.cors_enabled = false;
        settings.save(&path)?;

        let loaded = Settings::load_or_reset(&path)?;
        assert_eq!(loaded.port, 9001);
        assert_eq!(loaded.root_path, "/srv/files");
        assert!(!loaded.cors_enabled);
        Ok(())
    }

    #[test]
    fn corrupt_file_resets_to_defaults() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        let path = dir.path().join("app-config.json");
        std::fs::write(&path, "{ not json").map_err(|e| anyhow::anyhow!(e))?;

        let settings = Settings::load_or_reset(&path)?;
        assert_eq!(settings.port, 7667);

        // The file on disk was rewritten with valid defaults.
        let reloaded = Settings::load_or_reset(&path)?;
        assert_eq!(reloaded.port, 7667);
        Ok(())
    }

    #[test]
    fn shared_settings_replace_and_reload() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        let path = dir.path().join("app-config.json");

        let shared = SharedSettings::load(&path)?;
        let mut updated = shared.current();
        updated.port = 8080;
        shared.replace(updated)?;

        assert_eq!(shared.current().port, 8080);
        assert_eq!(shared.reload()?.port, 8080);

        shared.reset()?;
        assert_eq!(shared.current().port, 7667);
        Ok(())
    }
}
