use crate::config::Settings;
use glob::Pattern;
use std::path::Path;

/// Decides which paths are admitted to the file index, from the configured
/// glob patterns and hidden-file rule. Paths are matched in `/`-separated
/// form on every platform.
pub struct IndexFilter {
    patterns: Vec<Pattern>,
    whitelist: bool,
    exclude_hidden: bool,
}

impl IndexFilter {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            patterns: settings
                .filter
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect(),
            whitelist: settings.filter_mode_whitelist,
            exclude_hidden: settings.exclude_hidden_files,
        }
    }

    /// A filter that admits everything; used when indexing is driven without
    /// user configuration (tests, rebuild tooling).
    pub fn permissive() -> Self {
        Self {
            patterns: Vec::new(),
            whitelist: false,
            exclude_hidden: false,
        }
    }

    pub fn allows(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/");
        let matches = self.patterns.iter().any(|p| p.matches(&path_str));
        if (!self.whitelist && matches) || (self.whitelist && !matches) {
            return false;
        }

        if self.exclude_hidden {
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with('.'))
                .unwrap_or(false);
            if hidden {
                return false;
            }
        }

        true
    }
}
