// Configuration module for aotscope
// Reads from environment variables with sensible defaults

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Files above this size (MB) loaded in the foreground trigger a warning (AOTSCOPE_LARGE_FILE_MB)
    pub large_file_mb: u64,

    /// Default depth of `tree` (AOTSCOPE_TREE_LEVEL)
    pub tree_level: usize,

    /// Default node budget of `tree`, 0 or negative for unlimited (AOTSCOPE_TREE_MAX)
    pub tree_max: i64,

    /// Default tracing filter when RUST_LOG is unset (AOTSCOPE_LOG)
    pub log_level: String,

    /// Packages reported by the "used and not trained" check (AOTSCOPE_TOP_PACKAGES)
    pub top_packages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            large_file_mb: 100,
            tree_level: 3,
            tree_max: 100,
            log_level: "warn".to_string(),
            top_packages: 10,
        }
    }
}

fn override_from_env<T: FromStr + std::fmt::Display>(name: &str, target: &mut T) {
    if let Ok(val) = env::var(name) {
        match val.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => eprintln!(
                "aotscope: Warning: Invalid {} value: {}, using default: {}",
                name, val, target
            ),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();

        override_from_env("AOTSCOPE_LARGE_FILE_MB", &mut config.large_file_mb);
        override_from_env("AOTSCOPE_TREE_LEVEL", &mut config.tree_level);
        override_from_env("AOTSCOPE_TREE_MAX", &mut config.tree_max);
        override_from_env("AOTSCOPE_TOP_PACKAGES", &mut config.top_packages);

        if let Ok(val) = env::var("AOTSCOPE_LOG") {
            if !val.trim().is_empty() {
                config.log_level = val.trim().to_string();
            }
        }

        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }

    /// Tree node budget as an optional limit.
    pub fn tree_budget(&self) -> Option<usize> {
        usize::try_from(self.tree_max).ok().filter(|max| *max > 0)
    }
}
