//! Data directory configuration.
//!
//! Precedence:
//! 1. GOTRAIN_DATA_DIR environment variable
//! 2. ~/.config/gotrain/data (production default)
//! 3. ./data (fallback for development)

use std::path::PathBuf;

const DEFAULT_CONFIG_DIR: &str = ".config/gotrain/data";
const DEV_DATA_DIR: &str = "./data";

/// Get the data directory for persistence.
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GOTRAIN_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR);
    }

    PathBuf::from(DEV_DATA_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_data_dir_is_never_empty() {
        let dir = get_data_dir();
        assert!(!dir.as_os_str().is_empty());
    }
}
