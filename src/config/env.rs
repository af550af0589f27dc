//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load an explicit env file, or `./.env` when it exists
    ///
    /// Variables already present in the process environment are not replaced.
    /// Returns the file that was loaded.
    pub fn load_env_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            dotenv::from_path(path).map_err(|e| {
                AppError::config(format!("Failed to load env file {}: {}", path.display(), e))
            })?;
            return Ok(Some(path.to_path_buf()));
        }

        let default = Path::new(".env");
        if default.exists() {
            dotenv::from_path(default)
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;
            return Ok(Some(default.to_path_buf()));
        }

        Ok(None)
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SERVER_URL", "Endpoint receiving the POST requests (required)", "http://server:8080"),
            ("CONCURRENCY", "Concurrent workers per run (required)", "32"),
            ("WARMUP_DURATION", "Warmup seconds, 0 skips warmup (required)", "120"),
            ("TEST_DURATION", "Measured seconds (required)", "180"),
            ("CONTROL_URL", "Base URL of /control/start and /control/stop", "http://server:8080"),
            ("LIBRARY", "Library id written into records", "reqwest"),
            ("BENCH_LANGUAGE", "Language written into records", "rust"),
            ("RESULTS_DIR", "Directory receiving record files", "./results"),
            ("MONITOR_BACKEND", "Resource sampling backend: docker, process or none", "docker"),
            ("CLIENT_TARGET", "Logical name of the load-generating process", "client_reqwest_32"),
            ("SERVER_TARGET", "Logical name of the system under test", "server"),
            ("SAMPLE_INTERVAL", "Seconds between resource samples", "2"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<18} {}\n", var, description));
            help.push_str(&format!("  {:<18} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_get_supported_env_vars() {
        let vars = EnvManager::get_supported_env_vars();

        assert_eq!(vars.len(), 13);
        for required in ["SERVER_URL", "CONCURRENCY", "WARMUP_DURATION", "TEST_DURATION"] {
            assert!(vars.iter().any(|(name, _, _)| *name == required));
        }
    }

    #[test]
    fn test_display_env_help() {
        let help = EnvManager::display_env_help();

        assert!(help.contains("Supported Environment Variables:"));
        assert!(help.contains("SERVER_URL"));
        assert!(help.contains("MONITOR_BACKEND"));
        assert!(help.contains("Configuration Priority"));
    }

    #[test]
    fn test_explicit_env_file_is_loaded() {
        let _guard = crate::config::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var("HCBENCH_TEST_ENV_FILE_VALUE");

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "HCBENCH_TEST_ENV_FILE_VALUE=loaded").unwrap();

        let loaded = EnvManager::load_env_file(Some(file.path())).unwrap();

        assert_eq!(loaded.as_deref(), Some(file.path()));
        assert_eq!(std::env::var("HCBENCH_TEST_ENV_FILE_VALUE").unwrap(), "loaded");
        std::env::remove_var("HCBENCH_TEST_ENV_FILE_VALUE");
    }

    #[test]
    fn test_missing_explicit_env_file_fails() {
        let result = EnvManager::load_env_file(Some(Path::new("/nonexistent/hcbench.env")));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
