//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Layer defaults, env file, environment and CLI overrides, then validate
    pub fn parse(&self) -> Result<Config> {
        let config = self.build()?;
        config.validate()?;
        Ok(config)
    }

    /// Layered configuration without the final validation
    ///
    /// `sweep` fills in the concurrency per level and validates each copy.
    pub fn build(&self) -> Result<Config> {
        let mut config = Config::default();

        if let Some(path) = EnvManager::load_env_file(self.cli.env_file.as_deref())? {
            if self.cli.debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        }

        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let args = self.cli.run_args();

        if let Some(url) = args.url {
            config.server_url = Some(url);
        }
        if let Some(concurrency) = args.concurrency {
            config.concurrency = Some(concurrency);
        }
        if let Some(warmup) = args.warmup {
            config.warmup_seconds = Some(warmup);
        }
        if let Some(duration) = args.duration {
            config.test_seconds = Some(duration);
        }
        if let Some(control_url) = args.control_url {
            config.control_url = Some(control_url);
        }
        if let Some(library) = args.library {
            config.library = library;
        }
        if let Some(language) = args.language {
            config.language = language;
        }
        if let Some(dir) = args.results_dir {
            config.results_dir = dir;
        }
        if let Some(backend) = args.monitor {
            config.monitor_backend = backend;
        }
        if let Some(target) = args.client_target {
            config.client_target = Some(target);
        }
        if let Some(target) = args.server_target {
            config.server_target = target;
        }

        if self.cli.no_color {
            config.enable_color = false;
        }

        // CLI-only flags
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for verbose output
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    let or_unset = |value: Option<String>| value.unwrap_or_else(|| "(unset)".to_string());

    summary.push(format!("Server URL: {}", or_unset(config.server_url.clone())));
    summary.push(format!(
        "Control URL: {}",
        config
            .control_url
            .clone()
            .unwrap_or_else(|| "(server origin)".to_string())
    ));
    summary.push(format!("Concurrency: {}", or_unset(config.concurrency.map(|c| c.to_string()))));
    summary.push(format!(
        "Warmup: {}",
        or_unset(config.warmup_seconds.map(|s| format!("{}s", s)))
    ));
    summary.push(format!(
        "Duration: {}",
        or_unset(config.test_seconds.map(|s| format!("{}s", s)))
    ));
    summary.push(format!("Library: {} ({})", config.library, config.language));
    summary.push(format!("Results: {}", config.results_dir.display()));
    summary.push(format!(
        "Monitor: {} (client {}, server {}, every {}s)",
        config.monitor_backend.as_str(),
        config.client_target.as_deref().unwrap_or("(derived)"),
        config.server_target,
        config.sample_interval_seconds
    ));
    summary.push(format!("Color Output: {}", config.enable_color));

    summary.join("\n")
}
