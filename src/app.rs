//! Main application orchestration and execution

use crate::{
    cli::{Cli, Command, SweepArgs},
    config::{display_config_summary, validate_config, ConfigParser, ValidationWarning},
    coordinator::PhaseCoordinator,
    error::{AppError, Result},
    log_debug, log_info, log_warn,
    logging::{components, LoggerFactory},
    models::{Config, TestRecord},
    output::{OutputFormatter, OutputFormatterFactory, ResultStore},
};
use std::path::PathBuf;
use std::time::Duration;

/// `hcbench <version> (<commit>, built <time>)`
pub fn version_banner() -> String {
    let mut banner = format!("{} v{}", crate::PKG_NAME, crate::VERSION);
    match (option_env!("GIT_COMMIT"), option_env!("BUILD_TIME")) {
        (Some(commit), Some(built)) => banner.push_str(&format!(" ({}, built {})", commit, built)),
        (None, Some(built)) => banner.push_str(&format!(" (built {})", built)),
        _ => {}
    }
    banner
}

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
    formatter: Box<dyn OutputFormatter>,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::validation)?;
        let formatter = OutputFormatterFactory::create_formatter(cli.use_colors());
        Ok(Self { cli, formatter })
    }

    /// Run the selected subcommand
    pub async fn run(self) -> Result<()> {
        match self.cli.command.clone() {
            Command::Run(_) => self.run_single().await,
            Command::Sweep(sweep) => self.run_sweep(&sweep).await,
            Command::Collect(_) => self.collect().await,
        }
    }

    /// One trial at the configured concurrency
    async fn run_single(&self) -> Result<()> {
        let config = ConfigParser::new(self.cli.clone()).parse()?;
        self.announce(&config, &validate_config(&config)?);

        let loggers = LoggerFactory::new(config.clone());
        let store = self.store(&config, &loggers);

        let record = self.run_trial(&config, &loggers).await?;
        self.report(&record, &store).await?;
        Ok(())
    }

    /// One trial per level, each with its own connection pool, then the consolidated summary
    async fn run_sweep(&self, sweep: &SweepArgs) -> Result<()> {
        let base = ConfigParser::new(self.cli.clone()).build()?;
        let warnings = validate_sweep(&base, &sweep.levels)?;
        self.announce(&base, &warnings);

        let loggers = LoggerFactory::new(base.clone());
        let logger = loggers.create_logger(components::APP);
        let store = self.store(&base, &loggers);
        let pause = Duration::from_secs(sweep.pause);

        let mut records = Vec::with_capacity(sweep.levels.len());
        for (index, &level) in sweep.levels.iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                log_info!(logger, "Pausing {}s before concurrency {}", sweep.pause, level);
                tokio::time::sleep(pause).await;
            }

            log_info!(
                logger,
                "Sweep level {}/{}: concurrency {}",
                index + 1,
                sweep.levels.len(),
                level
            );
            let record = self.run_trial(&base.with_concurrency(level), &loggers).await?;
            self.report(&record, &store).await?;
            records.push(record);
        }

        let all = store.collect().await?;
        let path = store.write_summary(&all).await?;

        println!();
        println!("{}", self.formatter.format_header("SWEEP SUMMARY")?);
        println!("{}", self.formatter.format_summary_table(&records)?);
        println!(
            "{}",
            self.formatter
                .format_success(&format!("Summary saved to {}", path.display()))?
        );
        Ok(())
    }

    /// Consolidate existing record files
    async fn collect(&self) -> Result<()> {
        let config = ConfigParser::new(self.cli.clone()).build()?;
        let loggers = LoggerFactory::new(config.clone());
        let store = self.store(&config, &loggers);

        let records = store.collect().await?;
        if records.is_empty() {
            let logger = loggers.create_logger(components::APP);
            log_warn!(logger, "No record files found in {}", store.dir().display());
        }
        let path = store.write_summary(&records).await?;

        println!("{}", self.formatter.format_summary_table(&records)?);
        println!(
            "{}",
            self.formatter.format_success(&format!(
                "Collected {} records into {}",
                records.len(),
                path.display()
            ))?
        );
        Ok(())
    }

    async fn run_trial(&self, config: &Config, loggers: &LoggerFactory) -> Result<TestRecord> {
        let settings = config.run_settings()?;
        let logger = loggers.create_logger(components::APP);
        log_debug!(
            logger,
            "Trial settings: {} workers against {} (control {})",
            settings.concurrency,
            settings.server_url,
            settings.control_url
        );

        let mut coordinator = PhaseCoordinator::for_http(settings, loggers)?;
        Ok(coordinator.run().await)
    }

    /// Persist the record, then print the RESULTS block
    async fn report(&self, record: &TestRecord, store: &ResultStore) -> Result<PathBuf> {
        let path = store.write_record(record).await?;

        println!();
        println!("{}", self.formatter.format_record(record)?);
        if self.cli.verbose {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        println!(
            "{}",
            self.formatter
                .format_success(&format!("Results saved to {}", path.display()))?
        );
        Ok(path)
    }

    fn store(&self, config: &Config, loggers: &LoggerFactory) -> ResultStore {
        ResultStore::new(config.results_dir.clone())
            .with_logger(loggers.create_logger(components::STORE))
    }

    fn announce(&self, config: &Config, warnings: &[ValidationWarning]) {
        if self.cli.verbose || self.cli.debug {
            println!("{}", version_banner());
            println!("{}", display_config_summary(config));
            println!();
        }
        for warning in warnings {
            match self.formatter.format_warning(&warning.format()) {
                Ok(line) => eprintln!("{}", line),
                Err(_) => eprintln!("{}", warning.format()),
            }
        }
    }
}

/// Validate every level of a sweep before the first trial starts
///
/// Warnings shared by several levels are reported once.
fn validate_sweep(base: &Config, levels: &[usize]) -> Result<Vec<ValidationWarning>> {
    let mut warnings: Vec<ValidationWarning> = Vec::new();
    for &level in levels {
        for warning in validate_config(&base.with_concurrency(level))? {
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }
    }
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_version_banner_names_binary() {
        let banner = version_banner();
        assert!(banner.starts_with(&format!("{} v{}", crate::PKG_NAME, crate::VERSION)));
    }

    #[test]
    fn test_sweep_validation_runs_at_construction() {
        let cli = Cli::try_parse_from(["hcbench", "sweep", "--levels", "0"]).unwrap();
        assert!(matches!(App::new(cli), Err(AppError::Validation(_))));
    }

    fn sweep_base() -> Config {
        Config {
            server_url: Some("http://127.0.0.1:8080/".to_string()),
            warmup_seconds: Some(0),
            test_seconds: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_sweep_rejects_any_level_above_limit() {
        let levels = [1, crate::defaults::MAX_CONCURRENCY + 1];
        let result = validate_sweep(&sweep_base(), &levels);
        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("cannot exceed")));
    }

    #[test]
    fn test_sweep_warnings_are_not_repeated() {
        let warnings = validate_sweep(&sweep_base(), &[1, 2, 4]).unwrap();
        let count = |needle: &str| warnings.iter().filter(|w| w.message.contains(needle)).count();
        assert_eq!(count("Test duration of 1s"), 1);
        assert_eq!(count("Warmup disabled"), 1);
    }
}
