// ⚙️ Configuration - Runtime settings from flags and environment
//
// Every setting has a flag and an environment variable; the flag wins.

use crate::audit::DEFAULT_REVIEWER;
use crate::fixtures::{demo_store, load_seed};
use crate::store::RecordStore;
use anyhow::{anyhow, Result};
use clap::Args;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "crm_reconcile=info";

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ReviewConfig {
    /// Seed file to load instead of the built-in demo data
    #[arg(long = "seed", env = "CRM_SEED", global = true)]
    pub seed_path: Option<PathBuf>,

    /// Name recorded as the actor on review journal entries
    #[arg(long, env = "CRM_REVIEWER", default_value = DEFAULT_REVIEWER, global = true)]
    pub reviewer: String,

    /// tracing filter directive (e.g. "crm_reconcile=debug")
    #[arg(long = "log", env = "CRM_LOG", default_value = DEFAULT_LOG_FILTER, global = true)]
    pub log_filter: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        ReviewConfig {
            seed_path: None,
            reviewer: DEFAULT_REVIEWER.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ReviewConfig {
    /// Load the configured seed and stamp the reviewer on the journal
    pub fn load_store(&self) -> Result<RecordStore> {
        let mut store = match &self.seed_path {
            Some(path) => load_seed(path)?,
            None => demo_store()?,
        };
        store.journal.set_actor(self.reviewer.as_str());
        Ok(store)
    }
}

/// Install the global fmt subscriber, logging to stderr
pub fn init_logging(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| anyhow!("Invalid log filter '{}': {}", filter, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to install logger: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches, Parser};

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ReviewConfig,
    }

    /// Parse with environment fallbacks switched off, so CRM_* variables in
    /// the shell running the tests cannot leak in
    fn parse_without_env(args: &[&str]) -> TestCli {
        let command = ["seed_path", "reviewer", "log_filter"]
            .into_iter()
            .fold(TestCli::command(), |command, id| {
                command.mut_arg(id, |arg| arg.env(None::<&'static str>))
            });
        let matches = command.try_get_matches_from(args.iter().copied()).unwrap();
        TestCli::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse_without_env(&["crm"]);
        assert_eq!(cli.config.seed_path, None);
        assert_eq!(cli.config.reviewer, DEFAULT_REVIEWER);
        assert_eq!(cli.config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_flags_override() {
        let cli = TestCli::try_parse_from([
            "crm",
            "--seed",
            "/tmp/seed.json",
            "--reviewer",
            "ayse",
            "--log",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config.seed_path, Some(PathBuf::from("/tmp/seed.json")));
        assert_eq!(cli.config.reviewer, "ayse");
        assert_eq!(cli.config.log_filter, "debug");
    }

    #[test]
    fn test_load_store_stamps_reviewer() {
        let config = ReviewConfig {
            reviewer: "mehmet".to_string(),
            ..ReviewConfig::default()
        };
        let store = config.load_store().unwrap();
        assert_eq!(store.journal.actor(), "mehmet");
    }

    #[test]
    fn test_invalid_log_filter() {
        assert!(init_logging("crm_reconcile=notalevel").is_err());
    }
}
