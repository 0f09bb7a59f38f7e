//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mailwarm_core::WarmupSettings;

/// Token accepted when none is configured.
pub const DEFAULT_ADMIN_TOKEN: &str = "changeme";

/// Email warm-up service.
///
/// Every option can also be set through the environment variable shown in
/// its help. Command-line arguments take precedence.
#[derive(Parser, Debug)]
#[command(name = "mailwarm", version, about)]
pub struct Cli {
    /// `SQLite` database file [default: <data dir>/mailwarm/mailwarm.db]
    #[arg(long, short = 'd', env = "MAILWARM_DATABASE")]
    pub database: Option<PathBuf>,

    /// HTTP bind address for the admin API
    #[arg(long, short = 'b', env = "MAILWARM_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Shared secret expected in the `X-Admin-Token` header
    #[arg(long, env = "APP_ADMIN_TOKEN", default_value = DEFAULT_ADMIN_TOKEN, hide_env_values = true)]
    pub admin_token: String,

    /// Run ticks in-process on a fixed interval (`1`, `true` or `yes`)
    #[arg(long, env = "SELF_SCHEDULER", value_name = "BOOL")]
    pub self_scheduler: Option<String>,

    /// Seconds between self-scheduled ticks
    #[arg(long, env = "SCHEDULE_SECONDS", default_value_t = 600)]
    pub schedule_seconds: u64,

    /// Probability of replying to a peer message
    #[arg(long, env = "MAILWARM_REPLY_RATE", default_value_t = 0.4)]
    pub reply_rate: f64,

    /// Probability of starring a peer message
    #[arg(long, env = "MAILWARM_STAR_RATE", default_value_t = 0.2)]
    pub star_rate: f64,

    /// Inboxes processed at once during a tick
    #[arg(long, env = "MAILWARM_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,

    /// Salt mixed into the daily plan seed
    #[arg(long, env = "MAILWARM_PLAN_SALT", default_value = "", hide_env_values = true)]
    pub plan_salt: String,

    /// Timeout for each SMTP session and IMAP round trip, in seconds
    #[arg(long, env = "MAILWARM_IO_TIMEOUT_SECS", default_value_t = 30)]
    pub io_timeout_secs: u64,

    /// What to do (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve the admin API (and the self-scheduler when enabled)
    Serve,
    /// Run a single tick and print its report as JSON
    RunOnce,
    /// Apply pending schema migrations and exit
    Migrate,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub bind: String,
    pub admin_token: String,
    pub self_scheduler: bool,
    pub schedule_interval: Duration,
    pub io_timeout: Duration,
    pub warmup: WarmupSettings,
}

impl Config {
    /// Splits parsed arguments into the subcommand and the configuration.
    pub fn from_cli(cli: Cli) -> (Command, Self) {
        let command = cli.command.unwrap_or(Command::Serve);
        let database = cli.database.unwrap_or_else(default_database);

        let warmup = WarmupSettings {
            reply_rate: cli.reply_rate,
            star_rate: cli.star_rate,
            concurrency: cli.concurrency,
            plan_salt: cli.plan_salt,
            ..WarmupSettings::default()
        }
        .normalized();

        let config = Self {
            database,
            bind: cli.bind,
            admin_token: cli.admin_token,
            self_scheduler: cli.self_scheduler.as_deref().is_some_and(is_truthy),
            schedule_interval: Duration::from_secs(cli.schedule_seconds.max(1)),
            io_timeout: Duration::from_secs(cli.io_timeout_secs.max(1)),
            warmup,
        };
        (command, config)
    }

    /// True when the admin token was left at its default.
    pub fn uses_default_token(&self) -> bool {
        self.admin_token == DEFAULT_ADMIN_TOKEN
    }
}

fn default_database() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailwarm")
        .join("mailwarm.db")
}

/// `1`, `true` and `yes` (any case) enable a switch; anything else disables it.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> (Command, Config) {
        let cli = Cli::try_parse_from(std::iter::once("mailwarm").chain(args.iter().copied()))
            .unwrap_or_else(|e| panic!("{e}"));
        Config::from_cli(cli)
    }

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "TRUE", "yes", " Yes "] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["0", "false", "no", "on", ""] {
            assert!(!is_truthy(value), "{value}");
        }
    }

    #[test]
    fn flags_override_defaults() {
        let (command, config) = parse(&[
            "--database",
            "/tmp/warm.db",
            "--admin-token",
            "s3cret",
            "--self-scheduler",
            "yes",
            "--schedule-seconds",
            "60",
            "--reply-rate",
            "2.5",
            "run-once",
        ]);
        assert_eq!(command, Command::RunOnce);
        assert_eq!(config.database, PathBuf::from("/tmp/warm.db"));
        assert!(config.self_scheduler);
        assert!(!config.uses_default_token());
        assert_eq!(config.schedule_interval, Duration::from_secs(60));
        assert!((config.warmup.reply_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn serve_is_the_default_command() {
        let (command, config) = parse(&["--self-scheduler", "0"]);
        assert_eq!(command, Command::Serve);
        assert!(!config.self_scheduler);
        assert!(config.database.ends_with("mailwarm/mailwarm.db"));
    }
}
