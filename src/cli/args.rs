//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum. Run flags are accepted
//! both at the top level and after `run`.

use clap::{
    Args, Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::config::Settings;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Relay Wires-X node and room logs to Slack
#[derive(Parser, Debug)]
#[command(
    name = "wireslack",
    version = env!("CARGO_PKG_VERSION"),
    about = "Relay Wires-X node and room logs to Slack",
    long_about = "Poll Wires-X log pages, resolve the nodes and rooms they mention \
                  against the active directory, and post new events to a Slack webhook.",
    styles = clap_cargo_style(),
    after_help = "Examples:\n  wireslack --targets http://10.0.0.5:46190/ --webhook https://hooks.slack.com/services/...\n  wireslack run --targets http://a/,http://b/ --dry --verbose\n  wireslack parse file://./saved_log.html\n  wireslack lookup --dtmf 12345"
)]
pub struct Cli {
    /// Path to custom settings file
    #[arg(short, long, global = true, env = "WIRESLACK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Overrides for the relay loop.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Log pages to poll, comma separated
    #[arg(long, value_delimiter = ',', value_name = "URL")]
    pub targets: Vec<String>,

    /// Seconds between polls
    #[arg(long, value_name = "SECS")]
    pub read_interval: Option<u64>,

    /// Slack incoming webhook URL
    #[arg(long, value_name = "URL")]
    pub webhook: Option<String>,

    /// Log messages instead of posting them
    #[arg(long)]
    pub dry: bool,

    /// IANA time zone of the log timestamps
    #[arg(long, value_name = "ZONE")]
    pub timezone: Option<String>,

    /// Log per-poll details
    #[arg(short, long)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll targets and post new events (default)
    Run(RunArgs),

    /// Show current configuration settings
    #[command(about = "Display the effective merged settings")]
    Config,

    /// Write a default settings file
    #[command(about = "Create wireslack.toml in the current directory")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Fetch and parse one target, print the snapshot as JSON
    Parse {
        /// Log page address (http://, https:// or file://)
        target: String,
    },

    /// Refresh the directory once and print the first matching entity
    Lookup {
        /// Node or room id
        #[arg(long)]
        id: Option<String>,

        /// DTMF id
        #[arg(long)]
        dtmf: Option<String>,

        /// Callsign or room name
        #[arg(long)]
        name: Option<String>,

        /// Search rooms instead of nodes
        #[arg(long)]
        room: bool,
    },
}

impl RunArgs {
    /// Layer these flags over `settings`.
    pub fn apply_to(&self, settings: &mut Settings) {
        if !self.targets.is_empty() {
            settings.targets = self.targets.clone();
        }
        if let Some(secs) = self.read_interval {
            settings.poll_interval_secs = secs;
        }
        if let Some(webhook) = &self.webhook {
            settings.sink.webhook = webhook.clone();
        }
        if self.dry {
            settings.sink.dry = true;
        }
        if let Some(tz) = &self.timezone {
            settings.timezone = tz.clone();
        }
        if self.verbose {
            settings.verbose = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_flags_run_by_default() {
        let cli = Cli::try_parse_from([
            "wireslack",
            "--targets",
            "http://a/,http://b/",
            "--webhook",
            "https://hooks.slack.invalid/T000",
            "--read-interval",
            "30",
        ])
        .unwrap();
        assert!(cli.command.is_none());

        let mut settings = Settings::default();
        cli.run.apply_to(&mut settings);
        assert_eq!(settings.targets, vec!["http://a/", "http://b/"]);
        assert_eq!(settings.poll_interval_secs, 30);
        assert_eq!(settings.sink.webhook, "https://hooks.slack.invalid/T000");
        assert!(!settings.sink.dry);
    }

    #[test]
    fn test_run_subcommand_flags() {
        let cli = Cli::try_parse_from([
            "wireslack",
            "run",
            "--dry",
            "--verbose",
            "--timezone",
            "Asia/Tokyo",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };

        let mut settings = Settings::default();
        settings.targets = vec!["http://kept/".to_string()];
        args.apply_to(&mut settings);
        assert!(settings.sink.dry);
        assert!(settings.verbose);
        assert_eq!(settings.timezone, "Asia/Tokyo");
        assert_eq!(settings.targets, vec!["http://kept/"]);
    }

    #[test]
    fn test_lookup_arguments() {
        let cli =
            Cli::try_parse_from(["wireslack", "lookup", "--dtmf", "12345", "--room"]).unwrap();
        match cli.command {
            Some(Commands::Lookup { dtmf, room, id, .. }) => {
                assert_eq!(dtmf.as_deref(), Some("12345"));
                assert!(room);
                assert!(id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
