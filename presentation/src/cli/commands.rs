//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for roundtable
#[derive(Parser, Debug)]
#[command(name = "roundtable")]
#[command(author, version, about = "A roundtable of agents taking turns on a topic")]
#[command(long_about = r#"
Roundtable seats a moderator and a few personas around a topic and lets them
take turns. Agents bid for the floor, the highest-ranked bid speaks, and the
discussion pauses once the round budget is spent.

Configuration files are loaded from (later entries win):
1. ~/.config/roundtable/config.toml          Global config
2. ./roundtable.toml or ./.roundtable.toml   Project-level config
3. --config <path>                            Explicit config file
4. ROUNDTABLE_* environment variables         e.g. ROUNDTABLE_SCHEDULER__ROUND_LIMIT=6

Example:
  roundtable "Should we rewrite the parser?"
  roundtable --rounds 6 --no-stream "Tabs or spaces"
  roundtable -vv --transcript run.jsonl "Monorepo or polyrepo"
"#)]
pub struct Cli {
    /// Topic opened as the user's first message
    pub topic: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and the effective config, then exit
    #[arg(long)]
    pub show_config: bool,

    /// Deliver replies in one piece instead of streaming them
    #[arg(long)]
    pub no_stream: bool,

    /// Override the round budget (messages before the discussion pauses)
    #[arg(long, value_name = "N")]
    pub rounds: Option<u32>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress thinking spinners
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Record discussion events as JSON lines
    #[arg(long, value_name = "PATH")]
    pub transcript: Option<PathBuf>,
}

impl Cli {
    /// Log filter directive for the chosen verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace", // -vvv or more
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::try_parse_from([
            "roundtable",
            "Tabs or spaces",
            "-c",
            "custom.toml",
            "--no-stream",
            "--rounds",
            "6",
            "-vv",
            "--log-file",
            "run.log",
            "--transcript",
            "run.jsonl",
        ])
        .unwrap();

        assert_eq!(cli.topic.as_deref(), Some("Tabs or spaces"));
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(cli.no_stream);
        assert_eq!(cli.rounds, Some(6));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(cli.log_file, Some(PathBuf::from("run.log")));
        assert_eq!(cli.transcript, Some(PathBuf::from("run.jsonl")));
        assert!(!cli.no_config);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["roundtable"]).unwrap();
        assert!(cli.topic.is_none());
        assert!(cli.rounds.is_none());
        assert_eq!(cli.log_level(), "warn");
        assert!(!cli.show_config);
    }

    #[test]
    fn test_rounds_must_be_a_number() {
        assert!(Cli::try_parse_from(["roundtable", "--rounds", "many"]).is_err());
    }
}
