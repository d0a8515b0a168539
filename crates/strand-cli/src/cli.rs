use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strand",
    about = "strand — versioned, content-addressed stream store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./strand.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the config file and STRAND_DB
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a new version of a stream (skipped if the content is unchanged)
    Put(PutArgs),
    /// Print or save a stream as of an instant
    Get(GetArgs),
    /// List every version of a stream, newest first
    History(HistoryArgs),
    /// List the streams valid at an instant
    Inventory(InventoryArgs),
    /// Refresh a local file if the store holds a newer version
    Pull(PullArgs),
    /// Show row counts for the configured table
    Stats,
}

#[derive(Args)]
pub struct PutArgs {
    pub name: String,
    /// Read from this file instead of stdin
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub name: String,
    /// RFC 3339 instant; defaults to now
    #[arg(long)]
    pub as_of: Option<DateTime<Utc>>,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub name: String,
}

#[derive(Args)]
pub struct InventoryArgs {
    #[arg(long)]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct PullArgs {
    pub name: String,
    pub file: PathBuf,
    #[arg(long)]
    pub as_of: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_put_from_stdin() {
        let cli = Cli::try_parse_from(["strand", "put", "app.json"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.name, "app.json");
            assert!(args.file.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_put_from_file() {
        let cli = Cli::try_parse_from(["strand", "put", "app.json", "./local.json"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.file, Some(PathBuf::from("./local.json")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_get_as_of() {
        let cli = Cli::try_parse_from([
            "strand", "get", "app.json", "--as-of", "2024-03-01T11:30:00Z", "-o", "out.json",
        ])
        .unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.as_of, Some(Utc.with_ymd_and_hms(2024, 3, 1, 11, 30, 0).unwrap()));
            assert_eq!(args.output, Some(PathBuf::from("out.json")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_rejects_bad_instant() {
        assert!(Cli::try_parse_from(["strand", "get", "x", "--as-of", "yesterday"]).is_err());
    }

    #[test]
    fn parse_pull() {
        let cli = Cli::try_parse_from(["strand", "pull", "app.json", "cache/app.json"]).unwrap();
        if let Command::Pull(args) = cli.command {
            assert_eq!(args.name, "app.json");
            assert_eq!(args.file, PathBuf::from("cache/app.json"));
            assert!(args.as_of.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_inventory_and_stats() {
        let cli = Cli::try_parse_from(["strand", "inventory"]).unwrap();
        assert!(matches!(cli.command, Command::Inventory(_)));
        let cli = Cli::try_parse_from(["strand", "stats"]).unwrap();
        assert!(matches!(cli.command, Command::Stats));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "strand", "history", "x", "--db", "/tmp/s.db", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/s.db")));
    }
}
