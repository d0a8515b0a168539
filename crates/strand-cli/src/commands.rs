use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use colored::Colorize;
use serde_json::json;
use strand_source::{LocalFile, StreamSink};
use strand_sql::SqliteStreamStore;
use strand_store::StreamStore;
use strand_types::{temporal, StorageEntry};
use tracing::debug;

use crate::cli::*;
use crate::config::{CliConfig, DB_ENV};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?
        .with_overrides(std::env::var_os(DB_ENV).map(PathBuf::from), cli.db);
    debug!(?config, "resolved configuration");

    let store = SqliteStreamStore::open(config.sql, config.store).context("opening store")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&store, cli.command, cli.format, &mut out)
}

pub fn execute(
    store: &SqliteStreamStore,
    command: Command,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        Command::Put(args) => cmd_put(store, args, format, out),
        Command::Get(args) => cmd_get(store, args, format, out),
        Command::History(args) => cmd_history(store, args, format, out),
        Command::Inventory(args) => cmd_inventory(store, args, format, out),
        Command::Pull(args) => cmd_pull(store, args, format, out),
        Command::Stats => cmd_stats(store, format, out),
    }
}

fn instant(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn write_entry(out: &mut dyn Write, entry: &StorageEntry, with_name: bool) -> io::Result<()> {
    let until = match entry.valid_until() {
        Some(until) => instant(until).normal(),
        None => "open".green(),
    };
    if with_name {
        write!(out, "{:<24} ", entry.name().bold())?;
    }
    writeln!(
        out,
        "{}  {} → {}  {} bytes",
        entry.hash().short_hex().yellow(),
        instant(entry.valid_since()),
        until,
        entry.length()
    )
}

fn cmd_put(
    store: &dyn StreamStore,
    args: PutArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let stored = match &args.file {
        Some(path) => {
            let file = LocalFile::new(path);
            if !file.exists() {
                bail!("{} does not exist", path.display());
            }
            store.upload(&args.name, &file)?
        }
        None => store.store(&args.name, &mut io::stdin().lock())?,
    };
    let entry = store.find_open(&args.name)?;

    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "stored": stored, "entry": entry }))?,
        OutputFormat::Text if stored => {
            writeln!(out, "{} Stored new version of {}", "✓".green().bold(), args.name.bold())?;
            if let Some(entry) = &entry {
                write_entry(out, entry, false)?;
            }
        }
        OutputFormat::Text => {
            writeln!(out, "{} unchanged, no new version", args.name.bold())?;
        }
    }
    Ok(())
}

fn cmd_get(
    store: &dyn StreamStore,
    args: GetArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let as_of = args.as_of.unwrap_or_else(temporal::now);
    let Some(entry) = store.find(&args.name, as_of)? else {
        bail!("no version of {} valid at {}", args.name, instant(as_of));
    };
    let mut stream = store.open_entry(&entry)?;

    match args.output {
        Some(path) => {
            let file = LocalFile::new(&path);
            let written = file.replace_with(&mut stream, entry.valid_since())?;
            match format {
                OutputFormat::Json => writeln!(
                    out,
                    "{}",
                    json!({ "entry": entry, "path": path, "bytes": written })
                )?,
                OutputFormat::Text => writeln!(
                    out,
                    "{} Wrote {} bytes of {} to {}",
                    "✓".green().bold(),
                    written,
                    args.name.bold(),
                    path.display()
                )?,
            }
        }
        None => {
            io::copy(&mut stream, out)?;
        }
    }
    Ok(())
}

fn cmd_history(
    store: &dyn StreamStore,
    args: HistoryArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let history = store.history(&args.name)?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&history)?)?,
        OutputFormat::Text if history.is_empty() => {
            writeln!(out, "No versions of {}.", args.name.bold())?
        }
        OutputFormat::Text => {
            writeln!(out, "{} ({} versions)", args.name.bold(), history.len())?;
            for entry in &history {
                write_entry(out, entry, false)?;
            }
        }
    }
    Ok(())
}

fn cmd_inventory(
    store: &dyn StreamStore,
    args: InventoryArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let as_of = args.as_of.unwrap_or_else(temporal::now);
    let entries = store.inventory(as_of)?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?,
        OutputFormat::Text if entries.is_empty() => {
            writeln!(out, "No streams valid at {}.", instant(as_of))?
        }
        OutputFormat::Text => {
            for entry in &entries {
                write_entry(out, entry, true)?;
            }
        }
    }
    Ok(())
}

fn cmd_pull(
    store: &dyn StreamStore,
    args: PullArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let as_of = args.as_of.unwrap_or_else(temporal::now);
    let file = LocalFile::new(&args.file);
    let updated = store.download(&args.name, as_of, &file)?;
    match format {
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({ "updated": updated, "path": args.file, "modified": file.modified_at()? })
        )?,
        OutputFormat::Text if updated => writeln!(
            out,
            "{} Updated {} from {}",
            "✓".green().bold(),
            args.file.display(),
            args.name.bold()
        )?,
        OutputFormat::Text => writeln!(out, "{} nothing newer to pull", args.file.display())?,
    }
    Ok(())
}

fn cmd_stats(
    store: &SqliteStreamStore,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let stats = store.stats()?;
    let table = &store.sql_config().table;
    match format {
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({
                "table": table,
                "names": stats.names,
                "versions": stats.versions,
                "content_bytes": stats.content_bytes,
            })
        )?,
        OutputFormat::Text => {
            writeln!(out, "Table {}", table.bold())?;
            writeln!(out, "  Streams:  {}", stats.names)?;
            writeln!(out, "  Versions: {}", stats.versions)?;
            writeln!(out, "  Content:  {} bytes", stats.content_bytes)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    fn run(store: &SqliteStreamStore, command: Command, format: OutputFormat) -> String {
        let mut out = Vec::new();
        execute(store, command, format, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn run_json(store: &SqliteStreamStore, command: Command) -> Value {
        serde_json::from_str(&run(store, command, OutputFormat::Json)).unwrap()
    }

    fn put(store: &SqliteStreamStore, dir: &TempDir, name: &str, body: &str) -> Value {
        let path = dir.path().join("input");
        std::fs::write(&path, body).unwrap();
        run_json(
            store,
            Command::Put(PutArgs {
                name: name.into(),
                file: Some(path),
            }),
        )
    }

    #[test]
    fn put_reports_dedup() {
        let store = SqliteStreamStore::memory().unwrap();
        let dir = TempDir::new().unwrap();
        assert_eq!(put(&store, &dir, "app", "v1")["stored"], true);
        assert_eq!(put(&store, &dir, "app", "v1")["stored"], false);
        let result = put(&store, &dir, "app", "v2");
        assert_eq!(result["stored"], true);
        assert_eq!(result["entry"]["length"], 2);
    }

    #[test]
    fn put_missing_file_fails() {
        let store = SqliteStreamStore::memory().unwrap();
        let dir = TempDir::new().unwrap();
        let command = Command::Put(PutArgs {
            name: "app".into(),
            file: Some(dir.path().join("absent")),
        });
        assert!(execute(&store, command, OutputFormat::Text, &mut Vec::new()).is_err());
    }

    #[test]
    fn get_prints_content() {
        let store = SqliteStreamStore::memory().unwrap();
        let dir = TempDir::new().unwrap();
        put(&store, &dir, "app", "hello world");
        let command = Command::Get(GetArgs {
            name: "app".into(),
            as_of: None,
            output: None,
        });
        assert_eq!(run(&store, command, OutputFormat::Text), "hello world");
    }

    #[test]
    fn get_to_file_stamps_modification_time() {
        let store = SqliteStreamStore::memory().unwrap();
        let dir = TempDir::new().unwrap();
        put(&store, &dir, "app", "saved");
        let target = dir.path().join("out.txt");
        let command = Command::Get(GetArgs {
            name: "app".into(),
            as_of: None,
            output: Some(target.clone()),
        });
        let result = run_json(&store, command);
        assert_eq!(result["bytes"], 5);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "saved");

        let since = store.find_open("app").unwrap().unwrap().valid_since();
        assert_eq!(LocalFile::new(&target).modified_at().unwrap(), Some(since));
    }

    #[test]
    fn get_unknown_name_fails() {
        let store = SqliteStreamStore::memory().unwrap();
        let command = Command::Get(GetArgs {
            name: "nope".into(),
            as_of: None,
            output: None,
        });
        let err = execute(&store, command, OutputFormat::Text, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("no version of nope"));
    }

    #[test]
    fn history_and_inventory_as_json() {
        let store = SqliteStreamStore::memory().unwrap();
        let dir = TempDir::new().unwrap();
        put(&store, &dir, "a", "1");
        put(&store, &dir, "a", "2");
        put(&store, &dir, "b", "3");

        let history = run_json(&store, Command::History(HistoryArgs { name: "a".into() }));
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0]["valid_until"].is_null());
        assert!(!history[1]["valid_until"].is_null());

        let inventory = run_json(&store, Command::Inventory(InventoryArgs { as_of: None }));
        let names: Vec<_> = inventory
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn history_text_for_unknown_name() {
        let store = SqliteStreamStore::memory().unwrap();
        let out = run(
            &store,
            Command::History(HistoryArgs { name: "ghost".into() }),
            OutputFormat::Text,
        );
        assert!(out.contains("No versions of"));
    }

    #[test]
    fn pull_only_when_newer() {
        let store = SqliteStreamStore::memory().unwrap();
        let dir = TempDir::new().unwrap();
        put(&store, &dir, "cfg", "remote copy");
        let target = dir.path().join("cache").join("cfg");
        let pull = || {
            Command::Pull(PullArgs {
                name: "cfg".into(),
                file: target.clone(),
                as_of: None,
            })
        };

        assert_eq!(run_json(&store, pull())["updated"], true);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "remote copy");
        assert_eq!(run_json(&store, pull())["updated"], false);
    }

    #[test]
    fn stats_text() {
        let store = SqliteStreamStore::memory().unwrap();
        let dir = TempDir::new().unwrap();
        put(&store, &dir, "a", "123");
        let out = run(&store, Command::Stats, OutputFormat::Text);
        assert!(out.contains("StreamEntries"));
        assert!(out.contains("Versions: 1"));
    }
}
