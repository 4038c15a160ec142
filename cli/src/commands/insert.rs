//! Insert command implementation

use super::ConnectionArgs;
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use spanstat_aggregator::server::grpc::proto::{self, InsertEventsRequest};
use spanstat_shared::{Entry, Event};
use std::io::Read;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InsertArgs {
    /// Origin of the events
    #[arg(short, long, required_unless_present = "file")]
    pub origin: Option<String>,

    /// Trace the events belong to
    #[arg(short, long, required_unless_present = "file")]
    pub trace_id: Option<String>,

    /// Event as NAME=VALUE or NAME=VALUE:UNIT (repeatable)
    #[arg(long = "event", value_name = "NAME=VALUE[:UNIT]", value_parser = parse_event)]
    pub events: Vec<Event>,

    /// JSON file holding an array of entries ("-" reads stdin)
    #[arg(short, long, conflicts_with_all = ["origin", "trace_id", "events"])]
    pub file: Option<PathBuf>,
}

/// Parse `NAME=VALUE[:UNIT]`. The name may not be empty; the unit may be.
fn parse_event(s: &str) -> Result<Event, String> {
    let (name, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE[:UNIT], got '{}'", s))?;
    if name.is_empty() {
        return Err("event name is empty".to_string());
    }
    let (value, unit) = rest.split_once(':').unwrap_or((rest, ""));
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value '{}'", value))?;
    Ok(Event::new(name, value, unit))
}

fn read_entries(path: &PathBuf) -> Result<Vec<Entry>> {
    let mut raw = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read entries from stdin")?;
    } else {
        raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }
    serde_json::from_str(&raw).context("Entries must be a JSON array of {origin, trace_id, events}")
}

fn collect_entries(args: InsertArgs) -> Result<Vec<Entry>> {
    if let Some(path) = &args.file {
        return read_entries(path);
    }
    let (Some(origin), Some(trace_id)) = (args.origin, args.trace_id) else {
        anyhow::bail!("--origin and --trace-id are required without --file");
    };
    if args.events.is_empty() {
        anyhow::bail!("Nothing to insert; pass at least one --event");
    }
    Ok(vec![Entry::new(origin, trace_id, args.events)])
}

pub async fn run(conn: &ConnectionArgs, args: InsertArgs) -> Result<()> {
    let entries = collect_entries(args)?;
    let event_count: usize = entries.iter().map(|e| e.events.len()).sum();

    let mut client = conn.connect().await?;
    let request = InsertEventsRequest {
        entries: entries.into_iter().map(proto::Entry::from).collect(),
    };
    client
        .insert_events(conn.request(request)?)
        .await
        .context("Insert failed")?;

    output::success(&format!("Submitted {} event(s)", event_count));
    Ok(())
}
