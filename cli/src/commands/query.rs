//! Query command implementation

use super::{ConnectionArgs, FilterArgs};
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use spanstat_aggregator::server::grpc::proto::QueryRequest;
use spanstat_shared::Event;

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(conn: &ConnectionArgs, args: QueryArgs) -> Result<()> {
    let mut client = conn.connect().await?;

    let request = QueryRequest {
        trace_id: args.filter.trace_id.clone(),
        origin: args.filter.origin.clone(),
        event: args.filter.event.clone(),
    };
    tracing::debug!("Querying {}", args.filter.describe());

    let response = client
        .query(conn.request(request)?)
        .await
        .context("Query failed")?;

    let events: Vec<Event> = response
        .into_inner()
        .events
        .into_iter()
        .map(Event::from)
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        output::info(&format!("No events for {}.", args.filter.describe()));
        return Ok(());
    }

    print!("{}", output::event_table(&events));
    Ok(())
}
