//! Delete command implementation

use super::{ConnectionArgs, FilterArgs};
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use spanstat_aggregator::server::grpc::proto::DeleteEventsRequest;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

pub async fn run(conn: &ConnectionArgs, args: DeleteArgs) -> Result<()> {
    if args.filter.is_empty() {
        anyhow::bail!("Refusing to delete without a filter; pass --trace-id, --origin or --event");
    }

    let mut client = conn.connect().await?;
    let request = DeleteEventsRequest {
        trace_id: args.filter.trace_id.clone(),
        origin: args.filter.origin.clone(),
        event: args.filter.event.clone(),
    };

    let deleted = client
        .delete_events(conn.request(request)?)
        .await
        .context("Delete failed")?
        .into_inner()
        .deleted;

    output::success(&format!(
        "Deleted {} stored row(s) for {}",
        deleted,
        args.filter.describe()
    ));
    Ok(())
}
