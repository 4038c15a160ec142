//! Subcommands and the connection plumbing they share.

use anyhow::{Context, Result};
use clap::Args;
use spanstat_aggregator::server::grpc::proto::event_collector_client::EventCollectorClient;
use tonic::codec::CompressionEncoding;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::Channel;

pub mod delete;
pub mod insert;
pub mod query;

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Aggregator gRPC endpoint
    #[arg(
        short,
        long,
        global = true,
        env = "SPANSTAT_ENDPOINT",
        default_value = "http://127.0.0.1:50051"
    )]
    pub endpoint: String,

    /// Bearer token, if the aggregator requires one
    #[arg(long, global = true, env = "SPANSTAT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl ConnectionArgs {
    pub async fn connect(&self) -> Result<EventCollectorClient<Channel>> {
        let client = EventCollectorClient::<Channel>::connect(self.endpoint.clone())
            .await
            .with_context(|| format!("Failed to connect to aggregator at {}", self.endpoint))?;
        Ok(client
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Gzip))
    }

    /// Wrap a message, attaching the bearer token when one is configured.
    pub fn request<T>(&self, message: T) -> Result<tonic::Request<T>> {
        let mut request = tonic::Request::new(message);
        if let Some(token) = &self.token {
            let value: AsciiMetadataValue = format!("Bearer {}", token)
                .parse()
                .context("Token is not valid header text")?;
            request.metadata_mut().insert("authorization", value);
        }
        Ok(request)
    }
}

/// Filter flags shared by `query` and `delete`. Unset flags match anything.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Match this trace id
    #[arg(short, long)]
    pub trace_id: Option<String>,

    /// Match this origin
    #[arg(short, long)]
    pub origin: Option<String>,

    /// Match this event name
    #[arg(long)]
    pub event: Option<String>,
}

impl FilterArgs {
    pub fn is_empty(&self) -> bool {
        self.trace_id.is_none() && self.origin.is_none() && self.event.is_none()
    }

    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            ("trace_id", &self.trace_id),
            ("origin", &self.origin),
            ("event", &self.event),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{}={}", k, v)))
        .collect();
        if parts.is_empty() {
            "all events".to_string()
        } else {
            parts.join(" ")
        }
    }
}
