//! gRPC service implementation

use crate::error::AggregatorError;
use crate::service::Collector;
use spanstat_shared::{Entry, Event, Filter};
use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};

pub mod proto {
    tonic::include_proto!("spanstat.collector.v1");
}

use proto::{
    event_collector_server::{EventCollector, EventCollectorServer},
    DeleteEventsRequest, DeleteEventsResponse, InsertEventsRequest, InsertEventsResponse,
    QueryRequest, QueryResponse,
};

/// gRPC server state
pub struct CollectorService {
    collector: Arc<Collector>,
}

impl CollectorService {
    pub fn new(collector: Arc<Collector>) -> Self {
        Self { collector }
    }

    pub fn into_server(self) -> EventCollectorServer<Self> {
        EventCollectorServer::new(self)
    }
}

/// Map core errors onto gRPC status codes.
pub fn to_status(err: AggregatorError) -> Status {
    match err {
        AggregatorError::InvalidFilter(_) => Status::invalid_argument(err.to_string()),
        AggregatorError::StoreUnavailable(_) | AggregatorError::StoreWriteFailed(_) => {
            Status::unavailable(err.to_string())
        }
        AggregatorError::IdentifierGenerationFailed(_) => Status::internal(err.to_string()),
    }
}

/// Unset and empty strings both mean "any value".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn filter_from_parts(
    trace_id: Option<String>,
    origin: Option<String>,
    event: Option<String>,
) -> Filter {
    Filter {
        trace_id: non_empty(trace_id),
        origin: non_empty(origin),
        event_name: non_empty(event),
    }
}

impl From<proto::Entry> for Entry {
    fn from(e: proto::Entry) -> Self {
        Entry {
            origin: e.origin,
            trace_id: e.trace_id,
            events: e.events.into_iter().map(Event::from).collect(),
        }
    }
}

impl From<proto::Event> for Event {
    fn from(e: proto::Event) -> Self {
        Event {
            name: e.name,
            value: e.value,
            unit: e.unit,
        }
    }
}

impl From<Event> for proto::Event {
    fn from(e: Event) -> Self {
        proto::Event {
            name: e.name,
            value: e.value,
            unit: e.unit,
        }
    }
}

impl From<Entry> for proto::Entry {
    fn from(e: Entry) -> Self {
        proto::Entry {
            origin: e.origin,
            trace_id: e.trace_id,
            events: e.events.into_iter().map(proto::Event::from).collect(),
        }
    }
}

#[tonic::async_trait]
impl EventCollector for CollectorService {
    async fn insert_events(
        &self,
        request: Request<InsertEventsRequest>,
    ) -> Result<Response<InsertEventsResponse>, Status> {
        let entries: Vec<Entry> = request
            .into_inner()
            .entries
            .into_iter()
            .map(Entry::from)
            .collect();

        self.collector
            .insert_events(&entries)
            .await
            .map_err(to_status)?;
        Ok(Response::new(InsertEventsResponse {}))
    }

    async fn query(
        &self,
        request: Request<QueryRequest>,
    ) -> Result<Response<QueryResponse>, Status> {
        let req = request.into_inner();
        let filter = filter_from_parts(req.trace_id, req.origin, req.event);

        let start = Instant::now();
        let events = self.collector.query(&filter).await.map_err(to_status)?;
        tracing::debug!(
            "Query {:?} returned {} events in {:?}",
            filter,
            events.len(),
            start.elapsed()
        );

        Ok(Response::new(QueryResponse {
            events: events.into_iter().map(proto::Event::from).collect(),
        }))
    }

    async fn delete_events(
        &self,
        request: Request<DeleteEventsRequest>,
    ) -> Result<Response<DeleteEventsResponse>, Status> {
        let req = request.into_inner();
        let filter = filter_from_parts(req.trace_id, req.origin, req.event);

        let deleted = self
            .collector
            .delete_events(&filter)
            .await
            .map_err(to_status)?;
        Ok(Response::new(DeleteEventsResponse { deleted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::storage::memory::InMemoryStore;
    use std::time::Duration;

    fn service() -> CollectorService {
        let collector = Collector::new(
            Arc::new(InMemoryStore::new()),
            100,
            Duration::from_secs(60),
            Duration::from_secs(3600),
            RetryPolicy::default(),
        );
        CollectorService::new(Arc::new(collector))
    }

    fn proto_entry(name: &str, value: f64) -> proto::Entry {
        proto::Entry {
            origin: "o".to_string(),
            trace_id: "t".to_string(),
            events: vec![proto::Event {
                name: name.to_string(),
                value,
                unit: "pct".to_string(),
            }],
        }
    }

    #[test]
    fn test_empty_strings_mean_unset() {
        let filter = filter_from_parts(Some(String::new()), Some("o".to_string()), None);
        assert_eq!(filter, Filter::new().origin("o"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            to_status(AggregatorError::InvalidFilter("x".into())).code(),
            tonic::Code::InvalidArgument
        );
        assert_eq!(
            to_status(AggregatorError::StoreWriteFailed("x".into())).code(),
            tonic::Code::Unavailable
        );
        assert_eq!(
            to_status(AggregatorError::IdentifierGenerationFailed("x".into())).code(),
            tonic::Code::Internal
        );
    }

    #[tokio::test]
    async fn test_insert_flush_query_roundtrip() {
        let svc = service();
        svc.insert_events(Request::new(InsertEventsRequest {
            entries: vec![proto_entry("cpu", 1.0), proto_entry("cpu", 2.0)],
        }))
        .await
        .unwrap();
        svc.collector.flush().await.unwrap();

        let res = svc
            .query(Request::new(QueryRequest {
                trace_id: Some("t".to_string()),
                origin: Some("o".to_string()),
                event: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(res.events.len(), 1);
        assert_eq!(res.events[0].name, "cpu");
        assert_eq!(res.events[0].value, 3.0);
        assert_eq!(res.events[0].unit, "pct");
    }

    #[tokio::test]
    async fn test_delete_without_filter_is_invalid_argument() {
        let svc = service();
        let err = svc
            .delete_events(Request::new(DeleteEventsRequest {
                trace_id: None,
                origin: Some(String::new()),
                event: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
