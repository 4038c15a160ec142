//! E2E test: InsertEvents → (flush interval) → Query → DeleteEvents.
//!
//! Requires the aggregator running with a short flush interval, e.g.
//!   SPANSTAT_FLUSH__INTERVAL=100ms cargo run -p spanstat-aggregator

use spanstat_aggregator::server::grpc::proto::event_collector_client::EventCollectorClient;
use spanstat_aggregator::server::grpc::proto::{
    DeleteEventsRequest, Entry, Event, InsertEventsRequest, QueryRequest,
};
use std::time::Duration;
use tonic::transport::Channel;

const GRPC_ENDPOINT: &str = "http://127.0.0.1:50051";

fn endpoint() -> String {
    std::env::var("SPANSTAT_GRPC_ENDPOINT").unwrap_or_else(|_| GRPC_ENDPOINT.to_string())
}

#[tokio::test]
#[ignore] // Run explicitly via: cargo test --test e2e_grpc -- --ignored --nocapture
async fn e2e_insert_query_delete() {
    let mut client = EventCollectorClient::<Channel>::connect(endpoint())
        .await
        .expect("connect to aggregator");

    let trace_id = format!("e2e-{}", std::process::id());
    let entry = Entry {
        origin: "e2e-origin".to_string(),
        trace_id: trace_id.clone(),
        events: vec![
            Event {
                name: "cpu".to_string(),
                value: 1.0,
                unit: "pct".to_string(),
            },
            Event {
                name: "cpu".to_string(),
                value: 2.0,
                unit: "pct".to_string(),
            },
        ],
    };
    client
        .insert_events(tonic::Request::new(InsertEventsRequest {
            entries: vec![entry],
        }))
        .await
        .expect("insert");

    // Not visible until the background ticker flushes.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let res = client
        .query(tonic::Request::new(QueryRequest {
            trace_id: Some(trace_id.clone()),
            origin: Some("e2e-origin".to_string()),
            event: None,
        }))
        .await
        .expect("query")
        .into_inner();
    assert_eq!(res.events.len(), 1, "events: {:?}", res.events);
    assert_eq!(res.events[0].name, "cpu");
    assert_eq!(res.events[0].value, 3.0);

    let deleted = client
        .delete_events(tonic::Request::new(DeleteEventsRequest {
            trace_id: Some(trace_id.clone()),
            origin: None,
            event: None,
        }))
        .await
        .expect("delete")
        .into_inner()
        .deleted;
    assert!(deleted >= 1);
}
