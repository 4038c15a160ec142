//! Admin HTTP server for health checks and metrics

use crate::audit;
use crate::metrics;
use crate::service::Collector;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;

/// Start the admin HTTP server serving /healthz, /readyz, and /metrics.
pub async fn serve_admin(
    addr: SocketAddr,
    collector: Arc<Collector>,
    shutdown: tokio_util::sync::CancellationToken,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let collector = collector.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                let collector = collector.clone();
                async move { Ok::<_, hyper::Error>(handle(req, &collector).await) }
            }))
        }
    });

    tracing::info!("Admin HTTP server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn text(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut res = Response::new(body.into());
    *res.status_mut() = status;
    res
}

pub(crate) async fn handle(req: Request<Body>, collector: &Collector) -> Response<Body> {
    let path = req.uri().path().to_string();
    drop(req);
    let response = match path.as_str() {
        "/healthz" => text(StatusCode::OK, "ok\n"),

        "/readyz" => match collector.store().ping().await {
            Ok(()) => {
                let buffered = match collector.buffer().try_len() {
                    Some(keys) => format!("{} buffered keys", keys),
                    None => "flush in progress".to_string(),
                };
                text(
                    StatusCode::OK,
                    format!("ready ({} store, {})\n", collector.store().name(), buffered),
                )
            }
            Err(e) => {
                tracing::warn!("Readiness probe failed: {}", e);
                text(StatusCode::SERVICE_UNAVAILABLE, "not ready\n")
            }
        },

        "/metrics" => {
            let mut res = text(StatusCode::OK, metrics::encode_metrics());
            res.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            res
        }

        _ => text(StatusCode::NOT_FOUND, "not found\n"),
    };

    if response.status() != StatusCode::NOT_FOUND {
        audit::admin_http_request(&path, response.status().as_u16());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Predicate;
    use crate::retry::RetryPolicy;
    use crate::storage::memory::InMemoryStore;
    use crate::storage::{EventStore, ScannedRow, StoredRecord};
    use std::time::Duration;

    fn collector() -> Collector {
        Collector::new(
            Arc::new(InMemoryStore::new()),
            10,
            Duration::from_secs(60),
            Duration::from_secs(60),
            RetryPolicy::default(),
        )
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let c = collector();
        assert_eq!(handle(get("/healthz"), &c).await.status(), StatusCode::OK);
        assert_eq!(handle(get("/readyz"), &c).await.status(), StatusCode::OK);
    }

    /// Store whose batch writes never complete.
    struct StalledStore(InMemoryStore);

    #[async_trait::async_trait]
    impl EventStore for StalledStore {
        fn name(&self) -> &'static str {
            "stalled"
        }
        async fn write_unlogged_batch(&self, _records: &[StoredRecord]) -> crate::Result<()> {
            std::future::pending().await
        }
        async fn scan(&self, predicate: &Predicate) -> crate::Result<Vec<ScannedRow>> {
            self.0.scan(predicate).await
        }
        async fn delete_row(&self, id: uuid::Uuid) -> crate::Result<()> {
            self.0.delete_row(id).await
        }
    }

    #[tokio::test]
    async fn test_ready_during_stuck_flush() {
        let c = Arc::new(Collector::new(
            Arc::new(StalledStore(InMemoryStore::new())),
            10,
            Duration::from_secs(60),
            Duration::from_secs(60),
            RetryPolicy::default(),
        ));
        c.insert_events(&[spanstat_shared::Entry::new(
            "o",
            "t",
            vec![spanstat_shared::Event::new("cpu", 1.0, "pct")],
        )])
        .await
        .unwrap();

        let flushing = c.clone();
        let flush = tokio::spawn(async move { flushing.flush().await });
        while c.buffer().try_len().is_some() {
            tokio::task::yield_now().await;
        }

        let res = tokio::time::timeout(Duration::from_secs(1), handle(get("/readyz"), &c))
            .await
            .expect("readiness must not wait for the flush");
        assert_eq!(res.status(), StatusCode::OK);
        flush.abort();
    }

    #[tokio::test]
    async fn test_metrics_content_type() {
        let c = collector();
        let res = handle(get("/metrics"), &c).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[hyper::header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let c = collector();
        assert_eq!(handle(get("/nope"), &c).await.status(), StatusCode::NOT_FOUND);
    }
}
