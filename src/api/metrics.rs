use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder};
use std::sync::Once;
use std::time::Instant;
use tower::{Layer, Service};

lazy_static::lazy_static! {
    static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::opts!("http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).unwrap();

    static ref HTTP_REQUEST_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
    ).unwrap();

    static ref FACE_ANALYSES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::opts!("face_analyses_total", "Total number of analyze requests"),
        &["outcome"]
    ).unwrap();

    static ref STORE_RELOADS_TOTAL: IntCounter = IntCounter::new(
        "store_reloads_total",
        "Total number of asset store reloads"
    ).unwrap();
}

static REGISTER: Once = Once::new();

pub fn init_metrics() {
    // Router construction happens once per process in production but many
    // times in tests; registration must stay idempotent.
    REGISTER.call_once(|| {
        prometheus::register(Box::new(HTTP_REQUESTS_TOTAL.clone())).unwrap();
        prometheus::register(Box::new(HTTP_REQUEST_DURATION.clone())).unwrap();
        prometheus::register(Box::new(FACE_ANALYSES_TOTAL.clone())).unwrap();
        prometheus::register(Box::new(STORE_RELOADS_TOTAL.clone())).unwrap();
    });
}

#[derive(Clone)]
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    pub fn new() -> Self {
        init_metrics();
        Self
    }
}

impl Default for MetricsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for MetricsMiddleware {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Request> for MetricsService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let start = Instant::now();

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let duration = start.elapsed().as_secs_f64();
            let status = response.status().as_u16().to_string();

            HTTP_REQUEST_DURATION.observe(duration);
            HTTP_REQUESTS_TOTAL
                .with_label_values(&[&method, &path, &status])
                .inc();

            Ok(response)
        })
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}

pub fn record_analysis(outcome: &str) {
    FACE_ANALYSES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_store_reload() {
    STORE_RELOADS_TOTAL.inc();
}
