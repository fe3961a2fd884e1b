use axum::{extract::Request, middleware::Next, response::Response};

/// Log method, path, status and latency of every request. The query string
/// is left out since the socket credential travels there.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "request completed"
    );

    response
}
