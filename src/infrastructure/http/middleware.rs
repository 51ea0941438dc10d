//! HTTP Middleware
//!
//! 请求耗时与 HTTP 状态码错误日志

use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

/// 响应头：服务端处理耗时（毫秒）
pub const RESPONSE_TIME_HEADER: &str = "x-response-time-ms";

/// 超过该耗时的请求记录 info 日志（未命中缓存的合成通常在秒级）
const SLOW_REQUEST: Duration = Duration::from_secs(5);

/// 请求日志中间件
///
/// 4xx 记 warn，5xx 记 error，慢请求记 info；业务错误（errno != 0）在
/// `ApiError::into_response()` 中记录
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if let Ok(value) = HeaderValue::from_str(&elapsed_ms.to_string()) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            elapsed_ms,
            "HTTP client error"
        );
    } else if started.elapsed() >= SLOW_REQUEST {
        tracing::info!(method = %method, uri = %uri, elapsed_ms, "Slow request");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Router,
    };
    use tower::util::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/audio", get(|| async { "bytes" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/broken", get(|| async { StatusCode::BAD_GATEWAY }))
            .layer(axum::middleware::from_fn(error_logging_middleware))
    }

    async fn call(uri: &str) -> Response {
        let request = HttpRequest::builder().uri(uri).body(Body::empty()).unwrap();
        router().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_response_time_header_added() {
        let response = call("/audio").await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = response.headers().get(RESPONSE_TIME_HEADER).unwrap();
        assert!(value.to_str().unwrap().parse::<u64>().is_ok());
    }

    #[tokio::test]
    async fn test_error_statuses_pass_through() {
        assert_eq!(call("/missing").await.status(), StatusCode::NOT_FOUND);
        let broken = call("/broken").await;
        assert_eq!(broken.status(), StatusCode::BAD_GATEWAY);
        assert!(broken.headers().contains_key(RESPONSE_TIME_HEADER));
    }
}
