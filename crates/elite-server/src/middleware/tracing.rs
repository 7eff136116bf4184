//! Request tracing middleware
//!
//! Wraps every request in an `http_request` span carrying a request id
//! (the caller's `x-request-id` or a fresh UUID), echoes the id back, and
//! records request count and latency metrics.

use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
};
use tracing::{Instrument, Span, info_span};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request id stored in the request extensions
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub struct TracingMiddleware;

impl<S, B> Transform<S, ServiceRequest> for TracingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = TracingMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TracingMiddlewareService { service }))
    }
}

pub struct TracingMiddlewareService<S> {
    service: S,
}

fn request_id(req: &ServiceRequest) -> String {
    req.headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

impl<S, B> Service<ServiceRequest> for TracingMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let id = request_id(&req);
        let method = req.method().to_string();
        let path = req.path().to_string();
        let peer_ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        req.extensions_mut().insert(RequestId(id.clone()));

        let span = info_span!(
            "http_request",
            request_id = %id,
            http.method = %method,
            http.target = %path,
            net.peer.ip = %peer_ip,
            http.status_code = tracing::field::Empty,
        );

        let started = Instant::now();
        let fut = self.service.call(req);

        Box::pin(
            async move {
                let mut res = fut.await?;

                let status = res.status().as_u16();
                Span::current().record("http.status_code", status);

                metrics::counter!(
                    "elite_http_requests_total",
                    "method" => method,
                    "status" => status.to_string()
                )
                .increment(1);
                metrics::histogram!("elite_http_request_duration_seconds")
                    .record(started.elapsed().as_secs_f64());

                if let Ok(value) = HeaderValue::from_str(&id) {
                    res.headers_mut()
                        .insert(HeaderName::from_static(X_REQUEST_ID), value);
                }

                Ok(res)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpResponse, test, web};

    use super::*;

    #[actix_web::test]
    async fn test_request_id_is_echoed() {
        let app = test::init_service(
            App::new()
                .wrap(TracingMiddleware)
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((X_REQUEST_ID, "req-42"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get(X_REQUEST_ID).unwrap(), "req-42");

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        let generated = resp.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
        assert_eq!(generated.len(), 36);
    }
}
