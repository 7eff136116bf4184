// Authentication middleware for Actix-web
// Decodes the bearer token once per request and leaves an AuthContext in the
// request extensions for the extractors in `secured`.

use actix_service::forward_ready;
use actix_utils::future::{Ready, ok};
use actix_web::{
    Error, HttpMessage,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web::Data,
};
use elite_auth::{ACCESS_TOKEN, AUTHORIZATION_HEADER, AuthContext, TOKEN_PREFIX, service::token};
use futures::future::LocalBoxFuture;

use crate::model::AppState;

pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthenticationMiddleware { service })
    }
}

pub struct AuthenticationMiddleware<S> {
    service: S,
}

/// Token sources in priority order:
/// 1. `Authorization: Bearer <token>` header
/// 2. `accessToken` HTTP header
/// 3. `accessToken` query parameter
pub fn extract_token(req: &actix_web::HttpRequest) -> Option<String> {
    if let Some(header_val) = req.headers().get(AUTHORIZATION_HEADER)
        && let Ok(s) = header_val.to_str()
        && let Some(token) = s.trim().strip_prefix(TOKEN_PREFIX)
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(header_val) = req.headers().get(ACCESS_TOKEN)
        && let Ok(s) = header_val.to_str()
    {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(query) = req.uri().query() {
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=')
                && key == ACCESS_TOKEN
                && !value.is_empty()
            {
                return Some(value.to_string());
            }
        }
    }

    None
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if Method::OPTIONS != *req.method() {
            let mut auth_context = AuthContext::default();

            if let Some(token) = extract_token(req.request()) {
                auth_context.token_provided = true;

                if let Some(app_state) = req.app_data::<Data<AppState>>() {
                    let secret_key = app_state.configuration.token_secret_key();
                    match token::decode_jwt_token_cached(&token, &secret_key) {
                        Ok(token_data) => {
                            auth_context = AuthContext::from_claims(&token_data.claims);
                        }
                        Err(err) => {
                            tracing::debug!(error = %err, "Rejected access token");
                            auth_context.jwt_error = Some(err);
                        }
                    }
                } else {
                    tracing::error!("AppState not found in request app_data");
                }
            }

            req.extensions_mut().insert(auth_context);
        }

        let res = self.service.call(req);

        Box::pin(async move { res.await.map(ServiceResponse::map_into_left_body) })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn test_extract_token_sources() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION_HEADER, "Bearer abc.def"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("abc.def"));

        let req = TestRequest::default()
            .insert_header((ACCESS_TOKEN, " xyz "))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("xyz"));

        let req = TestRequest::with_uri("/static/kyc_documents/a.png?accessToken=q1")
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("q1"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION_HEADER, "Basic dXNlcg=="))
            .to_http_request();
        assert_eq!(extract_token(&req), None);
    }

    #[test]
    fn test_bearer_wins_over_query() {
        let req = TestRequest::with_uri("/me?accessToken=query")
            .insert_header((AUTHORIZATION_HEADER, "Bearer header"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("header"));
    }
}
