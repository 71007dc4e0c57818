/// Identity Middleware
///
/// Resolves the caller's access token to an identity and injects the
/// `IdentityProfile` into request extensions for route handlers
/// (`web::ReqData<IdentityProfile>`). Requests that cannot be resolved are
/// answered with 401 before reaching the handler.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorPayloadTooLarge,
    http::header,
    web::{Bytes, BytesMut},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use futures::StreamExt;
use std::rc::Rc;

use crate::services::IdentityResolver;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Largest JSON body buffered while looking for a token field
const MAX_BUFFERED_BODY: usize = 16 * 1024;

/// Guard for routes that require an authenticated identity
pub struct RequireIdentity {
    resolver: IdentityResolver,
}

impl RequireIdentity {
    pub fn new(resolver: IdentityResolver) -> Self {
        Self { resolver }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireIdentity
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireIdentityService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequireIdentityService {
            service: Rc::new(service),
            resolver: self.resolver.clone(),
        }))
    }
}

pub struct RequireIdentityService<S> {
    service: Rc<S>,
    resolver: IdentityResolver,
}

impl<S, B> Service<ServiceRequest> for RequireIdentityService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let resolver = self.resolver.clone();

        Box::pin(async move {
            let cookie = req
                .cookie(ACCESS_TOKEN_COOKIE)
                .map(|c| c.value().trim().to_string())
                .filter(|v| !v.is_empty());

            // The body is only read when no usable cookie was sent
            let body_token = if cookie.is_none() && req.content_type() == "application/json" {
                let body = buffer_body(&mut req).await?;
                let token = token_from_json(&body);
                restore_body(&mut req, body);
                token
            } else {
                None
            };

            let authorization = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned);

            let token = IdentityResolver::extract_access_token(
                cookie.as_deref(),
                body_token.as_deref(),
                authorization.as_deref(),
            );

            match resolver.resolve(token.as_deref()).await {
                Ok(identity) => {
                    tracing::debug!(user_id = %identity.id, "Identity resolved");
                    req.extensions_mut().insert(identity);
                    service.call(req).await
                }
                Err(e) => {
                    tracing::warn!(path = %req.path(), code = e.code(), "Request not authenticated");
                    Err(e.into())
                }
            }
        })
    }
}

async fn buffer_body(req: &mut ServiceRequest) -> Result<Bytes, Error> {
    let mut payload = req.take_payload();
    let mut body = BytesMut::new();

    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > MAX_BUFFERED_BODY {
            return Err(ErrorPayloadTooLarge("request body too large"));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body.freeze())
}

/// Put a buffered body back so the handler can still extract it
fn restore_body(req: &mut ServiceRequest, body: Bytes) {
    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(body);
    req.set_payload(payload.into());
}

fn token_from_json(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["access_token", "accessToken"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_owned)
}
