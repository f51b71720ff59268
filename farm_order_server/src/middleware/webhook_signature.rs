//! Webhook signature checks for Actix Web.
//!
//! The payment provider signs every webhook with a shared secret: the request body is the signed data, and the
//! base64-encoded HMAC-SHA256 arrives in [`crate::config::WEBHOOK_HMAC_HEADER`]. Wrapping the webhook scope with
//! [`WebhookSignature`] means only the provider can move payments forward.
//!
//! The body has to be read to be verified, so a verified request gets it back as a fresh payload before it is passed
//! on to the webhook route.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorForbidden},
    http::header::HeaderValue,
    web,
    Error,
};
use farm_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use thiserror::Error;

use crate::helpers::verify_hmac;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("No webhook signature was sent")]
    Missing,
    #[error("No webhook secret is configured")]
    NoSecret,
    #[error("The webhook signature does not match the body")]
    Mismatch,
}

/// Checks the signature header of a webhook against its body.
pub fn verify_webhook_signature(
    secret: &Secret<String>,
    body: &[u8],
    signature: Option<&HeaderValue>,
) -> Result<(), SignatureError> {
    let signature = signature.ok_or(SignatureError::Missing)?;
    let secret = secret.reveal();
    if secret.is_empty() {
        return Err(SignatureError::NoSecret);
    }
    let signature = signature.to_str().map_err(|_| SignatureError::Mismatch)?;
    if verify_hmac(secret, body, signature) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Middleware factory for the webhook scope. With `enforce` off, every webhook is let through unchecked, which is
/// only meant for local testing against a provider sandbox.
pub struct WebhookSignature {
    header: String,
    secret: Secret<String>,
    enforce: bool,
}

impl WebhookSignature {
    pub fn new(header: &str, secret: Secret<String>, enforce: bool) -> Self {
        Self { header: header.into(), secret, enforce }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookSignature
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureService {
            header: self.header.clone(),
            secret: self.secret.clone(),
            enforce: self.enforce,
            service: Rc::new(service),
        }))
    }
}

pub struct WebhookSignatureService<S> {
    header: String,
    secret: Secret<String>,
    enforce: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.clone();
        let header = self.header.clone();
        let enforce = self.enforce;
        Box::pin(async move {
            if !enforce {
                trace!("🔐️ Webhook signatures are not enforced. Letting {} through.", req.path());
                return service.call(req).await;
            }
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not read webhook body: {e:?}");
                ErrorBadRequest("Could not read the webhook body.")
            })?;
            match verify_webhook_signature(&secret, body.as_ref(), req.headers().get(&header)) {
                Ok(()) => {
                    trace!("🔐️ Webhook signature verified for {}", req.path());
                    req.set_payload(replay_body(body));
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔐️ Refusing webhook to {}. {e}", req.path());
                    Err(ErrorForbidden(e.to_string()))
                },
            }
        })
    }
}

fn replay_body(body: web::Bytes) -> Payload {
    let (_, mut payload) = h1::Payload::create(true);
    payload.unread_data(body);
    Payload::from(payload)
}
