use crate::config::AppConfig;
use crate::error::CoreError;
use crate::schemas::{OrgId, UserId};
use actix_web::{dev::Payload, http::header::HeaderValue, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::ParseIntError;

type HmacSha256 = Hmac<Sha256>;

/// Who is calling and on behalf of which organization. Extracted from a
/// signed bearer token on every request instead of a global session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestContext {
    pub user_id: UserId,
    pub org_id: OrgId,
}

fn new_mac(context: &RequestContext, secret: &str) -> Option<HmacSha256> {
    let hash_content = [context.user_id.as_str(), context.org_id.as_str()].join("\n");
    let mut sha256_hasher = Sha256::new();
    sha256_hasher.update(secret.as_bytes());
    let secret_hash = sha256_hasher.finalize();

    let mut hmac_hasher = HmacSha256::new_from_slice(&secret_hash).ok()?;
    hmac_hasher.update(hash_content.as_bytes());
    Some(hmac_hasher)
}

/// Token of the form `<user_id>.<org_id>.<hex hmac>`.
pub fn sign_context(context: &RequestContext, secret: &str) -> Option<String> {
    let signature = new_mac(context, secret)?
        .finalize()
        .into_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    Some(format!("{}.{}.{}", context.user_id, context.org_id, signature))
}

pub fn verify_token(token: &str, secret: &str) -> Option<RequestContext> {
    let mut parts = token.rsplitn(3, '.');
    let signature = parts.next()?;
    let org_id = parts.next()?;
    let user_id = parts.next()?;
    if user_id.is_empty() || org_id.is_empty() || signature.len() % 2 != 0 {
        return None;
    }
    let signature = signature
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|n| u8::from_str_radix(&String::from_iter(n), 16))
        .collect::<Result<Vec<u8>, ParseIntError>>()
        .ok()?;

    let context = RequestContext {
        user_id: user_id.to_string(),
        org_id: org_id.to_string(),
    };
    new_mac(&context, secret)?.verify_slice(&signature).ok()?;
    Some(context)
}

fn context_from_request(request: &HttpRequest) -> Result<RequestContext, CoreError> {
    let Some(config) = request.app_data::<web::Data<AppConfig>>() else {
        log::error!("AppConfig is not registered, rejecting request");
        return Err(CoreError::Unauthorized);
    };
    let authorization = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)
        .and_then(Result::ok)
        .ok_or(CoreError::Unauthorized)?;
    let token = authorization
        .strip_prefix("Bearer ")
        .ok_or(CoreError::Unauthorized)?;
    verify_token(token.trim(), &config.auth_secret).ok_or_else(|| {
        log::warn!("Rejected request with an invalid token");
        CoreError::Unauthorized
    })
}

impl FromRequest for RequestContext {
    type Error = CoreError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(request: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(context_from_request(request))
    }
}
