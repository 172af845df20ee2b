//! `jwt_auth`: admits only requests carrying a valid HMAC-signed JWT.
//!
//! # Inputs
//! - `secret`: shared HMAC key
//! - `key_in_header` / `key_in_query`: where the token is read from
//! - `key_name`: header name (`Bearer <token>`) or query parameter name
//!
//! # Design Decisions
//! - HS256, HS384 and HS512 only; any other `alg` is rejected
//! - `exp` and `nbf` are enforced when present
//! - Every extraction or verification failure is a 401 (fail closed),
//!   including a missing secret or no extraction site
//! - Signatures are compared in constant time by the `hmac` crate

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

use crate::plugins::{handler_fn, reject, Handler, PluginDecl, PluginError};

pub const NAME: &str = "jwt_auth";

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtError {
    #[error("no secret configured")]
    MissingSecret,

    #[error("one of key_in_header or key_in_query must be true")]
    NoExtractionSite,

    #[error("no key_name configured")]
    MissingKeyName,

    #[error("token not found")]
    MissingToken,

    #[error("invalid header format")]
    InvalidHeaderFormat,

    #[error("malformed token")]
    Malformed,

    #[error("unsupported algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,
}

/// Where the token is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenSite {
    Header(String),
    Query(String),
}

/// Settings parsed once from the plugin declaration.
#[derive(Debug, Clone)]
struct JwtSettings {
    secret: Result<Vec<u8>, JwtError>,
    site: Result<TokenSite, JwtError>,
}

impl JwtSettings {
    fn from_decl(decl: &PluginDecl) -> Self {
        let secret = match decl.input_str("secret") {
            Some(s) if !s.is_empty() => Ok(s.as_bytes().to_vec()),
            _ => Err(JwtError::MissingSecret),
        };

        let key_name = decl.input_str("key_name").map(str::to_string);
        let site = if decl.input_bool("key_in_header") == Some(true) {
            key_name.map(TokenSite::Header).ok_or(JwtError::MissingKeyName)
        } else if decl.input_bool("key_in_query") == Some(true) {
            key_name.map(TokenSite::Query).ok_or(JwtError::MissingKeyName)
        } else {
            Err(JwtError::NoExtractionSite)
        };

        Self { secret, site }
    }

    fn authorize(&self, req: &Request<Body>) -> Result<(), JwtError> {
        let site = self.site.as_ref().map_err(|e| e.clone())?;
        let secret = self.secret.as_ref().map_err(|e| e.clone())?;
        let token = extract_token(site, req)?;
        verify(&token, secret, SystemTime::now())?;
        Ok(())
    }
}

pub fn middleware(decl: &PluginDecl, next: Handler) -> Result<Handler, PluginError> {
    let settings = JwtSettings::from_decl(decl);

    if let Err(e) = settings.secret.as_ref().and(settings.site.as_ref()) {
        tracing::warn!(plugin = NAME, error = %e, "Incomplete jwt_auth input, every request will be rejected");
    }

    Ok(handler_fn(move |req: Request<Body>| {
        let next = next.clone();
        let verdict = settings.authorize(&req);
        async move {
            match verdict {
                Ok(()) => next(req).await,
                Err(e) => {
                    tracing::info!(plugin = NAME, error = %e, "Request not authorized");
                    reject(NAME, StatusCode::UNAUTHORIZED)
                }
            }
        }
    }))
}

fn extract_token(site: &TokenSite, req: &Request<Body>) -> Result<String, JwtError> {
    match site {
        TokenSite::Header(name) => {
            let value = req
                .headers()
                .get(name.as_str())
                .ok_or(JwtError::MissingToken)?
                .to_str()
                .map_err(|_| JwtError::InvalidHeaderFormat)?;

            let parts: Vec<&str> = value.split(' ').collect();
            match parts.as_slice() {
                [scheme, token] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
                    Ok(token.to_string())
                }
                _ => Err(JwtError::InvalidHeaderFormat),
            }
        }
        TokenSite::Query(name) => req
            .uri()
            .query()
            .and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
            })
            .filter(|token| !token.is_empty())
            .ok_or(JwtError::MissingToken),
    }
}

#[derive(Deserialize)]
struct JoseHeader {
    alg: String,
}

/// Verify a compact JWS token's signature and time claims.
pub fn verify(token: &str, secret: &[u8], now: SystemTime) -> Result<Map<String, Value>, JwtError> {
    let mut segments = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(JwtError::Malformed);
    };

    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    let header: JoseHeader = decode_json(header_b64)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| JwtError::Malformed)?;

    match header.alg.as_str() {
        "HS256" => verify_mac::<Hmac<Sha256>>(secret, signing_input, &signature)?,
        "HS384" => verify_mac::<Hmac<Sha384>>(secret, signing_input, &signature)?,
        "HS512" => verify_mac::<Hmac<Sha512>>(secret, signing_input, &signature)?,
        other => return Err(JwtError::UnsupportedAlgorithm(other.to_string())),
    }

    let claims: Map<String, Value> = decode_json(claims_b64)?;
    check_time_claims(&claims, now)?;
    Ok(claims)
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, JwtError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| JwtError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| JwtError::Malformed)
}

fn verify_mac<M: Mac + KeyInit>(secret: &[u8], input: &str, signature: &[u8]) -> Result<(), JwtError> {
    let mut mac = <M as KeyInit>::new_from_slice(secret).map_err(|_| JwtError::BadSignature)?;
    mac.update(input.as_bytes());
    mac.verify_slice(signature).map_err(|_| JwtError::BadSignature)
}

fn check_time_claims(claims: &Map<String, Value>, now: SystemTime) -> Result<(), JwtError> {
    let now = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();

    if let Some(exp) = claims.get("exp") {
        let exp = exp.as_f64().ok_or(JwtError::Malformed)?;
        if now >= exp {
            return Err(JwtError::Expired);
        }
    }

    if let Some(nbf) = claims.get("nbf") {
        let nbf = nbf.as_f64().ok_or(JwtError::Malformed)?;
        if now < nbf {
            return Err(JwtError::NotYetValid);
        }
    }

    Ok(())
}
