//! HTTP endpoint handlers and routing

pub mod guard;
pub mod login;
pub mod refresh;
pub mod shared_secret;

#[cfg(feature = "dev-mode")]
pub mod test_mode;

use std::collections::HashMap;

use spin_sdk::http::{Method, Request, Response};

use crate::config::CoreConfig;
use crate::envelope::SignedResponse;
use crate::types::CoreError;

/// Route a request to its handler
///
/// `path` is the `/api/…` part of the URL, `query_params` the raw query
/// string parameters (signatures still included).
pub async fn route_request(
    config: &CoreConfig,
    req: Request,
    path: &str,
    query_params: HashMap<String, String>,
) -> anyhow::Result<Response> {
    let method = req.method().clone();

    match path {
        "/api/login" | "/api/login/" => match method {
            Method::Post => login::handle_login_request(config, req).await,
            Method::Delete => login::handle_logout(config, req, query_params),
            _ => method_not_allowed("POST, DELETE"),
        },

        "/api/login/magiclink" | "/api/login/magiclink/" => match method {
            Method::Post => login::handle_redeem(config, req),
            _ => method_not_allowed("POST"),
        },

        "/api/refresh" => match method {
            Method::Post => refresh::handle_refresh(config, req),
            _ => method_not_allowed("POST"),
        },

        "/api/shared-secret/create" => match method {
            Method::Post => shared_secret::handle_create_secret(config, req).await,
            _ => method_not_allowed("POST"),
        },

        path if path.starts_with("/api/shared-secret/confirm-read") => match method {
            Method::Get => shared_secret::handle_confirm_read(config, req, query_params),
            _ => method_not_allowed("GET"),
        },

        #[cfg(feature = "dev-mode")]
        path if path.starts_with("/api/test/dry-run") => match method {
            Method::Get => test_mode::handle_dry_run_toggle(req, query_params),
            _ => method_not_allowed("GET"),
        },

        path if path.starts_with("/api/shared-secret/") => {
            let hash = path.trim_start_matches("/api/shared-secret/");
            if hash.is_empty() {
                return not_found();
            }
            match method {
                Method::Get => {
                    shared_secret::handle_retrieve_secret_get(config, req, hash, query_params)
                }
                Method::Post => shared_secret::handle_retrieve_secret_post(config, req, hash),
                Method::Delete => {
                    shared_secret::handle_delete_secret(config, req, hash, query_params)
                }
                _ => method_not_allowed("GET, POST, DELETE"),
            }
        }

        _ => not_found(),
    }
}

/// Parse a raw query string into a parameter map
///
/// Values on this API are Base58/hex/plain tokens, so no percent-decoding
/// is involved.
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Serialize a signed response envelope to its JSON body
pub fn serialize_signed(response: &SignedResponse) -> Result<String, CoreError> {
    serde_json::to_string(response)
        .map_err(|e| CoreError::Internal(format!("response serialize: {}", e)))
}

fn not_found() -> anyhow::Result<Response> {
    Ok(Response::builder()
        .status(404)
        .header("content-type", "application/json")
        .body(r#"{"error":"NotFound"}"#)
        .build())
}

fn method_not_allowed(allow: &str) -> anyhow::Result<Response> {
    Ok(Response::builder()
        .status(405)
        .header("content-type", "text/plain")
        .header("allow", allow)
        .body("Method Not Allowed")
        .build())
}
