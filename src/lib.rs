//! hushlink — zero-knowledge magic-link authentication and ephemeral
//! shared-secret API, packaged as a Fermyon Spin HTTP component.

use spin_sdk::http::{IntoResponse, Request};
use spin_sdk::http_component;

mod auth;
mod codec;
mod config;
mod crypto;
mod envelope;
mod handlers;
mod mailer;
mod secret;
mod storage;
mod token;
mod types;

use config::CoreConfig;
use handlers::parse_query_params;

/// Spin HTTP component entry point
///
/// Parses the URL, loads the immutable core configuration, makes sure the
/// schema exists, and dispatches to the router.
#[http_component]
async fn handle_request(req: Request) -> anyhow::Result<impl IntoResponse> {
    init_tracing();

    // The spin-full-url header carries the externally visible URL
    let full_url = req
        .header("spin-full-url")
        .and_then(|h| h.as_str())
        .unwrap_or("")
        .to_string();

    let (full_path, query_string) = full_url
        .split_once('?')
        .unwrap_or((full_url.as_str(), ""));
    let path = match full_path.find("/api") {
        Some(start) => &full_path[start..],
        None => full_path,
    }
    .trim_end_matches('?')
    .to_string();
    let query_params = parse_query_params(query_string);

    let config = match CoreConfig::load() {
        Ok(config) => config,
        Err(e) => return Ok(e.into_response()),
    };
    if let Err(e) = storage::initialize_database(&config) {
        return Ok(e.into_response());
    }

    handlers::route_request(&config, req, &path, query_params).await
}

/// Install the tracing subscriber once per component instance
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .without_time()
            .try_init();
    });
}
