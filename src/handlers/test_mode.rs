//! Dev-mode test endpoint: email dry-run toggle
//!
//! `GET /api/test/dry-run?enabled=true|false` flips the dry-run flag;
//! without a parameter it reports the current state. The whole module is
//! compiled out of production builds.

use std::collections::HashMap;

use serde_json::json;
use spin_sdk::http::{Request, Response};

use crate::mailer;

pub fn handle_dry_run_toggle(
    _req: Request,
    params: HashMap<String, String>,
) -> anyhow::Result<Response> {
    if let Some(enabled) = params.get("enabled") {
        match enabled.as_str() {
            "true" => mailer::set_email_dry_run(true),
            "false" => mailer::set_email_dry_run(false),
            _ => {
                return Ok(Response::builder()
                    .status(400)
                    .header("content-type", "application/json")
                    .body(r#"{"error":"ValidationFailed","message":"enabled must be true or false"}"#)
                    .build());
            }
        }
    }

    let body = json!({ "dry_run": mailer::is_email_dry_run_enabled() }).to_string();
    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .body(body)
        .build())
}
