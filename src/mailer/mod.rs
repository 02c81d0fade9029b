//! Outbound email
//!
//! Sends through a Mailtrap-style REST API over Spin outbound HTTP.
//! Delivery is best-effort by design: rows are committed before any send,
//! and a failed send only logs.
//!
//! In dev-mode builds a dry-run flag (persisted in the Spin key-value
//! store, because static state does not survive between WASM requests)
//! short-circuits sending and logs the link instead; production builds
//! compile the flag away entirely.

pub mod templates;

use serde_json::json;
use spin_sdk::http::{Method, Request, Response};
use spin_sdk::variables;
use tracing::{error, info};

use crate::secret::SecretRole;
use crate::types::CoreError;
use templates::{render_magic_link_email, render_secret_notification_email};

#[cfg(feature = "dev-mode")]
const DRY_RUN_KV_KEY: &str = "email_dry_run_mode";

/// Mailer configuration, loaded per send
#[derive(Debug)]
struct MailerConfig {
    api_url: String,
    api_token: String,
    from_email: String,
}

impl MailerConfig {
    fn from_environment() -> Result<Self, CoreError> {
        let api_url = variables::get("mailer_api_url")
            .map_err(|e| CoreError::MailerFailed(format!("missing mailer_api_url: {}", e)))?;
        let api_token = variables::get("mailer_api_token")
            .map_err(|e| CoreError::MailerFailed(format!("missing mailer_api_token: {}", e)))?;
        let from_email =
            variables::get("from_email")
            .map_err(|e| CoreError::MailerFailed(format!("missing from_email: {}", e)))?;
        Ok(MailerConfig { api_url, api_token, from_email })
    }
}

/// Send the magic-link email
pub async fn send_magic_link_email(
    recipient_email: &str,
    magic_link: &str,
) -> Result<(), CoreError> {
    #[cfg(feature = "dev-mode")]
    if is_email_dry_run_enabled() {
        // Tests extract the link from this line
        info!("📧 [DRY-RUN] Generated magic_link = {}", magic_link);
        return Ok(());
    }

    let (subject, html, text) = render_magic_link_email(magic_link);
    send(recipient_email, &subject, &html, &text).await?;
    info!("📧 Magic link email sent");
    Ok(())
}

/// Send a shared-secret notification email
pub async fn send_secret_notification(
    recipient_email: &str,
    ui_host: &str,
    url_path: &str,
    reference: &str,
    role: SecretRole,
) -> Result<(), CoreError> {
    let url = format!("https://{}{}", ui_host, url_path);

    #[cfg(feature = "dev-mode")]
    if is_email_dry_run_enabled() {
        info!("📧 [DRY-RUN] Secret {} url for {:?} = {}", reference, role, url);
        return Ok(());
    }

    let (subject, html, text) = render_secret_notification_email(&url, reference, role);
    send(recipient_email, &subject, &html, &text).await?;
    info!("📧 Secret notification sent ({:?})", role);
    Ok(())
}

async fn send(
    recipient_email: &str,
    subject: &str,
    html: &str,
    text: &str,
) -> Result<(), CoreError> {
    if recipient_email.is_empty() || !recipient_email.contains('@') {
        return Err(CoreError::MailerFailed("invalid recipient email address".to_string()));
    }
    let config = MailerConfig::from_environment()?;

    // Unique Message-ID keeps strict receivers from flagging the mail
    let message_id = format!(
        "<{}.{}@mailer.hushlink.dev>",
        chrono::Utc::now().timestamp_millis(),
        nanoid::nanoid!(8)
    );

    let email_payload = json!({
        "from": { "email": config.from_email, "name": "Hushlink" },
        "to": [{
            "email": recipient_email,
            "name": recipient_email.split('@').next().unwrap_or("User")
        }],
        "subject": subject,
        "text": text,
        "html": html,
        "headers": { "Message-ID": message_id }
    });
    let body_json = serde_json::to_string(&email_payload)
        .map_err(|e| CoreError::MailerFailed(format!("payload serialize: {}", e)))?;

    let request = Request::builder()
        .method(Method::Post)
        .uri(&config.api_url)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", config.api_token))
        .body(body_json)
        .build();

    let response: Response = spin_sdk::http::send(request)
        .await
        .map_err(|e| CoreError::MailerFailed(format!("request failed: {}", e)))?;

    let status = *response.status();
    if status == 200 || status == 202 {
        Ok(())
    } else {
        let body = String::from_utf8_lossy(response.body());
        Err(CoreError::MailerFailed(format!("API returned {}: {}", status, body)))
    }
}

/// Flip the dry-run flag (dev-mode only)
#[cfg(feature = "dev-mode")]
pub fn set_email_dry_run(enabled: bool) {
    use spin_sdk::key_value::Store;

    let store = match Store::open_default() {
        Ok(store) => store,
        Err(e) => {
            error!("⚠️ Failed to open KV store for dry-run flag: {}", e);
            return;
        }
    };
    let value = if enabled { vec![1u8] } else { vec![0u8] };
    match store.set(DRY_RUN_KV_KEY, &value) {
        Ok(()) => info!(
            "📧 Email dry-run {}",
            if enabled { "ENABLED (emails will not be sent)" } else { "DISABLED" }
        ),
        Err(e) => error!("⚠️ Failed to persist dry-run flag: {}", e),
    }
}

/// Current dry-run state; false (emails on) when unset or unreadable
#[cfg(feature = "dev-mode")]
pub fn is_email_dry_run_enabled() -> bool {
    use spin_sdk::key_value::Store;

    let Ok(store) = Store::open_default() else {
        return false;
    };
    match store.get(DRY_RUN_KV_KEY) {
        Ok(Some(value)) => value.first() == Some(&1u8),
        _ => false,
    }
}
