//! Email templates
//!
//! Single built-in template per message kind; the `email_lang` hint rides
//! along in the magic-link binding but localization lives outside this
//! service.

use maud::{html, DOCTYPE};

use crate::secret::SecretRole;

/// Render the magic-link email: (subject, html, text)
pub fn render_magic_link_email(magic_link: &str) -> (String, String, String) {
    let subject = "Your sign-in link".to_string();

    let markup = html! {
        (DOCTYPE)
        html {
            body style="font-family: sans-serif; max-width: 560px; margin: 0 auto;" {
                h2 { "Sign in" }
                p { "Use the link below to sign in. It can be used once and expires shortly." }
                p {
                    a href=(magic_link) style="display:inline-block;padding:10px 18px;background:#1f2937;color:#ffffff;text-decoration:none;border-radius:6px;" {
                        "Sign in"
                    }
                }
                p style="color:#6b7280;font-size:13px;" {
                    "If the button does not work, copy this address into your browser:"
                    br;
                    (magic_link)
                }
                p style="color:#6b7280;font-size:13px;" {
                    "If you did not request this, you can ignore this email."
                }
            }
        }
    };

    let text = format!(
        "Use this link to sign in (single use, expires shortly):\n\n{}\n\n\
         If you did not request this, ignore this email.",
        magic_link
    );

    (subject, markup.into_string(), text)
}

/// Render the shared-secret notification email: (subject, html, text)
pub fn render_secret_notification_email(
    url: &str,
    reference: &str,
    role: SecretRole,
) -> (String, String, String) {
    let (subject, lead) = match role {
        SecretRole::Receiver => (
            "Someone shared a secret with you".to_string(),
            "A secret has been shared with you. Open it with the link below; it may allow only a limited number of reads before it disappears.",
        ),
        SecretRole::Sender => (
            "Your shared secret".to_string(),
            "Here is your copy of the secret you shared. You can use it to check whether it has been read.",
        ),
    };

    let markup = html! {
        (DOCTYPE)
        html {
            body style="font-family: sans-serif; max-width: 560px; margin: 0 auto;" {
                h2 { (subject) }
                p { (lead) }
                p {
                    a href=(url) style="display:inline-block;padding:10px 18px;background:#1f2937;color:#ffffff;text-decoration:none;border-radius:6px;" {
                        "Open secret"
                    }
                }
                p style="color:#6b7280;font-size:13px;" {
                    "Reference: " (reference)
                    br;
                    "If the button does not work, copy this address into your browser:"
                    br;
                    (url)
                }
            }
        }
    };

    let text = format!("{}\n\n{}\n\nReference: {}\n", lead, url, reference);
    (subject, markup.into_string(), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_link_email_embeds_the_link_everywhere() {
        let link = "https://app.example.com/?magiclink=3mJr7AoUXx2Wqd";
        let (subject, html, text) = render_magic_link_email(link);
        assert!(!subject.is_empty());
        assert!(html.contains(link));
        assert!(text.contains(link));
    }

    #[test]
    fn notification_differs_by_role() {
        let (recv_subject, recv_html, _) =
            render_secret_notification_email("https://x/s/abc", "ref1", SecretRole::Receiver);
        let (send_subject, send_html, _) =
            render_secret_notification_email("https://x/s/abc", "ref1", SecretRole::Sender);
        assert_ne!(recv_subject, send_subject);
        assert!(recv_html.contains("ref1"));
        assert!(send_html.contains("ref1"));
    }
}
