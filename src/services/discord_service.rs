use serde_json::Value;

// Embed colours
pub const COLOR_GREEN: u32 = 5763719;
pub const COLOR_RED: u32 = 15548997;
pub const COLOR_ORANGE: u32 = 16776960;
pub const COLOR_BLUE: u32 = 3447003;

/// Lifecycle notification sink.
///
/// Implementations must return immediately and never fail into the caller;
/// delivery happens in the background if at all.
pub trait Notifier: Send + Sync {
    fn notify(&self, webhook_url: &str, title: &str, body: &str, color: u32);
}

/// Drops every notification.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _webhook_url: &str, _title: &str, _body: &str, _color: u32) {}
}

/// Posts embeds to a Discord webhook.
#[derive(Clone, Default)]
pub struct DiscordNotifier {
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

pub fn embed_payload(title: &str, body: &str, color: u32) -> Value {
    serde_json::json!({
        "embeds": [{
            "title": title,
            "description": body,
            "color": color,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "footer": {
                "text": format!("CraftKeeper v{}", env!("CARGO_PKG_VERSION"))
            }
        }]
    })
}

impl Notifier for DiscordNotifier {
    fn notify(&self, webhook_url: &str, title: &str, body: &str, color: u32) {
        let url = webhook_url.trim();
        if url.is_empty() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime available, dropping notification '{}'", title);
            return;
        };

        let client = self.client.clone();
        let url = url.to_string();
        let payload = embed_payload(title, body, color);
        let title = title.to_string();

        runtime.spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::warn!("Discord webhook rejected '{}': {}", title, resp.status());
                }
                Ok(_) => tracing::debug!("Discord notification sent: {}", title),
                Err(e) => tracing::warn!("Failed to send Discord notification '{}': {}", title, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_carries_title_body_and_colour() {
        let payload = embed_payload("Server started", "Survival is online", COLOR_GREEN);
        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "Server started");
        assert_eq!(embed["description"], "Survival is online");
        assert_eq!(embed["color"], 5763719);
        assert!(embed["footer"]["text"].as_str().unwrap().starts_with("CraftKeeper v"));
    }

    #[test]
    fn blank_url_is_ignored_without_a_runtime() {
        // Returns before touching the runtime.
        DiscordNotifier::new().notify("   ", "t", "b", COLOR_RED);
    }
}
