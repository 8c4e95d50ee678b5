use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{Level, warn};
use url::Url;

#[derive(Clone, Debug)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
}

#[derive(Clone)]
pub(crate) struct Notifier {
    tx: mpsc::Sender<AlertEvent>,
}

impl Notifier {
    /// Spawns the delivery task and returns a cheap clonable handle. Alerts
    /// are best-effort: a full queue drops the event rather than blocking the
    /// subscriber.
    pub(crate) fn spawn(webhook_url: Url) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(256);

        tokio::spawn(async move {
            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(3))
                .build()
                .unwrap_or_default();

            while let Some(event) = rx.recv().await {
                if let Err(error) = deliver(&client, &webhook_url, &event).await {
                    warn!(error = %error, "Alert delivery failed");
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn try_notify(&self, event: AlertEvent) {
        if self.tx.try_send(event).is_err() {
            warn!("Alert queue full or closed; dropping event");
        }
    }
}

async fn deliver(client: &reqwest::Client, webhook_url: &Url, event: &AlertEvent) -> anyhow::Result<()> {
    let response = client
        .post(webhook_url.clone())
        .json(&json!({ "content": format_content(event) }))
        .send()
        .await
        .map_err(|error| {
            // reqwest errors can echo the URL, which contains the webhook secret.
            if error.is_timeout() {
                anyhow::anyhow!("discord webhook request timed out")
            } else {
                anyhow::anyhow!("discord webhook request failed")
            }
        })?;

    if !response.status().is_success() {
        anyhow::bail!(
            "discord webhook returned non-success status: {}",
            response.status()
        );
    }

    Ok(())
}

fn format_content(event: &AlertEvent) -> String {
    let mut lines = vec![
        format!(
            "**{}** `{}` `{}` `{}`",
            event.service_name,
            event.environment,
            event.component,
            event.level.as_str()
        ),
        format!(
            "`{}` `{}`",
            event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            event.target
        ),
    ];

    if let Some(message) = event.message.as_ref().filter(|m| !m.trim().is_empty()) {
        lines.push(format!("> {}", message.trim()));
    }

    for (key, value) in &event.fields {
        lines.push(format!("- `{}` = `{}`", key, value));
    }

    truncate_for_discord(lines.join("\n"))
}

// Discord rejects messages above 2000 characters.
fn truncate_for_discord(content: String) -> String {
    const LIMIT: usize = 2000;
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= LIMIT {
        return content;
    }

    let allowed = LIMIT.saturating_sub(SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}
