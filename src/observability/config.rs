use std::env;
use tracing::Level;
use url::Url;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct DiscordConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) discord: Option<DiscordConfig>,
    /// Warnings collected before tracing is initialized, logged right after.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        let component = component.trim().to_string();
        let mut warnings = Vec::new();

        let service_name = env::var("SERVICE_NAME")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "peace-piece-webhook".to_string());

        let environment = env::var("STAGE")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let discord = match env::var("DISCORD_WEBHOOK_URL").ok().filter(|v| !v.is_empty()) {
            Some(raw) => match Url::parse(&raw) {
                Ok(webhook_url) => Some(DiscordConfig {
                    webhook_url,
                    min_level: alert_level(&mut warnings),
                }),
                Err(err) => {
                    // Webhook URLs carry a secret path segment; log the error only.
                    warnings.push(format!(
                        "DISCORD_WEBHOOK_URL is set but invalid; alerts disabled (parse error: {err})"
                    ));
                    None
                }
            },
            None => None,
        };

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            discord,
            warnings,
        }
    }
}

fn alert_level(warnings: &mut Vec<String>) -> Level {
    match env::var("DISCORD_NOTIFY_LEVEL") {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" | "warning" => Level::WARN,
            "info" => Level::INFO,
            other => {
                warnings.push(format!(
                    "DISCORD_NOTIFY_LEVEL is invalid (value: {other}); defaulting to ERROR"
                ));
                Level::ERROR
            }
        },
        _ => Level::ERROR,
    }
}
