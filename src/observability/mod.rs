mod config;
mod layer;
mod notifier;

use anyhow::Result;
use config::ObservabilityConfig;
use layer::ErrorAlertLayer;
use notifier::Notifier;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initializes tracing for the webhook service: fmt output plus an optional
/// Discord error-alert layer. Background reconciliation failures are never
/// surfaced to Stripe (the handler acknowledges before reconciling), so the
/// alert sink is the only way those failures reach an operator.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = config.discord.as_ref().map(|discord| {
        let notifier = Notifier::spawn(discord.webhook_url.clone());

        ErrorAlertLayer::new(notifier, config.service_context.clone(), discord.min_level)
            .with_filter(tracing_subscriber::filter::LevelFilter::from_level(
                discord.min_level,
            ))
    });

    // RUST_LOG overrides; default stays at info to keep webhook payload dumps
    // out of production logs unless explicitly requested.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            component = %config.service_context.component,
            warning = %warning,
            "Observability config warning"
        );
    }

    if config.discord.is_some() {
        info!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            "Discord error alerts enabled"
        );
    } else {
        info!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            "Discord error alerts disabled"
        );
    }

    Ok(())
}
