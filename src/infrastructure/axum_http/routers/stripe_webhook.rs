use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::{
    application::usecases::stripe_webhook::{StripeGateway, StripeWebhookUseCase, WebhookError},
    domain::repositories::{
        customers::CustomerRepository, notifications::NotificationRepository,
        orders::OrderRepository, pieces::PieceRepository, profiles::ProfileRepository,
        subscriptions::SubscriptionMirrorRepository,
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad,
        repositories::{
            customers::CustomerPostgres, notifications::NotificationPostgres,
            orders::OrderPostgres, pieces::PiecePostgres, profiles::ProfilePostgres,
            subscriptions::SubscriptionMirrorPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let customer_repository = CustomerPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionMirrorPostgres::new(Arc::clone(&db_pool));
    let order_repository = OrderPostgres::new(Arc::clone(&db_pool));
    let piece_repository = PiecePostgres::new(Arc::clone(&db_pool));
    let profile_repository = ProfilePostgres::new(Arc::clone(&db_pool));
    let notification_repository = NotificationPostgres::new(Arc::clone(&db_pool));

    let usecase = StripeWebhookUseCase::new(
        stripe_client,
        Arc::new(customer_repository),
        Arc::new(subscription_repository),
        Arc::new(order_repository),
        Arc::new(piece_repository),
        Arc::new(profile_repository),
        Arc::new(notification_repository),
    );

    Router::new()
        .route(
            "/stripe-webhook",
            any(handle_stripe_webhook::<
                StripeClient,
                CustomerPostgres,
                SubscriptionMirrorPostgres,
                OrderPostgres,
                PiecePostgres,
                ProfilePostgres,
                NotificationPostgres,
            >),
        )
        .with_state(Arc::new(usecase))
}

/// Entry point for Stripe event deliveries. Verification and classification
/// run before the response; reconciliation continues in a spawned task so the
/// acknowledgment never waits on Stripe fetches or database writes.
pub async fn handle_stripe_webhook<Stripe, Cust, Sub, Ord, Piece, Prof, Notif>(
    State(usecase): State<Arc<StripeWebhookUseCase<Stripe, Cust, Sub, Ord, Piece, Prof, Notif>>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    Stripe: StripeGateway + Send + Sync + 'static,
    Cust: CustomerRepository + Send + Sync + 'static,
    Sub: SubscriptionMirrorRepository + Send + Sync + 'static,
    Ord: OrderRepository + Send + Sync + 'static,
    Piece: PieceRepository + Send + Sync + 'static,
    Prof: ProfileRepository + Send + Sync + 'static,
    Notif: NotificationRepository + Send + Sync + 'static,
{
    // CORS preflight carries no body and needs no verification.
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    if method != Method::POST {
        warn!(method = %method, "webhook: rejected non-POST delivery");
        return WebhookError::MethodNotAllowed.into_response();
    }

    let signature = match headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    {
        Some(signature) => signature.to_string(),
        None => {
            warn!("webhook: delivery without stripe-signature header");
            return WebhookError::MissingSignature.into_response();
        }
    };

    // The signature covers the literal request bytes; verify before any parse.
    let action = match usecase.verify_and_classify(&body, &signature) {
        Ok(action) => action,
        Err(err) => return err.into_response(),
    };

    let background_usecase = Arc::clone(&usecase);
    tokio::spawn(async move {
        if let Err(err) = background_usecase.reconcile(action).await {
            // Stripe already got its 200; this failure is repaired by the
            // next event for the same customer, not by a provider retry.
            error!(error = ?err, "webhook: background reconciliation failed");
        }
    });

    (StatusCode::OK, Json(WebhookAck { received: true })).into_response()
}
