use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            notifications::InsertNotificationEntity, orders::InsertOrderEntity,
            subscriptions::UpsertSubscriptionEntity,
        },
        repositories::{
            customers::CustomerRepository, notifications::NotificationRepository,
            orders::OrderRepository, pieces::PieceRepository, profiles::ProfileRepository,
            subscriptions::SubscriptionMirrorRepository,
        },
        value_objects::{
            enums::{
                notification_types::NotificationType, order_statuses::OrderStatus,
                subscription_statuses::SubscriptionStatus,
            },
            webhook::{CheckoutSessionDetails, OrderInsertOutcome, WebhookAction},
        },
    },
    payments::stripe_client::{StripeCheckoutSession, StripeClient, StripeEvent, StripeSubscription},
};

#[cfg(test)]
mod tests;

/// Seam over the Stripe client so the reconcilers can be exercised with mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;

    async fn list_customer_subscriptions(
        &self,
        customer_id: &str,
    ) -> AnyResult<Vec<StripeSubscription>>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }

    async fn list_customer_subscriptions(
        &self,
        customer_id: &str,
    ) -> AnyResult<Vec<StripeSubscription>> {
        self.list_subscriptions(customer_id).await
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("No signature found")]
    MissingSignature,
    #[error("Webhook signature verification failed")]
    SignatureInvalid,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            WebhookError::MissingSignature | WebhookError::SignatureInvalid => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, WebhookError>;

/// Decides which reconciliation path a verified event takes. Pure; narrows
/// the loosely-shaped `data.object` before any reconciler touches it.
pub fn classify_event(event: &StripeEvent) -> WebhookAction {
    let object = &event.data.object;

    if object.get("customer").is_none() {
        debug!(event_type = %event.type_, "webhook: event carries no customer; ignoring");
        return WebhookAction::Ignore;
    }

    // One-time payments arrive through checkout.session.completed; acting on
    // the bare payment intent as well would double-process them.
    if event.type_ == "payment_intent.succeeded"
        && object.get("invoice").is_none_or(serde_json::Value::is_null)
    {
        debug!("webhook: uninvoiced payment_intent.succeeded; handled via checkout session");
        return WebhookAction::Ignore;
    }

    let customer_id = match object.get("customer").and_then(|value| value.as_str()) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            error!(
                event_type = %event.type_,
                "webhook: no customer id received on event"
            );
            return WebhookAction::Ignore;
        }
    };

    if event.type_ == "checkout.session.completed" {
        let session: StripeCheckoutSession = match serde_json::from_value(object.clone()) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "webhook: malformed checkout session payload; ignoring");
                return WebhookAction::Ignore;
            }
        };

        return match (session.mode.as_deref(), session.payment_status.as_deref()) {
            (Some("subscription"), _) => {
                info!(%customer_id, "webhook: processing subscription checkout session");
                WebhookAction::SyncSubscription { customer_id }
            }
            (Some("payment"), Some("paid")) => {
                info!(%customer_id, "webhook: processing one-time payment checkout session");
                WebhookAction::RecordPayment(CheckoutSessionDetails {
                    checkout_session_id: session.id.unwrap_or_default(),
                    payment_intent_id: session.payment_intent,
                    customer_id,
                    amount_subtotal: session.amount_subtotal,
                    amount_total: session.amount_total,
                    currency: session.currency,
                    payment_status: "paid".to_string(),
                    piece_id: piece_id_from_metadata(session.metadata.as_ref()),
                })
            }
            (mode, payment_status) => {
                debug!(
                    ?mode,
                    ?payment_status,
                    "webhook: checkout session is not a paid one-time payment; ignoring"
                );
                WebhookAction::Ignore
            }
        };
    }

    // Every other customer-bearing event is a subscription lifecycle change;
    // the sync re-fetches authoritative state, so over-triggering is safe.
    WebhookAction::SyncSubscription { customer_id }
}

fn piece_id_from_metadata(metadata: Option<&HashMap<String, String>>) -> Option<Uuid> {
    let raw = metadata?.get("piece_id")?;
    match Uuid::parse_str(raw) {
        Ok(piece_id) => Some(piece_id),
        Err(err) => {
            warn!(
                piece_id = %raw,
                error = %err,
                "webhook: piece_id metadata is not a valid uuid; treating as absent"
            );
            None
        }
    }
}

pub struct StripeWebhookUseCase<Stripe, Cust, Sub, Ord, Piece, Prof, Notif>
where
    Stripe: StripeGateway + Send + Sync + 'static,
    Cust: CustomerRepository + Send + Sync + 'static,
    Sub: SubscriptionMirrorRepository + Send + Sync + 'static,
    Ord: OrderRepository + Send + Sync + 'static,
    Piece: PieceRepository + Send + Sync + 'static,
    Prof: ProfileRepository + Send + Sync + 'static,
    Notif: NotificationRepository + Send + Sync + 'static,
{
    stripe_client: Arc<Stripe>,
    customer_repo: Arc<Cust>,
    subscription_repo: Arc<Sub>,
    order_repo: Arc<Ord>,
    piece_repo: Arc<Piece>,
    profile_repo: Arc<Prof>,
    notification_repo: Arc<Notif>,
}

impl<Stripe, Cust, Sub, Ord, Piece, Prof, Notif>
    StripeWebhookUseCase<Stripe, Cust, Sub, Ord, Piece, Prof, Notif>
where
    Stripe: StripeGateway + Send + Sync + 'static,
    Cust: CustomerRepository + Send + Sync + 'static,
    Sub: SubscriptionMirrorRepository + Send + Sync + 'static,
    Ord: OrderRepository + Send + Sync + 'static,
    Piece: PieceRepository + Send + Sync + 'static,
    Prof: ProfileRepository + Send + Sync + 'static,
    Notif: NotificationRepository + Send + Sync + 'static,
{
    pub fn new(
        stripe_client: Arc<Stripe>,
        customer_repo: Arc<Cust>,
        subscription_repo: Arc<Sub>,
        order_repo: Arc<Ord>,
        piece_repo: Arc<Piece>,
        profile_repo: Arc<Prof>,
        notification_repo: Arc<Notif>,
    ) -> Self {
        Self {
            stripe_client,
            customer_repo,
            subscription_repo,
            order_repo,
            piece_repo,
            profile_repo,
            notification_repo,
        }
    }

    /// Authenticates the raw payload and decides the reconciliation path.
    /// Runs before the HTTP response; reconciliation itself runs after it.
    pub fn verify_and_classify(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<WebhookAction> {
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "webhook: signature verification failed");
                WebhookError::SignatureInvalid
            })?;

        info!(
            event_id = ?event.id,
            event_type = %event.type_,
            livemode = ?event.livemode,
            "webhook: stripe event verified"
        );

        Ok(classify_event(&event))
    }

    pub async fn reconcile(&self, action: WebhookAction) -> UseCaseResult<()> {
        match action {
            WebhookAction::Ignore => {
                debug!("webhook: nothing to reconcile");
                Ok(())
            }
            WebhookAction::SyncSubscription { customer_id } => {
                self.sync_customer_subscription(&customer_id).await
            }
            WebhookAction::RecordPayment(details) => self.record_one_time_payment(details).await,
        }
    }

    /// Mirrors the customer's provider-side subscription state. Always a full
    /// re-fetch plus full-row upsert, so delivery order between events for the
    /// same customer does not matter.
    pub async fn sync_customer_subscription(&self, customer_id: &str) -> UseCaseResult<()> {
        info!(%customer_id, "webhook: starting subscription sync");

        let subscriptions = self
            .stripe_client
            .list_customer_subscriptions(customer_id)
            .await
            .map_err(|err| {
                error!(
                    %customer_id,
                    error = ?err,
                    "webhook: failed to list subscriptions from stripe"
                );
                WebhookError::Internal(err)
            })?;

        let entity = match subscriptions.first() {
            None => {
                info!(%customer_id, "webhook: no subscriptions found for customer");
                UpsertSubscriptionEntity {
                    customer_id: customer_id.to_string(),
                    subscription_id: None,
                    price_id: None,
                    current_period_start: None,
                    current_period_end: None,
                    cancel_at_period_end: None,
                    payment_method_brand: None,
                    payment_method_last4: None,
                    status: SubscriptionStatus::NotStarted.to_string(),
                }
            }
            // A customer is assumed to hold at most one subscription.
            Some(subscription) => {
                let card = subscription.card();
                UpsertSubscriptionEntity {
                    customer_id: customer_id.to_string(),
                    subscription_id: Some(subscription.id.clone()),
                    price_id: subscription.price_id(),
                    current_period_start: subscription.period_start(),
                    current_period_end: subscription.period_end(),
                    cancel_at_period_end: subscription.cancel_at_period_end,
                    payment_method_brand: card.and_then(|c| c.brand.clone()),
                    payment_method_last4: card.and_then(|c| c.last4.clone()),
                    status: subscription.status.clone(),
                }
            }
        };

        let status = entity.status.clone();
        self.subscription_repo
            .upsert_by_customer_id(entity)
            .await
            .map_err(|err| {
                error!(
                    %customer_id,
                    db_error = ?err,
                    "webhook: failed to upsert subscription mirror"
                );
                WebhookError::Internal(err)
            })?;

        info!(%customer_id, status = %status, "webhook: subscription sync completed");
        Ok(())
    }

    /// Records a completed one-time payment. The order row is the financial
    /// record and gates everything else; the counter increments and the
    /// notification are best-effort derived effects that never fail the event.
    pub async fn record_one_time_payment(
        &self,
        details: CheckoutSessionDetails,
    ) -> UseCaseResult<()> {
        let session_id = details.checkout_session_id.clone();
        info!(
            checkout_session_id = %session_id,
            piece_id = ?details.piece_id,
            amount_total = ?details.amount_total,
            "webhook: processing one-time payment"
        );

        let order = InsertOrderEntity {
            checkout_session_id: details.checkout_session_id.clone(),
            payment_intent_id: details.payment_intent_id.clone(),
            customer_id: details.customer_id.clone(),
            amount_subtotal: details.amount_subtotal,
            amount_total: details.amount_total,
            currency: details.currency.clone(),
            payment_status: details.payment_status.clone(),
            status: OrderStatus::Completed.to_string(),
            piece_id: details.piece_id,
        };

        match self.order_repo.insert_order_once(order).await {
            Ok(OrderInsertOutcome::Inserted) => {}
            Ok(OrderInsertOutcome::AlreadyRecorded) => {
                // Re-delivery of an event we already processed; the counters
                // were already applied for this session.
                info!(
                    checkout_session_id = %session_id,
                    "webhook: checkout session already recorded; skipping"
                );
                return Ok(());
            }
            Err(err) => {
                error!(
                    checkout_session_id = %session_id,
                    db_error = ?err,
                    "webhook: failed to insert order"
                );
                return Err(WebhookError::Internal(err));
            }
        }

        let paid_amount = details.amount_total.filter(|amount| *amount > 0);

        if let (Some(piece_id), Some(amount)) = (details.piece_id, paid_amount) {
            if let Err(err) = self
                .piece_repo
                .increment_amount_raised(piece_id, amount)
                .await
            {
                error!(
                    %piece_id,
                    amount,
                    db_error = ?err,
                    "webhook: failed to increment piece amount_raised"
                );
            } else {
                info!(%piece_id, amount, "webhook: piece amount_raised incremented");
            }
        }

        if let Some(amount) = paid_amount {
            match self
                .customer_repo
                .find_user_id_by_customer_id(&details.customer_id)
                .await
            {
                Ok(Some(user_id)) => {
                    if let Err(err) = self
                        .profile_repo
                        .increment_total_donated_amount(user_id, amount)
                        .await
                    {
                        error!(
                            %user_id,
                            amount,
                            db_error = ?err,
                            "webhook: failed to increment total_donated_amount"
                        );
                    } else {
                        info!(%user_id, amount, "webhook: user donation total incremented");
                    }
                }
                Ok(None) => {
                    warn!(
                        customer_id = %details.customer_id,
                        "webhook: no user mapped to customer; skipping donation total"
                    );
                }
                Err(err) => {
                    error!(
                        customer_id = %details.customer_id,
                        db_error = ?err,
                        "webhook: failed to resolve user for donation total"
                    );
                }
            }
        }

        if let Some(piece_id) = details.piece_id {
            if let Err(err) = self.notify_donation(&details.customer_id, piece_id).await {
                // A missing notification never blocks payment recording.
                error!(
                    %piece_id,
                    error = ?err,
                    "webhook: failed to create donation notification"
                );
            }
        }

        info!(
            checkout_session_id = %session_id,
            "webhook: one-time payment processed"
        );
        Ok(())
    }

    async fn notify_donation(&self, customer_id: &str, piece_id: Uuid) -> AnyResult<()> {
        let Some(user_id) = self
            .customer_repo
            .find_user_id_by_customer_id(customer_id)
            .await?
        else {
            return Ok(());
        };

        let piece_title = self
            .piece_repo
            .find_title_by_id(piece_id)
            .await?
            .unwrap_or_else(|| "Peace Piece".to_string());

        self.notification_repo
            .insert_notification(InsertNotificationEntity {
                user_id,
                title: "Thank you for your donation!".to_string(),
                message: format!(
                    "Your donation to \"{piece_title}\" was successful. You now have access to view this piece and join the conversation."
                ),
                type_: NotificationType::Success.to_string(),
                action_url: Some(format!("/piece/{piece_id}")),
            })
            .await?;

        info!(%user_id, %piece_id, "webhook: donation notification created");
        Ok(())
    }
}
