use super::*;
use crate::domain::repositories::customers::MockCustomerRepository;
use crate::domain::repositories::notifications::MockNotificationRepository;
use crate::domain::repositories::orders::MockOrderRepository;
use crate::domain::repositories::pieces::MockPieceRepository;
use crate::domain::repositories::profiles::MockProfileRepository;
use crate::domain::repositories::subscriptions::MockSubscriptionMirrorRepository;
use mockall::predicate::eq;
use serde_json::json;

type TestUseCase = StripeWebhookUseCase<
    MockStripeGateway,
    MockCustomerRepository,
    MockSubscriptionMirrorRepository,
    MockOrderRepository,
    MockPieceRepository,
    MockProfileRepository,
    MockNotificationRepository,
>;

struct Mocks {
    gateway: MockStripeGateway,
    customers: MockCustomerRepository,
    subscriptions: MockSubscriptionMirrorRepository,
    orders: MockOrderRepository,
    pieces: MockPieceRepository,
    profiles: MockProfileRepository,
    notifications: MockNotificationRepository,
}

impl Mocks {
    fn new() -> Self {
        Self {
            gateway: MockStripeGateway::new(),
            customers: MockCustomerRepository::new(),
            subscriptions: MockSubscriptionMirrorRepository::new(),
            orders: MockOrderRepository::new(),
            pieces: MockPieceRepository::new(),
            profiles: MockProfileRepository::new(),
            notifications: MockNotificationRepository::new(),
        }
    }

    fn into_usecase(self) -> TestUseCase {
        StripeWebhookUseCase::new(
            Arc::new(self.gateway),
            Arc::new(self.customers),
            Arc::new(self.subscriptions),
            Arc::new(self.orders),
            Arc::new(self.pieces),
            Arc::new(self.profiles),
            Arc::new(self.notifications),
        )
    }
}

fn event(value: serde_json::Value) -> StripeEvent {
    serde_json::from_value(value).expect("test event must deserialize")
}

fn paid_session_details(piece_id: Option<Uuid>) -> CheckoutSessionDetails {
    CheckoutSessionDetails {
        checkout_session_id: "cs_test_1".to_string(),
        payment_intent_id: Some("pi_1".to_string()),
        customer_id: "cus_1".to_string(),
        amount_subtotal: Some(500),
        amount_total: Some(500),
        currency: Some("usd".to_string()),
        payment_status: "paid".to_string(),
        piece_id,
    }
}

#[test]
fn test_invalid_signature_is_rejected_without_writes() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_verify_webhook_signature()
        .returning(|_, _| Err(anyhow::anyhow!("invalid webhook signature")));
    // No repository expectations: any persistent write would panic the mock.
    let usecase = mocks.into_usecase();

    let result = usecase.verify_and_classify(b"{}", "t=1,v1=00");

    let err = result.expect_err("forged payload must be rejected");
    assert!(matches!(err, WebhookError::SignatureInvalid));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
}

#[test]
fn test_error_status_codes() {
    assert_eq!(
        WebhookError::MissingSignature.status_code(),
        axum::http::StatusCode::BAD_REQUEST
    );
    assert_eq!(
        WebhookError::MethodNotAllowed.status_code(),
        axum::http::StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(
        WebhookError::Internal(anyhow::anyhow!("boom")).status_code(),
        axum::http::StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_classify_ignores_event_without_customer() {
    let action = classify_event(&event(json!({
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_1" } }
    })));

    assert_eq!(action, WebhookAction::Ignore);
}

#[test]
fn test_classify_ignores_uninvoiced_payment_intent() {
    let action = classify_event(&event(json!({
        "type": "payment_intent.succeeded",
        "data": { "object": { "customer": "cus_1", "invoice": null } }
    })));

    assert_eq!(action, WebhookAction::Ignore);
}

#[test]
fn test_classify_syncs_invoiced_payment_intent() {
    let action = classify_event(&event(json!({
        "type": "payment_intent.succeeded",
        "data": { "object": { "customer": "cus_1", "invoice": "in_1" } }
    })));

    assert_eq!(
        action,
        WebhookAction::SyncSubscription {
            customer_id: "cus_1".to_string()
        }
    );
}

#[test]
fn test_classify_subscription_checkout_session() {
    let action = classify_event(&event(json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_1",
            "customer": "cus_1",
            "mode": "subscription",
            "payment_status": "paid"
        } }
    })));

    assert_eq!(
        action,
        WebhookAction::SyncSubscription {
            customer_id: "cus_1".to_string()
        }
    );
}

#[test]
fn test_classify_paid_payment_checkout_session() {
    let piece_id = Uuid::new_v4();
    let action = classify_event(&event(json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_1",
            "customer": "cus_1",
            "mode": "payment",
            "payment_status": "paid",
            "payment_intent": "pi_1",
            "amount_subtotal": 500,
            "amount_total": 500,
            "currency": "usd",
            "metadata": { "piece_id": piece_id.to_string() }
        } }
    })));

    match action {
        WebhookAction::RecordPayment(details) => {
            assert_eq!(details.checkout_session_id, "cs_1");
            assert_eq!(details.payment_intent_id.as_deref(), Some("pi_1"));
            assert_eq!(details.customer_id, "cus_1");
            assert_eq!(details.amount_total, Some(500));
            assert_eq!(details.piece_id, Some(piece_id));
        }
        other => panic!("expected RecordPayment, got {other:?}"),
    }
}

#[test]
fn test_classify_ignores_unpaid_payment_session() {
    let action = classify_event(&event(json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_1",
            "customer": "cus_1",
            "mode": "payment",
            "payment_status": "unpaid"
        } }
    })));

    assert_eq!(action, WebhookAction::Ignore);
}

#[test]
fn test_classify_defaults_lifecycle_events_to_sync() {
    for event_type in [
        "customer.subscription.created",
        "customer.subscription.updated",
        "customer.subscription.deleted",
        "customer.subscription.trial_will_end",
    ] {
        let action = classify_event(&event(json!({
            "type": event_type,
            "data": { "object": { "customer": "cus_1" } }
        })));

        assert_eq!(
            action,
            WebhookAction::SyncSubscription {
                customer_id: "cus_1".to_string()
            },
            "event type {event_type} should trigger a sync"
        );
    }
}

#[test]
fn test_classify_drops_malformed_piece_id() {
    let action = classify_event(&event(json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_1",
            "customer": "cus_1",
            "mode": "payment",
            "payment_status": "paid",
            "metadata": { "piece_id": "not-a-uuid" }
        } }
    })));

    match action {
        WebhookAction::RecordPayment(details) => assert_eq!(details.piece_id, None),
        other => panic!("expected RecordPayment, got {other:?}"),
    }
}

#[test]
fn test_verify_and_classify_happy_path() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_verify_webhook_signature()
        .returning(|payload, _| Ok(serde_json::from_slice(payload)?));
    let usecase = mocks.into_usecase();

    let payload = serde_json::to_vec(&json!({
        "id": "evt_1",
        "type": "customer.subscription.updated",
        "data": { "object": { "customer": "cus_1" } }
    }))
    .unwrap();

    let action = usecase
        .verify_and_classify(&payload, "t=1,v1=ok")
        .expect("verified event must classify");
    assert_eq!(
        action,
        WebhookAction::SyncSubscription {
            customer_id: "cus_1".to_string()
        }
    );
}

#[tokio::test]
async fn test_sync_with_no_subscriptions_records_not_started() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_list_customer_subscriptions()
        .with(eq("cus_1"))
        .returning(|_| Ok(vec![]));
    mocks
        .subscriptions
        .expect_upsert_by_customer_id()
        .withf(|entity| {
            entity.customer_id == "cus_1"
                && entity.status == "not_started"
                && entity.subscription_id.is_none()
                && entity.price_id.is_none()
                && entity.current_period_start.is_none()
        })
        .returning(|_| Ok(()));
    let usecase = mocks.into_usecase();

    usecase
        .reconcile(WebhookAction::SyncSubscription {
            customer_id: "cus_1".to_string(),
        })
        .await
        .expect("sync must succeed");
}

#[tokio::test]
async fn test_sync_with_active_subscription_mirrors_full_row() {
    let subscription: StripeSubscription = serde_json::from_value(json!({
        "id": "sub_1",
        "status": "active",
        "cancel_at_period_end": true,
        "current_period_start": 1700000000i64,
        "current_period_end": 1702592000i64,
        "items": { "data": [{ "price": { "id": "price_123" } }] },
        "default_payment_method": {
            "id": "pm_1",
            "card": { "brand": "visa", "last4": "4242" }
        }
    }))
    .unwrap();

    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_list_customer_subscriptions()
        .with(eq("cus_1"))
        .returning(move |_| Ok(vec![subscription.clone()]));
    mocks
        .subscriptions
        .expect_upsert_by_customer_id()
        .withf(|entity| {
            entity.customer_id == "cus_1"
                && entity.subscription_id.as_deref() == Some("sub_1")
                && entity.price_id.as_deref() == Some("price_123")
                && entity.current_period_start == Some(1700000000)
                && entity.current_period_end == Some(1702592000)
                && entity.cancel_at_period_end == Some(true)
                && entity.payment_method_brand.as_deref() == Some("visa")
                && entity.payment_method_last4.as_deref() == Some("4242")
                && entity.status == "active"
        })
        .returning(|_| Ok(()));
    let usecase = mocks.into_usecase();

    usecase
        .sync_customer_subscription("cus_1")
        .await
        .expect("sync must succeed");
}

#[tokio::test]
async fn test_sync_propagates_provider_failure() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_list_customer_subscriptions()
        .returning(|_| Err(anyhow::anyhow!("stripe unreachable")));
    let usecase = mocks.into_usecase();

    let result = usecase.sync_customer_subscription("cus_1").await;

    assert!(matches!(result, Err(WebhookError::Internal(_))));
}

#[tokio::test]
async fn test_sync_propagates_mirror_write_failure() {
    let mut mocks = Mocks::new();
    mocks
        .gateway
        .expect_list_customer_subscriptions()
        .returning(|_| Ok(vec![]));
    mocks
        .subscriptions
        .expect_upsert_by_customer_id()
        .returning(|_| Err(anyhow::anyhow!("connection pool exhausted")));
    let usecase = mocks.into_usecase();

    let result = usecase.sync_customer_subscription("cus_1").await;

    assert!(matches!(result, Err(WebhookError::Internal(_))));
}

#[tokio::test]
async fn test_payment_records_order_and_increments_counters() {
    let piece_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let mut mocks = Mocks::new();
    mocks
        .orders
        .expect_insert_order_once()
        .withf(move |order| {
            order.checkout_session_id == "cs_test_1"
                && order.payment_intent_id.as_deref() == Some("pi_1")
                && order.customer_id == "cus_1"
                && order.amount_total == Some(500)
                && order.status == "completed"
                && order.piece_id == Some(piece_id)
        })
        .returning(|_| Ok(OrderInsertOutcome::Inserted));
    mocks
        .pieces
        .expect_increment_amount_raised()
        .with(eq(piece_id), eq(500i64))
        .returning(|_, _| Ok(()));
    // Resolved once for the donation total, once for the notification.
    mocks
        .customers
        .expect_find_user_id_by_customer_id()
        .with(eq("cus_1"))
        .times(2)
        .returning(move |_| Ok(Some(user_id)));
    mocks
        .profiles
        .expect_increment_total_donated_amount()
        .with(eq(user_id), eq(500i64))
        .returning(|_, _| Ok(()));
    mocks
        .pieces
        .expect_find_title_by_id()
        .with(eq(piece_id))
        .returning(|_| Ok(Some("Sunrise".to_string())));
    mocks
        .notifications
        .expect_insert_notification()
        .withf(move |notification| {
            notification.user_id == user_id
                && notification.type_ == "success"
                && notification.message.contains("Sunrise")
                && notification.action_url.as_deref() == Some(&format!("/piece/{piece_id}")[..])
        })
        .returning(|_| Ok(()));
    let usecase = mocks.into_usecase();

    usecase
        .record_one_time_payment(paid_session_details(Some(piece_id)))
        .await
        .expect("payment must reconcile");
}

#[tokio::test]
async fn test_duplicate_checkout_session_is_skipped() {
    let mut mocks = Mocks::new();
    mocks
        .orders
        .expect_insert_order_once()
        .returning(|_| Ok(OrderInsertOutcome::AlreadyRecorded));
    // No counter or notification expectations: a re-delivery must not touch them.
    let usecase = mocks.into_usecase();

    usecase
        .record_one_time_payment(paid_session_details(Some(Uuid::new_v4())))
        .await
        .expect("duplicate delivery is not an error");
}

#[tokio::test]
async fn test_payment_without_piece_skips_notification_and_piece_counter() {
    let user_id = Uuid::new_v4();

    let mut mocks = Mocks::new();
    mocks
        .orders
        .expect_insert_order_once()
        .withf(|order| order.piece_id.is_none())
        .returning(|_| Ok(OrderInsertOutcome::Inserted));
    mocks
        .customers
        .expect_find_user_id_by_customer_id()
        .with(eq("cus_1"))
        .times(1)
        .returning(move |_| Ok(Some(user_id)));
    mocks
        .profiles
        .expect_increment_total_donated_amount()
        .with(eq(user_id), eq(500i64))
        .returning(|_, _| Ok(()));
    let usecase = mocks.into_usecase();

    usecase
        .record_one_time_payment(paid_session_details(None))
        .await
        .expect("payment must reconcile");
}

#[tokio::test]
async fn test_order_insert_failure_aborts_remaining_steps() {
    let mut mocks = Mocks::new();
    mocks
        .orders
        .expect_insert_order_once()
        .returning(|_| Err(anyhow::anyhow!("order table unavailable")));
    let usecase = mocks.into_usecase();

    let result = usecase
        .record_one_time_payment(paid_session_details(Some(Uuid::new_v4())))
        .await;

    assert!(matches!(result, Err(WebhookError::Internal(_))));
}

#[tokio::test]
async fn test_derived_effect_failures_do_not_fail_the_event() {
    let piece_id = Uuid::new_v4();

    let mut mocks = Mocks::new();
    mocks
        .orders
        .expect_insert_order_once()
        .returning(|_| Ok(OrderInsertOutcome::Inserted));
    mocks
        .pieces
        .expect_increment_amount_raised()
        .returning(|_, _| Err(anyhow::anyhow!("pieces table unavailable")));
    mocks
        .customers
        .expect_find_user_id_by_customer_id()
        .times(2)
        .returning(|_| Ok(None));
    let usecase = mocks.into_usecase();

    usecase
        .record_one_time_payment(paid_session_details(Some(piece_id)))
        .await
        .expect("derived-effect failures are swallowed");
}
