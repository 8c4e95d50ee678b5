use uuid::Uuid;

/// What a verified Stripe event asks the service to do, decided once by the
/// classifier before any reconciliation runs.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookAction {
    /// Nothing to reconcile (no customer, uninvoiced payment intent, or an
    /// unpaid/unknown checkout session).
    Ignore,
    /// Re-fetch the customer's subscription state from Stripe and mirror it.
    SyncSubscription { customer_id: String },
    /// Record a completed one-time payment.
    RecordPayment(CheckoutSessionDetails),
}

/// The fields of a completed `checkout.session` the payment reconciler needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionDetails {
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub customer_id: String,
    pub amount_subtotal: Option<i64>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: String,
    /// Funded piece, carried in the session metadata by checkout creation.
    pub piece_id: Option<Uuid>,
}

/// Outcome of the insert-once order write. A duplicate delivery of the same
/// checkout session reports `AlreadyRecorded` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderInsertOutcome {
    Inserted,
    AlreadyRecorded,
}
