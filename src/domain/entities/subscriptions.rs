use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infrastructure::postgres::schema::stripe_subscriptions;

/// Local mirror of a customer's Stripe subscription, one row per customer.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = stripe_subscriptions)]
pub struct SubscriptionMirrorEntity {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: Option<bool>,
    pub payment_method_brand: Option<String>,
    pub payment_method_last4: Option<String>,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Full-row upsert payload. `treat_none_as_null` so a re-sync clears fields
/// the provider no longer reports instead of leaving stale values behind.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = stripe_subscriptions, treat_none_as_null = true)]
pub struct UpsertSubscriptionEntity {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: Option<bool>,
    pub payment_method_brand: Option<String>,
    pub payment_method_last4: Option<String>,
    pub status: String,
}
