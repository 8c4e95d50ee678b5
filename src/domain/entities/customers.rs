use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::stripe_customers;

/// Mapping from a Stripe customer id to the internal user. Created by the
/// checkout flow; this service only reads it.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = stripe_customers)]
pub struct CustomerEntity {
    pub customer_id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
