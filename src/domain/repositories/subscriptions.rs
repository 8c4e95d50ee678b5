use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::subscriptions::UpsertSubscriptionEntity;

#[automock]
#[async_trait]
pub trait SubscriptionMirrorRepository {
    /// Insert-or-replace keyed on customer id. A second sync for the same
    /// customer overwrites the prior row entirely.
    async fn upsert_by_customer_id(&self, entity: UpsertSubscriptionEntity) -> Result<()>;
}
