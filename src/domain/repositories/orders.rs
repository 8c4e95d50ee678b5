use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::orders::InsertOrderEntity;
use crate::domain::value_objects::webhook::OrderInsertOutcome;

#[automock]
#[async_trait]
pub trait OrderRepository {
    /// Inserts the order unless a row for its checkout session already
    /// exists. Concurrent deliveries of the same event race safely here.
    async fn insert_order_once(&self, entity: InsertOrderEntity) -> Result<OrderInsertOutcome>;
}
