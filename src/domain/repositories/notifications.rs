use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::notifications::InsertNotificationEntity;

#[automock]
#[async_trait]
pub trait NotificationRepository {
    async fn insert_notification(&self, entity: InsertNotificationEntity) -> Result<()>;
}
