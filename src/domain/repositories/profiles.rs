use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait ProfileRepository {
    /// Atomic relative increment, applied by the database in one statement.
    async fn increment_total_donated_amount(&self, user_id: Uuid, delta: i64) -> Result<()>;
}
