use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait PieceRepository {
    /// Atomic relative increment, applied by the database in one statement.
    async fn increment_amount_raised(&self, piece_id: Uuid, delta: i64) -> Result<()>;

    async fn find_title_by_id(&self, piece_id: Uuid) -> Result<Option<String>>;
}
