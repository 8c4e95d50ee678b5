use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait CustomerRepository {
    async fn find_user_id_by_customer_id(&self, customer_id: &str) -> Result<Option<Uuid>>;
}
