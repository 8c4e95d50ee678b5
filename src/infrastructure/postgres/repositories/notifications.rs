use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into};

use crate::{
    domain::{
        entities::notifications::InsertNotificationEntity,
        repositories::notifications::NotificationRepository,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::notifications},
};

pub struct NotificationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl NotificationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl NotificationRepository for NotificationPostgres {
    async fn insert_notification(&self, entity: InsertNotificationEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(notifications::table)
            .values(&entity)
            .execute(&mut conn)?;

        Ok(())
    }
}
