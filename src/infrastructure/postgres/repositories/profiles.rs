use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*, update};
use uuid::Uuid;

use crate::{
    domain::repositories::profiles::ProfileRepository,
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::profiles},
};

pub struct ProfilePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ProfilePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProfileRepository for ProfilePostgres {
    async fn increment_total_donated_amount(&self, user_id: Uuid, delta: i64) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(profiles::table.filter(profiles::id.eq(user_id)))
            .set((
                profiles::total_donated_amount.eq(profiles::total_donated_amount + delta),
                profiles::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
