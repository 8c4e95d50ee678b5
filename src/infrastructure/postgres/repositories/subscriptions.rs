use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*};

use crate::{
    domain::{
        entities::subscriptions::UpsertSubscriptionEntity,
        repositories::subscriptions::SubscriptionMirrorRepository,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::stripe_subscriptions},
};

pub struct SubscriptionMirrorPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionMirrorPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionMirrorRepository for SubscriptionMirrorPostgres {
    async fn upsert_by_customer_id(&self, entity: UpsertSubscriptionEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(stripe_subscriptions::table)
            .values(&entity)
            .on_conflict(stripe_subscriptions::customer_id)
            .do_update()
            .set((&entity, stripe_subscriptions::updated_at.eq(diesel::dsl::now)))
            .execute(&mut conn)?;

        Ok(())
    }
}
