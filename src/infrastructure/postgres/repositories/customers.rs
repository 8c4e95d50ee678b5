use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, QueryDsl, RunQueryDsl, prelude::*};
use uuid::Uuid;

use crate::{
    domain::repositories::customers::CustomerRepository,
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::stripe_customers},
};

pub struct CustomerPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CustomerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CustomerRepository for CustomerPostgres {
    async fn find_user_id_by_customer_id(&self, customer_id: &str) -> Result<Option<Uuid>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user_id = stripe_customers::table
            .filter(stripe_customers::customer_id.eq(customer_id))
            .select(stripe_customers::user_id)
            .first::<Uuid>(&mut conn)
            .optional()?;

        Ok(user_id)
    }
}
