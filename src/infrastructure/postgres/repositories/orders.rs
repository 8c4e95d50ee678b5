use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*};

use crate::{
    domain::{
        entities::orders::InsertOrderEntity, repositories::orders::OrderRepository,
        value_objects::webhook::OrderInsertOutcome,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::stripe_orders},
};

pub struct OrderPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderRepository for OrderPostgres {
    async fn insert_order_once(&self, entity: InsertOrderEntity) -> Result<OrderInsertOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The primary key on checkout_session_id arbitrates concurrent
        // deliveries; zero affected rows means another delivery won.
        let inserted_rows = insert_into(stripe_orders::table)
            .values(&entity)
            .on_conflict(stripe_orders::checkout_session_id)
            .do_nothing()
            .execute(&mut conn)?;

        if inserted_rows == 0 {
            return Ok(OrderInsertOutcome::AlreadyRecorded);
        }

        Ok(OrderInsertOutcome::Inserted)
    }
}
