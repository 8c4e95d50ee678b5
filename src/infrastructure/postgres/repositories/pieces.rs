use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, QueryDsl, RunQueryDsl, prelude::*, update};
use uuid::Uuid;

use crate::{
    domain::repositories::pieces::PieceRepository,
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::pieces},
};

pub struct PiecePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PiecePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PieceRepository for PiecePostgres {
    async fn increment_amount_raised(&self, piece_id: Uuid, delta: i64) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Relative add in a single statement; callers never read-modify-write.
        update(pieces::table.filter(pieces::id.eq(piece_id)))
            .set((
                pieces::amount_raised.eq(pieces::amount_raised + delta),
                pieces::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_title_by_id(&self, piece_id: Uuid) -> Result<Option<String>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let title = pieces::table
            .find(piece_id)
            .select(pieces::title)
            .first::<String>(&mut conn)
            .optional()?;

        Ok(title)
    }
}
