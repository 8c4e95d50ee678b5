use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::pieces;

/// The funded work. `amount_raised` only ever moves by relative increments.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = pieces)]
pub struct PieceEntity {
    pub id: Uuid,
    pub title: String,
    pub amount_raised: i64,
    pub updated_at: DateTime<Utc>,
}
