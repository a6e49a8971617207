//! Database configuration module.
//!
//! Handles `SQLite` database connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`, so the
//! schema always matches the Rust structs. The one constraint entities cannot express,
//! uniqueness of the (referrer, referred user) pair, is added as an explicit index.

use crate::entities::{DiscountOffer, Moment, Referral, User, referral};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/rania.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back to a
/// local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(&get_database_url())
        .await
        .map_err(Into::into)
}

/// Creates all tables and indexes from the entity definitions.
///
/// Users are created first because moments and discount offers reference them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut tables = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Moment),
        schema.create_table_from_entity(DiscountOffer),
        schema.create_table_from_entity(Referral),
    ];

    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    let referral_pair_index = Index::create()
        .name("idx_referrals_referrer_referred")
        .table(Referral)
        .col(referral::Column::ReferrerId)
        .col(referral::Column::ReferredUserId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&referral_pair_index)).await?;

    Ok(())
}
