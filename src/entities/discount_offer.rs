//! Discount offer entity - A time-bounded per-user override of the premium price.
//!
//! Status moves `active -> used` when a moment is priced with it, or `active -> expired`
//! when an external job retires it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Discount offer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discount_offers")]
pub struct Model {
    /// Unique identifier for the offer
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User the offer was made to
    pub user_id: String,
    /// Discounted price in whole shillings
    pub price: i64,
    /// `"standard_drop"` or `"receiver_drop"`
    pub kind: String,
    /// `"active"`, `"used"` or `"expired"`
    pub status: String,
    /// When the offer was created
    pub created_at: DateTimeUtc,
    /// When the offer was consumed
    pub used_at: Option<DateTimeUtc>,
}

/// Defines relationships between `DiscountOffer` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each offer belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
