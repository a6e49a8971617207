//! Moment entity - One finalized message artifact and the pricing decision made for it.
//!
//! Price, format and entitlement columns are written once at creation. Only `media_url`
//! is filled in later, after rendering finishes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Moment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "moments")]
pub struct Model {
    /// Unique identifier for the moment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Who the moment is for
    pub recipient_name: String,
    /// Occasion (e.g., "birthday", "apology")
    pub occasion: String,
    /// Relationship to the recipient (e.g., "partner", "mum")
    pub relationship: String,
    /// Requested tone (e.g., "warm", "playful")
    pub tone: String,
    /// `"text"`, `"user_voice"`, `"user_video"`, `"kid_voice"` or `"kid_video"`
    pub delivery_type: String,
    /// Visual styling: `"plain"`, `"still"` or `"gif"`
    pub presentation: String,
    /// Message body
    pub message: String,
    /// Rendered media location, attached after rendering
    pub media_url: Option<String>,
    /// Whether the moment is premium
    pub is_premium: bool,
    /// Price charged in whole shillings
    pub price_charged: i64,
    /// Whether the output carries the free-tier watermark
    pub has_watermark: bool,
    /// Whether a referral-earned credit paid for this moment
    pub consumed_free_credit: bool,
    /// Discount offer applied to the price, if any
    pub discount_offer_id: Option<i64>,
    /// User who shared the link that led to this moment
    pub referrer_id: Option<String>,
    /// When the moment was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Moment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each moment belongs to one user
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
