//! Referral entity - A referrer/referred pair and its completion status.
//!
//! The pair is unique (enforced by an index created alongside the table) and the
//! status only advances `pending -> completed`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Referral database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "referrals")]
pub struct Model {
    /// Unique identifier for the referral
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who shared their referral code
    pub referrer_id: String,
    /// User who signed up with it
    pub referred_user_id: String,
    /// `"pending"` or `"completed"`
    pub status: String,
    /// When the referral was recorded
    pub created_at: DateTimeUtc,
    /// When the referral reached `completed`
    pub completed_at: Option<DateTimeUtc>,
}

/// Referrals point at two users, so no single relation is declared
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
