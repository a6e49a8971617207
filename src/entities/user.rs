//! User entity - An account holder or an anonymous guest.
//!
//! Guests carry a locally generated identifier. Referral bookkeeping is kept as two
//! counters: `free_premium_credits` is what the referral history has earned, and
//! `consumed_premium_credits` only ever grows as credits are redeemed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Account identifier, or `guest_<uuid>` for anonymous guests
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// `"free"` or `"premium"`
    pub plan_tier: String,
    /// Code other users enter to be attributed to this user
    #[sea_orm(unique)]
    pub referral_code: String,
    /// Number of referrals by this user that reached `completed`
    pub completed_referrals: i64,
    /// Credits earned from referrals: completed referrals divided by the per-credit threshold
    pub free_premium_credits: i64,
    /// Credits already redeemed; never decremented
    pub consumed_premium_credits: i64,
    /// When the user first interacted
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user owns many moments
    #[sea_orm(has_many = "super::moment::Entity")]
    Moments,
    /// One user holds many discount offers over time
    #[sea_orm(has_many = "super::discount_offer::Entity")]
    DiscountOffers,
}

impl Related<super::moment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Moments.def()
    }
}

impl Related<super::discount_offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DiscountOffers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
