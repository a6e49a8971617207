//! Shared test utilities for the pricing engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::pricing::{AppConfig, PricingConfig},
    core::{
        moment::{self, MomentDraft, MomentReceipt},
        pricing::{DeliveryType, Presentation},
        referral, user,
    },
    entities,
    errors::Result,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates an account user with no referral code.
pub async fn create_test_user(
    db: &DatabaseConnection,
    id: &str,
) -> Result<entities::user::Model> {
    user::create_user(db, id, None).await
}

/// Overwrites a user's earned and consumed credit counters directly.
pub async fn set_user_credits(
    db: &DatabaseConnection,
    user_id: &str,
    earned: i64,
    consumed: i64,
) -> Result<entities::user::Model> {
    let mut active: entities::user::ActiveModel = entities::User::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| crate::errors::Error::UserNotFound {
            id: user_id.to_string(),
        })?
        .into();
    active.free_premium_credits = Set(earned);
    active.consumed_premium_credits = Set(consumed);
    active.update(db).await.map_err(Into::into)
}

/// Completes `count` referrals from `referrer_id` to freshly named users.
/// Returns the referrer's earned credits after the last one.
pub async fn complete_n_referrals(
    db: &DatabaseConnection,
    rules: &PricingConfig,
    referrer_id: &str,
    count: usize,
) -> Result<u64> {
    let mut credits = 0;
    for _ in 0..count {
        let referred = format!("referred_{}", uuid::Uuid::new_v4().simple());
        credits = referral::complete_referral(db, rules, referrer_id, &referred).await?;
    }
    Ok(credits)
}

/// Builds a moment draft with sensible defaults.
///
/// # Defaults
/// * `recipient_name`: `"Wanjiru"`
/// * `occasion`: `"birthday"`
/// * `relationship`: `"friend"`
/// * `tone`: `"warm"`
/// * `presentation`: plain
/// * no referrer, no credit redemption
#[must_use]
pub fn test_draft(user_id: &str, delivery: DeliveryType) -> MomentDraft {
    MomentDraft {
        user_id: user_id.to_string(),
        recipient_name: "Wanjiru".to_string(),
        occasion: "birthday".to_string(),
        relationship: "friend".to_string(),
        tone: "warm".to_string(),
        delivery,
        presentation: Presentation::Plain,
        message: "Happy birthday! You make every day brighter.".to_string(),
        referrer_id: None,
        redeem_free_credit: false,
    }
}

/// Creates `count` text moments for a user through the normal finalize workflow.
pub async fn create_text_moments(
    db: &DatabaseConnection,
    config: &AppConfig,
    user_id: &str,
    count: usize,
) -> Result<Vec<MomentReceipt>> {
    let mut receipts = Vec::with_capacity(count);
    for _ in 0..count {
        receipts.push(moment::create_moment(db, config, test_draft(user_id, DeliveryType::Text)).await?);
    }
    Ok(receipts)
}
