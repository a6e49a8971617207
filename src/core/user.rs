//! User business logic - account and guest creation, lookups and credit consumption.
//!
//! A user row is created on first interaction: either with the identifier of a signed-in
//! account or with a generated guest identifier. Each user receives a referral code; a code
//! supplied at sign-up attributes the new user to its owner as a pending referral.
//!
//! Referral credits are tracked as earned (recomputed from referral history) and consumed
//! (incremented on redemption only). What a user can spend is the difference.

use crate::{
    core::{pricing::non_negative, referral},
    entities::{User, user},
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const GUEST_ID_PREFIX: &str = "guest_";
const REFERRAL_CODE_LEN: usize = 8;

/// Subscription tier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanTier {
    /// Default tier
    #[default]
    Free,
    /// Paying subscriber
    Premium,
}

impl PlanTier {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            other => Err(Error::invalid(format!("unknown plan tier '{other}'"))),
        }
    }
}

/// Creates an account user with a caller-supplied identifier.
///
/// If `referral_code_used` belongs to an existing user, a pending referral from that user
/// is recorded in the same transaction. Unknown codes are logged and ignored.
///
/// # Errors
/// Returns `Error::InvalidArgument` for an empty identifier and `Error::Database` if the
/// identifier is already taken or the insert fails.
#[instrument(skip(db))]
pub async fn create_user(
    db: &DatabaseConnection,
    id: &str,
    referral_code_used: Option<&str>,
) -> Result<user::Model> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::invalid("user id cannot be empty"));
    }
    if id.starts_with(GUEST_ID_PREFIX) {
        return Err(Error::invalid(format!(
            "user id cannot use the reserved '{GUEST_ID_PREFIX}' prefix"
        )));
    }
    insert_user(db, id.to_string(), referral_code_used).await
}

/// Creates an anonymous guest with a generated `guest_<uuid>` identifier.
#[instrument(skip(db))]
pub async fn create_guest_user(
    db: &DatabaseConnection,
    referral_code_used: Option<&str>,
) -> Result<user::Model> {
    let id = format!("{GUEST_ID_PREFIX}{}", Uuid::new_v4().hyphenated());
    insert_user(db, id, referral_code_used).await
}

async fn insert_user(
    db: &DatabaseConnection,
    id: String,
    referral_code_used: Option<&str>,
) -> Result<user::Model> {
    let txn = db.begin().await?;

    let new_user = user::ActiveModel {
        id: Set(id),
        plan_tier: Set(PlanTier::Free.as_str().to_string()),
        referral_code: Set(generate_referral_code()),
        completed_referrals: Set(0),
        free_premium_credits: Set(0),
        consumed_premium_credits: Set(0),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(&txn)
    .await?;

    if let Some(code) = referral_code_used.map(str::trim).filter(|c| !c.is_empty()) {
        match get_user_by_referral_code(&txn, code).await? {
            Some(referrer) => {
                referral::record_referral(&txn, &referrer.id, &new_user.id).await?;
            }
            None => warn!("Ignoring unknown referral code '{}'", code),
        }
    }

    txn.commit().await?;
    info!("Created user {}", new_user.id);
    Ok(new_user)
}

fn generate_referral_code() -> String {
    Uuid::new_v4().simple().to_string()[..REFERRAL_CODE_LEN].to_uppercase()
}

/// Finds a user by identifier.
pub async fn get_user_by_id<C>(db: &C, user_id: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a user by identifier, failing with `Error::UserNotFound` if absent.
pub async fn require_user<C>(db: &C, user_id: &str) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            id: user_id.to_string(),
        })
}

/// Finds the owner of a referral code. Codes are matched case-insensitively.
pub async fn get_user_by_referral_code<C>(db: &C, code: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::ReferralCode.eq(code.trim().to_uppercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Credits the user can still redeem: earned minus consumed, never below zero.
///
/// # Errors
/// Returns `Error::InvalidArgument` if either stored counter is negative.
pub fn available_credits(user: &user::Model) -> Result<u64> {
    let earned = non_negative("free premium credits", user.free_premium_credits)?;
    let consumed = non_negative("consumed premium credits", user.consumed_premium_credits)?;
    Ok(earned.saturating_sub(consumed))
}

/// Spends one referral credit.
///
/// The consumed counter is incremented with a single conditional update that only matches
/// while `consumed < earned`, so two concurrent redemptions cannot spend the same credit.
///
/// # Errors
/// Returns `Error::NoCreditAvailable` if no credit was left to spend.
#[instrument(skip(db))]
pub async fn consume_free_credit<C>(db: &C, user_id: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = User::update_many()
        .col_expr(
            user::Column::ConsumedPremiumCredits,
            Expr::col(user::Column::ConsumedPremiumCredits).add(1),
        )
        .filter(user::Column::Id.eq(user_id))
        .filter(
            Expr::col(user::Column::ConsumedPremiumCredits)
                .lt(Expr::col(user::Column::FreePremiumCredits)),
        )
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::NoCreditAvailable {
            user_id: user_id.to_string(),
        });
    }

    info!("Consumed one free premium credit for user {}", user_id);
    Ok(())
}
