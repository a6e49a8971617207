//! Referral business logic - recording referrals, completing them and recomputing the
//! referral bonus.
//!
//! A referral is recorded as `pending` when a new user arrives with someone's code and moves
//! to `completed` once the referred user qualifies. Each completion triggers a bonus
//! recompute: the referrer's earned credits are replaced by
//! `completed referrals / referrals_per_credit`. Redeemed credits are counted separately in
//! `consumed_premium_credits`, so a recompute can never hand back a credit already spent.
//!
//! Completion and recompute run in one transaction, so the completed count that is written is
//! always the count the write was computed from.

use crate::{
    config::pricing::PricingConfig,
    core::pricing::{earned_credits, to_db_int},
    entities::{Referral, User, referral, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Lifecycle of a referral. Only ever advances from `Pending` to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralStatus {
    /// Referred user signed up but has not qualified yet
    Pending,
    /// Referral counts towards the referrer's bonus
    Completed,
}

impl ReferralStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(Error::invalid(format!("unknown referral status '{other}'"))),
        }
    }
}

fn validate_pair(referrer_id: &str, referred_user_id: &str) -> Result<()> {
    if referrer_id.trim().is_empty() || referred_user_id.trim().is_empty() {
        return Err(Error::invalid("referral user ids cannot be empty"));
    }
    if referrer_id == referred_user_id {
        return Err(Error::invalid("a user cannot refer themselves"));
    }
    Ok(())
}

/// Finds the referral row for a (referrer, referred user) pair.
pub async fn get_referral<C>(
    db: &C,
    referrer_id: &str,
    referred_user_id: &str,
) -> Result<Option<referral::Model>>
where
    C: ConnectionTrait,
{
    Referral::find()
        .filter(referral::Column::ReferrerId.eq(referrer_id))
        .filter(referral::Column::ReferredUserId.eq(referred_user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Records a new `pending` referral.
///
/// # Errors
/// Returns `Error::InvalidArgument` for empty ids or a self-referral, and
/// `Error::DuplicateReferral` if the pair was already recorded.
#[instrument(skip(db))]
pub async fn record_referral<C>(
    db: &C,
    referrer_id: &str,
    referred_user_id: &str,
) -> Result<referral::Model>
where
    C: ConnectionTrait,
{
    validate_pair(referrer_id, referred_user_id)?;

    if get_referral(db, referrer_id, referred_user_id)
        .await?
        .is_some()
    {
        return Err(Error::DuplicateReferral {
            referrer_id: referrer_id.to_string(),
            referred_user_id: referred_user_id.to_string(),
        });
    }

    let model = referral::ActiveModel {
        referrer_id: Set(referrer_id.to_string()),
        referred_user_id: Set(referred_user_id.to_string()),
        status: Set(ReferralStatus::Pending.as_str().to_string()),
        created_at: Set(chrono::Utc::now()),
        completed_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Recorded pending referral {} from {} to {}",
        model.id, referrer_id, referred_user_id
    );
    Ok(model)
}

/// All completed referrals made by `referrer_id`, oldest completion first.
pub async fn get_completed_referrals<C>(db: &C, referrer_id: &str) -> Result<Vec<referral::Model>>
where
    C: ConnectionTrait,
{
    Referral::find()
        .filter(referral::Column::ReferrerId.eq(referrer_id))
        .filter(referral::Column::Status.eq(ReferralStatus::Completed.as_str()))
        .order_by_asc(referral::Column::CompletedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a referral `completed` and recomputes the referrer's bonus in the same transaction.
///
/// A missing pair is inserted directly as completed. An already-completed pair is left
/// untouched, which makes repeated completion events harmless.
///
/// Returns the referrer's new earned credit count.
///
/// # Errors
/// Returns `Error::InvalidArgument` for empty ids or a self-referral,
/// `Error::StaleRead` if the completed referrals cannot be read back, and
/// `Error::UserNotFound` if the referrer has no user row. Nothing is committed on error.
#[instrument(skip(db, rules))]
pub async fn complete_referral(
    db: &DatabaseConnection,
    rules: &PricingConfig,
    referrer_id: &str,
    referred_user_id: &str,
) -> Result<u64> {
    validate_pair(referrer_id, referred_user_id)?;

    let txn = db.begin().await?;
    let now = chrono::Utc::now();

    match get_referral(&txn, referrer_id, referred_user_id).await? {
        Some(existing) => match existing.status.parse::<ReferralStatus>()? {
            ReferralStatus::Completed => {
                debug!("Referral {} already completed", existing.id);
            }
            ReferralStatus::Pending => {
                let mut active: referral::ActiveModel = existing.into();
                active.status = Set(ReferralStatus::Completed.as_str().to_string());
                active.completed_at = Set(Some(now));
                active.update(&txn).await?;
            }
        },
        None => {
            referral::ActiveModel {
                referrer_id: Set(referrer_id.to_string()),
                referred_user_id: Set(referred_user_id.to_string()),
                status: Set(ReferralStatus::Completed.as_str().to_string()),
                created_at: Set(now),
                completed_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    let credits = apply_referral_bonus(&txn, rules, referrer_id).await?;
    txn.commit().await?;

    info!(
        "Completed referral from {} to {}; referrer now has {} earned credits",
        referrer_id, referred_user_id, credits
    );
    Ok(credits)
}

/// Recomputes a referrer's earned credits from their completed referrals.
///
/// The stored value is replaced, not incremented. Returns the new earned credit count.
///
/// # Errors
/// Returns `Error::StaleRead` if the completed referrals cannot be read, in which case the
/// stored count is left unchanged, and `Error::UserNotFound` if the referrer does not exist.
#[instrument(skip(db, rules))]
pub async fn recompute_referral_bonus(
    db: &DatabaseConnection,
    rules: &PricingConfig,
    referrer_id: &str,
) -> Result<u64> {
    let txn = db.begin().await?;
    let credits = apply_referral_bonus(&txn, rules, referrer_id).await?;
    txn.commit().await?;
    Ok(credits)
}

async fn apply_referral_bonus<C>(db: &C, rules: &PricingConfig, referrer_id: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    let completed = Referral::find()
        .filter(referral::Column::ReferrerId.eq(referrer_id))
        .filter(referral::Column::Status.eq(ReferralStatus::Completed.as_str()))
        .count(db)
        .await
        .map_err(|source| Error::StaleRead {
            referrer_id: referrer_id.to_string(),
            source,
        })?;

    let credits = earned_credits(completed, rules);

    let result = User::update_many()
        .col_expr(
            user::Column::CompletedReferrals,
            Expr::value(to_db_int("completed referrals", completed)?),
        )
        .col_expr(
            user::Column::FreePremiumCredits,
            Expr::value(to_db_int("free premium credits", credits)?),
        )
        .filter(user::Column::Id.eq(referrer_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::UserNotFound {
            id: referrer_id.to_string(),
        });
    }

    debug!(
        "Referrer {} has {} completed referrals, {} earned credits",
        referrer_id, completed, credits
    );
    Ok(credits)
}
