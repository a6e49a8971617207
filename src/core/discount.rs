//! Discount offer business logic - creating, looking up and retiring per-user price overrides.
//!
//! At most one offer is applied to a moment. When several offers are active at once, the most
//! recently created one wins, with the higher id breaking ties between offers created in the
//! same instant. Status changes are conditional updates on `status = 'active'`, so an offer can
//! be used or expired exactly once.

use crate::{
    core::pricing::non_negative,
    entities::{DiscountOffer, discount_offer},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

/// Where a discount offer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountKind {
    /// Periodic price drop offered to senders
    StandardDrop,
    /// Offer made to someone who received a moment
    ReceiverDrop,
}

impl DiscountKind {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StandardDrop => "standard_drop",
            Self::ReceiverDrop => "receiver_drop",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard_drop" => Ok(Self::StandardDrop),
            "receiver_drop" => Ok(Self::ReceiverDrop),
            other => Err(Error::invalid(format!("unknown discount kind '{other}'"))),
        }
    }
}

/// Lifecycle of a discount offer. `Active` is the only state that can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountStatus {
    /// Can be applied to the next moment
    Active,
    /// Applied to a moment
    Used,
    /// Retired unused
    Expired,
}

impl DiscountStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for DiscountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "expired" => Ok(Self::Expired),
            other => Err(Error::invalid(format!("unknown discount status '{other}'"))),
        }
    }
}

/// Creates an `active` discount offer for a user.
///
/// # Errors
/// Returns `Error::InvalidArgument` for a negative price or empty user id.
#[instrument(skip(db))]
pub async fn create_discount_offer<C>(
    db: &C,
    user_id: &str,
    price: i64,
    kind: DiscountKind,
) -> Result<discount_offer::Model>
where
    C: ConnectionTrait,
{
    if user_id.trim().is_empty() {
        return Err(Error::invalid("discount offer needs a user id"));
    }
    non_negative("discount price", price)?;

    let offer = discount_offer::ActiveModel {
        user_id: Set(user_id.to_string()),
        price: Set(price),
        kind: Set(kind.as_str().to_string()),
        status: Set(DiscountStatus::Active.as_str().to_string()),
        created_at: Set(chrono::Utc::now()),
        used_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Created {} discount offer {} for user {} at {}",
        kind, offer.id, user_id, price
    );
    Ok(offer)
}

/// Returns the user's active offer, newest first, or `None`.
pub async fn get_active_discount<C>(db: &C, user_id: &str) -> Result<Option<discount_offer::Model>>
where
    C: ConnectionTrait,
{
    DiscountOffer::find()
        .filter(discount_offer::Column::UserId.eq(user_id))
        .filter(discount_offer::Column::Status.eq(DiscountStatus::Active.as_str()))
        .order_by_desc(discount_offer::Column::CreatedAt)
        .order_by_desc(discount_offer::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// The offer a pricing decision would apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveDiscount {
    /// Offer identifier, needed to mark it used
    pub offer_id: i64,
    /// Validated discount price
    pub price: u64,
}

/// Returns the user's active offer in the form the pricing decision consumes.
///
/// # Errors
/// Returns `Error::InvalidArgument` if the stored price is negative.
pub async fn get_active_discount_price<C>(db: &C, user_id: &str) -> Result<Option<ActiveDiscount>>
where
    C: ConnectionTrait,
{
    get_active_discount(db, user_id)
        .await?
        .map(|offer| {
            Ok(ActiveDiscount {
                offer_id: offer.id,
                price: non_negative("discount price", offer.price)?,
            })
        })
        .transpose()
}

/// Marks an active offer `used`.
///
/// # Errors
/// Returns `Error::DiscountNotActive` if the offer does not exist or is not active.
#[instrument(skip(db))]
pub async fn mark_discount_used<C>(db: &C, offer_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    transition_active_offer(db, offer_id, DiscountStatus::Used).await?;
    info!("Discount offer {} marked used", offer_id);
    Ok(())
}

/// Marks an active offer `expired`.
///
/// # Errors
/// Returns `Error::DiscountNotActive` if the offer does not exist or is not active.
#[instrument(skip(db))]
pub async fn expire_discount<C>(db: &C, offer_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    transition_active_offer(db, offer_id, DiscountStatus::Expired).await?;
    info!("Discount offer {} expired", offer_id);
    Ok(())
}

async fn transition_active_offer<C>(db: &C, offer_id: i64, to: DiscountStatus) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = DiscountOffer::update_many()
        .col_expr(discount_offer::Column::Status, Expr::value(to.as_str()));
    if to == DiscountStatus::Used {
        update = update.col_expr(
            discount_offer::Column::UsedAt,
            Expr::value(chrono::Utc::now()),
        );
    }

    let result = update
        .filter(discount_offer::Column::Id.eq(offer_id))
        .filter(discount_offer::Column::Status.eq(DiscountStatus::Active.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::DiscountNotActive { id: offer_id });
    }
    Ok(())
}
