//! Moment business logic - quoting, finalizing and reading moments.
//!
//! This is the caller of the pricing decision. It gathers the decision's inputs from the usage
//! ledger (text moments already created), the discount store (the active offer) and the user's
//! referral credits, then applies the decision's effects: a spent credit is recorded, an
//! applied discount is marked used, and the moment row is written with its price and flags.
//! All of that happens in one transaction, so a moment is never stored without its effects.
//!
//! Collecting payment when the price is nonzero is left to the caller; the receipt says
//! whether it is needed.

use crate::{
    config::pricing::{AppConfig, PricingConfig},
    core::{
        discount::{self, ActiveDiscount},
        pricing::{
            DeliveryType, Presentation, PricingDecision, PricingInput, PricingRule,
            compute_pricing, select_rule, to_db_int,
        },
        user::{self as user_ledger, available_credits},
    },
    entities::{Moment, moment, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// Everything the wizard collected before finalizing a moment.
#[derive(Debug, Clone)]
pub struct MomentDraft {
    /// Owning user
    pub user_id: String,
    /// Who the moment is for
    pub recipient_name: String,
    /// Occasion being marked
    pub occasion: String,
    /// Relationship to the recipient
    pub relationship: String,
    /// Requested tone
    pub tone: String,
    /// Delivery format
    pub delivery: DeliveryType,
    /// Visual styling
    pub presentation: Presentation,
    /// Message body
    pub message: String,
    /// User whose shared link led here
    pub referrer_id: Option<String>,
    /// Pay with a referral credit instead of money
    pub redeem_free_credit: bool,
}

impl MomentDraft {
    fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::invalid("moment needs a user id"));
        }
        if self.recipient_name.trim().is_empty() {
            return Err(Error::invalid("recipient name cannot be empty"));
        }
        if self.message.trim().is_empty() {
            return Err(Error::invalid("message cannot be empty"));
        }
        if self
            .referrer_id
            .as_deref()
            .is_some_and(|r| r.trim().is_empty())
        {
            return Err(Error::invalid("referrer id cannot be empty"));
        }
        Ok(())
    }
}

/// A pricing decision together with the inputs it was made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentQuote {
    /// Inputs gathered from the ledgers
    pub input: PricingInput,
    /// Which pricing rule applied
    pub rule: PricingRule,
    /// The decision itself
    pub decision: PricingDecision,
    /// Offer that finalizing would mark used
    pub discount_offer_id: Option<i64>,
}

/// A finalized moment and what the caller still has to do with it.
#[derive(Debug, Clone)]
pub struct MomentReceipt {
    /// The stored moment
    pub moment: moment::Model,
    /// The pricing decision it was created with
    pub pricing: PricingDecision,
    /// Link the sender can share with the recipient
    pub share_url: String,
}

impl MomentReceipt {
    /// Payment must be collected for this moment.
    #[must_use]
    pub const fn requires_payment(&self) -> bool {
        self.pricing.requires_payment()
    }
}

/// Counts the text moments a user has already created.
pub async fn count_text_moments<C>(db: &C, user_id: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    Moment::find()
        .filter(moment::Column::UserId.eq(user_id))
        .filter(moment::Column::DeliveryType.eq(DeliveryType::Text.as_str()))
        .count(db)
        .await
        .map_err(Into::into)
}

async fn build_quote<C>(
    db: &C,
    rules: &PricingConfig,
    user: &user::Model,
    delivery: DeliveryType,
    redeem_free_credit: bool,
) -> Result<MomentQuote>
where
    C: ConnectionTrait,
{
    let active_discount = discount::get_active_discount_price(db, &user.id).await?;
    let input = PricingInput {
        delivery,
        free_text_moments_used: count_text_moments(db, &user.id).await?,
        active_discount_price: active_discount.map(|d| d.price),
        free_premium_credits_available: available_credits(user)?,
        redeem_free_credit,
    };

    let rule = select_rule(&input, rules);
    let decision = compute_pricing(&input, rules);
    let discount_offer_id = match (rule, active_discount) {
        (PricingRule::Paid, Some(ActiveDiscount { offer_id, .. })) => Some(offer_id),
        _ => None,
    };

    debug!(
        "Quoted {} for user {}: {:?} via {:?}",
        delivery, user.id, decision, rule
    );
    Ok(MomentQuote {
        input,
        rule,
        decision,
        discount_offer_id,
    })
}

/// Prices a moment without creating it. Nothing is written.
///
/// # Errors
/// Returns `Error::UserNotFound` if the user does not exist.
#[instrument(skip(db, rules))]
pub async fn quote_moment(
    db: &DatabaseConnection,
    rules: &PricingConfig,
    user_id: &str,
    delivery: DeliveryType,
    redeem_free_credit: bool,
) -> Result<MomentQuote> {
    let user = user_ledger::require_user(db, user_id).await?;
    build_quote(db, rules, &user, delivery, redeem_free_credit).await
}

/// Finalizes a moment: prices it, records its effects and stores it.
///
/// # Errors
/// Returns:
/// - `Error::InvalidArgument` if the draft is missing a recipient name or message
/// - `Error::UserNotFound` if the owning user does not exist
/// - `Error::NoCreditAvailable` if the credit was spent by a concurrent redemption
/// - `Error::DiscountNotActive` if the offer was used or expired concurrently
#[instrument(skip(db, config, draft), fields(user_id = %draft.user_id, delivery = %draft.delivery))]
pub async fn create_moment(
    db: &DatabaseConnection,
    config: &AppConfig,
    draft: MomentDraft,
) -> Result<MomentReceipt> {
    draft.validate()?;

    let txn = db.begin().await?;

    let user = user_ledger::require_user(&txn, &draft.user_id).await?;
    let quote = build_quote(
        &txn,
        &config.pricing,
        &user,
        draft.delivery,
        draft.redeem_free_credit,
    )
    .await?;
    let pricing = quote.decision;

    if pricing.consumed_free_credit {
        user_ledger::consume_free_credit(&txn, &user.id).await?;
    }
    if let Some(offer_id) = quote.discount_offer_id {
        discount::mark_discount_used(&txn, offer_id).await?;
    }

    let moment = moment::ActiveModel {
        user_id: Set(user.id.clone()),
        recipient_name: Set(draft.recipient_name.trim().to_string()),
        occasion: Set(draft.occasion),
        relationship: Set(draft.relationship),
        tone: Set(draft.tone),
        delivery_type: Set(draft.delivery.as_str().to_string()),
        presentation: Set(draft.presentation.as_str().to_string()),
        message: Set(draft.message),
        media_url: Set(None),
        is_premium: Set(pricing.is_premium),
        price_charged: Set(to_db_int("price", pricing.price)?),
        has_watermark: Set(pricing.has_watermark),
        consumed_free_credit: Set(pricing.consumed_free_credit),
        discount_offer_id: Set(quote.discount_offer_id),
        referrer_id: Set(draft.referrer_id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        "Created moment {} for user {}: price={}, premium={}, watermark={}, credit={}",
        moment.id,
        moment.user_id,
        pricing.price,
        pricing.is_premium,
        pricing.has_watermark,
        pricing.consumed_free_credit
    );

    let share_url = share_url(&config.share_base_url, moment.id);
    Ok(MomentReceipt {
        moment,
        pricing,
        share_url,
    })
}

/// Builds the shareable link for a moment.
#[must_use]
pub fn share_url(base_url: &str, moment_id: i64) -> String {
    format!("{}/{moment_id}", base_url.trim_end_matches('/'))
}

/// Attaches the rendered media location to a moment. Pricing columns are left untouched.
///
/// # Errors
/// Returns `Error::InvalidArgument` for an empty URL and `Error::MomentNotFound` if the
/// moment does not exist.
#[instrument(skip(db))]
pub async fn attach_media_url(
    db: &DatabaseConnection,
    moment_id: i64,
    media_url: &str,
) -> Result<moment::Model> {
    let media_url = media_url.trim();
    if media_url.is_empty() {
        return Err(Error::invalid("media url cannot be empty"));
    }

    let mut active: moment::ActiveModel = get_moment_by_id(db, moment_id)
        .await?
        .ok_or(Error::MomentNotFound { id: moment_id })?
        .into();
    active.media_url = Set(Some(media_url.to_string()));

    let updated = active.update(db).await?;
    info!("Attached media to moment {}", moment_id);
    Ok(updated)
}

/// Retrieves a moment by its unique ID.
pub async fn get_moment_by_id(
    db: &DatabaseConnection,
    moment_id: i64,
) -> Result<Option<moment::Model>> {
    Moment::find_by_id(moment_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a user's moments, newest first.
pub async fn get_moments_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<moment::Model>> {
    Moment::find()
        .filter(moment::Column::UserId.eq(user_id))
        .order_by_desc(moment::Column::CreatedAt)
        .order_by_desc(moment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::discount::{DiscountKind, create_discount_offer, get_active_discount};
    use crate::core::user::require_user;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_moment_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let config = AppConfig::default();

        let mut draft = test_draft("amani", DeliveryType::Text);
        draft.recipient_name = "  ".to_string();
        let result = create_moment(&db, &config, draft).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidArgument { message: _ }
        ));

        let mut draft = test_draft("amani", DeliveryType::Text);
        draft.message = String::new();
        let result = create_moment(&db, &config, draft).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidArgument { message: _ }
        ));

        let mut draft = test_draft("amani", DeliveryType::Text);
        draft.referrer_id = Some(String::new());
        let result = create_moment(&db, &config, draft).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidArgument { message: _ }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_moment_unknown_user() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_moment(
            &db,
            &AppConfig::default(),
            test_draft("ghost", DeliveryType::Text),
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::UserNotFound { id: _ }));

        Ok(())
    }

    #[tokio::test]
    async fn test_free_text_moment_within_quota() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;
        create_text_moments(&db, &config, "amani", 4).await?;

        let receipt = create_moment(&db, &config, test_draft("amani", DeliveryType::Text)).await?;
        assert_eq!(
            receipt.pricing,
            PricingDecision {
                price: 0,
                is_premium: false,
                has_watermark: true,
                consumed_free_credit: false,
            }
        );
        assert!(!receipt.requires_payment());

        let moment = receipt.moment;
        assert_eq!(moment.price_charged, 0);
        assert!(moment.has_watermark);
        assert!(!moment.is_premium);
        assert!(!moment.consumed_free_credit);
        assert_eq!(moment.delivery_type, "text");
        assert_eq!(moment.presentation, "plain");
        assert!(moment.media_url.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_text_after_quota_requires_payment() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;

        let receipts = create_text_moments(&db, &config, "amani", 10).await?;
        assert!(receipts.iter().all(|r| r.pricing.price == 0 && r.pricing.has_watermark));
        assert_eq!(count_text_moments(&db, "amani").await?, 10);

        let receipt = create_moment(&db, &config, test_draft("amani", DeliveryType::Text)).await?;
        assert_eq!(receipt.pricing.price, 130);
        assert!(receipt.pricing.is_premium);
        assert!(!receipt.pricing.has_watermark);
        assert!(receipt.requires_payment());
        assert_eq!(receipt.moment.price_charged, 130);

        Ok(())
    }

    #[tokio::test]
    async fn test_discount_applied_once_after_quota() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;
        create_text_moments(&db, &config, "amani", 12).await?;
        let offer = create_discount_offer(&db, "amani", 50, DiscountKind::StandardDrop).await?;

        let receipt = create_moment(&db, &config, test_draft("amani", DeliveryType::Text)).await?;
        assert_eq!(
            receipt.pricing,
            PricingDecision {
                price: 50,
                is_premium: true,
                has_watermark: false,
                consumed_free_credit: false,
            }
        );
        assert_eq!(receipt.moment.discount_offer_id, Some(offer.id));
        assert!(get_active_discount(&db, "amani").await?.is_none());

        // The offer is spent; the next moment pays the base price.
        let receipt = create_moment(&db, &config, test_draft("amani", DeliveryType::Text)).await?;
        assert_eq!(receipt.pricing.price, 130);
        assert_eq!(receipt.moment.discount_offer_id, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_free_tier_leaves_discount_active() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;
        let offer = create_discount_offer(&db, "amani", 50, DiscountKind::StandardDrop).await?;

        let receipt = create_moment(&db, &config, test_draft("amani", DeliveryType::Text)).await?;
        assert_eq!(receipt.pricing.price, 0);
        assert_eq!(receipt.moment.discount_offer_id, None);
        assert_eq!(get_active_discount(&db, "amani").await?.unwrap().id, offer.id);

        // A premium format then uses it.
        let receipt =
            create_moment(&db, &config, test_draft("amani", DeliveryType::UserVoice)).await?;
        assert_eq!(receipt.pricing.price, 50);
        assert_eq!(receipt.moment.discount_offer_id, Some(offer.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_credit_redemption_consumes_credit() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;
        complete_n_referrals(&db, &config.pricing, "amani", 3).await?;

        let mut draft = test_draft("amani", DeliveryType::KidVideo);
        draft.redeem_free_credit = true;
        let receipt = create_moment(&db, &config, draft.clone()).await?;
        assert_eq!(
            receipt.pricing,
            PricingDecision {
                price: 0,
                is_premium: true,
                has_watermark: false,
                consumed_free_credit: true,
            }
        );
        assert!(receipt.moment.consumed_free_credit);

        let user = require_user(&db, "amani").await?;
        assert_eq!(user.consumed_premium_credits, 1);
        assert_eq!(user.free_premium_credits, 1);

        // No credits left: the redemption request is ignored and the moment is charged.
        let receipt = create_moment(&db, &config, draft).await?;
        assert_eq!(receipt.pricing.price, 130);
        assert!(!receipt.pricing.consumed_free_credit);
        let user = require_user(&db, "amani").await?;
        assert_eq!(user.consumed_premium_credits, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_credit_redemption_keeps_discount() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;
        complete_n_referrals(&db, &config.pricing, "amani", 3).await?;
        let offer = create_discount_offer(&db, "amani", 40, DiscountKind::ReceiverDrop).await?;

        let mut draft = test_draft("amani", DeliveryType::UserVideo);
        draft.redeem_free_credit = true;
        let receipt = create_moment(&db, &config, draft).await?;
        assert!(receipt.pricing.consumed_free_credit);
        assert_eq!(get_active_discount(&db, "amani").await?.unwrap().id, offer.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_quote_has_no_side_effects() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;
        complete_n_referrals(&db, &config.pricing, "amani", 3).await?;
        create_discount_offer(&db, "amani", 50, DiscountKind::StandardDrop).await?;

        let first = quote_moment(&db, &config.pricing, "amani", DeliveryType::KidVoice, true).await?;
        let second =
            quote_moment(&db, &config.pricing, "amani", DeliveryType::KidVoice, true).await?;
        assert_eq!(first, second);
        assert_eq!(first.rule, PricingRule::CreditRedemption);
        assert_eq!(first.input.free_premium_credits_available, 1);
        assert_eq!(first.input.active_discount_price, Some(50));
        assert_eq!(first.discount_offer_id, None);

        let paid = quote_moment(&db, &config.pricing, "amani", DeliveryType::KidVoice, false).await?;
        assert_eq!(paid.decision.price, 50);
        assert!(paid.discount_offer_id.is_some());

        let user = require_user(&db, "amani").await?;
        assert_eq!(user.consumed_premium_credits, 0);
        assert!(get_active_discount(&db, "amani").await?.is_some());
        assert!(get_moments_for_user(&db, "amani").await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_premium_formats_do_not_count_towards_quota() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;

        for delivery in [DeliveryType::UserVoice, DeliveryType::KidVideo] {
            create_moment(&db, &config, test_draft("amani", delivery)).await?;
        }
        let mut still = test_draft("amani", DeliveryType::Text);
        still.presentation = Presentation::Gif;
        let receipt = create_moment(&db, &config, still).await?;

        assert_eq!(receipt.pricing.price, 0);
        assert_eq!(receipt.moment.presentation, "gif");
        assert_eq!(count_text_moments(&db, "amani").await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_guest_moment_and_referrer() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;
        let guest = crate::core::user::create_guest_user(&db, None).await?;

        let mut draft = test_draft(&guest.id, DeliveryType::Text);
        draft.referrer_id = Some("amani".to_string());
        let receipt = create_moment(&db, &config, draft).await?;

        assert_eq!(receipt.moment.user_id, guest.id);
        assert_eq!(receipt.moment.referrer_id.as_deref(), Some("amani"));
        assert_eq!(
            receipt.share_url,
            format!("https://rania.app/m/{}", receipt.moment.id)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_attach_media_url() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;
        let receipt =
            create_moment(&db, &config, test_draft("amani", DeliveryType::UserVideo)).await?;

        let updated =
            attach_media_url(&db, receipt.moment.id, "https://cdn.test/v/1.mp4").await?;
        assert_eq!(updated.media_url.as_deref(), Some("https://cdn.test/v/1.mp4"));
        assert_eq!(updated.price_charged, receipt.moment.price_charged);
        assert_eq!(updated.is_premium, receipt.moment.is_premium);
        assert_eq!(updated.has_watermark, receipt.moment.has_watermark);

        assert!(matches!(
            attach_media_url(&db, receipt.moment.id, " ").await.unwrap_err(),
            Error::InvalidArgument { message: _ }
        ));
        assert!(matches!(
            attach_media_url(&db, 999, "https://cdn.test/x").await.unwrap_err(),
            Error::MomentNotFound { id: 999 }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_get_moments_for_user_newest_first() -> Result<()> {
        let db = setup_test_db().await?;
        let config = AppConfig::default();
        create_test_user(&db, "amani").await?;
        create_test_user(&db, "baraka").await?;

        let first = create_moment(&db, &config, test_draft("amani", DeliveryType::Text)).await?;
        let second =
            create_moment(&db, &config, test_draft("amani", DeliveryType::KidVoice)).await?;
        create_moment(&db, &config, test_draft("baraka", DeliveryType::Text)).await?;

        let moments = get_moments_for_user(&db, "amani").await?;
        assert_eq!(moments.len(), 2);
        assert_eq!(moments[0], second.moment);
        assert_eq!(moments[1], first.moment);

        assert_eq!(
            get_moment_by_id(&db, first.moment.id).await?,
            Some(first.moment)
        );

        Ok(())
    }

    #[test]
    fn test_share_url_trims_trailing_slash() {
        assert_eq!(share_url("https://rania.app/m/", 7), "https://rania.app/m/7");
        assert_eq!(share_url("https://rania.app/m", 7), "https://rania.app/m/7");
    }
}
