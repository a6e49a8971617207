//! Pricing and entitlement decision.
//!
//! [`compute_pricing`] turns a requested delivery format and the user's entitlement state
//! into the price to charge, the premium and watermark flags, and whether a referral credit
//! is spent. It is a pure function: it reads nothing, writes nothing and can be called from
//! any number of tasks at once. Gathering the inputs and applying the effects belong to
//! [`crate::core::moment`].
//!
//! Callers outside the crate that hold raw values (strings and signed integers) go through
//! [`PricingInput::from_raw`], which rejects invalid values instead of clamping them. Inside
//! the crate, [`crate::core::moment`] builds the input from already validated ledger values.

use crate::{
    config::pricing::PricingConfig,
    errors::{Error, Result},
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How a moment is delivered to its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    /// Plain text message
    Text,
    /// Voice note recorded or synthesized in the sender's voice
    UserVoice,
    /// Video featuring the sender
    UserVideo,
    /// Voice note in a child's voice
    KidVoice,
    /// Video featuring a child
    KidVideo,
}

impl DeliveryType {
    /// Every delivery format, in display order.
    pub const ALL: [Self; 5] = [
        Self::Text,
        Self::UserVoice,
        Self::UserVideo,
        Self::KidVoice,
        Self::KidVideo,
    ];

    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::UserVoice => "user_voice",
            Self::UserVideo => "user_video",
            Self::KidVoice => "kid_voice",
            Self::KidVideo => "kid_video",
        }
    }

    /// Voice and video formats are premium whatever they end up costing.
    #[must_use]
    pub const fn is_inherently_premium(self) -> bool {
        match self {
            Self::Text => false,
            Self::UserVoice | Self::UserVideo | Self::KidVoice | Self::KidVideo => true,
        }
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| Error::invalid(format!("unknown delivery type '{s}'")))
    }
}

/// Visual styling of a moment. Recorded on the moment; never changes its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presentation {
    /// No visual card
    #[default]
    Plain,
    /// Text composited onto a still template image
    Still,
    /// Animated GIF card
    Gif,
}

impl Presentation {
    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Still => "still",
            Self::Gif => "gif",
        }
    }
}

impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Presentation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(Self::Plain),
            "still" => Ok(Self::Still),
            "gif" => Ok(Self::Gif),
            other => Err(Error::invalid(format!("unknown presentation '{other}'"))),
        }
    }
}

/// Validated inputs to [`compute_pricing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingInput {
    /// Requested delivery format
    pub delivery: DeliveryType,
    /// Text moments the user has already created
    pub free_text_moments_used: u64,
    /// Price of the user's active discount offer, if any
    pub active_discount_price: Option<u64>,
    /// Referral credits the user can still spend
    pub free_premium_credits_available: u64,
    /// Whether the user asked to pay with a referral credit
    pub redeem_free_credit: bool,
}

impl PricingInput {
    /// Validates raw caller values.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for an unknown delivery type, a negative count or a
    /// negative discount price. Values are never clamped.
    pub fn from_raw(
        delivery: &str,
        free_text_moments_used: i64,
        active_discount_price: Option<i64>,
        free_premium_credits_available: i64,
        redeem_free_credit: bool,
    ) -> Result<Self> {
        Ok(Self {
            delivery: delivery.parse()?,
            free_text_moments_used: non_negative("free text moments used", free_text_moments_used)?,
            active_discount_price: active_discount_price
                .map(|price| non_negative("discount price", price))
                .transpose()?,
            free_premium_credits_available: non_negative(
                "free premium credits",
                free_premium_credits_available,
            )?,
            redeem_free_credit,
        })
    }
}

/// Outcome of the pricing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricingDecision {
    /// Amount to charge in whole shillings
    pub price: u64,
    /// Whether the moment is premium
    pub is_premium: bool,
    /// Whether the output carries the free-tier watermark
    pub has_watermark: bool,
    /// Whether one referral credit pays for the moment
    pub consumed_free_credit: bool,
}

impl PricingDecision {
    const FREE_TIER: Self = Self {
        price: 0,
        is_premium: false,
        has_watermark: true,
        consumed_free_credit: false,
    };

    const CREDIT_REDEMPTION: Self = Self {
        price: 0,
        is_premium: true,
        has_watermark: false,
        consumed_free_credit: true,
    };

    /// The caller must collect payment before finalizing.
    #[must_use]
    pub const fn requires_payment(&self) -> bool {
        self.price > 0
    }
}

/// Which branch of the pricing decision applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingRule {
    /// Text within the free quota
    FreeTier,
    /// Paid for with a referral credit
    CreditRedemption,
    /// Discount price or base price
    Paid,
}

/// Selects the pricing rule. Rules are evaluated in order and the first match wins:
///
/// 1. Text within the free quota, with no credit redemption requested.
/// 2. Credit redemption requested and a credit is available.
/// 3. Everything else.
#[must_use]
pub fn select_rule(input: &PricingInput, rules: &PricingConfig) -> PricingRule {
    if input.delivery == DeliveryType::Text
        && input.free_text_moments_used < rules.free_text_quota
        && !input.redeem_free_credit
    {
        return PricingRule::FreeTier;
    }

    if input.redeem_free_credit && input.free_premium_credits_available > 0 {
        return PricingRule::CreditRedemption;
    }

    PricingRule::Paid
}

/// Decides price and entitlements.
///
/// The free tier is free and watermarked. A credit redemption is free, premium and
/// unwatermarked. The paid path charges the discount price if one is active, else the base
/// price; it is premium when the format is voice/video or the price is nonzero, and
/// watermarked exactly when the price is 0.
#[must_use]
pub fn compute_pricing(input: &PricingInput, rules: &PricingConfig) -> PricingDecision {
    match select_rule(input, rules) {
        PricingRule::FreeTier => PricingDecision::FREE_TIER,
        PricingRule::CreditRedemption => PricingDecision::CREDIT_REDEMPTION,
        PricingRule::Paid => {
            let price = input.active_discount_price.unwrap_or(rules.base_price);
            PricingDecision {
                price,
                is_premium: input.delivery.is_inherently_premium() || price > 0,
                has_watermark: price == 0,
                consumed_free_credit: false,
            }
        }
    }
}

/// Earned referral credits for a number of completed referrals.
///
/// A zero threshold never earns anything; [`PricingConfig::validate`] rejects it upfront.
#[must_use]
pub const fn earned_credits(completed_referrals: u64, rules: &PricingConfig) -> u64 {
    match completed_referrals.checked_div(rules.referrals_per_credit) {
        Some(credits) => credits,
        None => 0,
    }
}

/// Converts a signed count or price into `u64`, rejecting negatives.
pub(crate) fn non_negative(field: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::invalid(format!("{field} cannot be negative: {value}")))
}

/// Converts an unsigned value back into a database integer.
pub(crate) fn to_db_int(field: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::invalid(format!("{field} is out of range: {value}")))
}
