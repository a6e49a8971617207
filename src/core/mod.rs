//! Core business logic - framework-agnostic pricing, entitlement and ledger operations.

/// Discount offer store
pub mod discount;
/// Moment quoting and finalization
pub mod moment;
/// The pure pricing and entitlement decision
pub mod pricing;
/// Referral ledger and bonus recompute
pub mod referral;
/// Single-writer task for referral completions
pub mod referral_worker;
/// User accounts, guests and credit consumption
pub mod user;
