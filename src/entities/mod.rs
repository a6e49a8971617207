//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod discount_offer;
pub mod moment;
pub mod referral;
pub mod user;

// Re-export specific types to avoid conflicts
pub use discount_offer::{
    Column as DiscountOfferColumn, Entity as DiscountOffer, Model as DiscountOfferModel,
};
pub use moment::{Column as MomentColumn, Entity as Moment, Model as MomentModel};
pub use referral::{Column as ReferralColumn, Entity as Referral, Model as ReferralModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
