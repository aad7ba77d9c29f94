//! Subscription and alias registry.
//!
//! Subjects and aliases are scoped to a realm. Each realm's entries live
//! under keys prefixed with `realm\`, so two realms never see each other's
//! data:
//!
//! - Subscriptions: `realm\Subject` -> ordered list of subscribers
//! - Aliases: `realm\Alias` -> canonical subject
//!
//! # Example
//!
//! ```ignore
//! let registry = Registry::new(subscriptions, aliases, false);
//!
//! registry.define_alias("guild1", "Sunny", "Sunset Shimmer")?;
//! registry.subscribe("guild1", "@bob", "sunny")?;
//!
//! match registry.notice("guild1", "Sunset Shimmer")? {
//!     NoticeOutcome::Notice { subscribers, .. } => println!("ping {:?}", subscribers),
//!     NoticeOutcome::Unknown { subject } => println!("nobody follows {}", subject),
//! }
//! ```

mod aliases;
mod subscriptions;

pub use aliases::AliasResolver;
pub use subscriptions::Registry;
