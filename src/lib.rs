//! # Notice Registry
//!
//! A realm-scoped subscription registry. Actors subscribe to named subjects;
//! a notice on a subject yields the actors to ping.
//!
//! ## Core Concepts
//!
//! - **Realms**: Independent namespaces; nothing leaks between them
//! - **Subjects**: Case-normalized names that carry subscriber lists
//! - **Aliases**: Alternate names that resolve to one canonical subject
//! - **Cooldowns**: Per-realm throttling of expensive scans, owners exempt
//! - **Sync**: Periodic write-back and reload of both tables
//!
//! ## Example
//!
//! ```ignore
//! use notice_registry::{NoticeBoard, NoticeOutcome, RegistryConfig};
//!
//! let board = NoticeBoard::open(RegistryConfig::in_dir("./data"))?;
//!
//! board.subscribe("guild1", "@bob", "sunset shimmer")?;
//!
//! if let NoticeOutcome::Notice { subscribers, .. } = board.notice("guild1", "Sunset Shimmer")? {
//!     println!("ping {:?}", subscribers);
//! }
//!
//! board.shutdown()?;
//! ```

pub mod admission;
pub mod board;
pub mod config;
pub mod error;
pub mod keys;
pub mod registry;
pub mod sync;
pub mod table;
pub mod types;

// Re-exports
pub use admission::{AdmissionController, OwnerCheck, StaticOwners};
pub use board::NoticeBoard;
pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use registry::{AliasResolver, Registry};
pub use sync::{SyncDaemon, SyncHandle, TickOutcome};
pub use table::Table;
pub use types::*;
