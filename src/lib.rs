//! Content-voting ledger.
//!
//! Posts are registered once, every voter holds at most one funny/not-funny
//! vote per post, and votes can be flipped but never retracted. Tallies are
//! maintained incrementally per post and globally. The owner can pause all
//! content mutations; reads stay available.
//!
//! * [`posts`] — the post registry.
//! * [`votes`] — vote records, tallies and the per-voter index.
//! * [`access`] — owner identity and the pause switch.
//! * [`query`] — read-only projections.
//! * [`events`] — notifications emitted by committed operations.
//! * [`ledger`] — the sequential authority tying the above together, plus
//!   snapshots and the state root.
//!
//! [`store`], [`submission`], [`config`] and [`logging`] belong to the host
//! side and are what the `meme-court` binary is built from.

pub mod access;
pub mod config;
pub mod events;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod posts;
pub mod query;
pub mod store;
pub mod submission;
pub mod votes;

mod error;

pub use error::{ErrorKind, LedgerError, SnapshotError};
pub use events::LedgerEvent;
pub use identity::{Address, PostId, Timestamp};
pub use ledger::{CallContext, LedgerSnapshot, LedgerState, Operation};
pub use query::{PostStats, VoteView};
