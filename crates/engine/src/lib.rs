//! lotreg engine: the sequence allocator and the revision engine.
//!
//! Both components are generic over a [`lotreg_storage::DocumentStore`] and
//! rely on its compare-and-swap `put` for all coordination; neither holds
//! an in-process lock. Neither reads the clock: every time-dependent call
//! takes the current time from its caller.

pub mod allocator;
pub mod config;
pub mod load;
pub mod merge;
pub mod save;
pub mod view;

pub use allocator::{AllocateError, RetryPolicy, SequenceAllocator};
pub use config::{AllocatorConfig, ConfigError, EngineConfig, StoreConfig};
pub use load::{load_lot, LoadError};
pub use merge::apply_data_patch;
pub use save::{sync_status_dates, RevisionEngine, SaveOutcome, SaveReceipt};
pub use view::listing_view;
