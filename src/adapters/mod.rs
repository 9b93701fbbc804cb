//! Concrete implementations of the ports in [`crate::ports`].
//!
//! Each backend concern has a hosted (REST) adapter and a local stand-in so
//! the engine runs the same way online and offline.

pub mod identity;
pub mod memory_store;
pub mod qr_storage;
pub mod rest_store;
pub mod rewards;

pub use identity::{LocalIdentityProvider, RestIdentityProvider};
pub use memory_store::MemoryStore;
pub use qr_storage::{InlineQrStorage, RestQrStorage};
pub use rest_store::RestStore;
pub use rewards::{LocalRewardLedger, NoopRewardLedger, REWARD_PER_COMPLETION};
