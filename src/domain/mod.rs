pub mod profile;
pub mod settlement;
pub mod transaction;

pub use profile::{format_name, UserProfile, Wallet};
pub use settlement::{calculate, Settlement};
pub use transaction::{ActorId, Party, SupportPercentage, Transaction, TxStatus, GUEST_ACTOR_ID};
