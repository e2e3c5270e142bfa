pub mod context;
pub mod memory_pool;
pub mod miner;

pub use context::NodeContext;
pub use memory_pool::{BlockInTransit, KnownNodes, MemoryPool};
pub use miner::{TRANSACTION_THRESHOLD, mine_pending_transactions, should_trigger_mining};
