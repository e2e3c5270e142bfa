pub mod core;
pub use core::*;

pub mod error;
pub use error::*;

mod config;
pub use config::{CENTRAL_NODE, Config, GLOBAL_CONFIG};

pub mod util;
pub use util::*;

pub mod store;
pub use store::*;

pub mod wallet;
pub use wallet::*;

pub mod node;
pub use node::*;

pub mod network;
pub use network::{Message, NODE_VERSION, OpType, Server, send_tx};

#[cfg(test)]
pub(crate) mod test_utils {
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(Mutex::default);

    /// Serializes tests that repoint TREE_DIR or WALLET_FILE; without this,
    /// parallel tests would open each other's stores.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
