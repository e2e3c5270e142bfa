//! Process-wide node configuration.
//!
//! Everything is derived from `NODE_ID`: the TCP bind address, the sled
//! directory and the wallet file. The environment is read at call time so
//! each test can point a fresh instance at its own directory.

use once_cell::sync::Lazy;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_NODE_ID: &str = "3000";
const DEFAULT_CENTRAL_NODE: &str = "127.0.0.1:3000";

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

/// The bootstrap peer every node knows about. Nodes bound elsewhere treat it
/// as the seed; the node bound to it floods transactions to the others.
pub static CENTRAL_NODE: Lazy<SocketAddr> = Lazy::new(|| {
    env::var("CENTRAL_NODE")
        .unwrap_or_else(|_| DEFAULT_CENTRAL_NODE.to_string())
        .parse()
        .expect("CENTRAL_NODE is not a valid socket address")
});

pub struct Config;

impl Config {
    fn new() -> Config {
        Config
    }

    pub fn get_node_id(&self) -> String {
        env::var("NODE_ID").unwrap_or_else(|_| DEFAULT_NODE_ID.to_string())
    }

    pub fn get_node_addr(&self) -> SocketAddr {
        format!("127.0.0.1:{}", self.get_node_id())
            .parse()
            .expect("NODE_ID is not a valid port")
    }

    /// Directory of the per-node sled database. `TREE_DIR` overrides the
    /// `data_<NODE_ID>` default.
    pub fn get_db_path(&self) -> PathBuf {
        match env::var("TREE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => PathBuf::from(format!("data_{}", self.get_node_id())),
        }
    }

    /// Path of the per-node wallet file. `WALLET_FILE` overrides the
    /// `wallet_<NODE_ID>.dat` default.
    pub fn get_wallet_file(&self) -> PathBuf {
        match env::var("WALLET_FILE") {
            Ok(file) => PathBuf::from(file),
            Err(_) => PathBuf::from(format!("wallet_{}.dat", self.get_node_id())),
        }
    }
}
