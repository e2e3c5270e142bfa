//! Central coordination value for a running node.
//!
//! The mempool, the blocks-in-transit list and the known-peer list are the
//! only cross-connection state besides the chain store. They live behind a
//! single guard inside `NodeContext`, which the server clones into every
//! connection handler. The guard is never held across an await.

use crate::config::CENTRAL_NODE;
use crate::core::transaction::Transaction;
use crate::node::memory_pool::{BlockInTransit, KnownNodes, MemoryPool};
use crate::store::Blockchain;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

struct NodeInner {
    mempool: MemoryPool,
    blocks_in_transit: BlockInTransit,
    known_nodes: KnownNodes,
}

#[derive(Clone)]
pub struct NodeContext {
    blockchain: Blockchain,
    node_addr: SocketAddr,
    mining_addr: Option<String>,
    inner: Arc<RwLock<NodeInner>>,
}

impl NodeContext {
    pub fn new(
        blockchain: Blockchain,
        node_addr: SocketAddr,
        mining_addr: Option<String>,
    ) -> NodeContext {
        NodeContext {
            blockchain,
            node_addr,
            mining_addr,
            inner: Arc::new(RwLock::new(NodeInner {
                mempool: MemoryPool::new(),
                blocks_in_transit: BlockInTransit::new(),
                known_nodes: KnownNodes::new(*CENTRAL_NODE),
            })),
        }
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn node_addr(&self) -> SocketAddr {
        self.node_addr
    }

    pub fn mining_addr(&self) -> Option<&str> {
        self.mining_addr.as_deref()
    }

    pub fn is_miner(&self) -> bool {
        self.mining_addr.is_some()
    }

    /// Whether this node is the bootstrap peer every wallet pushes
    /// transactions to.
    pub fn is_seed_node(&self) -> bool {
        let inner = self.inner.read().unwrap();
        inner.known_nodes.first() == Some(self.node_addr)
    }

    //=========================================================================
    // Mempool
    //=========================================================================

    pub fn mempool_add(&self, tx: Transaction) {
        self.inner.write().unwrap().mempool.add(tx);
    }

    pub fn mempool_contains(&self, txid_hex: &str) -> bool {
        self.inner.read().unwrap().mempool.contains(txid_hex)
    }

    pub fn mempool_contains_transaction(&self, tx: &Transaction) -> bool {
        self.inner
            .read()
            .unwrap()
            .mempool
            .contains_transaction(tx)
    }

    pub fn mempool_get(&self, txid_hex: &str) -> Option<Transaction> {
        self.inner.read().unwrap().mempool.get(txid_hex)
    }

    pub fn mempool_remove(&self, txid_hex: &str) {
        self.inner.write().unwrap().mempool.remove(txid_hex);
    }

    pub fn mempool_transactions(&self) -> Vec<Transaction> {
        self.inner.read().unwrap().mempool.get_all()
    }

    pub fn mempool_len(&self) -> usize {
        self.inner.read().unwrap().mempool.len()
    }

    //=========================================================================
    // Blocks in transit
    //=========================================================================

    pub fn transit_add_blocks(&self, blocks: &[Vec<u8>]) {
        self.inner
            .write()
            .unwrap()
            .blocks_in_transit
            .add_blocks(blocks);
    }

    pub fn transit_first(&self) -> Option<Vec<u8>> {
        self.inner.read().unwrap().blocks_in_transit.first()
    }

    pub fn transit_remove(&self, block_hash: &[u8]) {
        self.inner
            .write()
            .unwrap()
            .blocks_in_transit
            .remove(block_hash);
    }

    pub fn transit_is_empty(&self) -> bool {
        self.inner.read().unwrap().blocks_in_transit.is_empty()
    }

    //=========================================================================
    // Known peers
    //=========================================================================

    pub fn add_peer(&self, addr: SocketAddr) {
        self.inner.write().unwrap().known_nodes.add_node(addr);
    }

    pub fn add_peers(&self, addrs: &[SocketAddr]) {
        let mut inner = self.inner.write().unwrap();
        for addr in addrs {
            inner.known_nodes.add_node(*addr);
        }
    }

    pub fn evict_peer(&self, addr: &SocketAddr) {
        self.inner.write().unwrap().known_nodes.evict_node(addr);
    }

    pub fn peer_is_known(&self, addr: &SocketAddr) -> bool {
        self.inner.read().unwrap().known_nodes.node_is_known(addr)
    }

    pub fn peers(&self) -> Vec<SocketAddr> {
        self.inner.read().unwrap().known_nodes.get_nodes()
    }

    /// Gossip targets: every known peer except this node itself.
    pub fn other_peers(&self) -> Vec<SocketAddr> {
        self.peers()
            .into_iter()
            .filter(|addr| *addr != self.node_addr)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    async fn test_context(node_addr: &str) -> (NodeContext, tempfile::TempDir) {
        let _env = crate::test_utils::lock_env();
        let dir = tempfile::tempdir().expect("temp dir creation failed");
        unsafe {
            std::env::set_var("TREE_DIR", dir.path());
        }
        let wallet = Wallet::new().expect("wallet creation failed");
        let blockchain = Blockchain::create_blockchain(&wallet.get_address())
            .await
            .expect("blockchain creation failed");
        let ctx = NodeContext::new(
            blockchain,
            node_addr.parse().expect("address parse failed"),
            None,
        );
        (ctx, dir)
    }

    #[tokio::test]
    async fn test_seed_detection() {
        let (seed_ctx, _dir) = test_context("127.0.0.1:3000").await;
        assert!(seed_ctx.is_seed_node());

        let (other_ctx, _dir2) = test_context("127.0.0.1:3001").await;
        assert!(!other_ctx.is_seed_node());
    }

    #[tokio::test]
    async fn test_other_peers_excludes_self() {
        let (ctx, _dir) = test_context("127.0.0.1:3000").await;
        ctx.add_peer("127.0.0.1:3001".parse().expect("address parse failed"));
        ctx.add_peer("127.0.0.1:3002".parse().expect("address parse failed"));

        let others = ctx.other_peers();
        assert_eq!(others.len(), 2);
        assert!(!others.contains(&ctx.node_addr()));
    }

    #[tokio::test]
    async fn test_mempool_and_transit_through_context() {
        let (ctx, _dir) = test_context("127.0.0.1:3001").await;

        let wallet = Wallet::new().expect("wallet creation failed");
        let tx =
            Transaction::new_coinbase_tx(&wallet.get_address()).expect("coinbase creation failed");
        let key = tx.get_tx_id_hex();

        ctx.mempool_add(tx.clone());
        assert!(ctx.mempool_contains(&key));
        assert!(ctx.mempool_contains_transaction(&tx));
        assert_eq!(ctx.mempool_len(), 1);
        ctx.mempool_remove(&key);
        assert_eq!(ctx.mempool_len(), 0);

        ctx.transit_add_blocks(&[vec![1], vec![2]]);
        assert_eq!(ctx.transit_first(), Some(vec![1]));
        ctx.transit_remove(&[1]);
        assert_eq!(ctx.transit_first(), Some(vec![2]));
        ctx.transit_remove(&[2]);
        assert!(ctx.transit_is_empty());
    }
}
