//! In-memory node state collections. Plain containers; `NodeContext` owns
//! the single lock all of them sit behind.

use crate::core::transaction::Transaction;
use data_encoding::HEXLOWER;
use std::collections::HashMap;
use std::net::SocketAddr;

/// Pending transactions, keyed by hex transaction id. No eviction besides
/// inclusion in a block or invalidity detected at mining time.
#[derive(Default)]
pub struct MemoryPool {
    inner: HashMap<String, Transaction>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool {
            inner: HashMap::new(),
        }
    }

    pub fn contains(&self, txid_hex: &str) -> bool {
        self.inner.contains_key(txid_hex)
    }

    pub fn contains_transaction(&self, tx: &Transaction) -> bool {
        self.contains(&tx.get_tx_id_hex())
    }

    pub fn add(&mut self, tx: Transaction) {
        self.inner.insert(tx.get_tx_id_hex(), tx);
    }

    pub fn get(&self, txid_hex: &str) -> Option<Transaction> {
        self.inner.get(txid_hex).cloned()
    }

    pub fn remove(&mut self, txid_hex: &str) {
        self.inner.remove(txid_hex);
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        self.inner.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Block hashes announced by a peer and not yet downloaded.
#[derive(Default)]
pub struct BlockInTransit {
    inner: Vec<Vec<u8>>,
}

impl BlockInTransit {
    pub fn new() -> BlockInTransit {
        BlockInTransit { inner: vec![] }
    }

    pub fn add_blocks(&mut self, blocks: &[Vec<u8>]) {
        for hash in blocks {
            if !self.inner.iter().any(|h| h == hash) {
                self.inner.push(hash.clone());
            }
        }
    }

    pub fn first(&self) -> Option<Vec<u8>> {
        self.inner.first().cloned()
    }

    pub fn remove(&mut self, block_hash: &[u8]) {
        if let Some(idx) = self.inner.iter().position(|h| h.as_slice() == block_hash) {
            self.inner.remove(idx);
        }
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Peers this node will gossip with, in discovery order; the first entry is
/// the hard-coded seed.
pub struct KnownNodes {
    inner: Vec<SocketAddr>,
}

impl KnownNodes {
    pub fn new(seed: SocketAddr) -> KnownNodes {
        KnownNodes { inner: vec![seed] }
    }

    pub fn add_node(&mut self, addr: SocketAddr) {
        if !self.inner.contains(&addr) {
            self.inner.push(addr);
        }
    }

    pub fn evict_node(&mut self, addr: &SocketAddr) {
        self.inner.retain(|node| node != addr);
    }

    pub fn node_is_known(&self, addr: &SocketAddr) -> bool {
        self.inner.contains(addr)
    }

    pub fn get_nodes(&self) -> Vec<SocketAddr> {
        self.inner.clone()
    }

    pub fn first(&self) -> Option<SocketAddr> {
        self.inner.first().copied()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Hex key used by the mempool for a raw transaction id.
pub fn txid_hex(txid: &[u8]) -> String {
    HEXLOWER.encode(txid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn test_transaction() -> Transaction {
        let wallet = Wallet::new().expect("wallet creation failed");
        Transaction::new_coinbase_tx(&wallet.get_address()).expect("coinbase creation failed")
    }

    #[test]
    fn test_memory_pool_add_get_remove() {
        let mut pool = MemoryPool::new();
        assert!(pool.is_empty());

        let tx = test_transaction();
        let key = tx.get_tx_id_hex();
        pool.add(tx.clone());

        assert!(pool.contains(&key));
        assert!(pool.contains_transaction(&tx));
        assert_eq!(pool.len(), 1);
        assert_eq!(
            pool.get(&key).expect("transaction missing").get_id(),
            tx.get_id()
        );

        pool.remove(&key);
        assert!(pool.is_empty());
        assert!(pool.get(&key).is_none());
    }

    #[test]
    fn test_blocks_in_transit_order_and_dedup() {
        let mut transit = BlockInTransit::new();
        transit.add_blocks(&[vec![1], vec![2], vec![3]]);
        transit.add_blocks(&[vec![2]]);
        assert_eq!(transit.len(), 3);

        assert_eq!(transit.first(), Some(vec![1]));
        transit.remove(&[1]);
        assert_eq!(transit.first(), Some(vec![2]));

        transit.clear();
        assert!(transit.is_empty());
    }

    #[test]
    fn test_known_nodes_seed_first() {
        let seed: SocketAddr = "127.0.0.1:3000".parse().expect("address parse failed");
        let peer: SocketAddr = "127.0.0.1:3001".parse().expect("address parse failed");

        let mut nodes = KnownNodes::new(seed);
        nodes.add_node(peer);
        nodes.add_node(peer);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes.first(), Some(seed));
        assert!(nodes.node_is_known(&peer));

        nodes.evict_node(&peer);
        assert!(!nodes.node_is_known(&peer));
        assert_eq!(nodes.first(), Some(seed));
    }
}
