//! sled-backed chain store.
//!
//! Blocks live in the `blocks` tree keyed by hash; the distinguished key
//! `"l"` points at the best tip. The tip only advances for a block of
//! greater height, and block writes are idempotent.

use crate::config::GLOBAL_CONFIG;
use crate::core::block::Block;
use crate::core::transaction::{TXOutputs, Transaction};
use crate::error::{CoinError, Result};
use sled::transaction::{TransactionResult, UnabortableTransactionError};
use sled::{Db, IVec, Tree};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock as TokioRwLock;
use tracing::info;

const TIP_BLOCK_HASH_KEY: &str = "l";
const BLOCKS_TREE: &str = "blocks";

#[derive(Clone)]
pub struct Blockchain {
    tip_hash: Arc<TokioRwLock<Vec<u8>>>,
    db: Db,
}

impl Blockchain {
    /// Creates a fresh chain: mines the genesis block paying the subsidy to
    /// `genesis_address`. Fails if a chain already exists in this node's
    /// data directory.
    pub async fn create_blockchain(genesis_address: &str) -> Result<Blockchain> {
        let path = GLOBAL_CONFIG.get_db_path();
        let db = sled::open(&path)?;
        let blocks_tree = db.open_tree(BLOCKS_TREE)?;

        if blocks_tree.get(TIP_BLOCK_HASH_KEY)?.is_some() {
            return Err(CoinError::BlockchainAlreadyExists(
                path.display().to_string(),
            ));
        }

        let coinbase_tx = Transaction::new_coinbase_tx(genesis_address)?;
        let genesis = Block::generate_genesis_block(&coinbase_tx)?;
        Self::update_blocks_tree(&blocks_tree, &genesis)?;
        info!("Genesis block {} created", genesis.get_hash_hex());

        Ok(Blockchain {
            tip_hash: Arc::new(TokioRwLock::new(genesis.get_hash_bytes())),
            db,
        })
    }

    /// Opens the existing chain by reading the tip key. Fails if no chain
    /// has been created at this node's data directory.
    pub async fn open_blockchain() -> Result<Blockchain> {
        let path = GLOBAL_CONFIG.get_db_path();
        let db = sled::open(&path)?;
        let blocks_tree = db.open_tree(BLOCKS_TREE)?;

        let tip_bytes = blocks_tree
            .get(TIP_BLOCK_HASH_KEY)?
            .ok_or_else(|| CoinError::BlockchainNotFound(path.display().to_string()))?;

        Ok(Blockchain {
            tip_hash: Arc::new(TokioRwLock::new(tip_bytes.to_vec())),
            db,
        })
    }

    /// Persists a block and moves the tip pointer to it, atomically.
    fn update_blocks_tree(blocks_tree: &Tree, block: &Block) -> Result<()> {
        let block_hash = block.get_hash_bytes();
        let block_ivec = IVec::try_from(block.clone())?;
        let transaction_result: TransactionResult<(), ()> = blocks_tree.transaction(|tx_db| {
            tx_db.insert(block_hash.as_slice(), block_ivec.clone())?;
            tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash.as_slice())?;
            Ok(())
        });
        transaction_result
            .map(|_| ())
            .map_err(|e| CoinError::StoreError(format!("{:?}", e)))
    }

    pub fn get_db(&self) -> &Db {
        &self.db
    }

    fn blocks_tree(&self) -> Result<Tree> {
        Ok(self.db.open_tree(BLOCKS_TREE)?)
    }

    pub async fn get_tip_hash(&self) -> Vec<u8> {
        self.tip_hash.read().await.clone()
    }

    async fn set_tip_hash(&self, new_tip_hash: &[u8]) {
        let mut tip_hash = self.tip_hash.write().await;
        *tip_hash = new_tip_hash.to_vec();
    }

    /// Verifies the given transactions, seals them into a new block on top
    /// of the current tip, and advances the tip. A transaction failing
    /// verification is a fatal error; callers that tolerate invalid
    /// transactions must filter them out first.
    pub async fn mine_block(&self, transactions: &[Transaction]) -> Result<Block> {
        for transaction in transactions {
            if !self.verify_transaction(transaction).await? {
                return Err(CoinError::InvalidTransaction(transaction.get_tx_id_hex()));
            }
        }

        let best_height = self.get_best_height().await?;
        let block = Block::new_block(self.get_tip_hash().await, transactions, best_height + 1)?;

        let blocks_tree = self.blocks_tree()?;
        Self::update_blocks_tree(&blocks_tree, &block)?;
        self.set_tip_hash(block.get_hash()).await;
        Ok(block)
    }

    /// Idempotently stores a block received from a peer, advancing the tip
    /// only when the block's height beats the current best. Validation of
    /// the block itself is the receiver's responsibility before calling
    /// this.
    pub async fn add_block(&self, block: &Block) -> Result<()> {
        let blocks_tree = self.blocks_tree()?;
        let block_hash = block.get_hash_bytes();
        let block_bytes = block.serialize()?;
        let block_height = block.get_height();

        let transaction_result: TransactionResult<bool, ()> =
            blocks_tree.transaction(|tx_db| {
                if tx_db.get(block_hash.as_slice())?.is_some() {
                    return Ok(false);
                }
                tx_db.insert(block_hash.as_slice(), block_bytes.clone())?;

                let advance = match tx_db.get(TIP_BLOCK_HASH_KEY)? {
                    None => true,
                    Some(tip_hash) => {
                        let tip_bytes = tx_db.get(tip_hash)?.ok_or_else(|| {
                            UnabortableTransactionError::Storage(sled::Error::Unsupported(
                                "best tip points at a missing block".to_string(),
                            ))
                        })?;
                        let tip_block = Block::deserialize(tip_bytes.as_ref()).map_err(|e| {
                            UnabortableTransactionError::Storage(sled::Error::Unsupported(
                                e.to_string(),
                            ))
                        })?;
                        block_height > tip_block.get_height()
                    }
                };
                if advance {
                    tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash.as_slice())?;
                }
                Ok(advance)
            });

        let advanced =
            transaction_result.map_err(|e| CoinError::StoreError(format!("{:?}", e)))?;
        if advanced {
            self.set_tip_hash(block.get_hash()).await;
            info!(
                "Block {} accepted as new tip at height {}",
                block.get_hash_hex(),
                block_height
            );
        }
        Ok(())
    }

    pub async fn get_best_height(&self) -> Result<usize> {
        let blocks_tree = self.blocks_tree()?;
        let tip_hash = self.get_tip_hash().await;
        let tip_bytes = blocks_tree
            .get(tip_hash.as_slice())?
            .ok_or_else(|| CoinError::ChainTipError("tip block is missing".to_string()))?;
        let tip_block = Block::deserialize(tip_bytes.as_ref())?;
        Ok(tip_block.get_height())
    }

    pub async fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        let blocks_tree = self.blocks_tree()?;
        match blocks_tree.get(block_hash)? {
            Some(block_bytes) => Ok(Some(Block::deserialize(block_bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Every block hash on the best chain, tip first.
    pub async fn get_block_hashes(&self) -> Result<Vec<Vec<u8>>> {
        let mut iterator = self.iterator().await?;
        let mut blocks = vec![];
        while let Some(block) = iterator.next() {
            blocks.push(block.get_hash_bytes());
        }
        Ok(blocks)
    }

    /// Lazy walk from the tip back to genesis.
    pub async fn iterator(&self) -> Result<BlockchainIterator> {
        Ok(BlockchainIterator {
            blocks_tree: self.blocks_tree()?,
            current_hash: self.get_tip_hash().await,
        })
    }

    pub async fn find_transaction(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        let mut iterator = self.iterator().await?;
        while let Some(block) = iterator.next() {
            for transaction in block.get_transactions() {
                if txid.eq(transaction.get_id()) {
                    return Ok(Some(transaction.clone()));
                }
            }
        }
        Ok(None)
    }

    ///
    /// Walks the whole chain and returns, per transaction, the outputs not
    /// consumed by any input on the best chain, each tagged with its
    /// original `vout` index. One walk collects the spent references, a
    /// second collects the survivors.
    ///
    pub async fn find_utxo(&self) -> Result<HashMap<String, TXOutputs>> {
        let mut spent_txos: HashMap<String, HashSet<usize>> = HashMap::new();
        let mut iterator = self.iterator().await?;
        while let Some(block) = iterator.next() {
            for tx in block.get_transactions() {
                for tx_in in tx.get_vin() {
                    spent_txos
                        .entry(tx_in.get_input_tx_id_hex())
                        .or_default()
                        .insert(tx_in.get_vout());
                }
            }
        }

        let mut utxo: HashMap<String, TXOutputs> = HashMap::new();
        let mut iterator = self.iterator().await?;
        while let Some(block) = iterator.next() {
            for tx in block.get_transactions() {
                let txid_hex = tx.get_tx_id_hex();
                let spent = spent_txos.get(txid_hex.as_str());
                let unspent: Vec<_> = tx
                    .get_vout()
                    .iter()
                    .cloned()
                    .enumerate()
                    .filter(|(idx, _)| !spent.map(|s| s.contains(idx)).unwrap_or(false))
                    .collect();
                if !unspent.is_empty() {
                    utxo.insert(txid_hex, TXOutputs::new(unspent));
                }
            }
        }
        Ok(utxo)
    }

    async fn resolve_prev_transactions(
        &self,
        transaction: &Transaction,
    ) -> Result<HashMap<String, Transaction>> {
        let mut prev_txs = HashMap::new();
        for vin in transaction.get_vin() {
            let txid_hex = vin.get_input_tx_id_hex();
            if prev_txs.contains_key(&txid_hex) {
                continue;
            }
            let prev_tx = self
                .find_transaction(vin.get_txid())
                .await?
                .ok_or_else(|| CoinError::TransactionNotFound(txid_hex.clone()))?;
            prev_txs.insert(txid_hex, prev_tx);
        }
        Ok(prev_txs)
    }

    /// Resolves every referenced transaction from the chain and signs the
    /// given transaction. Fails if a referenced transaction is missing.
    pub async fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        pkcs8: &[u8],
    ) -> Result<()> {
        let prev_txs = self.resolve_prev_transactions(transaction).await?;
        transaction.sign(&prev_txs, pkcs8)
    }

    /// Symmetric resolve-and-verify.
    pub async fn verify_transaction(&self, transaction: &Transaction) -> Result<bool> {
        if transaction.is_coinbase() {
            return Ok(true);
        }
        let prev_txs = self.resolve_prev_transactions(transaction).await?;
        transaction.verify(&prev_txs)
    }
}

pub struct BlockchainIterator {
    blocks_tree: Tree,
    current_hash: Vec<u8>,
}

impl BlockchainIterator {
    /// Next block walking backwards; `None` past genesis (whose previous
    /// hash is empty) or on a broken link.
    pub fn next(&mut self) -> Option<Block> {
        if self.current_hash.is_empty() {
            return None;
        }
        let data = self.blocks_tree.get(self.current_hash.as_slice()).ok()??;
        let block = Block::deserialize(data.as_ref()).ok()?;
        self.current_hash = block.get_prev_block_hash().to_vec();
        Some(block)
    }
}
