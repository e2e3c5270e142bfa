//! # Block
//!
//! A PoW-sealed, immutable container of transactions, linked to its parent
//! by hash. Genesis sits at height 0 with an empty previous hash.

use crate::core::merkle::MerkleTree;
use crate::core::proof_of_work::ProofOfWork;
use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use sled::IVec;

#[derive(Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    timestamp: i64,
    prev_block_hash: Vec<u8>,
    hash: Vec<u8>,
    nonce: i64,
    height: usize,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new_block(
        prev_block_hash: Vec<u8>,
        transactions: &[Transaction],
        height: usize,
    ) -> Result<Block> {
        let header = BlockHeader {
            timestamp: crate::util::current_timestamp(),
            prev_block_hash,
            hash: vec![],
            nonce: 0,
            height,
        };
        let mut block = Block {
            header,
            transactions: transactions.to_vec(),
        };
        let pow = ProofOfWork::new_proof_of_work(block.clone())?;
        let (nonce, hash) = pow.run();
        block.header.nonce = nonce;
        block.header.hash = hash;
        Ok(block)
    }

    pub fn generate_genesis_block(coinbase: &Transaction) -> Result<Block> {
        Block::new_block(vec![], &[coinbase.clone()], 0)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoinError::BlockSerializationError(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CoinError::BlockDeserializationError(e.to_string()))
            .map(|(block, _)| block)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_prev_block_hash(&self) -> &[u8] {
        self.header.prev_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.header.hash.as_slice()
    }

    pub fn get_hash_bytes(&self) -> Vec<u8> {
        self.header.hash.clone()
    }

    pub fn get_hash_hex(&self) -> String {
        HEXLOWER.encode(self.header.hash.as_slice())
    }

    pub fn get_timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn get_nonce(&self) -> i64 {
        self.header.nonce
    }

    pub fn get_height(&self) -> usize {
        self.header.height
    }

    /// Merkle root over the canonical serialization of each transaction.
    pub fn hash_transactions(&self) -> Result<Vec<u8>> {
        let mut tx_bytes = vec![];
        for transaction in &self.transactions {
            tx_bytes.push(transaction.serialize()?);
        }
        Ok(MerkleTree::new(tx_bytes.as_slice()).get_root().to_vec())
    }

    #[cfg(test)]
    pub fn set_nonce(&mut self, nonce: i64) {
        self.header.nonce = nonce;
    }
}

impl TryFrom<Block> for IVec {
    type Error = CoinError;
    fn try_from(b: Block) -> Result<Self> {
        Ok(Self::from(b.serialize()?))
    }
}
