use super::block::Block;
use crate::error::Result;
use data_encoding::HEXLOWER;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;
use tracing::debug;

/// Shared difficulty. Every node must agree on this value; a block hash must
/// be numerically below `1 << (256 - TARGET_BITS)` to be accepted.
pub const TARGET_BITS: i64 = 16;

const MAX_NONCE: i64 = i64::MAX;

pub struct ProofOfWork {
    block: Block,
    tx_root: Vec<u8>,
    target: BigInt,
}

impl ProofOfWork {
    pub fn new_proof_of_work(block: Block) -> Result<ProofOfWork> {
        // All hashes are 256 bits, so shifting 1 left by (256 - TARGET_BITS)
        // leaves TARGET_BITS leading zero bits as the difficulty bound.
        let mut target = BigInt::from(1);
        target.shl_assign(256 - TARGET_BITS);
        let tx_root = block.hash_transactions()?;
        Ok(ProofOfWork {
            block,
            tx_root,
            target,
        })
    }

    /// Canonical header preimage: previous hash, Merkle root of the
    /// transactions, then timestamp, difficulty and nonce as 8-byte
    /// big-endian integers.
    fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        let mut data_bytes = vec![];
        data_bytes.extend(self.block.get_prev_block_hash());
        data_bytes.extend(self.tx_root.as_slice());
        data_bytes.extend(self.block.get_timestamp().to_be_bytes());
        data_bytes.extend(TARGET_BITS.to_be_bytes());
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    pub fn run(&self) -> (i64, Vec<u8>) {
        let mut nonce = 0;
        let mut hash = Vec::new();
        debug!("Mining the block");
        while nonce < MAX_NONCE {
            let data = self.prepare_data(nonce);
            hash = crate::util::sha256_digest(data.as_slice());
            let hash_int = BigInt::from_bytes_be(Sign::Plus, hash.as_slice());

            if hash_int < self.target {
                debug!("Found hash {}", HEXLOWER.encode(hash.as_slice()));
                break;
            } else {
                nonce += 1;
            }
        }
        (nonce, hash)
    }

    /// Recomputes the preimage with the stored nonce and checks the hash
    /// against the target. Used on every received block before it is
    /// persisted, and by `printchain`.
    pub fn validate(block: &Block) -> Result<bool> {
        let pow = ProofOfWork::new_proof_of_work(block.clone())?;
        let data = pow.prepare_data(block.get_nonce());
        let hash = crate::util::sha256_digest(data.as_slice());
        if hash.as_slice() != block.get_hash() {
            return Ok(false);
        }
        let hash_int = BigInt::from_bytes_be(Sign::Plus, hash.as_slice());
        Ok(hash_int < pow.target)
    }
}
