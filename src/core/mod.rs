pub mod block;
pub mod merkle;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use merkle::MerkleTree;
pub use proof_of_work::{ProofOfWork, TARGET_BITS};
pub use transaction::{SUBSIDY, TXInput, TXOutput, TXOutputs, Transaction, TxInputs};
