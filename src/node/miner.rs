//! Mining trigger: drains the mempool into PoW-sealed blocks once enough
//! transactions are pending.

use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use crate::network::message::OpType;
use crate::network::operations::send_inv;
use crate::node::context::NodeContext;
use crate::store::UTXOSet;
use tracing::{info, warn};

/// Minimum mempool size before a miner starts a block.
pub const TRANSACTION_THRESHOLD: usize = 2;

pub fn should_trigger_mining(ctx: &NodeContext) -> bool {
    ctx.is_miner() && ctx.mempool_len() >= TRANSACTION_THRESHOLD
}

///
/// Repeatedly verifies the pending transactions, drops the invalid ones,
/// and seals the remainder plus a fresh coinbase into a block. After each
/// block: the chainstate is rebuilt, the mined transactions leave the
/// mempool, and the new block hash is announced to every other peer. The
/// loop continues while transactions remain pending.
///
pub async fn mine_pending_transactions(ctx: &NodeContext) -> Result<()> {
    let mining_addr = match ctx.mining_addr() {
        Some(addr) => addr.to_string(),
        None => return Ok(()),
    };

    loop {
        let mut txs = vec![];
        for tx in ctx.mempool_transactions() {
            match ctx.blockchain().verify_transaction(&tx).await {
                Ok(true) => txs.push(tx),
                Ok(false) => {
                    warn!("Dropping invalid transaction {}", tx.get_tx_id_hex());
                    ctx.mempool_remove(&tx.get_tx_id_hex());
                }
                Err(CoinError::TransactionNotFound(txid)) => {
                    warn!(
                        "Dropping transaction {} referencing unknown transaction {}",
                        tx.get_tx_id_hex(),
                        txid
                    );
                    ctx.mempool_remove(&tx.get_tx_id_hex());
                }
                Err(e) => return Err(e),
            }
        }

        if txs.is_empty() {
            info!("All pending transactions are invalid, waiting for new ones");
            return Ok(());
        }

        txs.push(Transaction::new_coinbase_tx(&mining_addr)?);
        let new_block = ctx.blockchain().mine_block(txs.as_slice()).await?;

        let utxo_set = UTXOSet::new(ctx.blockchain().clone());
        utxo_set.reindex().await?;
        info!("New block {} is mined", new_block.get_hash_hex());

        for tx in &txs {
            ctx.mempool_remove(&tx.get_tx_id_hex());
        }

        for peer in ctx.other_peers() {
            send_inv(ctx, &peer, OpType::Block, &[new_block.get_hash_bytes()]).await;
        }

        if ctx.mempool_len() == 0 {
            return Ok(());
        }
    }
}
