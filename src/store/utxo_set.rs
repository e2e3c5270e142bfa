//! Materialized index of unspent outputs, kept in the `chainstate` tree:
//! transaction id → its still-unspent outputs tagged with their original
//! `vout` indices.

use super::blockchain::Blockchain;
use crate::core::block::Block;
use crate::core::transaction::{TXOutput, TXOutputs};
use crate::error::{CoinError, Result};
use data_encoding::HEXLOWER;
use sled::transaction::{TransactionResult, UnabortableTransactionError};
use sled::{Batch, Tree};
use std::collections::HashMap;
use tracing::debug;

const UTXO_TREE: &str = "chainstate";

pub struct UTXOSet {
    blockchain: Blockchain,
}

impl UTXOSet {
    pub fn new(blockchain: Blockchain) -> UTXOSet {
        UTXOSet { blockchain }
    }

    pub fn get_blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    fn utxo_tree(&self) -> Result<Tree> {
        Ok(self.blockchain.get_db().open_tree(UTXO_TREE)?)
    }

    ///
    /// Drops and rebuilds the chainstate from a full chain walk. The rebuilt
    /// entries are applied in a single batch.
    ///
    pub async fn reindex(&self) -> Result<()> {
        let utxo_tree = self.utxo_tree()?;
        utxo_tree.clear()?;

        let utxo_map = self.blockchain.find_utxo().await?;
        debug!("Reindexing {} transactions with unspent outputs", utxo_map.len());

        let mut batch = Batch::default();
        for (txid_hex, outs) in &utxo_map {
            let txid = HEXLOWER
                .decode(txid_hex.as_bytes())
                .map_err(|e| CoinError::TransactionIdHexDecodingError(e.to_string()))?;
            batch.insert(txid, outs.serialize()?);
        }
        utxo_tree.apply_batch(batch)?;
        Ok(())
    }

    ///
    /// Scans the chainstate in key order, accumulating outputs locked to
    /// `pub_key_hash` until the requested amount is covered. Returns the
    /// accumulated value and, per transaction, the original `vout` indices
    /// to spend.
    ///
    pub async fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: i64,
    ) -> Result<(i64, HashMap<String, Vec<usize>>)> {
        let mut unspent_outputs: HashMap<String, Vec<usize>> = HashMap::new();
        let mut accumulated = 0;
        let utxo_tree = self.utxo_tree()?;

        for item in utxo_tree.iter() {
            let (k, v) = item?;
            let txid_hex = HEXLOWER.encode(k.as_ref());
            let outs = TXOutputs::deserialize(v.as_ref())?;
            for (out_index, out) in outs.get_outputs() {
                if out.is_locked_with_key(pub_key_hash) && accumulated < amount {
                    accumulated += out.get_value();
                    unspent_outputs
                        .entry(txid_hex.clone())
                        .or_default()
                        .push(*out_index);
                }
            }
        }
        Ok((accumulated, unspent_outputs))
    }

    /// Every unspent output locked to `pub_key_hash`, in chainstate key
    /// order.
    pub async fn find_utxo(&self, pub_key_hash: &[u8]) -> Result<Vec<TXOutput>> {
        let utxo_tree = self.utxo_tree()?;
        let mut utxos = vec![];
        for item in utxo_tree.iter() {
            let (_, v) = item?;
            let outs = TXOutputs::deserialize(v.as_ref())?;
            for (_, out) in outs.get_outputs() {
                if out.is_locked_with_key(pub_key_hash) {
                    utxos.push(out.clone());
                }
            }
        }
        Ok(utxos)
    }

    pub async fn get_balance(&self, pub_key_hash: &[u8]) -> Result<i64> {
        let utxos = self.find_utxo(pub_key_hash).await?;
        Ok(utxos.iter().map(|out| out.get_value()).sum())
    }

    pub async fn count_transactions(&self) -> Result<usize> {
        Ok(self.utxo_tree()?.iter().count())
    }

    ///
    /// Applies one accepted block to the chainstate in a single store
    /// transaction: every input's referenced output is dropped (the key is
    /// deleted once no output survives), then the block's own outputs are
    /// inserted. Applied in block order this yields the same bytes as a
    /// full `reindex`.
    ///
    pub async fn update(&self, block: &Block) -> Result<()> {
        let utxo_tree = self.utxo_tree()?;

        let transaction_result: TransactionResult<(), ()> = utxo_tree.transaction(|utxo_db| {
            for tx in block.get_transactions() {
                for vin in tx.get_vin() {
                    let outs_bytes = utxo_db.get(vin.get_txid())?.ok_or_else(|| {
                        UnabortableTransactionError::Storage(sled::Error::Unsupported(format!(
                            "unspent outputs missing for transaction {}",
                            vin.get_input_tx_id_hex()
                        )))
                    })?;
                    let mut outs = TXOutputs::deserialize(outs_bytes.as_ref()).map_err(|e| {
                        UnabortableTransactionError::Storage(sled::Error::Unsupported(
                            e.to_string(),
                        ))
                    })?;
                    outs.remove_spent(vin.get_vout());

                    if outs.is_empty() {
                        utxo_db.remove(vin.get_txid())?;
                    } else {
                        let outs_bytes = outs.serialize().map_err(|e| {
                            UnabortableTransactionError::Storage(sled::Error::Unsupported(
                                e.to_string(),
                            ))
                        })?;
                        utxo_db.insert(vin.get_txid(), outs_bytes)?;
                    }
                }

                let new_outputs = TXOutputs::from_vout(tx.get_vout());
                let outs_bytes = new_outputs.serialize().map_err(|e| {
                    UnabortableTransactionError::Storage(sled::Error::Unsupported(e.to_string()))
                })?;
                utxo_db.insert(tx.get_id(), outs_bytes)?;
            }
            Ok(())
        });

        transaction_result
            .map(|_| ())
            .map_err(|e| CoinError::StoreError(format!("{:?}", e)))
    }

    #[cfg(test)]
    pub fn dump_chainstate(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let utxo_tree = self.utxo_tree()?;
        let mut entries = vec![];
        for item in utxo_tree.iter() {
            let (k, v) = item?;
            entries.push((k.to_vec(), v.to_vec()));
        }
        Ok(entries)
    }
}
