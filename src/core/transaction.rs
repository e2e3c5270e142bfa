//! UTXO-style transactions.
//!
//! A transaction id is the SHA-256 of its canonical serialization with the
//! id field blanked; the canonical form is bincode's standard configuration
//! over the exact types below, which every node shares. The signing preimage
//! for an input is the lowercase hex of the serialized trimmed copy in which
//! only that input carries the `pub_key_hash` of the output it spends.

use crate::error::{CoinError, Result};
use crate::store::UTXOSet;
use crate::util::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, sha256_digest,
};
use crate::wallet::{Wallet, hash_pub_key};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Block reward. Coinbase outputs sum to exactly this value; there is no
/// fee mechanism.
pub const SUBSIDY: i64 = 50;

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TXInput {
    txid: Vec<u8>,
    vout: usize,
    signature: Vec<u8>,
    pub_key: Vec<u8>,
}

impl TXInput {
    pub fn new(txid: &[u8], vout: usize) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            signature: vec![],
            pub_key: vec![],
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> usize {
        self.vout
    }

    pub fn get_pub_key(&self) -> &[u8] {
        self.pub_key.as_slice()
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn get_input_tx_id_hex(&self) -> String {
        HEXLOWER.encode(self.txid.as_slice())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TXOutput {
    value: i64,
    pub_key_hash: Vec<u8>,
}

impl TXOutput {
    pub fn new(value: i64, address: &str) -> Result<TXOutput> {
        let pub_key_hash = crate::wallet::pub_key_hash_from_address(address)?;
        Ok(TXOutput {
            value,
            pub_key_hash,
        })
    }

    pub fn get_value(&self) -> i64 {
        self.value
    }

    pub fn get_pub_key_hash(&self) -> &[u8] {
        self.pub_key_hash.as_slice()
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash.eq(pub_key_hash)
    }
}

/// Chainstate value: a transaction's still-unspent outputs, each carrying
/// its original `vout` index, in ascending index order. Keeping the original
/// index means a partial spend never shifts the indices later inputs
/// reference.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TXOutputs {
    outputs: Vec<(usize, TXOutput)>,
}

impl TXOutputs {
    pub fn new(outputs: Vec<(usize, TXOutput)>) -> TXOutputs {
        TXOutputs { outputs }
    }

    /// All outputs of a fresh transaction, indexed 0..n.
    pub fn from_vout(vout: &[TXOutput]) -> TXOutputs {
        TXOutputs {
            outputs: vout.iter().cloned().enumerate().collect(),
        }
    }

    pub fn get_outputs(&self) -> &[(usize, TXOutput)] {
        self.outputs.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Removes the output with the given original index, if present.
    pub fn remove_spent(&mut self, vout: usize) {
        self.outputs.retain(|(idx, _)| *idx != vout);
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoinError::TransactionSerializationError(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<TXOutputs> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CoinError::TransactionDeserializationError(e.to_string()))
            .map(|(outs, _)| outs)
    }
}

/// Input side of a transaction. A coinbase mints the subsidy and carries
/// only an arbitrary payload; a spend consumes prior outputs.
#[derive(Clone, Serialize, Deserialize)]
pub enum TxInputs {
    Coinbase { data: Vec<u8> },
    Spend(Vec<TXInput>),
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Transaction {
    id: Vec<u8>,
    vin: TxInputs,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Creates a coinbase paying `SUBSIDY` to `to`. The payload is salted so
    /// repeated rewards to one address serialize (and therefore hash)
    /// differently.
    pub fn new_coinbase_tx(to: &str) -> Result<Transaction> {
        let txout = TXOutput::new(SUBSIDY, to)?;
        let mut data = format!("Reward to '{}'", to).into_bytes();
        data.extend(Uuid::new_v4().as_bytes());

        let mut tx = Transaction {
            id: vec![],
            vin: TxInputs::Coinbase { data },
            vout: vec![txout],
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    ///
    /// Constructs a signed transfer from the wallet owner to `to`, selecting
    /// spendable outputs from the UTXO set, returning change to the sender
    /// when the selection overshoots.
    ///
    /// # Arguments
    ///
    /// * `from_wallet` - The sender's wallet (signing key and public key).
    /// * `to` - The recipient's address.
    /// * `amount` - The value to transfer.
    /// * `utxo_set` - The UTXO set to select spendable outputs from.
    pub async fn new_utxo_transaction(
        from_wallet: &Wallet,
        from: &str,
        to: &str,
        amount: i64,
        utxo_set: &UTXOSet,
    ) -> Result<Transaction> {
        let pub_key_hash = hash_pub_key(from_wallet.get_public_key());

        let (accumulated, valid_outputs) = utxo_set
            .find_spendable_outputs(pub_key_hash.as_slice(), amount)
            .await?;
        if accumulated < amount {
            return Err(CoinError::NotEnoughFunds);
        }

        let mut inputs = vec![];
        for (txid_hex, outs) in valid_outputs {
            let txid = HEXLOWER
                .decode(txid_hex.as_bytes())
                .map_err(|e| CoinError::TransactionIdHexDecodingError(e.to_string()))?;
            for out in outs {
                let mut input = TXInput::new(txid.as_slice(), out);
                input.pub_key = from_wallet.get_public_key().to_vec();
                inputs.push(input);
            }
        }

        let mut outputs = vec![TXOutput::new(amount, to)?];
        if accumulated > amount {
            // Change back to the sender.
            outputs.push(TXOutput::new(accumulated - amount, from)?);
        }

        let mut tx = Transaction {
            id: vec![],
            vin: TxInputs::Spend(inputs),
            vout: outputs,
        };
        tx.id = tx.hash()?;
        utxo_set
            .get_blockchain()
            .sign_transaction(&mut tx, from_wallet.get_pkcs8())
            .await?;
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self.vin, TxInputs::Coinbase { .. })
    }

    /// Spend inputs; empty for a coinbase.
    pub fn get_vin(&self) -> &[TXInput] {
        match &self.vin {
            TxInputs::Spend(inputs) => inputs.as_slice(),
            TxInputs::Coinbase { .. } => &[],
        }
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_id_bytes(&self) -> Vec<u8> {
        self.id.clone()
    }

    pub fn get_tx_id_hex(&self) -> String {
        HEXLOWER.encode(self.id.as_slice())
    }

    ///
    /// Creates the trimmed copy used for signing and verification: same id
    /// and outputs, every input reduced to its (txid, vout) reference.
    ///
    fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .get_vin()
            .iter()
            .map(|input| TXInput::new(input.get_txid(), input.get_vout()))
            .collect();
        Transaction {
            id: self.id.clone(),
            vin: TxInputs::Spend(inputs),
            vout: self.vout.clone(),
        }
    }

    /// Lowercase hex of the canonical serialization; the exact bytes that
    /// are signed. Both signer and verifier must build this identically.
    fn signing_preimage(tx_copy: &Transaction) -> Result<Vec<u8>> {
        Ok(HEXLOWER.encode(tx_copy.serialize()?.as_slice()).into_bytes())
    }

    ///
    /// Signs every input with the sender's private key. `prev_txs` maps the
    /// hex id of each referenced transaction to the transaction itself; the
    /// referenced output's `pub_key_hash` is placed in the input's key slot
    /// of the trimmed copy while that input is being signed.
    ///
    /// # Arguments
    ///
    /// * `prev_txs` - Referenced transactions, keyed by hex id.
    /// * `pkcs8` - The sender's private key document.
    pub fn sign(&mut self, prev_txs: &HashMap<String, Transaction>, pkcs8: &[u8]) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        let mut tx_copy = self.trimmed_copy();
        let inputs = match &mut self.vin {
            TxInputs::Spend(inputs) => inputs,
            TxInputs::Coinbase { .. } => return Ok(()),
        };

        for (idx, vin) in inputs.iter_mut().enumerate() {
            let prev_tx = prev_txs.get(&vin.get_input_tx_id_hex()).ok_or_else(|| {
                CoinError::TransactionNotFound(vin.get_input_tx_id_hex())
            })?;
            let prev_out = prev_tx.vout.get(vin.vout).ok_or_else(|| {
                CoinError::InvalidTransaction(format!(
                    "input references output {} of {} which does not exist",
                    vin.vout,
                    vin.get_input_tx_id_hex()
                ))
            })?;

            Self::set_copy_pub_key(&mut tx_copy, idx, prev_out.pub_key_hash.clone());
            let preimage = Self::signing_preimage(&tx_copy)?;
            Self::set_copy_pub_key(&mut tx_copy, idx, vec![]);

            vin.signature = ecdsa_p256_sha256_sign_digest(pkcs8, preimage.as_slice())?;
        }
        Ok(())
    }

    ///
    /// Verifies every input signature against the rebuilt preimage and the
    /// input's stored public key, and checks that the referenced outputs
    /// carry at least the value this transaction spends. Coinbase
    /// transactions always verify.
    ///
    /// # Arguments
    ///
    /// * `prev_txs` - Referenced transactions, keyed by hex id.
    pub fn verify(&self, prev_txs: &HashMap<String, Transaction>) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }

        let mut tx_copy = self.trimmed_copy();
        let mut input_value = 0;

        for (idx, vin) in self.get_vin().iter().enumerate() {
            let prev_tx = prev_txs.get(&vin.get_input_tx_id_hex()).ok_or_else(|| {
                CoinError::TransactionNotFound(vin.get_input_tx_id_hex())
            })?;
            let prev_out = match prev_tx.vout.get(vin.vout) {
                Some(out) => out,
                None => return Ok(false),
            };
            input_value += prev_out.get_value();

            Self::set_copy_pub_key(&mut tx_copy, idx, prev_out.pub_key_hash.clone());
            let preimage = Self::signing_preimage(&tx_copy)?;
            Self::set_copy_pub_key(&mut tx_copy, idx, vec![]);

            if !ecdsa_p256_sha256_sign_verify(
                vin.get_pub_key(),
                vin.get_signature(),
                preimage.as_slice(),
            ) {
                return Ok(false);
            }
        }

        let output_value: i64 = self.vout.iter().map(|out| out.get_value()).sum();
        Ok(input_value >= output_value)
    }

    fn set_copy_pub_key(tx_copy: &mut Transaction, idx: usize, pub_key: Vec<u8>) {
        if let TxInputs::Spend(inputs) = &mut tx_copy.vin {
            inputs[idx].pub_key = pub_key;
        }
    }

    ///
    /// The transaction's hash: SHA-256 over the canonical serialization with
    /// the id field blanked.
    ///
    fn hash(&self) -> Result<Vec<u8>> {
        let tx_copy = Transaction {
            id: vec![],
            vin: self.vin.clone(),
            vout: self.vout.clone(),
        };
        Ok(sha256_digest(tx_copy.serialize()?.as_slice()))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoinError::TransactionSerializationError(e.to_string()))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| CoinError::TransactionDeserializationError(e.to_string()))
            .map(|(tx, _)| tx)
    }

    /// Test-only constructor for hand-built transactions.
    #[cfg(test)]
    pub fn new_unchecked(vin: TxInputs, vout: Vec<TXOutput>) -> Result<Transaction> {
        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.hash()?;
        Ok(tx)
    }

    /// Test-only access to flip signature bytes.
    #[cfg(test)]
    pub fn corrupt_first_signature(&mut self) {
        if let TxInputs::Spend(inputs) = &mut self.vin {
            if let Some(first) = inputs.first_mut() {
                if let Some(byte) = first.signature.first_mut() {
                    *byte ^= 0x01;
                }
            }
        }
    }
}
