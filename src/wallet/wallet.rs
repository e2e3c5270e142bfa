//!
//! Pay-to-pubkey-hash wallet: an ECDSA P-256 key pair and the Base58Check
//! address derived from RIPEMD160(SHA256(public_key)).
//!

use crate::error::{CoinError, Result};
use crate::util::{
    base58_decode, base58_encode, new_key_pair, public_key_from_pkcs8, ripemd160_digest,
    sha256_digest,
};
use serde::{Deserialize, Serialize};

// Address version byte, prefixed to the public key hash before the checksum.
const VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;

#[derive(Clone, Serialize, Deserialize)]
pub struct Wallet {
    // PKCS#8 private key document.
    pkcs8: Vec<u8>,
    // Uncompressed SEC1 public key point.
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        let public_key = public_key_from_pkcs8(pkcs8.as_slice())?;
        Ok(Wallet { pkcs8, public_key })
    }

    ///
    /// The Base58Check address: version byte, public key hash, then the
    /// first four bytes of a double SHA-256 checksum.
    ///
    pub fn get_address(&self) -> String {
        let pub_key_hash = hash_pub_key(self.public_key.as_slice());
        let mut payload: Vec<u8> = vec![VERSION];
        payload.extend(pub_key_hash.as_slice());
        let checksum = checksum(payload.as_slice());
        payload.extend(checksum.as_slice());
        base58_encode(payload.as_slice())
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }
}

///
/// Hashes a public key into the form outputs are locked with:
/// RIPEMD160(SHA256(public_key)).
///
pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    ripemd160_digest(sha256_digest(pub_key).as_slice())
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let first_sha = sha256_digest(payload);
    let second_sha = sha256_digest(first_sha.as_slice());
    second_sha[0..ADDRESS_CHECK_SUM_LEN].to_vec()
}

///
/// Validates an address: Base58 decodes it, checks the version byte and
/// recomputes the checksum.
///
pub fn validate_address(address: &str) -> Result<bool> {
    let payload = base58_decode(address)?;
    if payload.len() <= ADDRESS_CHECK_SUM_LEN + 1 {
        return Ok(false);
    }
    let version = payload[0];
    if version != VERSION {
        return Ok(false);
    }
    let actual_checksum = &payload[payload.len() - ADDRESS_CHECK_SUM_LEN..];
    let target_checksum = checksum(&payload[..payload.len() - ADDRESS_CHECK_SUM_LEN]);
    Ok(actual_checksum.eq(target_checksum.as_slice()))
}

///
/// Converts a public key hash back to its Base58Check address.
///
pub fn convert_address(pub_key_hash: &[u8]) -> String {
    let mut payload: Vec<u8> = vec![VERSION];
    payload.extend(pub_key_hash);
    let checksum = checksum(payload.as_slice());
    payload.extend(checksum.as_slice());
    base58_encode(payload.as_slice())
}

///
/// Extracts the public key hash from an address, rejecting addresses whose
/// checksum or version byte is wrong.
///
pub fn pub_key_hash_from_address(address: &str) -> Result<Vec<u8>> {
    if !validate_address(address)? {
        return Err(CoinError::InvalidAddress(address.to_string()));
    }
    let payload = base58_decode(address)?;
    Ok(payload[1..payload.len() - ADDRESS_CHECK_SUM_LEN].to_vec())
}
