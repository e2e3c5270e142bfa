use crate::error::{CoinError, Result};
use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{
    ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair,
};
use ripemd::{Digest, Ripemd160};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as i64
}

///
/// The `sha256_digest` function performs a SHA-256 hash operation on the
/// provided data, returning the resulting digest as a vector of bytes.
///
/// # Arguments
///
/// * `data` - A reference to the input data.
pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

///
/// The `ripemd160_digest` function computes the RIPEMD-160 digest of the
/// input. Combined with `sha256_digest` it forms the pay-to-pubkey-hash
/// address hash: RIPEMD160(SHA256(public_key)).
///
/// # Arguments
///
/// * `data` - A reference to the input data.
pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| CoinError::InvalidAddress(e.to_string()))
}

///
/// The `new_key_pair` function generates a new ECDSA P-256 key pair and
/// returns the private key as a PKCS#8 document.
///
pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| CoinError::WalletKeyPairError(e.to_string()))?;
    Ok(pkcs8.as_ref().to_vec())
}

///
/// The `public_key_from_pkcs8` function derives the uncompressed SEC1 public
/// key (`0x04 || x || y`, 65 bytes) from a PKCS#8 private key document.
///
/// # Arguments
///
/// * `pkcs8` - A reference to the PKCS#8 document.
pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| CoinError::WalletKeyPairError(e.to_string()))?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

///
/// The `ecdsa_p256_sha256_sign_digest` function signs the provided message
/// with ECDSA P-256/SHA-256. The fixed signature format is `r || s` with
/// each component left-padded to 32 bytes, so signatures are always exactly
/// 64 bytes regardless of leading zeros in either component.
///
/// # Arguments
///
/// * `pkcs8` - A reference to the PKCS#8 document.
/// * `message` - A reference to the message.
pub fn ecdsa_p256_sha256_sign_digest(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| CoinError::TransactionSignatureError(e.to_string()))?;
    key_pair
        .sign(&rng, message)
        .map(|signature| signature.as_ref().to_vec())
        .map_err(|e| CoinError::TransactionSignatureError(e.to_string()))
}

///
/// The `ecdsa_p256_sha256_sign_verify` function verifies an ECDSA
/// P-256/SHA-256 signature against the message using the uncompressed SEC1
/// public key, returning whether the signature is valid.
///
/// # Arguments
///
/// * `public_key` - A reference to the public key.
/// * `signature` - A reference to the signature.
/// * `message` - A reference to the message.
pub fn ecdsa_p256_sha256_sign_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key =
        ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key);
    peer_public_key.verify(message, signature).is_ok()
}
