pub mod wallet;
pub mod wallets;

pub use wallet::{
    ADDRESS_CHECK_SUM_LEN, Wallet, convert_address, hash_pub_key, pub_key_hash_from_address,
    validate_address,
};
pub use wallets::Wallets;
