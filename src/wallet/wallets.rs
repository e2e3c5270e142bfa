// Per-node wallet collection, persisted as a bincode map in the file named
// by GLOBAL_CONFIG (wallet_<NODE_ID>.dat unless WALLET_FILE overrides it).

use super::wallet::Wallet;
use crate::config::GLOBAL_CONFIG;
use crate::error::{CoinError, Result};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};

pub struct Wallets {
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    pub fn new() -> Result<Wallets> {
        let mut wallets = Wallets {
            wallets: HashMap::new(),
        };
        wallets.load_from_file()?;
        Ok(wallets)
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        self.save_to_file()?;
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Wallet)> {
        self.wallets.iter()
    }

    fn load_from_file(&mut self) -> Result<()> {
        let path = GLOBAL_CONFIG.get_wallet_file();
        if !path.exists() {
            return Ok(());
        }
        let mut file =
            File::open(path).map_err(|e| CoinError::WalletsFileError(e.to_string()))?;
        let mut buf = vec![];
        file.read_to_end(&mut buf)
            .map_err(|e| CoinError::WalletsFileError(e.to_string()))?;
        let wallets = bincode::serde::decode_from_slice(&buf[..], bincode::config::standard())
            .map_err(|e| CoinError::WalletsDeserializationError(e.to_string()))?
            .0;
        self.wallets = wallets;
        Ok(())
    }

    fn save_to_file(&self) -> Result<()> {
        let path = GLOBAL_CONFIG.get_wallet_file();
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .map_err(|e| CoinError::SavingWalletsError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        let wallets_bytes =
            bincode::serde::encode_to_vec(&self.wallets, bincode::config::standard())
                .map_err(|e| CoinError::WalletsSerializationError(e.to_string()))?;
        writer
            .write_all(wallets_bytes.as_slice())
            .map_err(|e| CoinError::SavingWalletsError(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| CoinError::SavingWalletsError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_temp_wallet_file<T>(test: impl FnOnce() -> T) -> T {
        let _env = crate::test_utils::lock_env();
        let dir = tempfile::tempdir().expect("temp dir creation failed");
        let file = dir.path().join("wallets.dat");
        unsafe {
            std::env::set_var("WALLET_FILE", &file);
        }
        let result = test();
        unsafe {
            std::env::remove_var("WALLET_FILE");
        }
        result
    }

    #[test]
    fn test_create_and_reload_wallet() {
        with_temp_wallet_file(|| {
            let mut wallets = Wallets::new().expect("wallets open failed");
            let address = wallets.create_wallet().expect("wallet creation failed");
            assert!(wallets.get_wallet(&address).is_some());

            // A fresh instance reads the same file.
            let reloaded = Wallets::new().expect("wallets reload failed");
            assert!(reloaded.get_addresses().contains(&address));
            let wallet = reloaded.get_wallet(&address).expect("wallet missing");
            assert_eq!(wallet.get_address(), address);
        });
    }

    #[test]
    fn test_missing_file_is_empty() {
        with_temp_wallet_file(|| {
            let wallets = Wallets::new().expect("wallets open failed");
            assert!(wallets.get_addresses().is_empty());
        });
    }
}
