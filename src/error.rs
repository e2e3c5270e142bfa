use thiserror::Error;

#[derive(Clone, Error, Debug)]
pub enum CoinError {
    // Recoverable errors
    #[error("Blockchain not found: {0}")]
    BlockchainNotFound(String),
    #[error("Blockchain already exists: {0}")]
    BlockchainAlreadyExists(String),
    #[error("Peer unavailable: {0}")]
    PeerUnavailable(String),

    // Validation errors
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Not enough funds")]
    NotEnoughFunds,
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    // Wire protocol errors
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    // Serialization errors
    #[error("Block serialization error: {0}")]
    BlockSerializationError(String),
    #[error("Block deserialization error: {0}")]
    BlockDeserializationError(String),
    #[error("Transaction serialization error: {0}")]
    TransactionSerializationError(String),
    #[error("Transaction deserialization error: {0}")]
    TransactionDeserializationError(String),
    #[error("Transaction id hex decoding error: {0}")]
    TransactionIdHexDecodingError(String),
    #[error("Transaction signature error: {0}")]
    TransactionSignatureError(String),

    // Wallet errors
    #[error("Wallet key pair error: {0}")]
    WalletKeyPairError(String),
    #[error("Wallet not found for address: {0}")]
    WalletNotFound(String),
    #[error("Saving wallets error: {0}")]
    SavingWalletsError(String),
    #[error("Wallets file error: {0}")]
    WalletsFileError(String),
    #[error("Wallets serialization error: {0}")]
    WalletsSerializationError(String),
    #[error("Wallets deserialization error: {0}")]
    WalletsDeserializationError(String),

    // Store errors
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Chain tip error: {0}")]
    ChainTipError(String),
}

impl From<sled::Error> for CoinError {
    fn from(e: sled::Error) -> Self {
        CoinError::StoreError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoinError>;
