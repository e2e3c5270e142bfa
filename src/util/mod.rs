pub mod utils;

pub use utils::base58_decode;
pub use utils::base58_encode;
pub use utils::current_timestamp;
pub use utils::ecdsa_p256_sha256_sign_digest;
pub use utils::ecdsa_p256_sha256_sign_verify;
pub use utils::new_key_pair;
pub use utils::public_key_from_pkcs8;
pub use utils::ripemd160_digest;
pub use utils::sha256_digest;
