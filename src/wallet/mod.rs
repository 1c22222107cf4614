pub mod models;
pub mod registry;
pub mod verifier;

pub use models::{RevocationResult, Wallet};
pub use registry::WalletRegistry;
pub use verifier::WalletVerifier;
