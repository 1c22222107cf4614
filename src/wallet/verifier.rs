use crate::error::{TransactionError, WalletError};

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const ADDRESS_BYTES: usize = 32;
const SIGNATURE_BYTES: usize = 64;

/// Offline format checks for addresses and signatures. Nothing here touches the network.
pub struct WalletVerifier;

impl WalletVerifier {
    /// Base58 public key decoding to exactly 32 bytes
    pub fn validate_address(address: &str) -> Result<(), WalletError> {
        if address.len() < 32 || address.len() > 44 {
            return Err(WalletError::InvalidAddress(format!(
                "Invalid address length: {}",
                address.len()
            )));
        }

        if !Self::is_base58(address) {
            return Err(WalletError::InvalidAddress(
                "Address contains invalid characters".to_string(),
            ));
        }

        let decoded = bs58::decode(address)
            .into_vec()
            .map_err(|e| WalletError::InvalidAddress(e.to_string()))?;

        if decoded.len() != ADDRESS_BYTES {
            return Err(WalletError::InvalidAddress(format!(
                "Address decodes to {} bytes, expected {}",
                decoded.len(),
                ADDRESS_BYTES
            )));
        }

        Ok(())
    }

    /// Base58 transaction signature decoding to exactly 64 bytes
    pub fn validate_signature(signature: &str) -> Result<(), TransactionError> {
        if signature.is_empty() || !Self::is_base58(signature) {
            return Err(TransactionError::InvalidSignature(
                "Signature must be base58".to_string(),
            ));
        }

        let decoded = bs58::decode(signature)
            .into_vec()
            .map_err(|e| TransactionError::InvalidSignature(e.to_string()))?;

        if decoded.len() != SIGNATURE_BYTES {
            return Err(TransactionError::InvalidSignature(format!(
                "Signature decodes to {} bytes, expected {}",
                decoded.len(),
                SIGNATURE_BYTES
            )));
        }

        Ok(())
    }

    fn is_base58(value: &str) -> bool {
        value.chars().all(|c| BASE58_ALPHABET.contains(c))
    }
}
