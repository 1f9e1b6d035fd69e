use alloy_primitives::Address;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::chain::error::{ChainError, ChainResult};
use crate::chain::hash::keccak256;

/// Signing key supplied on the command line via `--private-key`.
/// The raw key bytes are wiped when the wallet is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EvmWallet {
    #[zeroize(skip)]
    address: Address,

    private_key_bytes: [u8; 32],
}

impl EvmWallet {
    /// Accepts 64 hex characters, with or without a `0x` prefix
    pub fn from_private_key_hex(key: &str) -> ChainResult<Self> {
        let invalid = || ChainError::Signing("private key must be 32 bytes of hex".to_string());

        let trimmed = key.trim();
        let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let mut decoded = hex::decode(body).map_err(|_| invalid())?;
        if decoded.len() != 32 {
            decoded.zeroize();
            return Err(invalid());
        }

        let mut private_key_bytes = [0u8; 32];
        private_key_bytes.copy_from_slice(&decoded);
        decoded.zeroize();

        let secret_key = SecretKey::from_slice(&private_key_bytes)
            .map_err(|e| ChainError::Signing(format!("invalid private key: {}", e)))?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key);

        Ok(Self {
            address: address_from_public_key(&public_key),
            private_key_bytes,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn secret_key(&self) -> ChainResult<SecretKey> {
        SecretKey::from_slice(&self.private_key_bytes)
            .map_err(|e| ChainError::Signing(format!("invalid private key: {}", e)))
    }
}

impl std::fmt::Debug for EvmWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Last 20 bytes of keccak256 over the uncompressed public key (sans 0x04)
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development account #0
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_derivation() {
        let wallet = EvmWallet::from_private_key_hex(DEV_KEY).unwrap();
        assert_eq!(
            wallet.address().to_checksum(None),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );

        // prefix is optional
        let bare = EvmWallet::from_private_key_hex(&DEV_KEY[2..]).unwrap();
        assert_eq!(bare.address(), wallet.address());
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(EvmWallet::from_private_key_hex("0x1234").is_err());
        assert!(EvmWallet::from_private_key_hex("not hex").is_err());
        assert!(EvmWallet::from_private_key_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = EvmWallet::from_private_key_hex(DEV_KEY).unwrap();
        let printed = format!("{:?}", wallet);
        assert!(!printed.contains("ac0974bec"));
    }
}
