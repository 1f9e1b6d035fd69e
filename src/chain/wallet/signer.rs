use alloy_primitives::U256;
use secp256k1::{Message, Secp256k1, SecretKey};

use crate::chain::error::{ChainError, ChainResult};
use crate::chain::hash::keccak256;
use crate::chain::tx::Eip1559Tx;

/// Recoverable ECDSA signature in the (y_parity, r, s) form typed
/// transactions carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSignature {
    pub y_parity: u8,
    pub r: U256,
    pub s: U256,
}

/// Signs EIP-1559 transactions with secp256k1
pub struct TransactionSigner {
    secp: Secp256k1<secp256k1::All>,
}

impl TransactionSigner {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Sign a pre-hashed 32-byte digest
    pub fn sign_digest(&self, digest: &[u8; 32], private_key: &SecretKey) -> ChainResult<TxSignature> {
        let message = Message::from_digest_slice(digest)
            .map_err(|e| ChainError::Signing(e.to_string()))?;

        let recoverable_sig = self.secp.sign_ecdsa_recoverable(&message, private_key);
        let (recovery_id, compact) = recoverable_sig.serialize_compact();

        // Typed transactions only carry the parity bit
        Ok(TxSignature {
            y_parity: (recovery_id.to_i32() % 2) as u8,
            r: U256::from_be_slice(&compact[..32]),
            s: U256::from_be_slice(&compact[32..]),
        })
    }

    /// Sign a transaction and return the raw bytes for broadcast
    pub fn sign_transaction(&self, tx: &Eip1559Tx, private_key: &SecretKey) -> ChainResult<Vec<u8>> {
        let digest = keccak256(&tx.signing_payload());
        let sig = self.sign_digest(&digest, private_key)?;
        Ok(tx.encode_signed(sig.y_parity, sig.r, sig.s))
    }
}

impl Default for TransactionSigner {
    fn default() -> Self {
        Self::new()
    }
}
