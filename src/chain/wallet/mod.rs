mod keys;
mod signer;

pub use keys::{address_from_public_key, EvmWallet};
pub use signer::{TransactionSigner, TxSignature};
