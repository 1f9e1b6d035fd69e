pub mod abi;
pub mod coerce;
pub mod command;
pub mod error;
pub mod format;
pub mod hash;
pub mod interpreter;
pub mod rpc;
pub mod signature;
pub mod tx;
pub mod units;
pub mod wallet;

pub use coerce::{coerce_args, ArgValue};
pub use error::{ChainError, ChainResult};
pub use format::format_value;
pub use interpreter::{render, CastOutcome, ChainInterpreter};
pub use rpc::RpcClient;
pub use signature::{Param, ParamKind, Signature};
pub use wallet::{EvmWallet, TransactionSigner};
