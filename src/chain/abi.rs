/// ABI glue between parsed signatures and alloy's dynamic ABI codec
use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{I256, U256};

use super::coerce::ArgValue;
use super::error::{ChainError, ChainResult};
use super::format::format_value;
use super::hash::keccak256;
use super::signature::{Param, ParamKind, Signature};

impl Param {
    /// Resolve this parameter into a concrete ABI type
    pub fn sol_type(&self) -> ChainResult<DynSolType> {
        match &self.kind {
            ParamKind::Scalar(tag) => DynSolType::parse(tag).map_err(ChainError::from),
            ParamKind::Tuple(components) => Ok(DynSolType::Tuple(component_types(components)?)),
            ParamKind::TupleArray(components) => Ok(DynSolType::Array(Box::new(
                DynSolType::Tuple(component_types(components)?),
            ))),
        }
    }
}

fn component_types(params: &[Param]) -> ChainResult<Vec<DynSolType>> {
    params.iter().map(Param::sol_type).collect()
}

/// Pair a coerced argument with its declared type
fn to_sol_value(ty: &DynSolType, arg: &ArgValue) -> ChainResult<DynSolValue> {
    let value = match (ty, arg) {
        (DynSolType::Uint(bits), ArgValue::Uint(v)) => {
            if v.bit_len() > *bits {
                return Err(out_of_range(ty, v));
            }
            DynSolValue::Uint(*v, *bits)
        }
        (DynSolType::Int(bits), ArgValue::Int(v)) => {
            if !int_fits(*v, *bits) {
                return Err(out_of_range(ty, v));
            }
            DynSolValue::Int(*v, *bits)
        }
        (DynSolType::Bool, ArgValue::Bool(b)) => DynSolValue::Bool(*b),
        (DynSolType::Address, ArgValue::Address(a)) => DynSolValue::Address(*a),
        (ty, ArgValue::Raw(text)) => ty.coerce_str(text)?,
        (ty, other) => {
            return Err(ChainError::Abi(format!(
                "argument {:?} does not fit type {}",
                other,
                ty.sol_type_name()
            )))
        }
    };
    Ok(value)
}

fn out_of_range(ty: &DynSolType, value: &impl std::fmt::Display) -> ChainError {
    ChainError::Abi(format!("{} does not fit in {}", value, ty.sol_type_name()))
}

/// Two's-complement range check: `[-2^(bits-1), 2^(bits-1) - 1]`
fn int_fits(value: I256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let magnitude = value.unsigned_abs();
    if value.is_negative() {
        (magnitude - U256::from(1u64)).bit_len() < bits
    } else {
        magnitude.bit_len() < bits
    }
}

/// ABI-encode the arguments of `sig` without a selector
pub fn encode_args(sig: &Signature, args: &[ArgValue]) -> ChainResult<Vec<u8>> {
    // Coercion drops trailing missing arguments; the encoder is where an
    // arity mismatch is rejected.
    if args.len() != sig.inputs.len() {
        return Err(ChainError::Abi(format!(
            "{} expects {} arguments, got {}",
            sig.name,
            sig.inputs.len(),
            args.len()
        )));
    }

    let values = sig
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| to_sol_value(&param.sol_type()?, arg))
        .collect::<ChainResult<Vec<_>>>()?;

    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Selector followed by the encoded arguments
pub fn encode_call(sig: &Signature, args: &[ArgValue]) -> ChainResult<Vec<u8>> {
    let selector = keccak256(sig.canonical()?.as_bytes());
    let mut data = selector[..4].to_vec();
    data.extend(encode_args(sig, args)?);
    Ok(data)
}

/// Decode return data against the declared outputs, one formatted value
/// per line. Falls back through progressively looser strategies and
/// finally to the raw hex, so a decode problem never fails a call.
pub fn decode_output(sig: &Signature, data: &[u8]) -> String {
    let raw = || format!("0x{}", hex::encode(data));

    if sig.outputs.is_empty() || data.is_empty() {
        return raw();
    }

    let outputs = match component_types(&sig.outputs) {
        Ok(types) => DynSolType::Tuple(types),
        Err(e) => {
            tracing::debug!("Unusable output types for {}: {}", sig.name, e);
            return raw();
        }
    };

    let decoded = decode_strict(&outputs, data).or_else(|| decode_lenient(&outputs, data));
    match decoded {
        Some(DynSolValue::Tuple(values)) => values
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => format_value(&other),
        None => raw(),
    }
}

/// Signature-based decode that also requires the data to be exactly the
/// canonical encoding of the result.
fn decode_strict(outputs: &DynSolType, data: &[u8]) -> Option<DynSolValue> {
    let value = outputs.abi_decode_params(data).ok()?;
    (value.abi_encode_params() == data).then_some(value)
}

/// Output-parameter decode that tolerates padding or trailing bytes
fn decode_lenient(outputs: &DynSolType, data: &[u8]) -> Option<DynSolValue> {
    outputs.abi_decode_sequence(data).ok()
}
