/// Converts raw textual arguments into typed values according to the
/// parameter list of a parsed signature.

use alloy_primitives::{Address, I256, U256};
use std::str::FromStr;

use super::error::{ChainError, ChainResult};
use super::signature::{Param, ParamKind};

/// A coerced argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Uint(U256),
    Int(I256),
    Bool(bool),
    Address(Address),
    /// Passed through unchanged for the ABI layer to interpret
    Raw(String),
}

/// Coerce positionally; stops as soon as either list runs out
pub fn coerce_args(inputs: &[Param], raw: &[String]) -> ChainResult<Vec<ArgValue>> {
    inputs
        .iter()
        .zip(raw.iter())
        .map(|(param, text)| coerce_one(&param.kind, text))
        .collect()
}

fn coerce_one(kind: &ParamKind, text: &str) -> ChainResult<ArgValue> {
    let tag = match kind {
        ParamKind::Scalar(tag) => tag.as_str(),
        // Tuples are not coerced element-wise
        _ => return Ok(ArgValue::Raw(text.to_string())),
    };

    if is_integer_type(tag) {
        return if tag.starts_with('u') {
            parse_uint(text).map(ArgValue::Uint)
        } else {
            parse_int(text).map(ArgValue::Int)
        };
    }

    match tag {
        "bool" => Ok(ArgValue::Bool(text == "true")),
        "address" => parse_address(text).map(ArgValue::Address),
        _ => Ok(ArgValue::Raw(text.to_string())),
    }
}

/// Matches `uint`, `int`, `uint8` ... `int256`
pub fn is_integer_type(tag: &str) -> bool {
    let rest = tag.strip_prefix('u').unwrap_or(tag);
    match rest.strip_prefix("int") {
        Some(bits) => bits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Arbitrary-precision unsigned parse from decimal (or 0x hex) text
pub fn parse_uint(text: &str) -> ChainResult<U256> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('-') {
        return Err(ChainError::invalid("uint", text));
    }
    U256::from_str(text).map_err(|_| ChainError::invalid("uint", text))
}

pub fn parse_int(text: &str) -> ChainResult<I256> {
    let text = text.trim();
    let (negative, magnitude) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = if magnitude.starts_with("0x") || magnitude.starts_with("0X") {
        I256::from_hex_str(magnitude)
    } else {
        I256::from_dec_str(magnitude)
    }
    .map_err(|_| ChainError::invalid("int", text))?;

    if negative {
        parsed.checked_neg().ok_or_else(|| ChainError::invalid("int", text))
    } else {
        Ok(parsed)
    }
}

/// Validate and normalize an address. Mixed-case input must carry a valid
/// EIP-55 checksum; all-lower or all-upper input is accepted as-is.
pub fn parse_address(text: &str) -> ChainResult<Address> {
    let invalid = || ChainError::AddressFormat(text.to_string());

    let body = text.strip_prefix("0x").ok_or_else(invalid)?;
    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(text, None).map_err(|_| invalid())
    } else {
        Address::from_str(text).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::signature::Signature;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_integer_type_detection() {
        assert!(is_integer_type("uint"));
        assert!(is_integer_type("uint256"));
        assert!(is_integer_type("int8"));
        assert!(!is_integer_type("uint256[]"));
        assert!(!is_integer_type("bytes32"));
        assert!(!is_integer_type("address"));
    }

    #[test]
    fn test_coerce_mixed_arguments() {
        let sig = Signature::parse("f(uint256,int64,bool,address,string)").unwrap();
        let values = coerce_args(
            &sig.inputs,
            &args(&[
                "115792089237316195423570985008687907853269984665640564039457584007913129639935",
                "-42",
                "yes",
                "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
                "hello",
            ]),
        )
        .unwrap();

        assert_eq!(values[0], ArgValue::Uint(U256::MAX));
        assert_eq!(values[1], ArgValue::Int(I256::from_dec_str("-42").unwrap()));
        // anything other than the literal "true" is false
        assert_eq!(values[2], ArgValue::Bool(false));
        assert!(matches!(values[3], ArgValue::Address(_)));
        assert_eq!(values[4], ArgValue::Raw("hello".to_string()));
    }

    #[test]
    fn test_missing_arguments_are_dropped() {
        let sig = Signature::parse("f(uint256,bool,address)").unwrap();
        let values = coerce_args(&sig.inputs, &args(&["7"])).unwrap();
        assert_eq!(values, vec![ArgValue::Uint(U256::from(7u64))]);
    }

    #[test]
    fn test_address_checksum_validation() {
        let good = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
        let addr = parse_address(good).unwrap();
        assert_eq!(addr.to_checksum(None), good);

        // flip the case of one letter to break the checksum
        let bad = "0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
        assert!(matches!(parse_address(bad), Err(ChainError::AddressFormat(_))));

        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("f39fd6e51aad88f6f4ce6ab8827279cfffb92266").is_err());
    }

    #[test]
    fn test_hex_integers_accepted() {
        assert_eq!(parse_uint("0xff").unwrap(), U256::from(255u64));
        assert!(parse_uint("-1").is_err());
        assert!(parse_uint("abc").is_err());
    }
}
