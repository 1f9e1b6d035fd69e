use alloy_dyn_abi::DynSolValue;

/// Render a decoded ABI value as text.
///
/// Integers print in decimal, arrays as `[a, b]`, tuples as `(x, y)`,
/// addresses checksummed and byte strings as 0x hex.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Uint(v, _) => v.to_string(),
        DynSolValue::Int(v, _) => v.to_string(),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Bytes(b) => format!("0x{}", hex::encode(b)),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..*size])),
        DynSolValue::Function(f) => format!("0x{}", hex::encode(f.as_slice())),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            format!("[{}]", join(items))
        }
        DynSolValue::Tuple(fields) => format!("({})", join(fields)),
        #[allow(unreachable_patterns)]
        other => format!("{:?}", other),
    }
}

fn join(values: &[DynSolValue]) -> String {
    values.iter().map(format_value).collect::<Vec<_>>().join(", ")
}
