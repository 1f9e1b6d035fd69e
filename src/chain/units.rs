/// Decimal unit conversion (`ether`, `gwei`, or an explicit decimals count)
use alloy_primitives::U256;

use super::error::{ChainError, ChainResult};

pub const ETHER_DECIMALS: u8 = 18;
pub const GWEI_DECIMALS: u8 = 9;

/// Map a unit name to its decimals; unknown text and a zero count fall
/// back to 18
pub fn unit_decimals(unit: Option<&str>) -> u8 {
    match unit {
        Some("ether") | None => ETHER_DECIMALS,
        Some("gwei") => GWEI_DECIMALS,
        Some(other) => leading_integer(other)
            .filter(|d| (1..=77).contains(d))
            .unwrap_or(ETHER_DECIMALS),
    }
}

/// Integer prefix of the text, e.g. `"6abc"` -> 6
fn leading_integer(text: &str) -> Option<u8> {
    let digits: String = text.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn pow10(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// `"1.5"` with 18 decimals -> 1500000000000000000. Excess fractional
/// digits are rounded half-up.
pub fn parse_units(amount: &str, decimals: u8) -> ChainResult<U256> {
    let invalid = || ChainError::invalid("amount", amount);
    let amount = amount.trim();

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if (whole.is_empty() && fraction.is_empty())
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let scale = decimals as usize;
    let (kept, dropped) = if fraction.len() > scale {
        fraction.split_at(scale)
    } else {
        (fraction, "")
    };

    let whole_value = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| invalid())?
    };
    let fraction_value = if kept.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{:0<width$}", kept, width = scale);
        U256::from_str_radix(&padded, 10).map_err(|_| invalid())?
    };

    let mut value = whole_value
        .checked_mul(pow10(decimals))
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(invalid)?;

    if dropped.chars().next().map_or(false, |c| c >= '5') {
        value = value.checked_add(U256::from(1u64)).ok_or_else(invalid)?;
    }
    Ok(value)
}

/// 1500000000000000000 with 18 decimals -> `"1.5"`; trailing zeros trimmed
pub fn format_units(value: U256, decimals: u8) -> String {
    let base = pow10(decimals);
    let whole = value / base;
    let fraction = value % base;

    if fraction.is_zero() {
        return whole.to_string();
    }
    let digits = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
