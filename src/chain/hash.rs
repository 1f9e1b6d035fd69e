use tiny_keccak::{Hasher, Keccak};

/// Keccak-256 digest of arbitrary bytes
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut hash);
    hash
}

/// 0x-prefixed keccak-256 of UTF-8 text
pub fn keccak_hex(text: &str) -> String {
    format!("0x{}", hex::encode(keccak256(text.as_bytes())))
}

/// 4-byte function selector for a textual signature, e.g. `0xa9059cbb`
pub fn selector_hex(signature: &str) -> String {
    format!("0x{}", hex::encode(&keccak256(signature.as_bytes())[..4]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            keccak_hex(""),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_known_selectors() {
        assert_eq!(selector_hex("transfer(address,uint256)"), "0xa9059cbb");
        assert_eq!(selector_hex("balanceOf(address)"), "0x70a08231");
    }
}
