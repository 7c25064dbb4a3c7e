/// Content address of a byte sequence: prefixed blake3 hex digest.
pub fn derive_cid(bytes: &[u8]) -> String {
    format!("b3-{}", blake3::hash(bytes).to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_is_stable_and_distinct() {
        assert_eq!(derive_cid(b"chunk"), derive_cid(b"chunk"));
        assert_ne!(derive_cid(b"chunk"), derive_cid(b"chunk2"));
        assert!(derive_cid(b"chunk").starts_with("b3-"));
        assert_eq!(derive_cid(b"chunk").len(), 3 + 64);
    }
}
