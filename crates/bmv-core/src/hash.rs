use tiny_keccak::{Hasher, Sha3};

/// Compute the SHA3-256 hash of data.
///
/// Every hash on the source chain (block headers, validator lists, vote
/// messages, trie nodes, accumulator peaks) is SHA3-256, not keccak256.
pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// Hash the concatenation of two byte strings without an intermediate buffer.
pub fn sha3_256_concat(left: &[u8], right: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3::v256();
    let mut output = [0u8; 32];
    hasher.update(left);
    hasher.update(right);
    hasher.finalize(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_sha3_256_empty() {
        assert_eq!(
            sha3_256(&[]),
            hex!("a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a")
        );
    }

    #[test]
    fn test_sha3_256_abc() {
        assert_eq!(
            sha3_256(b"abc"),
            hex!("3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532")
        );
    }

    #[test]
    fn test_concat_matches_single_buffer() {
        let a = [0x11u8; 32];
        let b = [0x22u8; 32];
        let mut joined = a.to_vec();
        joined.extend_from_slice(&b);
        assert_eq!(sha3_256_concat(&a, &b), sha3_256(&joined));
    }
}
