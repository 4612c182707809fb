//! Signature verification for forward requests.
//!
//! Recovers the secp256k1 signer of a typed-data digest and compares it to
//! the claimed signer without branching on the position of the first
//! differing byte.

use alloy_primitives::{Address, Signature, B256};
use subtle::ConstantTimeEq;

/// Expected signature length: `r (32) ‖ s (32) ‖ v (1)`.
pub const SIGNATURE_LENGTH: usize = 65;

/// Recover the signer address of `digest`, or `None` if the signature is
/// malformed or carries an invalid recovery id.
pub fn recover_signer(digest: &B256, signature: &[u8]) -> Option<Address> {
    if signature.len() != SIGNATURE_LENGTH {
        return None;
    }

    // Accept v in {0, 1, 27, 28}; anything else is not a recovery id.
    match signature[64] {
        0 | 1 | 27 | 28 => {}
        _ => return None,
    }

    let parsed = Signature::from_raw(signature).ok()?;
    parsed.recover_address_from_prehash(digest).ok()
}

/// Check that `signature` over `digest` was produced by `claimed_signer`.
///
/// Never errors: malformed input and mismatches both return `false`.
pub fn verify(digest: &B256, signature: &[u8], claimed_signer: &Address) -> bool {
    let Some(recovered) = recover_signer(digest, signature) else {
        return false;
    };

    recovered
        .as_slice()
        .ct_eq(claimed_signer.as_slice())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use std::str::FromStr;

    // Test private key (DO NOT USE IN PRODUCTION)
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn signed(digest: &B256) -> Vec<u8> {
        let signer = PrivateKeySigner::from_str(TEST_PRIVATE_KEY).unwrap();
        signer.sign_hash_sync(digest).unwrap().as_bytes().to_vec()
    }

    #[test]
    fn test_verify_valid_signature() {
        let digest = keccak256(b"forward request");
        let signature = signed(&digest);
        let signer: Address = TEST_ADDRESS.parse().unwrap();

        assert!(verify(&digest, &signature, &signer));
        assert_eq!(recover_signer(&digest, &signature), Some(signer));
    }

    #[test]
    fn test_verify_is_case_insensitive_on_claimed_address() {
        let digest = keccak256(b"forward request");
        let signature = signed(&digest);
        let lower: Address = TEST_ADDRESS.to_lowercase().parse().unwrap();

        assert!(verify(&digest, &signature, &lower));
    }

    #[test]
    fn test_verify_wrong_signer() {
        let digest = keccak256(b"forward request");
        let signature = signed(&digest);

        assert!(!verify(&digest, &signature, &Address::repeat_byte(0xaa)));
    }

    #[test]
    fn test_verify_wrong_digest() {
        let digest = keccak256(b"forward request");
        let other = keccak256(b"another request");
        let signature = signed(&digest);
        let signer: Address = TEST_ADDRESS.parse().unwrap();

        assert!(!verify(&other, &signature, &signer));
    }

    #[test]
    fn test_verify_accepts_zero_one_recovery_id() {
        let digest = keccak256(b"forward request");
        let mut signature = signed(&digest);
        signature[64] -= 27;
        let signer: Address = TEST_ADDRESS.parse().unwrap();

        assert!(verify(&digest, &signature, &signer));
    }

    #[test]
    fn test_verify_malformed_signatures_return_false() {
        let digest = keccak256(b"forward request");
        let signer: Address = TEST_ADDRESS.parse().unwrap();
        let good = signed(&digest);

        assert!(!verify(&digest, &[], &signer));
        assert!(!verify(&digest, &good[..64], &signer));
        assert!(!verify(&digest, &[good.clone(), vec![0]].concat(), &signer));

        let mut bad_v = good.clone();
        bad_v[64] = 35;
        assert!(!verify(&digest, &bad_v, &signer));

        let zeros = vec![0u8; SIGNATURE_LENGTH];
        assert!(!verify(&digest, &zeros, &signer));
    }
}
