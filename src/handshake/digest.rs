use crate::utils::{calculate_hmac_sha256, calculate_hmac_sha256_gap};

/// "Genuine Adobe Flash Player 001" + fixed 32-byte suffix
pub const CLIENT_FULL_KEY: [u8; 62] = [
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b', b'e', b' ', b'F',
    b'l', b'a', b's', b'h', b' ', b'P', b'l', b'a', b'y', b'e', b'r', b' ', b'0', b'0', b'1',
    0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E, 0x00, 0xD0, 0xD1, 0x02, 0x9E, 0x7E,
    0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB, 0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB,
    0x31, 0xAE,
];

/// "Genuine Adobe Flash Media Server 001" + fixed 32-byte suffix
pub const SERVER_FULL_KEY: [u8; 68] = [
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b', b'e', b' ', b'F',
    b'l', b'a', b's', b'h', b' ', b'M', b'e', b'd', b'i', b'a', b' ', b'S', b'e', b'r', b'v',
    b'e', b'r', b' ', b'0', b'0', b'1', 0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E,
    0x00, 0xD0, 0xD1, 0x02, 0x9E, 0x7E, 0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB,
    0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB, 0x31, 0xAE,
];

/// The ASCII prefix alone is the verification key on each side
pub fn client_partial_key() -> &'static [u8] {
    &CLIENT_FULL_KEY[..30]
}

pub fn server_partial_key() -> &'static [u8] {
    &SERVER_FULL_KEY[..36]
}

/// Digest position derived from the 4 scheme bytes at `base`:
/// `(sum % 728) + base + 4`
pub fn digest_position(block: &[u8], base: usize) -> usize {
    let sum: usize = block[base..base + 4].iter().map(|&b| b as usize).sum();
    (sum % 728) + base + 4
}

/// HMAC over the 1536-byte block with the 32-byte digest window skipped
pub fn make_digest(key: &[u8], block: &[u8], gap: Option<usize>) -> [u8; 32] {
    match gap {
        Some(gap) => calculate_hmac_sha256_gap(key, block, gap),
        None => calculate_hmac_sha256(key, block),
    }
}

/// Locate a valid digest under the scheme rooted at `base`. Returns its
/// position when the block verifies.
pub fn find_digest(block: &[u8], key: &[u8], base: usize) -> Option<usize> {
    let pos = digest_position(block, base);
    let digest = make_digest(key, block, Some(pos));
    if block[pos..pos + 32] == digest {
        Some(pos)
    } else {
        None
    }
}

/// Verify a peer challenge block under both scheme offsets (772 first,
/// then 8). On success, returns the response key: the located digest
/// re-keyed with our full key.
pub fn parse_challenge(block: &[u8], peer_key: &[u8], own_full_key: &[u8]) -> Option<[u8; 32]> {
    let pos = find_digest(block, peer_key, 772).or_else(|| find_digest(block, peer_key, 8))?;
    Some(make_digest(own_full_key, &block[pos..pos + 32], None))
}

/// Stamp a challenge digest into a block whose random body is already
/// filled: derive the position from the scheme bytes at offset 8 and
/// overwrite the 32-byte window
pub fn create_challenge(block: &mut [u8], key: &[u8]) {
    let gap = digest_position(block, 8);
    let digest = make_digest(key, block, Some(gap));
    block[gap..gap + 32].copy_from_slice(&digest);
}

/// Fill a response block: random bytes whose trailing 32 bytes are the
/// HMAC of the rest, keyed by the digest-derived key
pub fn create_response(block: &mut [u8], key: &[u8]) {
    let gap = block.len() - 32;
    let digest = make_digest(key, &block[..gap], None);
    block[gap..].copy_from_slice(&digest);
}
