use hmac::{Hmac, Mac};
use rand::{rng, RngCore};
use sha1::{Digest, Sha1};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng().fill_bytes(&mut bytes);
    bytes
}

/// Calculate HMAC-SHA256
pub fn calculate_hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);

    let result = mac.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result.into_bytes());
    output
}

/// Calculate HMAC-SHA256 over the block with a 32-byte gap skipped. The
/// handshake digest covers everything except the digest field itself.
pub fn calculate_hmac_sha256_gap(key: &[u8], data: &[u8], gap: usize) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(&data[..gap]);
    mac.update(&data[gap + 32..]);

    let result = mac.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result.into_bytes());
    output
}

/// SHA-1 digest over a sequence of byte runs. Used only for codec
/// configuration equality, not as a security boundary.
pub fn sha1_digest<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> [u8; 20] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 20];
    output.copy_from_slice(&hasher.finalize());
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes_length() {
        let bytes = generate_random_bytes(32);
        assert_eq!(bytes.len(), 32);
    }

    #[test]
    fn test_random_bytes_uniqueness() {
        let bytes1 = generate_random_bytes(32);
        let bytes2 = generate_random_bytes(32);
        // Very unlikely to be equal
        assert_ne!(bytes1, bytes2);
    }

    #[test]
    fn test_hmac_sha256() {
        let key = b"key";
        let data = b"The quick brown fox jumps over the lazy dog";
        let hmac = calculate_hmac_sha256(key, data);

        // Known test vector
        let expected = [
            0xf7, 0xbc, 0x83, 0xf4, 0x30, 0x53, 0x84, 0x24, 0xb1, 0x32, 0x98, 0xe6, 0xaa, 0x6f,
            0xb1, 0x43, 0xef, 0x4d, 0x59, 0xa1, 0x49, 0x46, 0x17, 0x59, 0x97, 0x47, 0x9d, 0xbc,
            0x2d, 0x1a, 0x3c, 0xd8,
        ];

        assert_eq!(hmac, expected);
    }

    #[test]
    fn test_hmac_gap_skips_digest_field() {
        let mut block = vec![0u8; 100];
        for (i, b) in block.iter_mut().enumerate() {
            *b = i as u8;
        }
        let gap = 16;
        let with_gap = calculate_hmac_sha256_gap(b"key", &block, gap);

        // Overwriting the skipped window must not change the digest
        block[gap..gap + 32].fill(0xFF);
        assert_eq!(calculate_hmac_sha256_gap(b"key", &block, gap), with_gap);
    }

    #[test]
    fn test_sha1_digest() {
        // SHA-1("abc")
        let expected = [
            0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
            0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
        ];
        assert_eq!(sha1_digest([b"abc".as_slice()]), expected);
        // Split input digests the same
        assert_eq!(sha1_digest([b"ab".as_slice(), b"c".as_slice()]), expected);
    }
}
