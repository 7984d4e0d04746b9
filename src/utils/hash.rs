use sha3::{Digest, Keccak256};

/// Keccak-256 digest of an upload, used to correlate log lines for one image
/// without logging its contents.
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(data);

    let hash_result = hasher.finalize();
    let hash_hex = hex::encode(hash_result);

    format!("0x{}", hash_hex)
}

/// Shortened form for log lines.
pub fn short_fingerprint(data: &[u8]) -> String {
    let full = fingerprint(data);
    full[..14].to_string()
}
