use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Random bytes behind each magic link token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Random bytes behind a survey's public link slug
pub const LINK_SLUG_BYTES: usize = 16;

/// Fresh URL-safe token drawn from the OS CSPRNG
pub fn generate_token() -> String {
    random_url_safe(TOKEN_BYTES)
}

pub fn generate_link_slug() -> String {
    random_url_safe(LINK_SLUG_BYTES)
}

fn random_url_safe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Short stable identifier for a token, safe to write to logs
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)[..12].to_string()
}

/// Cheap shape check before touching storage
pub fn looks_like_token(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 128
        && candidate.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
