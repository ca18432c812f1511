use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Charset for verification codes: uppercase alphanumerics with 0/1/I/O
/// removed to avoid transcription ambiguity. 32 characters, so 8 samples
/// carry 40 bits of entropy.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Verification code length in characters.
pub const CODE_LENGTH: usize = 8;

const TOKEN_BYTES: usize = 32;

/// An opaque bearer secret together with the digest it is persisted under.
/// Deliberately not `Debug` — the token must never reach a log line.
pub struct MintedToken {
    pub token: String,
    pub hash: Vec<u8>,
}

/// Draw a fresh 32-byte secret. Returns the URL-safe base64 (no padding)
/// encoding and the SHA-256 digest of that encoding.
///
/// `rand::rng()` is a reseeding CSPRNG; an entropy failure aborts the
/// process rather than handing out predictable material.
pub fn mint_token() -> MintedToken {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut buf);
    let token = URL_SAFE_NO_PAD.encode(buf);
    let hash = hash_string(&token);
    MintedToken { token, hash }
}

/// Draw a verification code: eight independent uniform samples of the
/// alphabet. `random_range` rejection-samples, so there is no modulo bias.
pub fn mint_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// SHA-256 of the raw UTF-8 bytes. Used for both device ids and tokens.
pub fn hash_string(value: &str) -> Vec<u8> {
    Sha256::digest(value.as_bytes()).to_vec()
}

/// Constant-time digest comparison. Digest lengths are public, so the
/// length short-circuit leaks nothing.
pub fn hashes_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Canonicalize a submitted code: trim + uppercase, then require exactly
/// eight characters of the alphabet.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    if code.len() != CODE_LENGTH || !code.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
        return None;
    }
    Some(code)
}
