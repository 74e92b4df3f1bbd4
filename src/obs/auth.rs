//! obs-websocket authentication challenge.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest as _, Sha256};

/// Computes the `Identify` authentication string for a `Hello` challenge:
/// `base64(sha256(base64(sha256(password + salt)) + challenge))`.
pub fn challenge_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{password}{salt}")));
    STANDARD.encode(Sha256::digest(format!("{secret}{challenge}")))
}
