//! Instance token generation.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};

/// Instance token prefix.
pub const INSTANCE_TOKEN_PREFIX: &str = "sb";

/// Number of random bytes encoded in a token.
pub const INSTANCE_TOKEN_BYTES: usize = 32;

/// Generates a fresh opaque instance token, e.g. `sb_Zm9v...`.
#[must_use]
pub fn generate_instance_token() -> String {
    let mut bytes = [0_u8; INSTANCE_TOKEN_BYTES];

    OsRng.fill_bytes(&mut bytes);

    format!("{INSTANCE_TOKEN_PREFIX}_{}", URL_SAFE_NO_PAD.encode(bytes))
}
