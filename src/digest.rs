//! Content digest of request text.

use md5::{Digest, Md5};

/// Length of a digest string.
pub const DIGEST_LEN: usize = 32;

/// Lowercase hexadecimal MD5 of `text`.
pub fn digest(text: &str) -> String {
    hex::encode(Md5::digest(text.as_bytes()))
}
