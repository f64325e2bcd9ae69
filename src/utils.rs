//! Utility functions for request buffer parsing.

/// Splits a request buffer into whitespace-separated tokens.
///
/// Any run of ASCII whitespace (spaces, tabs, `\r`, `\n`) separates two
/// tokens; leading and trailing whitespace is ignored. Non-UTF-8 bytes are
/// replaced rather than rejected.
///
/// # Example
/// ```
/// use digest_cache::buffer_to_array;
///
/// let parts = buffer_to_array(b"get  key 100\r\n");
/// assert_eq!(parts, vec!["get", "key", "100"]);
/// ```
pub fn buffer_to_array(buf: &[u8]) -> Vec<String> {
    buf.split(|b| b.is_ascii_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| String::from_utf8_lossy(word).into_owned())
        .collect()
}

/// The bytes before the first newline, or `None` if there is no newline yet.
pub fn request_line(buf: &[u8]) -> Option<&[u8]> {
    buf.iter().position(|&b| b == b'\n').map(|end| &buf[..end])
}

/// Renders raw bytes as their numeric values, for diagnosing bad requests.
pub fn describe_bytes(buf: &[u8]) -> String {
    if buf.is_empty() {
        return "<empty>".to_string();
    }
    buf.iter()
        .map(|b| format!("[{}]", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `s` is a non-empty string of ASCII digits.
pub fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
