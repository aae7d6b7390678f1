//! Delivery token derivation
//!
//! Produces the short-lived opaque token embedded in delivered payloads and
//! surfaced in the `X-Script-Token` header. The token is a rolling 32-bit
//! hash over `scriptId:timestamp:secret`, rendered base-36. Changing the
//! one-second time bucket changes the token, which makes caching a dumped
//! payload unreliable.
//!
//! This is obfuscation, not authentication: the token carries no
//! confidentiality or integrity guarantee and is never an input to the
//! authorization decision.

/// Generate a delivery token for a script at a given second-granularity
/// timestamp.
///
/// Deterministic for identical inputs. The hash recurrence is
/// `h = (h << 5) - h + unit` over UTF-16 code units with 32-bit wrapping,
/// kept bit-for-bit stable so that independently deployed instances agree
/// on token values.
pub fn generate_token(script_id: &str, timestamp_secs: i64, secret: &str) -> String {
    let data = format!("{}:{}:{}", script_id, timestamp_secs, secret);

    let mut hash: i32 = 0;
    for unit in data.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }

    to_base36((hash as i64).unsigned_abs())
}

/// Render a non-negative integer in lowercase base-36
fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();

    // Digits are ASCII by construction
    String::from_utf8(out).unwrap_or_default()
}
