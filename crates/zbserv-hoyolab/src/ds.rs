//! Dynamic secret (`DS` header) generation.
//!
//! Format: `"{t},{r},{md5_hex("salt={SALT}&t={t}&r={r}")}"` where `t` is the
//! current unix time in seconds and `r` six random ASCII letters.

use rand::Rng;

/// Overseas web salt.
pub const DS_SALT: &str = "6s25p5ox5y14umn1p61aqyyvbvvl3lrt";

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const NONCE_LEN: usize = 6;

/// Generates a DS header value for the current time.
pub fn generate_ds() -> String {
    let mut rng = rand::rng();
    let nonce: String = (0..NONCE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..LETTERS.len());
            LETTERS.get(idx).copied().map(char::from).unwrap_or('a')
        })
        .collect();
    ds_with(chrono::Utc::now().timestamp(), &nonce)
}

/// Builds a DS value from an explicit timestamp and nonce.
pub fn ds_with(timestamp: i64, nonce: &str) -> String {
    let raw = format!("salt={DS_SALT}&t={timestamp}&r={nonce}");
    let hash = md5::compute(raw.as_bytes());
    format!("{timestamp},{nonce},{hash:x}")
}
