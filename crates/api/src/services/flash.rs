//! One-shot flash messages carried in a cookie across a redirect.
//!
//! The message is JSON, base64url encoded so it fits a cookie value.

use axum::http::{header, HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use domain::services::FlashMessage;

pub const FLASH_COOKIE: &str = "flash";

/// Max-Age of the flash cookie. The page shown after the redirect consumes it.
const FLASH_MAX_AGE_SECS: i64 = 60;

/// Builds the Set-Cookie value carrying `message`.
pub fn build_flash_cookie(message: &FlashMessage) -> String {
    let json = serde_json::to_vec(message).unwrap_or_default();
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        FLASH_COOKIE,
        URL_SAFE_NO_PAD.encode(json),
        FLASH_MAX_AGE_SECS
    )
}

/// Builds the Set-Cookie value that clears the flash cookie.
pub fn build_clear_flash_cookie() -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", FLASH_COOKIE)
}

/// Appends the flash cookie to `headers`.
pub fn add_flash_cookie(headers: &mut HeaderMap, message: &FlashMessage) {
    if let Ok(value) = HeaderValue::from_str(&build_flash_cookie(message)) {
        headers.append(header::SET_COOKIE, value);
    }
}

/// Reads the pending flash message from the request cookies, if any.
pub fn read_flash(headers: &HeaderMap) -> Option<FlashMessage> {
    let raw = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == FLASH_COOKIE)
        .map(|(_, value)| value)?;

    let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
    serde_json::from_slice(&bytes).ok()
}
