//! ACME 所使用的 base64url 編碼（RFC 4648 §5，不含填充）。

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

pub use base64::DecodeError;

/// 將任意位元組以 URL 安全、無填充的 Base64 編碼。
///
/// JWS 的 `protected`、`payload`、`signature` 以及 JWK 座標都使用此格式。
pub fn url_encode<T: AsRef<[u8]>>(input: T) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// 解碼 URL 安全、無填充的 Base64 字串。
///
/// # 錯誤
///
/// 字串包含非法字元或長度不合法時回傳 [`DecodeError`]。
pub fn url_decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(input)
}
