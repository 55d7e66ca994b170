use std::error::Error;

use crate::{base64::url_encode, key_pair::AccountKey};

/// 定義簽名操作可能遇到的錯誤類型。
#[derive(Debug)]
pub enum SignatureError {
    /// 簽名過程中發生錯誤，附帶錯誤訊息。
    SigningError(String),
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SignatureError::SigningError(msg) => write!(f, "Signing error: {}", msg),
        }
    }
}

impl Error for SignatureError {}

/// 組出 JWS 的簽章輸入：`{protected}.{payload}`。
///
/// 當 payload 為空字串（POST-as-GET）時，結果以 `.` 結尾且不含任何 payload 位元組。
pub fn signing_input(header_b64: &str, payload_b64: &str) -> String {
    format!("{}.{}", header_b64, payload_b64)
}

/// 根據已編碼的 header 與 payload 產生 ES256 簽名。
///
/// # 參數
///
/// - `header_b64`: 已進行 base64url 編碼的保護標頭。
/// - `payload_b64`: 已進行 base64url 編碼的負載，可為空字串。
/// - `key`: 帳戶金鑰。
///
/// # 回傳
///
/// 成功時回傳 base64url 編碼的簽名；失敗時回傳 `SignatureError`。
pub fn create_signature(
    header_b64: &str,
    payload_b64: &str,
    key: &AccountKey,
) -> Result<String, SignatureError> {
    let input = signing_input(header_b64, payload_b64);
    let signature = key
        .sign(input.as_bytes())
        .map_err(|e| SignatureError::SigningError(e.to_string()))?;

    Ok(url_encode(signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_signing_input() {
        assert_eq!(signing_input("eyJhIjoxfQ", ""), "eyJhIjoxfQ.");
        assert_ne!(
            signing_input("eyJhIjoxfQ", ""),
            signing_input("eyJhIjoxfQ", &url_encode("{}"))
        );
    }

    #[test]
    fn test_signature_is_64_bytes_encoded() {
        let key = AccountKey::generate().unwrap();
        let signature = create_signature("aGVhZGVy", "", &key).unwrap();

        assert_eq!(crate::base64::url_decode(&signature).unwrap().len(), 64);
    }
}
