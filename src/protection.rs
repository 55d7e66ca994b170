use serde::{Deserialize, Serialize};

use crate::{base64::url_encode, jwk::Jwk, key_pair::AccountKey, nonce::Nonce};

/// 保護標頭中用來識別簽章金鑰的方式。
///
/// 協定規定 `jwk` 與 `kid` 互斥，以列舉表示即可保證兩者恰好出現一個。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyBinding {
    /// 完整公鑰，只用於建立帳戶。
    Jwk(Jwk),
    /// 帳戶 URL，用於其餘所有簽章請求。
    Kid(String),
}

/// 表示數字簽章保護頭部的資料結構，
/// 此結構體可序列化為 JSON，並可轉換為 base64url 編碼字串。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    /// 簽章演算法，固定為 `ES256`
    alg: String,
    /// 用於防止重放攻擊的隨機數
    nonce: String,
    /// 請求目標 URL
    url: String,
    /// `jwk` 或 `kid` 二擇一
    #[serde(flatten)]
    binding: KeyBinding,
}

impl ProtectedHeader {
    /// 建立帶有完整公鑰 (`jwk`) 的標頭，會消耗傳入的 nonce。
    pub fn with_jwk(nonce: Nonce, url: impl Into<String>, jwk: Jwk) -> Self {
        Self::new(nonce, url, KeyBinding::Jwk(jwk))
    }

    /// 建立帶有帳戶 URL (`kid`) 的標頭，會消耗傳入的 nonce。
    pub fn with_kid(nonce: Nonce, url: impl Into<String>, kid: impl Into<String>) -> Self {
        Self::new(nonce, url, KeyBinding::Kid(kid.into()))
    }

    fn new(nonce: Nonce, url: impl Into<String>, binding: KeyBinding) -> Self {
        Self {
            alg: AccountKey::ALG.to_string(),
            nonce: nonce.into_inner(),
            url: url.into(),
            binding,
        }
    }

    pub fn alg(&self) -> &str {
        &self.alg
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn binding(&self) -> &KeyBinding {
        &self.binding
    }

    /// 將 [`ProtectedHeader`] 序列化為不含空白的 JSON 後以 base64url 編碼。
    ///
    /// # Errors
    ///
    /// 如果序列化過程中發生錯誤，將返回 [`serde_json::Error`]。
    pub fn to_base64(&self) -> Result<String, serde_json::Error> {
        Ok(url_encode(serde_json::to_string(self)?))
    }
}

impl std::fmt::Display for ProtectedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        serde_json::to_string(self)
            .map_err(|_| std::fmt::Error)
            .and_then(|s| write!(f, "{}", s))
    }
}
