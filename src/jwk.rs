use openssl::sha::sha256;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::base64::url_encode;

/// JWK 相關操作的錯誤類型。
#[derive(Debug, Error)]
pub enum JwkError {
    /// 序列化錯誤。
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// JSON Web Key (JWK) 的封裝，目前僅支援 P-256 橢圓曲線公鑰。
///
/// 序列化後的形式即為放入 JWS `jwk` 欄位的內容：
/// `{"kty":"EC","crv":"P-256","x":"...","y":"..."}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    /// 橢圓曲線格式的 JWK。
    #[serde(rename = "EC")]
    Ec(EcJwk),
}

/// 橢圓曲線 JWK 的公開參數，座標皆為固定寬度大端整數的 base64url 編碼。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcJwk {
    crv: String,
    x: String,
    y: String,
}

impl EcJwk {
    /// 曲線名稱，例如 `P-256`。
    pub fn crv(&self) -> &str {
        &self.crv
    }

    /// base64url 編碼的 X 座標。
    pub fn x(&self) -> &str {
        &self.x
    }

    /// base64url 編碼的 Y 座標。
    pub fn y(&self) -> &str {
        &self.y
    }

    /// 產生 RFC 7638 規定的正規 JSON：僅含必要欄位、依字典序排列且不含空白。
    pub fn to_acme_json(&self) -> Result<String, JwkError> {
        let mut map = Map::new();
        map.insert("crv".to_string(), Value::String(self.crv.clone()));
        map.insert("kty".to_string(), Value::String("EC".to_string()));
        map.insert("x".to_string(), Value::String(self.x.clone()));
        map.insert("y".to_string(), Value::String(self.y.clone()));

        serde_json::to_string(&Value::Object(map)).map_err(JwkError::from)
    }
}

impl Jwk {
    /// 由 P-256 公鑰的原始座標建立 JWK。
    ///
    /// # 參數
    ///
    /// * `x` - 32 位元組大端 X 座標。
    /// * `y` - 32 位元組大端 Y 座標。
    pub fn p256(x: &[u8], y: &[u8]) -> Self {
        Jwk::Ec(EcJwk {
            crv: "P-256".to_string(),
            x: url_encode(x),
            y: url_encode(y),
        })
    }

    /// 將 JWK 序列化為 JSON 格式字串。
    pub fn to_json(&self) -> Result<String, JwkError> {
        serde_json::to_string(self).map_err(JwkError::from)
    }

    /// 將 JWK 轉換為計算 thumbprint 用的正規 JSON。
    pub fn to_acme_json(&self) -> Result<String, JwkError> {
        match self {
            Jwk::Ec(jwk) => jwk.to_acme_json(),
        }
    }

    /// 計算 JWK thumbprint：`base64url(SHA-256(正規 JSON))`。
    pub fn thumbprint(&self) -> Result<String, JwkError> {
        let digest = sha256(self.to_acme_json()?.as_bytes());
        Ok(url_encode(digest))
    }
}
