//! 此模組提供 JSON Web Signature (JWS) 信封的結構與建構。
//!
//! 建構分為兩種互斥模式：建立帳戶時在標頭中放入完整公鑰 (`jwk`)，
//! 其餘請求放入帳戶 URL (`kid`)。兩者共用同一套編碼與簽章流程。

use std::result;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    base64::{url_decode, url_encode, DecodeError},
    key_pair::AccountKey,
    nonce::Nonce,
    protection::ProtectedHeader,
    signature::{create_signature, signing_input, SignatureError},
};

/// 表示與 JWS 相關的錯誤。
#[derive(Error, Debug)]
pub enum JwsError {
    /// 當 Base64 解碼失敗時回傳此錯誤。
    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] DecodeError),
    /// 當 JSON 序列化或反序列化過程中發生錯誤時回傳此錯誤。
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    /// 簽章失敗。
    #[error("Signature error: {0}")]
    SignatureError(#[from] SignatureError),
}

type Result<T> = result::Result<T, JwsError>;

/// JWS 的邏輯載荷。
///
/// `Empty` 用於 POST-as-GET，編碼後為空字串；`Json` 則為已序列化的 JSON。
/// 兩者必須區分：空載荷對簽章輸入貢獻零位元組，而 `{}` 會貢獻 `e30`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwsPayload {
    Empty,
    Json(String),
}

impl JwsPayload {
    /// 將任意可序列化的值轉為 `Json` 載荷。
    pub fn json<T: Serialize>(value: &T) -> result::Result<Self, serde_json::Error> {
        Ok(Self::Json(serde_json::to_string(value)?))
    }

    /// base64url 編碼後的載荷。
    pub fn encode(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Json(json) => url_encode(json),
        }
    }
}

/// 表示一個 JSON Web Signature (JWS) 物件（flattened JSON serialization）。
///
/// 三個欄位皆為 base64url（無填充）字串。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Jws {
    /// 對應 JWS 中的 "protected" 欄位。
    #[serde(rename = "protected")]
    header: String,
    /// JWS 中的 payload 部分，POST-as-GET 時為空字串。
    payload: String,
    /// JWS 中的簽名部分。
    signature: String,
}

impl Jws {
    /// 以保護標頭與載荷建立並簽署一個 `Jws`。
    pub fn sign(header: &ProtectedHeader, payload: &JwsPayload, key: &AccountKey) -> Result<Self> {
        let header = header.to_base64()?;
        let payload = payload.encode();
        let signature = create_signature(&header, &payload, key)?;

        Ok(Jws {
            header,
            payload,
            signature,
        })
    }

    pub fn protected(&self) -> &str {
        &self.header
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// 簽章時使用的輸入字串。
    pub fn signing_input(&self) -> String {
        signing_input(&self.header, &self.payload)
    }

    /// 解碼並解析保護標頭。
    pub fn decode_header(&self) -> Result<ProtectedHeader> {
        Ok(serde_json::from_slice(&url_decode(&self.header)?)?)
    }

    /// 解碼載荷的原始位元組，POST-as-GET 時為空。
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        Ok(url_decode(&self.payload)?)
    }

    /// 將 `Jws` 實例序列化為 JSON 格式的字串，作為 HTTP 請求本文。
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 以帳戶金鑰建立 JWS 信封。
///
/// 每次建構都會消耗一個 [`Nonce`]；取不到 nonce 時呼叫端根本無法呼叫這裡，
/// 因此不會有未帶 nonce 的請求被送出。
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeBuilder<'a> {
    key: &'a AccountKey,
}

impl<'a> EnvelopeBuilder<'a> {
    pub fn new(key: &'a AccountKey) -> Self {
        Self { key }
    }

    /// 建立帶有完整公鑰的信封，只用於 newAccount。
    pub fn build_self_signed(&self, nonce: Nonce, url: &str, payload: &JwsPayload) -> Result<Jws> {
        let header = ProtectedHeader::with_jwk(nonce, url, self.key.jwk().clone());
        Jws::sign(&header, payload, self.key)
    }

    /// 建立帶有帳戶 URL 的信封，用於帳戶建立之後的所有請求。
    pub fn build_identified(
        &self,
        nonce: Nonce,
        url: &str,
        kid: &str,
        payload: &JwsPayload,
    ) -> Result<Jws> {
        let header = ProtectedHeader::with_kid(nonce, url, kid);
        Jws::sign(&header, payload, self.key)
    }
}
