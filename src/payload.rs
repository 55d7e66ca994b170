use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{base64::url_encode, jws::JwsPayload};

/// 載荷驗證失敗。
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid payload: {0}")]
pub struct PayloadError(pub String);

/// 定義所有 API 載荷（Payload）必須實作的功能。
///
/// 該 trait 要求實作者能夠序列化，並提供轉換成 JSON 字串與 JWS 載荷的功能，
/// 同時必須實作自定義的驗證邏輯。
pub trait PayloadT: Serialize {
    /// 將載荷轉換成不含空白的 JSON 字串。
    ///
    /// # 錯誤
    ///
    /// 若序列化失敗，則回傳 [`serde_json::Error`]。
    fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 將載荷包裝成 [`JwsPayload::Json`]。
    fn to_jws_payload(&self) -> Result<JwsPayload, serde_json::Error> {
        Ok(JwsPayload::Json(self.to_json_string()?))
    }

    /// 驗證載荷資料是否符合預期的規範。
    fn validate(&self) -> Result<(), PayloadError>;
}

/// 表示建立新帳號所需的載荷資料。
#[derive(Debug, Serialize, Deserialize)]
pub struct NewAccountPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    contact: Vec<String>,
    #[serde(rename = "termsOfServiceAgreed")]
    terms_of_service_agreed: bool,
}

impl NewAccountPayload {
    /// 建立一個已同意服務條款的 `NewAccountPayload`。
    ///
    /// 聯絡信箱會自動補足 `mailto:` 前綴，若已包含則不重複補充；
    /// 沒有聯絡資訊時 `contact` 欄位不會出現在 JSON 中。
    pub fn new(emails: &[String]) -> Self {
        let contact = emails
            .iter()
            .map(|email| {
                if email.starts_with("mailto:") {
                    email.clone()
                } else {
                    format!("mailto:{}", email)
                }
            })
            .collect();

        NewAccountPayload {
            contact,
            terms_of_service_agreed: true,
        }
    }
}

impl PayloadT for NewAccountPayload {
    /// 使用者必須同意服務條款。
    fn validate(&self) -> Result<(), PayloadError> {
        if !self.terms_of_service_agreed {
            return Err(PayloadError("Terms of service must be agreed".into()));
        }
        Ok(())
    }
}

/// 表示一個識別項，用來描述證書所涵蓋的主機名稱。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

impl Identifier {
    /// 類型固定為 `"dns"` 的識別項。
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            type_: "dns".to_string(),
            value: value.into(),
        }
    }
}

/// 表示建立新訂單時所需的載荷資料。
#[derive(Debug, Serialize, Deserialize)]
pub struct NewOrderPayload {
    pub identifiers: Vec<Identifier>,
    #[serde(rename = "notBefore", skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    #[serde(rename = "notAfter", skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,
}

impl NewOrderPayload {
    /// 為每個域名建立一個 `"dns"` 識別項。
    pub fn new<S: AsRef<str>>(domains: &[S]) -> Self {
        let identifiers = domains
            .iter()
            .map(|domain| Identifier::dns(domain.as_ref()))
            .collect();

        NewOrderPayload {
            identifiers,
            not_before: None,
            not_after: None,
        }
    }

    /// 設定憑證有效期間，以 RFC 3339 格式送出。
    pub fn with_validity(
        mut self,
        not_before: Option<DateTime<Utc>>,
        not_after: Option<DateTime<Utc>>,
    ) -> Self {
        self.not_before = not_before.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));
        self.not_after = not_after.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));
        self
    }
}

impl PayloadT for NewOrderPayload {
    /// 驗證新訂單載荷資料：
    ///
    /// - 必須至少包含一個識別項。
    /// - 所有識別項的類型必須為 `"dns"` 且值不得為空。
    fn validate(&self) -> Result<(), PayloadError> {
        if self.identifiers.is_empty() {
            return Err(PayloadError("At least one identifier is required".into()));
        }
        for identifier in &self.identifiers {
            if identifier.type_ != "dns" {
                return Err(PayloadError("Identifier type must be 'dns'".into()));
            }
            if identifier.value.trim().is_empty() {
                return Err(PayloadError("Identifier value cannot be empty".into()));
            }
        }
        Ok(())
    }
}

/// 表示挑戰驗證的載荷資料。
///
/// 送出 `{}`（而非空字串）代表「已準備好，請開始驗證」。
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ChallengeValidationPayload {}

impl ChallengeValidationPayload {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PayloadT for ChallengeValidationPayload {
    fn validate(&self) -> Result<(), PayloadError> {
        Ok(())
    }
}

/// 表示最終化訂單時所需的載荷資料，`csr` 為 DER 的 base64url 編碼。
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeOrderPayload {
    #[serde(rename = "csr")]
    csr_b64_str: String,
}

impl FinalizeOrderPayload {
    pub fn new(csr_der: &[u8]) -> Self {
        FinalizeOrderPayload {
            csr_b64_str: url_encode(csr_der),
        }
    }
}

impl PayloadT for FinalizeOrderPayload {
    fn validate(&self) -> Result<(), PayloadError> {
        if self.csr_b64_str.is_empty() {
            return Err(PayloadError("CSR cannot be empty".into()));
        }
        Ok(())
    }
}

/// 撤銷憑證的載荷：DER 憑證的 base64url 編碼與可選的 RFC 5280 撤銷原因碼。
#[derive(Debug, Serialize, Deserialize)]
pub struct RevocationPayload {
    certificate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<u8>,
}

impl RevocationPayload {
    pub fn new(certificate_der: &[u8], reason: Option<u8>) -> Self {
        Self {
            certificate: url_encode(certificate_der),
            reason,
        }
    }
}

impl PayloadT for RevocationPayload {
    /// 原因碼 7 在 RFC 5280 中未使用，有效範圍為 0–10。
    fn validate(&self) -> Result<(), PayloadError> {
        if self.certificate.is_empty() {
            return Err(PayloadError("Certificate cannot be empty".into()));
        }
        match self.reason {
            Some(7) | Some(11..) => Err(PayloadError(format!(
                "Invalid revocation reason: {}",
                self.reason.unwrap_or_default()
            ))),
            _ => Ok(()),
        }
    }
}
