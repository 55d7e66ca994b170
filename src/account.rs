//! 模塊提供 ACME 帳戶的建立。
//!
//! 帳戶建立是唯一以 `jwk` 模式簽章的請求；成功後回應的 `Location`
//! 即為帳戶 URL，之後所有請求都以它作為 `kid`。

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    client::AcmeClient,
    error::Result,
    http::Operation,
    payload::NewAccountPayload,
    status::Status,
};

/// CA 回傳的帳戶資源。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// 帳戶 URL，取自 `Location` 標頭。
    #[serde(skip)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact: Vec<String>,
    #[serde(rename = "termsOfServiceAgreed", default, skip_serializing_if = "Option::is_none")]
    pub terms_of_service_agreed: Option<bool>,
    /// 帳戶的訂單清單 URL。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<String>,
}

impl AcmeClient {
    /// 建立新帳戶並記住其 URL。
    ///
    /// 載荷為 `{"termsOfServiceAgreed": true}`，若設定中有聯絡信箱則另加 `contact`。
    ///
    /// # 回傳
    ///
    /// 回傳帳戶資源，其 `url` 欄位即為之後請求使用的 `kid`。
    ///
    /// # 錯誤
    ///
    /// - 目錄尚未解析：[`AcmeError::DirectoryUnresolved`](crate::AcmeError::DirectoryUnresolved)。
    /// - 回應不是 HTTP 201（包含既有帳戶的 200）：`UnexpectedStatus`。
    /// - 回應缺少 `Location`：`MissingHeader`。
    ///
    /// 失敗時不會重試，客戶端維持沒有帳戶的狀態。
    pub fn create_account(&mut self) -> Result<Account> {
        let url = self.directory()?.new_account.clone();
        let payload = Self::encode_payload(&NewAccountPayload::new(&self.config().contact))?;

        let response = self
            .post_self_signed(&url, &payload)?
            .expect_status(Operation::NewAccount, StatusCode::CREATED)?;
        let account_url = response.require_location()?;

        let mut account: Account = if response.body.is_empty() {
            Account::default()
        } else {
            response.json()?
        };
        account.url = account_url.clone();

        tracing::info!(account_url = %account_url, "Created ACME account");
        self.set_account_url(account_url);
        Ok(account)
    }
}
