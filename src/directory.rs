use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    http::{HttpClient, Operation},
};

/// 表示與目錄相關的 API 結構，包含與帳號、nonce、訂單、續期資訊及撤銷憑證相關的 URL。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Directory {
    /// 用於新帳號註冊的 API 路徑。
    #[serde(rename = "newAccount")]
    pub new_account: String,
    /// 用於取得新的 nonce 值的 API 路徑。
    #[serde(rename = "newNonce")]
    pub new_nonce: String,
    /// 用於訂單相關操作的 API 路徑。
    #[serde(rename = "newOrder")]
    pub new_order: String,
    /// 用於撤銷憑證的 API 路徑。
    #[serde(rename = "revokeCert")]
    pub revoke_cert: String,
    /// 用於更換帳戶金鑰的 API 路徑，可能不存在。
    #[serde(rename = "keyChange", skip_serializing_if = "Option::is_none")]
    pub key_change: Option<String>,
    /// 預先授權的 API 路徑，多數 CA 不提供。
    #[serde(rename = "newAuthz", skip_serializing_if = "Option::is_none")]
    pub new_authz: Option<String>,
    /// 用於取得續期資訊的 API 路徑，可能不存在。
    #[serde(rename = "renewalInfo", skip_serializing_if = "Option::is_none")]
    pub renewal_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DirectoryMeta>,
}

/// 目錄中的 `meta` 物件。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DirectoryMeta {
    #[serde(rename = "termsOfService", skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(rename = "caaIdentities", default, skip_serializing_if = "Vec::is_empty")]
    pub caa_identities: Vec<String>,
    #[serde(rename = "externalAccountRequired", default)]
    pub external_account_required: bool,
}

impl Directory {
    /// 向 CA 的根 URL 發送一次 GET 以取得目錄。
    ///
    /// 只接受 HTTP 200，且四個必要端點都必須存在，否則回傳錯誤。
    pub fn fetch(http: &HttpClient, url: &str) -> Result<Self> {
        let response = http
            .get(url)?
            .expect_status(Operation::Directory, StatusCode::OK)?;
        let directory: Directory = response.json()?;

        tracing::info!(
            url,
            new_nonce = %directory.new_nonce,
            new_account = %directory.new_account,
            new_order = %directory.new_order,
            revoke_cert = %directory.revoke_cert,
            "Resolved ACME directory"
        );
        Ok(directory)
    }
}
