//! 客戶端與簽發流程的設定。

use std::time::Duration;


use crate::{challenge::ChallengeScheme, poll::PollPolicy};

/// 常見 CA 的目錄 URL。
pub mod directories {
    /// Let's Encrypt 正式環境。
    pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";

    /// Let's Encrypt 測試環境。
    pub const LETS_ENCRYPT_STAGING: &str =
        "https://acme-staging-v02.api.letsencrypt.org/directory";

    /// 本機 Pebble 測試 CA 的預設目錄。
    pub const PEBBLE: &str = "https://localhost:14000/dir";
}

/// [`crate::AcmeClient`] 的設定。
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// ACME 目錄 URL。
    pub directory_url: String,
    /// 建立帳戶時附上的聯絡信箱，可為空。
    pub contact: Vec<String>,
    /// 每個請求都會帶上的 User-Agent。
    pub user_agent: String,
    /// 單一 HTTP 請求的逾時。
    pub request_timeout: Duration,
    /// 輪詢訂單狀態的策略。
    pub poll: PollPolicy,
}

impl ClientConfig {
    /// 預設的 User-Agent。
    pub const DEFAULT_USER_AGENT: &'static str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
    /// 預設的請求逾時。
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// 以目錄 URL 建立設定，其餘欄位使用預設值。
    pub fn new(directory_url: impl Into<String>) -> Self {
        Self {
            directory_url: directory_url.into(),
            contact: Vec::new(),
            user_agent: Self::DEFAULT_USER_AGENT.to_string(),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            poll: PollPolicy::default(),
        }
    }

    /// Let's Encrypt 正式環境的設定。
    pub fn lets_encrypt_production() -> Self {
        Self::new(directories::LETS_ENCRYPT_PRODUCTION)
    }

    /// Let's Encrypt 測試環境的設定。
    pub fn lets_encrypt_staging() -> Self {
        Self::new(directories::LETS_ENCRYPT_STAGING)
    }

    /// 新增一個聯絡信箱。
    pub fn contact(mut self, email: &str) -> Self {
        self.contact.push(email.to_string());
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::lets_encrypt_staging()
    }
}

/// 一次完整簽發流程的設定，見 [`crate::issuance::Issuance`]。
#[derive(Debug, Clone)]
pub struct IssuanceConfig {
    /// 憑證涵蓋的域名，第一個同時作為 CSR 的 Common Name。
    pub domains: Vec<String>,
    /// 使用的挑戰類型。
    pub scheme: ChallengeScheme,
    /// 若設定，訂單會帶上 `notBefore = 現在`、`notAfter = 現在 + validity_days` 天。
    /// 範圍在簽發開始時檢查。
    pub validity_days: Option<i64>,
    /// 取得憑證後立即撤銷。
    pub revoke: bool,
}

impl IssuanceConfig {
    pub fn new<S: AsRef<str>>(domains: &[S], scheme: ChallengeScheme) -> Self {
        Self {
            domains: domains.iter().map(|d| d.as_ref().to_string()).collect(),
            scheme,
            validity_days: None,
            revoke: false,
        }
    }

    /// 設定訂單的有效期間（天）。
    pub fn validity_days(mut self, days: i64) -> Self {
        self.validity_days = Some(days);
        self
    }

    pub fn revoke(mut self, revoke: bool) -> Self {
        self.revoke = revoke;
        self
    }
}
