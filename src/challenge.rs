//! 挑戰（Challenge）與授權（Authorization）資源，以及把挑戰交給外部協作者佈建的分派器。
//!
//! 本模組只負責計算 key authorization 並呼叫對應的協作者；
//! 實際的 DNS 或 HTTP 服務由呼叫端提供，見 [`crate::provision`]。

use std::{fmt, net::IpAddr, str::FromStr, sync::Arc};

use openssl::sha::sha256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    base64::url_encode,
    error::{AcmeError, Problem, Result},
    jwk::{Jwk, JwkError},
    payload::Identifier,
    poll::Pollable,
    status::Status,
};

/// DNS-01 TXT 記錄名稱的前綴。
pub const DNS_CHALLENGE_PREFIX: &str = "_acme-challenge";

/// 外部協作者佈建挑戰時的錯誤。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// 記錄內容不合法，例如空白名稱或含有非法字元的 token。
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    /// 後端服務拒絕或無法寫入。
    #[error("Backend failure: {0}")]
    Backend(String),
}

/// 支援的挑戰類型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeScheme {
    Dns01,
    Http01,
}

impl ChallengeScheme {
    /// 授權回應中 `type` 欄位的值。
    pub fn challenge_type(&self) -> &'static str {
        match self {
            Self::Dns01 => "dns-01",
            Self::Http01 => "http-01",
        }
    }
}

impl fmt::Display for ChallengeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.challenge_type())
    }
}

impl FromStr for ChallengeScheme {
    type Err = AcmeError;

    /// 接受 `dns01`/`http01` 以及協定中的 `dns-01`/`http-01`，大小寫不敏感。
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dns01" | "dns-01" => Ok(Self::Dns01),
            "http01" | "http-01" => Ok(Self::Http01),
            other => Err(AcmeError::InvalidInput(format!(
                "Unsupported challenge scheme: {}",
                other
            ))),
        }
    }
}

/// 授權中的單一挑戰。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// 例如 `dns-01`、`http-01`、`tls-alpn-01`；未知類型照原字串保留。
    #[serde(rename = "type")]
    pub challenge_type: String,
    pub url: String,
    /// 部分 CA 對非 token 型挑戰不提供此欄位。
    #[serde(default)]
    pub token: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated: Option<String>,
    /// 驗證失敗時 CA 附上的原因。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Problem>,
}

impl Challenge {
    pub fn matches(&self, scheme: ChallengeScheme) -> bool {
        self.challenge_type == scheme.challenge_type()
    }
}

impl Pollable for Challenge {
    fn status(&self) -> Status {
        self.status
    }
}

/// 授權資源：一個識別項與 CA 提供的挑戰清單。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub identifier: Identifier,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    #[serde(default)]
    pub wildcard: bool,
}

impl Authorization {
    /// 第一個符合 `scheme` 的挑戰。
    pub fn find_challenge(&self, scheme: ChallengeScheme) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.matches(scheme))
    }
}

impl Pollable for Authorization {
    fn status(&self) -> Status {
        self.status
    }
}

/// 計算 key authorization：`token || "." || thumbprint(jwk)`。
pub fn key_authorization(token: &str, jwk: &Jwk) -> std::result::Result<String, JwkError> {
    Ok(format!("{}.{}", token, jwk.thumbprint()?))
}

/// DNS-01 的 TXT 記錄值：`base64url(SHA-256(key_authorization))`。
pub fn dns_txt_value(key_authorization: &str) -> String {
    url_encode(sha256(key_authorization.as_bytes()))
}

/// DNS-01 的 TXT 記錄名稱，萬用字元前綴會被去除。
pub fn dns_record_name(domain: &str) -> String {
    format!(
        "{}.{}",
        DNS_CHALLENGE_PREFIX,
        domain.trim_start_matches("*.")
    )
}

/// 可寫入 DNS 記錄的區域。
///
/// 簽發流程只會呼叫 [`add_txt`](Self::add_txt)；`add_a` 供周邊的 DNS 服務使用。
pub trait DnsZone: Send + Sync {
    fn add_txt(&self, name: &str, value: &str) -> std::result::Result<(), ProvisionError>;

    fn add_a(&self, domain: &str, ip: IpAddr) -> std::result::Result<(), ProvisionError>;
}

/// 回應 `/.well-known/acme-challenge/<token>` 的 HTTP 服務。
pub trait HttpChallengeRegistry: Send + Sync {
    fn register(&self, token: &str, key_authorization: &str)
        -> std::result::Result<(), ProvisionError>;
}

/// 依挑戰類型把 key authorization 交給對應的協作者。
///
/// 兩種協作者都是可選的；要求未設定的類型時回傳 [`AcmeError::ProvisionerMissing`]。
#[derive(Clone, Default)]
pub struct ChallengeDispatcher {
    dns: Option<Arc<dyn DnsZone>>,
    http: Option<Arc<dyn HttpChallengeRegistry>>,
}

impl ChallengeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dns_zone(mut self, zone: Arc<dyn DnsZone>) -> Self {
        self.dns = Some(zone);
        self
    }

    pub fn with_http_registry(mut self, registry: Arc<dyn HttpChallengeRegistry>) -> Self {
        self.http = Some(registry);
        self
    }

    pub fn supports(&self, scheme: ChallengeScheme) -> bool {
        match scheme {
            ChallengeScheme::Dns01 => self.dns.is_some(),
            ChallengeScheme::Http01 => self.http.is_some(),
        }
    }

    /// 佈建一個挑戰，不做任何等待或輪詢。
    ///
    /// # 參數
    ///
    /// - `scheme`: 挑戰類型。
    /// - `domain`: 授權的識別項值。
    /// - `token`: 挑戰的 token。
    /// - `key_authorization`: 已計算好的 key authorization。
    ///
    /// # 錯誤
    ///
    /// 協作者未設定時回傳 [`AcmeError::ProvisionerMissing`]，協作者失敗時回傳
    /// [`AcmeError::Provision`]。
    pub fn provision(
        &self,
        scheme: ChallengeScheme,
        domain: &str,
        token: &str,
        key_authorization: &str,
    ) -> Result<()> {
        match scheme {
            ChallengeScheme::Dns01 => {
                let zone = self
                    .dns
                    .as_ref()
                    .ok_or(AcmeError::ProvisionerMissing(scheme))?;
                let name = dns_record_name(domain);
                zone.add_txt(&name, &dns_txt_value(key_authorization))?;
                tracing::info!(%name, "Provisioned DNS-01 TXT record");
            }
            ChallengeScheme::Http01 => {
                let registry = self
                    .http
                    .as_ref()
                    .ok_or(AcmeError::ProvisionerMissing(scheme))?;
                registry.register(token, key_authorization)?;
                tracing::info!(domain, token, "Registered HTTP-01 token");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ChallengeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeDispatcher")
            .field("dns", &self.dns.is_some())
            .field("http", &self.http.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        key_pair::AccountKey,
        provision::{HttpChallengeTokens, MemoryZone},
    };

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("dns01".parse::<ChallengeScheme>().unwrap(), ChallengeScheme::Dns01);
        assert_eq!("HTTP-01".parse::<ChallengeScheme>().unwrap(), ChallengeScheme::Http01);
        assert!(matches!(
            "tls-alpn-01".parse::<ChallengeScheme>(),
            Err(AcmeError::InvalidInput(_))
        ));
        assert_eq!(ChallengeScheme::Dns01.to_string(), "dns-01");
    }

    #[test]
    fn test_key_authorization_uses_thumbprint() {
        let key = AccountKey::generate().unwrap();
        let key_auth = key_authorization("tok123", key.jwk()).unwrap();

        assert_eq!(key_auth, format!("tok123.{}", key.thumbprint().unwrap()));
    }

    #[test]
    fn test_dns_txt_value() {
        assert_eq!(
            dns_txt_value("abc"),
            "ungWv48Bz-pBQUDeXa4iI7ADYaOWF3qctBD_YfIAFa0"
        );
        assert_eq!(dns_txt_value("abc").len(), 43);
    }

    #[test]
    fn test_record_name_strips_wildcard() {
        assert_eq!(dns_record_name("example.org"), "_acme-challenge.example.org");
        assert_eq!(dns_record_name("*.example.org"), "_acme-challenge.example.org");
    }

    #[test]
    fn test_parse_authorization() {
        let json = r#"{
            "identifier": {"type": "dns", "value": "example.org"},
            "status": "pending",
            "expires": "2030-01-01T00:00:00Z",
            "challenges": [
                {"type": "http-01", "url": "https://ca/chall/1", "token": "t1", "status": "pending"},
                {"type": "dns-01", "url": "https://ca/chall/2", "token": "t2", "status": "pending"},
                {"type": "tls-alpn-01", "url": "https://ca/chall/3", "token": "t3", "status": "pending"}
            ]
        }"#;
        let authz: Authorization = serde_json::from_str(json).unwrap();

        assert_eq!(authz.status, Status::Pending);
        assert!(!authz.wildcard);
        assert_eq!(authz.find_challenge(ChallengeScheme::Dns01).unwrap().token, "t2");
        assert_eq!(
            authz.find_challenge(ChallengeScheme::Http01).unwrap().url,
            "https://ca/chall/1"
        );
    }

    #[test]
    fn test_failed_challenge_carries_problem() {
        let json = r#"{"type":"dns-01","url":"u","token":"t","status":"invalid",
            "error":{"type":"urn:ietf:params:acme:error:dns","detail":"NXDOMAIN"}}"#;
        let challenge: Challenge = serde_json::from_str(json).unwrap();

        assert_eq!(challenge.status, Status::Invalid);
        assert_eq!(challenge.error.unwrap().detail.as_deref(), Some("NXDOMAIN"));
    }

    #[test]
    fn test_dispatch_dns01_adds_txt_record() {
        let zone = Arc::new(MemoryZone::new());
        let dispatcher = ChallengeDispatcher::new().with_dns_zone(zone.clone());

        dispatcher
            .provision(ChallengeScheme::Dns01, "example.org", "tok", "tok.thumb")
            .unwrap();

        assert_eq!(
            zone.txt_records("_acme-challenge.example.org"),
            vec![dns_txt_value("tok.thumb")]
        );
    }

    #[test]
    fn test_dispatch_http01_registers_token() {
        let tokens = Arc::new(HttpChallengeTokens::new());
        let dispatcher = ChallengeDispatcher::new().with_http_registry(tokens.clone());

        dispatcher
            .provision(ChallengeScheme::Http01, "example.org", "tok", "tok.thumb")
            .unwrap();

        assert_eq!(tokens.lookup("tok").as_deref(), Some("tok.thumb"));
    }

    #[test]
    fn test_dispatch_without_collaborator() {
        let dispatcher = ChallengeDispatcher::new();

        let err = dispatcher
            .provision(ChallengeScheme::Http01, "example.org", "tok", "tok.thumb")
            .unwrap_err();
        assert!(matches!(
            err,
            AcmeError::ProvisionerMissing(ChallengeScheme::Http01)
        ));
        assert!(!dispatcher.supports(ChallengeScheme::Dns01));
    }

    #[test]
    fn test_collaborator_failure_surfaces() {
        struct Broken;

        impl DnsZone for Broken {
            fn add_txt(&self, _: &str, _: &str) -> std::result::Result<(), ProvisionError> {
                Err(ProvisionError::Backend("zone is read-only".into()))
            }

            fn add_a(&self, _: &str, _: IpAddr) -> std::result::Result<(), ProvisionError> {
                Ok(())
            }
        }

        let dispatcher = ChallengeDispatcher::new().with_dns_zone(Arc::new(Broken));
        let err = dispatcher
            .provision(ChallengeScheme::Dns01, "example.org", "tok", "ka")
            .unwrap_err();

        assert!(matches!(
            err,
            AcmeError::Provision(ProvisionError::Backend(_))
        ));
    }
}
