//! 挑戰協作者的記憶體內實作。
//!
//! 簽發流程把記錄寫入這裡，周邊的 DNS 或 HTTP 服務再從這裡讀取並回應 CA 的查詢。
//! 兩者都可在執行緒之間共用。

use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, RwLock},
};

use crate::challenge::{DnsZone, HttpChallengeRegistry, ProvisionError};

/// HTTP-01 的固定路徑前綴。
pub const WELL_KNOWN_PREFIX: &str = "/.well-known/acme-challenge/";

/// DNS 名稱一律以小寫、不含結尾句點的形式保存。
fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// 記憶體內的 DNS 區域，保存 TXT 與 A 記錄。
///
/// 同一名稱可有多筆 TXT 記錄（例如同時驗證 `example.org` 與 `*.example.org`）。
#[derive(Debug, Default, Clone)]
pub struct MemoryZone {
    txt: Arc<RwLock<HashMap<String, Vec<String>>>>,
    a: Arc<RwLock<HashMap<String, Vec<IpAddr>>>>,
}

impl MemoryZone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn txt_records(&self, name: &str) -> Vec<String> {
        let records = self.txt.read().unwrap_or_else(|e| e.into_inner());
        records.get(&normalize(name)).cloned().unwrap_or_default()
    }

    pub fn a_records(&self, domain: &str) -> Vec<IpAddr> {
        let records = self.a.read().unwrap_or_else(|e| e.into_inner());
        records.get(&normalize(domain)).cloned().unwrap_or_default()
    }

    /// 清除某名稱下的所有 TXT 記錄。
    pub fn clear_txt(&self, name: &str) {
        let mut records = self.txt.write().unwrap_or_else(|e| e.into_inner());
        records.remove(&normalize(name));
    }
}

impl DnsZone for MemoryZone {
    fn add_txt(&self, name: &str, value: &str) -> Result<(), ProvisionError> {
        let name = normalize(name);
        if name.is_empty() {
            return Err(ProvisionError::InvalidRecord("empty TXT name".into()));
        }

        let mut records = self.txt.write().unwrap_or_else(|e| e.into_inner());
        let values = records.entry(name).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
        Ok(())
    }

    fn add_a(&self, domain: &str, ip: IpAddr) -> Result<(), ProvisionError> {
        let domain = normalize(domain);
        if domain.is_empty() {
            return Err(ProvisionError::InvalidRecord("empty A record name".into()));
        }

        let mut records = self.a.write().unwrap_or_else(|e| e.into_inner());
        let ips = records.entry(domain).or_default();
        if !ips.contains(&ip) {
            ips.push(ip);
        }
        Ok(())
    }
}

/// token 到 key authorization 的對照表，供 HTTP-01 服務查詢。
#[derive(Debug, Default, Clone)]
pub struct HttpChallengeTokens {
    tokens: Arc<RwLock<HashMap<String, String>>>,
}

impl HttpChallengeTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, token: &str) -> Option<String> {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        tokens.get(token).cloned()
    }

    /// 以請求路徑查詢，路徑必須是 `/.well-known/acme-challenge/<token>`。
    pub fn lookup_path(&self, path: &str) -> Option<String> {
        path.strip_prefix(WELL_KNOWN_PREFIX)
            .and_then(|token| self.lookup(token))
    }

    pub fn remove(&self, token: &str) -> Option<String> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.remove(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 某 token 對應的 HTTP 路徑。
pub fn well_known_path(token: &str) -> String {
    format!("{}{}", WELL_KNOWN_PREFIX, token)
}

impl HttpChallengeRegistry for HttpChallengeTokens {
    /// token 只允許 base64url 字元，避免被當成路徑的一部分。
    fn register(&self, token: &str, key_authorization: &str) -> Result<(), ProvisionError> {
        let valid = !token.is_empty()
            && token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(ProvisionError::InvalidRecord(format!(
                "invalid token: {:?}",
                token
            )));
        }

        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.insert(token.to_string(), key_authorization.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{net::Ipv4Addr, thread};

    #[test]
    fn test_txt_records_are_normalized_and_deduplicated() {
        let zone = MemoryZone::new();
        zone.add_txt("_acme-challenge.Example.org.", "v1").unwrap();
        zone.add_txt("_acme-challenge.example.org", "v1").unwrap();
        zone.add_txt("_acme-challenge.example.org", "v2").unwrap();

        assert_eq!(zone.txt_records("_acme-challenge.example.org"), vec!["v1", "v2"]);

        zone.clear_txt("_acme-challenge.example.org");
        assert!(zone.txt_records("_acme-challenge.example.org").is_empty());
    }

    #[test]
    fn test_a_records() {
        let zone = MemoryZone::new();
        let ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
        zone.add_a("example.org", ip).unwrap();
        zone.add_a("example.org", ip).unwrap();

        assert_eq!(zone.a_records("EXAMPLE.org"), vec![ip]);
        assert!(zone.add_a("", ip).is_err());
    }

    #[test]
    fn test_zone_shared_across_threads() {
        let zone = MemoryZone::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let zone = zone.clone();
                thread::spawn(move || zone.add_txt("_acme-challenge.a.test", &format!("v{}", i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(zone.txt_records("_acme-challenge.a.test").len(), 4);
    }

    #[test]
    fn test_http_tokens() {
        let tokens = HttpChallengeTokens::new();
        tokens.register("abc_DEF-1", "abc_DEF-1.thumb").unwrap();

        assert_eq!(well_known_path("abc_DEF-1"), "/.well-known/acme-challenge/abc_DEF-1");
        assert_eq!(
            tokens.lookup_path("/.well-known/acme-challenge/abc_DEF-1").as_deref(),
            Some("abc_DEF-1.thumb")
        );
        assert!(tokens.lookup_path("/abc_DEF-1").is_none());
        assert_eq!(tokens.len(), 1);

        assert_eq!(tokens.remove("abc_DEF-1").as_deref(), Some("abc_DEF-1.thumb"));
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_rejects_path_like_token() {
        let tokens = HttpChallengeTokens::new();
        assert!(matches!(
            tokens.register("../etc/passwd", "x"),
            Err(ProvisionError::InvalidRecord(_))
        ));
        assert!(tokens.register("", "x").is_err());
    }
}
