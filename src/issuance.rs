//! 從目錄到憑證的完整簽發流程。

use std::{fs, io::Write, path::Path};

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    certificate::Certificate,
    challenge::Challenge,
    client::AcmeClient,
    config::IssuanceConfig,
    csr::{CertificateKey, Csr},
    error::{AcmeError, Result},
};

/// 簽發結果：憑證私鑰與 PEM 憑證鏈。
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub private_key_pem: Vec<u8>,
    pub certificate_pem: Vec<u8>,
}

impl IssuedCertificate {
    /// 寫入憑證與私鑰。在 unix 上私鑰檔權限為 0600。
    pub fn write_pem(&self, certificate_path: &Path, key_path: &Path) -> Result<()> {
        fs::write(certificate_path, &self.certificate_pem)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options.open(key_path)?.write_all(&self.private_key_pem)?;

        tracing::info!(
            certificate = %certificate_path.display(),
            key = %key_path.display(),
            "Wrote certificate files"
        );
        Ok(())
    }
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("private_key_pem", &"<redacted>")
            .field("certificate_pem_bytes", &self.certificate_pem.len())
            .finish()
    }
}

/// 依序執行一次完整簽發。
///
/// 流程在第一個錯誤時中止，不會清理已建立的帳戶、訂單或 DNS 記錄。
#[derive(Debug, Clone)]
pub struct Issuance {
    config: IssuanceConfig,
}

impl Issuance {
    pub fn new(config: IssuanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IssuanceConfig {
        &self.config
    }

    /// 以 `client` 執行簽發。
    ///
    /// # 回傳
    ///
    /// 成功時回傳新產生的憑證私鑰與下載到的憑證鏈。若設定了 `revoke`，
    /// 回傳的憑證已被撤銷。
    pub fn run(&self, client: &mut AcmeClient) -> Result<IssuedCertificate> {
        self.execute(client).inspect_err(|e| {
            tracing::warn!(error = %e, domains = ?self.config.domains, "Issuance aborted");
        })
    }

    fn execute(&self, client: &mut AcmeClient) -> Result<IssuedCertificate> {
        let domains = &self.config.domains;
        let common_name = domains
            .first()
            .ok_or_else(|| AcmeError::InvalidInput("At least one domain is required".into()))?;

        let (not_before, not_after) = match self.config.validity_days {
            Some(days) => {
                let (now, until) = validity_window(days)?;
                (Some(now), Some(until))
            }
            None => (None, None),
        };

        client.get_directory()?;
        client.create_account()?;

        let order = client.issue_certificate(domains.as_slice(), not_before, not_after)?;

        let challenges = order
            .authorizations
            .iter()
            .map(|url| client.authorize_certificate(url, self.config.scheme))
            .collect::<Result<Vec<Challenge>>>()?;
        for challenge in &challenges {
            client.validate_certificate(&challenge.url)?;
        }

        let key = CertificateKey::generate()?;
        let csr = domains
            .iter()
            .fold(Csr::new().subject_common_name(common_name), |csr, domain| {
                csr.set_san(domain)
            })
            .build(&key)?;

        let certificate_url = client.finalize(&order.url, &order.finalize, &csr.to_der()?)?;
        let certificate_pem = client.download(&certificate_url)?;

        if self.config.revoke {
            let certificate = Certificate::from_pem(&certificate_pem)?;
            client.revoke(&certificate.to_der()?, None)?;
        }

        tracing::info!(domains = ?domains, "Issuance completed");
        Ok(IssuedCertificate {
            private_key_pem: key.to_pem()?,
            certificate_pem,
        })
    }
}

/// 從現在起算 `days` 天的有效期間。
fn validity_window(days: i64) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let now = Utc::now();
    TimeDelta::try_days(days)
        .filter(|validity| *validity > TimeDelta::zero())
        .and_then(|validity| now.checked_add_signed(validity))
        .map(|until| (now, until))
        .ok_or_else(|| AcmeError::InvalidInput(format!("Validity of {days} days is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{challenge::ChallengeScheme, config::ClientConfig};
    use tempfile::tempdir;

    #[test]
    fn test_write_pem() {
        let dir = tempdir().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        let issued = IssuedCertificate {
            private_key_pem: b"KEY".to_vec(),
            certificate_pem: b"CERT".to_vec(),
        };

        issued.write_pem(&cert_path, &key_path).unwrap();

        assert_eq!(fs::read(&cert_path).unwrap(), b"CERT");
        assert_eq!(fs::read(&key_path).unwrap(), b"KEY");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let issued = IssuedCertificate {
            private_key_pem: b"SECRET".to_vec(),
            certificate_pem: Vec::new(),
        };
        assert!(!format!("{:?}", issued).contains("SECRET"));
    }

    #[test]
    fn test_empty_domains_rejected_before_network() {
        let empty: [&str; 0] = [];
        let issuance = Issuance::new(IssuanceConfig::new(&empty, ChallengeScheme::Dns01));
        let mut client = AcmeClient::new(ClientConfig::new("http://127.0.0.1:9/dir")).unwrap();

        assert!(matches!(
            issuance.run(&mut client),
            Err(AcmeError::InvalidInput(_))
        ));
        assert!(client.directory().is_err());
    }

    #[test]
    fn test_validity_window() {
        let (now, until) = validity_window(90).unwrap();
        assert_eq!(until - now, TimeDelta::days(90));

        assert!(matches!(validity_window(0), Err(AcmeError::InvalidInput(_))));
        assert!(matches!(validity_window(-1), Err(AcmeError::InvalidInput(_))));
        assert!(matches!(
            validity_window(i64::MAX / 1000),
            Err(AcmeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_out_of_range_validity_rejected_before_network() {
        let issuance = Issuance::new(
            IssuanceConfig::new(&["example.org"], ChallengeScheme::Dns01)
                .validity_days(i64::MAX / 1000),
        );
        let mut client = AcmeClient::new(ClientConfig::new("http://127.0.0.1:9/dir")).unwrap();

        assert!(matches!(
            issuance.run(&mut client),
            Err(AcmeError::InvalidInput(_))
        ));
        assert!(client.directory().is_err());
    }
}
