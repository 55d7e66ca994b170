use chrono::{DateTime, Utc};
use openssl::{asn1::Asn1Time, x509::X509};
use thiserror::Error;

/// 證書相關操作可能出現的錯誤類型
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Failed to parse certificate: {0}")]
    ParseError(#[from] openssl::error::ErrorStack),
    #[error("PEM data contains no certificate")]
    Empty,
    #[error("Invalid expiration timestamp")]
    InvalidTimestamp,
}

/// 自定義結果型別，錯誤類型為 `CertificateError`
type Result<T> = std::result::Result<T, CertificateError>;

/// X.509 證書封裝結構，提供撤銷所需的 DER 編碼與基本的續約檢查
pub struct Certificate {
    cert: X509,
    chain_len: usize,
}

impl Certificate {
    /// 解析 PEM 憑證鏈並保留第一張（leaf）證書。
    ///
    /// # 參數
    ///
    /// - `pem`: CA 回傳的 `application/pem-certificate-chain` 內容
    ///
    /// # 回傳
    ///
    /// 回傳封裝了 leaf 證書的 `Certificate`；內容中沒有任何證書時回傳
    /// `CertificateError::Empty`
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let chain = X509::stack_from_pem(pem)?;
        let chain_len = chain.len();
        let cert = chain.into_iter().next().ok_or(CertificateError::Empty)?;
        Ok(Certificate { cert, chain_len })
    }

    /// DER 編碼的 leaf 證書，用於撤銷請求。
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.cert.to_der()?)
    }

    /// 鏈中證書的數量（含 leaf）。
    pub fn chain_len(&self) -> usize {
        self.chain_len
    }

    pub fn x509(&self) -> &X509 {
        &self.cert
    }

    /// 證書的到期時間。
    pub fn not_after(&self) -> Result<DateTime<Utc>> {
        let epoch = Asn1Time::from_unix(0)?;
        let diff = epoch.diff(self.cert.not_after())?;
        let seconds = diff.days as i64 * 86400 + diff.secs as i64;
        DateTime::from_timestamp(seconds, 0).ok_or(CertificateError::InvalidTimestamp)
    }

    /// 判斷證書是否應該進行續約
    ///
    /// # 參數
    ///
    /// - `threshold_days`: 續約閾值（以天為單位）
    ///
    /// # 回傳
    ///
    /// 剩餘有效時間不超過閾值（或已過期）時回傳 `true`
    pub fn should_renew(&self, threshold_days: u32) -> Result<bool> {
        let remaining = self.not_after()? - Utc::now();
        let threshold_seconds = threshold_days as i64 * 86400;

        tracing::debug!(
            remaining_seconds = remaining.num_seconds(),
            threshold_seconds,
            "Checked certificate expiry"
        );

        Ok(remaining.num_seconds() <= threshold_seconds)
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.cert.subject_name())
            .field("not_after", &self.cert.not_after().to_string())
            .field("chain_len", &self.chain_len)
            .finish()
    }
}

/// 測試用的自簽證書。
#[cfg(test)]
pub(crate) fn self_signed_pem(common_name: &str, days: u32) -> Vec<u8> {
    use openssl::{
        bn::BigNum,
        hash::MessageDigest,
        nid::Nid,
        x509::{X509Builder, X509NameBuilder},
    };

    let key = crate::csr::CertificateKey::ec_p256().unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key.pkey()).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(days).unwrap())
        .unwrap();
    builder.sign(key.pkey(), MessageDigest::sha256()).unwrap();
    builder.build().to_pem().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_of_chain() {
        let mut chain = self_signed_pem("leaf.example.org", 90);
        chain.extend(self_signed_pem("issuer.example.org", 365));

        let cert = Certificate::from_pem(&chain).unwrap();
        assert_eq!(cert.chain_len(), 2);

        let leaf = X509::from_der(&cert.to_der().unwrap()).unwrap();
        let cn = leaf
            .subject_name()
            .entries_by_nid(openssl::nid::Nid::COMMONNAME)
            .next()
            .unwrap()
            .data()
            .as_utf8()
            .unwrap()
            .to_string();
        assert_eq!(cn, "leaf.example.org");
    }

    #[test]
    fn test_empty_pem() {
        assert!(Certificate::from_pem(b"").is_err());
    }

    #[test]
    fn test_not_after_and_renewal() {
        let cert = Certificate::from_pem(&self_signed_pem("example.org", 90)).unwrap();

        let days_left = (cert.not_after().unwrap() - Utc::now()).num_days();
        assert!((88..=90).contains(&days_left));

        assert!(!cert.should_renew(30).unwrap());
        assert!(cert.should_renew(91).unwrap());
    }
}
