use std::result;

use openssl::{
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkey::{PKey, Private},
    rsa::Rsa,
    stack::Stack,
    x509::{extension::SubjectAlternativeName, X509NameBuilder, X509Req},
};
use thiserror::Error;

/// 用於描述建立 CSR（證書簽名請求）過程中可能發生的錯誤。
#[derive(Debug, Error)]
pub enum CsrError {
    #[error("Openssl error: {0}")]
    OpensslError(#[from] openssl::error::ErrorStack),
    #[error("No SAN entries")]
    NoSanEntries,
}

/// 為簡化錯誤處理定義 Result 類型
type Result<T> = result::Result<T, CsrError>;

/// 憑證本身的私鑰，與帳戶金鑰無關。
pub struct CertificateKey {
    pkey: PKey<Private>,
}

impl CertificateKey {
    /// 預設的 RSA 金鑰位數。
    pub const RSA_BITS: u32 = 2048;

    /// 產生 RSA-2048 私鑰。
    pub fn generate() -> Result<Self> {
        let rsa = Rsa::generate(Self::RSA_BITS)?;
        Ok(Self {
            pkey: PKey::from_rsa(rsa)?,
        })
    }

    /// 產生 P-256 私鑰。
    pub fn ec_p256() -> Result<Self> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        let ec_key = EcKey::generate(&group)?;
        Ok(Self {
            pkey: PKey::from_ec_key(ec_key)?,
        })
    }

    /// 由 PEM 讀取私鑰。
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Ok(Self {
            pkey: PKey::private_key_from_pem(pem)?,
        })
    }

    /// 以 PKCS#8 PEM 匯出私鑰。
    pub fn to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.pkey.private_key_to_pem_pkcs8()?)
    }

    pub fn pkey(&self) -> &PKey<Private> {
        &self.pkey
    }
}

impl std::fmt::Debug for CertificateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateKey")
            .field("id", &self.pkey.id())
            .field("bits", &self.pkey.bits())
            .finish()
    }
}

/// 表示一個 CSR 建構器，主要用於生成包含主體替代名稱 (SAN) 擴展的證書簽名請求。
///
/// # 範例
///
/// ```
/// # use acmekit::csr::{CertificateKey, Csr};
/// let key = CertificateKey::ec_p256().expect("金鑰生成失敗");
/// let csr = Csr::new()
///     .set_san("example.com")
///     .build(&key)
///     .expect("CSR 建立失敗");
/// assert!(!csr.to_der().unwrap().is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct Csr {
    san_entries: Vec<String>,
    common_name: Option<String>,
}

impl Csr {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新增一個 DNS 主體替代名稱 (SAN)。
    pub fn set_san(mut self, dns_name: &str) -> Self {
        self.san_entries.push(dns_name.to_string());
        self
    }

    /// 設定主體的 Common Name。未設定時主體為空，只依靠 SAN。
    pub fn subject_common_name(mut self, common_name: &str) -> Self {
        self.common_name = Some(common_name.to_string());
        self
    }

    /// 根據當前設定的 SAN 項目以及指定的金鑰構建 CSR。
    ///
    /// # 參數
    ///
    /// * `key` - 用於簽署 CSR 的私鑰，其公鑰會放入請求中。
    ///
    /// # 錯誤
    ///
    /// 未設定任何 SAN 時回傳 `CsrError::NoSanEntries`，OpenSSL 失敗時回傳 `CsrError::OpensslError`。
    pub fn build(self, key: &CertificateKey) -> Result<CertificateRequest> {
        if self.san_entries.is_empty() {
            return Err(CsrError::NoSanEntries);
        }

        let mut req_builder = X509Req::builder()?;

        if let Some(common_name) = &self.common_name {
            let mut name = X509NameBuilder::new()?;
            name.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
            req_builder.set_subject_name(&name.build())?;
        }

        let mut san_builder = SubjectAlternativeName::new();
        for entry in &self.san_entries {
            san_builder.dns(entry);
        }
        let san_extension = san_builder.build(&req_builder.x509v3_context(None))?;

        let mut stack = Stack::new()?;
        stack.push(san_extension)?;
        req_builder.add_extensions(&stack)?;

        req_builder.set_pubkey(&key.pkey)?;
        req_builder.sign(&key.pkey, MessageDigest::sha256())?;

        Ok(CertificateRequest(req_builder.build()))
    }
}

/// 已簽署的 CSR。
pub struct CertificateRequest(X509Req);

impl CertificateRequest {
    /// 送往 finalize 端點的 DER 編碼。
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.0.to_der()?)
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.0.to_pem()?)
    }

    pub fn inner(&self) -> &X509Req {
        &self.0
    }
}
