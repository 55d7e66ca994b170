use std::fmt;

use openssl::{
    bn::{BigNum, BigNumContext},
    ec::{EcGroup, EcKey},
    ecdsa::EcdsaSig,
    error::ErrorStack,
    nid::Nid,
    pkey::{PKey, Private},
    sha::sha256,
};
use thiserror::Error;

use crate::jwk::{Jwk, JwkError};

/// P-256 座標與簽章分量的固定寬度（位元組）。
const P256_FIELD_BYTES: i32 = 32;

/// 鍵相關操作的錯誤列舉。
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] ErrorStack),
    #[error("Unsupported key: expected an EC P-256 private key")]
    UnsupportedKey,
    #[error("JWK error: {0}")]
    JwkError(#[from] JwkError),
}

/// 本模組使用的結果類型，當中錯誤皆為 `KeyError`。
type Result<T> = std::result::Result<T, KeyError>;

/// ACME 帳戶金鑰：一組 P-256 金鑰對。
///
/// 每個客戶端實例擁有一把帳戶金鑰，所有 JWS 簽章與 key authorization 的
/// thumbprint 都由它衍生，整個工作階段內不會更換。
pub struct AccountKey {
    ec_key: EcKey<Private>,
    jwk: Jwk,
}

impl AccountKey {
    /// JWS 標頭中使用的演算法名稱。
    pub const ALG: &'static str = "ES256";

    /// 產生新的 P-256 金鑰對。
    ///
    /// 產生失敗代表無法進行任何簽章，呼叫端應視為致命錯誤。
    pub fn generate() -> Result<Self> {
        let group = Self::group()?;
        let ec_key = EcKey::generate(&group)?;
        Self::from_ec_key(ec_key)
    }

    /// 由 PEM（PKCS#8 或傳統 EC 格式）讀取私鑰。
    ///
    /// # 錯誤
    ///
    /// 若私鑰不是 P-256 橢圓曲線金鑰，回傳 [`KeyError::UnsupportedKey`]。
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let pkey = PKey::private_key_from_pem(pem)?;
        let ec_key = pkey.ec_key().map_err(|_| KeyError::UnsupportedKey)?;
        if ec_key.group().curve_name() != Some(Nid::X9_62_PRIME256V1) {
            return Err(KeyError::UnsupportedKey);
        }
        Self::from_ec_key(ec_key)
    }

    /// 以 PKCS#8 PEM 匯出私鑰。
    pub fn to_pem(&self) -> Result<Vec<u8>> {
        let pkey = PKey::from_ec_key(self.ec_key.clone())?;
        Ok(pkey.private_key_to_pem_pkcs8()?)
    }

    fn group() -> Result<EcGroup> {
        Ok(EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?)
    }

    fn from_ec_key(ec_key: EcKey<Private>) -> Result<Self> {
        ec_key.check_key()?;
        let jwk = Self::derive_jwk(&ec_key)?;
        Ok(Self { ec_key, jwk })
    }

    /// 取出公鑰座標並轉為固定寬度的 JWK。
    fn derive_jwk(ec_key: &EcKey<Private>) -> Result<Jwk> {
        let mut ctx = BigNumContext::new()?;
        let mut x = BigNum::new()?;
        let mut y = BigNum::new()?;
        ec_key
            .public_key()
            .affine_coordinates_gfp(ec_key.group(), &mut x, &mut y, &mut ctx)?;

        Ok(Jwk::p256(
            &x.to_vec_padded(P256_FIELD_BYTES)?,
            &y.to_vec_padded(P256_FIELD_BYTES)?,
        ))
    }

    /// 以 ECDSA P-256 + SHA-256 對資料簽章。
    ///
    /// 回傳 JWS 要求的 `r || s` 形式（各 32 位元組，共 64 位元組），
    /// 而非 OpenSSL 預設的 DER 編碼。ECDSA 本身具隨機性，相同輸入的簽章不保證相同。
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let digest = sha256(data);
        let signature = EcdsaSig::sign(&digest, &self.ec_key)?;

        let mut raw = signature.r().to_vec_padded(P256_FIELD_BYTES)?;
        raw.extend(signature.s().to_vec_padded(P256_FIELD_BYTES)?);
        Ok(raw)
    }

    /// 公鑰的 JWK 表示。
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    /// 計算並回傳金鑰的 thumbprint（RFC 7638）。
    pub fn thumbprint(&self) -> Result<String> {
        Ok(self.jwk.thumbprint()?)
    }

    /// 底層的 OpenSSL 金鑰，供驗章等操作使用。
    pub fn ec_key(&self) -> &EcKey<Private> {
        &self.ec_key
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("alg", &Self::ALG)
            .field("jwk", &self.jwk)
            .finish()
    }
}
