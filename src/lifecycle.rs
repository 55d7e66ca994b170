//! 訂單最終確認、憑證下載與撤銷。

use reqwest::StatusCode;

use crate::{
    client::AcmeClient,
    error::{AcmeError, Result},
    http::{Operation, PEM_CHAIN_CONTENT_TYPE},
    order::Order,
    payload::{FinalizeOrderPayload, RevocationPayload},
    poll::PollTargets,
};

impl AcmeClient {
    /// 提交 CSR 並等待憑證簽發。
    ///
    /// 1. 輪詢訂單直到 ready/processing/valid。
    /// 2. 向 `finalize_url` 送出 `{"csr": ...}`，要求 HTTP 200。
    /// 3. 再次輪詢訂單直到 valid；此時 ready、pending 或 invalid 都視為失敗。
    ///
    /// # 參數
    ///
    /// - `order_url`: 訂單 URL。
    /// - `finalize_url`: 訂單的 `finalize` URL。
    /// - `csr_der`: DER 編碼的 CSR。
    ///
    /// # 回傳
    ///
    /// 訂單的 `certificate` URL；訂單 valid 但缺少此欄位時回傳 [`AcmeError::MissingField`]。
    pub fn finalize(&mut self, order_url: &str, finalize_url: &str, csr_der: &[u8]) -> Result<String> {
        let order: Order = self.poll(order_url, &PollTargets::PRE_FINALIZE)?;
        tracing::debug!(order_url, status = %order.status, "Order ready for finalization");

        let payload = Self::encode_payload(&FinalizeOrderPayload::new(csr_der))?;
        self.post_identified(finalize_url, &payload, None)?
            .expect_status(Operation::Finalize, StatusCode::OK)?;
        tracing::info!(order_url, "Submitted CSR");

        let order: Order = self.poll(order_url, &PollTargets::POST_FINALIZE)?;
        let certificate_url = order
            .certificate
            .ok_or(AcmeError::MissingField("certificate"))?;

        tracing::info!(order_url, certificate_url = %certificate_url, "Order finalized");
        Ok(certificate_url)
    }

    /// 下載 PEM 憑證鏈，回傳原始位元組。
    pub fn download(&mut self, certificate_url: &str) -> Result<Vec<u8>> {
        let response = self
            .post_as_get(certificate_url, Some(PEM_CHAIN_CONTENT_TYPE))?
            .expect_status(Operation::Download, StatusCode::OK)?;

        tracing::info!(certificate_url, bytes = response.body.len(), "Downloaded certificate chain");
        Ok(response.body)
    }

    /// 撤銷憑證。
    ///
    /// # 參數
    ///
    /// - `certificate_der`: DER 編碼的憑證。
    /// - `reason`: 可選的 RFC 5280 撤銷原因碼。
    pub fn revoke(&mut self, certificate_der: &[u8], reason: Option<u8>) -> Result<()> {
        let payload = Self::encode_payload(&RevocationPayload::new(certificate_der, reason))?;
        let url = self.directory()?.revoke_cert.clone();

        self.post_identified(&url, &payload, None)?
            .expect_status(Operation::Revoke, StatusCode::OK)?;

        tracing::info!(?reason, "Certificate revoked");
        Ok(())
    }
}
