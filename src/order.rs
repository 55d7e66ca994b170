//! 訂單的建立，以及授權與挑戰的處理。

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    challenge::{key_authorization, Authorization, Challenge, ChallengeScheme},
    client::AcmeClient,
    error::{AcmeError, Problem, Result},
    http::Operation,
    key_pair::KeyError,
    payload::{ChallengeValidationPayload, Identifier, NewOrderPayload},
    poll::Pollable,
    status::Status,
};

/// 表示訂單資料。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// 伺服器回傳的訂單 URL（取自 `Location`，本地不序列化）
    #[serde(skip)]
    pub url: String,
    /// 訂單當前狀態
    pub status: Status,
    /// 過期時間（RFC 3339 字串）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// 證書涵蓋的識別項
    pub identifiers: Vec<Identifier>,
    #[serde(rename = "notBefore", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    #[serde(rename = "notAfter", default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,
    /// 授權 URL 列表，每個識別項一個
    pub authorizations: Vec<String>,
    /// 最終確認 URL
    pub finalize: String,
    /// 憑證 URL（僅在 valid 時存在）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    /// 訂單失敗時的原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Problem>,
}

impl Pollable for Order {
    fn status(&self) -> Status {
        self.status
    }
}

impl AcmeClient {
    /// 為一組域名建立新訂單。
    ///
    /// # 參數
    ///
    /// - `domains`: 至少一個域名，每個都會成為 `"dns"` 識別項。
    /// - `not_before`, `not_after`: 可選的憑證有效期間。
    ///
    /// # 回傳
    ///
    /// 回傳 CA 建立的訂單，`url` 取自回應的 `Location` 標頭。
    ///
    /// # 錯誤
    ///
    /// 空的域名清單在送出前即回傳 [`AcmeError::InvalidInput`]；
    /// 回應不是 HTTP 201 時回傳 `UnexpectedStatus`。
    pub fn issue_certificate<S: AsRef<str>>(
        &mut self,
        domains: &[S],
        not_before: Option<DateTime<Utc>>,
        not_after: Option<DateTime<Utc>>,
    ) -> Result<Order> {
        let payload = Self::encode_payload(
            &NewOrderPayload::new(domains).with_validity(not_before, not_after),
        )?;
        let url = self.directory()?.new_order.clone();

        let response = self
            .post_identified(&url, &payload, None)?
            .expect_status(Operation::NewOrder, StatusCode::CREATED)?;
        let order_url = response.require_location()?;

        let mut order: Order = response.json()?;
        order.url = order_url;

        tracing::info!(
            order_url = %order.url,
            status = %order.status,
            authorizations = order.authorizations.len(),
            "Created order"
        );
        Ok(order)
    }

    /// 以 POST-as-GET 取得授權資源。
    pub fn authorization(&mut self, authorization_url: &str) -> Result<Authorization> {
        self.post_as_get(authorization_url, None)?
            .expect_status(Operation::FetchAuthorization, StatusCode::OK)?
            .json()
    }

    /// 以 POST-as-GET 重新取得訂單。
    pub fn order(&mut self, order_url: &str) -> Result<Order> {
        let mut order: Order = self.fetch_resource(order_url)?;
        order.url = order_url.to_string();
        Ok(order)
    }

    /// 取得授權，選出符合 `scheme` 的挑戰並交給協作者佈建。
    ///
    /// 只佈建，不觸發驗證，也不等待 DNS 或 HTTP 生效。
    ///
    /// # 錯誤
    ///
    /// 授權中沒有該類型的挑戰時回傳 [`AcmeError::ChallengeNotFound`]；
    /// 佈建失敗的錯誤見 [`ChallengeDispatcher::provision`](crate::challenge::ChallengeDispatcher::provision)。
    pub fn authorize_certificate(
        &mut self,
        authorization_url: &str,
        scheme: ChallengeScheme,
    ) -> Result<Challenge> {
        let authorization = self.authorization(authorization_url)?;
        let domain = &authorization.identifier.value;

        let challenge = authorization
            .find_challenge(scheme)
            .cloned()
            .ok_or_else(|| AcmeError::ChallengeNotFound {
                scheme,
                identifier: domain.clone(),
            })?;

        let key_auth =
            key_authorization(&challenge.token, self.key().jwk()).map_err(KeyError::from)?;
        self.dispatcher()
            .provision(scheme, domain, &challenge.token, &key_auth)?;

        tracing::info!(
            domain = %domain,
            challenge_url = %challenge.url,
            %scheme,
            "Challenge provisioned"
        );
        Ok(challenge)
    }

    /// 通知 CA 挑戰已就緒（載荷為 `{}`），回傳更新後的挑戰。
    pub fn validate_certificate(&mut self, challenge_url: &str) -> Result<Challenge> {
        let payload = Self::encode_payload(&ChallengeValidationPayload::new())?;

        let challenge: Challenge = self
            .post_identified(challenge_url, &payload, None)?
            .expect_status(Operation::ValidateChallenge, StatusCode::OK)?
            .json()?;

        tracing::info!(challenge_url, status = %challenge.status, "Challenge validation requested");
        Ok(challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order() {
        let json = r#"{
            "status": "pending",
            "expires": "2030-01-08T00:00:00Z",
            "identifiers": [{"type": "dns", "value": "example.org"}],
            "authorizations": ["https://ca/authz/1"],
            "finalize": "https://ca/order/1/finalize"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();

        assert_eq!(order.status, Status::Pending);
        assert_eq!(order.identifiers, vec![Identifier::dns("example.org")]);
        assert_eq!(order.authorizations, vec!["https://ca/authz/1"]);
        assert!(order.certificate.is_none());
        assert!(order.url.is_empty());
    }

    #[test]
    fn test_parse_invalid_order_with_problem() {
        let json = r#"{
            "status": "invalid",
            "identifiers": [],
            "authorizations": [],
            "finalize": "f",
            "error": {"type": "urn:ietf:params:acme:error:unauthorized", "detail": "no"}
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();

        assert_eq!(order.status(), Status::Invalid);
        assert_eq!(
            order.error.unwrap().problem_type,
            "urn:ietf:params:acme:error:unauthorized"
        );
    }

    #[test]
    fn test_unknown_status_is_not_an_error() {
        let json = r#"{"status":"archived","identifiers":[],"authorizations":[],"finalize":"f"}"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, Status::Unknown);
    }
}
