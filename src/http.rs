//! 與 CA 之間的 HTTP 傳輸層。
//!
//! 所有請求都帶有設定的 User-Agent；簽章請求另外帶上 `application/jose+json`。
//! 回應在此被完整讀入 [`AcmeResponse`]，以便之後檢查狀態碼、`Location`
//! 與 `Replay-Nonce` 標頭。

use std::time::Duration;

use reqwest::{
    blocking::{Client, Response},
    header::{HeaderMap, ACCEPT, CONTENT_TYPE, LOCATION},
    StatusCode,
};
use serde::de::DeserializeOwned;

use crate::{
    error::{AcmeError, Problem},
    nonce::Nonce,
};

/// 簽章請求的 Content-Type。
pub const JOSE_CONTENT_TYPE: &str = "application/jose+json";
/// 下載憑證鏈時要求的格式。
pub const PEM_CHAIN_CONTENT_TYPE: &str = "application/pem-certificate-chain";

/// 協定中每個有固定狀態碼契約的操作，用於錯誤訊息與日誌。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Directory,
    NewNonce,
    NewAccount,
    NewOrder,
    FetchAuthorization,
    ValidateChallenge,
    Poll,
    Finalize,
    Download,
    Revoke,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory fetch",
            Self::NewNonce => "nonce fetch",
            Self::NewAccount => "account create",
            Self::NewOrder => "order create",
            Self::FetchAuthorization => "authorization fetch",
            Self::ValidateChallenge => "challenge validate",
            Self::Poll => "resource poll",
            Self::Finalize => "finalize",
            Self::Download => "certificate download",
            Self::Revoke => "revoke",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 包裝 `reqwest` 阻塞式客戶端。
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// 建立帶有 User-Agent 與逾時設定的客戶端。
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// 一般的 GET 請求（目錄與 newNonce）。
    pub fn get(&self, url: &str) -> Result<AcmeResponse, reqwest::Error> {
        let response = self.client.get(url).send()?;
        AcmeResponse::read(response)
    }

    /// 送出已序列化的 JWS。
    ///
    /// # 參數
    ///
    /// - `url`: 目標 URL，必須與保護標頭中的 `url` 相同。
    /// - `body`: JWS 的 JSON 字串。
    /// - `accept`: 可選的 Accept 標頭，例如下載憑證時使用 [`PEM_CHAIN_CONTENT_TYPE`]。
    pub fn post_jose(
        &self,
        url: &str,
        body: String,
        accept: Option<&str>,
    ) -> Result<AcmeResponse, reqwest::Error> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, JOSE_CONTENT_TYPE)
            .body(body);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        AcmeResponse::read(request.send()?)
    }
}

/// 已完整讀取的 HTTP 回應。
#[derive(Debug)]
pub struct AcmeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl AcmeResponse {
    fn read(response: Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// 回應附帶的下一個 nonce。
    pub fn nonce(&self) -> Option<Nonce> {
        Nonce::from_headers(&self.headers)
    }

    /// `Location` 標頭（帳戶與訂單 URL）。
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
    }

    /// 與 [`location`](Self::location) 相同，但缺少時回傳錯誤。
    pub fn require_location(&self) -> Result<String, AcmeError> {
        self.location()
            .ok_or(AcmeError::MissingHeader("Location"))
    }

    /// 嘗試把回應本文解析為 RFC 7807 problem document。
    pub fn problem(&self) -> Option<Problem> {
        serde_json::from_slice::<Problem>(&self.body).ok()
    }

    /// 檢查狀態碼是否符合該操作的契約，否則回傳 [`AcmeError::UnexpectedStatus`]。
    pub fn expect_status(self, operation: Operation, expected: StatusCode) -> Result<Self, AcmeError> {
        if self.status == expected {
            return Ok(self);
        }
        let problem = self.problem();
        tracing::warn!(
            operation = operation.as_str(),
            expected = expected.as_u16(),
            actual = self.status.as_u16(),
            problem = ?problem,
            "Unexpected response status"
        );
        Err(AcmeError::UnexpectedStatus {
            operation,
            expected,
            actual: self.status,
            problem,
        })
    }

    /// 將回應本文反序列化為指定型別。
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AcmeError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn response(status: StatusCode, body: &str) -> AcmeResponse {
        AcmeResponse {
            status,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_expect_status_attaches_problem() {
        let body = r#"{"type":"urn:ietf:params:acme:error:badNonce","detail":"stale","status":400}"#;
        let err = response(StatusCode::BAD_REQUEST, body)
            .expect_status(Operation::NewOrder, StatusCode::CREATED)
            .unwrap_err();

        match err {
            AcmeError::UnexpectedStatus {
                operation,
                expected,
                actual,
                problem,
            } => {
                assert_eq!(operation, Operation::NewOrder);
                assert_eq!(expected, StatusCode::CREATED);
                assert_eq!(actual, StatusCode::BAD_REQUEST);
                assert!(problem.unwrap().is_bad_nonce());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_expect_status_passes_through() {
        let resp = response(StatusCode::OK, "{}")
            .expect_status(Operation::Poll, StatusCode::OK)
            .unwrap();
        assert_eq!(resp.body, b"{}");
    }

    #[test]
    fn test_location_and_nonce_headers() {
        let mut resp = response(StatusCode::CREATED, "");
        assert!(resp.require_location().is_err());

        resp.headers
            .insert(LOCATION, HeaderValue::from_static("https://ca/acct/7"));
        resp.headers
            .insert("Replay-Nonce", HeaderValue::from_static("n-2"));

        assert_eq!(resp.require_location().unwrap(), "https://ca/acct/7");
        assert_eq!(resp.nonce().unwrap().as_str(), "n-2");
    }
}
