use reqwest::{header::HeaderMap, StatusCode};
use thiserror::Error;

use crate::http::HttpClient;

/// 伺服器回傳 nonce 所使用的標頭名稱。
pub const REPLAY_NONCE: &str = "Replay-Nonce";

/// 表示在取得 Nonce 時可能發生的錯誤狀況。
#[derive(Error, Debug)]
pub enum NonceError {
    /// 當請求過程中發生錯誤時回傳此錯誤。
    #[error("Failed to make request: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// newNonce 端點回傳 200 與 204 以外的狀態碼。
    #[error("Unexpected status from newNonce: {0}")]
    UnexpectedStatus(StatusCode),
    /// 當回應中缺少 `Replay-Nonce` 標頭時回傳此錯誤。
    #[error("No Replay-Nonce header found in response")]
    NoNonceHeader,
    /// 當標頭值無法轉換成字串時回傳此錯誤。
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::ToStrError),
}

/// 伺服器核發的一次性防重放權杖。
///
/// 刻意不實作 `Clone`：一個 nonce 只能被移入一個 JWS 標頭中使用一次。
#[derive(Debug, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 消耗此 nonce 並取出其字串值。
    pub fn into_inner(self) -> String {
        self.0
    }

    /// 從回應標頭中取出 `Replay-Nonce`，不存在或非 ASCII 時回傳 `None`。
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(REPLAY_NONCE)
            .and_then(|value| value.to_str().ok())
            .map(Self::new)
    }
}

/// 定義取得新 Nonce 的行為。
pub trait NonceSource {
    /// 嘗試取得一個新的 Nonce。
    fn fetch(&self) -> Result<Nonce, NonceError>;
}

/// 透過 HTTP GET 向 newNonce 端點取得 Nonce 的實作。
#[derive(Debug)]
pub struct HttpNonceSource<'a> {
    http: &'a HttpClient,
    url: &'a str,
}

impl<'a> HttpNonceSource<'a> {
    /// 建立一個新的 `HttpNonceSource`。
    ///
    /// # 參數
    ///
    /// * `http` - 已設定 User-Agent 的 HTTP 客戶端。
    /// * `url` - 目錄中的 `newNonce` URL。
    pub fn new(http: &'a HttpClient, url: &'a str) -> Self {
        Self { http, url }
    }
}

impl NonceSource for HttpNonceSource<'_> {
    /// 接受 200 或 204，並從 `Replay-Nonce` 標頭取出 nonce。
    fn fetch(&self) -> Result<Nonce, NonceError> {
        let response = self.http.get(self.url)?;

        if !matches!(response.status, StatusCode::OK | StatusCode::NO_CONTENT) {
            return Err(NonceError::UnexpectedStatus(response.status));
        }

        match response.headers.get(REPLAY_NONCE) {
            Some(nonce) => Ok(Nonce::new(nonce.to_str()?)),
            None => Err(NonceError::NoNonceHeader),
        }
    }
}

/// 保存「下一個可用 nonce」的追蹤器。
///
/// 任一時刻最多持有一個 nonce；每次簽章請求以 [`take_or_fetch`](Self::take_or_fetch)
/// 取走它，並在收到回應後以 [`store`](Self::store) 放入回應附帶的新 nonce。
#[derive(Debug, Default)]
pub struct NonceTracker {
    current: Option<Nonce>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記錄回應所附帶的 nonce；`None` 時維持空狀態。
    pub fn store(&mut self, nonce: Option<Nonce>) {
        if nonce.is_some() {
            self.current = nonce;
        }
    }

    /// 取走目前保存的 nonce。
    pub fn take(&mut self) -> Option<Nonce> {
        self.current.take()
    }

    pub fn has_nonce(&self) -> bool {
        self.current.is_some()
    }

    /// 優先使用已保存的 nonce，否則向 `source` 取得新的。
    pub fn take_or_fetch(&mut self, source: &dyn NonceSource) -> Result<Nonce, NonceError> {
        match self.current.take() {
            Some(nonce) => {
                tracing::debug!("Reusing captured nonce");
                Ok(nonce)
            }
            None => {
                tracing::debug!("Fetching fresh nonce");
                source.fetch()
            }
        }
    }
}

/// 依序產生 `nonce-1`、`nonce-2`… 的測試用來源。
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct CountingNonce {
    issued: std::cell::Cell<u32>,
}

#[cfg(test)]
impl CountingNonce {
    pub(crate) fn issued(&self) -> u32 {
        self.issued.get()
    }
}

#[cfg(test)]
impl NonceSource for CountingNonce {
    fn fetch(&self) -> Result<Nonce, NonceError> {
        let next = self.issued.get() + 1;
        self.issued.set(next);
        Ok(Nonce::new(format!("nonce-{}", next)))
    }
}
