//! ACME 客戶端的工作階段狀態與簽章請求管線。
//!
//! [`AcmeClient`] 擁有帳戶金鑰、目錄、帳戶 URL 與 nonce 追蹤器，
//! 所有會改變這些狀態的操作都需要 `&mut self`。各協定操作分散在
//! [`crate::account`]、[`crate::order`]、[`crate::poll`] 與 [`crate::lifecycle`] 中，
//! 以 `impl AcmeClient` 區塊的形式擴充本型別。

use serde::de::DeserializeOwned;

use crate::{
    challenge::ChallengeDispatcher,
    config::ClientConfig,
    directory::Directory,
    error::{AcmeError, Result},
    http::{AcmeResponse, HttpClient, Operation},
    jws::{EnvelopeBuilder, Jws, JwsPayload},
    key_pair::AccountKey,
    nonce::{HttpNonceSource, Nonce, NonceSource, NonceTracker},
    payload::PayloadT,
    poll::CancelToken,
};

/// 與單一 CA 互動的客戶端。
#[derive(Debug)]
pub struct AcmeClient {
    config: ClientConfig,
    http: HttpClient,
    key: AccountKey,
    directory: Option<Directory>,
    account_url: Option<String>,
    nonces: NonceTracker,
    dispatcher: ChallengeDispatcher,
    cancel: CancelToken,
}

impl AcmeClient {
    /// 以新產生的帳戶金鑰建立客戶端。
    pub fn new(config: ClientConfig) -> Result<Self> {
        let key = AccountKey::generate()?;
        Self::with_key(config, key)
    }

    /// 以既有的帳戶金鑰建立客戶端。
    ///
    /// 目錄尚未取得，第一個操作應為 [`get_directory`](Self::get_directory)。
    pub fn with_key(config: ClientConfig, key: AccountKey) -> Result<Self> {
        let http = HttpClient::new(&config.user_agent, config.request_timeout)?;
        tracing::debug!(
            directory_url = %config.directory_url,
            user_agent = %config.user_agent,
            "Created ACME client"
        );

        Ok(Self {
            config,
            http,
            key,
            directory: None,
            account_url: None,
            nonces: NonceTracker::new(),
            dispatcher: ChallengeDispatcher::new(),
            cancel: CancelToken::new(),
        })
    }

    /// 設定佈建挑戰用的協作者。
    pub fn with_dispatcher(mut self, dispatcher: ChallengeDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// 取得並保存目錄。失敗時目錄維持未解析狀態。
    pub fn get_directory(&mut self) -> Result<&Directory> {
        let directory = Directory::fetch(&self.http, &self.config.directory_url)?;
        Ok(&*self.directory.insert(directory))
    }

    /// 已解析的目錄；尚未呼叫 [`get_directory`](Self::get_directory) 時回傳
    /// [`AcmeError::DirectoryUnresolved`]。
    pub fn directory(&self) -> Result<&Directory> {
        self.directory.as_ref().ok_or(AcmeError::DirectoryUnresolved)
    }

    /// 直接向 newNonce 端點取得一個新的 nonce，不經過追蹤器。
    pub fn get_nonce(&self) -> Result<Nonce> {
        let directory = self.directory()?;
        Ok(HttpNonceSource::new(&self.http, &directory.new_nonce).fetch()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    /// 帳戶 URL，建立帳戶前為 `None`。
    pub fn account_url(&self) -> Option<&str> {
        self.account_url.as_deref()
    }

    pub fn dispatcher(&self) -> &ChallengeDispatcher {
        &self.dispatcher
    }

    /// 可交給其他執行緒用來中止輪詢的權杖。
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub(crate) fn set_account_url(&mut self, url: String) {
        self.account_url = Some(url);
    }

    /// 驗證並序列化載荷。
    pub(crate) fn encode_payload<P: PayloadT>(payload: &P) -> Result<JwsPayload> {
        payload
            .validate()
            .map_err(|e| AcmeError::InvalidInput(e.0))?;
        Ok(payload.to_jws_payload()?)
    }

    /// 優先使用上一個回應附帶的 nonce，否則向 newNonce 取得新的。
    fn next_nonce(&mut self) -> Result<Nonce> {
        let directory = self
            .directory
            .as_ref()
            .ok_or(AcmeError::DirectoryUnresolved)?;
        let source = HttpNonceSource::new(&self.http, &directory.new_nonce);
        Ok(self.nonces.take_or_fetch(&source)?)
    }

    /// 以 jwk 模式簽章並送出，只用於 newAccount。
    pub(crate) fn post_self_signed(&mut self, url: &str, payload: &JwsPayload) -> Result<AcmeResponse> {
        let nonce = self.next_nonce()?;
        let jws = EnvelopeBuilder::new(&self.key).build_self_signed(nonce, url, payload)?;
        self.send(url, &jws, None)
    }

    /// 以 kid 模式簽章並送出。
    ///
    /// # 錯誤
    ///
    /// 尚未建立帳戶時回傳 [`AcmeError::AccountMissing`]，此時不會消耗任何 nonce。
    pub(crate) fn post_identified(
        &mut self,
        url: &str,
        payload: &JwsPayload,
        accept: Option<&str>,
    ) -> Result<AcmeResponse> {
        let kid = self.account_url.clone().ok_or(AcmeError::AccountMissing)?;
        let nonce = self.next_nonce()?;
        let jws = EnvelopeBuilder::new(&self.key).build_identified(nonce, url, &kid, payload)?;
        self.send(url, &jws, accept)
    }

    /// POST-as-GET：空載荷的 kid 模式請求。
    pub(crate) fn post_as_get(&mut self, url: &str, accept: Option<&str>) -> Result<AcmeResponse> {
        self.post_identified(url, &JwsPayload::Empty, accept)
    }

    /// 以 POST-as-GET 取得資源並要求 HTTP 200。
    pub(crate) fn fetch_resource<T: DeserializeOwned>(&mut self, url: &str) -> Result<T> {
        self.post_as_get(url, None)?
            .expect_status(Operation::Poll, reqwest::StatusCode::OK)?
            .json()
    }

    /// 送出 JWS，並在檢查狀態碼之前先保存回應附帶的 nonce。
    fn send(&mut self, url: &str, jws: &Jws, accept: Option<&str>) -> Result<AcmeResponse> {
        let response = self.http.post_jose(url, jws.to_json()?, accept)?;
        tracing::debug!(url, status = response.status.as_u16(), "Signed request completed");
        self.nonces.store(response.nonce());
        Ok(response)
    }
}
