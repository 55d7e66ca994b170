//! 資源狀態輪詢。
//!
//! 反覆以 POST-as-GET 取得資源，直到其狀態落入成功集合或失敗集合。
//! 等待有上限（牆鐘期限或嘗試次數），且可由其他執行緒透過 [`CancelToken`] 立即中止。

use std::{
    sync::{Arc, Condvar, Mutex},
    time::{Duration, Instant},
};

use serde::de::DeserializeOwned;

use crate::{
    client::AcmeClient,
    error::{AcmeError, Result},
    status::Status,
};

/// 有 `status` 欄位、可被輪詢的資源。
pub trait Pollable: DeserializeOwned {
    fn status(&self) -> Status;
}

/// 一組成功與失敗狀態。不在兩者之中的狀態會繼續輪詢。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTargets {
    pub success: &'static [Status],
    pub failure: &'static [Status],
}

impl PollTargets {
    /// finalize 之前：訂單進入 ready/processing/valid 即可送出 CSR。
    pub const PRE_FINALIZE: PollTargets = PollTargets {
        success: &[Status::Ready, Status::Processing, Status::Valid],
        failure: &[Status::Invalid],
    };

    /// finalize 之後：只有 valid 算成功，ready/invalid/pending 都視為失敗。
    pub const POST_FINALIZE: PollTargets = PollTargets {
        success: &[Status::Valid],
        failure: &[Status::Ready, Status::Invalid, Status::Pending],
    };

    /// 授權或挑戰：valid 為成功，invalid/deactivated/expired/revoked 為失敗。
    pub const AUTHORIZATION: PollTargets = PollTargets {
        success: &[Status::Valid],
        failure: &[
            Status::Invalid,
            Status::Deactivated,
            Status::Expired,
            Status::Revoked,
        ],
    };

    fn outcome(&self, status: Status) -> Option<bool> {
        if self.success.contains(&status) {
            Some(true)
        } else if self.failure.contains(&status) {
            Some(false)
        } else {
            None
        }
    }
}

/// 輪詢的等待間隔與上限。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// 兩次嘗試之間的固定等待時間。
    pub interval: Duration,
    /// 從開始輪詢起算的牆鐘期限。
    pub deadline: Option<Duration>,
    /// 最多嘗試次數。
    pub max_attempts: Option<usize>,
}

impl PollPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);

    /// 不設上限的輪詢，只能靠 [`CancelToken`] 中止。
    pub fn unbounded() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            deadline: None,
            max_attempts: None,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

impl Default for PollPolicy {
    /// 每秒一次，最多五分鐘。
    fn default() -> Self {
        Self::unbounded().deadline(Self::DEFAULT_DEADLINE)
    }
}

/// 可跨執行緒共用的取消旗標。
///
/// 取消後，正在等待下一次輪詢的執行緒會立即被喚醒並回傳 [`AcmeError::Cancelled`]。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        let mut cancelled = flag.lock().unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 最多等待 `timeout`；若期間被取消則回傳 `true`。
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = condvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// 依照 [`PollPolicy`] 執行輪詢迴圈。
#[derive(Debug)]
pub struct Poller<'a> {
    policy: &'a PollPolicy,
    cancel: &'a CancelToken,
}

impl<'a> Poller<'a> {
    pub fn new(policy: &'a PollPolicy, cancel: &'a CancelToken) -> Self {
        Self { policy, cancel }
    }

    /// 以 `fetch` 反覆取得資源直到達到 `targets` 之一。
    ///
    /// # 參數
    ///
    /// - `url`: 資源 URL，僅用於日誌與錯誤訊息。
    /// - `targets`: 成功與失敗狀態集合。
    /// - `fetch`: 取得一次資源；其錯誤會直接中止輪詢。
    ///
    /// # 回傳
    ///
    /// 成功狀態時回傳該次取得的資源；失敗狀態回傳 [`AcmeError::TerminalFailureState`]；
    /// 超過上限回傳 [`AcmeError::PollTimeout`]；被取消回傳 [`AcmeError::Cancelled`]。
    pub fn run<T, F>(&self, url: &str, targets: &PollTargets, mut fetch: F) -> Result<T>
    where
        T: Pollable,
        F: FnMut() -> Result<T>,
    {
        let started = Instant::now();
        let mut attempts = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return Err(AcmeError::Cancelled);
            }

            let resource = fetch()?;
            attempts += 1;
            let status = resource.status();

            match targets.outcome(status) {
                Some(true) => {
                    tracing::info!(url, %status, attempts, "Resource reached success state");
                    return Ok(resource);
                }
                Some(false) => {
                    tracing::warn!(url, %status, attempts, "Resource reached failure state");
                    return Err(AcmeError::TerminalFailureState {
                        url: url.to_string(),
                        status,
                    });
                }
                None => tracing::debug!(url, %status, attempts, "Resource not settled yet"),
            }

            let out_of_attempts = self
                .policy
                .max_attempts
                .is_some_and(|max| attempts >= max);
            let wait = match self.policy.deadline {
                Some(deadline) => deadline
                    .checked_sub(started.elapsed())
                    .filter(|remaining| !remaining.is_zero())
                    .map(|remaining| remaining.min(self.policy.interval)),
                None => Some(self.policy.interval),
            };
            let wait = match wait {
                Some(wait) if !out_of_attempts => wait,
                _ => {
                    return Err(AcmeError::PollTimeout {
                        url: url.to_string(),
                        attempts,
                        last_status: Some(status),
                    })
                }
            };

            if self.cancel.wait(wait) {
                return Err(AcmeError::Cancelled);
            }
        }
    }
}

impl AcmeClient {
    /// 以 POST-as-GET 輪詢 `url`，直到狀態落入 `targets`。
    ///
    /// 等待策略取自客戶端設定的 [`PollPolicy`]，並可由 [`AcmeClient::cancel_token`] 取消。
    pub fn poll<T: Pollable>(&mut self, url: &str, targets: &PollTargets) -> Result<T> {
        let policy = self.config().poll.clone();
        let cancel = self.cancel_token();
        Poller::new(&policy, &cancel).run(url, targets, || self.fetch_resource(url))
    }
}
