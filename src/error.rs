use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    certificate::CertificateError,
    challenge::{ChallengeScheme, ProvisionError},
    csr::CsrError,
    http::Operation,
    jws::JwsError,
    key_pair::KeyError,
    nonce::NonceError,
    status::Status,
};

/// 錯誤類型，描述整個簽發流程中任何一步可能發生的失敗。
///
/// 流程在第一個錯誤時即中止，不會嘗試清理已建立的帳戶或訂單。
#[derive(Debug, Error)]
pub enum AcmeError {
    /// 尚未成功取得目錄，任何其他操作都不能進行。
    #[error("ACME directory has not been resolved")]
    DirectoryUnresolved,
    /// 無法取得 nonce，簽章請求不會被送出。
    #[error("Nonce unavailable: {0}")]
    NonceUnavailable(#[source] NonceError),
    /// 回應狀態碼與該操作的契約不符。
    #[error("Unexpected status for {operation}: expected {expected}, got {actual}{}", problem_suffix(.problem))]
    UnexpectedStatus {
        operation: Operation,
        expected: StatusCode,
        actual: StatusCode,
        problem: Option<Problem>,
    },
    /// 授權中沒有所要求類型的挑戰。
    #[error("No {scheme} challenge offered for {identifier}")]
    ChallengeNotFound {
        scheme: ChallengeScheme,
        identifier: String,
    },
    /// 輪詢的資源進入了失敗狀態。
    #[error("Resource {url} reached terminal state {status}")]
    TerminalFailureState { url: String, status: Status },
    /// 輪詢超過期限或嘗試次數上限。
    #[error("Gave up polling {url} after {attempts} attempts (last status {last_status:?})")]
    PollTimeout {
        url: String,
        attempts: usize,
        last_status: Option<Status>,
    },
    /// 呼叫端取消了進行中的流程。
    #[error("Operation cancelled")]
    Cancelled,
    /// 尚未建立帳戶便發出需要 kid 的請求。
    #[error("Account has not been created")]
    AccountMissing,
    #[error("Missing response header: {0}")]
    MissingHeader(&'static str),
    #[error("Missing field in response: {0}")]
    MissingField(&'static str),
    /// 沒有設定對應挑戰類型的佈建協作者。
    #[error("No provisioner configured for {0}")]
    ProvisionerMissing(ChallengeScheme),
    #[error("Provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("JWS error: {0}")]
    Jws(#[from] JwsError),
    #[error("CSR error: {0}")]
    Csr(#[from] CsrError),
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcmeError {
    /// 判斷此錯誤是否可能在稍後重試成功。
    ///
    /// 傳輸層的逾時與連線失敗、5xx 回應以及 `badNonce` 屬於可重試；
    /// 其他協定層的拒絕則不是。客戶端本身從不自動重試。
    pub fn is_retryable(&self) -> bool {
        match self {
            AcmeError::Request(e) => e.is_timeout() || e.is_connect(),
            AcmeError::NonceUnavailable(NonceError::RequestFailed(e)) => {
                e.is_timeout() || e.is_connect()
            }
            AcmeError::UnexpectedStatus {
                actual, problem, ..
            } => {
                actual.is_server_error()
                    || problem.as_ref().map(Problem::is_bad_nonce).unwrap_or(false)
            }
            _ => false,
        }
    }
}

impl From<NonceError> for AcmeError {
    fn from(e: NonceError) -> Self {
        AcmeError::NonceUnavailable(e)
    }
}

/// 模組共用的結果類型。
pub type Result<T> = std::result::Result<T, AcmeError>;

/// RFC 7807 problem document，CA 在錯誤回應以及失敗的訂單/挑戰中使用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub problem_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subproblems: Vec<Problem>,
}

impl Problem {
    const BAD_NONCE: &'static str = "urn:ietf:params:acme:error:badNonce";

    pub fn is_bad_nonce(&self) -> bool {
        self.problem_type == Self::BAD_NONCE
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.problem_type, detail),
            None => f.write_str(&self.problem_type),
        }
    }
}

fn problem_suffix(problem: &Option<Problem>) -> String {
    problem
        .as_ref()
        .map(|p| format!(" ({})", p))
        .unwrap_or_default()
}
