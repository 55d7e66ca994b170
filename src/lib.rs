//! # ACME 憑證簽發客戶端
//!
//! 本庫實作 RFC 8555 的客戶端流程，與 ACME CA（例如 Let's Encrypt）交互：
//!
//! - **簽章**（`key_pair`、`jwk`、`jws`）：P-256 帳戶金鑰、ES256 簽章與 JWS 信封。
//! - **工作階段**（`client`、`nonce`、`directory`）：目錄解析與一次性 nonce 的管理。
//! - **協定操作**（`account`、`order`、`lifecycle`）：建立帳戶、下訂單、處理挑戰、最終確認、下載與撤銷。
//! - **挑戰佈建**（`challenge`、`provision`）：把 DNS-01 與 HTTP-01 的驗證資料交給外部服務。
//! - **輪詢**（`poll`）：有上限、可取消的狀態輪詢。
//!
//! ## 使用方式
//!
//! 所有操作都是 [`AcmeClient`] 上的方法，且必須依序呼叫：先
//! [`get_directory`](AcmeClient::get_directory)，再
//! [`create_account`](AcmeClient::create_account)，之後才能下訂單。
//! [`Issuance`] 會把整個流程串起來。
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use acmekit::{
//!     provision::MemoryZone, AcmeClient, ChallengeDispatcher, ChallengeScheme, ClientConfig,
//!     Issuance, IssuanceConfig,
//! };
//!
//! fn main() -> Result<(), acmekit::AcmeError> {
//!     // 1. 設定客戶端與 DNS 協作者
//!     let zone = Arc::new(MemoryZone::new());
//!     let config = ClientConfig::lets_encrypt_staging().contact("admin@example.com");
//!     let mut client = AcmeClient::new(config)?
//!         .with_dispatcher(ChallengeDispatcher::new().with_dns_zone(zone.clone()));
//!
//!     // 2. 以 DNS-01 簽發憑證
//!     let issuance = Issuance::new(
//!         IssuanceConfig::new(&["example.com", "www.example.com"], ChallengeScheme::Dns01)
//!             .validity_days(90),
//!     );
//!     let issued = issuance.run(&mut client)?;
//!
//!     // 3. 寫入檔案
//!     issued.write_pem(Path::new("cert.pem"), Path::new("key.pem"))?;
//!     Ok(())
//! }
//! ```
//!
//! 本庫使用 `tracing` 輸出日誌，但不會安裝任何 subscriber。

pub mod account;
pub mod base64;
pub mod certificate;
pub mod challenge;
pub mod client;
pub mod config;
pub mod csr;
pub mod directory;
pub mod error;
pub mod http;
pub mod issuance;
pub mod jwk;
pub mod jws;
pub mod key_pair;
pub mod lifecycle;
pub mod nonce;
pub mod order;
pub mod payload;
pub mod poll;
pub mod protection;
pub mod provision;
pub mod signature;
pub mod status;

pub use account::Account;
pub use challenge::{Authorization, Challenge, ChallengeDispatcher, ChallengeScheme};
pub use client::AcmeClient;
pub use config::{directories, ClientConfig, IssuanceConfig};
pub use directory::Directory;
pub use error::{AcmeError, Problem, Result};
pub use issuance::{Issuance, IssuedCertificate};
pub use key_pair::AccountKey;
pub use order::Order;
pub use poll::{CancelToken, PollPolicy, PollTargets};
pub use status::Status;
