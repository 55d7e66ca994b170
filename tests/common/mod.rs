#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use acmekit::{
    jws::Jws, protection::ProtectedHeader, AcmeClient, ChallengeDispatcher, ClientConfig,
    PollPolicy,
};
use mockito::{Mock, ServerGuard};
use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkey::PKey,
    x509::{X509Builder, X509NameBuilder},
};

pub const USER_AGENT: &str = "acmekit-test/1.0";
pub const ACCOUNT_URL: &str = "https://ca/acct/7";

/// 每個已簽章請求的原始本文。
pub type Captured = Arc<Mutex<Vec<Vec<u8>>>>;

pub fn directory_body(base: &str) -> String {
    format!(
        r#"{{"newNonce":"{base}/nonce","newAccount":"{base}/acct","newOrder":"{base}/order","revokeCert":"{base}/revoke","meta":{{"termsOfService":"{base}/tos"}}}}"#
    )
}

pub fn mock_directory(server: &mut ServerGuard) -> Mock {
    let body = directory_body(&server.url());
    server
        .mock("GET", "/dir")
        .match_header("user-agent", USER_AGENT)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create()
}

pub fn mock_nonce(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/nonce")
        .with_status(204)
        .with_header("replay-nonce", "fresh-nonce")
        .create()
}

pub fn client_for(server: &ServerGuard) -> AcmeClient {
    let config = ClientConfig::new(format!("{}/dir", server.url()))
        .contact("admin@example.org")
        .user_agent(USER_AGENT)
        .request_timeout(Duration::from_secs(5))
        .poll_policy(
            PollPolicy::unbounded()
                .interval(Duration::from_millis(5))
                .max_attempts(20),
        );
    AcmeClient::new(config).unwrap()
}

/// 已解析目錄並建立帳戶的客戶端，連同必須保持存活的 mock。
pub fn registered_client(
    server: &mut ServerGuard,
    dispatcher: ChallengeDispatcher,
) -> (AcmeClient, Vec<Mock>) {
    let mut mocks = vec![mock_directory(server), mock_nonce(server)];
    let (account, _) = signed_endpoint(server, "/acct", 201, &[("location", ACCOUNT_URL)], "{}");
    mocks.push(account);

    let mut client = client_for(server).with_dispatcher(dispatcher);
    client.get_directory().unwrap();
    client.create_account().unwrap();
    (client, mocks)
}

/// 以固定狀態碼與本文回應的簽章端點，並記錄每個請求本文。
pub fn signed_endpoint(
    server: &mut ServerGuard,
    path: &str,
    status: usize,
    headers: &[(&'static str, &str)],
    body: &str,
) -> (Mock, Captured) {
    sequenced_endpoint(server, path, status, headers, vec![body.to_string()])
}

/// 依序回應 `bodies`，用完後重複最後一個。
pub fn sequenced_endpoint(
    server: &mut ServerGuard,
    path: &str,
    status: usize,
    headers: &[(&'static str, &str)],
    bodies: Vec<String>,
) -> (Mock, Captured) {
    let captured: Captured = Arc::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let sink = captured.clone();
    let mut mock = server
        .mock("POST", path)
        .match_header("content-type", "application/jose+json")
        .match_header("user-agent", USER_AGENT)
        .with_status(status)
        .with_header("replay-nonce", &format!("nonce-from{}", path.replace('/', "-")));
    for (name, value) in headers {
        mock = mock.with_header(*name, value);
    }
    let mock = mock
        .with_body_from_request(move |request| {
            sink.lock()
                .unwrap()
                .push(request.body().map(|b| b.to_vec()).unwrap_or_default());
            let index = calls.fetch_add(1, Ordering::SeqCst);
            bodies[index.min(bodies.len() - 1)].clone().into_bytes()
        })
        .create();

    (mock, captured)
}

/// 解開 JWS 請求本文，回傳保護標頭與原始載荷。
pub fn decode(body: &[u8]) -> (ProtectedHeader, Vec<u8>) {
    let jws: Jws = serde_json::from_slice(body).unwrap();
    (jws.decode_header().unwrap(), jws.decode_payload().unwrap())
}

pub fn last_request(captured: &Captured) -> (ProtectedHeader, Vec<u8>) {
    let bodies = captured.lock().unwrap();
    decode(bodies.last().expect("no request captured"))
}

pub fn order_body(base: &str, status: &str, certificate: Option<&str>) -> String {
    let certificate = certificate
        .map(|url| format!(r#","certificate":"{url}""#))
        .unwrap_or_default();
    format!(
        r#"{{"status":"{status}","identifiers":[{{"type":"dns","value":"example.org"}}],"authorizations":["{base}/authz/1"],"finalize":"{base}/order/1/finalize"{certificate}}}"#
    )
}

/// 只在測試中使用的自簽 PEM 證書。
pub fn self_signed_pem(common_name: &str) -> Vec<u8> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&BigNum::from_u32(42).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(90).unwrap()).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    builder.build().to_pem().unwrap()
}
