//! Shared fixtures: a scripted in-memory transport, a clock that records
//! instead of sleeping, and a sample declaration.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dpae_client::{Clock, DpaeClient, DpaeConfig, PollPolicy, Transport, TransportRequest, TransportResponse};
use dpae_core::{Contract, Credentials, DeclarationContext, Employee, Employer, Environment, TransportError};

pub const BASE: &str = "http://dpae.test";
pub const TOKEN: &str = "tok-0123456789abcdef";
pub const FLUX_ID: &str = "12345678901234567890123";

pub type Reply = Result<TransportResponse, TransportError>;

struct Route {
    prefix: String,
    replies: VecDeque<Reply>,
}

/// Replies are queued per URL prefix. The last reply of a queue repeats.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, prefix: &str, replies: Vec<Reply>) -> &Self {
        self.routes.lock().unwrap().push(Route {
            prefix: prefix.to_string(),
            replies: replies.into(),
        });
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| url.starts_with(&r.prefix))
            .ok_or_else(|| TransportError::Connection {
                endpoint: url.clone(),
                reason: "no scripted route".into(),
            })?;
        if route.replies.len() > 1 {
            route.replies.pop_front().unwrap()
        } else {
            route.replies.front().cloned().unwrap()
        }
    }
}

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn auth_url() -> String {
    format!("{BASE}/authentifier_dpae")
}

pub fn submit_url() -> String {
    format!("{BASE}/deposer-dsn/1.0/")
}

pub fn consultation_url() -> String {
    format!("{BASE}/lister-retours-flux/2.0/")
}

pub fn result_url(n: u32) -> String {
    format!("{BASE}/retours/{n}")
}

pub fn ok(body: impl Into<Vec<u8>>) -> Reply {
    Ok(TransportResponse {
        status: 200,
        body: body.into(),
    })
}

pub fn status(code: u16, body: &str) -> Reply {
    Ok(TransportResponse {
        status: code,
        body: body.as_bytes().to_vec(),
    })
}

pub fn unreachable(url: &str) -> Reply {
    Err(TransportError::Connection {
        endpoint: url.to_string(),
        reason: "connection refused".into(),
    })
}

pub fn flux_ack(id: &str) -> Reply {
    ok(format!("<?xml version=\"1.0\"?><depot><idflux>{id}</idflux></depot>"))
}

pub fn empty_feed() -> Reply {
    ok(r#"{"Retours":{"Flux":[]}}"#)
}

pub fn feed(urls: &[String]) -> Reply {
    let entries: Vec<serde_json::Value> = urls
        .iter()
        .map(|u| serde_json::json!({"Nature": "DPAE", "Statut": "OK", "URL": u}))
        .collect();
    ok(serde_json::json!({"Retours": {"Flux": [{"ID": FLUX_ID, "Retour": entries}]}}).to_string())
}

pub fn certified_doc(certificate: &str) -> Reply {
    ok(format!(
        r#"<retour profil="DPAE"><etat_conformite>OK</etat_conformite><certificat_conformite>{certificate}</certificat_conformite></retour>"#
    ))
}

pub fn rejected_doc(message: &str) -> Reply {
    ok(format!(
        r#"<retour profil="DPAE"><etat_conformite>KO</etat_conformite><message>{message}</message></retour>"#
    ))
}

pub fn config(poll: PollPolicy) -> DpaeConfig {
    let mut config = DpaeConfig::local_mock(BASE).unwrap();
    config.poll = poll;
    config
}

pub fn client(transport: &Arc<ScriptedTransport>, clock: &Arc<RecordingClock>, poll: PollPolicy) -> DpaeClient {
    DpaeClient::with_transport(config(poll), transport.clone(), clock.clone())
}

pub fn context() -> DeclarationContext {
    DeclarationContext::new(
        Environment::Test,
        Credentials {
            organization_id: "12345678900012".into(),
            last_name: "DUPONT".into(),
            first_name: "MARIE".into(),
            service_code: "25".into(),
        },
        Employer {
            designation: "Boulangerie Crémieux".into(),
            siret: "12345678900012".into(),
            ape_code: "1071C".into(),
            urssaf_code: "117".into(),
            address: "12 rue de la Paix".into(),
            town: "Paris".into(),
            postal_code: "75002".into(),
            phone: "0102030405".into(),
            health_service: None,
        },
        Employee {
            surname: "Martin".into(),
            christian_name: "Jean-Luc".into(),
            sex: 1,
            nir: "1850375123456".into(),
            nir_key: "42".into(),
            birth_date: "15/03/1985".into(),
            birth_town: "Lyon".into(),
            birth_department: None,
        },
        Contract {
            start_date: "2024-03-15".into(),
            start_time: "09:00".into(),
            end_date: Some("2024-09-15".into()),
            nature_code: "CDD".into(),
        },
    )
}

pub fn password() -> zeroize::Zeroizing<String> {
    zeroize::Zeroizing::new("s3cret-pass".to_string())
}
