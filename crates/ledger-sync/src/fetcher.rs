//! Cliente HTTP paginado de la fuente externa, con reintentos.
//!
//! `GET {base}/users?page=&per_page=` y `GET {base}/contracts?...` devuelven un
//! sobre JSON con metadatos de paginación y el array de registros. Los
//! registros se conservan como texto crudo (`RawValue`) para que el hash de
//! contratos se calcule sobre los bytes recibidos.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use ledger_core::{RawRecord, SourceKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::config::SourceConfig;
use crate::error::FetchError;

/// Máximo de bytes del cuerpo que se copian en un `FetchError::Status`.
pub const MAX_ERROR_BODY: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    pub kind: SourceKind,
    pub records: Vec<RawRecord>,
    pub meta: PageMeta,
}

/// Fuente de páginas (HTTP en producción, fakes en tests).
pub trait SourceClient: Send + Sync {
    fn fetch_page(&self, kind: SourceKind, page: i64, per_page: i64) -> Result<SourcePage, FetchError>;
}

impl<C: SourceClient + ?Sized> SourceClient for Arc<C> {
    fn fetch_page(&self, kind: SourceKind, page: i64, per_page: i64) -> Result<SourcePage, FetchError> {
        (**self).fetch_page(kind, page, per_page)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    total_count: i64,
    #[serde(default)]
    per_page: i64,
    #[serde(default)]
    current_page: i64,
    #[serde(default)]
    total_pages: i64,
    #[serde(default)]
    users: Vec<Box<RawValue>>,
    #[serde(default)]
    contracts: Vec<Box<RawValue>>,
}

/// Decodifica el sobre de una página y extrae los registros del `kind` pedido.
pub fn decode_page(kind: SourceKind, body: &str) -> Result<SourcePage, FetchError> {
    let env: Envelope = serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    if !env.success {
        warn!("fetch:envelope success=false kind={kind} page={}", env.current_page);
    }
    let items = match kind {
        SourceKind::Persons => env.users,
        SourceKind::Contracts => env.contracts,
    };
    Ok(SourcePage { kind,
                    records: items.iter().map(|r| RawRecord::new(r.get())).collect(),
                    meta: PageMeta { page: env.current_page,
                                     per_page: env.per_page,
                                     total_pages: env.total_pages,
                                     total_count: env.total_count } })
}

/// Política de reintentos: `max_retries` reintentos extra con espera
/// `base_delay * 2^n` (500ms, 1s, 2s por defecto).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self { Self { max_retries: 3, base_delay: Duration::from_millis(500) } }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration { self.base_delay * 2u32.saturating_pow(retry) }

    /// Ejecuta `op` (recibe el número de intento, desde 0) hasta que tenga
    /// éxito, falle con un error no reintentable o se agoten los reintentos.
    pub fn run<T, Op, Sleep>(&self, mut op: Op, mut sleep: Sleep) -> Result<T, FetchError>
        where Op: FnMut(u32) -> Result<T, FetchError>,
              Sleep: FnMut(Duration)
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!("fetch:retry attempt={} error={} sleep_ms={}", attempt + 1, e, delay.as_millis());
                    sleep(delay);
                    attempt += 1;
                }
                r => return r,
            }
        }
    }
}

fn truncated_body(resp: ureq::Response) -> String {
    let mut buf = Vec::with_capacity(1024);
    let _ = resp.into_reader().take(MAX_ERROR_BODY as u64).read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).trim().to_string()
}

pub struct HttpFetcher {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(cfg: &SourceConfig) -> Result<Self, FetchError> {
        if cfg.base_url.is_empty() {
            return Err(FetchError::Config("EXTERNAL_API_BASE_URL is empty".into()));
        }
        let agent = ureq::AgentBuilder::new().timeout(cfg.timeout).build();
        Ok(Self { agent, base_url: cfg.base_url.clone(), token: cfg.token.clone(), retry: RetryPolicy::default() })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, kind: SourceKind) -> String { format!("{}/{}", self.base_url, kind.resource()) }

    fn get_once(&self, kind: SourceKind, page: i64, per_page: i64) -> Result<String, FetchError> {
        let mut req = self.agent
                          .get(&self.endpoint(kind))
                          .query("page", &page.to_string())
                          .query("per_page", &per_page.to_string())
                          .set("Accept", "application/json");
        if let Some(token) = &self.token {
            req = req.set("Authorization", &format!("Basic {token}"));
        }
        match req.call() {
            Ok(resp) => resp.into_string().map_err(|e| FetchError::Transport(format!("reading body: {e}"))),
            Err(ureq::Error::Status(code, resp)) => Err(FetchError::Status { code, body: truncated_body(resp) }),
            Err(ureq::Error::Transport(err)) => Err(FetchError::Transport(err.to_string())),
        }
    }
}

impl SourceClient for HttpFetcher {
    fn fetch_page(&self, kind: SourceKind, page: i64, per_page: i64) -> Result<SourcePage, FetchError> {
        debug!("fetch:start kind={kind} page={page} per_page={per_page}");
        let body = self.retry.run(|_| self.get_once(kind, page, per_page), std::thread::sleep)?;
        let out = decode_page(kind, &body)?;
        debug!("fetch:done kind={kind} page={page} records={} total_pages={}",
               out.records.len(),
               out.meta.total_pages);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn decodes_envelope_and_keeps_raw_bytes() {
        let body = r#"{"success":true,"total_count":3,"per_page":2,"current_page":1,"total_pages":2,
                       "users":[{"id":1, "name":"A"},{"id":2}]}"#;
        let page = decode_page(SourceKind::Persons, body).unwrap();
        assert_eq!(page.meta, PageMeta { page: 1, per_page: 2, total_pages: 2, total_count: 3 });
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].as_str(), r#"{"id":1, "name":"A"}"#);
        assert!(decode_page(SourceKind::Contracts, body).unwrap().records.is_empty());
    }

    #[test]
    fn invalid_envelope_is_a_decode_error() {
        assert!(matches!(decode_page(SourceKind::Persons, "<html>"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn retries_retryable_errors_with_doubling_delays() {
        let sleeps = RefCell::new(Vec::new());
        let mut calls = 0;
        let r: Result<(), _> = RetryPolicy::default().run(|_| {
                                                              calls += 1;
                                                              Err(FetchError::Status { code: 503, body: String::new() })
                                                          },
                                                          |d| sleeps.borrow_mut().push(d));
        assert!(matches!(r, Err(FetchError::Status { code: 503, .. })));
        assert_eq!(calls, 4);
        assert_eq!(sleeps.into_inner(),
                   vec![Duration::from_millis(500), Duration::from_millis(1000), Duration::from_millis(2000)]);
    }

    #[test]
    fn non_retryable_status_fails_immediately() {
        let mut calls = 0;
        let r: Result<(), _> = RetryPolicy::default().run(|_| {
                                                              calls += 1;
                                                              Err(FetchError::Status { code: 404, body: "nope".into() })
                                                          },
                                                          |_| panic!("must not sleep"));
        assert_eq!(r, Err(FetchError::Status { code: 404, body: "nope".into() }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn recovers_after_transport_error() {
        let r = RetryPolicy::default().run(|attempt| if attempt == 0 { Err(FetchError::Transport("reset".into())) } else { Ok(attempt) },
                                           |_| {});
        assert_eq!(r, Ok(1));
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let cfg = SourceConfig { base_url: String::new(), token: None, timeout: Duration::from_secs(1) };
        assert!(matches!(HttpFetcher::new(&cfg), Err(FetchError::Config(_))));
    }
}
