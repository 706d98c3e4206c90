//! Shared test doubles for the lease lifecycle tests.
//!
//! - [`MockSecretIssuer`]: scripted credential, renew and revoke responses,
//!   recording when each call happened on the (paused) tokio clock
//! - [`MockDriver`]: in-memory connections that count how many are open

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use leasewarden::config::EngineConfig;
use leasewarden::errors::{IssuanceError, RenewalError, StoreError};
use leasewarden::secrets::{Credential, LeaseRenewal, SecretIssuer, SecretString};
use leasewarden::storage::{ConnectParams, DataStoreConnection, DataStoreDriver};

/// Build a credential the way the database secrets engine would.
pub fn credential(n: usize, lease_duration_secs: u64) -> Credential {
    Credential {
        username: format!("v-k8s-app-role-{}", n),
        password: SecretString::new(format!("pw-{}", n)),
        lease_id: format!("database/creds/app-role/lease-{}", n),
        lease_duration_secs,
        renewable: true,
    }
}

/// Engine configuration with defaults and shutdown revocation enabled.
pub fn test_config() -> EngineConfig {
    EngineConfig::default()
}

#[derive(Default)]
struct IssuerScript {
    credentials: VecDeque<Result<Credential, IssuanceError>>,
    renewals: VecDeque<Result<LeaseRenewal, RenewalError>>,
    revocations: VecDeque<Result<(), RenewalError>>,
    issued: Vec<(String, Instant)>,
    renewed: Vec<(String, Instant)>,
    revoked: Vec<String>,
    next_id: usize,
}

/// Scripted [`SecretIssuer`].
///
/// When a queue is empty the issuer falls back to success: a new credential
/// with `default_duration`, or a renewal echoing the lease ID with the same
/// duration.
pub struct MockSecretIssuer {
    script: Mutex<IssuerScript>,
    default_duration: u64,
}

impl MockSecretIssuer {
    pub fn new(default_duration: u64) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(IssuerScript::default()), default_duration })
    }

    pub fn push_credential(&self, result: Result<Credential, IssuanceError>) {
        self.script.lock().unwrap().credentials.push_back(result);
    }

    pub fn push_renewal(&self, result: Result<LeaseRenewal, RenewalError>) {
        self.script.lock().unwrap().renewals.push_back(result);
    }

    pub fn push_revocation(&self, result: Result<(), RenewalError>) {
        self.script.lock().unwrap().revocations.push_back(result);
    }

    /// Lease IDs issued so far, with the time of each request.
    pub fn issued(&self) -> Vec<(String, Instant)> {
        self.script.lock().unwrap().issued.clone()
    }

    /// Lease IDs renewed so far, with the time of each request.
    pub fn renewed(&self) -> Vec<(String, Instant)> {
        self.script.lock().unwrap().renewed.clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.script.lock().unwrap().revoked.clone()
    }

    pub fn issue_count(&self) -> usize {
        self.script.lock().unwrap().issued.len()
    }

    pub fn renew_count(&self) -> usize {
        self.script.lock().unwrap().renewed.len()
    }
}

#[async_trait]
impl SecretIssuer for MockSecretIssuer {
    async fn read_dynamic_credential(&self, _role: &str) -> Result<Credential, IssuanceError> {
        let mut script = self.script.lock().unwrap();
        script.next_id += 1;
        let n = script.next_id;

        let result = script
            .credentials
            .pop_front()
            .unwrap_or_else(|| Ok(credential(n, self.default_duration)));

        let recorded = match &result {
            Ok(credential) => credential.lease_id.clone(),
            Err(_) => format!("<failed-{}>", n),
        };
        script.issued.push((recorded, Instant::now()));
        result
    }

    async fn renew_lease(
        &self,
        lease_id: &str,
        _increment: Option<Duration>,
    ) -> Result<LeaseRenewal, RenewalError> {
        let mut script = self.script.lock().unwrap();
        script.renewed.push((lease_id.to_string(), Instant::now()));

        script.renewals.pop_front().unwrap_or_else(|| {
            Ok(LeaseRenewal {
                lease_id: lease_id.to_string(),
                lease_duration_secs: self.default_duration,
                renewable: true,
            })
        })
    }

    async fn revoke_lease(&self, lease_id: &str) -> Result<(), RenewalError> {
        let mut script = self.script.lock().unwrap();
        script.revoked.push(lease_id.to_string());
        script.revocations.pop_front().unwrap_or(Ok(()))
    }
}

/// Counters shared between a [`MockDriver`] and the connections it opens.
#[derive(Debug, Default)]
pub struct DriverStats {
    pub opened: AtomicUsize,
    pub live: AtomicUsize,
    pub fail_open: AtomicBool,
    pub fail_ping: AtomicBool,
}

impl DriverStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_ping(&self, fail: bool) {
        self.fail_ping.store(fail, Ordering::SeqCst);
    }
}

/// In-memory driver. Queries return the connection's username.
#[derive(Clone, Default)]
pub struct MockDriver {
    stats: Arc<DriverStats>,
    query_delay: Duration,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every query take `delay` on the tokio clock.
    pub fn with_query_delay(delay: Duration) -> Self {
        Self { stats: Arc::default(), query_delay: delay }
    }

    pub fn stats(&self) -> Arc<DriverStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl DataStoreDriver for MockDriver {
    type Connection = MockConnection;

    async fn open(&self, params: &ConnectParams) -> Result<MockConnection, StoreError> {
        if self.stats.fail_open.load(Ordering::SeqCst) {
            return Err(StoreError::other(format!(
                "password authentication failed for user \"{}\"",
                params.username
            )));
        }

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        self.stats.live.fetch_add(1, Ordering::SeqCst);

        Ok(MockConnection {
            username: params.username.clone(),
            stats: Arc::clone(&self.stats),
            query_delay: self.query_delay,
            closed: AtomicBool::new(false),
        })
    }
}

pub struct MockConnection {
    pub username: String,
    stats: Arc<DriverStats>,
    query_delay: Duration,
    closed: AtomicBool,
}

#[async_trait]
impl DataStoreConnection for MockConnection {
    type Row = String;
    /// Bound values are echoed back after the username.
    type Args = Vec<String>;

    async fn ping(&self) -> Result<(), StoreError> {
        if self.stats.fail_ping.load(Ordering::SeqCst) {
            return Err(StoreError::other("server closed the connection unexpectedly"));
        }
        Ok(())
    }

    async fn query_with(&self, _statement: &str, args: Vec<String>) -> Result<Vec<String>, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }
        // The connection must stay open for the whole call
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let mut rows = vec![self.username.clone()];
        rows.extend(args);
        Ok(rows)
    }

    async fn execute_with(&self, _statement: &str, _args: Vec<String>) -> Result<u64, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(1)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
