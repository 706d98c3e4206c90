//! Lease lifecycle tests on a paused tokio clock.
//!
//! The secret-issuing service and the data store are replaced by the doubles
//! in `common`, so these tests drive the renewal schedule deterministically.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{credential, test_config, MockConnection, MockDriver, MockSecretIssuer};
use leasewarden::errors::{ConnectionError, Error, HandleError, IssuanceError, RenewalError};
use leasewarden::secrets::LeaseRenewal;
use leasewarden::{ConnectionHandle, LeaseEngine, RenewerState};
use tokio::time::{sleep, sleep_until, Instant};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
async fn test_startup_installs_connection() {
    let issuer = MockSecretIssuer::new(1800);
    let driver = MockDriver::new();
    let stats = driver.stats();

    let engine = LeaseEngine::start_with(issuer.clone(), driver, &test_config()).await.unwrap();

    let lease = engine.current_lease();
    assert_eq!(lease.lease_id, "database/creds/app-role/lease-1");
    assert_eq!(lease.lease_duration_secs, 1800);
    assert_eq!(engine.handle().query("SELECT 1").await.unwrap(), vec!["v-k8s-app-role-1"]);
    assert_eq!(stats.live(), 1);
    assert!(matches!(engine.renewer_state(), RenewerState::Scheduled { wait, .. } if wait == secs(1206)));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_handle_before_first_connect() {
    let handle: ConnectionHandle<MockConnection> = ConnectionHandle::new();

    assert!(matches!(handle.query("SELECT 1").await, Err(HandleError::NotInitialized)));
    assert!(matches!(handle.execute("UPDATE t SET x = 1").await, Err(HandleError::NotInitialized)));
    assert_eq!(
        handle.query("SELECT 1").await.unwrap_err().to_string(),
        "Database connection not initialized"
    );
}

#[tokio::test(start_paused = true)]
async fn test_renewal_keeps_lease_id() {
    let start = Instant::now();
    let issuer = MockSecretIssuer::new(1800);

    let engine =
        LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &test_config()).await.unwrap();
    let original = engine.current_lease();

    sleep_until(start + secs(1207)).await;
    let renewed = issuer.renewed();
    assert_eq!(renewed.len(), 1);
    assert_eq!(renewed[0].0, original.lease_id);
    assert_eq!(renewed[0].1 - start, secs(1206));

    let lease = engine.current_lease();
    assert_eq!(lease.lease_id, original.lease_id);
    assert_eq!(lease.lease_duration_secs, 1800);

    sleep_until(start + secs(2413)).await;
    let renewed = issuer.renewed();
    assert_eq!(renewed.len(), 2);
    assert_eq!(renewed[1].0, original.lease_id);
    assert_eq!(renewed[1].1 - renewed[0].1, secs(1206));

    assert_eq!(issuer.issue_count(), 1);
    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_renewal_uses_returned_duration() {
    let start = Instant::now();
    let issuer = MockSecretIssuer::new(1800);
    issuer.push_renewal(Ok(LeaseRenewal {
        lease_id: "database/creds/app-role/lease-1".to_string(),
        lease_duration_secs: 600,
        renewable: true,
    }));

    let engine =
        LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &test_config()).await.unwrap();

    sleep_until(start + secs(1207)).await;
    assert_eq!(engine.current_lease().lease_duration_secs, 600);
    assert!(matches!(engine.renewer_state(), RenewerState::Scheduled { wait, .. } if wait == secs(402)));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_renewal_regenerates() {
    let start = Instant::now();
    let issuer = MockSecretIssuer::new(1800);
    issuer.push_credential(Ok(credential(1, 1800)));
    issuer.push_credential(Ok(credential(2, 900)));
    issuer.push_renewal(Err(RenewalError::lease_not_found(
        "database/creds/app-role/lease-1",
        "lease not found",
    )));

    let driver = MockDriver::new();
    let stats = driver.stats();
    let engine = LeaseEngine::start_with(issuer.clone(), driver, &test_config()).await.unwrap();
    let original = engine.current_lease();

    sleep_until(start + secs(1207)).await;
    let lease = engine.current_lease();
    assert_ne!(lease.lease_id, original.lease_id);
    assert_eq!(lease.lease_id, "database/creds/app-role/lease-2");
    assert_eq!(lease.lease_duration_secs, 900);

    // Exactly one connection open, and it uses the new credential
    assert_eq!(stats.opened(), 2);
    assert_eq!(stats.live(), 1);
    assert_eq!(engine.handle().query("SELECT 1").await.unwrap(), vec!["v-k8s-app-role-2"]);

    // Next renewal 603s after the regeneration
    sleep_until(start + secs(1810)).await;
    let renewed = issuer.renewed();
    assert_eq!(renewed.len(), 2);
    assert_eq!(renewed[1].0, "database/creds/app-role/lease-2");
    assert_eq!(renewed[1].1 - start, secs(1809));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_query_during_regeneration_sees_open_connection() {
    let start = Instant::now();
    let issuer = MockSecretIssuer::new(1800);
    issuer.push_renewal(Err(RenewalError::backend_unavailable("connection reset")));

    let driver = MockDriver::with_query_delay(secs(10));
    let stats = driver.stats();
    let engine = LeaseEngine::start_with(issuer.clone(), driver, &test_config()).await.unwrap();
    let handle = engine.handle();

    // In flight from 1200s to 1210s, straddling the 1206s regeneration
    sleep_until(start + secs(1200)).await;
    let in_flight = {
        let handle = Arc::clone(&handle);
        tokio::spawn(async move { handle.query("SELECT pg_sleep(10)").await })
    };

    sleep_until(start + secs(1230)).await;
    assert_eq!(in_flight.await.unwrap().unwrap(), vec!["v-k8s-app-role-1"]);
    assert_eq!(handle.query("SELECT 1").await.unwrap(), vec!["v-k8s-app-role-2"]);
    assert_eq!(stats.live(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_regeneration_failures_back_off() {
    let start = Instant::now();
    let issuer = MockSecretIssuer::new(1800);
    issuer.push_credential(Ok(credential(1, 1800)));
    for _ in 0..3 {
        issuer.push_credential(Err(IssuanceError::backend_unavailable("Vault is sealed")));
    }
    for _ in 0..4 {
        issuer.push_renewal(Err(RenewalError::backend_unavailable("Vault is sealed")));
    }

    let engine =
        LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &test_config()).await.unwrap();

    sleep_until(start + secs(1207)).await;
    match engine.renewer_state() {
        RenewerState::Failed { consecutive_failures, retry_at, error } => {
            assert_eq!(consecutive_failures, 1);
            assert_eq!(retry_at - start, secs(1211));
            assert!(error.contains("Vault is sealed"), "{}", error);
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    // Callers keep the original connection while the service is down
    assert_eq!(engine.handle().query("SELECT 1").await.unwrap(), vec!["v-k8s-app-role-1"]);

    sleep_until(start + secs(1300)).await;
    let offsets: Vec<Duration> = issuer.issued().iter().map(|(_, at)| *at - start).collect();
    assert_eq!(offsets, vec![secs(0), secs(1206), secs(1211), secs(1221), secs(1241)]);

    // Each failed cycle tried renewal first
    assert_eq!(issuer.renew_count(), 4);
    assert!(matches!(engine.renewer_state(), RenewerState::Scheduled { .. }));
    assert_eq!(engine.current_lease().lease_id, "database/creds/app-role/lease-5");

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_non_renewable_lease_is_regenerated() {
    let start = Instant::now();
    let issuer = MockSecretIssuer::new(1800);
    let mut first = credential(1, 100);
    first.renewable = false;
    issuer.push_credential(Ok(first));

    let engine =
        LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &test_config()).await.unwrap();

    sleep_until(start + secs(68)).await;
    assert_eq!(issuer.renew_count(), 0);
    assert_eq!(issuer.issue_count(), 2);
    assert_eq!(engine.current_lease().lease_id, "database/creds/app-role/lease-2");

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_zero_duration_lease_never_spins() {
    let start = Instant::now();
    let issuer = MockSecretIssuer::new(0);

    let engine =
        LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &test_config()).await.unwrap();
    assert!(matches!(engine.renewer_state(), RenewerState::Scheduled { wait, .. } if wait == secs(1)));

    sleep(Duration::from_millis(3500)).await;
    let renewed = issuer.renewed();
    assert_eq!(renewed.len(), 3);
    assert_eq!(renewed[0].1 - start, secs(1));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_startup_fails_when_issuance_fails() {
    let issuer = MockSecretIssuer::new(1800);
    issuer.push_credential(Err(IssuanceError::rejected(403, "permission denied")));

    let result = LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &test_config()).await;
    assert!(matches!(result, Err(Error::Issuance(IssuanceError::Rejected { status: 403, .. }))));
}

#[tokio::test(start_paused = true)]
async fn test_startup_open_failure_revokes_lease() {
    let issuer = MockSecretIssuer::new(1800);
    let driver = MockDriver::new();
    driver.stats().set_fail_open(true);

    let result = LeaseEngine::start_with(issuer.clone(), driver, &test_config()).await;
    assert!(matches!(result, Err(Error::Connection(ConnectionError::OpenFailed { .. }))));
    assert_eq!(issuer.revoked(), vec!["database/creds/app-role/lease-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_startup_ping_failure_closes_connection() {
    let issuer = MockSecretIssuer::new(1800);
    let driver = MockDriver::new();
    let stats = driver.stats();
    stats.set_fail_ping(true);

    let result = LeaseEngine::start_with(issuer.clone(), driver, &test_config()).await;
    assert!(matches!(result, Err(Error::Connection(ConnectionError::LivenessCheckFailed { .. }))));
    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.live(), 0);
    assert_eq!(issuer.revoked().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_regeneration_connect_failure_keeps_old_connection() {
    let start = Instant::now();
    let issuer = MockSecretIssuer::new(1800);
    issuer.push_renewal(Err(RenewalError::not_renewable("database/creds/app-role/lease-1")));

    let driver = MockDriver::new();
    let stats = driver.stats();
    let engine = LeaseEngine::start_with(issuer.clone(), driver, &test_config()).await.unwrap();

    stats.set_fail_open(true);
    sleep_until(start + secs(1207)).await;

    assert!(matches!(engine.renewer_state(), RenewerState::Failed { consecutive_failures: 1, .. }));
    assert_eq!(engine.current_lease().lease_id, "database/creds/app-role/lease-1");
    assert_eq!(engine.handle().query("SELECT 1").await.unwrap(), vec!["v-k8s-app-role-1"]);
    assert_eq!(issuer.revoked(), vec!["database/creds/app-role/lease-2".to_string()]);

    // The retry renews the original lease first, which succeeds here
    sleep_until(start + secs(1212)).await;
    assert!(matches!(engine.renewer_state(), RenewerState::Scheduled { .. }));
    assert_eq!(issuer.renew_count(), 2);
    assert_eq!(engine.current_lease().lease_id, "database/creds/app-role/lease-1");
    assert_eq!(stats.live(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_revokes_and_closes() {
    let start = Instant::now();
    let issuer = MockSecretIssuer::new(1800);
    let driver = MockDriver::new();
    let stats = driver.stats();

    let engine = LeaseEngine::start_with(issuer.clone(), driver, &test_config()).await.unwrap();
    let handle = engine.handle();
    let mut state = engine.subscribe_state();

    sleep(secs(10)).await;
    engine.shutdown().await.unwrap();

    // Cancellation interrupts the sleep rather than waiting for the renewal
    assert!(Instant::now() - start < secs(1206));
    assert_eq!(issuer.renew_count(), 0);
    assert_eq!(issuer.revoked(), vec!["database/creds/app-role/lease-1".to_string()]);
    assert_eq!(stats.live(), 0);
    assert!(matches!(handle.query("SELECT 1").await, Err(HandleError::Closed)));
    assert_eq!(*state.borrow_and_update(), RenewerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_without_revocation() {
    let issuer = MockSecretIssuer::new(1800);
    let mut config = test_config();
    config.renewal.revoke_on_shutdown = false;

    let engine = LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &config).await.unwrap();
    engine.shutdown().await.unwrap();

    assert!(issuer.revoked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ignores_revocation_failure() {
    let issuer = MockSecretIssuer::new(1800);
    issuer.push_revocation(Err(RenewalError::backend_unavailable("connection refused")));

    let engine =
        LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &test_config()).await.unwrap();
    assert!(engine.shutdown().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_lease_updates_are_published() {
    let issuer = MockSecretIssuer::new(1800);
    issuer.push_renewal(Err(RenewalError::lease_not_found("database/creds/app-role/lease-1", "expired")));

    let engine =
        LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &test_config()).await.unwrap();
    let mut leases = engine.subscribe_lease();

    let lease = leases
        .wait_for(|lease| lease.lease_id != "database/creds/app-role/lease-1")
        .await
        .unwrap()
        .clone();
    assert_eq!(lease.lease_id, "database/creds/app-role/lease-2");

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_rejected_before_issuance() {
    let issuer = MockSecretIssuer::new(1800);
    let mut config = test_config();
    config.database.ssl_mode = "sometimes".to_string();

    let result = LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &config).await;
    assert!(matches!(result, Err(Error::Config(ref msg)) if msg.contains("database.ssl_mode")));
    assert_eq!(issuer.issue_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_min_wait_rejected_before_issuance() {
    let issuer = MockSecretIssuer::new(1800);
    let mut config = test_config();
    config.renewal.min_wait_seconds = u64::MAX;

    let result = LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &config).await;
    assert!(matches!(result, Err(Error::Config(ref msg)) if msg.contains("min_wait_seconds")));
    assert_eq!(issuer.issue_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_year_long_min_wait_schedules_without_overflow() {
    let issuer = MockSecretIssuer::new(1800);
    let mut config = test_config();
    config.renewal.min_wait_seconds = 31_536_000;

    let engine = LeaseEngine::start_with(issuer.clone(), MockDriver::new(), &config).await.unwrap();
    assert!(matches!(
        engine.renewer_state(),
        RenewerState::Scheduled { wait, .. } if wait == secs(31_536_000)
    ));

    sleep(secs(3600)).await;
    assert_eq!(issuer.renew_count(), 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_bound_parameters_pass_through_handle() {
    let issuer = MockSecretIssuer::new(1800);
    let engine = LeaseEngine::start_with(issuer, MockDriver::new(), &test_config()).await.unwrap();

    let rows = engine
        .handle()
        .query_with("SELECT $1::text", vec!["orders".to_string()])
        .await
        .unwrap();
    assert_eq!(rows, vec!["v-k8s-app-role-1", "orders"]);
    assert_eq!(
        engine.handle().execute_with("DELETE FROM t WHERE id = $1", vec!["7".to_string()]).await.unwrap(),
        1
    );

    engine.shutdown().await.unwrap();
}
