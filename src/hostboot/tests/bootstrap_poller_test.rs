//! Tests for bootstrap status polling
//!
//! Cycle application against a session, and full poll chains on a paused clock:
//! hand-off to registration, bootstrap deadline, and abandoning after retries.

mod common;

use common::{poll_context, report, status_changes, wait_for_unlock, ScriptedApi};
use hostboot::api::RequestId;
use hostboot::config::PollingConfig;
use hostboot::host::BootStatus;
use hostboot::poller::bootstrap::{BOOTSTRAP_TIMEOUT_LOG, BOOTSTRAP_UNAVAILABLE_LOG};
use hostboot::poller::{apply_bootstrap_reports, fail_stalled_hosts, run_bootstrap};
use hostboot::progress::StepEvent;
use hostboot::session::RunSession;
use std::time::Duration;

fn session_with(hosts: &[&str]) -> RunSession {
    let mut session = RunSession::new(Duration::from_secs(120));
    session.hosts_mut().add_hosts(hosts.iter().copied());
    session
}

fn tracked(hosts: &[&str]) -> Vec<String> {
    hosts.iter().map(|h| h.to_string()).collect()
}

#[test]
fn test_cycle_starts_registration_when_a_host_finishes() {
    let mut session = session_with(&["h1", "h2"]);
    let cycle = apply_bootstrap_reports(
        &mut session,
        &tracked(&["h1", "h2"]),
        &[
            report("h1", BootStatus::Done, "h1 installed"),
            report("h2", BootStatus::Running, "h2 installing"),
        ],
    );

    assert!(cycle.start_registration);
    assert!(cycle.keep_polling);
    assert_eq!(cycle.changes.len(), 2);
    assert_eq!(session.hosts().status("h1"), Some(BootStatus::Done));
    assert_eq!(session.hosts().status("h2"), Some(BootStatus::Running));
}

#[test]
fn test_cycle_without_finished_hosts_keeps_polling() {
    let mut session = session_with(&["h1"]);
    let cycle = apply_bootstrap_reports(
        &mut session,
        &tracked(&["h1"]),
        &[report("h1", BootStatus::Running, "working")],
    );
    assert!(!cycle.start_registration);
    assert!(cycle.keep_polling);

    // Same report again: nothing changes at all
    let again = apply_bootstrap_reports(
        &mut session,
        &tracked(&["h1"]),
        &[report("h1", BootStatus::Running, "working")],
    );
    assert!(again.changes.is_empty());
    assert!(!again.start_registration);
    assert_eq!(session.hosts().find("h1").unwrap().boot_log.as_str(), "working");
}

#[test]
fn test_empty_report_keeps_pending_hosts_polling() {
    let mut session = session_with(&["h1"]);
    let cycle = apply_bootstrap_reports(&mut session, &tracked(&["h1"]), &[]);
    assert!(cycle.keep_polling);
    assert!(cycle.changes.is_empty());
}

#[test]
fn test_untracked_hosts_are_ignored() {
    let mut session = session_with(&["h1", "h2"]);
    let cycle = apply_bootstrap_reports(
        &mut session,
        &tracked(&["h2"]),
        &[
            report("h1", BootStatus::Failed, "stale request"),
            report("h2", BootStatus::Done, "ok"),
        ],
    );
    assert_eq!(session.hosts().status("h1"), Some(BootStatus::Pending));
    assert_eq!(session.hosts().status("h2"), Some(BootStatus::Done));
    assert!(!cycle.keep_polling);
    assert!(cycle.start_registration);
}

#[test]
fn test_registering_host_ignores_bootstrap_failure() {
    let mut session = session_with(&["h1"]);
    session
        .hosts_mut()
        .set_status("h1", BootStatus::Done, None);
    session
        .hosts_mut()
        .set_status("h1", BootStatus::Registering, None);

    let cycle = apply_bootstrap_reports(
        &mut session,
        &tracked(&["h1"]),
        &[report("h1", BootStatus::Failed, "lost connection")],
    );
    assert!(cycle.changes.is_empty());
    assert!(!cycle.start_registration);
    assert!(!cycle.keep_polling);
    assert_eq!(session.hosts().status("h1"), Some(BootStatus::Registering));
}

#[test]
fn test_fail_stalled_hosts() {
    let mut session = session_with(&["h1", "h2", "h3"]);
    session.hosts_mut().set_status("h2", BootStatus::Running, None);
    session.hosts_mut().set_status("h3", BootStatus::Done, None);

    let changes = fail_stalled_hosts(
        &mut session,
        &tracked(&["h1", "h2", "h3"]),
        BOOTSTRAP_TIMEOUT_LOG,
    );
    let failed: Vec<_> = changes.iter().map(|c| c.host.as_str()).collect();
    assert_eq!(failed, vec!["h1", "h2"]);
    assert_eq!(session.hosts().status("h3"), Some(BootStatus::Done));
    assert_eq!(
        session.hosts().find("h2").unwrap().boot_log.as_str(),
        BOOTSTRAP_TIMEOUT_LOG
    );
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_chain_hands_off_to_registration() {
    let api = ScriptedApi::new();
    api.push_bootstrap(Ok(vec![
        report("h1", BootStatus::Done, "ok"),
        report("h2", BootStatus::Running, "..."),
    ]));
    api.push_bootstrap(Ok(vec![
        report("h1", BootStatus::Done, "ok"),
        report("h2", BootStatus::Done, "...ok"),
    ]));
    api.push_registry(Ok(&[]));
    api.push_registry(Ok(&["h1", "h2"]));

    let (ctx, mut rx) = poll_context(api.clone(), &["h1", "h2"]).await;
    run_bootstrap(ctx.clone(), RequestId("9".into()), tracked(&["h1", "h2"])).await;
    assert_eq!(api.bootstrap_poll_count(), 2);
    assert!(api
        .bootstrap_polls
        .lock()
        .unwrap()
        .iter()
        .all(|id| id.as_str() == "9"));

    let events = wait_for_unlock(&mut rx).await;
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == StepEvent::RegistrationStarted)
            .count(),
        1
    );
    let session = ctx.session.lock().await;
    assert_eq!(session.hosts().status("h1"), Some(BootStatus::Registered));
    assert_eq!(session.hosts().status("h2"), Some(BootStatus::Registered));
    assert!(!session.is_submit_disabled());
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_deadline_fails_stalled_hosts() {
    let api = ScriptedApi::new();
    api.push_bootstrap(Ok(vec![report("h1", BootStatus::Running, "stuck")]));

    let (ctx, mut rx) = poll_context(api.clone(), &["h1"]).await;
    let started = tokio::time::Instant::now();
    run_bootstrap(ctx.clone(), RequestId("1".into()), tracked(&["h1"])).await;

    let deadline = PollingConfig::default().bootstrap_timeout();
    assert!(started.elapsed() > deadline);
    assert!(started.elapsed() < deadline + Duration::from_secs(10));

    let events = wait_for_unlock(&mut rx).await;
    assert_eq!(
        status_changes(&events, "h1"),
        vec![
            (BootStatus::Pending, BootStatus::Running),
            (BootStatus::Running, BootStatus::Failed)
        ]
    );
    let session = ctx.session.lock().await;
    let host = session.hosts().find("h1").unwrap();
    assert_eq!(host.boot_status, BootStatus::Failed);
    assert!(host.boot_log.as_str().ends_with(BOOTSTRAP_TIMEOUT_LOG));
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_chain_abandoned_after_retries() {
    let api = ScriptedApi::new();
    api.push_bootstrap(Err("connection reset".into()));

    let (ctx, mut rx) = poll_context(api.clone(), &["h1", "h2"]).await;
    run_bootstrap(ctx.clone(), RequestId("1".into()), tracked(&["h1", "h2"])).await;

    // One attempt plus two retries
    assert_eq!(api.bootstrap_poll_count(), 3);

    let events = wait_for_unlock(&mut rx).await;
    assert!(events.iter().any(|e| matches!(
        e,
        StepEvent::Notice { header, .. } if header == "Bootstrap status unavailable"
    )));
    let session = ctx.session.lock().await;
    for name in ["h1", "h2"] {
        let host = session.hosts().find(name).unwrap();
        assert_eq!(host.boot_status, BootStatus::Failed);
        assert_eq!(host.boot_log.as_str(), BOOTSTRAP_UNAVAILABLE_LOG);
    }
    assert_eq!(api.metadata_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_discarded_session_stops_chain() {
    let api = ScriptedApi::new();
    api.push_bootstrap(Ok(vec![report("h1", BootStatus::Running, "")]));

    let (ctx, _rx) = poll_context(api.clone(), &["h1"]).await;
    let handle = tokio::spawn(run_bootstrap(
        ctx.clone(),
        RequestId("1".into()),
        tracked(&["h1"]),
    ));
    tokio::time::sleep(Duration::from_secs(10)).await;
    ctx.session.lock().await.discard();
    handle.await.unwrap();

    let polls = api.bootstrap_poll_count();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(api.bootstrap_poll_count(), polls);
    assert!(ctx.session.lock().await.hosts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reclaimed_host_ignored_by_older_chain() {
    let api = ScriptedApi::new();
    api.push_bootstrap(Ok(vec![report("h1", BootStatus::Running, "installing")]));

    let (ctx, _rx) = poll_context(api.clone(), &["h1"]).await;
    let handle = tokio::spawn(run_bootstrap(
        ctx.clone(),
        RequestId("1".into()),
        tracked(&["h1"]),
    ));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(
        ctx.session.lock().await.hosts().status("h1"),
        Some(BootStatus::Running)
    );

    // A newer launch takes h1 over; request 1 still reports it as finished
    let claim = ctx.session.lock().await.claim_bootstrap(&tracked(&["h1"]));
    api.push_bootstrap(Ok(vec![report("h1", BootStatus::Done, "installing\nok")]));
    handle.await.unwrap();

    let session = ctx.session.lock().await;
    assert!(session.owns_bootstrap("h1", claim));
    assert!(!session.owns_bootstrap("h1", claim - 1));
    assert_eq!(session.hosts().status("h1"), Some(BootStatus::Running));
    assert!(session.registration_started_at().is_none());
}
