//! Hardware enrichment: one metadata fetch after registration settles, then unlock
//! submission whatever the outcome.

use crate::api::HostFacts;
use crate::poller::PollContext;
use crate::progress::StepEvent;
use crate::retry::Attempt;
use crate::session::RunSession;

/// Copy CPU, memory, and disk facts onto matching hosts. Hosts missing from `facts`
/// keep what they had. Returns the number of hosts whose facts changed.
pub fn apply_host_facts(session: &mut RunSession, facts: &[HostFacts]) -> usize {
    let hosts = session.hosts_mut();
    let mut updated = 0;
    for fact in facts {
        let Some(current) = hosts.find(&fact.host_name) else {
            tracing::debug!("[Enrichment] No record for {}", fact.host_name);
            continue;
        };
        let cpu = fact.cpu_count.filter(|cpu| current.cpu != Some(*cpu));
        let memory = fact.total_mem.filter(|mem| current.memory_kb != Some(*mem));
        let disks = fact
            .disk_info
            .as_ref()
            .filter(|disks| current.disk_info.as_ref() != Some(*disks));
        if cpu.is_none() && memory.is_none() && disks.is_none() {
            continue;
        }
        let Some(host) = hosts.find_mut(&fact.host_name) else {
            continue;
        };
        if let Some(cpu) = cpu {
            host.cpu = Some(cpu);
        }
        if let Some(mem) = memory {
            host.memory_kb = Some(mem);
        }
        if let Some(disks) = disks {
            host.disk_info = Some(disks.clone());
        }
        updated += 1;
    }
    updated
}

pub async fn run_enrichment(ctx: &PollContext) {
    let cancel = ctx.session.lock().await.cancel_token();
    let api = &ctx.api;
    let attempt = ctx
        .retry
        .run("host metadata fetch", &cancel, || api.host_metadata())
        .await;

    let mut session = ctx.session.lock().await;
    if session.is_discarded() {
        return;
    }

    match attempt {
        Attempt::Done(facts) => {
            let updated = apply_host_facts(&mut session, &facts);
            tracing::info!("[Enrichment] Hardware facts updated for {} host(s)", updated);
        }
        Attempt::Cancelled => return,
        Attempt::Exhausted(e) => {
            tracing::warn!(
                "[Enrichment] Getting host information (cpu_count and total_mem) failed: {}",
                e
            );
            ctx.reporter.emit(StepEvent::notice(
                "Host information unavailable",
                "Could not retrieve CPU, memory and disk information for the hosts.",
            ));
        }
    }

    // A registration window reopened meanwhile keeps submission locked until it settles.
    if session.registration_started_at().is_some() {
        tracing::debug!("[Enrichment] Registration still open, submission stays locked");
        return;
    }
    session.unlock_submission();
    drop(session);
    ctx.reporter.emit(StepEvent::SubmissionUnlocked);
}
