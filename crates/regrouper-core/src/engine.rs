//! Cycle controller

use regrouper_backend_api::{Agent, Backend};
use regrouper_config::{AssignmentConfig, Policy, RuleSet};
use regrouper_store::AuditSink;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::{
    Action, CycleOutcome, CyclePhase, CycleReport, InventoryClient, MoveBatch, MoveExecutor,
    MoveFailure, PlannedMove, classify, decide,
};

/// Drives the fetch, classify, remediate and sleep loop.
///
/// Holds no state between cycles besides its configuration: every cycle
/// re-derives what to move from a fresh inventory, so a failed move is
/// simply planned again next time.
pub struct CycleController {
    rules: Arc<RuleSet>,
    settings: AssignmentConfig,
    inventory: InventoryClient,
    executor: Arc<MoveExecutor>,
    audit: Arc<dyn AuditSink>,
    phase: watch::Sender<CyclePhase>,
}

impl CycleController {
    pub fn new(
        rules: RuleSet,
        settings: AssignmentConfig,
        backend: Arc<dyn Backend>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        info!(
            rules = rules.len(),
            interval_secs = settings.interval.as_secs(),
            max_batch_size = settings.max_batch_size,
            max_concurrent_moves = settings.max_concurrent_moves,
            throttle_per_agent_ms = settings.throttle_per_agent.as_millis() as u64,
            simulation = settings.simulation_mode,
            audit = %audit.describe(),
            "Cycle controller initialized"
        );

        let executor = MoveExecutor::new(
            backend.clone(),
            &settings.rate_limit,
            settings.simulation_mode,
        )
        .with_throttle(settings.throttle_per_agent);
        let (phase, _) = watch::channel(CyclePhase::Idle);

        Self {
            rules: Arc::new(rules),
            settings,
            inventory: InventoryClient::new(backend),
            executor: Arc::new(executor),
            audit,
            phase,
        }
    }

    pub fn from_policy(
        policy: Policy,
        backend: Arc<dyn Backend>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::new(policy.rules, policy.assignment, backend, audit)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn settings(&self) -> &AssignmentConfig {
        &self.settings
    }

    /// Current phase
    pub fn phase(&self) -> CyclePhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<CyclePhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: CyclePhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!(from = %previous, to = %phase, "Cycle phase changed");
        }
    }

    /// Run cycles until `shutdown` becomes true. Returns the number of
    /// cycles run.
    ///
    /// Shutdown interrupts the sleep between cycles immediately. During a
    /// cycle it stops new move batches from starting and cuts the
    /// post-batch throttle short; in-flight batches finish first. Dropping
    /// the sender also counts as shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut cycles = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle(&shutdown).await;
            cycles += 1;

            if *shutdown.borrow() {
                break;
            }

            self.set_phase(CyclePhase::Sleeping);
            if self.sleep_until_next_cycle(&mut shutdown).await {
                break;
            }
        }

        self.set_phase(CyclePhase::Idle);
        info!(cycles, "Cycle controller stopped");
        cycles
    }

    /// Returns true if shutdown was requested during the sleep
    async fn sleep_until_next_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        debug!(
            interval_secs = self.settings.interval.as_secs(),
            "Sleeping until next cycle"
        );

        let sleep = tokio::time::sleep(self.settings.interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested while sleeping");
                        return true;
                    }
                }
            }
        }
    }

    /// One full pass over the inventory
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let mut report = CycleReport::start();
        info!(cycle_id = %report.cycle_id, "Cycle started");

        self.set_phase(CyclePhase::Fetching);
        let agents = match self.inventory.fetch_all().await {
            Ok(agents) => agents,
            Err(err) => {
                if err.is_auth() {
                    error!(
                        cycle_id = %report.cycle_id,
                        error = %err,
                        "Backend rejected credentials while fetching inventory"
                    );
                } else {
                    warn!(
                        cycle_id = %report.cycle_id,
                        kind = err.kind(),
                        error = %err,
                        "Inventory fetch failed, retrying next cycle"
                    );
                }
                report.fetch_error = Some(err);
                let report = report.finish(CycleOutcome::FetchFailed);
                report.log_summary();
                return report;
            }
        };
        report.fetched = agents.len();

        self.set_phase(CyclePhase::Classifying);
        let batches = self.plan(&agents, &mut report);

        self.set_phase(CyclePhase::Remediating);
        let outcome = self.remediate(batches, shutdown, &mut report).await;

        let report = report.finish(outcome);
        report.log_summary();
        report
    }

    /// Classify every eligible agent and group the required moves into
    /// batches, categories in declaration order.
    fn plan(&self, agents: &[Agent], report: &mut CycleReport) -> Vec<MoveBatch> {
        let mut by_category: BTreeMap<usize, Vec<PlannedMove>> = BTreeMap::new();

        for agent in agents {
            if let Some(sources) = &self.settings.source_groups
                && !sources.contains(&agent.group)
            {
                trace!(agent_id = %agent.id, group = %agent.group, "Agent not in a source group");
                continue;
            }
            report.eligible += 1;

            let category = match classify(agent, &self.rules) {
                Ok(category) => category,
                Err(miss) => {
                    warn!(
                        agent_id = %miss.agent_id,
                        hostname = %miss.hostname,
                        "No rule matches agent"
                    );
                    report.no_match.push(miss.agent_id);
                    continue;
                }
            };
            report.classified += 1;

            match decide(agent, &category) {
                Action::NoOp => {
                    trace!(
                        agent_id = %agent.id,
                        category = category.name(),
                        "Agent already in an accepted group"
                    );
                }
                Action::Move { from, to } => {
                    debug!(
                        agent_id = %agent.id,
                        hostname = %agent.hostname,
                        category = category.name(),
                        from = %from,
                        to = %to,
                        "Agent needs to move"
                    );
                    by_category.entry(category.index).or_default().push(PlannedMove {
                        agent_id: agent.id.clone(),
                        hostname: agent.hostname.clone(),
                        from,
                    });
                }
            }
        }

        report.planned = by_category.values().map(Vec::len).sum();

        let batch_size = self.settings.max_batch_size.max(1);
        let mut batches = Vec::new();
        for (index, moves) in by_category {
            let Some(rule) = self.rules.rules().get(index) else {
                continue;
            };
            for chunk in moves.chunks(batch_size) {
                batches.push(MoveBatch {
                    category: rule.name.clone(),
                    target: rule.target_group.clone(),
                    moves: chunk.to_vec(),
                });
            }
        }
        batches
    }

    async fn remediate(
        &self,
        batches: Vec<MoveBatch>,
        shutdown: &watch::Receiver<bool>,
        report: &mut CycleReport,
    ) -> CycleOutcome {
        if batches.is_empty() {
            debug!("No moves needed");
            return CycleOutcome::Completed;
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_moves.max(1)));
        let auth_failed = Arc::new(AtomicBool::new(false));
        let mut workers = JoinSet::new();
        let mut outcome = CycleOutcome::Completed;
        let total = batches.len();

        for (started, batch) in batches.into_iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let remaining = total - started;
            if *shutdown.borrow() {
                info!(remaining, "Shutdown requested, skipping remaining move batches");
                report.skipped_batches = remaining;
                outcome = CycleOutcome::Aborted;
                break;
            }
            if auth_failed.load(Ordering::SeqCst) {
                error!(
                    remaining,
                    "Backend rejected credentials, skipping remaining move batches this cycle"
                );
                report.skipped_batches = remaining;
                outcome = CycleOutcome::Aborted;
                break;
            }

            let executor = self.executor.clone();
            let audit = self.audit.clone();
            let auth_failed = auth_failed.clone();
            let mut shutdown = shutdown.clone();
            let last = remaining == 1;
            workers.spawn(async move {
                let result = run_batch(&executor, audit.as_ref(), &batch).await;
                if result.failure.as_ref().is_some_and(|f| f.error.is_auth()) {
                    auth_failed.store(true, Ordering::SeqCst);
                }

                // Hold the permit while throttling so the pause spaces out batches
                let pause = executor.pause_after(&batch);
                if !last && !pause.is_zero() && !auth_failed.load(Ordering::SeqCst) {
                    debug!(pause_ms = pause.as_millis() as u64, "Throttling before next batch");
                    pause_unless_shutdown(pause, &mut shutdown).await;
                }

                drop(permit);
                result
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(result) => {
                    report.applied += result.applied;
                    report.audit_failures += result.audit_failures;
                    report.move_failures.extend(result.failure);
                }
                Err(e) => error!(error = %e, "Move worker panicked"),
            }
        }

        outcome
    }
}

/// Sleep for `duration`, returning early once shutdown is requested
async fn pause_unless_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.wait_for(|stop| *stop) => {
            debug!("Shutdown requested, throttle cut short");
        }
    }
}

struct BatchResult {
    applied: usize,
    audit_failures: usize,
    failure: Option<MoveFailure>,
}

async fn run_batch(
    executor: &MoveExecutor,
    audit: &dyn AuditSink,
    batch: &MoveBatch,
) -> BatchResult {
    match executor.execute(batch).await {
        Ok(records) => {
            let mut audit_failures = 0;
            for record in &records {
                info!(
                    agent_id = %record.agent_id,
                    hostname = %record.hostname,
                    category = %record.category,
                    from = %record.from_group,
                    to = %record.to_group,
                    mode = %record.mode,
                    "Agent moved"
                );
                // The move already happened; a lost audit row is counted, not undone.
                if let Err(e) = audit.append(record) {
                    audit_failures += 1;
                    error!(
                        agent_id = %record.agent_id,
                        audit = %audit.describe(),
                        error = %e,
                        "Failed to write audit record"
                    );
                }
            }
            BatchResult {
                applied: records.len(),
                audit_failures,
                failure: None,
            }
        }
        Err(failure) => {
            if failure.error.is_auth() {
                error!(
                    category = %failure.category,
                    target = %failure.target,
                    count = failure.agents.len(),
                    agents = ?failure.agents,
                    error = %failure.error,
                    "Backend rejected credentials for move"
                );
            } else {
                warn!(
                    category = %failure.category,
                    target = %failure.target,
                    count = failure.agents.len(),
                    agents = ?failure.agents,
                    kind = failure.error.kind(),
                    error = %failure.error,
                    "Move batch failed, agents will be retried next cycle"
                );
            }
            BatchResult {
                applied: 0,
                audit_failures: 0,
                failure: Some(failure),
            }
        }
    }
}
