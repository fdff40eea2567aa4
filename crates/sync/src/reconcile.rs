//! Drift detection between local reservations and Stays.net.
//!
//! A run walks the active local reservations around today, looks each one up
//! on the channel, and records one item per divergence. Deleted reservations
//! are cancelled locally unless their stay is already over, modified ones are
//! brought in line with the channel, and reservations without a channel id
//! are only reported.

use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, Utc};
use rendizy_core::config::ReconciliationConfig;
use rendizy_core::reconciliation::{
    ActionTaken, IssueType, ReconciliationItem, ReconciliationRun, RunStatus, RECONCILIATION_ACTOR,
};
use rendizy_core::types::{Reservation, ReservationStatus};
use rendizy_core::SyncResult;
use rendizy_staysnet::mappers;
use rendizy_staysnet::{ChannelClient, ReservationLookup};
use rendizy_store::{CandidateFilter, SyncStore};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DRY_RUN_REASON: &str = "dry run";
pub const PAST_STAY_REASON: &str = "past stay kept as history";
const CANCELLATION_REASON: &str = "Reserva não encontrada na Stays.net (reconciliação)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub dry_run: bool,
    pub limit: usize,
    pub api_delay: StdDuration,
    pub batch_size: usize,
    pub window_days_back: i64,
    pub window_days_ahead: i64,
    max_limit: usize,
}

impl ReconcileOptions {
    pub fn from_config(config: &ReconciliationConfig) -> Self {
        Self {
            dry_run: false,
            limit: config.max_reservations,
            api_delay: StdDuration::from_millis(config.api_delay_ms),
            batch_size: config.batch_size.max(1),
            window_days_back: config.window_days_back,
            window_days_ahead: config.window_days_ahead,
            max_limit: config.max_reservations,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Cap the candidates; values above the configured maximum are clamped.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            self.limit = limit.clamp(1, self.max_limit.max(1));
        }
        self
    }

    pub fn with_api_delay(mut self, delay: StdDuration) -> Self {
        self.api_delay = delay;
        self
    }

    fn filter(&self, today: NaiveDate) -> CandidateFilter {
        CandidateFilter {
            statuses: vec![
                ReservationStatus::Confirmed,
                ReservationStatus::Pending,
                ReservationStatus::CheckedIn,
            ],
            check_out_from: today - Duration::days(self.window_days_back),
            check_out_to: today + Duration::days(self.window_days_ahead),
            limit: self.limit,
        }
    }
}

/// What the channel says about one local reservation, once compared.
#[derive(Debug, Clone, PartialEq)]
enum Finding {
    Orphan,
    LookupFailed(String),
    Deleted,
    Modified { issue: IssueType, api_status: ReservationStatus, patch: Patch },
    InSync,
}

/// Fields to overwrite on the local reservation.
#[derive(Debug, Clone, Default, PartialEq)]
struct Patch {
    status: Option<ReservationStatus>,
    dates: Option<(NaiveDate, NaiveDate)>,
    guest_id: Option<Uuid>,
}

impl Patch {
    fn first_issue(&self) -> Option<IssueType> {
        if self.status.is_some() {
            Some(IssueType::StatusChanged)
        } else if self.dates.is_some() {
            Some(IssueType::DatesChanged)
        } else if self.guest_id.is_some() {
            Some(IssueType::GuestChanged)
        } else {
            None
        }
    }

    fn apply(&self, reservation: &mut Reservation) {
        if let Some(status) = self.status {
            reservation.status = status;
            if status == ReservationStatus::Cancelled {
                reservation.cancelled_at = Some(Utc::now());
                reservation.cancelled_by = Some(RECONCILIATION_ACTOR.to_string());
                reservation.cancellation_reason = Some("Cancelada na Stays.net".to_string());
            }
        }
        if let Some((check_in, check_out)) = self.dates {
            reservation.check_in = check_in;
            reservation.check_out = check_out;
            reservation.nights = mappers::nights_between(check_in, check_out);
        }
        if let Some(guest_id) = self.guest_id {
            reservation.guest_id = guest_id;
        }
        reservation.updated_at = Utc::now();
    }
}

#[derive(Default)]
struct RunProblems {
    errors: Vec<String>,
    lookup_errors: u64,
    action_errors: u64,
}

impl RunProblems {
    fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Execute one reconciliation run and return the finalized record.
///
/// Returns `Err` only when the run record itself cannot be created; any later
/// failure is recorded on the run.
pub async fn run_reconciliation(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    options: &ReconcileOptions,
) -> SyncResult<ReconciliationRun> {
    let mut run = ReconciliationRun::start(organization_id);
    store.insert_run(&run).await?;

    info!(
        run_id = %run.id,
        organization_id = %organization_id,
        dry_run = options.dry_run,
        limit = options.limit,
        "starting reservation reconciliation"
    );

    let today = Utc::now().date_naive();
    let candidates = match store
        .list_reconciliation_candidates(organization_id, &options.filter(today))
        .await
    {
        Ok(candidates) => candidates,
        Err(e) => {
            error!(run_id = %run.id, error = %e, "failed to load reconciliation candidates");
            run.error_message = Some(e.to_string());
            run.finish(RunStatus::Failed, summary(&[e.to_string()], options, 0));
            store.update_run(&run).await?;
            return Ok(run);
        }
    };

    let mut problems = RunProblems::default();
    let mut looked_up = false;

    for (index, reservation) in candidates.iter().enumerate() {
        run.counters.total_checked += 1;

        if reservation.external_id.is_some() {
            if looked_up && !options.api_delay.is_zero() {
                tokio::time::sleep(options.api_delay).await;
            }
            looked_up = true;
        }

        let finding = inspect(client, store, organization_id, reservation).await;
        handle_finding(store, &mut run, reservation, finding, options, &mut problems).await;

        if (index + 1) % options.batch_size == 0 {
            info!(
                run_id = %run.id,
                checked = run.counters.total_checked,
                total = candidates.len(),
                "reconciliation progress"
            );
            if let Err(e) = store.update_run(&run).await {
                warn!(run_id = %run.id, error = %e, "failed to persist run progress");
            }
        }
    }

    let status = if problems.is_partial() {
        RunStatus::Partial
    } else {
        RunStatus::Completed
    };
    if problems.is_partial() {
        run.error_message = Some(format!(
            "{} lookup error(s), {} action error(s)",
            problems.lookup_errors, problems.action_errors
        ));
    }
    run.finish(status, summary(&problems.errors, options, candidates.len()));
    store.update_run(&run).await?;

    info!(
        run_id = %run.id,
        status = ?run.status,
        checked = run.counters.total_checked,
        deleted = run.counters.found_deleted,
        modified = run.counters.found_modified,
        orphan = run.counters.found_orphan,
        cancelled = run.counters.action_cancelled,
        updated = run.counters.action_updated,
        skipped = run.counters.action_skipped,
        duration_ms = run.duration_ms.unwrap_or(0),
        "reservation reconciliation finished"
    );

    Ok(run)
}

fn summary(errors: &[String], options: &ReconcileOptions, candidates: usize) -> Value {
    json!({
        "errors": errors,
        "dry_run": options.dry_run,
        "candidates": candidates,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

async fn inspect(
    client: &dyn ChannelClient,
    store: &dyn SyncStore,
    organization_id: &str,
    reservation: &Reservation,
) -> Finding {
    let Some(external_id) = reservation.external_id.as_deref() else {
        return Finding::Orphan;
    };

    let remote = match client.get_reservation(external_id).await {
        ReservationLookup::Found(remote) => remote,
        ReservationLookup::NotFound => return Finding::Deleted,
        ReservationLookup::Error(message) => return Finding::LookupFailed(message),
    };

    let api_status = mappers::derive_status(mappers::str_at(&remote, "type").as_deref());
    let mut patch = Patch::default();

    if api_status != reservation.status {
        patch.status = Some(api_status);
    }
    if let Some((check_in, check_out)) = mappers::reservation_dates(&remote) {
        if check_in != reservation.check_in || check_out != reservation.check_out {
            patch.dates = Some((check_in, check_out));
        }
    }
    if let Some(client_id) = mappers::first_str(&remote, &["_idclient", "clientId"]) {
        match store.find_guest_by_external_id(organization_id, &client_id).await {
            Ok(Some(guest)) if guest.id != reservation.guest_id => patch.guest_id = Some(guest.id),
            Ok(_) => {}
            Err(e) => warn!(client_id = %client_id, error = %e, "guest lookup failed, guest not compared"),
        }
    }

    match patch.first_issue() {
        Some(issue) => Finding::Modified { issue, api_status, patch },
        None => Finding::InSync,
    }
}

async fn handle_finding(
    store: &dyn SyncStore,
    run: &mut ReconciliationRun,
    reservation: &Reservation,
    finding: Finding,
    options: &ReconcileOptions,
    problems: &mut RunProblems,
) {
    let (issue, api_status, action, reason) = match finding {
        Finding::InSync => return,
        Finding::LookupFailed(message) => {
            warn!(reservation_id = %reservation.id, error = %message, "reservation lookup failed");
            problems.lookup_errors += 1;
            problems
                .errors
                .push(format!("Reserva {}: {}", label(reservation), message));
            return;
        }
        Finding::Orphan => (
            IssueType::Orphan,
            None,
            ActionTaken::Skipped,
            "reservation has no Stays.net id".to_string(),
        ),
        Finding::Deleted if reservation.check_out < Utc::now().date_naive() => (
            IssueType::Deleted,
            Some("not_found".to_string()),
            ActionTaken::Skipped,
            PAST_STAY_REASON.to_string(),
        ),
        Finding::Deleted if options.dry_run => (
            IssueType::Deleted,
            Some("not_found".to_string()),
            ActionTaken::Skipped,
            DRY_RUN_REASON.to_string(),
        ),
        Finding::Deleted => {
            let mut cancelled = reservation.clone();
            cancelled.status = ReservationStatus::Cancelled;
            cancelled.cancelled_at = Some(Utc::now());
            cancelled.cancelled_by = Some(RECONCILIATION_ACTOR.to_string());
            cancelled.cancellation_reason = Some(CANCELLATION_REASON.to_string());
            cancelled.updated_at = Utc::now();
            let (action, reason) = match store.update_reservation(&cancelled).await {
                Ok(()) => (ActionTaken::Cancelled, "reservation not found on Stays.net".to_string()),
                Err(e) => record_action_error(reservation, e.to_string(), problems),
            };
            (IssueType::Deleted, Some("not_found".to_string()), action, reason)
        }
        Finding::Modified { issue, api_status, .. } if options.dry_run => (
            issue,
            Some(api_status.as_str().to_string()),
            ActionTaken::Skipped,
            DRY_RUN_REASON.to_string(),
        ),
        Finding::Modified { issue, api_status, patch } => {
            let mut updated = reservation.clone();
            patch.apply(&mut updated);
            let (action, reason) = match store.update_reservation(&updated).await {
                Ok(()) => (ActionTaken::Updated, format!("{} on Stays.net", issue.as_str())),
                Err(e) => record_action_error(reservation, e.to_string(), problems),
            };
            (issue, Some(api_status.as_str().to_string()), action, reason)
        }
    };

    let item = ReconciliationItem {
        id: Uuid::new_v4(),
        run_id: run.id,
        reservation_id: reservation.id,
        external_id: reservation.external_id.clone(),
        confirmation_code: reservation.confirmation_code.clone(),
        property_id: Some(reservation.property_id),
        issue_type: issue,
        local_status: reservation.status.as_str().to_string(),
        api_status,
        action_taken: action,
        action_reason: reason,
        created_at: Utc::now(),
    };

    match store.insert_item(&item).await {
        Ok(()) => {
            run.counters.record(issue, action);
            metrics::counter!(
                "staysnet.reconcile.items",
                "issue" => issue.as_str(),
                "action" => action.as_str()
            )
            .increment(1);
        }
        Err(e) => {
            error!(run_id = %run.id, reservation_id = %reservation.id, error = %e, "failed to record reconciliation item");
            problems
                .errors
                .push(format!("Reserva {}: item não registrado: {}", label(reservation), e));
        }
    }
}

fn record_action_error(
    reservation: &Reservation,
    message: String,
    problems: &mut RunProblems,
) -> (ActionTaken, String) {
    warn!(reservation_id = %reservation.id, error = %message, "corrective write failed");
    problems.action_errors += 1;
    problems
        .errors
        .push(format!("Reserva {}: {}", label(reservation), message));
    (ActionTaken::Error, message)
}

fn label(reservation: &Reservation) -> String {
    reservation
        .external_id
        .clone()
        .unwrap_or_else(|| reservation.id.to_string())
}
