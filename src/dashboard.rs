//! Refresh-cycle driver for one dashboard instance.
//!
//! A [`Dashboard`] owns everything that outlives a single cycle: the
//! in-memory change state, the optional durable store and the last good
//! snapshot. Each call to [`Dashboard::refresh`] is a complete computation
//! over freshly supplied tables. Only a schema failure aborts a cycle, and
//! then the previous snapshot stays current.

use crate::{
    config::dashboard::DashboardSettings,
    core::{
        change::{self, ChangeDecision, ChangeState},
        progress::ProgressModel,
        reconcile,
        schema::{self, DonationRecord},
        state,
        table::RawTable,
    },
    errors::{PersistenceFault, Result, StoreOperation},
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{debug, info, instrument, warn};

/// One logical dashboard and its cross-cycle state.
#[derive(Debug)]
pub struct Dashboard {
    settings: DashboardSettings,
    timestamp_formats: Vec<String>,
    store: Option<DatabaseConnection>,
    state: Option<ChangeState>,
    last_snapshot: Option<ProgressModel>,
}

impl Dashboard {
    /// Creates a dashboard that persists its change state in `store`.
    /// The `system_state` table must already exist.
    #[must_use]
    pub fn new(settings: DashboardSettings, store: DatabaseConnection) -> Self {
        Self::build(settings, Some(store))
    }

    /// Creates a dashboard whose change state lives only in this process.
    #[must_use]
    pub fn in_memory(settings: DashboardSettings) -> Self {
        Self::build(settings, None)
    }

    fn build(settings: DashboardSettings, store: Option<DatabaseConnection>) -> Self {
        let timestamp_formats = settings.effective_timestamp_formats();
        Self {
            settings,
            timestamp_formats,
            store,
            state: None,
            last_snapshot: None,
        }
    }

    /// Settings this dashboard was created with.
    #[must_use]
    pub const fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    /// Most recent successful snapshot, kept across failed cycles.
    #[must_use]
    pub const fn last_snapshot(&self) -> Option<&ProgressModel> {
        self.last_snapshot.as_ref()
    }

    /// In-memory copy of the change state after the last cycle.
    #[must_use]
    pub const fn change_state(&self) -> Option<&ChangeState> {
        self.state.as_ref()
    }

    /// Runs one refresh cycle and returns the new snapshot.
    ///
    /// # Errors
    /// Returns `Error::Schema` when either table cannot be normalized. The
    /// change state and the last snapshot are left untouched in that case.
    /// Store failures never surface here; they set `state_degraded` instead.
    #[instrument(skip_all, fields(dashboard = %self.settings.id))]
    pub async fn refresh(&mut self, targets: &RawTable, donations: &RawTable) -> Result<ProgressModel> {
        let targets = schema::normalize_targets(targets).inspect_err(|e| {
            warn!(error = %e, "Refresh cycle aborted; keeping last good snapshot");
        })?;
        let normalized = schema::normalize_donations(
            donations,
            &targets.items,
            &self.settings.anonymous_label,
            &self.timestamp_formats,
        );
        debug!(
            items = targets.items.len(),
            rows = normalized.records.len(),
            "Tables normalized"
        );

        let reconciliation = reconcile::reconcile(&targets.items, &normalized.records);
        let latest = change::latest_donation(&normalized.records);
        let (decision, degraded) = self.decide(latest).await;

        if decision.is_new_donation() {
            info!(
                total_donated = reconciliation.global.total_donated,
                "New donation detected"
            );
        }

        let mut warnings = targets.warnings;
        warnings.extend(normalized.warnings);
        if !warnings.is_empty() {
            debug!(count = warnings.len(), "Cells skipped during normalization");
        }

        let snapshot = ProgressModel::assemble(
            reconciliation,
            latest,
            &decision,
            donations.row_count(),
            warnings,
            degraded,
        );
        self.last_snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Runs change detection against the store when there is one, falling
    /// back to the in-memory state on any store failure.
    async fn decide(&mut self, latest: Option<&DonationRecord>) -> (ChangeDecision, bool) {
        let (decision, fault) = match &self.store {
            Some(db) => decide_with_store(db, &self.settings.id, self.state.as_ref(), latest).await,
            None => (change::detect_change(self.state.as_ref(), latest), None),
        };

        if let Some(fault) = &fault {
            warn!(error = %fault, "Change state store unavailable; using in-memory state");
        }

        self.state.clone_from(&decision.state);
        (decision, fault.is_some())
    }
}

/// Load, decide and save inside one transaction so concurrent writers cannot
/// interleave between the read and the write.
async fn decide_with_store(
    db: &DatabaseConnection,
    dashboard_id: &str,
    fallback: Option<&ChangeState>,
    latest: Option<&DonationRecord>,
) -> (ChangeDecision, Option<PersistenceFault>) {
    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(e) => {
            return (
                change::detect_change(fallback, latest),
                Some(PersistenceFault {
                    operation: StoreOperation::Begin,
                    source: e.into(),
                }),
            );
        }
    };

    let prior = match state::load_change_state(&txn, dashboard_id).await {
        Ok(prior) => prior,
        Err(source) => {
            return (
                change::detect_change(fallback, latest),
                Some(PersistenceFault {
                    operation: StoreOperation::Load,
                    source,
                }),
            );
        }
    };

    let decision = change::detect_change(prior.as_ref(), latest);

    if decision.state_changed() {
        if let Some(next) = &decision.state {
            if let Err(source) = state::save_change_state(&txn, dashboard_id, next).await {
                return (
                    decision,
                    Some(PersistenceFault {
                        operation: StoreOperation::Save,
                        source,
                    }),
                );
            }
        }
    }

    match txn.commit().await {
        Ok(()) => (decision, None),
        Err(e) => (
            decision,
            Some(PersistenceFault {
                operation: StoreOperation::Commit,
                source: e.into(),
            }),
        ),
    }
}
