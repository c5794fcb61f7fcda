//! Progress model handed to renderers.
//!
//! A `ProgressModel` is an immutable snapshot of one refresh cycle. Numbers
//! are plain, percents are unclamped; formatting and clamping belong to the
//! renderer.

use crate::{
    core::{
        change::{ChangeDecision, ChangeOutcome},
        reconcile::{GlobalProgress, ItemProgress, Reconciliation},
        schema::DonationRecord,
    },
    errors::ParseWarning,
};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Public summary of the most recent donation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestDonation {
    /// Public display name (contact text or the anonymous label)
    pub donor: String,
    /// Sum of the row's positive declared-item quantities
    pub amount: f64,
    /// Parsed donation time
    pub time: NaiveDateTime,
}

impl LatestDonation {
    /// Builds the summary from a record that has a timestamp.
    #[must_use]
    pub fn from_record(record: &DonationRecord) -> Option<Self> {
        record.timestamp.map(|time| Self {
            donor: record.donor.clone(),
            amount: record.total_quantity(),
            time,
        })
    }
}

/// Complete output of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressModel {
    /// Totals across declared items
    pub global: GlobalProgress,
    /// Per-item progress in declaration order
    pub items: Vec<ItemProgress>,
    /// Item furthest from its target; `None` when no items are declared
    pub critical_item: Option<ItemProgress>,
    /// Item closest to (or furthest past) its target; `None` when no items are declared
    pub leading_item: Option<ItemProgress>,
    /// Most recent donation; `None` until a row with a valid timestamp exists
    pub latest_donation: Option<LatestDonation>,
    /// One-shot flag: a new donation arrived since the previous cycle
    pub new_donation: bool,
    /// How the latest donation compared with the stored state
    pub change: ChangeOutcome,
    /// Whether any item has reached its target
    pub any_goal_complete: bool,
    /// Number of rows in the donations table
    pub donation_count: usize,
    /// Cell-level problems absorbed during this cycle
    pub warnings: Vec<ParseWarning>,
    /// True when the state store failed and in-memory state was used
    pub state_degraded: bool,
}

impl ProgressModel {
    /// Assembles a snapshot from the pipeline stages.
    #[must_use]
    pub fn assemble(
        reconciliation: Reconciliation,
        latest: Option<&DonationRecord>,
        decision: &ChangeDecision,
        donation_count: usize,
        warnings: Vec<ParseWarning>,
        state_degraded: bool,
    ) -> Self {
        let critical_item = reconciliation.critical_item().cloned();
        let leading_item = reconciliation.leading_item().cloned();
        let any_goal_complete = reconciliation.any_goal_complete();

        Self {
            global: reconciliation.global,
            items: reconciliation.items,
            critical_item,
            leading_item,
            latest_donation: latest.and_then(LatestDonation::from_record),
            new_donation: decision.is_new_donation(),
            change: decision.outcome,
            any_goal_complete,
            donation_count,
            warnings,
            state_degraded,
        }
    }

    /// Serializes the snapshot for a renderer.
    pub fn to_json(&self) -> crate::errors::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
