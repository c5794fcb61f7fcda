//! New-donation detection.
//!
//! The detector is a pure function from the previous [`ChangeState`] and the
//! current donation records to a [`ChangeDecision`]. Loading and storing the
//! state is done by [`crate::core::state`]; nothing here touches a store.

use crate::core::schema::{DonationRecord, fold};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const TIMESTAMP_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const FIELD_SEPARATOR: u8 = 0x1f;

/// Identity of the most recently seen donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeState {
    /// Content fingerprint of the latest donation
    pub fingerprint: String,
    /// Timestamp of the latest donation
    pub timestamp: NaiveDateTime,
}

impl ChangeState {
    /// Builds the state describing `record`. Returns `None` for rows without a
    /// parsed timestamp, which can never be the latest donation.
    #[must_use]
    pub fn of(record: &DonationRecord) -> Option<Self> {
        record.timestamp.map(|timestamp| Self {
            fingerprint: fingerprint(record),
            timestamp,
        })
    }
}

/// How the latest donation compares with the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOutcome {
    /// No row has a usable timestamp; nothing was decided
    NoCandidate,
    /// First observation without a stored state; establishes the baseline
    Baseline,
    /// Same donation as last time
    Unchanged,
    /// A different donation at a later time
    NewDonation,
    /// Different content at the same time, e.g. an edited row; the baseline
    /// moves without celebrating
    Revised,
    /// A different donation older than the stored one, e.g. after the latest
    /// row was deleted upstream; the baseline moves back without celebrating
    Rewound,
}

/// Result of one detection step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDecision {
    /// Classification of this cycle
    pub outcome: ChangeOutcome,
    /// State to carry into the next cycle
    pub state: Option<ChangeState>,
}

impl ChangeDecision {
    /// One-shot celebrate flag for this cycle.
    #[must_use]
    pub fn is_new_donation(&self) -> bool {
        self.outcome == ChangeOutcome::NewDonation
    }

    /// Whether `state` differs from what was passed in and must be persisted.
    #[must_use]
    pub const fn state_changed(&self) -> bool {
        matches!(
            self.outcome,
            ChangeOutcome::Baseline
                | ChangeOutcome::NewDonation
                | ChangeOutcome::Revised
                | ChangeOutcome::Rewound
        )
    }
}

/// Stable SHA-256 fingerprint of a donation's public content: timestamp,
/// public donor and the positive quantities keyed by folded item name.
///
/// Zero columns and display spelling do not contribute, so editing the
/// targets table leaves the fingerprint of an unchanged row alone.
#[must_use]
pub fn fingerprint(record: &DonationRecord) -> String {
    let mut hasher = Sha256::new();
    let timestamp = record
        .timestamp
        .map(|ts| ts.format(TIMESTAMP_KEY_FORMAT).to_string())
        .unwrap_or_default();
    hasher.update(timestamp.as_bytes());
    hasher.update([FIELD_SEPARATOR]);
    hasher.update(record.donor.as_bytes());
    let donated: BTreeMap<String, f64> = record
        .quantities
        .iter()
        .filter(|(_, quantity)| **quantity > 0.0)
        .map(|(item, quantity)| (fold(item), *quantity))
        .collect();
    for (item, quantity) in &donated {
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(item.as_bytes());
        hasher.update(b"=");
        hasher.update(quantity.to_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Most recent donation by parsed timestamp. Rows without a timestamp are not
/// candidates; on equal timestamps the later row wins.
#[must_use]
pub fn latest_donation(records: &[DonationRecord]) -> Option<&DonationRecord> {
    records
        .iter()
        .filter(|r| r.timestamp.is_some())
        .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.row.cmp(&b.row)))
}

/// Decides whether `latest` is a genuinely new donation relative to `prior`.
///
/// Without a prior state the latest donation becomes the baseline and the
/// flag stays down, so a cold start never celebrates.
#[must_use]
pub fn detect_change(prior: Option<&ChangeState>, latest: Option<&DonationRecord>) -> ChangeDecision {
    let Some(current) = latest.and_then(ChangeState::of) else {
        return ChangeDecision {
            outcome: ChangeOutcome::NoCandidate,
            state: prior.cloned(),
        };
    };

    let outcome = match prior {
        None => ChangeOutcome::Baseline,
        Some(p) if p.fingerprint == current.fingerprint => ChangeOutcome::Unchanged,
        Some(p) if current.timestamp > p.timestamp => ChangeOutcome::NewDonation,
        Some(p) if current.timestamp == p.timestamp => ChangeOutcome::Revised,
        Some(_) => ChangeOutcome::Rewound,
    };

    let state = if outcome == ChangeOutcome::Unchanged {
        prior.cloned()
    } else {
        Some(current)
    };

    ChangeDecision { outcome, state }
}
