//! Item reconciliation: per-item totals, shortfall and progress.
//!
//! Donations are reshaped from one column per item into (item, quantity)
//! contributions, summed per folded item key and left-joined onto the declared
//! items. Global totals are summed from the per-item table, so quantities for
//! undeclared items never count.

use crate::core::schema::{DonationRecord, FundraisingItem, fold};
use serde::Serialize;
use std::collections::HashMap;

/// Progress of one declared item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemProgress {
    /// Declared item name
    pub name: String,
    /// Sum of positive contributions
    pub donated: f64,
    /// Declared target
    pub target: f64,
    /// `max(target - donated, 0)`
    pub shortfall: f64,
    /// `donated / target * 100`, or 0 when the target is 0; not capped
    pub percent: f64,
}

impl ItemProgress {
    /// Percent clamped to `[0, 100]` for bar widths.
    #[must_use]
    pub fn bar_percent(&self) -> f64 {
        self.percent.clamp(0.0, 100.0)
    }

    /// Whether the target has been reached. Items with a zero target never
    /// count as complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

/// Totals across all declared items.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlobalProgress {
    /// Sum of per-item donated totals
    pub total_donated: f64,
    /// Sum of per-item targets
    pub total_target: f64,
    /// `total_donated / total_target * 100`, or 0 when there is no target
    pub percent: f64,
}

/// One (item, quantity) pair from the wide-to-long reshape.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution<'a> {
    /// Source row index
    pub row: usize,
    /// Item name as keyed in the donation record
    pub item: &'a str,
    /// Quantity, always positive
    pub quantity: f64,
}

/// Result of reconciling one refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// One entry per declared item, in declaration order
    pub items: Vec<ItemProgress>,
    /// Totals over `items`
    pub global: GlobalProgress,
}

impl Reconciliation {
    /// Item with the lowest percent; first occurrence wins ties.
    /// `None` when no items are declared.
    #[must_use]
    pub fn critical_item(&self) -> Option<&ItemProgress> {
        self.items
            .iter()
            .fold(None, |best: Option<&ItemProgress>, item| match best {
                Some(b) if b.percent <= item.percent => Some(b),
                _ => Some(item),
            })
    }

    /// Item with the highest percent; first occurrence wins ties.
    /// `None` when no items are declared.
    #[must_use]
    pub fn leading_item(&self) -> Option<&ItemProgress> {
        self.items
            .iter()
            .fold(None, |best: Option<&ItemProgress>, item| match best {
                Some(b) if b.percent >= item.percent => Some(b),
                _ => Some(item),
            })
    }

    /// Whether any item has reached its target.
    #[must_use]
    pub fn any_goal_complete(&self) -> bool {
        self.items.iter().any(ItemProgress::is_complete)
    }
}

/// Calculates percent complete, defining a zero target as 0 %.
#[must_use]
pub fn calculate_progress(donated: f64, target: f64) -> f64 {
    if target > 0.0 {
        donated * 100.0 / target
    } else {
        0.0
    }
}

/// Reshapes donation rows into contributions, dropping non-positive
/// quantities. Row identity is kept on every contribution.
pub fn contributions(records: &[DonationRecord]) -> impl Iterator<Item = Contribution<'_>> {
    records.iter().flat_map(|record| {
        record
            .quantities
            .iter()
            .filter(|(_, quantity)| **quantity > 0.0)
            .map(move |(item, quantity)| Contribution {
                row: record.row,
                item: item.as_str(),
                quantity: *quantity,
            })
    })
}

/// Computes per-item and global progress.
///
/// Every declared item appears in the output, with `donated = 0` when nothing
/// was contributed to it.
#[must_use]
pub fn reconcile(items: &[FundraisingItem], records: &[DonationRecord]) -> Reconciliation {
    let mut donated_by_key: HashMap<String, f64> = HashMap::new();
    for contribution in contributions(records) {
        *donated_by_key.entry(fold(contribution.item)).or_default() += contribution.quantity;
    }

    let items: Vec<ItemProgress> = items
        .iter()
        .map(|item| {
            let donated = donated_by_key.get(&item.key()).copied().unwrap_or(0.0);
            ItemProgress {
                name: item.name.clone(),
                donated,
                target: item.target,
                shortfall: (item.target - donated).max(0.0),
                percent: calculate_progress(donated, item.target),
            }
        })
        .collect();

    let total_donated: f64 = items.iter().map(|i| i.donated).sum();
    let total_target: f64 = items.iter().map(|i| i.target).sum();
    let global = GlobalProgress {
        total_donated,
        total_target,
        percent: calculate_progress(total_donated, total_target),
    };

    Reconciliation { items, global }
}
