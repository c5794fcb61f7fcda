//! Shared test utilities.
//!
//! This module provides helpers for setting up an in-memory state store and
//! building items, donation records and raw tables with sensible defaults.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use crate::{
    core::{
        schema::{self, DonationRecord, FundraisingItem},
        table::RawTable,
    },
    errors::Result,
};
use sea_orm::DatabaseConnection;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Declared item with the given target.
pub fn item(name: &str, target: f64) -> FundraisingItem {
    FundraisingItem {
        name: name.to_string(),
        target,
    }
}

/// Donation record without a timestamp, donated anonymously.
pub fn donation(row: usize, quantities: &[(&str, f64)]) -> DonationRecord {
    DonationRecord {
        row,
        timestamp: None,
        donor: "Anónimo".to_string(),
        quantities: quantities
            .iter()
            .map(|(name, qty)| ((*name).to_string(), *qty))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Donation record with a day-first timestamp (`dd/mm/yyyy HH:MM:SS`).
pub fn timed_donation(
    row: usize,
    when: &str,
    donor: &str,
    quantities: &[(&str, f64)],
) -> DonationRecord {
    let timestamp = schema::parse_timestamp(when, schema::DEFAULT_TIMESTAMP_FORMATS)
        .expect("test timestamp must parse");
    DonationRecord {
        timestamp: Some(timestamp),
        donor: donor.to_string(),
        ..donation(row, quantities)
    }
}

/// Targets table with `Medicamento` / `Meta` headers.
pub fn targets_table(items: &[(&str, &str)]) -> RawTable {
    RawTable {
        headers: vec!["Medicamento".to_string(), "Meta".to_string()],
        rows: items
            .iter()
            .map(|(name, target)| vec![Some((*name).to_string()), Some((*target).to_string())])
            .collect(),
    }
}

/// Donations table shaped like a form export: timestamp, real name, public
/// contact, then one column per item.
#[derive(Clone)]
pub struct DonationsTableBuilder {
    items: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl DonationsTableBuilder {
    /// Starts a table with the given item columns.
    pub fn new(items: &[&str]) -> Self {
        Self {
            items: items.iter().map(|i| (*i).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. `quantities` follow the item column order; missing
    /// trailing values become empty cells.
    pub fn row(mut self, when: &str, identity: &str, contact: &str, quantities: &[&str]) -> Self {
        let mut row = vec![
            Some(when.to_string()),
            Some(identity.to_string()),
            Some(contact.to_string()),
        ];
        row.extend((0..self.items.len()).map(|i| quantities.get(i).map(|q| (*q).to_string())));
        self.rows.push(row);
        self
    }

    /// Finishes the table.
    pub fn build(self) -> RawTable {
        let mut headers = vec![
            "Marca temporal".to_string(),
            "Donante".to_string(),
            "Contacto (opcional)".to_string(),
        ];
        headers.extend(self.items);
        RawTable {
            headers,
            rows: self.rows,
        }
    }
}
