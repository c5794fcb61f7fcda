//! Schema normalization for drifting spreadsheet headers.
//!
//! Header recognition is declarative: each canonical field lists the folded
//! tokens that identify it. [`resolve_headers`] turns a header row into a map
//! from canonical field to column index and is independent of any data.
//! The two `normalize_*` functions then read cells through that map.

use crate::{
    core::privacy,
    errors::{ParseWarning, ParseWarningKind, Result, SchemaError, TableKind},
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, HashMap};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use super::table::RawTable;

/// Day-first formats tried in order when parsing donation timestamps.
pub const DEFAULT_TIMESTAMP_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y",
    "%d-%m-%Y",
];

/// Canonical columns the rest of the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalField {
    /// Item name in the targets table
    ItemName,
    /// Target quantity in the targets table
    Target,
    /// Donation date-time
    Timestamp,
    /// Optional public contact/display text
    Contact,
    /// Real donor identity; recognized only so it can be dropped
    Identity,
}

impl CanonicalField {
    /// Canonical column name used in errors and warnings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ItemName => "item_name",
            Self::Target => "target",
            Self::Timestamp => "timestamp",
            Self::Contact => "contact",
            Self::Identity => "identity",
        }
    }
}

/// One canonical field and the folded header tokens that identify it.
#[derive(Debug, Clone, Copy)]
pub struct FieldPattern {
    /// Field the tokens map to
    pub field: CanonicalField,
    /// Folded tokens; a header matches by equality first, then by containment
    pub tokens: &'static [&'static str],
    /// Folded tokens that disqualify a header for this field
    pub excludes: &'static [&'static str],
}

impl FieldPattern {
    fn excluded(&self, folded: &str) -> bool {
        self.excludes.iter().any(|t| folded.contains(t))
    }
}

const IDENTITY_TOKENS: &[&str] = &["donante", "donor", "nombre", "name"];

/// Recognized headers for the targets table. `Target` is resolved first so a
/// header like "meta por nombre" is claimed as the target column.
pub const TARGET_PATTERNS: &[FieldPattern] = &[
    FieldPattern {
        field: CanonicalField::Target,
        tokens: &["meta", "target", "objetivo", "goal"],
        excludes: &[],
    },
    FieldPattern {
        field: CanonicalField::ItemName,
        tokens: &["medicamento", "nombre", "item", "producto", "name"],
        excludes: &[],
    },
];

/// Recognized headers for the donations table, evaluated after declared item
/// columns have been claimed. A header mentioning the donor's name is never
/// taken as the public contact column and falls through to `Identity`.
pub const DONATION_PATTERNS: &[FieldPattern] = &[
    FieldPattern {
        field: CanonicalField::Timestamp,
        tokens: &["timestamp", "marca temporal", "fecha", "date"],
        excludes: &[],
    },
    FieldPattern {
        field: CanonicalField::Contact,
        tokens: &["contacto", "contact", "alias"],
        excludes: IDENTITY_TOKENS,
    },
    FieldPattern {
        field: CanonicalField::Identity,
        tokens: IDENTITY_TOKENS,
        excludes: &[],
    },
];

/// Canonical field to column index.
pub type HeaderMap = BTreeMap<CanonicalField, usize>;

/// A declared fundraising line.
#[derive(Debug, Clone, PartialEq)]
pub struct FundraisingItem {
    /// Display name, trimmed
    pub name: String,
    /// Target quantity, never negative
    pub target: f64,
}

impl FundraisingItem {
    /// Case- and accent-insensitive match key.
    #[must_use]
    pub fn key(&self) -> String {
        fold(&self.name)
    }
}

/// One donation row after normalization and redaction.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationRecord {
    /// Zero-based row index in the source table
    pub row: usize,
    /// Parsed timestamp, `None` when missing or unparseable
    pub timestamp: Option<NaiveDateTime>,
    /// Public display name, already redacted
    pub donor: String,
    /// Quantity per declared item name; undeclared columns are not kept
    pub quantities: BTreeMap<String, f64>,
}

impl DonationRecord {
    /// Sum of the positive declared-item quantities in this row.
    #[must_use]
    pub fn total_quantity(&self) -> f64 {
        self.quantities.values().filter(|q| **q > 0.0).sum()
    }
}

/// Output of [`normalize_targets`].
#[derive(Debug, Clone, Default)]
pub struct NormalizedTargets {
    /// Declared items in input order
    pub items: Vec<FundraisingItem>,
    /// Cell-level problems that were absorbed
    pub warnings: Vec<ParseWarning>,
}

/// Output of [`normalize_donations`].
#[derive(Debug, Clone, Default)]
pub struct NormalizedDonations {
    /// One record per source row
    pub records: Vec<DonationRecord>,
    /// Cell-level problems that were absorbed
    pub warnings: Vec<ParseWarning>,
}

/// Folds text for matching: trims, lowercases, strips accents and collapses
/// runs of whitespace. Precomposed and decomposed spellings fold alike.
#[must_use]
pub fn fold(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.nfd()
                .filter(|c| !is_combining_mark(*c))
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps a header row onto canonical fields.
///
/// Patterns are evaluated in order. For each one, a header whose folded text
/// equals a token (or the canonical name) wins; otherwise the first header
/// containing a token is taken. A column is never claimed twice, and never by a
/// pattern whose exclusions it contains.
#[must_use]
pub fn resolve_headers<S: AsRef<str>>(headers: &[S], patterns: &[FieldPattern]) -> HeaderMap {
    let folded: Vec<String> = headers.iter().map(|h| fold(h.as_ref())).collect();
    let mut map = HeaderMap::new();

    for pattern in patterns {
        let unclaimed = |idx: &usize| {
            !map.values().any(|claimed| claimed == idx) && !pattern.excluded(&folded[*idx])
        };
        let exact = (0..folded.len()).filter(unclaimed).find(|&idx| {
            folded[idx] == pattern.field.name() || pattern.tokens.iter().any(|t| folded[idx] == *t)
        });
        let found = exact.or_else(|| {
            (0..folded.len()).filter(unclaimed).find(|&idx| {
                !folded[idx].is_empty() && pattern.tokens.iter().any(|t| folded[idx].contains(t))
            })
        });
        if let Some(idx) = found {
            map.insert(pattern.field, idx);
        }
    }

    map
}

/// Builds the declared item list from the targets table.
///
/// Fails with [`SchemaError::MissingField`] when no item-name or target column
/// can be identified, and with [`SchemaError::DuplicateItem`] when two names
/// fold to the same key. Rows without a name are skipped with a warning;
/// missing targets count as 0.
pub fn normalize_targets(raw: &RawTable) -> Result<NormalizedTargets> {
    let map = resolve_headers(&raw.headers, TARGET_PATTERNS);
    let name_col = require(&map, CanonicalField::ItemName, TableKind::Targets)?;
    let target_col = require(&map, CanonicalField::Target, TableKind::Targets)?;

    let mut out = NormalizedTargets::default();
    let mut seen: HashMap<String, String> = HashMap::new();

    for row in 0..raw.row_count() {
        let name = match raw.cell(row, name_col) {
            Some(text) if !privacy::is_blank_marker(text) => text.trim().to_string(),
            _ => {
                out.warnings.push(warning(
                    TableKind::Targets,
                    row,
                    CanonicalField::ItemName.name(),
                    ParseWarningKind::BlankItemName,
                ));
                continue;
            }
        };

        let target = match parse_number(raw.cell(row, target_col)) {
            Ok(value) if value < 0.0 => {
                out.warnings.push(warning(
                    TableKind::Targets,
                    row,
                    CanonicalField::Target.name(),
                    ParseWarningKind::NegativeTarget,
                ));
                0.0
            }
            Ok(value) => value,
            Err(()) => {
                out.warnings.push(warning(
                    TableKind::Targets,
                    row,
                    CanonicalField::Target.name(),
                    ParseWarningKind::UnparseableTarget,
                ));
                0.0
            }
        };

        let item = FundraisingItem { name, target };
        if let Some(first) = seen.insert(item.key(), item.name.clone()) {
            return Err(SchemaError::DuplicateItem {
                first,
                second: item.name,
            }
            .into());
        }
        out.items.push(item);
    }

    Ok(out)
}

/// Normalizes the donations table against the declared items.
///
/// Declared item columns are matched by folded name; items with no column get
/// zero quantities. The contact column is redacted through
/// [`privacy::public_donor`]. The identity column, and every column not
/// recognized here, is never read.
#[must_use]
pub fn normalize_donations(
    raw: &RawTable,
    items: &[FundraisingItem],
    anonymous_label: &str,
    timestamp_formats: &[String],
) -> NormalizedDonations {
    let folded: Vec<String> = raw.headers.iter().map(|h| fold(h)).collect();
    let item_cols: Vec<(&FundraisingItem, Option<usize>)> = items
        .iter()
        .map(|item| {
            let key = item.key();
            (item, folded.iter().position(|h| *h == key))
        })
        .collect();

    // Item columns are claimed first; blank them out before pattern matching.
    let masked: Vec<&str> = raw
        .headers
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            if item_cols.iter().any(|(_, col)| *col == Some(idx)) {
                ""
            } else {
                h.as_str()
            }
        })
        .collect();
    let map = resolve_headers(&masked, DONATION_PATTERNS);
    let time_col = map.get(&CanonicalField::Timestamp).copied();
    let contact_col = map.get(&CanonicalField::Contact).copied();

    if time_col.is_none() {
        tracing::warn!("Donations table has no timestamp column; latest donation unavailable");
    }
    if map.contains_key(&CanonicalField::Identity) {
        tracing::debug!("Identity column recognized and dropped");
    }

    let mut out = NormalizedDonations::default();
    for row in 0..raw.row_count() {
        let timestamp = time_col.and_then(|col| match raw.cell(row, col) {
            Some(text) if !privacy::is_blank_marker(text) => {
                let parsed = parse_timestamp(text, timestamp_formats);
                if parsed.is_none() {
                    out.warnings.push(warning(
                        TableKind::Donations,
                        row,
                        CanonicalField::Timestamp.name(),
                        ParseWarningKind::UnparseableTimestamp,
                    ));
                }
                parsed
            }
            _ => None,
        });

        let donor = privacy::public_donor(
            contact_col.and_then(|col| raw.cell(row, col)),
            anonymous_label,
        );

        let mut quantities = BTreeMap::new();
        for (item, col) in &item_cols {
            let cell = col.and_then(|c| raw.cell(row, c));
            let quantity = parse_number(cell).unwrap_or_else(|()| {
                out.warnings.push(warning(
                    TableKind::Donations,
                    row,
                    &item.name,
                    ParseWarningKind::UnparseableQuantity,
                ));
                0.0
            });
            quantities.insert(item.name.clone(), quantity);
        }

        out.records.push(DonationRecord {
            row,
            timestamp,
            donor,
            quantities,
        });
    }

    out
}

/// Parses a date-time using the first matching format. Date-only formats
/// resolve to midnight.
#[must_use]
pub fn parse_timestamp<S: AsRef<str>>(text: &str, formats: &[S]) -> Option<NaiveDateTime> {
    let text = text.trim();
    formats.iter().find_map(|fmt| {
        let fmt = fmt.as_ref();
        NaiveDateTime::parse_from_str(text, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(text, fmt)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
    })
}

/// Built-in timestamp formats as owned strings.
#[must_use]
pub fn default_timestamp_formats() -> Vec<String> {
    DEFAULT_TIMESTAMP_FORMATS
        .iter()
        .map(|f| (*f).to_string())
        .collect()
}

/// Missing and blank cells are 0; anything else must be a finite number.
fn parse_number(cell: Option<&str>) -> std::result::Result<f64, ()> {
    match cell {
        None => Ok(0.0),
        Some(text) if privacy::is_blank_marker(text) => Ok(0.0),
        Some(text) => match text.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(()),
        },
    }
}

fn require(map: &HeaderMap, field: CanonicalField, table: TableKind) -> Result<usize> {
    map.get(&field).copied().ok_or_else(|| {
        SchemaError::MissingField {
            table,
            field: field.name(),
        }
        .into()
    })
}

fn warning(table: TableKind, row: usize, column: &str, kind: ParseWarningKind) -> ParseWarning {
    ParseWarning {
        table,
        row,
        column: column.to_string(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::errors::Error;
    use chrono::{Datelike, Timelike};

    fn formats() -> Vec<String> {
        default_timestamp_formats()
    }

    #[test]
    fn test_fold_strips_case_accents_and_spacing() {
        assert_eq!(fold("  Vitamina  C (Gotas) "), "vitamina c (gotas)");
        assert_eq!(fold("Fumarato Ferroso en Suspensión"), "fumarato ferroso en suspension");
        assert_eq!(fold("MEDICAMENTO"), "medicamento");
    }

    #[test]
    fn test_resolve_headers_prefers_exact_then_substring() {
        let headers = ["Nombre del medicamento", "Meta mensual", "Notas"];
        let map = resolve_headers(&headers, TARGET_PATTERNS);
        assert_eq!(map.get(&CanonicalField::Target), Some(&1));
        assert_eq!(map.get(&CanonicalField::ItemName), Some(&0));

        let headers = ["Meta anterior", "META", "Medicamento"];
        let map = resolve_headers(&headers, TARGET_PATTERNS);
        assert_eq!(map.get(&CanonicalField::Target), Some(&1));
        assert_eq!(map.get(&CanonicalField::ItemName), Some(&2));
    }

    #[test]
    fn test_resolve_headers_never_claims_a_column_twice() {
        let headers = ["meta por nombre"];
        let map = resolve_headers(&headers, TARGET_PATTERNS);
        assert_eq!(map.get(&CanonicalField::Target), Some(&0));
        assert!(!map.contains_key(&CanonicalField::ItemName));
    }

    #[test]
    fn test_resolve_donation_headers_google_forms() {
        let headers = ["Marca temporal", "Donante", "Contacto (opcional)"];
        let map = resolve_headers(&headers, DONATION_PATTERNS);
        assert_eq!(map.get(&CanonicalField::Timestamp), Some(&0));
        assert_eq!(map.get(&CanonicalField::Contact), Some(&2));
        assert_eq!(map.get(&CanonicalField::Identity), Some(&1));
    }

    #[test]
    fn test_fold_decomposed_matches_precomposed() {
        assert_eq!(fold("Suspensio\u{301}n"), fold("Suspensi\u{f3}n"));
        assert_eq!(fold("NIN\u{303}OS"), "ninos");
    }

    #[test]
    fn test_resolve_donation_headers_contact_never_takes_a_name_column() {
        let headers = ["Marca temporal", "Nombre del contacto"];
        let map = resolve_headers(&headers, DONATION_PATTERNS);
        assert!(!map.contains_key(&CanonicalField::Contact));
        assert_eq!(map.get(&CanonicalField::Identity), Some(&1));

        let headers = ["Donante (contacto)", "Alias"];
        let map = resolve_headers(&headers, DONATION_PATTERNS);
        assert_eq!(map.get(&CanonicalField::Contact), Some(&1));
        assert_eq!(map.get(&CanonicalField::Identity), Some(&0));
    }

    #[test]
    fn test_normalize_targets_basic() {
        let raw = RawTable::from_rows(
            &[" Medicamento ", "META"],
            &[&[Some(" VitC "), Some("100")], &[Some("IronSyrup"), Some("50.5")]],
        );
        let targets = normalize_targets(&raw).unwrap();
        assert_eq!(targets.items.len(), 2);
        assert_eq!(targets.items[0].name, "VitC");
        assert_eq!(targets.items[0].target, 100.0);
        assert_eq!(targets.items[1].target, 50.5);
        assert!(targets.warnings.is_empty());
    }

    #[test]
    fn test_normalize_targets_missing_target_column() {
        let raw = RawTable::from_rows(&["medicamento", "cantidad"], &[]);
        let err = normalize_targets(&raw).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::MissingField { field: "target", table: TableKind::Targets })
        ));
    }

    #[test]
    fn test_normalize_targets_missing_item_column() {
        let raw = RawTable::from_rows(&["meta"], &[]);
        let err = normalize_targets(&raw).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::MissingField { field: "item_name", .. })
        ));
    }

    #[test]
    fn test_normalize_targets_bad_and_negative_targets_become_zero() {
        let raw = RawTable::from_rows(
            &["nombre", "meta"],
            &[
                &[Some("A"), Some("lots")],
                &[Some("B"), Some("-5")],
                &[Some("C"), None],
            ],
        );
        let targets = normalize_targets(&raw).unwrap();
        assert!(targets.items.iter().all(|i| i.target == 0.0));
        let kinds: Vec<_> = targets.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![ParseWarningKind::UnparseableTarget, ParseWarningKind::NegativeTarget]
        );
    }

    #[test]
    fn test_normalize_targets_skips_blank_names() {
        let raw = RawTable::from_rows(
            &["nombre", "meta"],
            &[&[Some("  "), Some("10")], &[Some("nan"), Some("3")], &[Some("A"), Some("1")]],
        );
        let targets = normalize_targets(&raw).unwrap();
        assert_eq!(targets.items.len(), 1);
        assert_eq!(targets.warnings.len(), 2);
        assert_eq!(targets.warnings[0].row, 0);
        assert_eq!(targets.warnings[1].row, 1);
    }

    #[test]
    fn test_normalize_targets_rejects_folded_duplicates() {
        let raw = RawTable::from_rows(
            &["nombre", "meta"],
            &[&[Some("Vitamina Á"), Some("1")], &[Some("vitamina a"), Some("2")]],
        );
        let err = normalize_targets(&raw).unwrap_err();
        match err {
            Error::Schema(SchemaError::DuplicateItem { first, second }) => {
                assert_eq!(first, "Vitamina Á");
                assert_eq!(second, "vitamina a");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_normalize_donations_matches_items_case_insensitively() {
        let items = vec![
            FundraisingItem { name: "VitC".to_string(), target: 100.0 },
            FundraisingItem { name: "IronSyrup".to_string(), target: 50.0 },
        ];
        let raw = RawTable::from_rows(
            &["Timestamp", "VITC", "Gauze"],
            &[&[Some("05/03/2026 14:30:00"), Some("30"), Some("99")]],
        );
        let out = normalize_donations(&raw, &items, "Anon", &formats());
        let record = &out.records[0];

        assert_eq!(record.quantities.get("VitC"), Some(&30.0));
        // Synthesized zero column
        assert_eq!(record.quantities.get("IronSyrup"), Some(&0.0));
        // Undeclared column not carried
        assert!(!record.quantities.contains_key("Gauze"));
        assert_eq!(record.donor, "Anon");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_normalize_donations_bad_cells_warn_but_keep_row() {
        let items = vec![FundraisingItem { name: "VitC".to_string(), target: 10.0 }];
        let raw = RawTable::from_rows(
            &["timestamp", "VitC"],
            &[&[Some("yesterday"), Some("two")], &[Some("01/01/2026 00:00:01"), Some("4")]],
        );
        let out = normalize_donations(&raw, &items, "Anon", &formats());

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].timestamp, None);
        assert_eq!(out.records[0].quantities.get("VitC"), Some(&0.0));
        assert!(out.records[1].timestamp.is_some());
        let kinds: Vec<_> = out.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ParseWarningKind::UnparseableTimestamp,
                ParseWarningKind::UnparseableQuantity
            ]
        );
    }

    #[test]
    fn test_normalize_donations_never_reads_identity() {
        let items = vec![FundraisingItem { name: "VitC".to_string(), target: 10.0 }];
        let raw = RawTable::from_rows(
            &["Timestamp", "Donante", "Contacto (opcional)", "VitC"],
            &[&[Some("01/01/2026 10:00:00"), Some("Jane Doe"), Some(""), Some("1")]],
        );
        let out = normalize_donations(&raw, &items, "Anon", &formats());
        let rendered = format!("{:?}", out.records);
        assert!(!rendered.contains("Jane Doe"));
        assert_eq!(out.records[0].donor, "Anon");
    }

    #[test]
    fn test_parse_timestamp_day_first() {
        let ts = parse_timestamp("05/03/2026 14:30:15", &formats()).unwrap();
        assert_eq!(ts.day(), 5);
        assert_eq!(ts.month(), 3);
        assert_eq!(ts.second(), 15);

        let ts = parse_timestamp("5/3/2026 9:05", &formats()).unwrap();
        assert_eq!(ts.day(), 5);
        assert_eq!(ts.hour(), 9);

        let midnight = parse_timestamp("28/02/2026", &formats()).unwrap();
        assert_eq!(midnight.hour(), 0);

        assert!(parse_timestamp("02/30/2026 10:00:00", &formats()).is_none());
    }

    #[test]
    fn test_total_quantity_ignores_non_positive() {
        let record = DonationRecord {
            row: 0,
            timestamp: None,
            donor: "x".to_string(),
            quantities: BTreeMap::from([
                ("a".to_string(), 2.0),
                ("b".to_string(), -1.0),
                ("c".to_string(), 0.0),
            ]),
        };
        assert_eq!(record.total_quantity(), 2.0);
    }
}
