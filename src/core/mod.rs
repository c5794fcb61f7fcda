//! Core donation pipeline - framework-agnostic and free of presentation.
//!
//! Data flows one way: raw tables are normalized ([`schema`]), donor fields
//! are redacted ([`privacy`]), items are reconciled ([`reconcile`]), the
//! latest donation is compared with stored state ([`change`], [`state`]) and
//! everything is assembled into a [`progress::ProgressModel`].

/// New-donation detection and fingerprinting
pub mod change;
/// Donor display-name redaction
pub mod privacy;
/// Snapshot handed to renderers
pub mod progress;
/// Per-item and global progress
pub mod reconcile;
/// Header resolution and table normalization
pub mod schema;
/// Durable change-state storage
pub mod state;
/// Untyped tabular input
pub mod table;
