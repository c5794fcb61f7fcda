//! Durable storage for [`ChangeState`].
//!
//! The state lives in the `system_state` key-value table, one row per
//! dashboard instance. Every function is generic over `ConnectionTrait` so the
//! refresh cycle can run load and save inside a single transaction.

use crate::{
    core::change::ChangeState,
    entities::{SystemState, system_state},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use tracing::{debug, instrument};

const CHANGE_STATE_KEY_PREFIX: &str = "change_state:";

/// Key under which a dashboard's change state is stored.
#[must_use]
pub fn change_state_key(dashboard_id: &str) -> String {
    format!("{CHANGE_STATE_KEY_PREFIX}{dashboard_id}")
}

/// Retrieves a raw value from the `system_state` table.
///
/// # Returns
/// * `Ok(Some(value))` - The key exists
/// * `Ok(None)` - The key has never been written
pub async fn get_state_value<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;
    Ok(state.map(|s| s.value))
}

/// Inserts or updates a raw value in the `system_state` table.
pub async fn set_state_value<C>(db: &C, key: &str, value: String) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(value);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_state = system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(now),
            ..Default::default()
        };
        new_state.insert(db).await?;
    }

    Ok(())
}

/// Loads the stored change state for a dashboard.
///
/// # Errors
/// Returns `Error::Database` when the store cannot be queried and
/// `Error::CorruptState` when the stored value is not a valid state.
#[instrument(skip(db))]
pub async fn load_change_state<C>(db: &C, dashboard_id: &str) -> Result<Option<ChangeState>>
where
    C: ConnectionTrait,
{
    let Some(raw) = get_state_value(db, &change_state_key(dashboard_id)).await? else {
        debug!("No stored change state");
        return Ok(None);
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| Error::CorruptState {
            message: format!("change state for `{dashboard_id}`: {e}"),
        })
}

/// Stores the change state for a dashboard, replacing any previous value.
#[instrument(skip(db, state))]
pub async fn save_change_state<C>(db: &C, dashboard_id: &str, state: &ChangeState) -> Result<()>
where
    C: ConnectionTrait,
{
    let value = serde_json::to_string(state)?;
    set_state_value(db, &change_state_key(dashboard_id), value).await?;
    debug!(timestamp = %state.timestamp, "Stored change state");
    Ok(())
}
