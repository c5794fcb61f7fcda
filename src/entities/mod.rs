//! Entity module - `SeaORM` entity definitions for the state store.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod system_state;

pub use system_state::{Entity as SystemState, Model as SystemStateModel};
