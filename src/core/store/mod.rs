//! Normalized entity caches and their persistence.

pub mod display;
pub mod error;
pub mod keyed;
pub mod persist;
pub mod state;
pub mod storage;

pub use display::{map_numeric_store_to_items, map_store_to_items, map_string_store_to_items, DisplayBuffer};
pub use error::{Result, StoreError};
pub use keyed::{KeyedStore, Pagination, StoreUpdate};
pub use persist::{ExpiryPolicy, PersistedStore};
pub use state::{ApiState, Prefs, RootState, SliceName};
pub use storage::{FileStateStorage, MemoryStateStorage, StateStorage, ROOT_KEY};
