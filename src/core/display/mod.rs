//! List views over the entity caches.

pub mod controller;
pub mod filters;

pub use controller::{DisplayConfig, DisplayController, DisplayProps, FetchOutcome, LoadState, SkipReason};
pub use filters::{FilterDef, FilterKind, FilterPatch, FilterSet, FilterValue, QueryState};
