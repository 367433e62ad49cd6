//! Boundlexx REST API access.
//!
//! - [`types`]: entity records, the page envelope, locales
//! - [`operation`]: the closed set of supported operations and list params
//! - [`schema`]: the remote definition the client is built from
//! - [`client`]: typed list / continuation / retrieve calls
//! - [`provider`]: the shared, lazily built client

pub mod client;
pub mod error;
pub mod operation;
pub mod provider;
pub mod schema;
pub mod types;

pub use client::ApiClient;
pub use error::{ApiError, Result};
pub use operation::{ListParams, Operation};
pub use provider::{ClientProvider, DefinitionCallback};
pub use schema::ApiDefinition;
pub use types::{
    Color, Emoji, Entity, EntityKind, Item, Lang, Metal, Page, Recipe, RecipeGroup, Skill,
    SkillGroup, Universe, World,
};
