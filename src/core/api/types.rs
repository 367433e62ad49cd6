//! Entity records and the shared response envelope.
//!
//! Records keep their natural key as a typed field and carry every other
//! API field as an opaque JSON map, so new backend fields survive a
//! round-trip through the persisted store without a code change.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::store::keyed::KeyedStore;
use crate::core::store::state::RootState;

// ============================================================================
// Locale / Universe
// ============================================================================

/// Client locales the API can localize names into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    English,
    French,
    German,
    Italian,
    Spanish,
}

impl Lang {
    /// Value sent as the `lang` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::English => "english",
            Lang::French => "french",
            Lang::German => "german",
            Lang::Italian => "italian",
            Lang::Spanish => "spanish",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Game universe the cached data belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Universe {
    #[default]
    Live,
    Testing,
}

// ============================================================================
// Response envelope
// ============================================================================

/// One page of a list operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total records matching the query, across all pages.
    pub count: u64,
    /// Absolute URL of the next page, or `None` on the last page.
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

// ============================================================================
// Entity kinds
// ============================================================================

/// Every entity type the API exposes through list/retrieve operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    World,
    Item,
    Color,
    Metal,
    Emoji,
    Recipe,
    RecipeGroup,
    Skill,
    SkillGroup,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::World,
        EntityKind::Item,
        EntityKind::Color,
        EntityKind::Metal,
        EntityKind::Emoji,
        EntityKind::Recipe,
        EntityKind::RecipeGroup,
        EntityKind::Skill,
        EntityKind::SkillGroup,
    ];

    /// Whether list requests for this kind accept a `lang` parameter and
    /// its store is scoped to one locale.
    pub fn is_localized(&self) -> bool {
        !matches!(self, EntityKind::World | EntityKind::Emoji)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::World => "worlds",
            EntityKind::Item => "items",
            EntityKind::Color => "colors",
            EntityKind::Metal => "metals",
            EntityKind::Emoji => "emojis",
            EntityKind::Recipe => "recipes",
            EntityKind::RecipeGroup => "recipe groups",
            EntityKind::Skill => "skills",
            EntityKind::SkillGroup => "skill groups",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Entity trait
// ============================================================================

/// A record type with a natural key and a home slice in [`RootState`].
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Natural key: numeric game id or a string name.
    type Key: Ord
        + Clone
        + fmt::Debug
        + fmt::Display
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    const KIND: EntityKind;

    fn key(&self) -> Self::Key;

    fn slice(state: &RootState) -> &KeyedStore<Self::Key, Self>;

    fn slice_mut(state: &mut RootState) -> &mut KeyedStore<Self::Key, Self>;
}

macro_rules! numeric_entity {
    ($(#[$meta:meta])* $name:ident, $key:ident, $kind:ident, $slice:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub $key: u64,
            #[serde(flatten)]
            pub fields: serde_json::Map<String, serde_json::Value>,
        }

        impl $name {
            pub fn new($key: u64) -> Self {
                Self {
                    $key,
                    fields: serde_json::Map::new(),
                }
            }

            /// Attach an opaque API field.
            pub fn with_field(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
                self.fields.insert(name.to_string(), value.into());
                self
            }
        }

        impl Entity for $name {
            type Key = u64;
            const KIND: EntityKind = EntityKind::$kind;

            fn key(&self) -> u64 {
                self.$key
            }

            fn slice(state: &RootState) -> &KeyedStore<u64, Self> {
                &state.$slice
            }

            fn slice_mut(state: &mut RootState) -> &mut KeyedStore<u64, Self> {
                &mut state.$slice
            }
        }
    };
}

numeric_entity!(
    /// A Boundless world (planet, sovereign or creative).
    World, id, World, worlds
);
numeric_entity!(
    /// An in-game item, keyed by its game id.
    Item, game_id, Item, items
);
numeric_entity!(Color, game_id, Color, colors);
numeric_entity!(Metal, game_id, Metal, metals);
numeric_entity!(Recipe, id, Recipe, recipes);
numeric_entity!(RecipeGroup, id, RecipeGroup, recipe_groups);
numeric_entity!(Skill, id, Skill, skills);
numeric_entity!(SkillGroup, id, SkillGroup, skill_groups);

/// A chat emoji. Emojis have no numeric id; the first display name is
/// their natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emoji {
    pub names: Vec<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Emoji {
    pub fn new(name: &str) -> Self {
        Self {
            names: vec![name.to_string()],
            fields: serde_json::Map::new(),
        }
    }
}

impl Entity for Emoji {
    type Key = String;
    const KIND: EntityKind = EntityKind::Emoji;

    fn key(&self) -> String {
        self.names.first().cloned().unwrap_or_default()
    }

    fn slice(state: &RootState) -> &KeyedStore<String, Self> {
        &state.emojis
    }

    fn slice_mut(state: &mut RootState) -> &mut KeyedStore<String, Self> {
        &mut state.emojis
    }
}
