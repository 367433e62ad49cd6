//! Root state: every slice the application persists.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::keyed::KeyedStore;
use crate::core::api::schema::ApiDefinition;
use crate::core::api::types::{
    Color, Emoji, EntityKind, Item, Lang, Metal, Recipe, RecipeGroup, Skill, SkillGroup, Universe,
    World,
};

/// User preferences. Never expires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    pub language: Lang,
    pub universe: Universe,
}

/// Last resolved API definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiState {
    pub def: Option<ApiDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootState {
    pub prefs: Prefs,
    pub api: ApiState,
    pub worlds: KeyedStore<u64, World>,
    pub items: KeyedStore<u64, Item>,
    pub colors: KeyedStore<u64, Color>,
    pub metals: KeyedStore<u64, Metal>,
    pub emojis: KeyedStore<String, Emoji>,
    pub recipes: KeyedStore<u64, Recipe>,
    pub recipe_groups: KeyedStore<u64, RecipeGroup>,
    pub skills: KeyedStore<u64, Skill>,
    pub skill_groups: KeyedStore<u64, SkillGroup>,
}

/// Names of the persisted slices, as written in the storage blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SliceName {
    Prefs,
    Api,
    Worlds,
    Items,
    Colors,
    Metals,
    Emojis,
    Recipes,
    RecipeGroups,
    Skills,
    SkillGroups,
}

impl SliceName {
    pub const ALL: [SliceName; 11] = [
        SliceName::Prefs,
        SliceName::Api,
        SliceName::Worlds,
        SliceName::Items,
        SliceName::Colors,
        SliceName::Metals,
        SliceName::Emojis,
        SliceName::Recipes,
        SliceName::RecipeGroups,
        SliceName::Skills,
        SliceName::SkillGroups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SliceName::Prefs => "prefs",
            SliceName::Api => "api",
            SliceName::Worlds => "worlds",
            SliceName::Items => "items",
            SliceName::Colors => "colors",
            SliceName::Metals => "metals",
            SliceName::Emojis => "emojis",
            SliceName::Recipes => "recipes",
            SliceName::RecipeGroups => "recipeGroups",
            SliceName::Skills => "skills",
            SliceName::SkillGroups => "skillGroups",
        }
    }

    pub fn for_kind(kind: EntityKind) -> SliceName {
        match kind {
            EntityKind::World => SliceName::Worlds,
            EntityKind::Item => SliceName::Items,
            EntityKind::Color => SliceName::Colors,
            EntityKind::Metal => SliceName::Metals,
            EntityKind::Emoji => SliceName::Emojis,
            EntityKind::Recipe => SliceName::Recipes,
            EntityKind::RecipeGroup => SliceName::RecipeGroups,
            EntityKind::Skill => SliceName::Skills,
            EntityKind::SkillGroup => SliceName::SkillGroups,
        }
    }

    /// Slices holding entity caches (everything except prefs and api).
    pub fn is_entity(&self) -> bool {
        !matches!(self, SliceName::Prefs | SliceName::Api)
    }
}

impl RootState {
    pub fn slice_to_value(&self, name: SliceName) -> serde_json::Result<Value> {
        match name {
            SliceName::Prefs => serde_json::to_value(&self.prefs),
            SliceName::Api => serde_json::to_value(&self.api),
            SliceName::Worlds => serde_json::to_value(&self.worlds),
            SliceName::Items => serde_json::to_value(&self.items),
            SliceName::Colors => serde_json::to_value(&self.colors),
            SliceName::Metals => serde_json::to_value(&self.metals),
            SliceName::Emojis => serde_json::to_value(&self.emojis),
            SliceName::Recipes => serde_json::to_value(&self.recipes),
            SliceName::RecipeGroups => serde_json::to_value(&self.recipe_groups),
            SliceName::Skills => serde_json::to_value(&self.skills),
            SliceName::SkillGroups => serde_json::to_value(&self.skill_groups),
        }
    }

    /// Replace one slice from its persisted JSON. On error the slice is
    /// left untouched.
    pub fn set_slice_from_value(&mut self, name: SliceName, value: Value) -> serde_json::Result<()> {
        match name {
            SliceName::Prefs => self.prefs = serde_json::from_value(value)?,
            SliceName::Api => self.api = serde_json::from_value(value)?,
            SliceName::Worlds => self.worlds = serde_json::from_value(value)?,
            SliceName::Items => self.items = serde_json::from_value(value)?,
            SliceName::Colors => self.colors = serde_json::from_value(value)?,
            SliceName::Metals => self.metals = serde_json::from_value(value)?,
            SliceName::Emojis => self.emojis = serde_json::from_value(value)?,
            SliceName::Recipes => self.recipes = serde_json::from_value(value)?,
            SliceName::RecipeGroups => self.recipe_groups = serde_json::from_value(value)?,
            SliceName::Skills => self.skills = serde_json::from_value(value)?,
            SliceName::SkillGroups => self.skill_groups = serde_json::from_value(value)?,
        }
        Ok(())
    }

    /// Reset one slice to its initial value.
    pub fn reset_slice(&mut self, name: SliceName) {
        match name {
            SliceName::Prefs => self.prefs = Prefs::default(),
            SliceName::Api => self.api = ApiState::default(),
            SliceName::Worlds => self.worlds = KeyedStore::default(),
            SliceName::Items => self.items = KeyedStore::default(),
            SliceName::Colors => self.colors = KeyedStore::default(),
            SliceName::Metals => self.metals = KeyedStore::default(),
            SliceName::Emojis => self.emojis = KeyedStore::default(),
            SliceName::Recipes => self.recipes = KeyedStore::default(),
            SliceName::RecipeGroups => self.recipe_groups = KeyedStore::default(),
            SliceName::Skills => self.skills = KeyedStore::default(),
            SliceName::SkillGroups => self.skill_groups = KeyedStore::default(),
        }
    }

    /// `(stored records, reported count)` for an entity slice.
    pub fn slice_progress(&self, kind: EntityKind) -> (usize, Option<u64>) {
        match kind {
            EntityKind::World => (self.worlds.len(), self.worlds.count),
            EntityKind::Item => (self.items.len(), self.items.count),
            EntityKind::Color => (self.colors.len(), self.colors.count),
            EntityKind::Metal => (self.metals.len(), self.metals.count),
            EntityKind::Emoji => (self.emojis.len(), self.emojis.count),
            EntityKind::Recipe => (self.recipes.len(), self.recipes.count),
            EntityKind::RecipeGroup => (self.recipe_groups.len(), self.recipe_groups.count),
            EntityKind::Skill => (self.skills.len(), self.skills.count),
            EntityKind::SkillGroup => (self.skill_groups.len(), self.skill_groups.count),
        }
    }
}
