//! Supported API operations and list request parameters.

use std::collections::BTreeMap;

use super::types::{EntityKind, Lang};

/// An operation the client knows how to dispatch.
///
/// Each variant maps to one `operationId` in the schema document; the
/// request path is resolved from the definition when the client is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    List(EntityKind),
    Retrieve(EntityKind),
}

impl Operation {
    pub fn operation_id(&self) -> &'static str {
        use EntityKind::*;
        match self {
            Operation::List(World) => "listWorlds",
            Operation::List(Item) => "listItems",
            Operation::List(Color) => "listColors",
            Operation::List(Metal) => "listMetals",
            Operation::List(Emoji) => "listEmojis",
            Operation::List(Recipe) => "listRecipes",
            Operation::List(RecipeGroup) => "listRecipeGroups",
            Operation::List(Skill) => "listSkills",
            Operation::List(SkillGroup) => "listSkillGroups",
            Operation::Retrieve(World) => "retrieveWorld",
            Operation::Retrieve(Item) => "retrieveItem",
            Operation::Retrieve(Color) => "retrieveColor",
            Operation::Retrieve(Metal) => "retrieveMetal",
            Operation::Retrieve(Emoji) => "retrieveEmoji",
            Operation::Retrieve(Recipe) => "retrieveRecipe",
            Operation::Retrieve(RecipeGroup) => "retrieveRecipeGroup",
            Operation::Retrieve(Skill) => "retrieveSkill",
            Operation::Retrieve(SkillGroup) => "retrieveSkillGroup",
        }
    }

    /// Every operation, list operations first.
    pub fn all() -> impl Iterator<Item = Operation> {
        EntityKind::ALL
            .into_iter()
            .map(Operation::List)
            .chain(EntityKind::ALL.into_iter().map(Operation::Retrieve))
    }

    pub fn from_operation_id(id: &str) -> Option<Operation> {
        Operation::all().find(|op| op.operation_id() == id)
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Operation::List(kind) | Operation::Retrieve(kind) => *kind,
        }
    }
}

/// Query parameters for the first page of a list operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    pub limit: usize,
    pub offset: usize,
    pub lang: Option<Lang>,
    pub search: Option<String>,
    /// Entity-specific server-side filters (`tier`, `world_type`, ...).
    pub filters: BTreeMap<String, String>,
}

impl ListParams {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn lang(mut self, lang: Option<Lang>) -> Self {
        self.lang = lang;
        self
    }

    #[must_use]
    pub fn search(mut self, search: Option<String>) -> Self {
        self.search = search;
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: BTreeMap<String, String>) -> Self {
        self.filters = filters;
        self
    }

    /// Flatten into query pairs. Explicit `limit`/`offset`/`lang`/`search`
    /// win over a filter of the same name.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("offset".to_string(), self.offset.to_string()),
        ];
        if let Some(lang) = self.lang {
            query.push(("lang".to_string(), lang.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            query.push(("search".to_string(), search.clone()));
        }
        for (name, value) in &self.filters {
            if matches!(name.as_str(), "limit" | "offset" | "lang" | "search") {
                continue;
            }
            query.push((name.clone(), value.clone()));
        }
        query
    }
}
