//! Keyed item store: one normalized cache per entity type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::api::types::{Entity, Lang, Page};

/// Natural key → latest record, plus the pagination state of the canonical
/// (unfiltered, locale-scoped) listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    bound(
        serialize = "K: Serialize, V: Serialize",
        deserialize = "K: Ord + Deserialize<'de>, V: Deserialize<'de>"
    )
)]
pub struct KeyedStore<K, V> {
    pub items: BTreeMap<K, V>,
    pub count: Option<u64>,
    pub next_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<Lang>,
}

impl<K, V> Default for KeyedStore<K, V> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            count: None,
            next_url: None,
            lang: None,
        }
    }
}

/// Pagination metadata taken from one response. Applied as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    pub count: u64,
    pub next_url: Option<String>,
    pub lang: Option<Lang>,
}

/// A batch of fetched records and, for canonical fetches, the pagination
/// state that came with them.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreUpdate<V> {
    pub items: Vec<V>,
    pub pagination: Option<Pagination>,
}

impl<V> StoreUpdate<V> {
    /// Records only; `count`/`next_url`/`lang` stay as they are.
    pub fn items_only(items: Vec<V>) -> Self {
        Self {
            items,
            pagination: None,
        }
    }

    /// Records plus the page's pagination metadata.
    pub fn from_page(page: Page<V>, lang: Option<Lang>) -> Self {
        Self {
            items: page.results,
            pagination: Some(Pagination {
                count: page.count,
                next_url: page.next,
                lang,
            }),
        }
    }
}

impl<K: Ord, V> KeyedStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.items.get(key)
    }

    /// `count` is known, every counted record has been stored and no
    /// continuation cursor is outstanding.
    pub fn is_complete(&self) -> bool {
        self.next_url.is_none() && matches!(self.count, Some(count) if self.items.len() as u64 >= count)
    }

    /// Complete, and scoped to `lang` (ignored when `lang` is `None`).
    pub fn is_complete_for(&self, lang: Option<Lang>) -> bool {
        self.is_complete() && (lang.is_none() || self.lang == lang)
    }

    /// Whether the stored pagination state belongs to `lang`.
    pub fn matches_lang(&self, lang: Option<Lang>) -> bool {
        lang.is_none() || self.lang == lang
    }
}

impl<V: Entity> KeyedStore<V::Key, V> {
    /// Merge a batch into the store.
    ///
    /// Records overwrite any existing record with the same key. Pagination
    /// fields are replaced together or not at all. A page tagged with a
    /// different locale than the store drops the records of the old one.
    pub fn merge(&mut self, update: StoreUpdate<V>) {
        if let Some(pagination) = &update.pagination {
            if pagination.lang.is_some() && pagination.lang != self.lang {
                self.items.clear();
            }
        }
        for record in update.items {
            self.items.insert(record.key(), record);
        }
        if let Some(pagination) = update.pagination {
            self.count = Some(pagination.count);
            self.next_url = pagination.next_url;
            self.lang = pagination.lang;
        }
    }
}
