//! Filter definitions and query-string synchronization.
//!
//! A view's active filters live in the query string of its location URL so
//! that they survive reloads and can be shared. [`QueryState`] owns that
//! URL; [`parse_filters`] reads a validated [`FilterSet`] back out of it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use url::Url;

/// Filter name → current value. An absent key means unset.
pub type FilterSet = BTreeMap<String, String>;

/// Partial update: `None` unsets the filter.
pub type FilterPatch = BTreeMap<String, Option<String>>;

/// Declared value type of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    String,
    Number,
    Boolean,
    Date,
}

/// A filter value parsed for its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl FilterKind {
    pub fn parse(&self, raw: &str) -> Option<FilterValue> {
        match self {
            FilterKind::String => Some(FilterValue::Text(raw.to_string())),
            FilterKind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FilterValue::Number),
            FilterKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(FilterValue::Boolean(true)),
                "false" | "0" => Some(FilterValue::Boolean(false)),
                _ => None,
            },
            FilterKind::Date => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .ok()
                .map(FilterValue::Date),
        }
    }
}

/// Client-side predicate: keep `record` when it matches `value`.
pub type ClientPredicate<E> = Arc<dyn Fn(&E, &FilterValue) -> bool + Send + Sync>;

/// One filter a view accepts.
pub struct FilterDef<E> {
    pub name: String,
    pub kind: FilterKind,
    pub choices: Option<Vec<String>>,
    pub required: bool,
    pub client_filter: Option<ClientPredicate<E>>,
}

impl<E> Clone for FilterDef<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind,
            choices: self.choices.clone(),
            required: self.required,
            client_filter: self.client_filter.clone(),
        }
    }
}

impl<E> fmt::Debug for FilterDef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("choices", &self.choices)
            .field("required", &self.required)
            .field("client_side", &self.client_filter.is_some())
            .finish()
    }
}

impl<E> FilterDef<E> {
    pub fn new(name: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            choices: None,
            required: false,
            client_filter: None,
        }
    }

    #[must_use]
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Apply this filter locally instead of sending it to the server.
    #[must_use]
    pub fn client_side(mut self, predicate: impl Fn(&E, &FilterValue) -> bool + Send + Sync + 'static) -> Self {
        self.client_filter = Some(Arc::new(predicate));
        self
    }

    pub fn is_client_side(&self) -> bool {
        self.client_filter.is_some()
    }

    /// Parse `raw` if it is valid for this filter's kind and choices.
    pub fn accept(&self, raw: &str) -> Option<FilterValue> {
        if let Some(choices) = &self.choices {
            if !choices.iter().any(|c| c == raw) {
                return None;
            }
        }
        self.kind.parse(raw)
    }
}

/// Read the declared, valid filters out of `url`'s query string.
///
/// Undeclared keys, values that do not parse for their kind, and values
/// outside the choice set are dropped. For repeated keys the last wins.
pub fn parse_filters<E>(url: &Url, defs: &[FilterDef<E>]) -> FilterSet {
    let mut out = FilterSet::new();
    for (key, value) in url.query_pairs() {
        if let Some(def) = defs.iter().find(|d| d.name == key) {
            if def.accept(&value).is_some() {
                out.insert(key.into_owned(), value.into_owned());
            }
        }
    }
    out
}

/// Name of the first required filter without a value, if any.
pub fn missing_required<'a, E>(filters: &FilterSet, defs: &'a [FilterDef<E>]) -> Option<&'a str> {
    defs.iter()
        .find(|d| d.required && !filters.contains_key(&d.name))
        .map(|d| d.name.as_str())
}

/// Filters to send as request parameters: everything except the ones
/// applied client-side.
pub fn server_filters<E>(filters: &FilterSet, defs: &[FilterDef<E>]) -> FilterSet {
    filters
        .iter()
        .filter(|(name, _)| {
            !defs
                .iter()
                .any(|d| &d.name == *name && d.is_client_side())
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Whether any client-side filter currently has a usable value.
pub fn has_client_filters<E>(filters: &FilterSet, defs: &[FilterDef<E>]) -> bool {
    defs.iter().any(|d| {
        d.is_client_side()
            && filters
                .get(&d.name)
                .is_some_and(|raw| d.accept(raw).is_some())
    })
}

/// Reduce fetched records with the active client-side filters.
pub fn apply_client_filters<E>(records: &[E], filters: &FilterSet, defs: &[FilterDef<E>]) -> Vec<E>
where
    E: Clone,
{
    let active: Vec<(&ClientPredicate<E>, FilterValue)> = defs
        .iter()
        .filter_map(|d| {
            let predicate = d.client_filter.as_ref()?;
            let value = d.accept(filters.get(&d.name)?)?;
            Some((predicate, value))
        })
        .collect();

    records
        .iter()
        .filter(|record| active.iter().all(|(predicate, value)| predicate(record, value)))
        .cloned()
        .collect()
}

/// The current location of a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    url: Url,
}

impl QueryState {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn parse(location: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(location)?))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Every query parameter, undeclared ones included.
    pub fn params(&self) -> FilterSet {
        self.url.query_pairs().into_owned().collect()
    }

    /// Merge `patch` into the query string and return the merged set.
    ///
    /// `None` removes a key. An empty result clears the query entirely.
    pub fn update_query_param(&mut self, patch: &FilterPatch) -> FilterSet {
        let mut merged = self.params();
        for (key, value) in patch {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        if merged.is_empty() {
            self.url.set_query(None);
        } else {
            self.url
                .query_pairs_mut()
                .clear()
                .extend_pairs(merged.iter());
        }
        merged
    }
}
