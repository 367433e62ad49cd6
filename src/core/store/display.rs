//! Store-to-display mapping.
//!
//! A display buffer is a `Vec<Option<V>>` whose length is the total the
//! virtualized view should reserve; `None` marks a slot that has not been
//! fetched yet.

use super::keyed::KeyedStore;

/// Padded, ordered view of a store.
pub type DisplayBuffer<V> = Vec<Option<V>>;

/// Project a store into a display buffer: records in key order, then
/// placeholders up to `count` (or `default_page_size` while `count` is
/// unknown). The buffer is never shorter than the number of records.
pub fn map_store_to_items<K: Ord, V: Clone>(
    store: &KeyedStore<K, V>,
    default_page_size: usize,
) -> DisplayBuffer<V> {
    let target = store
        .count
        .map(|count| count as usize)
        .unwrap_or(default_page_size);

    let mut buffer: DisplayBuffer<V> = store.items.values().cloned().map(Some).collect();
    if buffer.len() < target {
        buffer.resize(target, None);
    }
    buffer
}

/// Numeric-keyed stores sort ascending by id.
pub fn map_numeric_store_to_items<V: Clone>(
    store: &KeyedStore<u64, V>,
    default_page_size: usize,
) -> DisplayBuffer<V> {
    map_store_to_items(store, default_page_size)
}

/// String-keyed stores sort lexicographically.
pub fn map_string_store_to_items<V: Clone>(
    store: &KeyedStore<String, V>,
    default_page_size: usize,
) -> DisplayBuffer<V> {
    map_store_to_items(store, default_page_size)
}

/// All-placeholder buffer of `len` slots.
pub fn placeholders<V: Clone>(len: usize) -> DisplayBuffer<V> {
    vec![None; len]
}

/// Write `page` at `offset`, then pad with placeholders to `total`.
///
/// Slots outside the page keep their content. The buffer grows to cover
/// the page even if `total` is smaller.
pub fn splice_page<V: Clone>(buffer: &mut DisplayBuffer<V>, offset: usize, page: Vec<V>, total: usize) {
    let end = offset + page.len();
    let len = total.max(end);
    if buffer.len() < len {
        buffer.resize(len, None);
    }
    for (slot, record) in buffer[offset..end].iter_mut().zip(page) {
        *slot = Some(record);
    }
}

/// Number of fetched (non-placeholder) slots.
pub fn filled<V>(buffer: &[Option<V>]) -> usize {
    buffer.iter().filter(|slot| slot.is_some()).count()
}
