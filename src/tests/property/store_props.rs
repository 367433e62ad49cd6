//! Property-based tests for the keyed store and its display mapping
//!
//! Tests invariants:
//! - Merging the same batch twice equals merging it once
//! - One record per natural key, last write wins
//! - Pagination fields move together
//! - Display buffers pad to the reported total without losing records

use proptest::prelude::*;

use crate::core::api::{Lang, Page, World};
use crate::core::store::display::{filled, placeholders, splice_page};
use crate::core::store::{map_numeric_store_to_items, KeyedStore, StoreUpdate};

// ============================================================================
// Strategies for generating test inputs
// ============================================================================

fn arb_world() -> impl Strategy<Value = World> {
    (0u64..50, "[a-z]{1,8}").prop_map(|(id, name)| World::new(id).with_field("name", name))
}

fn arb_lang() -> impl Strategy<Value = Option<Lang>> {
    prop_oneof![
        Just(None),
        Just(Some(Lang::English)),
        Just(Some(Lang::German)),
        Just(Some(Lang::French)),
    ]
}

fn arb_update() -> impl Strategy<Value = StoreUpdate<World>> {
    (
        prop::collection::vec(arb_world(), 0..20),
        prop::option::of((0u64..100, prop::option::of("[a-z]{4}"), arb_lang())),
    )
        .prop_map(|(items, pagination)| match pagination {
            Some((count, next, lang)) => StoreUpdate::from_page(
                Page {
                    count,
                    next: next.map(|cursor| format!("https://api/worlds/?c={cursor}")),
                    previous: None,
                    results: items,
                },
                lang,
            ),
            None => StoreUpdate::items_only(items),
        })
}

// ============================================================================
// Merge
// ============================================================================

proptest! {
    #[test]
    fn merge_is_idempotent(seed in prop::collection::vec(arb_update(), 0..4), update in arb_update()) {
        let mut once: KeyedStore<u64, World> = KeyedStore::new();
        for batch in seed {
            once.merge(batch);
        }
        once.merge(update.clone());

        let mut twice = once.clone();
        twice.merge(update);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn one_record_per_key_last_write_wins(records in prop::collection::vec(arb_world(), 0..40)) {
        let mut store: KeyedStore<u64, World> = KeyedStore::new();
        store.merge(StoreUpdate::items_only(records.clone()));

        let mut distinct: Vec<u64> = records.iter().map(|w| w.id).collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(store.len(), distinct.len());

        for id in distinct {
            let latest = records.iter().rev().find(|w| w.id == id);
            prop_assert_eq!(store.get(&id), latest);
        }
    }

    #[test]
    fn pagination_replaced_as_a_unit(first in arb_update(), second in arb_update()) {
        let mut store: KeyedStore<u64, World> = KeyedStore::new();
        store.merge(first.clone());
        let before = (store.count, store.next_url.clone(), store.lang);
        store.merge(second.clone());

        match second.pagination {
            Some(p) => {
                prop_assert_eq!(store.count, Some(p.count));
                prop_assert_eq!(store.next_url, p.next_url);
                prop_assert_eq!(store.lang, p.lang);
            }
            None => {
                prop_assert_eq!((store.count, store.next_url, store.lang), before);
            }
        }
    }
}

// ============================================================================
// Display mapping
// ============================================================================

proptest! {
    #[test]
    fn buffer_pads_to_total(
        records in prop::collection::vec(arb_world(), 0..40),
        count in prop::option::of(0u64..80),
        default_page_size in 1usize..60,
    ) {
        let mut store: KeyedStore<u64, World> = KeyedStore::new();
        store.merge(StoreUpdate::items_only(records));
        store.count = count;

        let buffer = map_numeric_store_to_items(&store, default_page_size);
        let target = count.map(|c| c as usize).unwrap_or(default_page_size);
        prop_assert_eq!(buffer.len(), target.max(store.len()));
        prop_assert_eq!(filled(&buffer), store.len());

        // Records lead, in ascending key order.
        let ids: Vec<u64> = buffer.iter().map_while(|slot| slot.as_ref().map(|w| w.id)).collect();
        let expected: Vec<u64> = store.items.keys().copied().collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn splice_fills_page_slots(
        total in 0usize..60,
        offset in 0usize..40,
        page in prop::collection::vec(arb_world(), 0..20),
    ) {
        let mut buffer = placeholders::<World>(total);
        let page_len = page.len();
        splice_page(&mut buffer, offset, page.clone(), total);

        prop_assert_eq!(buffer.len(), total.max(offset + page_len));
        prop_assert_eq!(filled(&buffer), page_len);
        for (i, record) in page.into_iter().enumerate() {
            prop_assert_eq!(buffer[offset + i].as_ref(), Some(&record));
        }
    }
}
