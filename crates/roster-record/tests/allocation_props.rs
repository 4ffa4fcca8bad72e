//! Property tests for identity allocation.
//!
//! Allocation must never hand out an identifier already present, whatever
//! mix of prefixes and widths the collection holds.

use proptest::prelude::*;
use roster_record::{allocate, Collection, IdentityAllocator, Person, PersonRecord};

proptest! {
    #[test]
    fn allocated_id_is_never_taken(seqs in prop::collection::btree_set(0u64..5000, 0..40)) {
        let existing: Vec<String> = seqs.iter().map(|n| format!("vocal_{n:03}")).collect();
        let id = allocate("vocal", existing.iter().map(String::as_str)).unwrap();

        prop_assert!(!existing.contains(&id));
        let expected = seqs.iter().max().map_or(1, |m| m + 1);
        prop_assert_eq!(id.trim_start_matches("vocal_").parse::<u64>().unwrap(), expected);
    }

    #[test]
    fn batch_allocation_is_unique(count in 1usize..20, start in 0u64..100) {
        let existing = [format!("dance_{start:03}")];
        let mut allocator = IdentityAllocator::scan("dance", existing.iter().map(String::as_str)).unwrap();
        let ids: Vec<String> = (0..count).map(|_| allocator.next_id().unwrap()).collect();

        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), count);
        prop_assert!(!ids.contains(&existing[0]));
    }

    #[test]
    fn foreign_prefixes_do_not_interfere(n in 1u64..999) {
        let mut people = Collection::<Person>::default();
        people.push(PersonRecord::new(format!("dance_{n:03}"), "a"));
        people.push(PersonRecord::new("chen_tao", "b"));

        prop_assert_eq!(allocate("vocal", people.ids()).unwrap(), "vocal_001");
    }
}
