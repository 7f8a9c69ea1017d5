// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::bitset::FixedBitset;
use super::storage::{Store, StoreKind};
use super::world::World;
use telos_core::ecs::{Component, EntityId, MAX_ENTITIES};

// --- DUMMY COMPONENTS FOR TESTING ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Position(i32);
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Health(u32);
impl Component for Health {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct WorldSettings {
    gravity: i32,
}
impl Component for WorldSettings {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Frozen;
impl Component for Frozen {}

// --- BITSET TESTS ---

#[test]
fn bitset_set_all_true_saturates_exactly_to_capacity() {
    // Capacities straddling the word boundary, including a non-multiple.
    for capacity in [1usize, 63, 64, 65, 100, 128] {
        let mut bits = FixedBitset::new(capacity);
        bits.set_all(true);

        assert_eq!(
            bits.count_set(),
            capacity,
            "count after set_all(true) at capacity {capacity}"
        );
        assert_eq!(
            bits.first_unset(),
            None,
            "no unset bit may exist at capacity {capacity}"
        );
        assert_eq!(bits.first_set(), Some(0));
    }
}

#[test]
fn bitset_set_all_false_empties() {
    let mut bits = FixedBitset::new(100);
    bits.set_all(true);
    bits.set_all(false);

    assert_eq!(bits.count_set(), 0);
    assert_eq!(bits.first_set(), None);
    assert_eq!(bits.first_unset(), Some(0));
}

#[test]
fn bitset_bits_do_not_cross_talk() {
    // Capacity 100 puts indices 63/64 on the word boundary and 99 next to
    // the trailing dead bits.
    let mut bits = FixedBitset::new(100);
    bits.set(63);
    bits.set(64);
    bits.set(99);
    bits.flip(64); // back off
    bits.unset(63);

    assert!(!bits.get(63));
    assert!(!bits.get(64));
    assert!(bits.get(99));
    assert_eq!(bits.count_set(), 1);

    bits.flip(99);
    assert_eq!(bits.count_set(), 0, "flip must track parity per index");
}

#[test]
fn bitset_scans_respect_start_and_return_none_past_the_end() {
    let mut bits = FixedBitset::new(70);
    bits.set(2);
    bits.set(66);

    assert_eq!(bits.next_set_from(0), Some(2));
    assert_eq!(bits.next_set_from(3), Some(66));
    assert_eq!(bits.next_set_from(67), None, "no wrap-around");

    bits.set_all(true);
    bits.unset(65);
    assert_eq!(bits.next_unset_from(0), Some(65));
    assert_eq!(bits.next_unset_from(66), None);
}

#[test]
fn bitset_set_next_unset_finds_and_sets_atomically() {
    let mut bits = FixedBitset::new(8);
    bits.set(0);
    bits.set(1);

    assert_eq!(bits.set_next_unset_from(0), Some(2));
    assert!(bits.get(2), "the found index must be set");
    assert_eq!(bits.set_next_unset_from(0), Some(3));

    bits.set_all(true);
    assert_eq!(bits.set_next_unset_from(0), None, "full set has no slot");
}

// --- STORAGE TESTS ---

#[test]
fn storage_round_trip_for_payload_variants() {
    let id = EntityId(7);

    let mut dense = Store::<Position>::new(StoreKind::Dense);
    dense.add_with(id, Position(11));
    assert_eq!(dense.get(id), Some(&Position(11)));

    let mut sparse = Store::<Position>::new(StoreKind::Sparse);
    sparse.add_with(id, Position(22));
    assert_eq!(sparse.get(id), Some(&Position(22)));

    // Singleton ignores the id entirely.
    let mut singleton = Store::<WorldSettings>::new(StoreKind::Singleton);
    singleton.add_with(id, WorldSettings { gravity: -10 });
    assert_eq!(
        singleton.get(EntityId(1234)),
        Some(&WorldSettings { gravity: -10 })
    );
}

#[test]
fn dense_get_always_answers_with_the_default() {
    let dense = Store::<Position>::new(StoreKind::Dense);
    // Never added: the slot is still addressable and holds the default.
    assert_eq!(dense.get(EntityId(0)), Some(&Position(0)));
    assert_eq!(dense.get(EntityId((MAX_ENTITIES - 1) as u32)), Some(&Position(0)));
    // Sentinels are outside the universe and have no slot.
    assert_eq!(dense.get(EntityId::INVALID), None);
}

#[test]
fn sparse_and_tag_get_is_none_until_added() {
    let mut sparse = Store::<Health>::new(StoreKind::Sparse);
    assert_eq!(sparse.get(EntityId(3)), None);
    sparse.add(EntityId(3));
    assert_eq!(sparse.get(EntityId(3)), Some(&Health(0)));

    let mut tag = Store::<Frozen>::new(StoreKind::Tag);
    assert_eq!(tag.get(EntityId(3)), None);
    tag.add(EntityId(3));
    assert_eq!(tag.get(EntityId(3)), Some(&Frozen));
    assert_eq!(tag.get(EntityId(4)), None, "presence is per id");
}

#[test]
fn destroy_is_idempotent_for_every_variant() {
    let id = EntityId(5);

    let mut dense = Store::<Position>::new(StoreKind::Dense);
    dense.add_with(id, Position(1));
    dense.destroy(id);
    dense.destroy(id); // second destroy must not corrupt anything
    assert_eq!(dense.get(id), Some(&Position(1)), "dense never frees");

    let mut sparse = Store::<Position>::new(StoreKind::Sparse);
    sparse.add_with(id, Position(1));
    sparse.destroy(id);
    sparse.destroy(id);
    assert_eq!(sparse.get(id), None);

    let mut singleton = Store::<WorldSettings>::new(StoreKind::Singleton);
    singleton.destroy(id);
    singleton.destroy(id);
    assert!(singleton.get(id).is_some());

    let mut tag = Store::<Frozen>::new(StoreKind::Tag);
    tag.add(id);
    tag.destroy(id);
    tag.destroy(id);
    assert_eq!(tag.get(id), None);
}

#[test]
fn clear_releases_all_entries() {
    let mut sparse = Store::<Health>::new(StoreKind::Sparse);
    sparse.add_with(EntityId(1), Health(5));
    sparse.add_with(EntityId(2), Health(6));
    sparse.clear();
    assert_eq!(sparse.get(EntityId(1)), None);
    assert_eq!(sparse.get(EntityId(2)), None);

    let mut dense = Store::<Position>::new(StoreKind::Dense);
    dense.add_with(EntityId(1), Position(9));
    dense.clear();
    assert_eq!(dense.get(EntityId(1)), Some(&Position(0)), "reset to default");
}

#[test]
fn dense_escape_hatch_exposes_raw_slots() {
    let mut dense = Store::<Position>::new(StoreKind::Dense);
    dense.add_with(EntityId(2), Position(42));

    let slots = dense.slots().expect("dense store exposes its slot array");
    assert_eq!(slots.len(), MAX_ENTITIES);
    assert_eq!(slots[2], Position(42));

    let sparse = Store::<Position>::new(StoreKind::Sparse);
    assert!(sparse.slots().is_none(), "only dense has the escape hatch");
}

// --- REGISTRY TESTS ---

#[test]
fn registration_is_monotonic_and_duplicates_keep_the_first_id() {
    let mut world = World::new();

    let pos = world.register_component::<Position>(StoreKind::Dense).unwrap();
    let health = world.register_component::<Health>(StoreKind::Sparse).unwrap();
    assert_eq!(pos.0, 0);
    assert_eq!(health.0, 1);

    // Duplicate: logged, same id, original store untouched.
    let dup = world.register_component::<Position>(StoreKind::Sparse).unwrap();
    assert_eq!(dup, pos);
    assert_eq!(
        world.store::<Position>().unwrap().kind(),
        StoreKind::Dense,
        "duplicate registration must not replace the store"
    );
}

#[test]
fn registration_after_freeze_is_refused() {
    let mut world = World::new();
    world.register_component::<Position>(StoreKind::Dense);
    world.freeze();

    assert!(world.register_component::<Health>(StoreKind::Sparse).is_none());
    assert!(world.registry().type_id_of::<Health>().is_none());
}

#[test]
fn mask_of_ors_registered_bits_and_rejects_unknown_types() {
    let mut world = World::new();
    let pos = world.register_component::<Position>(StoreKind::Dense).unwrap();
    let health = world.register_component::<Health>(StoreKind::Sparse).unwrap();

    let mask = world.mask_of::<(Position, Health)>().unwrap();
    assert_eq!(mask, pos.mask().union(health.mask()));

    assert!(world.mask_of::<(Position, Frozen)>().is_none());
}

// --- WORLD TESTS ---

#[test]
fn create_entity_fills_the_universe_in_ascending_order() {
    let mut world = World::new();

    let mut previous: Option<EntityId> = None;
    for _ in 0..MAX_ENTITIES {
        let id = world.create_entity(0).expect("universe not yet full");
        if let Some(prev) = previous {
            assert!(id > prev, "ids must come out in ascending order");
        }
        previous = Some(id);
    }

    assert_eq!(world.entity_count(), MAX_ENTITIES);
    assert_eq!(
        world.create_entity(0),
        None,
        "the {MAX_ENTITIES}th + 1 creation must fail"
    );
}

#[test]
fn create_entity_honors_the_hint_without_wrapping() {
    let mut world = World::new();

    let id = world.create_entity(100).unwrap();
    assert_eq!(id, EntityId(100));

    // Index 0 is still free, but scanning starts at the hint.
    let next = world.create_entity(100).unwrap();
    assert_eq!(next, EntityId(101));

    assert_eq!(
        world.create_entity(MAX_ENTITIES as u32),
        None,
        "a hint past the end must not wrap to the free low indices"
    );
}

#[test]
fn create_entity_in_place_rejects_live_ids() {
    let mut world = World::new();

    assert_eq!(world.create_entity_in_place(EntityId(9)), Some(EntityId(9)));
    assert_eq!(world.create_entity_in_place(EntityId(9)), None);
    assert_eq!(world.create_entity_in_place(EntityId::INVALID), None);
}

#[test]
fn destroy_entity_clears_liveness_composition_and_storage() {
    // --- 1. SETUP ---
    let mut world = World::new();
    world.register_component::<Position>(StoreKind::Sparse);
    let id = world.create_entity(0).unwrap();
    world.add_component_with(id, Position(3));

    // --- 2. ACTION ---
    assert!(world.destroy_entity(id));

    // --- 3. ASSERTIONS ---
    assert!(!world.entity_exists(id));
    assert_eq!(
        world.store::<Position>().unwrap().get(id),
        None,
        "sparse storage must have released the slot"
    );
    assert!(!world.destroy_entity(id), "second destroy reports false");

    // The slot is recyclable and comes back with an empty composition.
    let recycled = world.create_entity(0).unwrap();
    assert_eq!(recycled, id);
    let mask = world.mask_of::<(Position,)>().unwrap();
    assert!(!world.entity_has_components(recycled, mask));
}

#[test]
fn composition_tracks_every_add_and_remove() {
    let mut world = World::new();
    world.register_component::<Position>(StoreKind::Dense);
    world.register_component::<Health>(StoreKind::Sparse);
    world.register_component::<Frozen>(StoreKind::Tag);

    let pos_mask = world.mask_of::<(Position,)>().unwrap();
    let health_mask = world.mask_of::<(Health,)>().unwrap();
    let both = pos_mask.union(health_mask);

    let id = world.create_entity(0).unwrap();
    assert!(!world.entity_has_components(id, pos_mask));

    world.add_component_with(id, Position(1));
    assert!(world.entity_has_components(id, pos_mask));
    assert!(!world.entity_has_components(id, both));

    world.add_component_with(id, Health(10));
    assert!(world.entity_has_components(id, both));

    assert!(world.remove_component::<Position>(id));
    assert!(!world.entity_has_components(id, pos_mask));
    assert!(world.entity_has_components(id, health_mask));

    // Removing what is not there reports false and changes nothing.
    assert!(!world.remove_component::<Position>(id));
    assert!(world.entity_has_components(id, health_mask));

    // Adding again is an overwrite, not an error.
    world.add_component_with(id, Health(99));
    assert_eq!(world.get_component::<Health>(id), Some(&Health(99)));
    assert!(world.entity_has_components(id, health_mask));
}

#[test]
fn add_component_on_a_dead_entity_is_refused() {
    let mut world = World::new();
    world.register_component::<Position>(StoreKind::Dense);

    assert!(world.add_component::<Position>(EntityId(3)).is_none());
    assert!(world.add_component::<Position>(EntityId::INVALID).is_none());
}

#[test]
fn group_iteration_walks_matching_entities_in_ascending_order() {
    // --- 1. SETUP ---
    let mut world = World::new();
    world.register_component::<Position>(StoreKind::Dense);
    world.register_component::<Frozen>(StoreKind::Tag);

    // Entities 0..10 all get Position; even ones also get the tag.
    for i in 0..10u32 {
        let id = world.create_entity(i).unwrap();
        world.add_component_with(id, Position(i as i32));
        if i % 2 == 0 {
            world.add_component::<Frozen>(id);
        }
    }

    // --- 2. ACTION ---
    let mask = world.mask_of::<(Position, Frozen)>().unwrap();
    let matched: Vec<u32> = world.group(mask).map(|id| id.0).collect();

    // --- 3. ASSERTIONS ---
    assert_eq!(matched, vec![0, 2, 4, 6, 8]);
    assert_eq!(world.count(mask), 5);

    // The range variant only sees its window.
    let windowed: Vec<u32> = world.group_range(mask, 3, 7).map(|id| id.0).collect();
    assert_eq!(windowed, vec![4, 6]);
}

#[test]
fn next_entity_with_returns_none_past_the_range() {
    let mut world = World::new();
    world.register_component::<Position>(StoreKind::Dense);
    let id = world.create_entity(5).unwrap();
    world.add_component::<Position>(id);

    let mask = world.mask_of::<(Position,)>().unwrap();
    assert_eq!(world.next_entity_with(mask, 0, 64), Some(id));
    assert_eq!(world.next_entity_with(mask, 6, 64), None);
    assert_eq!(world.next_entity_with(mask, 0, 5), None, "end is exclusive");
}

#[test]
fn singleton_components_live_on_the_pseudo_entity() {
    let mut world = World::new();
    world.register_component::<WorldSettings>(StoreKind::Singleton);

    // Never explicitly added: the singleton still answers with its default.
    assert_eq!(world.singleton::<WorldSettings>(), Some(&WorldSettings { gravity: 0 }));

    world.singleton_mut::<WorldSettings>().unwrap().gravity = -10;
    assert_eq!(
        world.singleton::<WorldSettings>().map(|s| s.gravity),
        Some(-10)
    );

    // The pseudo-entity is not part of the universe.
    assert!(!world.entity_exists(EntityId::SINGLETON));
}
