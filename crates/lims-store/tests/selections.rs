//! Tests for selection actions and their per-model request queue.

mod common;

use std::collections::BTreeSet;

use common::{FakeServer, blood_config, call_names, drain, keys, loaded_store, sample_row};
use lims_model::{LoadingState, Slice};
use lims_store::{Effects, QueryModelStore, SelectionOp};
use proptest::prelude::*;

fn selections(store: &QueryModelStore) -> BTreeSet<String> {
    store.model("blood").expect("model").selections.clone()
}

#[test]
fn select_row_sets_its_primary_key() {
    let mut server = FakeServer::new(10);
    let mut store = loaded_store("blood", blood_config("blood"), &mut server);

    let effects = store
        .select_row("blood", true, &sample_row(7))
        .expect("select row");
    assert_eq!(call_names(&effects), vec!["set_selections"]);
    drain(&mut store, &mut server, effects);
    assert_eq!(selections(&store), BTreeSet::from(["7".to_string()]));

    let effects = store
        .select_row("blood", false, &sample_row(7))
        .expect("deselect row");
    drain(&mut store, &mut server, effects);
    assert!(selections(&store).is_empty());
}

#[test]
fn select_page_uses_current_page_keys() {
    let mut server = FakeServer::new(30);
    let mut store = loaded_store("blood", blood_config("blood").with_max_rows(10), &mut server);
    let effects = store.load_next_page("blood").expect("next page");
    drain(&mut store, &mut server, effects);

    let effects = store.select_page("blood", true).expect("select page");
    drain(&mut store, &mut server, effects);

    assert_eq!(selections(&store), keys(11..=20).into_iter().collect::<BTreeSet<_>>());
    assert_eq!(
        store.model("blood").expect("model").selected_state(),
        lims_model::SelectedState::AllSelected
    );
}

#[test]
fn select_all_then_clear() {
    let mut server = FakeServer::new(25);
    let mut store = loaded_store("blood", blood_config("blood").with_max_rows(10), &mut server);

    let effects = store.select_all_rows("blood").expect("select all");
    assert_eq!(
        store.model("blood").expect("model").selections_loading_state(),
        LoadingState::Loading
    );
    drain(&mut store, &mut server, effects);
    assert_eq!(selections(&store).len(), 25);

    let effects = store.clear_selections("blood").expect("clear");
    drain(&mut store, &mut server, effects);
    assert!(selections(&store).is_empty());
    assert!(server.selections.is_empty());
}

#[test]
fn replace_selections_overwrites() {
    let mut server = FakeServer::new(10);
    server.selections = keys([1, 2]).into_iter().collect();
    let mut store = loaded_store("blood", blood_config("blood"), &mut server);

    let effects = store
        .replace_selections("blood", keys([5]))
        .expect("replace");
    drain(&mut store, &mut server, effects);
    assert_eq!(selections(&store), BTreeSet::from(["5".to_string()]));
}

#[test]
fn second_request_waits_for_the_first() {
    let mut server = FakeServer::new(10);
    let mut store = loaded_store("blood", blood_config("blood"), &mut server);

    let first = store
        .set_selections("blood", true, keys([1]))
        .expect("first");
    let second = store
        .set_selections("blood", true, keys([2]))
        .expect("second");
    assert_eq!(call_names(&first), vec!["set_selections"]);
    assert!(second.is_empty(), "queued behind the in-flight request");
    assert!(!store.selections_idle("blood"));

    let call = first.loader_calls().next().expect("call").clone();
    let next = store.apply(server.answer(&call)).expect("apply");
    assert_eq!(call_names(&next), vec!["set_selections"]);
    assert_eq!(selections(&store), BTreeSet::from(["1".to_string()]));

    drain(&mut store, &mut server, next);
    assert_eq!(selections(&store), keys([1, 2]).into_iter().collect::<BTreeSet<_>>());
    assert!(store.selections_idle("blood"));
}

#[test]
fn replaced_model_queue_ignores_the_old_request() {
    let mut server = FakeServer::new(10);
    let mut store = loaded_store("blood", blood_config("blood"), &mut server);

    let old = store
        .set_selections("blood", true, keys([1]))
        .expect("old request");
    let old_call = old.loader_calls().next().expect("call").clone();

    store.add_model(blood_config("blood"), false, false);
    let current = store
        .set_selections("blood", true, keys([2]))
        .expect("current request");
    let current_call = current.loader_calls().next().expect("call").clone();
    assert!(
        store
            .set_selections("blood", true, keys([3]))
            .expect("queued")
            .is_empty()
    );

    let next = store.apply(server.answer(&old_call)).expect("apply old");
    assert!(next.is_empty(), "old response must not start the queued request");

    let next = store.apply(server.answer(&current_call)).expect("apply current");
    assert_eq!(call_names(&next), vec!["set_selections"]);
    drain(&mut store, &mut server, next);
    assert_eq!(selections(&store), keys([2, 3]).into_iter().collect::<BTreeSet<_>>());
    assert!(store.selections_idle("blood"));
}

#[test]
fn pending_load_is_coalesced() {
    let mut server = FakeServer::new(10);
    let mut store = loaded_store("blood", blood_config("blood"), &mut server);

    let first = store.select_all_rows("blood").expect("select all");
    assert!(store.load_selections("blood").expect("load").is_empty());
    assert!(store.load_selections("blood").expect("load again").is_empty());

    let dispatched = drain(&mut store, &mut server, first);
    assert_eq!(dispatched, vec!["select_all_rows", "load_selections"]);
}

#[test]
fn failed_mutation_keeps_selections_and_records_error() {
    let mut server = FakeServer::new(10);
    server.selections = keys([1]).into_iter().collect();
    let mut store = loaded_store("blood", blood_config("blood"), &mut server);
    server.failing.insert("set_selections");

    let first = store
        .set_selections("blood", true, keys([2]))
        .expect("set");
    store.clear_selections("blood").expect("queued clear");
    let dispatched = drain(&mut store, &mut server, first);

    assert_eq!(dispatched, vec!["set_selections", "clear_selections"]);
    let model = store.model("blood").expect("model");
    assert!(model.selections.is_empty(), "queued clear still ran");
    assert_eq!(model.error(Slice::Selections), None);

    let effects = store
        .set_selections("blood", true, keys([3]))
        .expect("set");
    drain(&mut store, &mut server, effects);
    let model = store.model("blood").expect("model");
    assert!(model.selections.is_empty());
    assert_eq!(
        model.error(Slice::Selections),
        Some("set_selections failed")
    );
}

#[test]
fn empty_key_list_is_a_no_op() {
    let mut server = FakeServer::new(10);
    let mut store = loaded_store("blood", blood_config("blood"), &mut server);
    assert!(
        store
            .set_selections("blood", true, Vec::new())
            .expect("set")
            .is_empty()
    );
}

#[derive(Debug, Clone)]
enum SelectionStep {
    Set(bool, Vec<usize>),
    Replace(Vec<usize>),
    Clear,
    SelectAll,
    Load,
}

fn selection_step() -> impl Strategy<Value = SelectionStep> {
    let some_keys = || prop::collection::vec(1usize..=8, 0..4);
    prop_oneof![
        (any::<bool>(), some_keys()).prop_map(|(checked, keys)| SelectionStep::Set(checked, keys)),
        some_keys().prop_map(SelectionStep::Replace),
        Just(SelectionStep::Clear),
        Just(SelectionStep::SelectAll),
        Just(SelectionStep::Load),
    ]
}

proptest! {
    #[test]
    fn selections_match_server_after_queue_drains(
        steps in prop::collection::vec(selection_step(), 1..12),
    ) {
        let mut server = FakeServer::new(8);
        let mut store = loaded_store("blood", blood_config("blood"), &mut server);
        let mut expected = BTreeSet::new();
        let mut effects = Effects::none();

        for step in steps {
            let step_effects = match step {
                SelectionStep::Set(checked, ids) => {
                    let op = SelectionOp::Set { checked, keys: keys(ids.clone()) };
                    if !ids.is_empty() {
                        op.apply_to(&mut expected);
                    }
                    store.set_selections("blood", checked, keys(ids))
                }
                SelectionStep::Replace(ids) => {
                    SelectionOp::Replace(keys(ids.clone())).apply_to(&mut expected);
                    store.replace_selections("blood", keys(ids))
                }
                SelectionStep::Clear => {
                    expected.clear();
                    store.clear_selections("blood")
                }
                SelectionStep::SelectAll => {
                    expected.extend(keys(1..=8));
                    store.select_all_rows("blood")
                }
                SelectionStep::Load => store.load_selections("blood"),
            }
            .expect("selection action");
            effects.append(step_effects);
        }

        drain(&mut store, &mut server, effects);

        prop_assert!(store.selections_idle("blood"));
        prop_assert_eq!(&selections(&store), &server.selections);
        prop_assert_eq!(selections(&store), expected);
        prop_assert_eq!(
            store.model("blood").expect("model").selections_loading_state(),
            LoadingState::Loaded
        );
    }
}

proptest! {
    #[test]
    fn select_then_deselect_restores_selections(
        initial in prop::collection::btree_set(1usize..=8, 0..5),
        key in 1usize..=8,
    ) {
        prop_assume!(!initial.contains(&key));
        let mut server = FakeServer::new(8);
        server.selections = keys(initial).into_iter().collect();
        let mut store = loaded_store("blood", blood_config("blood"), &mut server);
        let before = selections(&store);

        let mut effects = store.set_selections("blood", true, keys([key])).expect("select");
        effects.append(store.set_selections("blood", false, keys([key])).expect("deselect"));
        drain(&mut store, &mut server, effects);

        prop_assert_eq!(selections(&store), before);
    }
}
