#![cfg(test)]

// Property tests for Dictionary kept inside the crate so they can check
// table-level invariants that the public API does not expose.

use crate::config::{DictConfig, ResizeSwitch};
use crate::dict_type::DictType;
use crate::dictionary::{Dictionary, ReplaceOutcome};
use crate::error::Error;
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};

#[derive(Default)]
struct Destroyed {
    keys: Cell<usize>,
    values: Cell<usize>,
}

// Weak hash: only the low byte survives, so chains get long and entries
// from different pool keys collide constantly.
struct Colliding;

impl DictType for Colliding {
    type Key = String;
    type Value = i32;
    type Context = Destroyed;

    fn hash(&self, key: &String) -> u64 {
        key.bytes().fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64)) & 0xff
    }
    fn key_eq(&self, _ctx: &Destroyed, a: &String, b: &String) -> bool {
        a == b
    }
    fn destroy_key(&self, ctx: &Destroyed, _key: String) {
        ctx.keys.set(ctx.keys.get() + 1);
    }
    fn destroy_value(&self, ctx: &Destroyed, _value: i32) {
        ctx.values.set(ctx.values.get() + 1);
    }
}

#[derive(Clone, Debug)]
enum OpI {
    Add(usize, i32),
    Replace(usize, i32),
    Delete(usize),
    Unlink(usize),
    Find(usize),
    Expand(usize),
    Rehash(usize),
    ToggleResize,
    SafeIterate(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=40).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Add(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Replace(i, v)),
            2 => idx.clone().prop_map(OpI::Delete),
            1 => idx.clone().prop_map(OpI::Unlink),
            2 => idx.clone().prop_map(OpI::Find),
            1 => (0usize..200).prop_map(OpI::Expand),
            1 => (0usize..8).prop_map(OpI::Rehash),
            1 => Just(OpI::ToggleResize),
            1 => (0usize..4).prop_map(OpI::SafeIterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Every entry is chained in the slot its cached hash maps to.
// - Slots of table 0 below the rehash cursor are empty.
// - No key is present twice, even mid-rehash.
// - `len` equals the model; destructors run once per entry that leaves.
// - A safe iterator sees every key present at its start exactly once, even
//   when the current entry is deleted and other keys are inserted mid-pass.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let switch = ResizeSwitch::new();
        let mut sut = Dictionary::with_config(
            Colliding,
            Destroyed::default(),
            DictConfig::default().with_resize_switch(switch.clone()),
        );
        let mut model: HashMap<String, i32> = HashMap::new();
        let mut keys_destroyed = 0usize;
        let mut values_destroyed = 0usize;

        for op in ops {
            match op {
                OpI::Add(i, v) => {
                    let k = pool[i].clone();
                    let already = model.contains_key(&k);
                    match sut.add(k.clone(), v) {
                        Ok(h) => {
                            prop_assert!(!already, "add must fail on duplicate");
                            prop_assert_eq!(h.key(&sut), Some(&k));
                            model.insert(k, v);
                        }
                        Err(e) => {
                            prop_assert_eq!(e, Error::KeyExists);
                            prop_assert!(already);
                        }
                    }
                }
                OpI::Replace(i, v) => {
                    let k = pool[i].clone();
                    let outcome = sut.replace(k.clone(), v);
                    match model.insert(k, v) {
                        None => prop_assert_eq!(outcome, ReplaceOutcome::Inserted),
                        Some(_) => {
                            prop_assert_eq!(outcome, ReplaceOutcome::Replaced);
                            values_destroyed += 1;
                        }
                    }
                }
                OpI::Delete(i) => {
                    let k = &pool[i];
                    let res = sut.delete(k);
                    match model.remove(k) {
                        Some(_) => {
                            prop_assert!(res.is_ok());
                            keys_destroyed += 1;
                            values_destroyed += 1;
                        }
                        None => prop_assert_eq!(res, Err(Error::NotFound)),
                    }
                }
                OpI::Unlink(i) => {
                    let k = &pool[i];
                    match (sut.unlink(k), model.remove(k)) {
                        (Ok((kk, vv)), Some(mv)) => {
                            prop_assert_eq!(&kk, k);
                            prop_assert_eq!(vv.as_owned().copied(), Some(mv));
                        }
                        (Err(e), None) => prop_assert_eq!(e, Error::NotFound),
                        (got, want) => prop_assert!(false, "unlink mismatch: {:?} vs {:?}", got.is_ok(), want),
                    }
                }
                OpI::Find(i) => {
                    let k = &pool[i];
                    let got = sut.get_value(k).and_then(|v| v.as_owned().copied());
                    prop_assert_eq!(got, model.get(k).copied());
                }
                OpI::Expand(n) => {
                    // Rejections are fine; only the structure matters.
                    let _ = sut.expand(n);
                }
                OpI::Rehash(n) => {
                    let more = sut.rehash(n);
                    prop_assert_eq!(more, sut.is_rehashing());
                }
                OpI::ToggleResize => {
                    if switch.is_enabled() { switch.disable() } else { switch.enable() }
                }
                OpI::SafeIterate(stride) => {
                    let before: BTreeSet<String> = model.keys().cloned().collect();
                    let mut seen = BTreeSet::new();
                    let mut it = sut.safe_iter();
                    let mut n = 0usize;
                    while let Some(h) = sut.iter_next(&mut it) {
                        let k = h.key(&sut).cloned().expect("live handle");
                        prop_assert!(seen.insert(k.clone()), "key {:?} yielded twice", k);
                        if stride > 0 && n % (stride + 1) == 0 {
                            prop_assert!(sut.remove(h).is_some());
                            model.remove(&k);
                        }
                        n += 1;
                    }
                    sut.release_iter(it);
                    prop_assert_eq!(seen, before);
                }
            }
            sut.assert_invariants();
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.stats().iterators, 0);
            prop_assert_eq!(sut.context().keys.get(), keys_destroyed);
            prop_assert_eq!(sut.context().values.get(), values_destroyed);
        }

        let held = sut.len();
        sut.clear();
        prop_assert_eq!(sut.context().keys.get(), keys_destroyed + held);
        prop_assert_eq!(sut.context().values.get(), values_destroyed + held);
        prop_assert!(sut.is_empty());
        prop_assert_eq!(sut.memory().get(), 0);
    }
}
