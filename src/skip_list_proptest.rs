#![cfg(test)]

// Property tests for SkipList: random mixes of inserts, deletes, rescoring
// and range deletion checked against a sorted Vec model.

use crate::config::SkipListConfig;
use crate::skip_list::{ScoreRange, SkipList};
use proptest::prelude::*;
use std::rc::Rc;

#[derive(Clone, Debug)]
enum Op {
    Insert(u16, i8),
    Delete(u16, i8),
    Update(usize, i8),
    DeleteScores(i8, i8, bool),
    DeleteRanks(usize, usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    // Small domains so equal scores and repeat items are common.
    prop_oneof![
        5 => (0u16..64, -8i8..8).prop_map(|(i, s)| Op::Insert(i, s)),
        2 => (0u16..64, -8i8..8).prop_map(|(i, s)| Op::Delete(i, s)),
        2 => (0usize..64, -8i8..8).prop_map(|(r, s)| Op::Update(r, s)),
        1 => (-8i8..8, -8i8..8, any::<bool>()).prop_map(|(a, b, x)| Op::DeleteScores(a, b, x)),
        1 => (0usize..20, 0usize..20).prop_map(|(a, b)| Op::DeleteRanks(a, b)),
    ]
}

fn sort_model(model: &mut [(f64, u16)]) {
    model.sort_by(|a, b| a.partial_cmp(b).expect("finite scores"));
}

// Property: the list always agrees with a sorted model.
// Invariants exercised across random operation sequences:
// - Level-0 order is (score, item) ascending; backward links and tail agree.
// - Span sums along every level equal the 1-based rank.
// - `rank`/`by_rank` are inverse; `level` is the tallest node's height.
// - Range deletion removes exactly the model's matching entries, in order.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_sorted_model(seed in any::<u64>(), ops in proptest::collection::vec(arb_op(), 1..150)) {
        let mut sut: SkipList<u16> = SkipList::with_config(SkipListConfig::default().with_seed(seed));
        let mut model: Vec<(f64, u16)> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(item, s) => {
                    let score = f64::from(s);
                    if !model.contains(&(score, item)) {
                        let h = sut.insert(Rc::new(item), score);
                        prop_assert_eq!(h.score(&sut), Some(score));
                        model.push((score, item));
                        sort_model(&mut model);
                    }
                }
                Op::Delete(item, s) => {
                    let score = f64::from(s);
                    let got = sut.delete(score, &item).map(|r| *r);
                    let pos = model.iter().position(|e| *e == (score, item));
                    prop_assert_eq!(got, pos.map(|p| model.remove(p).1));
                }
                Op::Update(r, s) => {
                    if model.is_empty() {
                        prop_assert!(sut.by_rank(1).is_none());
                        continue;
                    }
                    let idx = r % model.len();
                    let (cur, item) = model[idx];
                    if model.contains(&(f64::from(s), item)) {
                        continue;
                    }
                    let h = sut.update_score(cur, &item, f64::from(s));
                    prop_assert!(h.is_some());
                    model[idx].0 = f64::from(s);
                    sort_model(&mut model);
                }
                Op::DeleteScores(a, b, excl) => {
                    let mut range = ScoreRange::inclusive(f64::from(a.min(b)), f64::from(a.max(b)));
                    if excl {
                        range = range.exclude_min();
                    }
                    let got: Vec<u16> = sut.delete_range_by_score(&range).iter().map(|r| **r).collect();
                    let want: Vec<u16> = model.iter().filter(|e| range.contains(e.0)).map(|e| e.1).collect();
                    model.retain(|e| !range.contains(e.0));
                    prop_assert_eq!(got, want);
                }
                Op::DeleteRanks(a, b) => {
                    let (start, end) = (a.min(b) + 1, a.max(b) + 1);
                    let got: Vec<u16> = sut.delete_range_by_rank(start, end).iter().map(|r| **r).collect();
                    let hi = end.min(model.len());
                    let want: Vec<u16> = if start <= hi {
                        model.drain(start - 1..hi).map(|e| e.1).collect()
                    } else {
                        Vec::new()
                    };
                    prop_assert_eq!(got, want);
                }
            }

            sut.assert_invariants();
            prop_assert_eq!(sut.len(), model.len());
            let seen: Vec<(f64, u16)> = sut.iter().map(|(it, s)| (s, **it)).collect();
            prop_assert_eq!(&seen, &model);
            let mut back: Vec<(f64, u16)> = sut.iter_rev().map(|(it, s)| (s, **it)).collect();
            back.reverse();
            prop_assert_eq!(&back, &model);
            for (i, &(score, item)) in model.iter().enumerate() {
                prop_assert_eq!(sut.rank(score, &item), Some(i + 1));
                let h = sut.by_rank(i + 1).expect("rank within length");
                prop_assert_eq!(h.item(&sut).map(|r| **r), Some(item));
            }
        }
    }
}
