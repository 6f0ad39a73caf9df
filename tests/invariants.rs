use std::collections::BTreeSet;

use meme_court::{Address, CallContext, LedgerState, Operation};
use proptest::prelude::*;

const POSTS: [&str; 4] = ["", "p1", "p2", "p3"];

fn who(idx: u8) -> Address {
    // index 0 is the owner
    Address::from_bytes([idx + 1; 20])
}

#[derive(Debug, Clone)]
enum Step {
    Register { caller: u8, post: usize, empty_hash: bool },
    Cast { voter: u8, post: usize, is_funny: bool },
    Change { voter: u8, post: usize, new_vote: bool },
    Pause { caller: u8 },
}

impl Step {
    fn into_call(self, timestamp: u64) -> (CallContext, Operation) {
        match self {
            Step::Register {
                caller,
                post,
                empty_hash,
            } => (
                CallContext::new(who(caller), timestamp),
                Operation::RegisterPost {
                    post_id: POSTS[post].to_string(),
                    content_hash: if empty_hash { String::new() } else { "h".into() },
                },
            ),
            Step::Cast {
                voter,
                post,
                is_funny,
            } => (
                CallContext::new(who(voter), timestamp),
                Operation::CastVote {
                    post_id: POSTS[post].to_string(),
                    is_funny,
                },
            ),
            Step::Change {
                voter,
                post,
                new_vote,
            } => (
                CallContext::new(who(voter), timestamp),
                Operation::ChangeVote {
                    post_id: POSTS[post].to_string(),
                    new_vote,
                },
            ),
            Step::Pause { caller } => (CallContext::new(who(caller), timestamp), Operation::Pause),
        }
    }
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0u8..4, 0usize..4, proptest::bool::weighted(0.1)).prop_map(
            |(caller, post, empty_hash)| Step::Register { caller, post, empty_hash }
        ),
        8 => (0u8..4, 0usize..4, any::<bool>())
            .prop_map(|(voter, post, is_funny)| Step::Cast { voter, post, is_funny }),
        6 => (0u8..4, 0usize..4, any::<bool>())
            .prop_map(|(voter, post, new_vote)| Step::Change { voter, post, new_vote }),
        1 => (0u8..4).prop_map(|caller| Step::Pause { caller }),
    ]
}

fn check_invariants(ledger: &LedgerState) {
    let query = ledger.query();
    let mut sum = 0;
    let mut existing = 0;
    for post in POSTS {
        let stats = query.post_stats(post);
        assert_eq!(stats.funny_votes + stats.not_funny_votes, stats.total_votes);
        if stats.exists {
            existing += 1;
        } else {
            assert_eq!(stats.total_votes, 0);
            assert_eq!(stats.funny_votes, 0);
        }
        sum += stats.total_votes;
    }
    assert_eq!(query.total_votes(), sum);
    assert_eq!(query.total_posts(), existing);

    for idx in 0..4 {
        let voter = who(idx);
        let voted = query.user_voted_posts(&voter);
        assert_eq!(query.user_vote_count(&voter), voted.len() as u64);
        let unique: BTreeSet<_> = voted.iter().collect();
        assert_eq!(unique.len(), voted.len());
        for post in POSTS {
            let has = query.has_voted(&voter, post);
            assert_eq!(has, query.vote(&voter, post).has_voted);
            assert_eq!(has, voted.iter().any(|p| p == post));
        }
    }
}

proptest! {
    #[test]
    fn invariants_hold_for_any_sequence(steps in proptest::collection::vec(step(), 1..60)) {
        let mut ledger = LedgerState::new(who(0));
        let mut seen_posts = BTreeSet::new();
        let mut seen_votes = BTreeSet::new();

        for (i, step) in steps.into_iter().enumerate() {
            let (ctx, op) = step.into_call(i as u64 + 1);
            let before = ledger.clone();
            let root_before = ledger.state_root();

            let result = ledger.apply(&ctx, &op);
            match (&op, &result) {
                (_, Err(_)) => {
                    prop_assert_eq!(&ledger, &before);
                    prop_assert_eq!(ledger.state_root(), root_before);
                }
                (Operation::CastVote { post_id, .. }, Ok(_)) => {
                    prop_assert_eq!(
                        ledger.query().post_stats(post_id).total_votes,
                        before.query().post_stats(post_id).total_votes + 1
                    );
                    prop_assert_eq!(
                        ledger.query().total_votes(),
                        before.query().total_votes() + 1
                    );
                    prop_assert_eq!(ledger.events().len(), before.events().len() + 1);
                }
                (Operation::ChangeVote { post_id, .. }, Ok(_)) => {
                    prop_assert_eq!(
                        ledger.query().post_stats(post_id).total_votes,
                        before.query().post_stats(post_id).total_votes
                    );
                    prop_assert_eq!(ledger.query().total_votes(), before.query().total_votes());
                }
                (Operation::RegisterPost { .. }, Ok(_)) => {
                    prop_assert_eq!(ledger.query().total_posts(), before.query().total_posts() + 1);
                }
                (Operation::Pause, Ok(event)) => {
                    prop_assert!(event.is_none());
                    prop_assert!(ledger.query().is_paused());
                }
            }
            if result.is_ok() {
                prop_assert_eq!(ledger.meta().height, before.meta().height + 1);
            }

            check_invariants(&ledger);

            for post in POSTS {
                if ledger.query().post_stats(post).exists {
                    seen_posts.insert(post);
                }
                for idx in 0..4 {
                    if ledger.query().has_voted(&who(idx), post) {
                        seen_votes.insert((idx, post));
                    }
                }
            }
            for post in &seen_posts {
                prop_assert!(ledger.query().post_stats(post).exists);
            }
            for (idx, post) in &seen_votes {
                prop_assert!(ledger.query().has_voted(&who(*idx), post));
            }
        }

        let restored = LedgerState::restore(ledger.snapshot()).unwrap();
        prop_assert_eq!(restored, ledger);
    }
}
