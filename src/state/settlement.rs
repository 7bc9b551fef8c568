//! Pure chip settlement for one round of betting.
//!
//! No room state is touched here; the caller applies the returned deltas
//! (clamping balances at zero) and reveals the pool.

use crate::types::*;
use std::collections::HashMap;

/// Compute per-player chip deltas from a round's bets against the pool.
///
/// Every current player gets an entry, defaulting to 0. For each stake > 0
/// on a known pooled answer: a correct pick nets the bettor +stake; a wrong
/// pick costs the bettor the stake, and transfers it to the answer's author
/// when the author is a different player. Self-bets on one's own wrong
/// answer and bets on the unauthored house answer burn without a transfer.
/// Unknown answer ids and non-positive stakes contribute nothing.
pub fn settle<'a>(
    bets: &HashMap<PlayerId, HashMap<AnswerId, i64>>,
    pool: &[PooledAnswer],
    players: impl Iterator<Item = &'a PlayerId>,
) -> HashMap<PlayerId, i64> {
    let mut deltas: HashMap<PlayerId, i64> = players.map(|id| (id.clone(), 0)).collect();

    for (bettor_id, stakes) in bets {
        for (answer_id, &stake) in stakes {
            if stake <= 0 {
                continue;
            }
            let Some(answer) = pool.iter().find(|a| a.id == *answer_id) else {
                continue;
            };

            // Stakes come straight off the wire; totals saturate so no
            // stake combination can overflow the accumulators.
            if answer.is_correct {
                let delta = deltas.entry(bettor_id.clone()).or_insert(0);
                *delta = delta.saturating_add(stake);
            } else {
                let delta = deltas.entry(bettor_id.clone()).or_insert(0);
                *delta = delta.saturating_sub(stake);
                if let Some(author_id) = &answer.author_id {
                    if author_id != bettor_id {
                        let delta = deltas.entry(author_id.clone()).or_insert(0);
                        *delta = delta.saturating_add(stake);
                    }
                }
            }
        }
    }

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(id: &str, text: &str, is_correct: bool, author: Option<&str>) -> PooledAnswer {
        PooledAnswer {
            id: id.to_string(),
            text: text.to_string(),
            is_correct,
            author_id: author.map(str::to_string),
        }
    }

    fn bet(entries: &[(&str, i64)]) -> HashMap<AnswerId, i64> {
        entries
            .iter()
            .map(|(id, stake)| (id.to_string(), *stake))
            .collect()
    }

    fn ids(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_three_player_scenario() {
        // Canonical answer "4": A answered correctly, C authored the wrong
        // "3", a third answer came from a timeout. A bets 5 on the correct
        // entry, B bets 5 on C's wrong entry.
        let pool = vec![
            answer("ans-a", "4", true, Some("A")),
            answer("ans-c", "3", false, Some("C")),
            answer("ans-b", "???", false, Some("B")),
        ];
        let players = ids(&["A", "B", "C"]);
        let bets = HashMap::from([
            ("A".to_string(), bet(&[("ans-a", 5)])),
            ("B".to_string(), bet(&[("ans-c", 5)])),
            ("C".to_string(), bet(&[])),
        ]);

        let deltas = settle(&bets, &pool, players.iter());
        assert_eq!(deltas["A"], 5);
        assert_eq!(deltas["B"], -5);
        assert_eq!(deltas["C"], 5);
    }

    #[test]
    fn test_house_answer_transfers_nothing() {
        // Nobody answered correctly, so the pool carries a synthetic house
        // entry with no author. Losing stakes on player answers still move;
        // nothing flows out of a correct house bet.
        let pool = vec![
            answer("house", "1943", true, None),
            answer("ans-b", "1950", false, Some("B")),
        ];
        let players = ids(&["A", "B"]);
        let bets = HashMap::from([
            ("A".to_string(), bet(&[("house", 3)])),
            ("B".to_string(), bet(&[("house", 2)])),
        ]);

        let deltas = settle(&bets, &pool, players.iter());
        assert_eq!(deltas["A"], 3);
        assert_eq!(deltas["B"], 2);
    }

    #[test]
    fn test_wrong_bet_on_house_style_unauthored_answer_burns() {
        let pool = vec![
            answer("correct", "4", true, Some("A")),
            answer("wrong-unauthored", "7", false, None),
        ];
        let players = ids(&["A", "B"]);
        let bets = HashMap::from([("B".to_string(), bet(&[("wrong-unauthored", 4)]))]);

        let deltas = settle(&bets, &pool, players.iter());
        assert_eq!(deltas["B"], -4);
        assert_eq!(deltas["A"], 0);
    }

    #[test]
    fn test_self_bet_on_own_wrong_answer_loses_without_transfer() {
        let pool = vec![
            answer("mine", "3", false, Some("A")),
            answer("right", "4", true, None),
        ];
        let players = ids(&["A"]);
        let bets = HashMap::from([("A".to_string(), bet(&[("mine", 6)]))]);

        let deltas = settle(&bets, &pool, players.iter());
        assert_eq!(deltas["A"], -6);
    }

    #[test]
    fn test_unknown_ids_and_non_positive_stakes_are_inert() {
        let pool = vec![answer("only", "4", true, Some("A"))];
        let players = ids(&["A", "B"]);
        let bets = HashMap::from([(
            "B".to_string(),
            bet(&[("ghost", 10), ("only", 0), ("only", -3)]),
        )]);

        // "only" appears once per map; the negative entry wins the key, so
        // everything here must be ignored.
        let deltas = settle(&bets, &pool, players.iter());
        assert_eq!(deltas["A"], 0);
        assert_eq!(deltas["B"], 0);
    }

    #[test]
    fn test_every_player_gets_a_default_entry() {
        let pool = vec![answer("x", "4", true, None)];
        let players = ids(&["A", "B", "C"]);
        let deltas = settle(&HashMap::new(), &pool, players.iter());

        assert_eq!(deltas.len(), 3);
        assert!(deltas.values().all(|&d| d == 0));
    }

    #[test]
    fn test_extreme_stakes_saturate_instead_of_overflowing() {
        // Nothing stops a client from staking i64::MAX; accumulation across
        // several such bets must saturate, never wrap.
        let pool = vec![
            answer("wrong-1", "3", false, Some("C")),
            answer("wrong-2", "5", false, Some("C")),
        ];
        let players = ids(&["B", "C"]);
        let bets = HashMap::from([(
            "B".to_string(),
            bet(&[("wrong-1", i64::MAX), ("wrong-2", i64::MAX)]),
        )]);

        let deltas = settle(&bets, &pool, players.iter());
        assert_eq!(deltas["B"], i64::MIN);
        assert_eq!(deltas["C"], i64::MAX);
    }

    #[test]
    fn test_deltas_sum_per_bet_accounting() {
        // Sum of deltas equals (correct stakes won) minus (wrong stakes
        // burned on self-bets or unauthored answers); transferred stakes
        // cancel out pairwise.
        let pool = vec![
            answer("right", "4", true, Some("A")),
            answer("wrong-c", "3", false, Some("C")),
        ];
        let players = ids(&["A", "B", "C"]);
        let bets = HashMap::from([
            ("A".to_string(), bet(&[("right", 2)])),
            ("B".to_string(), bet(&[("wrong-c", 7)])),
            ("C".to_string(), bet(&[("wrong-c", 3)])), // self-bet burns
        ]);

        let deltas = settle(&bets, &pool, players.iter());
        let total: i64 = deltas.values().sum();
        assert_eq!(total, 2 - 3); // +2 minted for the win, -3 burned
        assert_eq!(deltas["C"], 7 - 3);
    }
}
