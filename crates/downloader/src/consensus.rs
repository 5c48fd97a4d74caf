//! Stake-weighted consensus over verified node signatures.
//!
//! Signatures for one interval are grouped by the file hash they sign. A
//! group reaches consensus when its weight strictly exceeds the configured
//! fraction of the total weight:
//!
//! ```text
//! weight(group) * denominator > total * numerator
//! ```
//!
//! The comparison uses integer arithmetic, so exact thresholds such as
//! "one third of 300" are handled without rounding.
//!
//! # Example
//!
//! With four nodes of stake 25 and the default 1/3 threshold, three matching
//! signatures (75) agree; two against two (50/50) also clear 1/3 on both
//! sides, which is reported as [`ConsensusError::Conflicting`].

use std::collections::{BTreeMap, HashSet};

use mirror_common::Hash384;
use mirror_streams::StreamFileSignature;
use serde::{Deserialize, Serialize};

use crate::address_book::AddressBook;
use crate::error::ConsensusError;

/// How node weight is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMode {
    /// Each node weighs its stake.
    #[default]
    StakeWeighted,
    /// Each node weighs one.
    EqualWeight,
    /// Any single verified signature is accepted. Test and demo networks only.
    SingleNode,
}

/// Threshold fraction a group must strictly exceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub numerator: u64,
    pub denominator: u64,
}

impl Threshold {
    pub const ONE_THIRD: Threshold = Threshold {
        numerator: 1,
        denominator: 3,
    };
    pub const ONE_HALF: Threshold = Threshold {
        numerator: 1,
        denominator: 2,
    };

    /// `weight / total > numerator / denominator`.
    pub fn is_exceeded(&self, weight: u128, total: u128) -> bool {
        total > 0
            && weight.saturating_mul(u128::from(self.denominator))
                > total.saturating_mul(u128::from(self.numerator))
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::ONE_THIRD
    }
}

/// Consensus configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsensusPolicy {
    #[serde(default)]
    pub mode: ConsensusMode,
    #[serde(default)]
    pub threshold: Threshold,
}

impl ConsensusPolicy {
    pub fn validate(&self) -> Result<(), String> {
        let t = self.threshold;
        if t.denominator == 0 || t.numerator >= t.denominator {
            return Err(format!(
                "threshold {}/{} must be a fraction below one",
                t.numerator, t.denominator
            ));
        }
        Ok(())
    }
}

/// Winning group of an interval.
#[derive(Debug, Clone)]
pub struct ConsensusResult {
    pub file_hash: Hash384,
    /// Winning signatures in the order they were supplied (arrival order).
    pub signatures: Vec<StreamFileSignature>,
    pub weight: u128,
    pub total: u128,
}

/// Where an incomplete tally stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyState {
    /// One group crossed and no other group can still cross.
    Decided,
    /// No group can cross even if every missing node agrees with it.
    Hopeless,
    /// The outcome depends on nodes that have not reported yet.
    Pending,
}

/// Evaluates signature sets against a [`ConsensusPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusValidator {
    policy: ConsensusPolicy,
}

impl ConsensusValidator {
    pub fn new(policy: ConsensusPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ConsensusPolicy {
        &self.policy
    }

    fn weight(&self, book: &AddressBook, node_id: i64) -> u128 {
        match book.node(node_id) {
            None => 0,
            Some(node) => match self.policy.mode {
                ConsensusMode::StakeWeighted => node.stake.max(0) as u128,
                ConsensusMode::EqualWeight | ConsensusMode::SingleNode => 1,
            },
        }
    }

    fn total(&self, book: &AddressBook) -> u128 {
        match self.policy.mode {
            ConsensusMode::StakeWeighted => book.total_stake().max(0) as u128,
            ConsensusMode::EqualWeight | ConsensusMode::SingleNode => book.len() as u128,
        }
    }

    /// Sums weight per file hash after deduplicating by node.
    ///
    /// A node that sent several signatures keeps only the one with the
    /// smallest file hash, regardless of arrival order. Signatures without a
    /// node id or from unknown nodes weigh nothing.
    fn groups(
        &self,
        book: &AddressBook,
        signatures: &[StreamFileSignature],
    ) -> BTreeMap<Hash384, u128> {
        let mut votes: Vec<(i64, Hash384)> = signatures
            .iter()
            .filter_map(|s| s.node_id.map(|id| (id, s.file_hash)))
            .collect();
        votes.sort();
        votes.dedup_by_key(|(node_id, _)| *node_id);

        let mut groups = BTreeMap::new();
        for (node_id, hash) in votes {
            *groups.entry(hash).or_insert(0u128) += self.weight(book, node_id);
        }
        groups
    }

    /// Decides consensus for one interval.
    pub fn validate(
        &self,
        book: &AddressBook,
        signatures: &[StreamFileSignature],
    ) -> Result<ConsensusResult, ConsensusError> {
        let groups = self.groups(book, signatures);
        if groups.is_empty() {
            return Err(ConsensusError::NoSignatures);
        }
        let total = self.total(book);

        let winner = if self.policy.mode == ConsensusMode::SingleNode {
            // Heaviest group; ties go to the smallest hash.
            let mut best: Option<(Hash384, u128)> = None;
            for (hash, weight) in &groups {
                if best.map(|(_, w)| *weight > w).unwrap_or(true) {
                    best = Some((*hash, *weight));
                }
            }
            best
        } else {
            if total == 0 {
                return Err(ConsensusError::ZeroStake);
            }
            let crossing: Vec<(Hash384, u128)> = groups
                .iter()
                .filter(|(_, w)| self.policy.threshold.is_exceeded(**w, total))
                .map(|(h, w)| (*h, *w))
                .collect();
            if crossing.len() > 1 {
                return Err(ConsensusError::Conflicting {
                    groups: crossing.len(),
                });
            }
            crossing.into_iter().next()
        };

        let (file_hash, weight) = winner.ok_or_else(|| ConsensusError::InsufficientStake {
            stake: groups.values().copied().max().unwrap_or(0),
            total,
            numerator: self.policy.threshold.numerator,
            denominator: self.policy.threshold.denominator,
        })?;

        let mut seen = HashSet::new();
        let winners = signatures
            .iter()
            .filter(|s| s.file_hash == file_hash)
            .filter(|s| s.node_id.map(|id| seen.insert(id)).unwrap_or(false))
            .cloned()
            .collect();

        Ok(ConsensusResult {
            file_hash,
            signatures: winners,
            weight,
            total,
        })
    }

    /// Classifies a partial tally given the set of nodes that have reported
    /// (successfully or not).
    pub fn tally(
        &self,
        book: &AddressBook,
        signatures: &[StreamFileSignature],
        reported: &HashSet<i64>,
    ) -> TallyState {
        let groups = self.groups(book, signatures);
        if self.policy.mode == ConsensusMode::SingleNode {
            return if !groups.is_empty() {
                TallyState::Decided
            } else if book.nodes().iter().all(|n| reported.contains(&n.node_id)) {
                TallyState::Hopeless
            } else {
                TallyState::Pending
            };
        }

        let total = self.total(book);
        let unreported: u128 = book
            .nodes()
            .iter()
            .filter(|n| !reported.contains(&n.node_id))
            .map(|n| self.weight(book, n.node_id))
            .sum();

        let mut weights: Vec<u128> = groups.values().copied().collect();
        weights.sort_unstable_by(|a, b| b.cmp(a));
        let leader = weights.first().copied().unwrap_or(0);
        let runner_up = weights.get(1).copied().unwrap_or(0);

        let t = self.policy.threshold;
        if t.is_exceeded(leader, total) && !t.is_exceeded(runner_up + unreported, total) {
            TallyState::Decided
        } else if !t.is_exceeded(leader + unreported, total) {
            TallyState::Hopeless
        } else {
            TallyState::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_book::ConsensusNode;
    use mirror_common::EntityId;
    use mirror_crypto::NodeSigningKey;
    use mirror_streams::model::SignatureType;
    use mirror_streams::StreamFilename;

    fn book(stakes: &[i64]) -> AddressBook {
        AddressBook::new(
            stakes
                .iter()
                .enumerate()
                .map(|(i, stake)| ConsensusNode {
                    node_id: i as i64,
                    node_account_id: EntityId::new(0, 0, i as i64 + 3).unwrap(),
                    public_key: NodeSigningKey::from_seed(&[i as u8; 32]).public_key(),
                    stake: *stake,
                    total_stake: 0,
                })
                .collect(),
        )
        .unwrap()
    }

    fn sig(node_id: i64, hash: &Hash384) -> StreamFileSignature {
        StreamFileSignature {
            filename: StreamFilename::parse("2022-01-01T00_00_00.000000000Z.rcd_sig").unwrap(),
            version: 5,
            signature_type: SignatureType::Ed25519,
            file_hash: *hash,
            file_hash_signature: vec![0; 64],
            metadata_hash: None,
            metadata_hash_signature: None,
            node_id: Some(node_id),
        }
    }

    fn h(label: &[u8]) -> Hash384 {
        Hash384::hash(label)
    }

    fn validator(mode: ConsensusMode, threshold: Threshold) -> ConsensusValidator {
        ConsensusValidator::new(ConsensusPolicy { mode, threshold })
    }

    #[test]
    fn test_three_of_four_agree() {
        let book = book(&[25, 25, 25, 25]);
        let (h1, h2) = (h(b"h1"), h(b"h2"));
        let sigs = vec![sig(0, &h1), sig(1, &h1), sig(2, &h2), sig(3, &h1)];

        let result = ConsensusValidator::default().validate(&book, &sigs).unwrap();
        assert_eq!(result.file_hash, h1);
        assert_eq!(result.weight, 75);
        let nodes: Vec<_> = result.signatures.iter().map(|s| s.node_id.unwrap()).collect();
        assert_eq!(nodes, vec![0, 1, 3]);
    }

    #[test]
    fn test_even_split_has_no_majority() {
        let book = book(&[25, 25, 25, 25]);
        let (h1, h2) = (h(b"h1"), h(b"h2"));
        let sigs = vec![sig(0, &h1), sig(1, &h1), sig(2, &h2), sig(3, &h2)];

        let half = validator(ConsensusMode::StakeWeighted, Threshold::ONE_HALF);
        assert!(matches!(
            half.validate(&book, &sigs),
            Err(ConsensusError::InsufficientStake { stake: 50, total: 100, .. })
        ));

        let third = ConsensusValidator::default();
        assert!(matches!(
            third.validate(&book, &sigs),
            Err(ConsensusError::Conflicting { groups: 2 })
        ));
    }

    #[test]
    fn test_threshold_is_strict() {
        let book = book(&[1, 1, 1]);
        let sigs = vec![sig(0, &h(b"h"))];
        // exactly one third does not exceed one third
        assert!(ConsensusValidator::default().validate(&book, &sigs).is_err());
        let sigs = vec![sig(0, &h(b"h")), sig(1, &h(b"h"))];
        assert!(ConsensusValidator::default().validate(&book, &sigs).is_ok());
    }

    #[test]
    fn test_zero_stake_and_empty_never_agree() {
        let zero = book(&[0, 0]);
        let sigs = vec![sig(0, &h(b"h")), sig(1, &h(b"h"))];
        assert!(matches!(
            ConsensusValidator::default().validate(&zero, &sigs),
            Err(ConsensusError::ZeroStake)
        ));
        assert!(matches!(
            ConsensusValidator::default().validate(&book(&[1]), &[]),
            Err(ConsensusError::NoSignatures)
        ));
    }

    #[test]
    fn test_unknown_nodes_weigh_nothing() {
        let book = book(&[10, 10, 10]);
        let sigs = vec![sig(7, &h(b"h")), sig(8, &h(b"h")), sig(0, &h(b"h"))];
        assert!(ConsensusValidator::default().validate(&book, &sigs).is_err());
    }

    #[test]
    fn test_duplicate_signatures_deduplicated_deterministically() {
        let book = book(&[10, 10, 10]);
        let (a, b) = (h(b"a"), h(b"b"));
        let (small, large) = if a < b { (a, b) } else { (b, a) };

        let forward = vec![sig(0, &small), sig(0, &large), sig(1, &small)];
        let backward = vec![sig(0, &large), sig(0, &small), sig(1, &small)];
        for sigs in [forward, backward] {
            let result = ConsensusValidator::default().validate(&book, &sigs).unwrap();
            assert_eq!(result.file_hash, small);
            assert_eq!(result.weight, 20);
        }
    }

    #[test]
    fn test_equal_weight_ignores_stake() {
        let book = book(&[100, 1, 1]);
        let sigs = vec![sig(1, &h(b"h")), sig(2, &h(b"h"))];
        let equal = validator(ConsensusMode::EqualWeight, Threshold::ONE_HALF);
        assert!(equal.validate(&book, &sigs).is_ok());
        assert!(ConsensusValidator::default().validate(&book, &sigs).is_err());
    }

    #[test]
    fn test_single_node_accepts_any() {
        let book = book(&[0, 0, 0, 0]);
        let sigs = vec![sig(2, &h(b"h"))];
        let single = validator(ConsensusMode::SingleNode, Threshold::default());
        assert_eq!(single.validate(&book, &sigs).unwrap().file_hash, h(b"h"));
    }

    #[test]
    fn test_tally_states() {
        let book = book(&[25, 25, 25, 25]);
        let v = validator(ConsensusMode::StakeWeighted, Threshold::ONE_HALF);
        let h1 = h(b"h1");

        let reported: HashSet<i64> = [0, 1].into_iter().collect();
        let sigs = vec![sig(0, &h1), sig(1, &h1)];
        assert_eq!(v.tally(&book, &sigs, &reported), TallyState::Pending);

        let reported: HashSet<i64> = [0, 1, 2].into_iter().collect();
        let sigs = vec![sig(0, &h1), sig(1, &h1), sig(2, &h1)];
        assert_eq!(v.tally(&book, &sigs, &reported), TallyState::Decided);

        let reported: HashSet<i64> = [0, 1, 2].into_iter().collect();
        let sigs = vec![sig(0, &h1)];
        assert_eq!(v.tally(&book, &sigs, &reported), TallyState::Hopeless);
    }

    #[test]
    fn test_policy_validation() {
        assert!(ConsensusPolicy::default().validate().is_ok());
        let bad = ConsensusPolicy {
            mode: ConsensusMode::StakeWeighted,
            threshold: Threshold {
                numerator: 3,
                denominator: 3,
            },
        };
        assert!(bad.validate().is_err());
    }
}
