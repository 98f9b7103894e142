//! Pairwise Jaccard similarity over shared domains.
//!
//! Pairs are discovered through the inverted index: every domain contributes
//! one shared-count increment to each unordered pair of its carriers, so only
//! proteins that actually share a domain are ever compared. Work is sharded by
//! domain across the rayon pool and the partial counters are merged by
//! summation, which keeps the result independent of scheduling order.

use std::borrow::Cow;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::{FanOutPolicy, SimilarityConfig};
use crate::error::AppError;
use crate::models::SimilarityEdge;
use crate::similarity::index::{DomainIndex, EntityIdx};

type PairCounts = FxHashMap<u64, u32>;

/// Counters describing one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimilarityStats {
    pub domains_total: usize,
    /// Domains whose carriers were fed into the accumulator.
    pub domains_processed: usize,
    /// Domains over the fan-out cap that were left out.
    pub domains_skipped: usize,
    /// Domains over the fan-out cap that were reduced to a strided sample.
    pub domains_sampled: usize,
    /// Distinct unordered pairs sharing at least one domain.
    pub pairs_accumulated: usize,
    /// Pairs at or above the threshold.
    pub edges_emitted: usize,
}

/// Candidate edges plus the counters of the run that produced them.
#[derive(Debug, Clone)]
pub struct SimilarityRun {
    /// Edges with `source < target`, sorted by `(source, target)`.
    pub edges: Vec<SimilarityEdge>,
    pub stats: SimilarityStats,
}

/// Computes thresholded Jaccard edges from a [`DomainIndex`].
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    threshold: f64,
    fan_out_cap: usize,
    policy: FanOutPolicy,
}

impl SimilarityEngine {
    pub fn new(config: &SimilarityConfig) -> Result<Self, AppError> {
        if config.threshold.is_nan() || !(0.0..=1.0).contains(&config.threshold) {
            return Err(AppError::Validation(format!(
                "similarity threshold must be within [0, 1], got {}",
                config.threshold
            )));
        }
        if config.fan_out_cap < 2 {
            return Err(AppError::Validation(format!(
                "fan-out cap must be at least 2, got {}",
                config.fan_out_cap
            )));
        }
        Ok(Self {
            threshold: config.threshold,
            fan_out_cap: config.fan_out_cap,
            policy: config.fan_out_policy,
        })
    }

    /// Runs the accumulation and emits every pair with `J >= threshold`.
    ///
    /// The output is fully determined by the index contents.
    pub fn run(&self, index: &DomainIndex) -> SimilarityRun {
        let mut stats = SimilarityStats {
            domains_total: index.domain_count_total(),
            ..Default::default()
        };

        let mut work: Vec<Cow<'_, [EntityIdx]>> = Vec::with_capacity(stats.domains_total);
        for (domain, carriers) in index.carrier_sets() {
            if carriers.len() <= self.fan_out_cap {
                stats.domains_processed += 1;
                if carriers.len() > 1 {
                    work.push(Cow::Borrowed(carriers));
                }
                continue;
            }
            match self.policy {
                FanOutPolicy::Skip => {
                    tracing::warn!(
                        domain,
                        carriers = carriers.len(),
                        cap = self.fan_out_cap,
                        "Skipping domain above fan-out cap"
                    );
                    stats.domains_skipped += 1;
                }
                FanOutPolicy::Sample => {
                    tracing::warn!(
                        domain,
                        carriers = carriers.len(),
                        cap = self.fan_out_cap,
                        "Sampling domain above fan-out cap"
                    );
                    stats.domains_sampled += 1;
                    stats.domains_processed += 1;
                    work.push(Cow::Owned(strided_sample(carriers, self.fan_out_cap)));
                }
            }
        }

        let shared = work
            .par_iter()
            .fold(PairCounts::default, |mut acc, carriers| {
                accumulate_pairs(&mut acc, carriers);
                acc
            })
            .reduce(PairCounts::default, merge_counts);
        stats.pairs_accumulated = shared.len();

        let mut edges: Vec<SimilarityEdge> = shared
            .par_iter()
            .filter_map(|(&key, &shared)| self.edge_for(index, key, shared))
            .collect();
        edges.par_sort_unstable_by(|a, b| {
            (a.source.as_str(), a.target.as_str()).cmp(&(b.source.as_str(), b.target.as_str()))
        });
        stats.edges_emitted = edges.len();

        tracing::debug!(
            domains = stats.domains_total,
            pairs = stats.pairs_accumulated,
            edges = stats.edges_emitted,
            "Similarity accumulation complete"
        );

        SimilarityRun { edges, stats }
    }

    fn edge_for(&self, index: &DomainIndex, key: u64, shared: u32) -> Option<SimilarityEdge> {
        let (a, b) = unpack(key);
        let union = index.count(a) + index.count(b) - shared;
        // A pair is only counted if it shares a domain, so union >= 1.
        let weight = f64::from(shared) / f64::from(union);
        if weight < self.threshold {
            return None;
        }

        let (source, target) = {
            let (x, y) = (index.id(a), index.id(b));
            if x <= y {
                (x, y)
            } else {
                (y, x)
            }
        };
        Some(SimilarityEdge {
            source: source.to_string(),
            target: target.to_string(),
            jaccard_weight: weight,
            shared_domains: Some(shared),
            union_domains: Some(union),
        })
    }
}

fn accumulate_pairs(acc: &mut PairCounts, carriers: &[EntityIdx]) {
    for (i, &a) in carriers.iter().enumerate() {
        for &b in &carriers[i + 1..] {
            *acc.entry(pack(a, b)).or_insert(0) += 1;
        }
    }
}

fn merge_counts(mut left: PairCounts, mut right: PairCounts) -> PairCounts {
    if left.len() < right.len() {
        std::mem::swap(&mut left, &mut right);
    }
    for (key, count) in right {
        *left.entry(key).or_insert(0) += count;
    }
    left
}

/// Picks `cap` carriers at evenly spaced positions of the sorted set.
fn strided_sample(carriers: &[EntityIdx], cap: usize) -> Vec<EntityIdx> {
    let step = carriers.len() as f64 / cap as f64;
    (0..cap)
        .map(|k| carriers[((k as f64 * step) as usize).min(carriers.len() - 1)])
        .collect()
}

fn pack(a: EntityIdx, b: EntityIdx) -> u64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    (u64::from(lo) << 32) | u64::from(hi)
}

fn unpack(key: u64) -> (EntityIdx, EntityIdx) {
    ((key >> 32) as EntityIdx, key as EntityIdx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: f64) -> SimilarityConfig {
        SimilarityConfig {
            threshold,
            ..Default::default()
        }
    }

    fn sample_index() -> DomainIndex {
        DomainIndex::from_entities([
            ("A", vec!["d1", "d2", "d3", "d4"]),
            ("B", vec!["d1", "d2", "d3", "d5"]),
            ("C", vec!["d4", "d6", "d7", "d8", "d9", "d10", "d11", "d12", "d13", "d14"]),
            ("D", vec!["d99"]),
        ])
    }

    /// Brute-force Jaccard straight from the definition.
    fn jaccard(a: &[&str], b: &[&str]) -> f64 {
        let shared = a.iter().filter(|d| b.contains(d)).count() as f64;
        let union = (a.len() + b.len()) as f64 - shared;
        shared / union
    }

    #[test]
    fn test_weights_match_definition() {
        let engine = SimilarityEngine::new(&config(0.0)).unwrap();
        let run = engine.run(&sample_index());

        let ab = run
            .edges
            .iter()
            .find(|e| e.source == "A" && e.target == "B")
            .unwrap();
        let expected = jaccard(&["d1", "d2", "d3", "d4"], &["d1", "d2", "d3", "d5"]);
        assert!((ab.jaccard_weight - expected).abs() < 1e-12);
        assert_eq!(ab.shared_domains, Some(3));
        assert_eq!(ab.union_domains, Some(5));

        let ac = run
            .edges
            .iter()
            .find(|e| e.source == "A" && e.target == "C")
            .unwrap();
        assert_eq!(ac.shared_domains, Some(1));
        assert_eq!(ac.union_domains, Some(13));

        // D shares nothing, B and C share nothing.
        assert_eq!(run.edges.len(), 2);
        assert_eq!(run.stats.pairs_accumulated, 2);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // A-B share 1 of 3 domains: J = 1/3 exactly.
        let index = DomainIndex::from_entities([("A", vec!["x", "y"]), ("B", vec!["x", "z"])]);
        let exact = 1.0 / 3.0;

        let at = SimilarityEngine::new(&config(exact)).unwrap().run(&index);
        assert_eq!(at.edges.len(), 1);

        let above = SimilarityEngine::new(&config(exact + 1e-9)).unwrap().run(&index);
        assert!(above.edges.is_empty());
    }

    #[test]
    fn test_no_edge_below_threshold_and_no_duplicates() {
        let run = SimilarityEngine::new(&config(0.1)).unwrap().run(&sample_index());
        assert!(run.edges.iter().all(|e| e.jaccard_weight >= 0.1));
        assert!(run.edges.iter().all(|e| e.source < e.target));

        let mut pairs: Vec<_> = run.edges.iter().map(|e| e.pair_key()).collect();
        let before = pairs.len();
        pairs.dedup();
        assert_eq!(pairs.len(), before);
        // A-C at 1/13 falls under 0.1.
        assert_eq!(run.edges.len(), 1);
    }

    #[test]
    fn test_input_order_does_not_change_edges() {
        let forward = sample_index();
        let backward = DomainIndex::from_entities([
            ("D", vec!["d99"]),
            ("C", vec!["d14", "d13", "d12", "d11", "d10", "d9", "d8", "d7", "d6", "d4"]),
            ("B", vec!["d5", "d3", "d2", "d1"]),
            ("A", vec!["d4", "d3", "d2", "d1"]),
        ]);

        let engine = SimilarityEngine::new(&config(0.0)).unwrap();
        assert_eq!(engine.run(&forward).edges, engine.run(&backward).edges);
    }

    #[test]
    fn test_fan_out_skip() {
        let index = DomainIndex::from_entities([
            ("A", vec!["generic", "rare"]),
            ("B", vec!["generic", "rare"]),
            ("C", vec!["generic"]),
        ]);
        let engine = SimilarityEngine::new(&SimilarityConfig {
            threshold: 0.0,
            fan_out_cap: 2,
            fan_out_policy: FanOutPolicy::Skip,
            ..Default::default()
        })
        .unwrap();

        let run = engine.run(&index);
        assert_eq!(run.stats.domains_skipped, 1);
        assert_eq!(run.stats.domains_processed, 1);
        assert_eq!(run.edges.len(), 1);
        // Counts still come from the full domain sets.
        assert_eq!(run.edges[0].shared_domains, Some(1));
        assert_eq!(run.edges[0].union_domains, Some(3));
    }

    #[test]
    fn test_fan_out_sample_is_deterministic() {
        let index = DomainIndex::from_entities(
            (0..10).map(|i| (format!("P{:02}", i), vec!["generic".to_string()])),
        );
        let engine = SimilarityEngine::new(&SimilarityConfig {
            threshold: 0.0,
            fan_out_cap: 4,
            fan_out_policy: FanOutPolicy::Sample,
            ..Default::default()
        })
        .unwrap();

        let first = engine.run(&index);
        let second = engine.run(&index);
        assert_eq!(first.stats.domains_sampled, 1);
        // 4 sampled carriers give 6 pairs.
        assert_eq!(first.edges.len(), 6);
        assert_eq!(first.edges, second.edges);
    }

    #[test]
    fn test_strided_sample_spreads_over_set() {
        let carriers: Vec<EntityIdx> = (0..10).collect();
        assert_eq!(strided_sample(&carriers, 4), vec![0, 2, 5, 7]);
        assert_eq!(strided_sample(&carriers[..3], 3), vec![0, 1, 2]);
    }

    #[test]
    fn test_pack_roundtrip_orders_pair() {
        assert_eq!(unpack(pack(7, 3)), (3, 7));
        assert_eq!(pack(3, 7), pack(7, 3));
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(SimilarityEngine::new(&config(1.5)).is_err());
        assert!(SimilarityEngine::new(&config(f64::NAN)).is_err());
        assert!(SimilarityEngine::new(&SimilarityConfig {
            fan_out_cap: 1,
            ..Default::default()
        })
        .is_err());
    }
}
