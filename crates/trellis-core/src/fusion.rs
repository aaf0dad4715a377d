//! Score fusion between retrieval channels.
//!
//! Vector similarity and full-text search produce scores on incomparable
//! scales, so fusion works on ranks rather than raw scores. The policy is a
//! trait so deployments can swap the formula without touching the engine;
//! every implementation must be deterministic, monotonic, and
//! order-preserving within each channel.

use std::collections::HashMap;

/// One result from a single retrieval channel, already ranked (index 0 is
/// the channel's best hit).
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHit {
    /// Unit identity — the path.
    pub id: String,
    /// Channel-native score, kept for display only.
    pub score: f64,
}

/// A merged result across channels.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: String,
    pub score: f64,
    pub in_vector: bool,
    pub in_fulltext: bool,
}

/// Replaceable fusion formula.
pub trait FusionPolicy: Send + Sync {
    /// Merge two ranked channel result lists into one ranked list.
    fn fuse(&self, vector: &[ChannelHit], fulltext: &[ChannelHit]) -> Vec<FusedHit>;
}

/// Reciprocal-rank fusion with a flat bonus for units present in both
/// channels.
///
/// `score(u) = Σ_channels 1 / (k + rank(u))`, plus `both_bonus` when the unit
/// appears in both lists. Ties break lexicographically by id so the output
/// is stable across runs.
#[derive(Debug, Clone)]
pub struct ReciprocalRankFusion {
    pub k: f64,
    pub both_bonus: f64,
}

impl Default for ReciprocalRankFusion {
    fn default() -> Self {
        // k = 60 is the standard RRF constant.
        Self {
            k: 60.0,
            both_bonus: 0.01,
        }
    }
}

impl FusionPolicy for ReciprocalRankFusion {
    fn fuse(&self, vector: &[ChannelHit], fulltext: &[ChannelHit]) -> Vec<FusedHit> {
        let mut merged: HashMap<&str, FusedHit> = HashMap::new();

        for (rank, hit) in vector.iter().enumerate() {
            let entry = merged.entry(&hit.id).or_insert_with(|| FusedHit {
                id: hit.id.clone(),
                score: 0.0,
                in_vector: false,
                in_fulltext: false,
            });
            entry.score += 1.0 / (self.k + (rank + 1) as f64);
            entry.in_vector = true;
        }

        for (rank, hit) in fulltext.iter().enumerate() {
            let entry = merged.entry(&hit.id).or_insert_with(|| FusedHit {
                id: hit.id.clone(),
                score: 0.0,
                in_vector: false,
                in_fulltext: false,
            });
            entry.score += 1.0 / (self.k + (rank + 1) as f64);
            entry.in_fulltext = true;
        }

        let mut fused: Vec<FusedHit> = merged
            .into_values()
            .map(|mut hit| {
                if hit.in_vector && hit.in_fulltext {
                    hit.score += self.both_bonus;
                }
                hit
            })
            .collect();

        fused.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(ids: &[&str]) -> Vec<ChannelHit> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| ChannelHit {
                id: (*id).to_string(),
                score: 1.0 - i as f64 * 0.1,
            })
            .collect()
    }

    #[test]
    fn unit_in_both_channels_outranks_single_channel() {
        let fusion = ReciprocalRankFusion::default();
        let fused = fusion.fuse(&hits(&["a", "b"]), &hits(&["b", "c"]));

        assert_eq!(fused[0].id, "b");
        assert!(fused[0].in_vector && fused[0].in_fulltext);
    }

    #[test]
    fn single_channel_hit_still_surfaces_with_relative_rank() {
        let fusion = ReciprocalRankFusion::default();
        let fused = fusion.fuse(&[], &hits(&["only", "second"]));

        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].id, "only");
        assert_eq!(fused[1].id, "second");
        assert!(!fused[0].in_vector);
    }

    #[test]
    fn fusion_preserves_order_within_a_channel() {
        let fusion = ReciprocalRankFusion::default();
        let fused = fusion.fuse(&hits(&["a", "b", "c"]), &[]);
        let order: Vec<&str> = fused.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn fusion_is_deterministic_under_ties() {
        let fusion = ReciprocalRankFusion::default();
        // Same rank in opposite channels: scores tie, ids break it.
        let fused = fusion.fuse(&hits(&["z"]), &hits(&["a"]));
        assert_eq!(fused[0].id, "a");
        assert_eq!(fused[1].id, "z");
    }

    #[test]
    fn empty_channels_fuse_to_empty() {
        let fusion = ReciprocalRankFusion::default();
        assert!(fusion.fuse(&[], &[]).is_empty());
    }
}
