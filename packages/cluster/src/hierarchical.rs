//! Agglomerative clustering over a full pairwise distance matrix.

use access_map_cluster_models::{ClusterAlgorithm, ClusterLabel, MergeStep};
use serde::{Deserialize, Serialize};

use crate::{ClusterStrategy, Clustering, KRule, renumber, squared_distance};

/// Inter-cluster distance used when two clusters merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Minimum-variance (Ward) linkage.
    #[default]
    Ward,
    /// Mean pairwise distance.
    Average,
    /// Largest pairwise distance.
    Complete,
    /// Smallest pairwise distance.
    Single,
}

impl Linkage {
    /// Lance–Williams update of the distance from cluster `k` to the union
    /// of `i` and `j`. For Ward the arguments are squared distances.
    #[allow(clippy::cast_precision_loss, clippy::many_single_char_names)]
    fn update(self, d_ik: f64, d_jk: f64, d_ij: f64, n_i: usize, n_j: usize, n_k: usize) -> f64 {
        let (n_i, n_j, n_k) = (n_i as f64, n_j as f64, n_k as f64);
        match self {
            Self::Ward => {
                let total = n_i + n_j + n_k;
                ((n_i + n_k) * d_ik + (n_j + n_k) * d_jk - n_k * d_ij) / total
            }
            Self::Average => (n_i * d_ik + n_j * d_jk) / (n_i + n_j),
            Self::Complete => d_ik.max(d_jk),
            Self::Single => d_ik.min(d_jk),
        }
    }

    const fn squared(self) -> bool {
        matches!(self, Self::Ward)
    }
}

/// Agglomerative clustering; the tree is cut into `k_rule` clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct Agglomerative {
    /// How many flat clusters to cut the tree into.
    pub k_rule: KRule,
    /// Linkage criterion.
    pub linkage: Linkage,
}

struct Node {
    id: usize,
    size: usize,
}

impl Agglomerative {
    /// Builds the full merge tree, in SciPy linkage order: leaves are
    /// `0..n`, merge `i` creates node `n + i`.
    #[must_use]
    pub fn merge_tree(&self, points: &[Vec<f64>]) -> Vec<MergeStep> {
        let n = points.len();
        let mut dist: Vec<Vec<f64>> = points
            .iter()
            .map(|a| {
                points
                    .iter()
                    .map(|b| {
                        let sq = squared_distance(a, b);
                        if self.linkage.squared() { sq } else { sq.sqrt() }
                    })
                    .collect()
            })
            .collect();

        let mut active: Vec<Option<Node>> = (0..n).map(|id| Some(Node { id, size: 1 })).collect();
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        for step in 0..n.saturating_sub(1) {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in 0..n {
                if active[i].is_none() {
                    continue;
                }
                for j in (i + 1)..n {
                    if active[j].is_none() {
                        continue;
                    }
                    if best.is_none_or(|(_, _, d)| dist[i][j] < d) {
                        best = Some((i, j, dist[i][j]));
                    }
                }
            }
            let Some((i, j, d_ij)) = best else {
                break;
            };
            let (Some(left), Some(right)) = (active[i].take(), active[j].take()) else {
                break;
            };

            for k in 0..n {
                if k == i || k == j {
                    continue;
                }
                if let Some(other) = &active[k] {
                    let updated = self.linkage.update(
                        dist[i][k],
                        dist[j][k],
                        d_ij,
                        left.size,
                        right.size,
                        other.size,
                    );
                    dist[i][k] = updated;
                    dist[k][i] = updated;
                }
            }

            let size = left.size + right.size;
            merges.push(MergeStep {
                left: left.id.min(right.id),
                right: left.id.max(right.id),
                distance: if self.linkage.squared() {
                    d_ij.max(0.0).sqrt()
                } else {
                    d_ij
                },
                size,
            });
            active[i] = Some(Node { id: n + step, size });
        }

        merges
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Cuts a merge tree into `k` flat clusters by replaying the first
/// `n - k` merges.
#[must_use]
pub fn cut_tree(n: usize, merges: &[MergeStep], k: usize) -> Vec<ClusterLabel> {
    let mut parent: Vec<usize> = (0..2 * n.max(1)).collect();

    for (step, merge) in merges.iter().take(n.saturating_sub(k)).enumerate() {
        let node = n + step;
        let left = find(&mut parent, merge.left);
        let right = find(&mut parent, merge.right);
        parent[left] = node;
        parent[right] = node;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let roots: Vec<ClusterLabel> = (0..n)
        .map(|leaf| find(&mut parent, leaf) as ClusterLabel)
        .collect();
    renumber(&roots)
}

impl ClusterStrategy for Agglomerative {
    fn algorithm(&self) -> ClusterAlgorithm {
        ClusterAlgorithm::Hierarchical
    }

    fn min_points(&self, n: usize) -> usize {
        self.k_rule.k_for(n)
    }

    fn cluster(&self, points: &[Vec<f64>]) -> Clustering {
        let merges = self.merge_tree(points);
        let k = self.k_rule.k_for(points.len());
        let labels = cut_tree(points.len(), &merges, k);

        log::debug!(
            "{:?} linkage over {} points cut into {k} clusters",
            self.linkage,
            points.len()
        );

        Clustering {
            labels,
            merges: Some(merges),
            note: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ward(k: usize) -> Agglomerative {
        Agglomerative {
            k_rule: KRule::Fixed { k },
            linkage: Linkage::Ward,
        }
    }

    #[test]
    fn tree_has_n_minus_one_merges_in_scipy_order() {
        let points = vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0]];
        let merges = ward(2).merge_tree(&points);
        assert_eq!(merges.len(), 3);
        assert_eq!((merges[0].left, merges[0].right), (0, 1));
        assert_eq!((merges[1].left, merges[1].right), (2, 3));
        assert_eq!((merges[2].left, merges[2].right), (4, 5));
        assert_eq!(merges[2].size, 4);
        assert!((merges[0].distance - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ward_distance_matches_closed_form() {
        // Two pairs one unit wide, centres 5 apart: sqrt(2·2·2/4)·5 = 5·sqrt(2).
        let points = vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0]];
        let merges = ward(1).merge_tree(&points);
        let expected = 5.0 * 2.0_f64.sqrt();
        assert!((merges[2].distance - expected).abs() < 1e-9, "{merges:?}");
    }

    #[test]
    fn merge_distances_are_monotone() {
        let points: Vec<Vec<f64>> = (0..15)
            .map(|i| {
                let x = f64::from(i);
                vec![(x * 0.9).sin() * 3.0, (x * 0.4).cos()]
            })
            .collect();
        let merges = ward(3).merge_tree(&points);
        for pair in merges.windows(2) {
            assert!(pair[0].distance <= pair[1].distance + 1e-9, "{pair:?}");
        }
    }

    #[test]
    fn cut_gives_requested_cluster_count() {
        let points = vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0], vec![20.0]];
        let clustering = ward(3).assign(&points);
        assert_eq!(clustering.labels, vec![0, 0, 1, 1, 2]);
        assert_eq!(clustering.merges.map(|m| m.len()), Some(4));
    }

    #[test]
    fn single_linkage_chains() {
        let agglomerative = Agglomerative {
            k_rule: KRule::Fixed { k: 2 },
            linkage: Linkage::Single,
        };
        let points = vec![vec![0.0], vec![1.0], vec![2.0], vec![10.0]];
        assert_eq!(agglomerative.assign(&points).labels, vec![0, 0, 0, 1]);
    }

    #[test]
    fn single_point_falls_back() {
        let clustering = ward(2).assign(&[vec![1.0]]);
        assert_eq!(clustering.labels, vec![0]);
        assert!(clustering.merges.is_none());
    }
}
