//! Density-based clustering (DBSCAN).

use std::collections::VecDeque;

use access_map_cluster_models::{ClusterAlgorithm, ClusterLabel, NOISE_LABEL};

use crate::{ClusterStrategy, Clustering, renumber, squared_distance};

/// DBSCAN over Euclidean feature distance.
///
/// A neighbourhood is every point within `eps` (inclusive), the point
/// itself included; a point with at least `min_samples` neighbours is a
/// core point. Points reachable from no core point are noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    /// Neighbourhood radius in (standardized) feature units.
    pub eps: f64,
    /// Minimum neighbourhood size of a core point.
    pub min_samples: usize,
}

impl Default for Dbscan {
    fn default() -> Self {
        Self {
            eps: 0.3,
            min_samples: 2,
        }
    }
}

impl Dbscan {
    fn neighbours(&self, points: &[Vec<f64>], i: usize) -> Vec<usize> {
        let eps_sq = self.eps * self.eps;
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| squared_distance(&points[i], p) <= eps_sq)
            .map(|(j, _)| j)
            .collect()
    }
}

impl ClusterStrategy for Dbscan {
    fn algorithm(&self) -> ClusterAlgorithm {
        ClusterAlgorithm::Dbscan
    }

    fn min_points(&self, _n: usize) -> usize {
        self.min_samples
    }

    fn cluster(&self, points: &[Vec<f64>]) -> Clustering {
        let neighbourhoods: Vec<Vec<usize>> =
            (0..points.len()).map(|i| self.neighbours(points, i)).collect();
        let is_core: Vec<bool> = neighbourhoods
            .iter()
            .map(|n| n.len() >= self.min_samples)
            .collect();

        let mut labels = vec![NOISE_LABEL; points.len()];
        let mut next_label: ClusterLabel = 0;

        for start in 0..points.len() {
            if labels[start] != NOISE_LABEL || !is_core[start] {
                continue;
            }

            labels[start] = next_label;
            let mut queue: VecDeque<usize> = neighbourhoods[start].iter().copied().collect();
            while let Some(j) = queue.pop_front() {
                if labels[j] != NOISE_LABEL {
                    continue;
                }
                labels[j] = next_label;
                if is_core[j] {
                    queue.extend(neighbourhoods[j].iter().copied());
                }
            }
            next_label += 1;
        }

        let noise = labels.iter().filter(|&&l| l == NOISE_LABEL).count();
        log::debug!(
            "DBSCAN over {} points found {next_label} clusters and {noise} noise points",
            points.len()
        );

        Clustering {
            labels: renumber(&labels),
            merges: None,
            note: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_point_is_noise() {
        let points = vec![vec![0.0], vec![0.1], vec![0.2], vec![5.0]];
        let labels = Dbscan::default().assign(&points).labels;
        assert_eq!(labels, vec![0, 0, 0, NOISE_LABEL]);
    }

    #[test]
    fn boundary_distance_is_inside_neighbourhood() {
        let dbscan = Dbscan {
            eps: 1.0,
            min_samples: 2,
        };
        let labels = dbscan.assign(&[vec![0.0], vec![1.0]]).labels;
        assert_eq!(labels, vec![0, 0]);
    }

    #[test]
    fn chains_through_core_points() {
        let points: Vec<Vec<f64>> = (0..6).map(|i| vec![f64::from(i) * 0.25]).collect();
        let labels = Dbscan::default().assign(&points).labels;
        assert!(labels.iter().all(|&l| l == 0), "{labels:?}");
    }

    #[test]
    fn repeated_runs_are_identical() {
        let points: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let x = f64::from(i);
                vec![(x * 0.37).sin() * 2.0, (x * 0.11).cos() * 2.0]
            })
            .collect();
        let dbscan = Dbscan::default();
        let first = dbscan.assign(&points);
        let second = dbscan.assign(&points);
        assert_eq!(first.labels, second.labels);
    }

    #[test]
    fn single_point_is_one_cluster_not_noise() {
        let clustering = Dbscan::default().assign(&[vec![3.0, 4.0]]);
        assert_eq!(clustering.labels, vec![0]);
    }
}
