//! Partitional clustering: Lloyd's k-means with deterministic seeding.

use access_map_cluster_models::{ClusterAlgorithm, ClusterLabel};

use crate::{ClusterStrategy, Clustering, KRule, renumber, squared_distance};

/// k-means with farthest-point seeding.
///
/// The first seed is the point closest to the overall mean; each next seed
/// is the point farthest from every seed chosen so far. Ties go to the
/// lowest input index, so the same input always yields the same partition.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    /// How K is chosen from the number of points.
    pub k_rule: KRule,
    /// Upper bound on Lloyd iterations.
    pub max_iterations: usize,
    /// Algorithm identifier reported on assignments.
    pub algorithm: ClusterAlgorithm,
}

impl KMeans {
    /// Within-group k-means.
    #[must_use]
    pub const fn new(k_rule: KRule, max_iterations: usize) -> Self {
        Self {
            k_rule,
            max_iterations,
            algorithm: ClusterAlgorithm::KMeans,
        }
    }

    /// Cross-group baseline with K fixed to the number of groups.
    #[must_use]
    pub const fn cross_group(groups: usize, max_iterations: usize) -> Self {
        Self {
            k_rule: KRule::Fixed { k: groups },
            max_iterations,
            algorithm: ClusterAlgorithm::CrossGroupKMeans,
        }
    }
}

fn column_mean(points: &[Vec<f64>]) -> Vec<f64> {
    let dim = points.first().map_or(0, Vec::len);
    let mut mean = vec![0.0; dim];
    for point in points {
        for (m, v) in mean.iter_mut().zip(point) {
            *m += v;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    for m in &mut mean {
        *m /= n;
    }
    mean
}

fn argmin_by(candidates: impl Iterator<Item = (usize, f64)>) -> Option<usize> {
    candidates
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((i, d)),
        })
        .map(|(i, _)| i)
}

fn seed(points: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let mean = column_mean(points);
    let Some(first) = argmin_by(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, squared_distance(p, &mean))),
    ) else {
        return Vec::new();
    };

    let mut seeds = vec![points[first].clone()];
    let mut nearest_seed: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &points[first]))
        .collect();

    while seeds.len() < k {
        let next = nearest_seed
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &d)| {
                if d > best.1 { (i, d) } else { best }
            })
            .0;
        let chosen = points[next].clone();
        for (slot, point) in nearest_seed.iter_mut().zip(points) {
            *slot = slot.min(squared_distance(point, &chosen));
        }
        seeds.push(chosen);
    }
    seeds
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    argmin_by(
        centroids
            .iter()
            .enumerate()
            .map(|(c, centroid)| (c, squared_distance(point, centroid))),
    )
    .unwrap_or(0)
}

impl ClusterStrategy for KMeans {
    fn algorithm(&self) -> ClusterAlgorithm {
        self.algorithm
    }

    fn min_points(&self, n: usize) -> usize {
        self.k_rule.k_for(n)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn cluster(&self, points: &[Vec<f64>]) -> Clustering {
        let k = self.k_rule.k_for(points.len());
        let mut centroids = seed(points, k);
        let mut assignments: Vec<usize> = points
            .iter()
            .map(|p| nearest_centroid(p, &centroids))
            .collect();

        let mut iterations = 1;
        while iterations < self.max_iterations {
            let dim = centroids.first().map_or(0, Vec::len);
            let mut sums = vec![vec![0.0; dim]; k];
            let mut counts = vec![0_usize; k];
            for (point, &c) in points.iter().zip(&assignments) {
                counts[c] += 1;
                for (s, v) in sums[c].iter_mut().zip(point) {
                    *s += v;
                }
            }
            for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
                if count > 0 {
                    #[allow(clippy::cast_precision_loss)]
                    let n = count as f64;
                    *centroid = sum.into_iter().map(|s| s / n).collect();
                }
            }

            let next: Vec<usize> = points
                .iter()
                .map(|p| nearest_centroid(p, &centroids))
                .collect();
            iterations += 1;
            if next == assignments {
                break;
            }
            assignments = next;
        }

        log::debug!(
            "k-means with K={k} over {} points finished after {iterations} iterations",
            points.len()
        );

        let labels: Vec<ClusterLabel> = assignments.iter().map(|&c| c as ClusterLabel).collect();
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

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ]
    }

    #[test]
    fn separates_two_blobs() {
        let kmeans = KMeans::new(KRule::Fixed { k: 2 }, 300);
        let labels = kmeans.assign(&blobs()).labels;
        assert_eq!(labels, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn same_input_gives_same_partition() {
        let kmeans = KMeans::new(KRule::default(), 300);
        let points: Vec<Vec<f64>> = (0..25)
            .map(|i| {
                let x = f64::from(i);
                vec![(x * 0.7).sin(), (x * 1.3).cos()]
            })
            .collect();
        assert_eq!(kmeans.assign(&points), kmeans.assign(&points));
    }

    #[test]
    fn derived_k_bounds_label_count() {
        let kmeans = KMeans::new(KRule::default(), 300);
        let points: Vec<Vec<f64>> = (0..37).map(|i| vec![f64::from(i * i)]).collect();
        let labels = kmeans.assign(&points).labels;
        let distinct: std::collections::BTreeSet<_> = labels.iter().collect();
        assert!(distinct.len() <= 7 && distinct.len() >= 2, "{distinct:?}");
    }

    #[test]
    fn single_point_falls_back_to_one_cluster() {
        let clustering = KMeans::new(KRule::default(), 300).assign(&[vec![1.0, 2.0]]);
        assert_eq!(clustering.labels, vec![0]);
        assert!(clustering.note.is_some());
    }

    #[test]
    fn cross_group_reports_its_own_algorithm() {
        let kmeans = KMeans::cross_group(3, 300);
        assert_eq!(kmeans.algorithm(), ClusterAlgorithm::CrossGroupKMeans);
        assert_eq!(kmeans.min_points(100), 3);
    }
}
