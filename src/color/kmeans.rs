// kmeans.rs - Weighted k-means with seeded k-means++ initialization
//
// Points are distinct colors weighted by pixel count, which gives the same
// objective as clustering every pixel. The seed is always explicit so runs
// are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::Color;
use crate::cancel::CancelToken;
use crate::error::{Error, Result, config_err};

/// Mixed into the seed for the single retry after a non-converged run.
const RESEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of clusters.
    pub k: usize,
    pub seed: u64,
    pub max_iterations: usize,
    /// Largest centroid move (RGB units) still counted as converged.
    pub tolerance: f32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { k: 4, seed: 42, max_iterations: 300, tolerance: 1e-3 }
    }
}

#[derive(Clone, Debug)]
pub struct Clusters {
    pub centroids: Vec<Color>,
    /// Cluster index per input point.
    pub labels: Vec<usize>,
    pub iterations: usize,
}

/// Find nearest centroid
fn nearest(c: Color, centroids: &[Color]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| c.dist_sq(**a).total_cmp(&c.dist_sq(**b)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Pick an index with probability proportional to `weights`.
fn sample(weights: &[f64], rng: &mut StdRng) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let mut target = rng.random::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        if w > 0.0 && target < w {
            return Some(i);
        }
        target -= w;
    }
    weights.iter().rposition(|&w| w > 0.0)
}

fn init_plus_plus(points: &[Color], weights: &[f32], k: usize, rng: &mut StdRng) -> Vec<Color> {
    let w64: Vec<f64> = weights.iter().map(|&w| w as f64).collect();
    let first = sample(&w64, rng).unwrap_or(0);

    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[first]);
    let mut d2: Vec<f64> = points.iter().map(|p| p.dist_sq(points[first]) as f64).collect();

    while centroids.len() < k {
        let scores: Vec<f64> = d2.iter().zip(&w64).map(|(d, w)| d * w).collect();
        // All remaining mass sits on chosen points only when points repeat.
        let next = sample(&scores, rng)
            .or_else(|| d2.iter().position(|&d| d > 0.0))
            .unwrap_or(centroids.len() % points.len());
        let c = points[next];
        centroids.push(c);
        for (d, p) in d2.iter_mut().zip(points) {
            *d = d.min(p.dist_sq(c) as f64);
        }
    }
    centroids
}

/// One seeded run. `Ok(None)` when it hit the iteration cap.
fn run(
    points: &[Color],
    weights: &[f32],
    config: &ClusterConfig,
    seed: u64,
    cancel: &CancelToken,
) -> Result<Option<Clusters>> {
    let k = config.k;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = init_plus_plus(points, weights, k, &mut rng);
    let mut labels = vec![usize::MAX; points.len()];

    let mut counts = vec![0f64; k];
    let mut sums = vec![Color::default(); k];
    let tol_sq = config.tolerance * config.tolerance;

    for iteration in 1..=config.max_iterations {
        cancel.check()?;

        let mut changed = 0usize;
        for (label, &p) in labels.iter_mut().zip(points) {
            let c = nearest(p, &centroids);
            if *label != c {
                *label = c;
                changed += 1;
            }
        }

        counts.fill(0.0);
        sums.fill(Color::default());
        for ((&p, &w), &c) in points.iter().zip(weights).zip(&labels) {
            counts[c] += w as f64;
            sums[c] = sums[c] + p * w;
        }

        let mut max_shift = 0f32;
        for i in 0..k {
            let next = if counts[i] > 0.0 {
                sums[i] * (1.0 / counts[i] as f32)
            } else {
                // Empty cluster: steal the point worst served by its centroid.
                let far = (0..points.len())
                    .max_by(|&a, &b| {
                        let da = points[a].dist_sq(centroids[labels[a]]);
                        let db = points[b].dist_sq(centroids[labels[b]]);
                        da.total_cmp(&db)
                    })
                    .unwrap_or(0);
                labels[far] = i;
                changed += 1;
                points[far]
            };
            max_shift = max_shift.max(next.dist_sq(centroids[i]));
            centroids[i] = next;
        }

        if changed == 0 || max_shift <= tol_sq {
            return Ok(Some(Clusters { centroids, labels, iterations: iteration }));
        }
    }
    Ok(None)
}

/// Cluster `points` (distinct colors) weighted by `weights` into `config.k`
/// groups. Retries once with a re-seeded generator before giving up.
pub fn kmeans(
    points: &[Color],
    weights: &[f32],
    config: &ClusterConfig,
    cancel: &CancelToken,
) -> Result<Clusters> {
    if config.k == 0 {
        return Err(config_err("cluster count k must be greater than 0"));
    }
    if points.len() != weights.len() {
        return Err(config_err("one weight per point is required"));
    }
    if config.k > points.len() {
        return Err(config_err(format!(
            "cluster count k={} exceeds the {} distinct colors in the image",
            config.k,
            points.len()
        )));
    }
    if config.max_iterations == 0 {
        return Err(config_err("max_iterations must be greater than 0"));
    }

    for seed in [config.seed, config.seed ^ RESEED_MIX] {
        if let Some(clusters) = run(points, weights, config, seed, cancel)? {
            tracing::debug!(k = config.k, seed, iterations = clusters.iterations, "k-means converged");
            return Ok(clusters);
        }
        tracing::warn!(k = config.k, seed, "k-means did not converge, re-seeding");
    }
    Err(Error::Clustering(format!(
        "k-means with k={} did not converge within {} iterations",
        config.k, config.max_iterations
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    fn colors(rgb: &[(u8, u8, u8)]) -> Vec<Color> {
        rgb.iter().map(|&(r, g, b)| Color::from_rgb(Rgb::new(r, g, b))).collect()
    }

    #[test]
    fn test_two_groups() {
        let points = colors(&[(0, 0, 0), (2, 0, 0), (250, 250, 250), (255, 255, 255)]);
        let weights = vec![1.0; 4];
        let config = ClusterConfig { k: 2, ..Default::default() };
        let clusters = kmeans(&points, &weights, &config, &CancelToken::new()).unwrap();

        assert_eq!(clusters.labels[0], clusters.labels[1]);
        assert_eq!(clusters.labels[2], clusters.labels[3]);
        assert_ne!(clusters.labels[0], clusters.labels[2]);
    }

    #[test]
    fn test_weights_pull_centroid() {
        let points = colors(&[(0, 0, 0), (100, 0, 0)]);
        let weights = vec![3.0, 1.0];
        let config = ClusterConfig { k: 1, ..Default::default() };
        let clusters = kmeans(&points, &weights, &config, &CancelToken::new()).unwrap();
        assert_eq!(clusters.centroids[0].to_rgb(), Rgb::new(25, 0, 0));
    }

    #[test]
    fn test_same_seed_same_result() {
        let points = colors(&[(10, 20, 30), (200, 10, 10), (12, 22, 28), (90, 90, 90), (198, 14, 9), (88, 95, 91)]);
        let weights = vec![1.0, 2.0, 3.0, 1.0, 1.0, 5.0];
        let config = ClusterConfig { k: 3, seed: 7, ..Default::default() };
        let a = kmeans(&points, &weights, &config, &CancelToken::new()).unwrap();
        let b = kmeans(&points, &weights, &config, &CancelToken::new()).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn test_rejects_bad_k() {
        let points = colors(&[(0, 0, 0), (1, 1, 1)]);
        let weights = vec![1.0; 2];
        let cancel = CancelToken::new();
        for k in [0, 3] {
            let config = ClusterConfig { k, ..Default::default() };
            assert!(matches!(kmeans(&points, &weights, &config, &cancel), Err(Error::Configuration(_))));
        }
    }

    #[test]
    fn test_gives_up_after_reseed() {
        // Every cluster mean sits between two points, so one pass never settles.
        let points = colors(&[(0, 0, 0), (2, 0, 0), (250, 250, 250), (255, 255, 255)]);
        let config = ClusterConfig { k: 2, max_iterations: 1, ..Default::default() };
        let err = kmeans(&points, &[1.0; 4], &config, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::Clustering(_)), "{err:?}");
    }

    #[test]
    fn test_cancelled() {
        let points = colors(&[(0, 0, 0), (1, 1, 1)]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let config = ClusterConfig { k: 2, ..Default::default() };
        assert_eq!(kmeans(&points, &[1.0, 1.0], &config, &cancel).unwrap_err(), Error::Cancelled);
    }
}
