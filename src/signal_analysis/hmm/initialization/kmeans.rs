use nalgebra::DVector;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::signal_analysis::hmm::observations::ObservationMatrix;

#[derive(Debug, Clone)]
pub struct KMeansOutput {
    pub centers: Vec<DVector<f64>>,
    pub assignments: Vec<usize>,
    pub inertia: f64, // Sum of squared distances to the assigned centers
}

fn squared_distance(point: &DVector<f64>, center: &DVector<f64>) -> f64 {
    (point - center).norm_squared()
}

fn closest_center(point: &DVector<f64>, centers: &[DVector<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, center) in centers.iter().enumerate() {
        let distance = squared_distance(point, center);
        if distance < best.1 {
            best = (idx, distance);
        }
    }
    best
}

// k-means++ seeding: each new center is drawn with probability proportional to D^2
fn k_means_plus_plus<R: Rng + ?Sized>(points: &[DVector<f64>], k: usize, rng: &mut R) -> Vec<DVector<f64>> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())].clone());

    while centers.len() < k {
        let weights: Vec<f64> = points.iter().map(|point| closest_center(point, &centers).1).collect();

        // All points already sit on a center, fall back to a uniform pick
        let next = match WeightedIndex::new(&weights) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => rng.gen_range(0..points.len()),
        };
        centers.push(points[next].clone());
    }

    centers
}

pub fn k_means<R: Rng + ?Sized>(
    observations: &ObservationMatrix,
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut R,
) -> KMeansOutput {
    let points: Vec<DVector<f64>> = observations.rows().collect();

    // Step 1: Seed the cluster centers
    let mut centers = k_means_plus_plus(&points, k, rng);

    let mut assignments = vec![0; points.len()]; // Cluster assignments for each data point
    let mut iter = 0;

    // Step 2: Iteratively update clusters
    loop {
        let mut changes = 0;

        // Step 3: Assign points to the nearest cluster center
        for (i, point) in points.iter().enumerate() {
            let (closest, _) = closest_center(point, &centers);

            if assignments[i] != closest {
                changes += 1;
                assignments[i] = closest;
            }
        }

        // Step 4: Recompute cluster centers as the mean of assigned points.
        // Empty clusters keep their previous center.
        let mut new_centers = centers.clone();
        let mut sums = vec![DVector::<f64>::zeros(observations.num_features()); k];
        let mut counts = vec![0_usize; k];

        for (assignment, point) in assignments.iter().zip(points.iter()) {
            sums[*assignment] += point;
            counts[*assignment] += 1;
        }

        for i in 0..k {
            if counts[i] > 0 {
                new_centers[i] = &sums[i] / counts[i] as f64;
            }
        }

        // Step 5: Check for convergence
        let max_shift = centers
            .iter()
            .zip(&new_centers)
            .map(|(old, new)| squared_distance(old, new).sqrt())
            .fold(0.0, f64::max);

        centers = new_centers;

        iter += 1;
        if (iter > 1 && changes == 0) || max_shift < tolerance || iter >= max_iterations {
            break;
        }
    }

    // Final assignment against the final centers
    let mut inertia = 0.0;
    for (i, point) in points.iter().enumerate() {
        let (closest, distance) = closest_center(point, &centers);
        assignments[i] = closest;
        inertia += distance;
    }

    KMeansOutput { centers, assignments, inertia }
}

// Several seeded restarts, keep the one with the lowest inertia
pub fn k_means_best_of<R: Rng + ?Sized>(
    observations: &ObservationMatrix,
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    num_tries: usize,
    rng: &mut R,
) -> KMeansOutput {
    let mut best = k_means(observations, k, max_iterations, tolerance, rng);

    for _ in 1..num_tries {
        let candidate = k_means(observations, k, max_iterations, tolerance, rng);
        if candidate.inertia < best.inertia {
            best = candidate;
        }
    }

    best
}
