//! Seeded sampling helpers shared by the teachers.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Per-class sample sizes for a stratified draw of `fraction * total_size`
/// examples.
///
/// Each class gets `ceil(count / total_size * fraction * total_size)`,
/// capped at the class population, so the realized sample can be larger
/// than the requested fraction.
pub fn class_targets(fraction: f64, total_size: usize, class_counts: &[usize]) -> Vec<usize> {
    let n_samples = fraction * total_size as f64;
    class_counts
        .iter()
        .map(|&count| {
            let target = (count as f64 / total_size as f64 * n_samples).ceil();
            (target.max(0.0) as usize).min(count)
        })
        .collect()
}

/// Draw a stratified initial sample.
///
/// `shuffle` permutes the candidate ids `0..total_size`; the permutation is
/// scanned in order and an id is kept while its class is below target. The
/// returned ids follow the scan order, not class grouping.
pub fn get_first_examples<F>(
    fraction: f64,
    total_size: usize,
    classes: &[usize],
    labels: &[usize],
    shuffle: F,
) -> Vec<usize>
where
    F: FnOnce(&mut [usize]),
{
    let n_slots = classes.iter().max().map_or(0, |&c| c + 1);
    let mut class_counts = vec![0usize; n_slots];
    for &label in labels {
        class_counts[label] += 1;
    }

    let targets = class_targets(fraction, total_size, &class_counts);
    let n_samples: usize = targets.iter().sum();

    let mut permutation: Vec<usize> = (0..total_size).collect();
    shuffle(&mut permutation);

    let mut taken = vec![0usize; n_slots];
    let mut new_ids = Vec::with_capacity(n_samples);
    for id in permutation {
        if new_ids.len() >= n_samples {
            break;
        }
        let class = labels[id];
        if taken[class] < targets[class] {
            taken[class] += 1;
            new_ids.push(id);
        }
    }

    log::trace!(
        "Stratified sample of {} ids (fraction {}, per-class targets {:?})",
        new_ids.len(),
        fraction,
        targets
    );

    new_ids
}

/// A shuffle closure backed by a fresh `StdRng` seeded with `seed`.
pub fn seeded_shuffle(seed: u64) -> impl FnOnce(&mut [usize]) {
    move |ids: &mut [usize]| {
        let mut rng = StdRng::seed_from_u64(seed);
        ids.shuffle(&mut rng);
    }
}

/// The ids `0..m` in a reproducible random order.
pub fn shuffled_ids(m: usize, seed: u64) -> Vec<usize> {
    let mut ids: Vec<usize> = (0..m).collect();
    seeded_shuffle(seed)(&mut ids);
    ids
}

/// Move `front` to the head of `order`, keeping the remaining ids in their
/// original relative order.
pub fn front_load(front: &[usize], order: &[usize]) -> Vec<usize> {
    let chosen: std::collections::HashSet<usize> = front.iter().copied().collect();
    front
        .iter()
        .copied()
        .chain(order.iter().copied().filter(|id| !chosen.contains(id)))
        .collect()
}
