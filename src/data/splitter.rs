// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles samples and splits them into a training set (used
// for parameter updates) and a validation set (used to pick
// the best checkpoint).
//
// The caller supplies the RNG so a run's split is reproducible
// from its seed.
//
// Reference: rand crate documentation (SliceRandom)

use rand::{seq::SliceRandom, Rng};

/// Shuffle `samples` and split into (train, validation).
///
/// `train_fraction` is the proportion kept for training, e.g. 0.8.
pub fn split_train_val<T, R: Rng + ?Sized>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    rng:            &mut R,
) -> (Vec<T>, Vec<T>) {
    samples.shuffle(rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_correct_split_sizes() {
        let mut rng      = StdRng::seed_from_u64(1);
        let items        = (0..100).collect::<Vec<usize>>();
        let (train, val) = split_train_val(items, 0.8, &mut rng);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_all_items_preserved() {
        let mut rng          = StdRng::seed_from_u64(2);
        let items            = (0..50).collect::<Vec<usize>>();
        let (train, val)     = split_train_val(items, 0.7, &mut rng);
        let mut all: Vec<_>  = train.into_iter().chain(val).collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<usize>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_val((0..30).collect::<Vec<usize>>(), 0.5, &mut StdRng::seed_from_u64(9));
        let b = split_train_val((0..30).collect::<Vec<usize>>(), 0.5, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let mut rng      = StdRng::seed_from_u64(3);
        let (train, val) = split_train_val(Vec::<usize>::new(), 0.8, &mut rng);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }
}
