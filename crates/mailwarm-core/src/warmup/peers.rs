//! Weighted recipient selection.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::model::Peer;
use crate::{Error, Result};

/// Picks one peer with probability proportional to its weight.
///
/// Weights below 1 count as 1, so no configured peer is ever excluded.
///
/// # Errors
///
/// Returns [`Error::EmptyPool`] when `pool` is empty.
pub fn choose<'a, R: Rng + ?Sized>(pool: &'a [Peer], rng: &mut R) -> Result<&'a Peer> {
    if pool.is_empty() {
        return Err(Error::EmptyPool);
    }
    let index = WeightedIndex::new(pool.iter().map(Peer::effective_weight))
        .map_err(|e| Error::InvalidInput(format!("peer weights: {e}")))?;
    Ok(&pool[index.sample(rng)])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::testing::peer;

    #[test]
    fn empty_pool_is_an_error() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(choose(&[], &mut rng), Err(Error::EmptyPool)));
    }

    #[test]
    fn weights_drive_frequency() {
        let pool = vec![peer("a@x.com", 1), peer("b@x.com", 9)];
        let mut rng = StdRng::seed_from_u64(42);
        let b = (0..10_000)
            .filter(|_| choose(&pool, &mut rng).unwrap().address == "b@x.com")
            .count();
        assert!((8500..9500).contains(&b), "b selected {b} times");
    }

    #[test]
    fn non_positive_weights_still_count() {
        let pool = vec![peer("zero@x.com", 0), peer("neg@x.com", -5)];
        let mut rng = StdRng::seed_from_u64(3);
        let zero = (0..2_000)
            .filter(|_| choose(&pool, &mut rng).unwrap().address == "zero@x.com")
            .count();
        assert!((800..1200).contains(&zero), "zero selected {zero} times");
    }

    proptest! {
        #[test]
        fn always_returns_a_pool_member(
            weights in proptest::collection::vec(-10i64..1000, 1..20),
            seed in any::<u64>(),
        ) {
            let pool: Vec<Peer> = weights
                .iter()
                .enumerate()
                .map(|(i, w)| peer(&format!("p{i}@x.com"), *w))
                .collect();
            let mut rng = StdRng::seed_from_u64(seed);
            let chosen = choose(&pool, &mut rng).unwrap();
            prop_assert!(pool.iter().any(|p| p.address == chosen.address));
        }

        #[test]
        fn single_entry_is_always_chosen(weight in any::<i64>(), seed in any::<u64>()) {
            let pool = vec![peer("only@x.com", weight)];
            let mut rng = StdRng::seed_from_u64(seed);
            prop_assert_eq!(&choose(&pool, &mut rng).unwrap().address, "only@x.com");
        }
    }
}
