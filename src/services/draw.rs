//! Winner selection.
//!
//! A draw shuffles the whole participant pool with a cryptographically
//! secure generator (Fisher–Yates) and takes the first `winners_count`
//! entries, so every ordering of the pool is equally likely. Winners and the
//! status flip to `completed` are committed in one step; a giveaway is never
//! drawn twice.

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use std::sync::Arc;

use crate::database::models::{display_name_for, Winner};
use crate::database::{Store, StoreResult};
use crate::utils::logging::log_draw;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Ordered by place, starting at 1.
    Winners(Vec<Winner>),
    NotFound,
    InsufficientParticipants { needed: i64, have: i64 },
    /// The giveaway was already closed; carries whatever winners were recorded.
    AlreadyDrawn(Vec<Winner>),
}

#[derive(Clone)]
pub struct DrawEngine {
    store: Arc<dyn Store>,
}

impl DrawEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn draw_winners(&self, giveaway_id: i64) -> StoreResult<DrawOutcome> {
        self.draw_winners_with(giveaway_id, &mut OsRng).await
    }

    /// Same as [`draw_winners`](Self::draw_winners) with a caller supplied
    /// generator, so tests can seed it.
    pub async fn draw_winners_with<R>(&self, giveaway_id: i64, rng: &mut R) -> StoreResult<DrawOutcome>
    where
        R: RngCore + CryptoRng + Send,
    {
        let giveaway = match self.store.get_giveaway(giveaway_id).await? {
            Some(giveaway) => giveaway,
            None => return Ok(DrawOutcome::NotFound),
        };

        if giveaway.status.is_terminal() {
            return Ok(DrawOutcome::AlreadyDrawn(self.store.winners(giveaway_id).await?));
        }

        let mut pool = self.store.participant_ids(giveaway_id).await?;
        pool.sort_unstable();
        pool.dedup();

        let needed = giveaway.winners_count;
        let have = pool.len() as i64;
        if have < needed {
            return Ok(DrawOutcome::InsufficientParticipants { needed, have });
        }

        let selected = select_winners(&pool, needed as usize, rng);

        let mut winners = Vec::with_capacity(selected.len());
        for (index, user_id) in selected.into_iter().enumerate() {
            let user = self.store.get_user(user_id).await?;
            winners.push(Winner {
                giveaway_id,
                user_id,
                place: index as i64 + 1,
                display_name: display_name_for(user.as_ref(), user_id),
                username: user.and_then(|u| u.username),
            });
        }

        if !self.store.record_draw(giveaway_id, &winners).await? {
            // Another draw committed between our status check and the write
            return Ok(DrawOutcome::AlreadyDrawn(self.store.winners(giveaway_id).await?));
        }

        log_draw(giveaway_id, winners.len(), pool.len());
        Ok(DrawOutcome::Winners(winners))
    }
}

/// Picks `count` distinct ids from `pool` in winning order.
pub fn select_winners<R>(pool: &[i64], count: usize, rng: &mut R) -> Vec<i64>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut order = pool.to_vec();
    shuffle(&mut order, rng);
    order.truncate(count);
    order
}

fn shuffle<T, R: RngCore + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_selection_is_distinct_subset() {
        let pool: Vec<i64> = (1..=50).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let picked = select_winners(&pool, 10, &mut rng);

        assert_eq!(picked.len(), 10);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 10);
        assert!(picked.iter().all(|id| pool.contains(id)));
    }

    #[test]
    fn test_full_selection_is_permutation() {
        let pool = vec![10, 20, 30, 40, 50];
        let mut rng = StdRng::seed_from_u64(99);

        let mut picked = select_winners(&pool, pool.len(), &mut rng);
        picked.sort_unstable();

        assert_eq!(picked, pool);
    }

    #[test]
    fn test_same_seed_same_result() {
        let pool: Vec<i64> = (1..=20).collect();
        let first = select_winners(&pool, 3, &mut StdRng::seed_from_u64(1234));
        let second = select_winners(&pool, 3, &mut StdRng::seed_from_u64(1234));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_and_single_pools() {
        let mut rng = OsRng;
        assert!(select_winners(&[], 0, &mut rng).is_empty());
        assert_eq!(select_winners(&[42], 1, &mut rng), vec![42]);
    }
}
