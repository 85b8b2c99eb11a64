//! Policies for spreading buses over the connection pool.

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};

use buswatch_core::config::AssignmentKind;
use rand::Rng;

/// Picks which connection a newly launched bus will use for its lifetime.
pub trait AssignmentPolicy: Debug + Send + Sync {
    /// Choose an index in `0..pool_size`. An empty pool yields `0`.
    fn assign(&self, pool_size: usize) -> usize;
}

/// Every bus picks a connection uniformly at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRandom;

impl AssignmentPolicy for UniformRandom {
    fn assign(&self, pool_size: usize) -> usize {
        if pool_size == 0 {
            return 0;
        }
        rand::rng().random_range(0..pool_size)
    }
}

/// Buses take connections in turn.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl AssignmentPolicy for RoundRobin {
    fn assign(&self, pool_size: usize) -> usize {
        let turn = self.next.fetch_add(1, Ordering::Relaxed);
        turn.checked_rem(pool_size).unwrap_or(0)
    }
}

/// Build the policy named in configuration.
pub fn policy_for(kind: AssignmentKind) -> Box<dyn AssignmentPolicy> {
    match kind {
        AssignmentKind::Random => Box::new(UniformRandom),
        AssignmentKind::RoundRobin => Box::new(RoundRobin::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_random_stays_in_range_and_reaches_every_connection() {
        let policy = UniformRandom;
        let mut seen = [false; 4];
        for _ in 0..1_000 {
            let index = policy.assign(4);
            assert!(index < 4);
            if let Some(slot) = seen.get_mut(index) {
                *slot = true;
            }
        }
        assert!(seen.iter().all(|hit| *hit));
    }

    #[test]
    fn round_robin_cycles() {
        let policy = RoundRobin::default();
        let picks: Vec<usize> = (0..7).map(|_| policy.assign(3)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn empty_pool_yields_zero() {
        assert_eq!(UniformRandom.assign(0), 0);
        assert_eq!(RoundRobin::default().assign(0), 0);
    }

    #[test]
    fn policy_follows_config() {
        let policy = policy_for(AssignmentKind::RoundRobin);
        assert_eq!(policy.assign(2), 0);
        assert_eq!(policy.assign(2), 1);
        assert!(policy_for(AssignmentKind::Random).assign(5) < 5);
    }
}
