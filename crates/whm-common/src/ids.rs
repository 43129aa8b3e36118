//! Time-ordered block identifiers
//!
//! Block ids are UUIDv7 values. Two ids minted within the same millisecond
//! are only ordered by their random tail, so the generator remembers the last
//! id and bumps it by one whenever the fresh one does not sort after it.

use std::sync::Mutex;
use uuid::Uuid;

/// Mints strictly increasing UUIDv7 identifiers
#[derive(Debug, Default)]
pub struct BlockIdGenerator {
    last: Mutex<Option<u128>>,
}

impl BlockIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> Uuid {
        let fresh = Uuid::now_v7().as_u128();
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let value = match *last {
            Some(prev) if fresh <= prev => prev.wrapping_add(1),
            _ => fresh,
        };
        *last = Some(value);
        Uuid::from_u128(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let gen = BlockIdGenerator::new();
        let ids: Vec<Uuid> = (0..10_000).map(|_| gen.next_id()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].to_string() < pair[1].to_string());
        }
    }

    #[test]
    fn test_ids_are_v7() {
        let gen = BlockIdGenerator::new();
        assert_eq!(gen.next_id().get_version_num(), 7);
    }
}
