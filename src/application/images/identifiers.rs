use std::sync::atomic::{AtomicI64, Ordering};

use time::OffsetDateTime;

use crate::domain::assets::{AssetIdentifier, Namespace};

/// Issues wall-clock derived identifiers that never repeat within a process.
///
/// When two uploads land in the same millisecond the later one is bumped to
/// the next unused millisecond.
#[derive(Debug, Default)]
pub struct IdentifierClock {
    last_millis: AtomicI64,
}

impl IdentifierClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, namespace: Namespace) -> AssetIdentifier {
        let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        self.next_at(namespace, now)
    }

    pub(crate) fn next_at(&self, namespace: Namespace, now_millis: i64) -> AssetIdentifier {
        let mut issued = now_millis;
        let _ = self
            .last_millis
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                issued = now_millis.max(last + 1);
                Some(issued)
            });
        AssetIdentifier::new(namespace, issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_millisecond_requests_get_distinct_identifiers() {
        let clock = IdentifierClock::new();
        let first = clock.next_at(Namespace::Games, 1_000);
        let second = clock.next_at(Namespace::Games, 1_000);
        let third = clock.next_at(Namespace::Books, 999);

        assert_eq!(first.filename(), "game-1000.jpg");
        assert_eq!(second.filename(), "game-1001.jpg");
        assert_eq!(third.filename(), "book-1002.jpg");
    }

    fn clock_millis(id: &AssetIdentifier) -> i64 {
        id.filename()
            .trim_start_matches("game-")
            .trim_end_matches(".jpg")
            .parse()
            .expect("numeric identifier")
    }

    #[test]
    fn follows_wall_clock_when_it_advances() {
        let clock = IdentifierClock::new();
        clock.next_at(Namespace::Books, 10);
        assert_eq!(
            clock.next_at(Namespace::Books, 500),
            AssetIdentifier::new(Namespace::Books, 500)
        );
    }

    #[test]
    fn live_clock_is_monotonic() {
        let clock = IdentifierClock::new();
        let ids: Vec<AssetIdentifier> = (0..50).map(|_| clock.next(Namespace::Games)).collect();
        assert!(
            ids.windows(2)
                .all(|pair| clock_millis(&pair[0]) < clock_millis(&pair[1]))
        );
    }
}
