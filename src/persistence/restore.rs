//! Restore tokens and newest-wins merge
//!
//! A restore reads the local save and (for signed-in users) the remote
//! document, possibly while the frame loop is already running a fresh
//! world. Each restore carries a ticket; changing identity invalidates all
//! outstanding tickets so a late result never lands on the wrong account.

use super::snapshot::Snapshot;
use super::store::Identity;

/// Where a restored snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    Local,
    Remote,
}

/// Result of finishing a restore
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    Restored { source: RestoreSource, saved_at: f64 },
    /// Nothing usable was stored; the fresh world stays
    Fresh,
    /// Identity changed while the restore was pending
    Stale,
}

/// Handle for one in-flight restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreTicket {
    token: u64,
    identity: Identity,
}

impl RestoreTicket {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// Monotonic restore token
#[derive(Debug, Default)]
pub struct RestoreTracker {
    current: u64,
}

impl RestoreTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a restore for `identity`, superseding any earlier one
    pub fn begin(&mut self, identity: &Identity) -> RestoreTicket {
        self.current += 1;
        RestoreTicket {
            token: self.current,
            identity: identity.clone(),
        }
    }

    /// Invalidate every outstanding ticket
    pub fn invalidate(&mut self) {
        self.current += 1;
    }

    pub fn is_current(&self, ticket: &RestoreTicket) -> bool {
        ticket.token == self.current
    }
}

/// Newer `savedAt` wins; ties keep the local copy
pub fn pick_newest(
    local: Option<Snapshot>,
    remote: Option<Snapshot>,
) -> Option<(Snapshot, RestoreSource)> {
    match (local, remote) {
        (Some(l), Some(r)) if r.saved_at > l.saved_at => Some((r, RestoreSource::Remote)),
        (Some(l), _) => Some((l, RestoreSource::Local)),
        (None, Some(r)) => Some((r, RestoreSource::Remote)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::World;
    use crate::tuning::Tuning;
    use proptest::prelude::*;

    fn snapshot(saved_at: f64, score: u64) -> Snapshot {
        let tuning = Tuning::default();
        let mut world = World::new(1, &tuning);
        world.score = score;
        Snapshot::capture(&world, Settings::default(), saved_at, &tuning)
    }

    #[test]
    fn test_tokens_invalidate() {
        let mut tracker = RestoreTracker::new();
        let guest = tracker.begin(&Identity::Guest);
        assert!(tracker.is_current(&guest));

        tracker.invalidate();
        assert!(!tracker.is_current(&guest));

        let user = tracker.begin(&Identity::User("u".into()));
        assert!(tracker.is_current(&user));
        assert!(user.token() > guest.token());
        assert_eq!(user.identity(), &Identity::User("u".into()));
    }

    #[test]
    fn test_pick_newest_sources() {
        assert!(pick_newest(None, None).is_none());
        let (s, src) = pick_newest(Some(snapshot(5.0, 1)), None).unwrap();
        assert_eq!((s.world.score, src), (1, RestoreSource::Local));
        let (s, src) = pick_newest(None, Some(snapshot(5.0, 2))).unwrap();
        assert_eq!((s.world.score, src), (2, RestoreSource::Remote));
        let (_, src) = pick_newest(Some(snapshot(5.0, 1)), Some(snapshot(5.0, 2))).unwrap();
        assert_eq!(src, RestoreSource::Local);
    }

    proptest! {
        #[test]
        fn prop_newer_timestamp_wins(t1 in 0.0f64..1e13, dt in 1.0f64..1e9, remote_newer in any::<bool>()) {
            let t2 = t1 + dt;
            let (local, remote) = if remote_newer {
                (snapshot(t1, 1), snapshot(t2, 2))
            } else {
                (snapshot(t2, 1), snapshot(t1, 2))
            };
            let (winner, _) = pick_newest(Some(local), Some(remote)).unwrap();
            prop_assert_eq!(winner.saved_at, t2);
        }
    }
}
