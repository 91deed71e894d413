use banter_client::Message;

/// Pure feed state: the ordered message list plus the guards that make
/// pull/send interleavings safe.
///
/// The `generation` counter is the staleness guard: it is bumped on every
/// activate/deactivate, and any pull or send that started under an older
/// generation is rejected at apply time. The supersede check rejects a
/// snapshot whose highest id falls below the locally-held highest id — it
/// predates an already-acknowledged send.
#[derive(Debug, Default)]
pub(crate) struct FeedState {
    messages: Vec<Message>,
    generation: u64,
    syncing: bool,
    active: bool,
}

impl FeedState {
    /// Begin a fresh feed lifecycle with an empty list. Returns the new
    /// generation.
    pub fn activate(&mut self) -> u64 {
        self.messages.clear();
        self.syncing = false;
        self.active = true;
        self.generation += 1;
        self.generation
    }

    /// End the current lifecycle and discard the list. Anything still in
    /// flight observes the stale generation and becomes a no-op.
    pub fn deactivate(&mut self) {
        self.messages.clear();
        self.syncing = false;
        self.active = false;
        self.generation += 1;
    }

    /// Reserve the right to pull. Returns the generation to tag the pull
    /// with, or `None` when the feed is inactive or a pull is already in
    /// flight (the caller skips the tick, it is not queued).
    pub fn begin_pull(&mut self) -> Option<u64> {
        if !self.active || self.syncing {
            return None;
        }
        self.syncing = true;
        Some(self.generation)
    }

    /// Release the in-flight flag for the pull tagged `generation`. A
    /// stale pull must not clear the flag of a newer lifecycle's pull.
    pub fn finish_pull(&mut self, generation: u64) {
        if generation == self.generation {
            self.syncing = false;
        }
    }

    /// Replace the list with a server snapshot, unless the snapshot is
    /// stale (wrong generation, feed inactive) or superseded (its highest
    /// id is below the local highest). Returns whether it was applied.
    pub fn apply_snapshot(&mut self, generation: u64, mut snapshot: Vec<Message>) -> bool {
        if generation != self.generation || !self.active {
            return false;
        }
        // The wire pages newest-first; the feed list is ascending by id.
        snapshot.sort_unstable_by_key(|m| m.id);

        if let Some(local_max) = self.messages.last().map(|m| m.id) {
            let snapshot_max = snapshot.last().map(|m| m.id);
            if snapshot_max.is_none_or(|id| id < local_max) {
                return false;
            }
        }
        self.messages = snapshot;
        true
    }

    /// Insert a server-acknowledged message at its sorted position, unless
    /// stale or already present (a snapshot may have raced it in).
    /// Returns whether the list changed.
    pub fn append(&mut self, generation: u64, message: Message) -> bool {
        if generation != self.generation || !self.active {
            return false;
        }
        match self.messages.binary_search_by_key(&message.id, |m| m.id) {
            Ok(_) => false,
            Err(pos) => {
                self.messages.insert(pos, message);
                true
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while the feed lifecycle tagged `generation` is still running.
    pub fn is_current(&self, generation: u64) -> bool {
        self.active && generation == self.generation
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    #[cfg(test)]
    fn ids(&self) -> Vec<i64> {
        self.messages.iter().map(|m| m.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn msg(id: i64) -> Message {
        Message {
            id,
            username: "alice".into(),
            text: format!("msg {id}"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_snapshot_normalized_to_ascending_ids() {
        let mut state = FeedState::default();
        let generation = state.activate();

        // Wire order is newest-first.
        assert!(state.apply_snapshot(generation, vec![msg(42), msg(41), msg(40)]));
        assert_eq!(state.ids(), vec![40, 41, 42]);
    }

    #[test]
    fn test_pull_reservation_skips_when_in_flight() {
        let mut state = FeedState::default();
        let generation = state.activate();

        let first = state.begin_pull();
        assert_eq!(first, Some(generation));
        // Timer fires while the pull is in flight: tick lost, not queued.
        assert_eq!(state.begin_pull(), None);

        state.finish_pull(generation);
        assert!(state.begin_pull().is_some());
    }

    #[test]
    fn test_pull_reservation_requires_active() {
        let mut state = FeedState::default();
        assert_eq!(state.begin_pull(), None);
    }

    #[test]
    fn test_stale_snapshot_after_deactivate_is_noop() {
        let mut state = FeedState::default();
        let generation = state.activate();
        let reserved = state.begin_pull();
        assert_eq!(reserved, Some(generation));

        state.deactivate();
        state.finish_pull(generation);

        assert!(!state.apply_snapshot(generation, vec![msg(1)]));
        assert!(state.snapshot().is_empty());
        assert!(!state.is_syncing());
    }

    #[test]
    fn test_stale_finish_does_not_clear_newer_pull() {
        let mut state = FeedState::default();
        let old = state.activate();
        state.begin_pull();

        state.deactivate();
        let fresh = state.activate();
        assert_eq!(state.begin_pull(), Some(fresh));

        // The old lifecycle's pull resolves late.
        state.finish_pull(old);
        assert!(state.is_syncing());
    }

    #[test]
    fn test_superseded_snapshot_rejected() {
        let mut state = FeedState::default();
        let generation = state.activate();
        assert!(state.apply_snapshot(generation, vec![msg(40), msg(41)]));

        // A send acknowledged id 42 while the next pull was in flight.
        assert!(state.append(generation, msg(42)));

        // That pull's snapshot predates the send: it must not win.
        assert!(!state.apply_snapshot(generation, vec![msg(40), msg(41)]));
        assert_eq!(state.ids(), vec![40, 41, 42]);

        // A snapshot that includes the send replaces as usual.
        assert!(state.apply_snapshot(generation, vec![msg(41), msg(42), msg(43)]));
        assert_eq!(state.ids(), vec![41, 42, 43]);
    }

    #[test]
    fn test_empty_snapshot_never_clobbers_messages() {
        let mut state = FeedState::default();
        let generation = state.activate();
        assert!(state.apply_snapshot(generation, vec![msg(40)]));
        assert!(!state.apply_snapshot(generation, Vec::new()));
        assert_eq!(state.ids(), vec![40]);
    }

    #[test]
    fn test_append_deduplicates_by_id() {
        let mut state = FeedState::default();
        let generation = state.activate();
        assert!(state.apply_snapshot(generation, vec![msg(40), msg(41), msg(42)]));

        // The poll already delivered id 42; the send ack arrives after.
        assert!(!state.append(generation, msg(42)));
        assert_eq!(state.ids(), vec![40, 41, 42]);
    }

    #[test]
    fn test_append_inserts_at_sorted_position() {
        let mut state = FeedState::default();
        let generation = state.activate();
        assert!(state.apply_snapshot(generation, vec![msg(40), msg(43)]));

        assert!(state.append(generation, msg(41)));
        assert_eq!(state.ids(), vec![40, 41, 43]);
    }

    #[test]
    fn test_append_after_deactivate_is_noop() {
        let mut state = FeedState::default();
        let generation = state.activate();
        state.deactivate();

        assert!(!state.append(generation, msg(1)));
        assert!(state.snapshot().is_empty());
    }

    #[test]
    fn test_activate_starts_empty_each_lifecycle() {
        let mut state = FeedState::default();
        let first = state.activate();
        assert!(state.apply_snapshot(first, vec![msg(40)]));

        state.deactivate();
        let second = state.activate();
        assert!(state.snapshot().is_empty());
        assert!(second > first);
    }
}
