use tracing::{debug, info};

use crate::network::messages::{PlaybackSnapshot, SongQueueItem};

/// Window before the end of a track in which the head item is hidden and
/// the queue is advanced (milliseconds)
pub const END_GRACE_MS: u64 = 1500;
/// Consecutive poll failures tolerated before playback state becomes unknown
pub const MAX_POLL_FAILURES: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub name: String,
    pub uri: String,
    pub artists: Vec<String>,
    pub duration_ms: Option<u64>,
}

/// Derived playback state exposed to subscribers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackView {
    pub now_playing: Option<NowPlaying>,
    pub progress_ms: Option<u64>,
    pub remaining_ms: Option<u64>,
    /// Head queue item hidden because its track is about to end
    pub hidden_item_id: Option<String>,
}

/// Action requested by a poll result
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackAction {
    None,
    /// Advance the queue past the item with this id
    AutoSkip(String),
}

/// Playback countdown and the one-shot auto-skip guard
pub struct PlaybackTracker {
    view: PlaybackView,
    grace_ms: u64,
    auto_skip_head_id: Option<String>,
    consecutive_failures: u32,
}

impl PlaybackTracker {
    pub fn new() -> Self {
        Self::with_grace(END_GRACE_MS)
    }

    pub fn with_grace(grace_ms: u64) -> Self {
        Self {
            view: PlaybackView::default(),
            grace_ms,
            auto_skip_head_id: None,
            consecutive_failures: 0,
        }
    }

    pub fn view(&self) -> PlaybackView {
        self.view.clone()
    }

    pub fn remaining_ms(&self) -> Option<u64> {
        self.view.remaining_ms
    }

    /// Apply a successful poll. The auto-skip guard is armed before the
    /// action is returned, so a later poll cannot request the same skip.
    pub fn on_snapshot(
        &mut self,
        snapshot: &PlaybackSnapshot,
        head: Option<&SongQueueItem>,
    ) -> PlaybackAction {
        self.consecutive_failures = 0;

        let (item, duration, progress) = match (
            snapshot.item.as_ref(),
            snapshot.item.as_ref().and_then(|item| item.duration_ms),
            snapshot.progress_ms,
        ) {
            (Some(item), Some(duration), Some(progress)) => (item, duration, progress),
            _ => {
                self.view.progress_ms = None;
                self.view.remaining_ms = None;
                self.view.hidden_item_id = None;
                return PlaybackAction::None;
            }
        };

        let remaining = duration.saturating_sub(progress);
        self.view.now_playing = Some(NowPlaying {
            name: item.name.clone(),
            uri: item.uri.clone(),
            artists: item.artists.clone(),
            duration_ms: Some(duration),
        });
        self.view.progress_ms = Some(progress);
        self.view.remaining_ms = Some(remaining);

        let head_id = head.map(|h| h.id.clone());
        let matches_head = head
            .and_then(|h| h.matched_uri())
            .map(|uri| !uri.is_empty() && uri == item.uri)
            .unwrap_or(false);
        let ending = matches_head && remaining <= self.grace_ms;

        self.view.hidden_item_id = if ending { head_id.clone() } else { None };

        match head_id {
            Some(id) if ending => {
                if self.auto_skip_head_id.as_deref() == Some(id.as_str()) {
                    return PlaybackAction::None;
                }
                info!("Track for queue item {} is ending, advancing queue", id);
                self.auto_skip_head_id = Some(id.clone());
                PlaybackAction::AutoSkip(id)
            }
            Some(id) => {
                if self
                    .auto_skip_head_id
                    .as_deref()
                    .map(|guard| guard != id)
                    .unwrap_or(false)
                {
                    self.auto_skip_head_id = None;
                }
                PlaybackAction::None
            }
            None => {
                self.auto_skip_head_id = None;
                PlaybackAction::None
            }
        }
    }

    /// Record a failed poll. Returns true when this failure cleared the view.
    pub fn on_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures > MAX_POLL_FAILURES {
            if self.view != PlaybackView::default() {
                debug!(
                    "Playback poll failed {} times in a row, clearing playback state",
                    self.consecutive_failures
                );
                self.view = PlaybackView::default();
                return true;
            }
        }
        false
    }

    /// The backend accepted the skip for `id`
    pub fn on_skip_succeeded(&mut self, id: &str) {
        if self.view.hidden_item_id.as_deref() == Some(id) {
            self.view.hidden_item_id = None;
        }
    }
}

impl Default for PlaybackTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::messages::{MatchedTrack, PlaybackItem};

    fn snapshot(uri: &str, duration: u64, progress: u64) -> PlaybackSnapshot {
        PlaybackSnapshot {
            progress_ms: Some(progress),
            item: Some(PlaybackItem {
                name: "Track".to_string(),
                uri: uri.to_string(),
                artists: vec!["Artist".to_string()],
                duration_ms: Some(duration),
            }),
        }
    }

    fn queue_item(id: &str, uri: &str) -> SongQueueItem {
        SongQueueItem {
            id: id.to_string(),
            title: "Track".to_string(),
            requested_by: "viewer".to_string(),
            requested_at: 0,
            match_status: None,
            matched_track: Some(MatchedTrack {
                id: "t".to_string(),
                uri: uri.to_string(),
                name: "Track".to_string(),
                artists: vec![],
                confidence: None,
            }),
            match_error: None,
        }
    }

    #[test]
    fn test_remaining_time_does_not_clamp_early() {
        let mut tracker = PlaybackTracker::new();
        tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, 175_000), None);
        assert_eq!(tracker.remaining_ms(), Some(5000));

        tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, 179_999), None);
        assert_eq!(tracker.remaining_ms(), Some(1));

        tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, 181_000), None);
        assert_eq!(tracker.remaining_ms(), Some(0));
    }

    #[test]
    fn test_auto_skip_fires_once_per_head() {
        let mut tracker = PlaybackTracker::new();
        let head = queue_item("q1", "spotify:track:a");

        let mut skips = 0;
        for progress in [178_600, 178_900, 179_200, 179_500, 179_800] {
            if let PlaybackAction::AutoSkip(id) =
                tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, progress), Some(&head))
            {
                assert_eq!(id, "q1");
                skips += 1;
            }
        }
        assert_eq!(skips, 1);
        assert_eq!(tracker.view().hidden_item_id.as_deref(), Some("q1"));

        // A new head re-arms the guard
        let next = queue_item("q2", "spotify:track:b");
        let action = tracker.on_snapshot(&snapshot("spotify:track:b", 200_000, 199_000), Some(&next));
        assert_eq!(action, PlaybackAction::AutoSkip("q2".to_string()));
    }

    #[test]
    fn test_no_skip_when_head_not_playing() {
        let mut tracker = PlaybackTracker::new();
        let head = queue_item("q1", "spotify:track:other");
        let action = tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, 179_500), Some(&head));
        assert_eq!(action, PlaybackAction::None);
        assert_eq!(tracker.view().hidden_item_id, None);
    }

    #[test]
    fn test_head_hidden_only_inside_grace() {
        let mut tracker = PlaybackTracker::new();
        let head = queue_item("q1", "spotify:track:a");
        tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, 170_000), Some(&head));
        assert_eq!(tracker.view().hidden_item_id, None);
        tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, 178_500), Some(&head));
        assert_eq!(tracker.view().hidden_item_id.as_deref(), Some("q1"));
    }

    #[test]
    fn test_fourth_failure_clears_view() {
        let mut tracker = PlaybackTracker::new();
        tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, 1000), None);

        assert!(!tracker.on_failure());
        assert!(!tracker.on_failure());
        assert!(!tracker.on_failure());
        assert_eq!(tracker.remaining_ms(), Some(179_000));

        assert!(tracker.on_failure());
        assert_eq!(tracker.view(), PlaybackView::default());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut tracker = PlaybackTracker::new();
        tracker.on_failure();
        tracker.on_failure();
        tracker.on_failure();
        tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, 1000), None);
        assert!(!tracker.on_failure());
        assert!(tracker.view().now_playing.is_some());
    }

    #[test]
    fn test_snapshot_without_item_clears_countdown() {
        let mut tracker = PlaybackTracker::new();
        tracker.on_snapshot(&snapshot("spotify:track:a", 180_000, 1000), None);
        tracker.on_snapshot(&PlaybackSnapshot::default(), None);
        let view = tracker.view();
        assert_eq!(view.progress_ms, None);
        assert_eq!(view.remaining_ms, None);
        assert!(view.now_playing.is_some());
    }
}
