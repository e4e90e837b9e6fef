use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::error::PlaybackError;

/// A resolved track waiting in (or taken from) a guild queue.
///
/// Locator and title travel together in one record, so the pending list can
/// never fall out of step with the list of titles shown to users.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRef {
    /// Identifier unique within the process, used to find a track again
    /// after indices have shifted.
    pub id: u64,
    /// URL or search term as the user typed it; re-resolved when played.
    pub locator: String,
    pub title: String,
    pub duration: Option<Duration>,
    pub requested_by: UserId,
    pub added_at: DateTime<Utc>,
}

impl TrackRef {
    pub fn new(id: u64, locator: impl Into<String>, title: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            id,
            locator: locator.into(),
            title: title.into(),
            duration: None,
            requested_by,
            added_at: Utc::now(),
        }
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }
}

/// Pending tracks of one guild, strictly FIFO.
#[derive(Debug)]
pub struct GuildQueue {
    items: VecDeque<TrackRef>,
    max_size: usize,
}

impl GuildQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Fails with `QueueFull` when another append would exceed capacity.
    pub fn ensure_capacity(&self) -> Result<(), PlaybackError> {
        if self.items.len() >= self.max_size {
            return Err(PlaybackError::QueueFull { max: self.max_size });
        }
        Ok(())
    }

    /// Adds a track at the tail and returns its 1-based position.
    pub fn append(&mut self, track: TrackRef) -> Result<usize, PlaybackError> {
        self.ensure_capacity()?;

        info!("➕ Added to queue: {}", track.title);
        self.items.push_back(track);
        Ok(self.items.len())
    }

    pub fn pop_front(&mut self) -> Option<TrackRef> {
        let next = self.items.pop_front();
        if let Some(ref item) = next {
            debug!("➡️ Next in queue: {}", item.title);
        }
        next
    }

    /// Removes the track at a 1-based `index`; later tracks shift down by one.
    pub fn remove_at(&mut self, index: usize) -> Result<TrackRef, PlaybackError> {
        let len = self.items.len();
        if index < 1 || index > len {
            return Err(PlaybackError::OutOfRange { index, len });
        }

        let removed = self
            .items
            .remove(index - 1)
            .ok_or(PlaybackError::OutOfRange { index, len })?;
        debug!("❌ Removed track at position {}: {}", index, removed.title);
        Ok(removed)
    }

    /// Snapshot in play order.
    pub fn list(&self) -> Vec<TrackRef> {
        self.items.iter().cloned().collect()
    }

    /// Empties the queue, returning how many tracks were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        if dropped > 0 {
            info!("🗑️ Queue cleared ({} tracks)", dropped);
        }
        dropped
    }

    /// 1-based position of the track with `id`, if it is still pending.
    pub fn position_of(&self, id: u64) -> Option<usize> {
        self.items.iter().position(|t| t.id == id).map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One page of a queue listing.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePage {
    /// `(1-based position, track)` pairs.
    pub items: Vec<(usize, TrackRef)>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl QueuePage {
    /// Cuts page `page` (1-based, clamped) out of `tracks`.
    pub fn from_tracks(tracks: &[TrackRef], page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total_items = tracks.len();
        let total_pages = total_items.div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;

        let items = tracks
            .iter()
            .enumerate()
            .skip(start)
            .take(per_page)
            .map(|(i, t)| (i + 1, t.clone()))
            .collect();

        Self {
            items,
            current_page,
            total_pages,
            total_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(id: u64, title: &str) -> TrackRef {
        TrackRef::new(id, format!("https://example.com/{}", title), title, UserId::new(7))
    }

    fn titles(queue: &GuildQueue) -> Vec<String> {
        queue.list().into_iter().map(|t| t.title).collect()
    }

    #[test]
    fn append_keeps_fifo_order() {
        let mut queue = GuildQueue::new(10);
        for (i, name) in ["songA", "songB", "songC"].iter().enumerate() {
            let position = queue.append(track(i as u64, name)).unwrap();
            assert_eq!(position, i + 1);
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(titles(&queue), vec!["songA", "songB", "songC"]);
        assert_eq!(queue.pop_front().map(|t| t.title), Some("songA".to_string()));
        assert_eq!(titles(&queue), vec!["songB", "songC"]);
    }

    #[test]
    fn pop_front_on_empty_queue() {
        let mut queue = GuildQueue::new(10);
        assert!(queue.pop_front().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_at_uses_one_based_index() {
        let mut queue = GuildQueue::new(10);
        queue.append(track(1, "songB")).unwrap();
        queue.append(track(2, "songC")).unwrap();

        let removed = queue.remove_at(2).unwrap();

        assert_eq!(removed.title, "songC");
        assert_eq!(titles(&queue), vec!["songB"]);
    }

    #[test]
    fn remove_at_shifts_later_tracks_down() {
        let mut queue = GuildQueue::new(10);
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            queue.append(track(i as u64, name)).unwrap();
        }

        queue.remove_at(2).unwrap();

        assert_eq!(titles(&queue), vec!["a", "c", "d"]);
        assert_eq!(queue.position_of(2), Some(2));
    }

    #[test]
    fn remove_at_out_of_range_leaves_queue_untouched() {
        let mut queue = GuildQueue::new(10);
        queue.append(track(1, "songB")).unwrap();
        queue.append(track(2, "songC")).unwrap();

        for index in [0, 3, 100] {
            let err = queue.remove_at(index).unwrap_err();
            assert!(matches!(err, PlaybackError::OutOfRange { index: i, len: 2 } if i == index));
        }
        assert_eq!(titles(&queue), vec!["songB", "songC"]);
    }

    #[test]
    fn append_beyond_capacity_fails() {
        let mut queue = GuildQueue::new(2);
        queue.append(track(1, "a")).unwrap();
        queue.append(track(2, "b")).unwrap();

        let err = queue.append(track(3, "c")).unwrap_err();
        assert!(matches!(err, PlaybackError::QueueFull { max: 2 }));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn clear_reports_dropped_count() {
        let mut queue = GuildQueue::new(10);
        queue.append(track(1, "a")).unwrap();
        queue.append(track(2, "b")).unwrap();

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn pages_are_clamped_and_numbered() {
        let tracks: Vec<_> = (0..23).map(|i| track(i, &format!("t{}", i))).collect();

        let first = QueuePage::from_tracks(&tracks, 1, 10);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].0, 1);

        let last = QueuePage::from_tracks(&tracks, 99, 10);
        assert_eq!(last.current_page, 3);
        assert_eq!(last.items.len(), 3);
        assert_eq!(last.items[0].0, 21);
        assert_eq!(last.items[0].1.title, "t20");

        let empty = QueuePage::from_tracks(&[], 0, 10);
        assert_eq!(empty.current_page, 1);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }
}
