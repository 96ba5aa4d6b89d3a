//! Session queue: a private copy of the selected songs, a play order over them and a FIFO
//! of manually queued songs that play once ahead of the order.

use std::collections::VecDeque;

use common::Song;
use rand::Rng;

use crate::shuffle::riffle_shuffle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueSource {
    Manual,
    Order,
}

#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    songs: Vec<Song>,
    order: Vec<usize>,
    cursor: Option<usize>,
    manual: VecDeque<Song>,
}

impl PlaybackQueue {
    pub fn new(songs: Vec<Song>) -> Self {
        let order = (0..songs.len()).collect();
        Self {
            songs,
            order,
            cursor: None,
            manual: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn manual_len(&self) -> usize {
        self.manual.len()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Indices into the selected songs, in play order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn ordered_songs(&self) -> impl Iterator<Item = &Song> {
        self.order.iter().map(|index| &self.songs[*index])
    }

    /// Back to "before the first song".
    pub fn rewind(&mut self) {
        self.cursor = None;
    }

    /// Reorders the play order without moving the cursor.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        riffle_shuffle(&mut self.order, rng);
    }

    pub fn push_manual(&mut self, song: Song) {
        self.manual.push_back(song);
    }

    /// Next song to play. Manual songs come first and are consumed; otherwise the cursor
    /// moves on, reshuffling the order when it wraps past the last song.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<(Song, QueueSource)> {
        if let Some(song) = self.manual.pop_front() {
            return Some((song, QueueSource::Manual));
        }
        if self.order.is_empty() {
            return None;
        }
        let last = self.order.len() - 1;
        let next = match self.cursor {
            Some(cursor) if cursor >= last => {
                self.shuffle(rng);
                0
            }
            Some(cursor) => cursor + 1,
            None => 0,
        };
        self.cursor = Some(next);
        Some((self.songs[self.order[next]].clone(), QueueSource::Order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn song(id: usize) -> Song {
        Song {
            id,
            title: format!("s{}", id),
            album: "Album".to_string(),
            artist: "Artist".to_string(),
            track: id as u32,
            file: format!("s{}.mp3", id),
        }
    }

    #[test]
    fn visits_in_order_then_reshuffles_on_wrap() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut queue = PlaybackQueue::new(vec![song(0), song(1), song(2)]);

        let ids: Vec<usize> = (0..3).map(|_| queue.next(&mut rng).unwrap().0.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(queue.order(), &[0, 1, 2]);

        let before = queue.order().to_vec();
        let mut reference = before.clone();
        riffle_shuffle(&mut reference, &mut StdRng::seed_from_u64(3));

        let (fourth, source) = queue.next(&mut rng).unwrap();
        assert_eq!(source, QueueSource::Order);
        assert_eq!(queue.cursor(), Some(0));
        assert_eq!(queue.order(), reference.as_slice());
        assert_eq!(fourth.id, reference[0]);
    }

    #[test]
    fn manual_songs_play_once_ahead_of_order() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut queue = PlaybackQueue::new(vec![song(0), song(1), song(2)]);
        queue.next(&mut rng);

        queue.push_manual(song(9));
        let (manual, source) = queue.next(&mut rng).unwrap();
        assert_eq!((manual.id, source), (9, QueueSource::Manual));
        assert_eq!(queue.cursor(), Some(0));

        assert_eq!(queue.next(&mut rng).unwrap().0.id, 1);
        assert_eq!(queue.manual_len(), 0);
    }

    #[test]
    fn shuffle_is_a_permutation_of_the_selection() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut queue = PlaybackQueue::new((0..25).map(song).collect());
        queue.shuffle(&mut rng);
        let mut ids: Vec<usize> = queue.ordered_songs().map(|s| s.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn empty_queue_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut queue = PlaybackQueue::new(Vec::new());
        assert!(queue.next(&mut rng).is_none());
        queue.push_manual(song(4));
        assert_eq!(queue.next(&mut rng).unwrap().0.id, 4);
        assert!(queue.next(&mut rng).is_none());
    }
}
