use super::{Note, TonePlayer, Voice};
use log::warn;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A note waiting for its fire time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNote {
    pub fire_at_ms: u64,
    pub voice: Voice,
    pub note: Note,
    seq: u64,
}

impl Eq for ScheduledNote {}

impl Ord for ScheduledNote {
    // Reversed so the max-heap pops the earliest note, FIFO among equal times.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at_ms
            .cmp(&self.fire_at_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledNote {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deferred note playback, drained once per frame.
///
/// Scheduled notes cannot be cancelled; they fire on the first drain at or
/// after their time even if the sequencer state has moved on.
#[derive(Debug, Default)]
pub struct NoteScheduler {
    queue: BinaryHeap<ScheduledNote>,
    next_seq: u64,
}

impl NoteScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at_ms: u64, voice: Voice, note: Note) {
        self.queue.push(ScheduledNote {
            fire_at_ms,
            voice,
            note,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    /// Remove and return every note due at `now_ms`, earliest first.
    pub fn drain_due(&mut self, now_ms: u64) -> Vec<ScheduledNote> {
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|n| n.fire_at_ms <= now_ms) {
            if let Some(next) = self.queue.pop() {
                due.push(next);
            }
        }
        due
    }

    /// Drain due notes into `player`. A failed note is logged and skipped.
    ///
    /// Returns every drained note, played or not.
    pub fn play_due(&mut self, now_ms: u64, player: &mut dyn TonePlayer) -> Vec<ScheduledNote> {
        let due = self.drain_due(now_ms);
        for scheduled in &due {
            if let Err(e) = player.play(&scheduled.note) {
                warn!(
                    "Dropped {} note {:.1}Hz on {} player: {:#}",
                    scheduled.voice,
                    scheduled.note.frequency_hz,
                    player.player_type(),
                    e
                );
            }
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_fire_ms(&self) -> Option<u64> {
        self.queue.peek().map(|n| n.fire_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(frequency_hz: f32) -> Note {
        Note::new(frequency_hz, 0.3, 0.2)
    }

    #[test]
    fn test_drains_in_time_order() {
        let mut scheduler = NoteScheduler::new();
        scheduler.schedule(300, Voice::Phrase, note(3.0));
        scheduler.schedule(100, Voice::Phrase, note(1.0));
        scheduler.schedule(200, Voice::Phrase, note(2.0));

        assert!(scheduler.drain_due(50).is_empty());
        let due = scheduler.drain_due(250);
        let order: Vec<f32> = due.iter().map(|n| n.note.frequency_hz).collect();
        assert_eq!(order, vec![1.0, 2.0]);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.next_fire_ms(), Some(300));
    }

    struct FailingPlayer {
        attempts: usize,
    }

    impl TonePlayer for FailingPlayer {
        fn play(&mut self, _note: &Note) -> anyhow::Result<()> {
            self.attempts += 1;
            Err(anyhow::anyhow!("device unplugged"))
        }

        fn player_type(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn test_player_failures_are_skipped() {
        let mut scheduler = NoteScheduler::new();
        scheduler.schedule(0, Voice::Bass, note(55.0));
        scheduler.schedule(10, Voice::Melody, note(440.0));
        scheduler.schedule(500, Voice::Melody, note(660.0));

        let mut player = FailingPlayer { attempts: 0 };
        let drained = scheduler.play_due(100, &mut player);
        assert_eq!(drained.len(), 2);
        assert_eq!(player.attempts, 2);
        assert_eq!(scheduler.pending(), 1);

        let recorder = crate::music::NoteRecorder::new();
        let mut sink = recorder.clone();
        scheduler.play_due(500, &mut sink);
        assert_eq!(recorder.notes()[0].frequency_hz, 660.0);
    }

    #[test]
    fn test_equal_times_keep_insertion_order() {
        let mut scheduler = NoteScheduler::new();
        for f in [5.0, 6.0, 7.0] {
            scheduler.schedule(100, Voice::Harmony, note(f));
        }
        let order: Vec<f32> = scheduler.drain_due(100).iter().map(|n| n.note.frequency_hz).collect();
        assert_eq!(order, vec![5.0, 6.0, 7.0]);
    }
}
