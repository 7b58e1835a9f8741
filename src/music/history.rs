use crate::audio::{PitchRange, SoundEventDescriptor, SoundType};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub timestamp_ms: u64,
    pub pitch_range: PitchRange,
    pub intensity: f32,
    pub sound_type: SoundType,
}

impl EventRecord {
    pub fn from_descriptor(descriptor: &SoundEventDescriptor, timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            pitch_range: descriptor.pitch_range,
            intensity: descriptor.intensity,
            sound_type: descriptor.sound_type,
        }
    }
}

/// Bounded memory of recent sound events.
///
/// `recent` drives activity; `long` drives slower register choices.
#[derive(Debug, Clone)]
pub struct EventHistory {
    recent: VecDeque<EventRecord>,
    long: VecDeque<EventRecord>,
    recent_capacity: usize,
    long_capacity: usize,
}

impl EventHistory {
    pub fn new(recent_capacity: usize, long_capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(recent_capacity),
            long: VecDeque::with_capacity(long_capacity),
            recent_capacity,
            long_capacity,
        }
    }

    pub fn push(&mut self, record: EventRecord) {
        self.recent.push_back(record.clone());
        while self.recent.len() > self.recent_capacity {
            self.recent.pop_front();
        }
        self.long.push_back(record);
        while self.long.len() > self.long_capacity {
            self.long.pop_front();
        }
    }

    /// Events within the last `window_ms`, inclusive of the window edge.
    pub fn count_since(&self, now_ms: u64, window_ms: u64) -> usize {
        self.recent
            .iter()
            .filter(|r| now_ms.saturating_sub(r.timestamp_ms) <= window_ms)
            .count()
    }

    /// Most frequent pitch range over the long history; ties go to the most recent.
    pub fn dominant_range(&self) -> Option<PitchRange> {
        let ranges = [PitchRange::Low, PitchRange::MidLow, PitchRange::MidHigh, PitchRange::High];
        let counts = ranges.map(|range| self.long.iter().filter(|r| r.pitch_range == range).count());
        let best = *counts.iter().max()?;
        if best == 0 {
            return None;
        }
        self.long
            .iter()
            .rev()
            .map(|r| r.pitch_range)
            .find(|range| counts[ranges.iter().position(|r| r == range).unwrap_or(0)] == best)
    }

    pub fn recent(&self) -> &VecDeque<EventRecord> {
        &self.recent
    }

    pub fn long(&self) -> &VecDeque<EventRecord> {
        &self.long
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new(20, 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp_ms: u64, pitch_range: PitchRange) -> EventRecord {
        EventRecord {
            timestamp_ms,
            pitch_range,
            intensity: 0.5,
            sound_type: SoundType::Clap,
        }
    }

    #[test]
    fn test_capacities_are_enforced() {
        let mut history = EventHistory::default();
        for i in 0..80 {
            history.push(record(i * 10, PitchRange::Low));
        }
        assert_eq!(history.recent().len(), 20);
        assert_eq!(history.long().len(), 50);
        assert_eq!(history.recent().front().unwrap().timestamp_ms, 600);
    }

    #[test]
    fn test_windowed_count() {
        let mut history = EventHistory::default();
        for t in [0, 1000, 4000, 5500, 9000] {
            history.push(record(t, PitchRange::Low));
        }
        assert_eq!(history.count_since(9000, 5000), 3);
        assert_eq!(history.count_since(20000, 5000), 0);
    }

    #[test]
    fn test_dominant_range() {
        let mut history = EventHistory::default();
        assert_eq!(history.dominant_range(), None);
        history.push(record(0, PitchRange::High));
        history.push(record(1, PitchRange::Low));
        history.push(record(2, PitchRange::High));
        assert_eq!(history.dominant_range(), Some(PitchRange::High));
        history.push(record(3, PitchRange::Low));
        assert_eq!(history.dominant_range(), Some(PitchRange::Low));
    }
}
