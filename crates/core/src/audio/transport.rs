//! Shared transport clock and note schedules.
//!
//! The transport does not keep time by itself: whoever renders audio calls
//! [`Transport::advance`] with the block length and receives the events that
//! fall inside that window.

use crate::midi::Note;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Started,
}

/// One synthesis call, relative to the start of its schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNote {
    /// Seconds from schedule start
    pub time: f64,
    pub pitch: u8,
    /// Seconds
    pub duration: f64,
    /// 0.0-1.0
    pub velocity: f32,
}

impl From<&Note> for ScheduledNote {
    fn from(note: &Note) -> Self {
        Self {
            time: note.time,
            pitch: note.midi,
            duration: note.duration,
            velocity: note.velocity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleId(u64);

/// An event due inside an [`advance`](Transport::advance) window.
#[derive(Debug, Clone, PartialEq)]
pub struct DueEvent {
    /// Seconds from the start of the window
    pub offset: f64,
    pub note: ScheduledNote,
}

#[derive(Debug)]
struct Schedule {
    id: ScheduleId,
    events: Vec<ScheduledNote>,
    cursor: usize,
}

#[derive(Debug)]
pub struct Transport {
    state: TransportState,
    bpm: f64,
    time_signature: (u8, u32),
    position: f64,
    schedules: Vec<Schedule>,
    next_id: u64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            bpm: crate::midi::parser::DEFAULT_BPM,
            time_signature: (4, 4),
            position: 0.0,
            schedules: Vec::new(),
            next_id: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state == TransportState::Started
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        if bpm.is_finite() && bpm > 0.0 {
            self.bpm = bpm;
        } else {
            log::warn!("Ignoring invalid tempo {}", bpm);
        }
    }

    pub fn time_signature(&self) -> (u8, u32) {
        self.time_signature
    }

    pub fn set_time_signature(&mut self, numerator: u8, denominator: u32) {
        if numerator > 0 && denominator > 0 {
            self.time_signature = (numerator, denominator);
        }
    }

    /// Position in seconds since the last start from zero.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Register a set of events; they fire relative to position zero.
    pub fn schedule(&mut self, mut events: Vec<ScheduledNote>) -> ScheduleId {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        let id = ScheduleId(self.next_id);
        self.next_id += 1;
        log::debug!("Scheduled {} event(s) as {:?}", events.len(), id);
        self.schedules.push(Schedule {
            id,
            events,
            cursor: 0,
        });
        id
    }

    /// Dispose one schedule. Returns false if it was already gone.
    pub fn unschedule(&mut self, id: ScheduleId) -> bool {
        let before = self.schedules.len();
        self.schedules.retain(|s| s.id != id);
        self.schedules.len() != before
    }

    /// Drop every scheduled event.
    pub fn cancel(&mut self) {
        self.schedules.clear();
    }

    pub fn active_schedules(&self) -> usize {
        self.schedules.len()
    }

    pub fn start(&mut self) {
        self.state = TransportState::Started;
    }

    /// Halt and rewind to zero.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position = 0.0;
        for schedule in &mut self.schedules {
            schedule.cursor = 0;
        }
    }

    /// Move the clock forward by `dt` seconds and collect the events in
    /// `[position, position + dt)`, ordered by offset.
    pub fn advance(&mut self, dt: f64) -> Vec<DueEvent> {
        if self.state == TransportState::Stopped {
            return Vec::new();
        }
        let start = self.position;
        let end = start + dt;
        let mut due = Vec::new();

        for schedule in &mut self.schedules {
            while let Some(event) = schedule.events.get(schedule.cursor) {
                if event.time >= end {
                    break;
                }
                due.push(DueEvent {
                    offset: (event.time - start).max(0.0),
                    note: event.clone(),
                });
                schedule.cursor += 1;
            }
        }

        self.position = end;
        due.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        due
    }

    /// Started and every schedule has fired all of its events.
    pub fn is_finished(&self) -> bool {
        self.is_started()
            && self
                .schedules
                .iter()
                .all(|s| s.cursor >= s.events.len())
    }

    /// Position as "bars:beats:sixteenths", counting beats in quarter notes.
    pub fn position_bbs(&self) -> String {
        let quarters = self.position * self.bpm / 60.0;
        let (num, den) = self.time_signature;
        let quarters_per_bar = num as f64 * 4.0 / den as f64;
        let bars = (quarters / quarters_per_bar).floor();
        let in_bar = quarters - bars * quarters_per_bar;
        let beats = in_bar.floor();
        let sixteenths = ((in_bar - beats) * 4.0).floor();
        format!("{}:{}:{}", bars as u64, beats as u64, sixteenths as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(time: f64, pitch: u8) -> ScheduledNote {
        ScheduledNote {
            time,
            pitch,
            duration: 0.25,
            velocity: 0.8,
        }
    }

    #[test]
    fn test_stopped_transport_fires_nothing() {
        let mut t = Transport::new();
        t.schedule(vec![ev(0.0, 60)]);
        assert!(t.advance(1.0).is_empty());
        assert_eq!(t.position(), 0.0);
    }

    #[test]
    fn test_advance_fires_events_in_window() {
        let mut t = Transport::new();
        t.schedule(vec![ev(0.5, 62), ev(0.0, 60), ev(1.2, 64)]);
        t.start();

        let first = t.advance(0.6);
        let pitches: Vec<u8> = first.iter().map(|d| d.note.pitch).collect();
        assert_eq!(pitches, vec![60, 62]);
        assert!((first[1].offset - 0.5).abs() < 1e-12);

        assert!(t.advance(0.5).is_empty());
        assert!(!t.is_finished());

        let last = t.advance(0.5);
        assert_eq!(last.len(), 1);
        assert!((last[0].offset - 0.1).abs() < 1e-9);
        assert!(t.is_finished());
    }

    #[test]
    fn test_stop_rewinds() {
        let mut t = Transport::new();
        t.schedule(vec![ev(0.0, 60)]);
        t.start();
        assert_eq!(t.advance(0.1).len(), 1);

        t.stop();
        assert_eq!(t.state(), TransportState::Stopped);
        assert_eq!(t.position(), 0.0);
        t.start();
        assert_eq!(t.advance(0.1).len(), 1);
    }

    #[test]
    fn test_unschedule_and_cancel() {
        let mut t = Transport::new();
        let a = t.schedule(vec![ev(0.0, 60)]);
        let b = t.schedule(vec![ev(0.0, 61)]);
        assert_ne!(a, b);
        assert_eq!(t.active_schedules(), 2);

        assert!(t.unschedule(a));
        assert!(!t.unschedule(a));
        assert_eq!(t.active_schedules(), 1);

        t.cancel();
        assert_eq!(t.active_schedules(), 0);
    }

    #[test]
    fn test_tempo_validation() {
        let mut t = Transport::new();
        t.set_bpm(90.0);
        assert_eq!(t.bpm(), 90.0);
        t.set_bpm(0.0);
        t.set_bpm(f64::NAN);
        assert_eq!(t.bpm(), 90.0);
        t.set_time_signature(0, 4);
        assert_eq!(t.time_signature(), (4, 4));
    }

    #[test]
    fn test_position_bbs() {
        let mut t = Transport::new();
        t.start();
        assert_eq!(t.position_bbs(), "0:0:0");
        // 120 BPM in 4/4: 2.625s = 5.25 quarters = bar 1, beat 1, 1 sixteenth
        t.advance(2.625);
        assert_eq!(t.position_bbs(), "1:1:1");

        t.set_time_signature(3, 4);
        assert_eq!(t.position_bbs(), "1:2:1");
    }
}
