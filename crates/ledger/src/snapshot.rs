//! Wall-clock snapshot cadence. The engine asks before every event whether
//! boundaries have passed and emits one snapshot per elapsed boundary, so
//! each snapshot sees exactly the state of events that precede it.

/// Ceiling division for `i64`, valid when `b > 0` (stable `div_ceil` is not
/// implemented for signed integers).
fn div_ceil_i64(a: i64, b: i64) -> i64 {
    let d = a.div_euclid(b);
    let r = a.rem_euclid(b);
    if r > 0 { d + 1 } else { d }
}

/// Interval boundaries are aligned to multiples of `interval` seconds. The
/// first boundary is the one at or after `start_ts` when given, otherwise
/// the aligned floor of the first event's timestamp plus one interval.
#[derive(Clone, Debug)]
pub struct Snapshotter {
    interval: i64,
    start_ts: Option<i64>,
    next: Option<i64>,
    last_emitted: Option<i64>,
}

impl Snapshotter {
    pub fn new(interval: i64, start_ts: Option<i64>) -> Self {
        Self {
            interval,
            start_ts,
            next: None,
            last_emitted: None,
        }
    }

    /// The next elapsed boundary at or before `event_ts`, advancing the
    /// cursor. Call repeatedly until `None` before processing the event.
    pub fn due(&mut self, event_ts: i64) -> Option<i64> {
        if self.interval <= 0 {
            return None;
        }
        let interval = self.interval;
        let start_ts = self.start_ts;
        let next = self.next.get_or_insert_with(|| match start_ts {
            Some(start) => div_ceil_i64(start, interval) * interval,
            None => event_ts.div_euclid(interval) * interval + interval,
        });
        if *next > event_ts {
            return None;
        }
        let at = *next;
        *next += self.interval;
        self.last_emitted = Some(at);
        Some(at)
    }

    /// Where to flush the closing snapshot: at `end_ts` when given, else at
    /// the last event's timestamp, and only past the last emitted boundary.
    pub fn final_boundary(&self, end_ts: Option<i64>, last_event_ts: Option<i64>) -> Option<i64> {
        let at = end_ts.or(last_event_ts)?;
        match self.last_emitted {
            Some(last) if at <= last => None,
            _ => Some(at),
        }
    }
}
