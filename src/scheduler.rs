//! The uplink job.
//!
//! One repeating job decides on every tick whether to send the latest fix,
//! wait for a fix or skip because the radio is still busy, then re-arms itself.
//! Skipped ticks are never queued: the duty cycle makes catching up unsafe, the
//! next tick simply looks again.

use embassy_time::{Duration, Instant};

use crate::{
    config::Intervals,
    gps::FixSource,
    payload,
    radio::RadioAdapter,
    status::Counters,
};

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// The previous uplink was still pending, nothing sent
    RadioBusy,
    /// No GPS fix yet, retrying sooner than usual
    WaitingForFix,
    /// A fresh uplink was handed to the radio
    Sent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub outcome: TickOutcome,
    /// When the job fires next
    pub next: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerState {
    /// Interval chosen by the last tick
    pub next_interval: Duration,
    /// Radio busy flag as seen by the last tick
    pub pending: bool,
}

pub struct UplinkScheduler {
    intervals: Intervals,
    port: u8,
    state: SchedulerState,
    deadline: Option<Instant>,
}

impl UplinkScheduler {
    pub fn new(intervals: Intervals, port: u8) -> Self {
        Self {
            intervals,
            port,
            state: SchedulerState {
                next_interval: intervals.send,
                pending: false,
            },
            deadline: None,
        }
    }

    /// Make the first tick due at `now`. Called once the network is joined,
    /// calling it again pulls the next tick forward.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run the job once and re-arm it relative to `now`.
    pub fn tick<R, F>(
        &mut self,
        now: Instant,
        radio: &mut R,
        fixes: &F,
        battery_volts: Option<f32>,
        counters: &mut Counters,
    ) -> Tick
    where
        R: RadioAdapter,
        F: FixSource,
    {
        self.state.pending = radio.is_busy();

        let outcome = if self.state.pending {
            TickOutcome::RadioBusy
        } else {
            let fix = fixes.latest_fix();
            if !fix.valid {
                TickOutcome::WaitingForFix
            } else {
                let uplink = payload::encode(&fix, battery_volts);
                match radio.submit(self.port, uplink) {
                    Ok(()) => TickOutcome::Sent,
                    Err(e) => {
                        log_warn!("Uplink refused: {:?}", e);
                        self.state.pending = true;
                        TickOutcome::RadioBusy
                    }
                }
            }
        };

        match outcome {
            TickOutcome::RadioBusy => counters.add_error(),
            TickOutcome::Sent => counters.add_sent(),
            TickOutcome::WaitingForFix => {}
        }

        self.state.next_interval = match outcome {
            TickOutcome::WaitingForFix => self.intervals.fix_wait,
            TickOutcome::RadioBusy | TickOutcome::Sent => self.intervals.send,
        };

        let next = now + self.state.next_interval;
        self.deadline = Some(next);

        log_debug!("Tick {:?}, next in {} s", outcome, self.state.next_interval.as_secs());

        Tick { outcome, next }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::{Fix, FixMailbox};
    use crate::radio::mock::MockRadio;

    const PORT: u8 = 2;

    fn intervals() -> Intervals {
        Intervals {
            send: Duration::from_secs(60),
            fix_wait: Duration::from_secs(5),
        }
    }

    fn with_fix() -> FixMailbox {
        let mailbox = FixMailbox::new();
        mailbox.publish(Fix::from_degrees(52.370216, 4.895168, 12.0, 0.9));
        mailbox
    }

    #[test]
    fn not_armed_until_told() {
        let mut scheduler = UplinkScheduler::new(intervals(), PORT);
        assert!(!scheduler.is_armed());
        assert!(!scheduler.is_due(Instant::from_secs(1_000)));

        scheduler.arm(Instant::from_secs(10));
        assert!(!scheduler.is_due(Instant::from_secs(9)));
        assert!(scheduler.is_due(Instant::from_secs(10)));
    }

    #[test]
    fn busy_radio_skips_and_uses_normal_interval() {
        let mut scheduler = UplinkScheduler::new(intervals(), PORT);
        let mut radio = MockRadio {
            busy: true,
            ..MockRadio::default()
        };
        let mut counters = Counters::default();
        let now = Instant::from_secs(100);

        let tick = scheduler.tick(now, &mut radio, &with_fix(), None, &mut counters);

        assert_eq!(tick.outcome, TickOutcome::RadioBusy);
        assert_eq!(tick.next, now + Duration::from_secs(60));
        assert!(radio.submitted.is_empty());
        assert_eq!(counters.error, 1);
        assert_eq!(counters.sent, 0);
        assert!(scheduler.state().pending);
    }

    #[test]
    fn missing_fix_retries_sooner() {
        let mut scheduler = UplinkScheduler::new(intervals(), PORT);
        let mut radio = MockRadio::default();
        let mut counters = Counters::default();
        let now = Instant::from_secs(100);

        let tick = scheduler.tick(now, &mut radio, &FixMailbox::new(), None, &mut counters);

        assert_eq!(tick.outcome, TickOutcome::WaitingForFix);
        assert_eq!(tick.next, now + Duration::from_secs(5));
        assert!(scheduler.state().next_interval < intervals().send);
        assert!(radio.submitted.is_empty());
        assert_eq!(counters, Counters::default());
    }

    #[test]
    fn valid_fix_is_sent_on_the_mapper_port() {
        let mut scheduler = UplinkScheduler::new(intervals(), PORT);
        let mut radio = MockRadio::default();
        let mut counters = Counters::default();
        let fixes = with_fix();
        let now = Instant::from_secs(100);

        let tick = scheduler.tick(now, &mut radio, &fixes, Some(3.9), &mut counters);

        assert_eq!(tick.outcome, TickOutcome::Sent);
        assert_eq!(tick.next, now + Duration::from_secs(60));
        assert_eq!(counters.sent, 1);

        let (port, uplink) = &radio.submitted[0];
        assert_eq!(*port, PORT);
        assert_eq!(*uplink, payload::encode(&fixes.latest_fix(), Some(3.9)));
    }

    #[test]
    fn n_ticks_send_n_uplinks() {
        let mut scheduler = UplinkScheduler::new(intervals(), PORT);
        let mut radio = MockRadio::default();
        let mut counters = Counters::default();
        let fixes = with_fix();

        let mut now = Instant::from_secs(0);
        for _ in 0..7 {
            let tick = scheduler.tick(now, &mut radio, &fixes, None, &mut counters);
            now = tick.next;
        }

        assert_eq!(radio.submitted.len(), 7);
        assert_eq!(counters.sent, 7);
        assert_eq!(counters.error, 0);
    }

    #[test]
    fn rearm_is_relative_to_tick_time() {
        let mut scheduler = UplinkScheduler::new(intervals(), PORT);
        let mut radio = MockRadio::default();
        let mut counters = Counters::default();
        let fixes = with_fix();

        scheduler.arm(Instant::from_secs(0));
        // Job ran late
        let late = Instant::from_secs(3);
        let tick = scheduler.tick(late, &mut radio, &fixes, None, &mut counters);

        assert_eq!(tick.next, Instant::from_secs(63));
        assert_eq!(scheduler.deadline(), Some(Instant::from_secs(63)));
    }

    #[test]
    fn refused_submit_counts_as_busy() {
        let mut scheduler = UplinkScheduler::new(intervals(), PORT);
        let mut radio = MockRadio {
            refuse_submit: true,
            ..MockRadio::default()
        };
        let mut counters = Counters::default();
        let now = Instant::from_secs(0);

        let tick = scheduler.tick(now, &mut radio, &with_fix(), None, &mut counters);

        assert_eq!(tick.outcome, TickOutcome::RadioBusy);
        assert_eq!(tick.next, now + Duration::from_secs(60));
        assert_eq!(counters.sent, 0);
        assert_eq!(counters.error, 1);
    }

    #[test]
    fn fix_lost_after_sending() {
        let mut scheduler = UplinkScheduler::new(intervals(), PORT);
        let mut radio = MockRadio::default();
        let mut counters = Counters::default();
        let fixes = with_fix();

        let first = scheduler.tick(Instant::from_secs(0), &mut radio, &fixes, None, &mut counters);
        fixes.publish(Fix::NONE);
        let second = scheduler.tick(first.next, &mut radio, &fixes, None, &mut counters);

        assert_eq!(second.outcome, TickOutcome::WaitingForFix);
        assert_eq!(second.next, first.next + Duration::from_secs(5));
        assert_eq!(radio.submitted.len(), 1);
    }

    #[test]
    fn receiver_without_lock_sends_nothing() {
        let mut scheduler = UplinkScheduler::new(intervals(), PORT);
        let mut radio = MockRadio::default();
        let mut counters = Counters::default();
        let fixes = FixMailbox::new();

        let mut receiver = crate::gps::GpsReceiver::new(&fixes);
        receiver.service(b"$GPGGA,123519,4807.038,N,01131.000,E,0,08,0.9,545.4,M,46.9,M,,*46\r\n");

        let tick = scheduler.tick(Instant::from_secs(0), &mut radio, &fixes, None, &mut counters);

        assert_eq!(tick.outcome, TickOutcome::WaitingForFix);
        assert!(radio.submitted.is_empty());
    }
}
