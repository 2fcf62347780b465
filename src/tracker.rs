//! Glue between the MAC, the uplink job and the display.
//!
//! Everything here runs in one cooperative context: MAC events and due ticks
//! are handled one after the other, never concurrently.

use embassy_time::Instant;

use crate::{
    config::{Intervals, UPLINK_PORT},
    gps::FixSource,
    radio::{MacEvent, RadioAdapter},
    scheduler::{Tick, UplinkScheduler},
    status::{Clock, Counters, EventOutcome, StatusDisplay, StatusReporter},
};

pub struct Tracker<R, F, D> {
    radio: R,
    fixes: F,
    reporter: StatusReporter<D>,
    scheduler: UplinkScheduler,
    counters: Counters,
}

impl<R, F, D> Tracker<R, F, D>
where
    R: RadioAdapter,
    F: FixSource,
    D: StatusDisplay,
{
    pub fn new(radio: R, fixes: F, display: D, intervals: Intervals) -> Self {
        Self {
            radio,
            fixes,
            reporter: StatusReporter::new(display),
            scheduler: UplinkScheduler::new(intervals, UPLINK_PORT),
            counters: Counters::default(),
        }
    }

    /// Kick off the join. The uplink job starts once the MAC reports `Joined`.
    pub fn start(&mut self) {
        log_info!("Starting join");
        self.radio.begin_join();
    }

    pub fn on_event(&mut self, event: MacEvent, now: Instant) {
        log_info!("MAC event {:?}", event);

        let clock = self.clock(now);
        let outcome = self
            .reporter
            .on_event(event, clock, &mut self.counters, &mut self.radio);

        if outcome == EventOutcome::StartUplinks {
            self.scheduler.arm(now);
        }
    }

    /// Fire the uplink job if it is due. Returns when it wants to run next.
    pub fn poll(&mut self, now: Instant) -> Option<Instant> {
        if self.scheduler.is_due(now) {
            self.tick(now);
        }
        self.scheduler.deadline()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn scheduler(&self) -> &UplinkScheduler {
        &self.scheduler
    }

    pub fn reporter(&self) -> &StatusReporter<D> {
        &self.reporter
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    fn tick(&mut self, now: Instant) -> Tick {
        let battery = self.reporter.battery_voltage();
        let tick = self.scheduler.tick(
            now,
            &mut self.radio,
            &self.fixes,
            battery,
            &mut self.counters,
        );

        let clock = self.clock(now);
        self.reporter.report_tick(tick.outcome, clock, &self.counters);
        tick
    }

    fn clock(&self, now: Instant) -> Clock {
        Clock {
            uptime: now,
            gps: self.fixes.latest_fix().time,
        }
    }
}

#[cfg(test)]
mod tests {
    use embassy_time::Duration;

    use super::*;
    use crate::gps::{Fix, FixMailbox};
    use crate::radio::mock::MockRadio;
    use crate::scheduler::TickOutcome;
    use crate::status::mock::MockDisplay;

    fn intervals() -> Intervals {
        Intervals {
            send: Duration::from_secs(60),
            fix_wait: Duration::from_secs(5),
        }
    }

    fn tracker(fixes: &FixMailbox) -> Tracker<MockRadio, &FixMailbox, MockDisplay> {
        let display = MockDisplay {
            battery: Some(4.1),
            ..MockDisplay::default()
        };
        Tracker::new(MockRadio::default(), fixes, display, intervals())
    }

    #[test]
    fn start_begins_join() {
        let fixes = FixMailbox::new();
        let mut tracker = tracker(&fixes);

        tracker.start();

        assert_eq!(tracker.radio().joins, 1);
        assert_eq!(tracker.deadline(), None);
    }

    #[test]
    fn nothing_is_sent_before_join() {
        let fixes = FixMailbox::new();
        fixes.publish(Fix::from_degrees(1.0, 1.0, 1.0, 1.0));
        let mut tracker = tracker(&fixes);

        tracker.start();
        assert_eq!(tracker.poll(Instant::from_secs(1_000)), None);
        assert!(tracker.radio().submitted.is_empty());
    }

    #[test]
    fn joined_sends_right_away() {
        let fixes = FixMailbox::new();
        fixes.publish(Fix::from_degrees(1.0, 1.0, 1.0, 1.0));
        let mut tracker = tracker(&fixes);
        let now = Instant::from_secs(30);

        tracker.start();
        tracker.on_event(MacEvent::Joining, now);
        tracker.on_event(MacEvent::Joined, now);

        assert_eq!(tracker.radio().link_check, [false]);
        assert_eq!(tracker.poll(now), Some(now + Duration::from_secs(60)));
        assert_eq!(tracker.radio().submitted.len(), 1);
        assert_eq!(tracker.counters().sent, 1);
        assert_eq!(tracker.reporter().status()[0], "0:00:30: Sending msg");
    }

    #[test]
    fn poll_before_deadline_does_nothing() {
        let fixes = FixMailbox::new();
        fixes.publish(Fix::from_degrees(1.0, 1.0, 1.0, 1.0));
        let mut tracker = tracker(&fixes);

        tracker.on_event(MacEvent::Joined, Instant::from_secs(0));
        tracker.poll(Instant::from_secs(0));
        let next = tracker.poll(Instant::from_secs(59));

        assert_eq!(next, Some(Instant::from_secs(60)));
        assert_eq!(tracker.radio().submitted.len(), 1);
    }

    #[test]
    fn join_failure_loops_back_into_join() {
        let fixes = FixMailbox::new();
        let mut tracker = tracker(&fixes);

        tracker.start();
        tracker.on_event(MacEvent::JoinFailed, Instant::from_secs(10));
        tracker.on_event(MacEvent::JoinFailed, Instant::from_secs(20));

        assert_eq!(tracker.radio().joins, 3);
        assert!(!tracker.scheduler().is_armed());
    }

    #[test]
    fn full_cycle_with_busy_radio_and_completion() {
        let fixes = FixMailbox::new();
        let mut tracker = tracker(&fixes);
        let t0 = Instant::from_secs(0);

        tracker.on_event(MacEvent::Joined, t0);

        // No fix yet, retry after the short interval
        assert_eq!(tracker.poll(t0), Some(Instant::from_secs(5)));
        assert_eq!(tracker.reporter().status()[0], "0:00:00: Waiting GPS fix");

        let mut fix = Fix::from_degrees(48.1173, 11.516667, 545.4, 0.9);
        fix.time = Some(crate::gps::GpsTime {
            hours: 12,
            minutes: 35,
            seconds: 19,
        });
        fixes.publish(fix);
        let t1 = Instant::from_secs(5);
        assert_eq!(tracker.poll(t1), Some(Instant::from_secs(65)));
        assert_eq!(tracker.reporter().status()[0], "12:35:19: Sending msg");

        // Uplink still in flight when the next tick comes around
        tracker.radio.busy = true;
        let t2 = Instant::from_secs(65);
        assert_eq!(tracker.poll(t2), Some(Instant::from_secs(125)));
        assert!(tracker.scheduler().state().pending);

        tracker.radio.busy = false;
        tracker.on_event(MacEvent::TxComplete { ack: false }, Instant::from_secs(70));

        let counters = tracker.counters();
        assert_eq!((counters.sent, counters.completed, counters.error), (1, 1, 1));
        assert_eq!(tracker.radio().submitted.len(), 1);

        let screen = tracker.reporter().display().screens.last().unwrap();
        assert_eq!(screen.counters.as_str(), "S:1 C:1 E:1");
    }

    #[test]
    fn battery_from_last_redraw_goes_into_uplink() {
        let fixes = FixMailbox::new();
        fixes.publish(Fix::from_degrees(1.0, 1.0, 1.0, 1.0));
        let mut tracker = tracker(&fixes);

        // The Joined event redraws and reads the battery
        tracker.on_event(MacEvent::Joined, Instant::from_secs(0));
        tracker.poll(Instant::from_secs(0));

        let expected = crate::payload::encode(&fixes.latest_fix(), Some(4.1));
        assert_eq!(tracker.radio().submitted[0].1, expected);
    }

    #[test]
    fn tick_outcome_is_reported() {
        let fixes = FixMailbox::new();
        let mut tracker = tracker(&fixes);

        tracker.on_event(MacEvent::Joined, Instant::from_secs(0));
        let tick = tracker.tick(Instant::from_secs(0));

        assert_eq!(tick.outcome, TickOutcome::WaitingForFix);
        assert_eq!(tracker.reporter().display().screens.len(), 2);
    }
}
