//! Human readable diagnostics.
//!
//! The screen has four text lines:
//!
//! ```text
//! S:12 C:11 E:1          <- counters
//! 12:35:19: Evt          <- status line 1
//! TX Complete            <- status line 2
//! Up 1:02:03 Bt 3.71V    <- footer
//! ```
//!
//! Every event and every tick replaces both status lines and forces a full
//! redraw, so what is on screen always matches the counters.

use core::fmt::Write;

use embassy_time::Instant;
use heapless::String;

use crate::{
    gps::GpsTime,
    radio::{MacEvent, RadioAdapter},
    scheduler::TickOutcome,
};

pub const LINE_LEN: usize = 32;

pub type Line = String<LINE_LEN>;

/// Running totals since boot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counters {
    /// Uplinks handed to the radio
    pub sent: u32,
    /// Uplinks whose TX/RX windows finished
    pub completed: u32,
    /// Ticks skipped because the previous uplink was still pending
    pub error: u32,
}

impl Counters {
    pub fn add_sent(&mut self) {
        self.sent = self.sent.saturating_add(1);
    }

    pub fn add_complete(&mut self) {
        self.completed = self.completed.saturating_add(1);
    }

    pub fn add_error(&mut self) {
        self.error = self.error.saturating_add(1);
    }
}

/// Everything that ends up on the display.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Screen {
    pub counters: Line,
    pub status: [Line; 2],
    pub footer: Line,
}

/// Display collaborator. Pixel pushing and the bus transfer live behind it.
pub trait StatusDisplay {
    /// Redraw the whole screen
    fn draw(&mut self, screen: &Screen);

    /// Fresh battery reading, if the board has one
    fn battery_voltage(&mut self) -> Option<f32>;
}

/// Time shown in front of status lines: GPS time once the receiver reports
/// one, uptime before that.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    pub uptime: Instant,
    pub gps: Option<GpsTime>,
}

impl Clock {
    pub fn stamp(&self) -> Line {
        let mut line = Line::new();
        match self.gps {
            Some(time) => {
                let _ = write!(line, "{:02}:{:02}:{:02}", time.hours, time.minutes, time.seconds);
            }
            None => write_hms(&mut line, self.uptime),
        }
        line
    }
}

/// `h:mm:ss`
fn write_hms(line: &mut Line, at: Instant) {
    let total = at.as_secs();
    let (h, m, s) = (total / 3600, (total / 60) % 60, total % 60);
    let _ = write!(line, "{}:{:02}:{:02}", h, m, s);
}

/// What the tracker has to do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Nothing,
    /// The network accepted us, start the uplink job
    StartUplinks,
}

pub struct StatusReporter<D> {
    display: D,
    status: [Line; 2],
    battery: Option<f32>,
}

impl<D: StatusDisplay> StatusReporter<D> {
    pub fn new(display: D) -> Self {
        Self {
            display,
            status: [Line::new(), Line::new()],
            battery: None,
        }
    }

    /// Show what the last scheduler tick did.
    pub fn report_tick(&mut self, outcome: TickOutcome, clock: Clock, counters: &Counters) {
        let (first, second) = match outcome {
            TickOutcome::RadioBusy => ("Prv not sent", "Waiting..."),
            TickOutcome::WaitingForFix => ("Waiting GPS fix", ""),
            TickOutcome::Sent => ("Sending msg", ""),
        };

        let mut line = clock.stamp();
        let _ = write!(line, ": {}", first);
        self.set_status(line, second);
        self.redraw(clock, counters);
    }

    /// Translate a MAC event into status text and counters.
    ///
    /// A failed join is retried right away.
    pub fn on_event<R: RadioAdapter>(
        &mut self,
        event: MacEvent,
        clock: Clock,
        counters: &mut Counters,
        radio: &mut R,
    ) -> EventOutcome {
        let mut outcome = EventOutcome::Nothing;

        match event {
            MacEvent::Joined => {
                // Link check validation is switched on during join, TTN does not support it
                radio.set_link_check(false);
                outcome = EventOutcome::StartUplinks;
            }
            MacEvent::JoinFailed => {
                log_warn!("Join failed, retrying");
                radio.begin_join();
            }
            MacEvent::TxComplete { .. } => counters.add_complete(),
            MacEvent::Unknown(code) => log_warn!("Unknown MAC event {}", code),
            MacEvent::ScanTimeout
            | MacEvent::BeaconFound
            | MacEvent::BeaconMissed
            | MacEvent::BeaconTracked
            | MacEvent::Joining
            | MacEvent::RejoinFailed
            | MacEvent::LostSync
            | MacEvent::Reset
            | MacEvent::RxComplete
            | MacEvent::LinkDead
            | MacEvent::LinkAlive => {}
        }

        let mut line = clock.stamp();
        let _ = line.push_str(": Evt");
        self.set_status(line, &event_text(event));
        self.redraw(clock, counters);

        outcome
    }

    /// Current status lines
    pub fn status(&self) -> [&str; 2] {
        [self.status[0].as_str(), self.status[1].as_str()]
    }

    /// Battery voltage read during the last redraw
    pub fn battery_voltage(&self) -> Option<f32> {
        self.battery
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn set_status(&mut self, first: Line, second: &str) {
        self.status[0] = first;
        self.status[1].clear();
        let _ = self.status[1].push_str(second);
    }

    fn redraw(&mut self, clock: Clock, counters: &Counters) {
        self.battery = self.display.battery_voltage();

        let mut screen = Screen {
            status: self.status.clone(),
            ..Screen::default()
        };

        let _ = write!(
            screen.counters,
            "S:{} C:{} E:{}",
            counters.sent, counters.completed, counters.error
        );

        let _ = screen.footer.push_str("Up ");
        write_hms(&mut screen.footer, clock.uptime);
        if let Some(volts) = self.battery {
            let _ = write!(screen.footer, " Bt {:.2}V", volts);
        }

        self.display.draw(&screen);
    }
}

fn event_text(event: MacEvent) -> Line {
    let mut text = Line::new();
    let _ = text.push_str(event.label());
    if let MacEvent::TxComplete { ack: true } = event {
        let _ = text.push_str(" - Received ack");
    }
    text
}
