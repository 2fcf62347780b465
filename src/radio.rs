use crate::{payload::UplinkPayload, Error};

/// Lifecycle events reported by the LoRaWAN MAC.
///
/// We look at more events than needed, to track potential issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacEvent {
    ScanTimeout,
    BeaconFound,
    BeaconMissed,
    BeaconTracked,
    Joining,
    Joined,
    JoinFailed,
    RejoinFailed,
    /// The uplink and its receive windows are done
    TxComplete { ack: bool },
    LostSync,
    Reset,
    /// Data received in a receive window or ping slot
    RxComplete,
    LinkDead,
    LinkAlive,
    /// Anything the MAC emits that we have no name for
    Unknown(u8),
}

impl MacEvent {
    /// End of an uplink cycle. Only a confirmed uplink that got a downlink
    /// counts as acknowledged.
    pub const fn tx_complete(confirmed: bool, downlink: bool) -> Self {
        MacEvent::TxComplete {
            ack: confirmed && downlink,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            MacEvent::ScanTimeout => "Scan Timeout",
            MacEvent::BeaconFound => "Beacon Found",
            MacEvent::BeaconMissed => "Beacon Missed",
            MacEvent::BeaconTracked => "Beacon Tracked",
            MacEvent::Joining => "Joining",
            MacEvent::Joined => "Joined",
            MacEvent::JoinFailed => "Join Failed",
            MacEvent::RejoinFailed => "Rejoin Failed",
            MacEvent::TxComplete { .. } => "TX Complete",
            MacEvent::LostSync => "Lost Sync",
            MacEvent::Reset => "Reset",
            MacEvent::RxComplete => "RX Complete",
            MacEvent::LinkDead => "Link Dead",
            MacEvent::LinkAlive => "Link Alive",
            MacEvent::Unknown(_) => "Unknown event",
        }
    }
}

/// The part of a LoRaWAN stack the tracker talks to.
///
/// Join, sessions, duty cycle and retransmissions all happen behind this
/// trait. Implementations report back through [`MacEvent`]s.
pub trait RadioAdapter {
    /// An uplink is queued or its TX/RX windows are still open
    fn is_busy(&self) -> bool;

    /// Queue `payload` for the next legal transmit opportunity. The adapter
    /// owns the buffer from here on.
    fn submit(&mut self, port: u8, payload: UplinkPayload) -> Result<(), Error>;

    /// Reset the MAC state and start (re-)joining. Session and pending data
    /// transfers are discarded.
    fn begin_join(&mut self);

    fn set_link_check(&mut self, enabled: bool);
}

impl<T: RadioAdapter + ?Sized> RadioAdapter for &mut T {
    fn is_busy(&self) -> bool {
        (**self).is_busy()
    }

    fn submit(&mut self, port: u8, payload: UplinkPayload) -> Result<(), Error> {
        (**self).submit(port, payload)
    }

    fn begin_join(&mut self) {
        (**self).begin_join()
    }

    fn set_link_check(&mut self, enabled: bool) {
        (**self).set_link_check(enabled)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    /// Records everything the tracker asks of the radio.
    #[derive(Default)]
    pub struct MockRadio {
        pub busy: bool,
        pub refuse_submit: bool,
        pub submitted: Vec<(u8, UplinkPayload)>,
        pub joins: usize,
        pub link_check: Vec<bool>,
    }

    impl RadioAdapter for MockRadio {
        fn is_busy(&self) -> bool {
            self.busy
        }

        fn submit(&mut self, port: u8, payload: UplinkPayload) -> Result<(), Error> {
            if self.refuse_submit {
                return Err(Error::RadioBusy);
            }
            self.submitted.push((port, payload));
            Ok(())
        }

        fn begin_join(&mut self) {
            self.joins += 1;
        }

        fn set_link_check(&mut self, enabled: bool) {
            self.link_check.push(enabled);
        }
    }
}
