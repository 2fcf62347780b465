//! LoRaWAN adapter on top of `lorawan-device` and an SX1276.
//!
//! The MAC runs in its own task. The tracker only sees [`LorawanHandle`],
//! which hands uplinks over through a single slot channel, and the MAC
//! lifecycle events coming back out of [`EVENTS`].

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice;
use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_sync::{
    blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex},
    channel::Channel,
    signal::Signal,
};
use embassy_time::Delay;
use esp_hal::{
    gpio::{Input, Output},
    rng::Rng,
    spi::master::SpiDmaBus,
    Async,
};
use lora_phy::{
    iv::GenericSx127xInterfaceVariant,
    lorawan_radio::LorawanRadio,
    sx127x::{self, Sx1276, Sx127x},
    LoRa,
};
use lorawan_device::{
    async_device::{region, Device, EmbassyTimer, JoinMode, JoinResponse, SendResponse},
    default_crypto::DefaultFactory,
    AppEui, AppKey, DevEui,
};

use crate::{
    config::Credentials,
    payload::UplinkPayload,
    radio::{MacEvent, RadioAdapter},
    Error,
};

/// The RFM95 PA_BOOST output tops out at 20 dBm, EU868 allows 14 dBm ERP
const MAX_TX_POWER: u8 = 14;

/// Mapper uplinks are never confirmed
const CONFIRMED: bool = false;

struct Uplink {
    port: u8,
    payload: UplinkPayload,
}

static JOIN: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static UPLINKS: Channel<CriticalSectionRawMutex, Uplink, 1> = Channel::new();

/// MAC lifecycle events, consumed by the tracker task
pub static EVENTS: Channel<CriticalSectionRawMutex, MacEvent, 8> = Channel::new();

static BUSY: AtomicBool = AtomicBool::new(false);
static JOINED: AtomicBool = AtomicBool::new(false);

/// Tracker side of the MAC task.
#[derive(Clone, Copy, Default)]
pub struct LorawanHandle;

impl RadioAdapter for LorawanHandle {
    fn is_busy(&self) -> bool {
        BUSY.load(Ordering::Acquire)
    }

    fn submit(&mut self, port: u8, payload: UplinkPayload) -> Result<(), Error> {
        if !JOINED.load(Ordering::Acquire) {
            return Err(Error::NotJoined);
        }
        if BUSY.swap(true, Ordering::AcqRel) {
            return Err(Error::RadioBusy);
        }

        UPLINKS.try_send(Uplink { port, payload }).map_err(|_| {
            BUSY.store(false, Ordering::Release);
            Error::RadioBusy
        })
    }

    fn begin_join(&mut self) {
        JOINED.store(false, Ordering::Release);
        JOIN.signal(());
    }

    /// lorawan-device never sends LinkCheckReq on its own, so link check
    /// validation is always off and there is nothing to switch.
    fn set_link_check(&mut self, enabled: bool) {
        if enabled {
            log_warn!("Link check validation is not supported");
        }
    }
}

type RadioSpi = SpiDevice<'static, NoopRawMutex, SpiDmaBus<'static, Async>, Output<'static>>;
type RadioInterface = GenericSx127xInterfaceVariant<Output<'static>, Input<'static>>;
type Radio = LorawanRadio<Sx127x<RadioSpi, RadioInterface, Sx1276>, Delay, MAX_TX_POWER>;
type Mac = Device<Radio, DefaultFactory, EmbassyTimer, Rng>;

#[task]
pub async fn run(
    spi: RadioSpi,
    irq: Input<'static>,
    reset: Output<'static>,
    rng: Rng,
    credentials: Credentials,
) -> ! {
    // The RFM95 is an SX1276 with only the PA_BOOST pin wired
    let config = sx127x::Config {
        chip: Sx1276,
        tcxo_used: false,
        tx_boost: true,
        rx_boost: false,
    };

    let interface_variant = match GenericSx127xInterfaceVariant::new(reset, irq, None, None) {
        Ok(iv) => iv,
        Err(err) => panic!("Radio interface setup: {:?}", err),
    };

    // Public network sync word
    let lora = match LoRa::new(Sx127x::new(spi, interface_variant, config), true, Delay).await {
        Ok(lora) => lora,
        Err(err) => panic!("Radio init: {:?}", err),
    };

    let radio: Radio = lora.into();
    let region = region::Configuration::new(region::Region::EU868);
    let mut device: Mac = Device::new(region, radio, EmbassyTimer::new(), rng);

    log_info!("LoRaWAN MAC ready");

    loop {
        match select(JOIN.wait(), UPLINKS.receive()).await {
            Either::First(()) => join(&mut device, &credentials).await,
            Either::Second(uplink) => send(&mut device, uplink).await,
        }
    }
}

async fn join(device: &mut Mac, credentials: &Credentials) {
    EVENTS.send(MacEvent::Joining).await;

    let mode = JoinMode::OTAA {
        deveui: DevEui::from(credentials.dev_eui),
        appeui: AppEui::from(credentials.app_eui),
        appkey: AppKey::from(credentials.app_key),
    };

    let event = match device.join(&mode).await {
        Ok(JoinResponse::JoinSuccess) => {
            JOINED.store(true, Ordering::Release);
            MacEvent::Joined
        }
        Ok(JoinResponse::NoJoinAccept) => MacEvent::JoinFailed,
        Err(err) => {
            log_error!("Join: {}: {:?}", Error::Radio, defmt::Debug2Format(&err));
            MacEvent::JoinFailed
        }
    };

    EVENTS.send(event).await;
}

async fn send(device: &mut Mac, uplink: Uplink) {
    // Queued before a re-join started, the new session would reject it anyway
    if !JOINED.load(Ordering::Acquire) {
        BUSY.store(false, Ordering::Release);
        return;
    }

    let result = device.send(&uplink.payload, uplink.port, CONFIRMED).await;
    BUSY.store(false, Ordering::Release);

    // A class A downlink is part of the uplink cycle, it is not reported on its own
    match result {
        Ok(SendResponse::DownlinkReceived(fcnt)) => {
            if let Some(downlink) = device.take_downlink() {
                log_info!("Downlink {} on port {}: {} bytes", fcnt, downlink.fport, downlink.data.len());
            }
            EVENTS.send(MacEvent::tx_complete(CONFIRMED, true)).await;
        }
        Ok(SendResponse::NoAck) | Ok(SendResponse::RxComplete) => {
            EVENTS.send(MacEvent::tx_complete(CONFIRMED, false)).await;
        }
        Ok(SendResponse::SessionExpired) => {
            log_warn!("Session expired, joining again");
            JOINED.store(false, Ordering::Release);
            EVENTS.send(MacEvent::Reset).await;
            JOIN.signal(());
        }
        Err(err) => {
            log_error!("Uplink: {}: {:?}", Error::Radio, defmt::Debug2Format(&err));
            EVENTS.send(MacEvent::LinkDead).await;
        }
    }
}
