use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Default send interval in seconds. Respect the duty cycle!
const DEFAULT_SEND_INTERVAL: u64 = 60;

/// Default retry interval in seconds while waiting for a GPS fix
const DEFAULT_FIX_WAIT_INTERVAL: u64 = 5;

fn main() {
    // LoRaWAN OTAA keys are read from the environment and baked into the binary.
    // EUIs are given LSB first, the app key as printed by the console.
    let dev_eui = hex_key::<8>("TTN_DEV_EUI");
    let app_eui = hex_key::<8>("TTN_APP_EUI");
    let app_key = hex_key::<16>("TTN_APP_KEY");

    let send_interval = seconds("TTN_SEND_INTERVAL", DEFAULT_SEND_INTERVAL);
    let fix_wait_interval = seconds("TTN_FIX_WAIT_INTERVAL", DEFAULT_FIX_WAIT_INTERVAL);

    if fix_wait_interval >= send_interval {
        panic!(
            "TTN_FIX_WAIT_INTERVAL ({fix_wait_interval}s) must be shorter than TTN_SEND_INTERVAL ({send_interval}s)"
        );
    }

    let mut out = String::new();
    writeln!(out, "pub const DEV_EUI: [u8; 8] = {dev_eui:?};").unwrap();
    writeln!(out, "pub const APP_EUI: [u8; 8] = {app_eui:?};").unwrap();
    writeln!(out, "pub const APP_KEY: [u8; 16] = {app_key:?};").unwrap();
    writeln!(out, "pub const SEND_INTERVAL_SECS: u64 = {send_interval};").unwrap();
    writeln!(out, "pub const FIX_WAIT_INTERVAL_SECS: u64 = {fix_wait_interval};").unwrap();

    let out_dir = env::var("OUT_DIR").unwrap();
    fs::write(Path::new(&out_dir).join("secrets.rs"), out).unwrap();

    println!("cargo:rerun-if-env-changed=TTN_DEV_EUI");
    println!("cargo:rerun-if-env-changed=TTN_APP_EUI");
    println!("cargo:rerun-if-env-changed=TTN_APP_KEY");
    println!("cargo:rerun-if-env-changed=TTN_SEND_INTERVAL");
    println!("cargo:rerun-if-env-changed=TTN_FIX_WAIT_INTERVAL");
    println!("cargo:rerun-if-changed=build.rs");

    // Firmware link scripts, the host build of the library needs none
    if env::var_os("CARGO_FEATURE_ESP32C3").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tlinkall.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
}

fn hex_key<const N: usize>(var: &str) -> [u8; N] {
    let Ok(value) = env::var(var) else {
        println!("cargo:warning={var} not set, using all-zero key");
        return [0u8; N];
    };

    // Accept "0011AA..", "00:11:AA" and "00 11 AA" spellings
    let digits: String = value
        .chars()
        .filter(|c| !matches!(c, ':' | ' ' | '-'))
        .collect();

    if digits.len() != N * 2 {
        panic!("{var} must be {} hex bytes, got {:?}", N, value);
    }

    let mut key = [0u8; N];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
            .unwrap_or_else(|_| panic!("{var} is not valid hex: {:?}", value));
    }
    key
}

fn seconds(var: &str, default: u64) -> u64 {
    match env::var(var) {
        Ok(value) => {
            println!("cargo:warning=Using {var} from environment: {value}");
            value
                .trim()
                .parse()
                .unwrap_or_else(|_| panic!("{var} must be a whole number of seconds"))
        }
        Err(_) => default,
    }
}
