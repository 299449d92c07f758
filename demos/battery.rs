use ds4_battery::{
    decode, select_mode, Backend, BatteryEncoding, HidBackend, Transport, TransportMode,
    BATTERY_FEATURE_REPORT_ID, INPUT_REPORT_REQUEST, PRODUCT_ID, REPORT_LEN, VENDOR_ID,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// One-shot battery read, no scheduling.
fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("debug"))?,
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut backend = HidBackend::new();
    backend.init()?;
    let mut device = backend.open(VENDOR_ID, PRODUCT_ID)?;

    device.write_report(&INPUT_REPORT_REQUEST)?;
    let mut buf = [0u8; REPORT_LEN];
    let len = device.read(&mut buf, 1000)?;

    let encoding = BatteryEncoding::EightLevel;
    let reading = match select_mode(len) {
        TransportMode::Wired => decode(&buf[..len], TransportMode::Wired, encoding)?,
        TransportMode::Wireless => {
            device.send_feature_report(&[BATTERY_FEATURE_REPORT_ID])?;
            let mut feature = [0u8; REPORT_LEN];
            feature[0] = BATTERY_FEATURE_REPORT_ID;
            let len = device.get_feature_report(&mut feature)?;
            decode(&feature[..len.min(REPORT_LEN)], TransportMode::Wireless, encoding)?
        }
    };

    println!("Battery: {}%", reading.percentage);
    println!("Level: {}", reading.raw_level);
    println!("Status: {}", reading.charging);
    Ok(())
}
