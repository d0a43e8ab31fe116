use std::time::Duration;

use vxi11_client::Vxi11Device;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1".to_string());

    let device = Vxi11Device::new();
    device.set_timeout(Duration::from_secs(5));
    device.open(&address, None)?;

    let idn = device.query_string("*IDN?\n")?;
    println!("{} -> {}", device.device_addr_label(), idn.trim_end());

    device.close()?;
    Ok(())
}
