use std::{sync::Arc, thread, time::Duration};

use vxi11_client::{srq_callback, Vxi11Device};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1".to_string());

    srq_callback(Some(Arc::new(|device: Vxi11Device| {
        match device.readstb() {
            Ok(stb) => println!("SRQ from {}: stb={:#04x}", device.device_addr_label(), stb),
            Err(err) => eprintln!("SRQ from {}: {}", device.device_addr_label(), err),
        }
    })))?;

    let device = Vxi11Device::new();
    device.open(&address, None)?;
    device.enable_srq(true, false)?;

    // Ask for an SRQ on any event, then wait for interrupts
    device.write_str("*SRE 255\n")?;
    println!("Waiting for service requests from {}...", address);
    thread::sleep(Duration::from_secs(60));

    device.enable_srq(false, false)?;
    device.close()?;
    srq_callback(None)?;
    Ok(())
}
