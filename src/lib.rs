//! Client library for the VXI-11 TCP/IP instrument protocol.
//!
//! Talks to LAN instruments and GPIB/LAN gateways over the three VXI-11
//! ONC-RPC programs: the core channel for device operations, the abort
//! channel for out-of-band cancellation, and the interrupt channel on which
//! this process hosts an RPC server so devices can push service requests
//! back.
//!
//! ```no_run
//! use vxi11_client::Vxi11Device;
//!
//! # fn main() -> vxi11_client::Result<()> {
//! let dmm = Vxi11Device::new();
//! dmm.open("dmm6500", None)?;
//! dmm.write_str("*IDN?\n")?;
//! let mut buf = [0u8; 1024];
//! let n = dmm.read(&mut buf)?;
//! println!("ID = {}", String::from_utf8_lossy(&buf[..n]));
//! dmm.close()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub(crate) mod common;

pub use client::{
    log_err_ena, log_err_is_ena, srq_callback, Error, Result, SrqHandler, Vxi11Device,
};
pub use common::onc_rpc::RpcError;
pub use common::vxi11::xdr::DeviceErrorCode;
pub use common::vxi11::{
    DEVICE_ASYNC, DEVICE_ASYNC_VERSION, DEVICE_CORE, DEVICE_CORE_VERSION, DEVICE_INTR,
    DEVICE_INTR_VERSION,
};
