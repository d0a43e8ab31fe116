//! VXI-11 client: device handles over the core, abort and interrupt channels.
//!
//! A [Vxi11Device] owns one core-channel link to one device. All core-channel
//! calls in the process are serialized through a single lock; the abort
//! channel and the interrupt dispatcher stay outside it so that a blocked
//! call can be cancelled and an SRQ callback can talk to its device.

use std::{
    fmt,
    io::ErrorKind,
    net::{Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use uuid::Uuid;

use crate::common::{
    onc_rpc::prelude::*,
    vxi11::{
        xdr::{
            CreateLinkParms, CreateLinkResp, DeviceDocmdParms, DeviceDocmdResp,
            DeviceEnableSrqParms, DeviceError, DeviceErrorCode, DeviceFlags, DeviceGenericParms,
            DeviceLink, DeviceLockParms, DeviceReadParms, DeviceReadResp, DeviceReadStbResp,
            DeviceWriteParms, DeviceWriteResp, REASON_CHR, REASON_END,
        },
        CREATE_LINK, DESTROY_INTR_CHAN, DESTROY_LINK, DEVICE_ABORT, DEVICE_ASYNC,
        DEVICE_ASYNC_VERSION, DEVICE_CLEAR, DEVICE_CORE, DEVICE_CORE_VERSION, DEVICE_DOCMD,
        DEVICE_ENABLE_SRQ, DEVICE_LOCAL, DEVICE_LOCK, DEVICE_READ, DEVICE_READSTB, DEVICE_REMOTE,
        DEVICE_TRIGGER, DEVICE_UNLOCK, DEVICE_WRITE, DOCMD_ATN_CONTROL, DOCMD_BUS_ADDRESS,
        DOCMD_BUS_STATUS, DOCMD_IFC_CONTROL, DOCMD_PASS_CONTROL, DOCMD_REN_CONTROL,
        DOCMD_SEND_COMMAND,
    },
    xdr::prelude::*,
};

use self::portmapper::{PortMapperClient, PORTMAPPER_PORT, PORTMAPPER_PROT_TCP};

mod portmapper;
pub(crate) mod srq;

#[cfg(test)]
mod tests;

pub use srq::{srq_callback, SrqHandler};

/// Device name used when none is given, VXI-11.3 rule B.1.2
const DEFAULT_DEVICE_NAME: &str = "inst0";

/// Write chunk size when the server advertises maxRecvSize 0
const FALLBACK_RECV_SIZE: usize = 1024;

/// Response buffer for the query conveniences
const QUERY_READ_MAX: usize = 256;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport call timeout while the link is being set up
const RPC_CREATE_TIMEOUT: Duration = Duration::from_secs(25);

/// Transport call timeout on an established core channel; generous so that
/// the in-call io_timeout governs, not the socket
const RPC_CORE_TIMEOUT: Duration = Duration::from_secs(120);

/// Serializes every core-channel call in the process. The underlying RPC
/// stack of this protocol's era is not safe for concurrent calls even on
/// distinct clients, so the scope is process-wide rather than per-handle.
/// The abort channel and the SRQ dispatcher must never take it.
static CORE_LOCK: Mutex<()> = Mutex::new(());

static LOG_ERR_ENA: AtomicBool = AtomicBool::new(true);

/// Enable or disable the process-wide error description lines.
pub fn log_err_ena(enable: bool) {
    LOG_ERR_ENA.store(enable, Ordering::Relaxed);
}

pub fn log_err_is_ena() -> bool {
    LOG_ERR_ENA.load(Ordering::Relaxed)
}

pub(crate) fn report_err(args: fmt::Arguments) {
    if log_err_is_ena() {
        log::error!("{}", args);
    }
}

/// Mutex acquisition that outlives a panicked peer
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation on a handle without an open link
    #[error("not connected")]
    NotConnected,
    /// `open` on a handle that already owns a link
    #[error("connection already open")]
    AlreadyOpen,
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// The address did not resolve to an IPv4 address
    #[error("could not resolve {0} to an IPv4 address")]
    AddressResolution(String),
    /// `enable_srq` before a callback was installed
    #[error("no SRQ callback installed")]
    SrqCallbackNotSet,
    /// The read buffer filled up before an END indicator or termination
    /// character arrived
    #[error("read buffer full with {0} bytes before reaching END indicator")]
    BufferFull(usize),
    /// The device returned more bytes than requested
    #[error("read returned more bytes than requested")]
    ReadOverrun,
    /// A query response did not parse as the requested type
    #[error("could not parse response {0:?}")]
    ResponseParse(String),
    /// Nonzero VXI-11 error code from the device
    #[error("device error {0}")]
    Device(DeviceErrorCode),
    /// Transport failure: no response, socket error, portmap failure
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Rpc(RpcError::Io(err))
    }
}

#[derive(Debug, Clone)]
struct Identity {
    address: String,
    device: String,
}

impl Identity {
    fn label(&self) -> String {
        format!("{}:{}", self.address, self.device)
    }
}

/// Everything `create_link` told us, kept outside the core-client mutex so
/// the abort path can reach it while a core call is blocked.
#[derive(Debug, Clone, Copy)]
struct LinkInfo {
    lid: DeviceLink,
    abort_port: u16,
    max_recv_size: u32,
    host: Ipv4Addr,
}

struct Config {
    timeout: Duration,
    read_terminator: Option<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            read_terminator: None,
        }
    }
}

#[derive(Default)]
pub(crate) struct SrqState {
    pub(crate) enabled: bool,
    pub(crate) over_udp: bool,
}

pub(crate) struct DeviceInner {
    /// Stable identity echoed back by the device in `device_intr_srq`;
    /// never regenerated so that late interrupts across disable/re-enable
    /// cycles still resolve.
    pub(crate) srq_id: Uuid,
    identity: Mutex<Option<Identity>>,
    config: Mutex<Config>,
    link: Mutex<Option<LinkInfo>>,
    core: Mutex<Option<StreamRpcClient<TcpStream>>>,
    abort: Mutex<Option<StreamRpcClient<TcpStream>>>,
    pub(crate) srq: Mutex<SrqState>,
}

/// Handle to one VXI-11 device.
///
/// Cheap to clone; clones share the link. Safe to use from multiple threads:
/// core-channel operations serialize process-wide, `abort` runs outside that
/// serialization so it can cancel a call blocked in another thread.
#[derive(Clone)]
pub struct Vxi11Device {
    inner: Arc<DeviceInner>,
}

impl Default for Vxi11Device {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Vxi11Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vxi11Device")
            .field("label", &self.device_addr_label())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Vxi11Device {
    /// New handle without a connection; use [open](Self::open) to connect.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                srq_id: Uuid::new_v4(),
                identity: Mutex::new(None),
                config: Mutex::new(Config::default()),
                link: Mutex::new(None),
                core: Mutex::new(None),
                abort: Mutex::new(None),
                srq: Mutex::new(SrqState::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<DeviceInner>) -> Self {
        Self { inner }
    }

    /// Open a connection to `device` at `address`.
    ///
    /// `address` is a host name or dotted-quad IP. `device` identifies the
    /// instrument at the remote controller: `None` means `"inst0"` (a
    /// directly connected instrument); GPIB/LAN gateways use `"gpibN"` or
    /// `"gpibN,A"` with A the primary bus address. The core channel port is
    /// looked up through the portmapper at `address`.
    pub fn open(&self, address: &str, device: Option<&str>) -> Result<()> {
        self.open_inner(address, None, device)
    }

    /// Like [open](Self::open) but dials `core_port` directly instead of
    /// asking the portmapper.
    pub fn open_with_port(&self, address: &str, core_port: u16, device: Option<&str>) -> Result<()> {
        self.open_inner(address, Some(core_port), device)
    }

    fn open_inner(&self, address: &str, core_port: Option<u16>, device: Option<&str>) -> Result<()> {
        let device = device.unwrap_or(DEFAULT_DEVICE_NAME);
        let timeout_ms = self.timeout_ms();

        let mut link_guard = lock(&self.inner.link);
        if link_guard.is_some() {
            report_err(format_args!("Vxi11 open error: connection already open"));
            return Err(Error::AlreadyOpen);
        }

        let host = resolve_ipv4(address)?;

        let core_port = match core_port {
            Some(port) => port,
            None => {
                let mut portmap = PortMapperClient::connect_tcp(
                    SocketAddr::from((host, PORTMAPPER_PORT)),
                    CONNECT_TIMEOUT,
                )
                .map_err(|err| {
                    report_err(format_args!("Vxi11 open error: portmapper: {}", err));
                    Error::from(err)
                })?;
                portmap
                    .getport(DEVICE_CORE, DEVICE_CORE_VERSION, PORTMAPPER_PROT_TCP)
                    .map_err(|err| {
                        report_err(format_args!("Vxi11 open error: portmapper: {}", err));
                        Error::from(err)
                    })?
            }
        };
        log::debug!("Core channel of {} @ port {}", address, core_port);

        let stream = TcpStream::connect_timeout(&SocketAddr::from((host, core_port)), CONNECT_TIMEOUT)
            .map_err(|err| {
                report_err(format_args!("Vxi11 open error: client creation: {}", err));
                Error::from(err)
            })?;
        stream.set_read_timeout(Some(RPC_CREATE_TIMEOUT))?;
        stream.set_write_timeout(Some(RPC_CREATE_TIMEOUT))?;
        let mut core = StreamRpcClient::new(stream, DEVICE_CORE, DEVICE_CORE_VERSION);

        let parms = CreateLinkParms {
            client_id: std::process::id() as i32,
            lock_device: false,
            lock_timeout: timeout_ms,
            device: device.to_string(),
        };
        let _serial = lock(&CORE_LOCK);
        let resp: CreateLinkResp = core.call(CREATE_LINK, parms).map_err(|err| {
            report_err(format_args!("Vxi11 open error: link creation: {}", err));
            Error::Rpc(err)
        })?;
        if resp.error != DeviceErrorCode::NoError {
            report_err(format_args!("Vxi11 open error: create_link error {}", resp.error));
            return Err(Error::Device(resp.error));
        }

        // Raise the transport timeout for slow devices now that the link is up
        core.get_ref().set_read_timeout(Some(RPC_CORE_TIMEOUT))?;
        core.get_ref().set_write_timeout(Some(RPC_CORE_TIMEOUT))?;

        *lock(&self.inner.identity) = Some(Identity {
            address: address.to_string(),
            device: device.to_string(),
        });
        *lock(&self.inner.core) = Some(core);
        *link_guard = Some(LinkInfo {
            lid: resp.lid,
            abort_port: resp.abort_port,
            max_recv_size: resp.max_recv_size,
            host,
        });
        Ok(())
    }

    /// Close the connection. A no-op returning success on a closed handle.
    ///
    /// Teardown is best-effort in order: SRQ registration, link, abort
    /// client, core client. The first failure is reported but does not stop
    /// the remaining steps.
    pub fn close(&self) -> Result<()> {
        if lock(&self.inner.srq).enabled {
            if let Err(err) = self.enable_srq(false, false) {
                report_err(format_args!("Vxi11 close error: disable srq: {}", err));
            }
            lock(&self.inner.srq).enabled = false;
        }

        let mut link_guard = lock(&self.inner.link);
        let Some(info) = link_guard.take() else {
            return Ok(());
        };
        let core = lock(&self.inner.core).take();
        let abort = lock(&self.inner.abort).take();

        let mut result = Ok(());
        if let Some(mut core) = core {
            let _serial = lock(&CORE_LOCK);
            match core.call::<_, DeviceError>(DESTROY_LINK, info.lid) {
                Ok(resp) if resp.error != DeviceErrorCode::NoError => {
                    report_err(format_args!(
                        "Vxi11 close error: destroy_link error {}",
                        resp.error
                    ));
                    result = Err(Error::Device(resp.error));
                }
                Ok(_) => {}
                Err(err) => {
                    report_err(format_args!("Vxi11 close error: {}", err));
                    result = Err(Error::Rpc(err));
                }
            }
        }
        drop(abort);
        result
    }

    /// Whether this handle currently owns an open link
    pub fn is_open(&self) -> bool {
        lock(&self.inner.link).is_some()
    }

    /// Set the I/O and lock timeout for subsequent operations
    pub fn set_timeout(&self, timeout: Duration) {
        lock(&self.inner.config).timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        lock(&self.inner.config).timeout
    }

    /// Set the read termination character. `None` stops on the END
    /// indicator only; `Some(c)` with a 7-bit `c` stops on END or `c`.
    pub fn set_read_terminator(&self, term: Option<u8>) -> Result<()> {
        if let Some(c) = term {
            if c > 0x7F {
                report_err(format_args!("Vxi11 error: termination character {} is not 7-bit", c));
                return Err(Error::InvalidParameter("termination character must be 7-bit"));
            }
        }
        lock(&self.inner.config).read_terminator = term;
        Ok(())
    }

    pub fn read_terminator(&self) -> Option<u8> {
        lock(&self.inner.config).read_terminator
    }

    /// `address:device` label identifying this handle, e.g. in an SRQ
    /// callback serving several instruments. Empty before the first `open`.
    pub fn device_addr_label(&self) -> String {
        lock(&self.inner.identity)
            .as_ref()
            .map(Identity::label)
            .unwrap_or_default()
    }

    /// Address given to the last `open`
    pub fn address(&self) -> Option<String> {
        lock(&self.inner.identity).as_ref().map(|i| i.address.clone())
    }

    /// Device name given to the last `open` (after defaulting)
    pub fn device_name(&self) -> Option<String> {
        lock(&self.inner.identity).as_ref().map(|i| i.device.clone())
    }

    fn link_info(&self) -> Result<LinkInfo> {
        (*lock(&self.inner.link)).ok_or(Error::NotConnected)
    }

    fn timeout_ms(&self) -> u32 {
        lock(&self.inner.config)
            .timeout
            .as_millis()
            .min(u32::MAX as u128) as u32
    }

    /// One core-channel RPC. Caller holds [CORE_LOCK].
    pub(crate) fn core_call<ARGS, RET>(&self, proc: u32, args: ARGS) -> Result<RET>
    where
        ARGS: XdrEncode,
        RET: XdrDecode + Default,
    {
        let mut guard = lock(&self.inner.core);
        let core = guard.as_mut().ok_or(Error::NotConnected)?;
        core.call(proc, args).map_err(Error::Rpc)
    }

    /// Write `data` to the device.
    ///
    /// Sent in chunks of at most the link's maxRecvSize; the final chunk
    /// carries the END flag. The device may acknowledge fewer bytes than
    /// offered, in which case the remainder is re-sent.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let info = self.link_info()?;
        if data.is_empty() {
            return Ok(());
        }
        let timeout_ms = self.timeout_ms();
        let chunk_max = if info.max_recv_size == 0 {
            FALLBACK_RECV_SIZE
        } else {
            info.max_recv_size as usize
        };

        let _serial = lock(&CORE_LOCK);
        let mut sent = 0;
        while sent < data.len() {
            let remaining = data.len() - sent;
            let (len, flags) = if remaining <= chunk_max {
                (remaining, DeviceFlags::END)
            } else {
                (chunk_max, DeviceFlags(0))
            };
            let parms = DeviceWriteParms {
                lid: info.lid,
                io_timeout: timeout_ms,
                lock_timeout: timeout_ms,
                flags,
                data: Opaque(data[sent..sent + len].to_vec()),
            };
            let resp: DeviceWriteResp = self.core_call(DEVICE_WRITE, parms).map_err(|err| {
                report_err(format_args!("Vxi11 write error: {}", err));
                err
            })?;
            if resp.error != DeviceErrorCode::NoError {
                report_err(format_args!("Vxi11 write error: {}", resp.error));
                return Err(Error::Device(resp.error));
            }
            if resp.size == 0 {
                report_err(format_args!("Vxi11 write error: device accepted no data"));
                return Err(Error::Rpc(RpcError::Io(ErrorKind::WriteZero.into())));
            }
            sent += (resp.size as usize).min(len);
        }
        Ok(())
    }

    /// Write a string to the device
    pub fn write_str(&self, s: &str) -> Result<()> {
        self.write(s.as_bytes())
    }

    /// Write formatted text to the device; usable through the `write!` macro.
    pub fn write_fmt(&self, args: fmt::Arguments) -> Result<()> {
        self.write(args.to_string().as_bytes())
    }

    /// Read from the device into `buf` until an END indicator or, if a
    /// terminator is configured, the termination character. Returns the
    /// number of bytes copied.
    ///
    /// The buffer filling up before a stop condition is an error, as is a
    /// device response larger than requested.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let info = self.link_info()?;
        if buf.is_empty() {
            report_err(format_args!("Vxi11 read error: invalid parameters"));
            return Err(Error::InvalidParameter("empty read buffer"));
        }
        let (timeout_ms, term) = {
            let config = lock(&self.inner.config);
            (
                config.timeout.as_millis().min(u32::MAX as u128) as u32,
                config.read_terminator,
            )
        };
        let (flags, term_char) = match term {
            None => (DeviceFlags(0), 0),
            Some(c) => (DeviceFlags::TERMCHRSET, c),
        };

        let _serial = lock(&CORE_LOCK);
        let mut count = 0;
        loop {
            let parms = DeviceReadParms {
                lid: info.lid,
                request_size: (buf.len() - count) as u32,
                io_timeout: timeout_ms,
                lock_timeout: timeout_ms,
                flags,
                term_char,
            };
            let resp: DeviceReadResp = self.core_call(DEVICE_READ, parms).map_err(|err| {
                report_err(format_args!("Vxi11 read error: {}", err));
                err
            })?;

            // Data is copied before the error check; a failing read may
            // still carry bytes
            let data = resp.data.0;
            if !data.is_empty() {
                if count + data.len() > buf.len() {
                    report_err(format_args!("Vxi11 read error: read more bytes than expected"));
                    return Err(Error::ReadOverrun);
                }
                buf[count..count + data.len()].copy_from_slice(&data);
                count += data.len();
            }

            if resp.error != DeviceErrorCode::NoError {
                report_err(format_args!("Vxi11 read error: {}", resp.error));
                return Err(Error::Device(resp.error));
            }

            // Stop on END or a matched termination character; REQCNT alone
            // means the device has more to say
            if resp.reason & (REASON_CHR | REASON_END) != 0 {
                return Ok(count);
            }
            if count == buf.len() {
                report_err(format_args!(
                    "Vxi11 read error: read buffer full with {} bytes before reaching END indicator",
                    count
                ));
                return Err(Error::BufferFull(count));
            }
        }
    }

    /// Send `query` and read back a string response
    pub fn query_string(&self, query: &str) -> Result<String> {
        self.write(query.as_bytes())?;
        let mut buf = [0u8; QUERY_READ_MAX];
        let n = self.read(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    /// Send `query` and parse the response as a double
    pub fn query_f64(&self, query: &str) -> Result<f64> {
        let s = self.query_string(query)?;
        s.trim()
            .parse()
            .map_err(|_| Error::ResponseParse(s))
    }

    /// Send `query` and parse the response as an integer
    pub fn query_i32(&self, query: &str) -> Result<i32> {
        let s = self.query_string(query)?;
        s.trim()
            .parse()
            .map_err(|_| Error::ResponseParse(s))
    }

    /// Read the status byte (serial poll)
    pub fn readstb(&self) -> Result<u8> {
        let info = self.link_info()?;
        let timeout_ms = self.timeout_ms();
        let parms = DeviceGenericParms {
            lid: info.lid,
            flags: DeviceFlags(0),
            lock_timeout: timeout_ms,
            io_timeout: timeout_ms,
        };
        let _serial = lock(&CORE_LOCK);
        let resp: DeviceReadStbResp = self.core_call(DEVICE_READSTB, parms).map_err(|err| {
            report_err(format_args!("Vxi11 readstb error: {}", err));
            err
        })?;
        if resp.error != DeviceErrorCode::NoError {
            report_err(format_args!("Vxi11 readstb error: {}", resp.error));
            return Err(Error::Device(resp.error));
        }
        Ok(resp.stb)
    }

    fn generic_call(&self, proc: u32, name: &'static str) -> Result<()> {
        let info = self.link_info()?;
        let timeout_ms = self.timeout_ms();
        let parms = DeviceGenericParms {
            lid: info.lid,
            flags: DeviceFlags(0),
            lock_timeout: timeout_ms,
            io_timeout: timeout_ms,
        };
        let _serial = lock(&CORE_LOCK);
        let resp: DeviceError = self.core_call(proc, parms).map_err(|err| {
            report_err(format_args!("Vxi11 {} error: {}", name, err));
            err
        })?;
        if resp.error != DeviceErrorCode::NoError {
            report_err(format_args!("Vxi11 {} error: {}", name, resp.error));
            return Err(Error::Device(resp.error));
        }
        Ok(())
    }

    /// Send a group execute trigger (GET)
    pub fn trigger(&self) -> Result<()> {
        self.generic_call(DEVICE_TRIGGER, "trigger")
    }

    /// Send a device clear
    pub fn clear(&self) -> Result<()> {
        self.generic_call(DEVICE_CLEAR, "clear")
    }

    /// Place the device in remote state
    pub fn remote(&self) -> Result<()> {
        self.generic_call(DEVICE_REMOTE, "remote")
    }

    /// Place the device in local state
    pub fn local(&self) -> Result<()> {
        self.generic_call(DEVICE_LOCAL, "local")
    }

    /// Lock the device for exclusive access, waiting up to the configured
    /// timeout for a lock held by another link
    pub fn lock(&self) -> Result<()> {
        let info = self.link_info()?;
        let parms = DeviceLockParms {
            lid: info.lid,
            flags: DeviceFlags::WAITLOCK,
            lock_timeout: self.timeout_ms(),
        };
        let _serial = lock(&CORE_LOCK);
        let resp: DeviceError = self.core_call(DEVICE_LOCK, parms).map_err(|err| {
            report_err(format_args!("Vxi11 lock error: {}", err));
            err
        })?;
        if resp.error != DeviceErrorCode::NoError {
            report_err(format_args!("Vxi11 lock error: {}", resp.error));
            return Err(Error::Device(resp.error));
        }
        Ok(())
    }

    /// Release the lock acquired by [lock](Self::lock)
    pub fn unlock(&self) -> Result<()> {
        let info = self.link_info()?;
        let _serial = lock(&CORE_LOCK);
        let resp: DeviceError = self.core_call(DEVICE_UNLOCK, info.lid).map_err(|err| {
            report_err(format_args!("Vxi11 unlock error: {}", err));
            err
        })?;
        if resp.error != DeviceErrorCode::NoError {
            report_err(format_args!("Vxi11 unlock error: {}", resp.error));
            return Err(Error::Device(resp.error));
        }
        Ok(())
    }

    /// Abort the core-channel operation currently in flight on this link.
    ///
    /// Runs on the abort channel, outside the core-call serialization, so it
    /// can be issued from a second thread while the first is blocked; the
    /// blocked call then returns with device error 23.
    pub fn abort(&self) -> Result<()> {
        let info = self.link_info()?;
        let mut guard = lock(&self.inner.abort);
        if guard.is_none() {
            let addr = SocketAddr::from((info.host, info.abort_port));
            let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(|err| {
                report_err(format_args!("Vxi11 abort error: client creation: {}", err));
                Error::from(err)
            })?;
            stream.set_read_timeout(Some(RPC_CREATE_TIMEOUT))?;
            stream.set_write_timeout(Some(RPC_CREATE_TIMEOUT))?;
            *guard = Some(StreamRpcClient::new(
                stream,
                DEVICE_ASYNC,
                DEVICE_ASYNC_VERSION,
            ));
        }
        let client = guard.as_mut().ok_or(Error::NotConnected)?;
        let resp: DeviceError = client.call(DEVICE_ABORT, info.lid).map_err(|err| {
            report_err(format_args!("Vxi11 abort error: {}", err));
            Error::Rpc(err)
        })?;
        if resp.error != DeviceErrorCode::NoError {
            report_err(format_args!("Vxi11 abort error: {}", resp.error));
            return Err(Error::Device(resp.error));
        }
        Ok(())
    }

    fn docmd(
        &self,
        cmd: i32,
        datasize: u32,
        data_in: Vec<u8>,
        name: &'static str,
    ) -> Result<Vec<u8>> {
        let info = self.link_info()?;
        let timeout_ms = self.timeout_ms();
        let parms = DeviceDocmdParms {
            lid: info.lid,
            flags: DeviceFlags(0),
            io_timeout: timeout_ms,
            lock_timeout: timeout_ms,
            cmd,
            network_order: false,
            datasize,
            data_in: Opaque(data_in),
        };
        let _serial = lock(&CORE_LOCK);
        let resp: DeviceDocmdResp = self.core_call(DEVICE_DOCMD, parms).map_err(|err| {
            report_err(format_args!("Vxi11 {} error: {}", name, err));
            err
        })?;
        if resp.error != DeviceErrorCode::NoError {
            report_err(format_args!("Vxi11 {} error: {}", name, resp.error));
            return Err(Error::Device(resp.error));
        }
        Ok(resp.data_out.0)
    }

    /// Send raw GPIB command bytes on the gateway's bus
    pub fn docmd_send_command(&self, data: &[u8]) -> Result<()> {
        self.docmd(DOCMD_SEND_COMMAND, 1, data.to_vec(), "send_command")
            .map(|_| ())
    }

    /// Query one of the gateway's bus status values (REN, SRQ, NDAC, bus
    /// address, ...); `kind` selects which
    pub fn docmd_bus_status(&self, kind: u16) -> Result<u16> {
        let out = self.docmd(DOCMD_BUS_STATUS, 2, kind.to_ne_bytes().to_vec(), "bus_status")?;
        if out.len() < 2 {
            report_err(format_args!("Vxi11 bus_status error: short response"));
            return Err(Error::Rpc(RpcError::Io(ErrorKind::InvalidData.into())));
        }
        Ok(u16::from_ne_bytes([out[0], out[1]]))
    }

    /// Assert or deassert the ATN line
    pub fn docmd_atn_control(&self, assert: bool) -> Result<()> {
        self.docmd(
            DOCMD_ATN_CONTROL,
            2,
            (assert as u16).to_ne_bytes().to_vec(),
            "atn_control",
        )
        .map(|_| ())
    }

    /// Assert or deassert the REN line
    pub fn docmd_ren_control(&self, assert: bool) -> Result<()> {
        self.docmd(
            DOCMD_REN_CONTROL,
            2,
            (assert as u16).to_ne_bytes().to_vec(),
            "ren_control",
        )
        .map(|_| ())
    }

    /// Pass bus control to the device at `addr`
    pub fn docmd_pass_control(&self, addr: u32) -> Result<()> {
        self.docmd(
            DOCMD_PASS_CONTROL,
            4,
            addr.to_ne_bytes().to_vec(),
            "pass_control",
        )
        .map(|_| ())
    }

    /// Set the gateway's own bus address
    pub fn docmd_bus_address(&self, addr: u32) -> Result<()> {
        self.docmd(
            DOCMD_BUS_ADDRESS,
            4,
            addr.to_ne_bytes().to_vec(),
            "bus_address",
        )
        .map(|_| ())
    }

    /// Pulse the IFC line
    pub fn docmd_ifc_control(&self) -> Result<()> {
        self.docmd(DOCMD_IFC_CONTROL, 0, Vec::new(), "ifc_control")
            .map(|_| ())
    }
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        // Last handle clone going away; no other thread can reach this
        // device anymore
        let Some(info) = lock(&self.link).take() else {
            srq::unregister(&self.srq_id);
            return;
        };
        let Some(mut core) = lock(&self.core).take() else {
            srq::unregister(&self.srq_id);
            return;
        };
        let _serial = lock(&CORE_LOCK);
        if lock(&self.srq).enabled {
            let handle = Opaque(self.srq_id.as_bytes().to_vec());
            let parms = DeviceEnableSrqParms {
                lid: info.lid,
                enable: false,
                handle,
            };
            let _ = core.call::<_, DeviceError>(DEVICE_ENABLE_SRQ, parms);
            let _ = core.call::<_, DeviceError>(DESTROY_INTR_CHAN, ());
        }
        if let Err(err) = core.call::<_, DeviceError>(DESTROY_LINK, info.lid) {
            report_err(format_args!("Vxi11 close error: {}", err));
        }
        srq::unregister(&self.srq_id);
    }
}

fn resolve_ipv4(address: &str) -> Result<Ipv4Addr> {
    let addrs = (address, 0u16).to_socket_addrs().map_err(|err| {
        report_err(format_args!("Vxi11 open error: resolving {}: {}", address, err));
        Error::AddressResolution(address.to_string())
    })?;
    for addr in addrs {
        if let SocketAddr::V4(v4) = addr {
            return Ok(*v4.ip());
        }
    }
    report_err(format_args!("Vxi11 open error: no IPv4 address for {}", address));
    Err(Error::AddressResolution(address.to_string()))
}
