//! Interrupt (SRQ) subsystem.
//!
//! VXI-11 reverses the roles for service requests: the client hosts an RPC
//! server for the interrupt program and the device calls in. ONC-RPC service
//! state is process-wide, so one server and one user callback serve every
//! handle; handles participate through a registry of identifiers carried in
//! the 40-byte `device_intr_srq` handle field.

use std::{
    io::{Cursor, ErrorKind},
    net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, Weak,
    },
    thread,
    time::Duration,
};

use uuid::Uuid;

use crate::common::{
    onc_rpc::{prelude::*, record::read_record, RECORD_MAXLEN},
    vxi11::{
        xdr::{
            DeviceAddrFamily, DeviceEnableSrqParms, DeviceError, DeviceErrorCode, DeviceRemoteFunc,
            DeviceSrqParms,
        },
        CREATE_INTR_CHAN, DESTROY_INTR_CHAN, DEVICE_ENABLE_SRQ, DEVICE_INTR, DEVICE_INTR_SRQ,
        DEVICE_INTR_VERSION,
    },
    xdr::prelude::*,
};

use super::{
    lock,
    portmapper::{PortMapperClient, PORTMAPPER_PORT},
    report_err, DeviceInner, Error, Result, Vxi11Device, CORE_LOCK,
};

/// Callback invoked from the SRQ service thread with the originating handle
pub type SrqHandler = dyn Fn(Vxi11Device) + Send + Sync;

/// Accept/datagram poll interval of the service loop
const SERVICE_POLL: Duration = Duration::from_millis(20);

/// Stop-flag check interval of per-peer record readers
const PEER_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Best-effort talking to a local rpcbind
const STALE_PMAP_TIMEOUT: Duration = Duration::from_millis(250);

/// Largest UDP call message the interrupt program produces
const DATAGRAM_MAXLEN: usize = 1500;

struct SrqShared {
    stop: AtomicBool,
    callback: Arc<SrqHandler>,
}

struct SrqServer {
    callback: Arc<SrqHandler>,
    shared: Arc<SrqShared>,
    tcp_port: u16,
    udp_port: u16,
    thread: Option<thread::JoinHandle<()>>,
}

/// Transports, service thread and callback slot; all three exist together
/// or not at all
static SRQ_SERVER: Mutex<Option<SrqServer>> = Mutex::new(None);

/// Maps the identifier bytes a device echoes back to the handle that
/// registered them. Entries are weak; a late interrupt for a dropped handle
/// is logged and dropped.
static REGISTRY: Mutex<Vec<(Uuid, Weak<DeviceInner>)>> = Mutex::new(Vec::new());

pub(crate) fn register(id: Uuid, inner: &Arc<DeviceInner>) {
    let mut registry = lock(&REGISTRY);
    registry.retain(|(_, weak)| weak.strong_count() > 0);
    if let Some(entry) = registry.iter_mut().find(|(rid, _)| *rid == id) {
        entry.1 = Arc::downgrade(inner);
    } else {
        registry.push((id, Arc::downgrade(inner)));
    }
}

pub(crate) fn unregister(id: &Uuid) {
    lock(&REGISTRY).retain(|(rid, _)| rid != id);
}

fn lookup(id: &Uuid) -> Option<Arc<DeviceInner>> {
    lock(&REGISTRY)
        .iter()
        .find(|(rid, _)| rid == id)
        .and_then(|(_, weak)| weak.upgrade())
}

/// Install, replace or remove the process-wide SRQ callback.
///
/// Installing starts the interrupt RPC server on OS-assigned TCP and UDP
/// ports and its service thread. Passing the currently installed callback
/// again is a no-op; a different callback (or `None`) first stops the
/// service thread and tears the transports down. `None` leaves the SRQ
/// subsystem released.
pub fn srq_callback(callback: Option<Arc<SrqHandler>>) -> Result<()> {
    let mut server = lock(&SRQ_SERVER);

    if let (Some(current), Some(new)) = (server.as_ref(), callback.as_ref()) {
        if Arc::ptr_eq(&current.callback, new) {
            return Ok(());
        }
    }

    if let Some(mut current) = server.take() {
        current.shared.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = current.thread.take() {
            if handle.join().is_err() {
                report_err(format_args!("Vxi11 srq error: service thread panicked"));
            }
        }
    }

    let Some(callback) = callback else {
        return Ok(());
    };

    // A mapping left behind by a crashed predecessor confuses devices that
    // consult rpcbind; clearing it is best-effort
    clear_stale_portmap();

    let tcp = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    tcp.set_nonblocking(true)?;
    let udp = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    udp.set_nonblocking(true)?;
    let tcp_port = tcp.local_addr()?.port();
    let udp_port = udp.local_addr()?.port();
    log::debug!("SRQ service listening on tcp:{} udp:{}", tcp_port, udp_port);

    let shared = Arc::new(SrqShared {
        stop: AtomicBool::new(false),
        callback: callback.clone(),
    });
    let thread = thread::Builder::new().name("vxi11-srq".to_string()).spawn({
        let shared = shared.clone();
        move || serve(tcp, udp, shared)
    })?;

    *server = Some(SrqServer {
        callback,
        shared,
        tcp_port,
        udp_port,
        thread: Some(thread),
    });
    Ok(())
}

fn clear_stale_portmap() {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, PORTMAPPER_PORT));
    match PortMapperClient::connect_tcp(addr, STALE_PMAP_TIMEOUT) {
        Ok(mut pmap) => {
            if let Err(err) = pmap.unset(DEVICE_INTR, DEVICE_INTR_VERSION) {
                log::debug!("Portmap unset: {}", err);
            }
        }
        Err(err) => log::debug!("No local portmapper: {}", err),
    }
}

fn serve(listener: TcpListener, udp: UdpSocket, shared: Arc<SrqShared>) {
    let mut buf = vec![0u8; DATAGRAM_MAXLEN];
    while !shared.stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                log::debug!("Accepted from: {}", peer);
                let shared = shared.clone();
                let spawned = thread::Builder::new()
                    .name("vxi11-srq-peer".to_string())
                    .spawn(move || serve_stream(stream, shared));
                if let Err(err) = spawned {
                    log::warn!("Listening error: {}", err);
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => log::warn!("Listening error: {}", err),
        }
        match udp.recv_from(&mut buf) {
            Ok((n, _peer)) => {
                // The interrupt program is one-way; the reply is discarded
                if let Err(err) = shared.handle_message(buf[..n].to_vec()) {
                    log::debug!("Error processing datagram: {}", err);
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => log::warn!("Listening error: {}", err),
        }
        thread::sleep(SERVICE_POLL);
    }
    log::debug!("SRQ service stopped");
}

fn serve_stream(mut stream: TcpStream, shared: Arc<SrqShared>) {
    if stream.set_read_timeout(Some(PEER_READ_TIMEOUT)).is_err() {
        return;
    }
    loop {
        if shared.stop.load(Ordering::SeqCst) {
            return;
        }
        match read_record(&mut stream, RECORD_MAXLEN) {
            Ok(record) => {
                if let Err(err) = shared.handle_message(record) {
                    log::debug!("Error processing client: {}", err);
                    return;
                }
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => {
                if err.kind() != ErrorKind::UnexpectedEof {
                    log::debug!("Error processing client: {}", err);
                }
                return;
            }
        }
    }
}

impl SrqShared {
    fn dispatch(&self, handle: &[u8]) {
        let Ok(id) = Uuid::from_slice(handle) else {
            log::warn!(
                "device_intr_srq with unexpected handle length {}, dropped",
                handle.len()
            );
            return;
        };
        match lookup(&id) {
            // Must not hold any lock here: the callback will typically call
            // readstb/clear/write, which take the core-call lock
            Some(inner) => (self.callback)(Vxi11Device::from_inner(inner)),
            None => log::warn!("device_intr_srq for unknown handle {}, dropped", id),
        }
    }
}

impl RpcService for SrqShared {
    fn call(
        &self,
        prog: u32,
        vers: u32,
        proc: u32,
        args: &mut Cursor<Vec<u8>>,
        ret: &mut Cursor<Vec<u8>>,
    ) -> std::result::Result<(), RpcError> {
        if prog != DEVICE_INTR {
            return Err(RpcError::ProgUnavail);
        }
        if vers != DEVICE_INTR_VERSION {
            return Err(RpcError::ProgMissmatch(MissmatchInfo {
                low: DEVICE_INTR_VERSION,
                high: DEVICE_INTR_VERSION,
            }));
        }
        match proc {
            0 => Ok(()),
            DEVICE_INTR_SRQ => {
                let mut parms = DeviceSrqParms::default();
                parms.read_xdr(args)?;
                self.dispatch(&parms.handle.0);
                ().write_xdr(ret)?;
                Ok(())
            }
            _ => Err(RpcError::ProcUnavail),
        }
    }
}

impl Vxi11Device {
    /// Enable or disable service-request delivery for this link.
    ///
    /// Requires a process-wide callback installed through [srq_callback].
    /// Enabling tells the device to open an interrupt channel back to this
    /// process (TCP, or UDP when `udp` is set) and hands it this handle's
    /// identifier. Re-enabling with the other transport first tears the
    /// existing channel down. Already being in the requested state is a
    /// no-op.
    pub fn enable_srq(&self, enable: bool, udp: bool) -> Result<()> {
        let info = self.link_info()?;
        let mut srq = lock(&self.inner.srq);

        if srq.enabled == enable && (!enable || srq.over_udp == udp) {
            return Ok(());
        }

        let (host_port, family) = {
            let server = lock(&SRQ_SERVER);
            let Some(server) = server.as_ref() else {
                report_err(format_args!("Vxi11 srq error: no callback installed"));
                return Err(Error::SrqCallbackNotSet);
            };
            if udp {
                (server.udp_port, DeviceAddrFamily::Udp)
            } else {
                (server.tcp_port, DeviceAddrFamily::Tcp)
            }
        };

        let handle = Opaque(self.inner.srq_id.as_bytes().to_vec());
        let _serial = lock(&CORE_LOCK);

        if srq.enabled {
            // Disable, also the first half of a transport switch
            let parms = DeviceEnableSrqParms {
                lid: info.lid,
                enable: false,
                handle: handle.clone(),
            };
            let resp: DeviceError = self.core_call(DEVICE_ENABLE_SRQ, parms).map_err(|err| {
                report_err(format_args!("Vxi11 srq error: {}", err));
                err
            })?;
            if resp.error != DeviceErrorCode::NoError {
                report_err(format_args!("Vxi11 srq error: {}", resp.error));
                return Err(Error::Device(resp.error));
            }
            let resp: DeviceError = self.core_call(DESTROY_INTR_CHAN, ()).map_err(|err| {
                report_err(format_args!("Vxi11 srq error: {}", err));
                err
            })?;
            if resp.error != DeviceErrorCode::NoError {
                report_err(format_args!("Vxi11 srq error: {}", resp.error));
                return Err(Error::Device(resp.error));
            }
            srq.enabled = false;
        }
        if !enable {
            return Ok(());
        }

        // The identifier must resolve for as long as the device may echo it
        register(self.inner.srq_id, &self.inner);

        let host_addr = local_ipv4_toward(info.host)?;
        let parms = DeviceRemoteFunc {
            host_addr: u32::from(host_addr),
            host_port,
            prog_num: DEVICE_INTR,
            prog_vers: DEVICE_INTR_VERSION,
            prog_family: family,
        };
        let resp: DeviceError = self.core_call(CREATE_INTR_CHAN, parms).map_err(|err| {
            report_err(format_args!("Vxi11 srq error: create_intr_chan: {}", err));
            err
        })?;
        if resp.error != DeviceErrorCode::NoError {
            report_err(format_args!(
                "Vxi11 srq error: create_intr_chan error {}",
                resp.error
            ));
            return Err(Error::Device(resp.error));
        }

        let parms = DeviceEnableSrqParms {
            lid: info.lid,
            enable: true,
            handle,
        };
        let enabled = self.core_call::<_, DeviceError>(DEVICE_ENABLE_SRQ, parms);
        match enabled {
            Ok(resp) if resp.error == DeviceErrorCode::NoError => {
                srq.enabled = true;
                srq.over_udp = udp;
                Ok(())
            }
            failed => {
                // Do not leave the device with a dangling interrupt channel
                let _ = self.core_call::<_, DeviceError>(DESTROY_INTR_CHAN, ());
                match failed {
                    Ok(resp) => {
                        report_err(format_args!(
                            "Vxi11 srq error: device_enable_srq error {}",
                            resp.error
                        ));
                        Err(Error::Device(resp.error))
                    }
                    Err(err) => {
                        report_err(format_args!("Vxi11 srq error: device_enable_srq: {}", err));
                        Err(err)
                    }
                }
            }
        }
    }
}

/// Local IPv4 the instrument can reach us back on: the source address of
/// the route toward it. No traffic is sent by connecting a UDP socket.
fn local_ipv4_toward(host: Ipv4Addr) -> Result<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect((host, PORTMAPPER_PORT))?;
    match socket.local_addr()? {
        SocketAddr::V4(v4) => Ok(*v4.ip()),
        addr => {
            report_err(format_args!("Vxi11 srq error: no local IPv4 ({})", addr));
            Err(Error::AddressResolution(host.to_string()))
        }
    }
}
