//! Drives the full client against a scripted instrument simulator serving
//! the core and abort programs on loopback, including SRQ injection back
//! into the process-wide interrupt server.

use std::{
    collections::VecDeque,
    io::Cursor,
    net::{Ipv4Addr, TcpListener, TcpStream, UdpSocket},
    sync::{mpsc, Arc, Condvar, Mutex},
    thread,
    time::{Duration, Instant},
};

use uuid::Uuid;

use crate::common::{
    onc_rpc::{
        prelude::*,
        record::{read_record, write_record},
        xdr::RpcMessage,
        RECORD_MAXLEN,
    },
    vxi11::{
        xdr::{
            CreateLinkParms, CreateLinkResp, DeviceAddrFamily, DeviceDocmdParms, DeviceDocmdResp,
            DeviceEnableSrqParms, DeviceError, DeviceErrorCode, DeviceGenericParms, DeviceLink,
            DeviceLockParms, DeviceReadParms, DeviceReadResp, DeviceReadStbResp, DeviceRemoteFunc,
            DeviceSrqParms, DeviceWriteParms, DeviceWriteResp, REASON_CHR, REASON_END,
            REASON_REQCNT,
        },
        CREATE_INTR_CHAN, CREATE_LINK, DESTROY_INTR_CHAN, DESTROY_LINK, DEVICE_ABORT,
        DEVICE_CLEAR, DEVICE_DOCMD, DEVICE_ENABLE_SRQ, DEVICE_INTR, DEVICE_INTR_SRQ,
        DEVICE_INTR_VERSION, DEVICE_LOCAL, DEVICE_LOCK, DEVICE_READ, DEVICE_READSTB,
        DEVICE_REMOTE, DEVICE_TRIGGER, DEVICE_UNLOCK, DEVICE_WRITE,
    },
    xdr::prelude::*,
};

use super::{lock, srq_callback, Error, SrqHandler, Vxi11Device};

struct ReadChunk {
    data: Vec<u8>,
    reason: u32,
    error: u32,
}

#[derive(Default)]
struct SimState {
    link_error: u32,
    max_recv_size: u32,
    stb: u8,
    write_ack: Option<u32>,
    write_error: u32,
    writes: Vec<(u32, Vec<u8>)>,
    write_timeouts: Vec<(u32, u32)>,
    reads: VecDeque<ReadChunk>,
    read_parms: Vec<(u32, u8, u32)>,
    lock_parms: Vec<(u32, u32)>,
    docmds: Vec<(i32, u32, Vec<u8>)>,
    docmd_out: Vec<u8>,
    intr: Option<(Ipv4Addr, u16, bool)>,
    srq_enables: Vec<(bool, Vec<u8>)>,
    intr_destroyed: u32,
    block_reads: bool,
}

struct SimCore {
    state: Arc<Mutex<SimState>>,
    abort: Arc<(Mutex<bool>, Condvar)>,
    abort_port: u16,
}

fn device_ok() -> DeviceError {
    DeviceError {
        error: DeviceErrorCode::NoError,
    }
}

impl RpcService for SimCore {
    fn call(
        &self,
        _prog: u32,
        _vers: u32,
        proc: u32,
        args: &mut Cursor<Vec<u8>>,
        ret: &mut Cursor<Vec<u8>>,
    ) -> Result<(), RpcError> {
        match proc {
            CREATE_LINK => {
                let mut parms = CreateLinkParms::default();
                parms.read_xdr(args)?;
                let state = lock(&self.state);
                CreateLinkResp {
                    error: DeviceErrorCode::from_code(state.link_error),
                    lid: DeviceLink(7),
                    abort_port: self.abort_port,
                    max_recv_size: state.max_recv_size,
                }
                .write_xdr(ret)?;
                Ok(())
            }
            DEVICE_WRITE => {
                let mut parms = DeviceWriteParms::default();
                parms.read_xdr(args)?;
                let mut state = lock(&self.state);
                let offered = parms.data.0.len() as u32;
                state.writes.push((parms.flags.0, parms.data.0));
                state
                    .write_timeouts
                    .push((parms.io_timeout, parms.lock_timeout));
                let size = state.write_ack.map_or(offered, |ack| ack.min(offered));
                DeviceWriteResp {
                    error: DeviceErrorCode::from_code(state.write_error),
                    size,
                }
                .write_xdr(ret)?;
                Ok(())
            }
            DEVICE_READ => {
                let mut parms = DeviceReadParms::default();
                parms.read_xdr(args)?;
                let blocking = {
                    let mut state = lock(&self.state);
                    state
                        .read_parms
                        .push((parms.flags.0, parms.term_char, parms.request_size));
                    state.block_reads
                };
                if blocking {
                    // Hang until device_abort arrives on the abort channel
                    let (flag, cvar) = &*self.abort;
                    let guard = lock(flag);
                    let (guard, _timeout) = cvar
                        .wait_timeout_while(guard, Duration::from_secs(10), |aborted| !*aborted)
                        .unwrap();
                    let error = if *guard { 23 } else { 15 };
                    drop(guard);
                    DeviceReadResp {
                        error: DeviceErrorCode::from_code(error),
                        reason: 0,
                        data: Opaque(Vec::new()),
                    }
                    .write_xdr(ret)?;
                    return Ok(());
                }
                let chunk = lock(&self.state).reads.pop_front();
                let resp = match chunk {
                    Some(chunk) => DeviceReadResp {
                        error: DeviceErrorCode::from_code(chunk.error),
                        reason: chunk.reason,
                        data: Opaque(chunk.data),
                    },
                    None => DeviceReadResp {
                        error: DeviceErrorCode::IoTimeout,
                        reason: 0,
                        data: Opaque(Vec::new()),
                    },
                };
                resp.write_xdr(ret)?;
                Ok(())
            }
            DEVICE_READSTB => {
                let mut parms = DeviceGenericParms::default();
                parms.read_xdr(args)?;
                DeviceReadStbResp {
                    error: DeviceErrorCode::NoError,
                    stb: lock(&self.state).stb,
                }
                .write_xdr(ret)?;
                Ok(())
            }
            DEVICE_TRIGGER | DEVICE_CLEAR | DEVICE_REMOTE | DEVICE_LOCAL => {
                let mut parms = DeviceGenericParms::default();
                parms.read_xdr(args)?;
                device_ok().write_xdr(ret)?;
                Ok(())
            }
            DEVICE_LOCK => {
                let mut parms = DeviceLockParms::default();
                parms.read_xdr(args)?;
                lock(&self.state)
                    .lock_parms
                    .push((parms.flags.0, parms.lock_timeout));
                device_ok().write_xdr(ret)?;
                Ok(())
            }
            DEVICE_UNLOCK => {
                let mut lid = DeviceLink::default();
                lid.read_xdr(args)?;
                device_ok().write_xdr(ret)?;
                Ok(())
            }
            DEVICE_ENABLE_SRQ => {
                let mut parms = DeviceEnableSrqParms::default();
                parms.read_xdr(args)?;
                lock(&self.state)
                    .srq_enables
                    .push((parms.enable, parms.handle.0));
                device_ok().write_xdr(ret)?;
                Ok(())
            }
            DEVICE_DOCMD => {
                let mut parms = DeviceDocmdParms::default();
                parms.read_xdr(args)?;
                let mut state = lock(&self.state);
                state
                    .docmds
                    .push((parms.cmd, parms.datasize, parms.data_in.0));
                DeviceDocmdResp {
                    error: DeviceErrorCode::NoError,
                    data_out: Opaque(state.docmd_out.clone()),
                }
                .write_xdr(ret)?;
                Ok(())
            }
            DESTROY_LINK => {
                let mut lid = DeviceLink::default();
                lid.read_xdr(args)?;
                device_ok().write_xdr(ret)?;
                Ok(())
            }
            CREATE_INTR_CHAN => {
                let mut parms = DeviceRemoteFunc::default();
                parms.read_xdr(args)?;
                lock(&self.state).intr = Some((
                    Ipv4Addr::from(parms.host_addr),
                    parms.host_port,
                    parms.prog_family == DeviceAddrFamily::Udp,
                ));
                device_ok().write_xdr(ret)?;
                Ok(())
            }
            DESTROY_INTR_CHAN => {
                lock(&self.state).intr_destroyed += 1;
                device_ok().write_xdr(ret)?;
                Ok(())
            }
            _ => Err(RpcError::ProcUnavail),
        }
    }
}

struct SimAbort {
    abort: Arc<(Mutex<bool>, Condvar)>,
}

impl RpcService for SimAbort {
    fn call(
        &self,
        _prog: u32,
        _vers: u32,
        proc: u32,
        args: &mut Cursor<Vec<u8>>,
        ret: &mut Cursor<Vec<u8>>,
    ) -> Result<(), RpcError> {
        if proc != DEVICE_ABORT {
            return Err(RpcError::ProcUnavail);
        }
        let mut lid = DeviceLink::default();
        lid.read_xdr(args)?;
        let (flag, cvar) = &*self.abort;
        *lock(flag) = true;
        cvar.notify_all();
        device_ok().write_xdr(ret)?;
        Ok(())
    }
}

fn serve_service<S>(listener: TcpListener, service: Arc<S>)
where
    S: RpcService + Send + Sync + 'static,
{
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { return };
            let service = service.clone();
            thread::spawn(move || loop {
                let Ok(record) = read_record(&mut stream, RECORD_MAXLEN) else {
                    return;
                };
                let Ok(reply) = service.handle_message(record) else {
                    return;
                };
                if write_record(&mut stream, reply).is_err() {
                    return;
                }
            });
        }
    });
}

struct Simulator {
    core_port: u16,
    state: Arc<Mutex<SimState>>,
}

impl Simulator {
    fn start(max_recv_size: u32) -> Self {
        let state = Arc::new(Mutex::new(SimState {
            max_recv_size,
            ..Default::default()
        }));
        let abort = Arc::new((Mutex::new(false), Condvar::new()));

        let core_listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let abort_listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let core_port = core_listener.local_addr().unwrap().port();
        let abort_port = abort_listener.local_addr().unwrap().port();

        serve_service(
            core_listener,
            Arc::new(SimCore {
                state: state.clone(),
                abort: abort.clone(),
                abort_port,
            }),
        );
        serve_service(abort_listener, Arc::new(SimAbort { abort }));

        Simulator { core_port, state }
    }

    fn open(&self) -> Vxi11Device {
        let device = Vxi11Device::new();
        device
            .open_with_port("127.0.0.1", self.core_port, None)
            .unwrap();
        device
    }

    fn send_srq_tcp(&self, handle: &[u8]) {
        let (host, port, _) = lock(&self.state).intr.unwrap();
        let mut stream = TcpStream::connect((host, port)).unwrap();
        write_record(&mut stream, srq_call_body(handle)).unwrap();
    }

    fn send_srq_udp(&self, handle: &[u8]) {
        let (host, port, _) = lock(&self.state).intr.unwrap();
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        socket.send_to(&srq_call_body(handle), (host, port)).unwrap();
    }
}

fn srq_call_body(handle: &[u8]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    RpcMessage::call(99, DEVICE_INTR, DEVICE_INTR_VERSION, DEVICE_INTR_SRQ)
        .write_xdr(&mut cursor)
        .unwrap();
    DeviceSrqParms::new(Opaque(handle.to_vec()))
        .write_xdr(&mut cursor)
        .unwrap();
    cursor.into_inner()
}

/// SRQ subsystem state is process-wide; tests touching it take this guard
static SRQ_GUARD: Mutex<()> = Mutex::new(());

#[test]
fn open_close_lifecycle() {
    let sim = Simulator::start(1024);
    let device = Vxi11Device::new();

    assert!(!device.is_open());
    assert!(matches!(device.write(b"x"), Err(Error::NotConnected)));

    device
        .open_with_port("127.0.0.1", sim.core_port, None)
        .unwrap();
    assert!(device.is_open());
    assert_eq!(device.device_addr_label(), "127.0.0.1:inst0");
    assert!(matches!(
        device.open_with_port("127.0.0.1", sim.core_port, None),
        Err(Error::AlreadyOpen)
    ));

    device.close().unwrap();
    assert!(!device.is_open());
    device.close().unwrap();
    assert!(matches!(device.readstb(), Err(Error::NotConnected)));

    device
        .open_with_port("127.0.0.1", sim.core_port, Some("gpib0,5"))
        .unwrap();
    assert_eq!(device.device_addr_label(), "127.0.0.1:gpib0,5");
    assert_eq!(device.device_name().as_deref(), Some("gpib0,5"));
    device.close().unwrap();
}

#[test]
fn open_create_link_error() {
    let sim = Simulator::start(1024);
    lock(&sim.state).link_error = 9;
    let device = Vxi11Device::new();
    let err = device
        .open_with_port("127.0.0.1", sim.core_port, None)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Device(DeviceErrorCode::OutOfResources)
    ));
    assert!(!device.is_open());
}

#[test]
fn write_chunks_with_end_flag_on_last() {
    let sim = Simulator::start(200);
    let device = sim.open();

    device.write(&[0x55; 500]).unwrap();
    {
        let state = lock(&sim.state);
        assert_eq!(state.writes.len(), 3);
        assert_eq!((state.writes[0].0, state.writes[0].1.len()), (0, 200));
        assert_eq!((state.writes[1].0, state.writes[1].1.len()), (0, 200));
        assert_eq!((state.writes[2].0, state.writes[2].1.len()), (8, 100));
    }

    // Empty writes are a successful no-op on the wire
    device.write(b"").unwrap();
    assert_eq!(lock(&sim.state).writes.len(), 3);

    device.close().unwrap();
}

#[test]
fn write_chunk_fallback_when_server_advertises_zero() {
    let sim = Simulator::start(0);
    let device = sim.open();
    device.write(&[1u8; 1500]).unwrap();
    let state = lock(&sim.state);
    assert_eq!(state.writes.len(), 2);
    assert_eq!((state.writes[0].0, state.writes[0].1.len()), (0, 1024));
    assert_eq!((state.writes[1].0, state.writes[1].1.len()), (8, 476));
}

#[test]
fn write_resends_unacknowledged_tail() {
    let sim = Simulator::start(200);
    lock(&sim.state).write_ack = Some(100);
    let device = sim.open();

    let payload: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();
    device.write(&payload).unwrap();

    let state = lock(&sim.state);
    assert_eq!(state.writes.len(), 5);
    // each chunk restarts where the acknowledgement left off
    for (k, (_, data)) in state.writes.iter().enumerate() {
        assert_eq!(data[0], ((k * 100) % 251) as u8);
    }
    assert_eq!(state.writes[2].0, 0);
    assert_eq!(state.writes[3].0, 8);
    assert_eq!(state.writes[4].0, 8);
}

#[test]
fn write_stall_is_an_error() {
    let sim = Simulator::start(1024);
    lock(&sim.state).write_ack = Some(0);
    let device = sim.open();
    assert!(matches!(
        device.write(b"hello"),
        Err(Error::Rpc(RpcError::Io(_)))
    ));
}

#[test]
fn write_device_error() {
    let sim = Simulator::start(1024);
    lock(&sim.state).write_error = 11;
    let device = sim.open();
    let err = device.write(b"hello").unwrap_err();
    assert!(matches!(
        err,
        Error::Device(DeviceErrorCode::DeviceLockedByAnotherLink)
    ));
    assert!(err.to_string().contains("device locked by another link"));
}

#[test]
fn read_collects_until_end_reason() {
    let sim = Simulator::start(1024);
    {
        let mut state = lock(&sim.state);
        state.reads.push_back(ReadChunk {
            data: b"Hello ".to_vec(),
            reason: 0,
            error: 0,
        });
        state.reads.push_back(ReadChunk {
            data: b"World\n".to_vec(),
            reason: REASON_END,
            error: 0,
        });
    }
    let device = sim.open();
    let mut buf = [0u8; 64];
    let n = device.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"Hello World\n");

    // END-only mode: no terminator flag, requestSize tracks remaining space
    let state = lock(&sim.state);
    assert_eq!(state.read_parms.len(), 2);
    assert_eq!(state.read_parms[0], (0, 0, 64));
    assert_eq!(state.read_parms[1], (0, 0, 58));
}

#[test]
fn read_stops_on_termination_character() {
    let sim = Simulator::start(1024);
    lock(&sim.state).reads.push_back(ReadChunk {
        data: b"ABC\n".to_vec(),
        reason: REASON_CHR,
        error: 0,
    });
    let device = sim.open();
    device.set_read_terminator(Some(b'\n')).unwrap();
    let mut buf = [0u8; 16];
    let n = device.read(&mut buf).unwrap();
    assert_eq!(n, 4);
    assert_eq!(&buf[..n], b"ABC\n");

    let state = lock(&sim.state);
    let (flags, term, request) = state.read_parms[0];
    assert_eq!(flags & 0x80, 0x80);
    assert_eq!(term, b'\n');
    assert_eq!(request, 16);
}

#[test]
fn read_buffer_full_before_end() {
    let sim = Simulator::start(1024);
    lock(&sim.state).reads.push_back(ReadChunk {
        data: b"12345678".to_vec(),
        reason: REASON_REQCNT,
        error: 0,
    });
    let device = sim.open();
    let mut buf = [0u8; 8];
    assert!(matches!(device.read(&mut buf), Err(Error::BufferFull(8))));
}

#[test]
fn read_overrun_rejected() {
    let sim = Simulator::start(1024);
    lock(&sim.state).reads.push_back(ReadChunk {
        data: vec![0; 16],
        reason: REASON_END,
        error: 0,
    });
    let device = sim.open();
    let mut buf = [0u8; 8];
    assert!(matches!(device.read(&mut buf), Err(Error::ReadOverrun)));
}

#[test]
fn read_device_error() {
    let sim = Simulator::start(1024);
    lock(&sim.state).reads.push_back(ReadChunk {
        data: b"xx".to_vec(),
        reason: 0,
        error: 15,
    });
    let device = sim.open();
    let mut buf = [0u8; 8];
    assert!(matches!(
        device.read(&mut buf),
        Err(Error::Device(DeviceErrorCode::IoTimeout))
    ));
}

#[test]
fn parameter_validation() {
    let sim = Simulator::start(1024);
    let device = sim.open();

    let mut empty: [u8; 0] = [];
    assert!(matches!(
        device.read(&mut empty),
        Err(Error::InvalidParameter(_))
    ));

    assert!(matches!(
        device.set_read_terminator(Some(200)),
        Err(Error::InvalidParameter(_))
    ));
    device.set_read_terminator(Some(10)).unwrap();
    assert_eq!(device.read_terminator(), Some(10));
    device.set_read_terminator(None).unwrap();
    assert_eq!(device.read_terminator(), None);
}

#[test]
fn readstb_returns_status_byte() {
    let sim = Simulator::start(1024);
    lock(&sim.state).stb = 0x42;
    let device = sim.open();
    assert_eq!(device.readstb().unwrap(), 0x42);
}

#[test]
fn control_operations() {
    let sim = Simulator::start(1024);
    let device = sim.open();
    device.set_timeout(Duration::from_secs(2));
    assert_eq!(device.timeout(), Duration::from_secs(2));

    device.trigger().unwrap();
    device.clear().unwrap();
    device.remote().unwrap();
    device.local().unwrap();
    device.lock().unwrap();
    device.unlock().unwrap();

    // device_lock blocks until the lock is granted, bounded by the timeout
    assert_eq!(lock(&sim.state).lock_parms, vec![(1, 2000)]);
}

#[test]
fn timeouts_ride_in_each_call() {
    let sim = Simulator::start(1024);
    let device = sim.open();
    device.set_timeout(Duration::from_millis(2500));
    device.write(b"hi").unwrap();
    assert_eq!(lock(&sim.state).write_timeouts[0], (2500, 2500));
}

#[test]
fn query_conveniences() {
    let sim = Simulator::start(1024);
    {
        let mut state = lock(&sim.state);
        for response in [
            &b"+3.14159E0\n"[..],
            &b"+21\n"[..],
            &b"KEITHLEY INSTRUMENTS,MODEL DMM6500,04589786,1.7.12b\n"[..],
            &b"oops\n"[..],
        ] {
            state.reads.push_back(ReadChunk {
                data: response.to_vec(),
                reason: REASON_END,
                error: 0,
            });
        }
    }
    let device = sim.open();

    assert!((device.query_f64("MEAS:VOLT:DC?\n").unwrap() - 3.14159).abs() < 1e-12);
    assert_eq!(device.query_i32("*STB?\n").unwrap(), 21);
    assert!(device
        .query_string("*IDN?\n")
        .unwrap()
        .starts_with("KEITHLEY"));
    assert!(matches!(
        device.query_f64("MEAS?\n"),
        Err(Error::ResponseParse(_))
    ));
}

#[test]
fn docmd_family() {
    let sim = Simulator::start(1024);
    lock(&sim.state).docmd_out = 21u16.to_ne_bytes().to_vec();
    let device = sim.open();

    assert_eq!(device.docmd_bus_status(8).unwrap(), 21);
    device.docmd_send_command(b"\x3f").unwrap();
    device.docmd_atn_control(true).unwrap();
    device.docmd_ren_control(false).unwrap();
    device.docmd_pass_control(5).unwrap();
    device.docmd_bus_address(21).unwrap();
    device.docmd_ifc_control().unwrap();

    let state = lock(&sim.state);
    assert_eq!(state.docmds[0], (0x020001, 2, 8u16.to_ne_bytes().to_vec()));
    assert_eq!(state.docmds[1], (0x020000, 1, b"\x3f".to_vec()));
    assert_eq!(
        state.docmds[2],
        (0x020002, 2, 1u16.to_ne_bytes().to_vec())
    );
    assert_eq!(
        state.docmds[3],
        (0x020003, 2, 0u16.to_ne_bytes().to_vec())
    );
    assert_eq!(state.docmds[4], (0x020004, 4, 5u32.to_ne_bytes().to_vec()));
    assert_eq!(
        state.docmds[5],
        (0x02000A, 4, 21u32.to_ne_bytes().to_vec())
    );
    assert_eq!(state.docmds[6], (0x020010, 0, Vec::new()));
}

#[test]
fn abort_unblocks_pending_read() {
    let sim = Simulator::start(1024);
    lock(&sim.state).block_reads = true;
    let device = sim.open();
    device.set_timeout(Duration::from_secs(30));

    let reader = {
        let device = device.clone();
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            device.read(&mut buf)
        })
    };
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    device.abort().unwrap();
    let result = reader.join().unwrap();
    assert!(matches!(
        result,
        Err(Error::Device(DeviceErrorCode::Abort))
    ));
    assert!(started.elapsed() < Duration::from_secs(5));

    lock(&sim.state).block_reads = false;
    device.close().unwrap();
}

#[test]
fn enable_srq_requires_callback() {
    let _guard = lock(&SRQ_GUARD);
    srq_callback(None).unwrap();

    let sim = Simulator::start(1024);
    let device = sim.open();
    assert!(matches!(
        device.enable_srq(true, false),
        Err(Error::SrqCallbackNotSet)
    ));
    device.close().unwrap();
}

#[test]
fn srq_roundtrip() {
    let _guard = lock(&SRQ_GUARD);

    let sim = Simulator::start(1024);
    lock(&sim.state).stb = 0x40;
    let device = sim.open();

    let (tx, rx) = mpsc::channel::<(String, u8)>();
    let tx = Mutex::new(tx);
    let callback: Arc<SrqHandler> = Arc::new(move |dev: Vxi11Device| {
        // Runs on the service thread; core operations must not deadlock here
        let stb = dev.readstb().unwrap();
        let _ = lock(&tx).send((dev.device_addr_label(), stb));
    });
    srq_callback(Some(callback.clone())).unwrap();
    srq_callback(Some(callback.clone())).unwrap(); // same callback: no-op

    device.enable_srq(true, false).unwrap();
    device.enable_srq(true, false).unwrap(); // already enabled: no-op

    let handle = {
        let state = lock(&sim.state);
        assert_eq!(state.srq_enables.len(), 1);
        let (enable, ref handle) = state.srq_enables[0];
        assert!(enable);
        assert_eq!(handle.len(), 16);
        let (_, _, udp) = state.intr.unwrap();
        assert!(!udp);
        handle.clone()
    };

    sim.send_srq_tcp(&handle);
    let (label, stb) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(label, "127.0.0.1:inst0");
    assert_eq!(stb, 0x40);

    // Unknown or malformed handles are logged and dropped
    sim.send_srq_tcp(Uuid::new_v4().as_bytes());
    sim.send_srq_tcp(b"short");
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

    // Switching transports disables, then re-enables over UDP with the
    // same identifier
    device.enable_srq(true, true).unwrap();
    {
        let state = lock(&sim.state);
        assert_eq!(state.intr_destroyed, 1);
        assert_eq!(state.srq_enables.len(), 3);
        assert!(!state.srq_enables[1].0);
        assert!(state.srq_enables[2].0);
        assert_eq!(state.srq_enables[2].1, handle);
        let (_, _, udp) = state.intr.unwrap();
        assert!(udp);
    }
    sim.send_srq_udp(&handle);
    let (label, _) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(label, "127.0.0.1:inst0");

    device.enable_srq(false, false).unwrap();
    assert_eq!(lock(&sim.state).intr_destroyed, 2);

    // A different callback restarts the subsystem; None releases it
    let other: Arc<SrqHandler> = Arc::new(|_| {});
    srq_callback(Some(other)).unwrap();
    srq_callback(None).unwrap();

    device.close().unwrap();
}
