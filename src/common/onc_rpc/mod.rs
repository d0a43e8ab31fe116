//! Minimal ONC-RPC v2 plumbing over blocking sockets.
//!
//! Covers the narrow subset the three VXI-11 programs need: AUTH_NONE
//! credentials, TCP record marking, and a service dispatcher for the
//! reverse (interrupt) channel. Call timeouts are the socket read/write
//! timeouts configured by the channel owner.

use std::io::{Cursor, Error, ErrorKind, Read, Write};

use self::record::{read_record, write_record};

pub(crate) mod record;
pub(crate) mod xdr;

pub(crate) mod prelude {
    pub(crate) use super::xdr::{AuthStat, MissmatchInfo};
    pub(crate) use super::{RpcError, RpcService, StreamRpcClient};
}

use self::prelude::*;
use crate::common::xdr::prelude::*;

/// Largest RPC record accepted from the peer
pub(crate) const RECORD_MAXLEN: usize = 1024 * 1024;

/// An error which occured during an RPC call
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Program not available
    #[error("program unavailable")]
    ProgUnavail,
    /// Program version not available (see accepted version low-high in [MissmatchInfo])
    #[error("program version mismatch (supported {}..{})", .0.low, .0.high)]
    ProgMissmatch(MissmatchInfo),
    /// Procedure not available
    #[error("procedure unavailable")]
    ProcUnavail,
    /// Arguments have too many or too few bytes to deserialize
    #[error("garbage arguments")]
    GarbageArgs,
    /// Internal error
    #[error("system error")]
    SystemErr,
    /// RPC version not supported
    #[error("rpc version mismatch (supported {}..{})", .0.low, .0.high)]
    RpcMissmatch(MissmatchInfo),
    /// Error during RPC authentication
    #[error("authentication error: {0:?}")]
    AuthError(AuthStat),
    /// Portmapper has no mapping for the requested program
    #[error("program not registered with portmapper")]
    Portmap,
    /// (De-)serialization error on RPC channel
    #[error("no RPC response: {0}")]
    Io(#[from] Error),
}

/// Client end of one RPC program/version over a stream transport.
///
/// Carries the transaction id; one in-flight call at a time.
pub(crate) struct StreamRpcClient<IO> {
    xid: u32,
    prog: u32,
    vers: u32,
    io: IO,
}

impl<IO> StreamRpcClient<IO> {
    pub(crate) fn new(io: IO, prog: u32, vers: u32) -> Self {
        Self {
            xid: 0,
            io,
            prog,
            vers,
        }
    }

    pub(crate) fn get_ref(&self) -> &IO {
        &self.io
    }
}

impl<IO> StreamRpcClient<IO>
where
    IO: Read + Write,
{
    /// Call procedure `proc` with arguments of type `ARGS`. Returns `Ok(RET)` if successful.
    pub(crate) fn call<ARGS, RET>(&mut self, proc: u32, args: ARGS) -> Result<RET, RpcError>
    where
        ARGS: XdrEncode,
        RET: XdrDecode + Default,
    {
        self.xid += 1;

        let mut args_cursor = Cursor::new(Vec::new());

        // Send a call
        let msg = xdr::RpcMessage::call(self.xid, self.prog, self.vers, proc);
        msg.write_xdr(&mut args_cursor)?;
        args.write_xdr(&mut args_cursor)?;
        write_record(&mut self.io, args_cursor.into_inner())?;

        // Read response
        let fragment = read_record(&mut self.io, RECORD_MAXLEN)?;
        let mut ret_cursor = Cursor::new(fragment);

        // Deserialize and parse response
        let mut reply = xdr::RpcMessage::default();
        let mut ret: RET = Default::default();
        reply.read_xdr(&mut ret_cursor)?;
        match reply {
            xdr::RpcMessage {
                mtype:
                    xdr::MsgType::Reply(xdr::Replybody {
                        stat: xdr::ReplyStat::Accepted(accepted),
                    }),
                xid: _,
            } => match accepted.stat {
                xdr::AcceptStat::Success => {
                    ret.read_xdr(&mut ret_cursor)?;
                    Ok(ret)
                }
                xdr::AcceptStat::ProgUnavail => Err(RpcError::ProgUnavail),
                xdr::AcceptStat::ProgMissmatch(m) => Err(RpcError::ProgMissmatch(m)),
                xdr::AcceptStat::ProcUnavail => Err(RpcError::ProcUnavail),
                xdr::AcceptStat::GarbageArgs => Err(RpcError::GarbageArgs),
                xdr::AcceptStat::SystemErr => Err(RpcError::SystemErr),
            },
            xdr::RpcMessage {
                mtype:
                    xdr::MsgType::Reply(xdr::Replybody {
                        stat: xdr::ReplyStat::Denied(xdr::RejectedReply { stat }),
                    }),
                ..
            } => match stat {
                xdr::RejectStat::RpcMissmatch(m) => Err(RpcError::RpcMissmatch(m)),
                xdr::RejectStat::AuthError(err) => Err(RpcError::AuthError(err)),
            },
            xdr::RpcMessage {
                mtype: xdr::MsgType::Call(..),
                ..
            } => Err(RpcError::Io(ErrorKind::InvalidData.into())),
        }
    }
}

/// Server side of one or more RPC programs.
///
/// `handle_message` decodes one call record, hands the arguments to
/// [RpcService::call] and encodes the reply. One-way transports run it
/// and discard the reply bytes.
pub(crate) trait RpcService {
    fn call(
        &self,
        prog: u32,
        vers: u32,
        proc: u32,
        args: &mut Cursor<Vec<u8>>,
        ret: &mut Cursor<Vec<u8>>,
    ) -> Result<(), RpcError>;

    fn handle_message(&self, data_in: Vec<u8>) -> Result<Vec<u8>, Error> {
        let mut ret = Cursor::new(Vec::new());
        let mut data_in = Cursor::new(data_in);
        let mut msg = xdr::RpcMessage::default();
        msg.read_xdr(&mut data_in)?;
        log::trace!("-> {:?}", msg);

        let xid = msg.xid;

        let stat = if let xdr::MsgType::Call(call) = msg.mtype {
            if call.rpc_vers != 2 {
                log::debug!("Bad RPC version: {}", call.rpc_vers);
                xdr::ReplyStat::Denied(xdr::RejectedReply {
                    stat: xdr::RejectStat::RpcMissmatch(MissmatchInfo { low: 2, high: 2 }),
                })
            } else if call.cred.flavour != xdr::AuthFlavour::None {
                log::debug!("Unknown Cred flavour: {:?}", call.cred.flavour);
                xdr::ReplyStat::Denied(xdr::RejectedReply {
                    stat: xdr::RejectStat::AuthError(AuthStat::RejectedCred),
                })
            } else if call.verf.flavour != xdr::AuthFlavour::None {
                log::debug!("Unknown Verf flavour: {:?}", call.verf.flavour);
                xdr::ReplyStat::Denied(xdr::RejectedReply {
                    stat: xdr::RejectStat::AuthError(AuthStat::RejectedVerf),
                })
            } else {
                let res = self.call(call.prog, call.vers, call.proc, &mut data_in, &mut ret);
                let stat = match res {
                    Ok(()) => xdr::AcceptStat::Success,
                    Err(RpcError::ProgUnavail) => xdr::AcceptStat::ProgUnavail,
                    Err(RpcError::ProgMissmatch(m)) => xdr::AcceptStat::ProgMissmatch(m),
                    Err(RpcError::ProcUnavail) => xdr::AcceptStat::ProcUnavail,
                    Err(RpcError::GarbageArgs) => xdr::AcceptStat::GarbageArgs,
                    Err(RpcError::Io(err)) => return Err(err),
                    Err(_) => xdr::AcceptStat::SystemErr,
                };

                xdr::ReplyStat::Accepted(xdr::AcceptedReply {
                    verf: Default::default(),
                    stat,
                })
            }
        } else {
            return Err(ErrorKind::Unsupported.into());
        };
        let reply = xdr::RpcMessage {
            xid,
            mtype: xdr::MsgType::Reply(xdr::Replybody { stat }),
        };
        log::trace!("<- {:?}", reply);

        let mut data_out = Cursor::new(Vec::new());
        reply.write_xdr(&mut data_out)?;
        data_out.write_all(&ret.into_inner()[..])?;

        Ok(data_out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::prelude::*;
    use crate::common::xdr::prelude::*;

    /// Echoes the opaque argument of program 99, procedure 1
    struct Echo;

    impl RpcService for Echo {
        fn call(
            &self,
            prog: u32,
            _vers: u32,
            proc: u32,
            args: &mut Cursor<Vec<u8>>,
            ret: &mut Cursor<Vec<u8>>,
        ) -> Result<(), RpcError> {
            if prog != 99 {
                return Err(RpcError::ProgUnavail);
            }
            match proc {
                0 => Ok(()),
                1 => {
                    let mut data = Opaque::default();
                    data.read_xdr(args)?;
                    data.write_xdr(ret)?;
                    Ok(())
                }
                _ => Err(RpcError::ProcUnavail),
            }
        }
    }

    /// In-memory stream: the service consumes a scripted inbound record and
    /// the client reads the produced reply back.
    struct Loopback {
        inbound: Cursor<Vec<u8>>,
        outbound: Cursor<Vec<u8>>,
    }

    impl std::io::Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inbound.read(buf)
        }
    }

    impl std::io::Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.outbound.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn call_echo_roundtrip() {
        // Client writes the call into `outbound`
        let io = Loopback {
            inbound: Cursor::new(Vec::new()),
            outbound: Cursor::new(Vec::new()),
        };
        let mut client = StreamRpcClient::new(io, 99, 1);
        // Prime: encode the call, run it through the service, splice the
        // reply back as the inbound record.
        let payload = Opaque(vec![0xAA, 0xBB, 0xCC]);

        // First round: capture the request record
        let err = client.call::<_, Opaque>(1, payload.clone()).unwrap_err();
        assert!(matches!(err, RpcError::Io(_))); // no reply primed yet

        let request = client.get_ref().outbound.get_ref().clone();
        let record = super::record::read_record(&mut Cursor::new(request), 1024).unwrap();
        let reply = Echo.handle_message(record).unwrap();

        let mut inbound = Vec::new();
        super::record::write_record(&mut inbound, reply).unwrap();

        let io = Loopback {
            inbound: Cursor::new(inbound),
            outbound: Cursor::new(Vec::new()),
        };
        let mut client = StreamRpcClient::new(io, 99, 1);
        // xid restarts at 1 on the fresh client, matching the captured call
        let ret: Opaque = client.call(1, payload.clone()).unwrap();
        assert_eq!(ret, payload);
    }

    #[test]
    fn unknown_program_rejected() {
        let call = {
            let mut cursor = Cursor::new(Vec::new());
            super::xdr::RpcMessage::call(1, 1234, 1, 0)
                .write_xdr(&mut cursor)
                .unwrap();
            cursor.into_inner()
        };
        let reply = Echo.handle_message(call).unwrap();

        let mut decoded = super::xdr::RpcMessage::default();
        decoded.read_xdr(&mut Cursor::new(reply)).unwrap();
        assert!(matches!(
            decoded.mtype,
            super::xdr::MsgType::Reply(super::xdr::Replybody {
                stat: super::xdr::ReplyStat::Accepted(super::xdr::AcceptedReply {
                    stat: super::xdr::AcceptStat::ProgUnavail,
                    ..
                })
            })
        ))
    }
}
