//! Portmapper (rpcbind) client, used to discover the core channel port
//! during `open` and to clear stale interrupt-program registrations.

use std::{
    io,
    net::{SocketAddr, TcpStream},
    time::Duration,
};

use crate::common::{
    onc_rpc::prelude::*,
    portmapper::{xdr::Mapping, PMAPPROC_GETPORT, PMAPPROC_UNSET, PORTMAPPER_PROG, PORTMAPPER_VERS},
};

pub(crate) use crate::common::portmapper::{PORTMAPPER_PORT, PORTMAPPER_PROT_TCP};

pub(crate) struct PortMapperClient(StreamRpcClient<TcpStream>);

impl PortMapperClient {
    pub(crate) fn connect_tcp(addr: SocketAddr, timeout: Duration) -> io::Result<Self> {
        let io = TcpStream::connect_timeout(&addr, timeout)?;
        io.set_read_timeout(Some(timeout))?;
        io.set_write_timeout(Some(timeout))?;
        Ok(Self(StreamRpcClient::new(
            io,
            PORTMAPPER_PROG,
            PORTMAPPER_VERS,
        )))
    }

    /// Look up the port of `prog`/`vers` over `prot`. Zero means unregistered.
    pub(crate) fn getport(&mut self, prog: u32, vers: u32, prot: u32) -> Result<u16, RpcError> {
        let port: u32 = self.0.call(PMAPPROC_GETPORT, Mapping::new(prog, vers, prot, 0))?;
        if port == 0 || port > u16::MAX as u32 {
            Err(RpcError::Portmap)
        } else {
            Ok(port as u16)
        }
    }

    /// Remove any mapping for `prog`/`vers`, all protocols.
    pub(crate) fn unset(&mut self, prog: u32, vers: u32) -> Result<bool, RpcError> {
        self.0.call(PMAPPROC_UNSET, Mapping::new(prog, vers, 0, 0))
    }
}
