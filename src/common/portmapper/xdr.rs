use std::io::{Read, Result, Write};

use crate::common::xdr::prelude::*;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Mapping {
    pub(crate) prog: u32,
    pub(crate) vers: u32,
    pub(crate) prot: u32,
    pub(crate) port: u32,
}

impl Mapping {
    pub(crate) fn new(prog: u32, vers: u32, prot: u32, port: u32) -> Self {
        Self {
            prog,
            vers,
            prot,
            port,
        }
    }
}

impl XdrEncode for Mapping {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.prog.write_xdr(writer)?;
        self.vers.write_xdr(writer)?;
        self.prot.write_xdr(writer)?;
        self.port.write_xdr(writer)
    }
}

impl XdrDecode for Mapping {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.prog.read_xdr(reader)?;
        self.vers.read_xdr(reader)?;
        self.prot.read_xdr(reader)?;
        self.port.read_xdr(reader)
    }
}
