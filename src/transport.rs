//! Socket setup for attack connections.

use std::io::{self, Read, Write};
use std::net::SocketAddr;

use mio::net::TcpStream;

/// Opens the nonblocking streams connections are built on.
///
/// `dial` only has to *start* connecting: completion (or failure) shows up
/// later as readiness on the returned stream.
pub trait Dialer {
    type Stream: Read + Write;

    fn dial(&mut self) -> io::Result<Self::Stream>;
}

#[derive(Debug, Clone, Copy)]
pub struct TcpDialer {
    addr: SocketAddr,
}

impl TcpDialer {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    fn dial(&mut self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.addr)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
