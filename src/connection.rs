//! One attack connection and its send/receive state machine.
//!
//! ```text
//! Connecting -> InitialPending -> FollowupPending -> Closed
//! ```
//!
//! Writes are single nonblocking attempts. A short write still counts as
//! the request being in flight: the point is to leave the server holding
//! a request that never completes, so nothing here retries until done.

use std::io::{self, ErrorKind, Read, Write};
use std::time::Instant;

use crate::transport::Dialer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connecting,
    InitialPending,
    FollowupPending,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(usize),
    /// Socket buffer full, try again on a later tick.
    WouldBlock,
    /// Nothing of this kind is owed right now; no write was attempted.
    NotOwed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    Received(usize),
    WouldBlock,
    /// Orderly shutdown from the peer.
    Closed,
}

#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    state: State,
    requests_remaining: u8,
    followups_remaining: u64,
    last_activity: Instant,
    registered: bool,
}

impl<S: Read + Write> Connection<S> {
    /// Starts a nonblocking connect. An error here means the host ran out
    /// of something (descriptors, ports, routes), not that the run failed.
    pub fn open<D>(dialer: &mut D, followup_budget: u64) -> io::Result<Self>
    where
        D: Dialer<Stream = S>,
    {
        let stream = dialer.dial()?;
        let mut conn = Self::connecting(stream, followup_budget);
        conn.state = State::InitialPending;
        Ok(conn)
    }

    fn connecting(stream: S, followup_budget: u64) -> Self {
        Self {
            stream,
            state: State::Connecting,
            requests_remaining: 1,
            followups_remaining: followup_budget,
            last_activity: Instant::now(),
            registered: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn requests_remaining(&self) -> u8 {
        self.requests_remaining
    }

    pub fn followups_remaining(&self) -> u64 {
        self.followups_remaining
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Seconds since the last send or receive, for diagnostics.
    pub fn idle_secs(&self) -> u64 {
        self.last_activity.elapsed().as_secs()
    }

    /// `followup_due` is the pool-wide verdict for the current second.
    pub fn wants_write(&self, followup_due: bool) -> bool {
        if self.is_closed() {
            return false;
        }
        self.requests_remaining > 0 || (self.followups_remaining > 0 && followup_due)
    }

    pub fn send_initial(&mut self, request: &[u8]) -> io::Result<SendOutcome> {
        if self.is_closed() || self.requests_remaining == 0 {
            return Ok(SendOutcome::NotOwed);
        }
        let outcome = self.send_once(request)?;
        if let SendOutcome::Sent(_) = outcome {
            self.requests_remaining = 0;
            self.state = State::FollowupPending;
        }
        Ok(outcome)
    }

    /// Never writes before the initial request has gone out.
    pub fn send_followup(&mut self, chunk: &[u8]) -> io::Result<SendOutcome> {
        if self.state != State::FollowupPending
            || self.requests_remaining > 0
            || self.followups_remaining == 0
        {
            return Ok(SendOutcome::NotOwed);
        }
        let outcome = self.send_once(chunk)?;
        if let SendOutcome::Sent(_) = outcome {
            self.followups_remaining -= 1;
        }
        Ok(outcome)
    }

    fn send_once(&mut self, bytes: &[u8]) -> io::Result<SendOutcome> {
        match self.stream.write(bytes) {
            Ok(0) if !bytes.is_empty() => Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => {
                self.last_activity = Instant::now();
                Ok(SendOutcome::Sent(n))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(SendOutcome::WouldBlock),
            Err(err) => Err(err),
        }
    }

    /// One read into `buf`. Only `buf[..n]` of a `Received(n)` is valid.
    pub fn recv_once(&mut self, buf: &mut [u8]) -> io::Result<RecvOutcome> {
        match self.stream.read(buf) {
            Ok(0) if !buf.is_empty() => Ok(RecvOutcome::Closed),
            Ok(n) => {
                self.last_activity = Instant::now();
                Ok(RecvOutcome::Received(n))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(RecvOutcome::WouldBlock),
            Err(err) => Err(err),
        }
    }

    pub fn close(&mut self) {
        self.state = State::Closed;
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Marks the stream as known to the readiness registry, returning
    /// whether it already was.
    pub(crate) fn mark_registered(&mut self) -> bool {
        std::mem::replace(&mut self.registered, true)
    }
}
