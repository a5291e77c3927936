//! The event loop.
//!
//! Every tick runs the same steps in the same order: admit one connection,
//! read the clock, arm readiness interest, heartbeat, check for the end of
//! the test, wait (at most one second), dispatch. The wait doubles as the
//! clock tick and is the only place the loop blocks apart from admission
//! pacing.

use std::io::{self, ErrorKind};
use std::thread;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, error, trace, warn};

use crate::clock::{FollowupSchedule, Heartbeat, ProgressClock};
use crate::config::TestConfig;
use crate::connection::{RecvOutcome, SendOutcome};
use crate::error::{Error, Result};
use crate::pool::ConnectionPool;
use crate::report::{Reporter, Summary};
use crate::request::RequestTemplate;
use crate::status::parse_status_code;
use crate::target::Target;
use crate::transport::Dialer;

const TICK: Duration = Duration::from_secs(1);
const MAX_EVENTS: usize = 4096;
const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// What one ready event asks of a connection.
#[derive(Debug, Clone, Copy)]
struct Ready {
    index: usize,
    read: bool,
    write: bool,
}

pub struct Driver<D: Dialer, R: Reporter> {
    config: TestConfig,
    target: Target,
    template: RequestTemplate,
    pool: ConnectionPool<D>,
    reporter: R,
    poll: Poll,
    events: Events,
    schedule: FollowupSchedule,
    heartbeat: Heartbeat,
    recv_buf: Vec<u8>,
}

impl<D, R> Driver<D, R>
where
    D: Dialer,
    D::Stream: Source,
    R: Reporter,
{
    pub fn new(config: TestConfig, target: Target, dialer: D, reporter: R) -> Result<Self> {
        let capacity = config.connections.clamp(1, MAX_EVENTS);
        Self::with_event_capacity(config, target, dialer, reporter, capacity)
    }

    fn with_event_capacity(
        config: TestConfig,
        target: Target,
        dialer: D,
        reporter: R,
        capacity: usize,
    ) -> Result<Self> {
        let poll = Poll::new().map_err(Error::Poll)?;
        let budget = config.followup_budget();
        let template = RequestTemplate::new(&target, config.mode, budget);
        let pool = ConnectionPool::new(dialer, config.connections, budget);
        Ok(Self {
            events: Events::with_capacity(capacity),
            schedule: FollowupSchedule::new(config.interval),
            heartbeat: Heartbeat::default(),
            recv_buf: vec![0; RECV_BUFFER_SIZE],
            config,
            target,
            template,
            pool,
            reporter,
            poll,
        })
    }

    /// Runs the test to completion. Only a failing readiness wait makes
    /// this return an error; connection trouble just shrinks the pool.
    pub fn run(mut self) -> Result<Summary> {
        self.reporter.started(&self.config, &self.target);
        let clock = ProgressClock::start();

        let (active, elapsed) = loop {
            self.admit();

            let elapsed = clock.elapsed_secs();
            let followup_due = self.schedule.is_due(elapsed);
            let active = self.arm(followup_due);

            if self.heartbeat.should_report(elapsed) {
                self.reporter.heartbeat(active, elapsed);
            }
            if elapsed > self.config.duration || active == 0 {
                break (active, elapsed);
            }

            match self.wait_and_dispatch(elapsed, followup_due) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    error!("readiness wait failed on {elapsed}th second: {err}");
                    let active = self.pool.active_count();
                    self.finish(active, elapsed);
                    return Err(Error::Poll(err));
                }
            }
        };

        Ok(self.finish(active, elapsed))
    }

    fn finish(&mut self, active: usize, elapsed: u64) -> Summary {
        let summary = Summary {
            active,
            elapsed,
            admitted: self.pool.admitted(),
            target: self.pool.target(),
        };
        self.reporter.finished(&summary);
        self.shutdown();
        summary
    }

    /// Waits up to one tick, then keeps draining with zero timeouts while
    /// the event buffer comes back full, so a due follow-up round reaches
    /// every writable connection before the second is marked as fired.
    fn wait_and_dispatch(&mut self, elapsed: u64, followup_due: bool) -> io::Result<()> {
        let mut timeout = TICK;
        let mut fired = false;
        loop {
            if let Err(err) = self.poll.poll(&mut self.events, Some(timeout)) {
                if fired {
                    self.schedule.mark_fired(elapsed);
                }
                return Err(err);
            }
            let full = self.events.iter().count() >= self.events.capacity();
            fired |= self.dispatch(followup_due);
            if !full {
                break;
            }
            timeout = Duration::ZERO;
        }
        if fired {
            self.schedule.mark_fired(elapsed);
        }
        Ok(())
    }

    fn admit(&mut self) {
        if self.pool.is_full() {
            return;
        }
        match self.pool.admit_one() {
            Ok(Some(index)) => {
                debug!("sock {index} connecting to {url}", url = self.target);
                thread::sleep(self.config.admission_pause());
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    "{err}; continuing with {capped} connection(s)",
                    capped = self.pool.target()
                );
            }
        }
    }

    /// Re-arms every live connection and returns how many there are.
    fn arm(&mut self, followup_due: bool) -> usize {
        let registry = self.poll.registry();
        let mut active = 0;
        let mut failed = Vec::new();
        for (index, conn) in self.pool.active_mut() {
            let interest = if conn.wants_write(followup_due) {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };
            let token = Token(index);
            let result = if conn.mark_registered() {
                registry.reregister(conn.stream_mut(), token, interest)
            } else {
                registry.register(conn.stream_mut(), token, interest)
            };
            match result {
                Ok(()) => active += 1,
                Err(err) => {
                    warn!("could not register sock {index}: {err}");
                    failed.push(index);
                }
            }
        }
        for index in failed {
            self.retire(index);
        }
        active
    }

    /// Returns `true` when at least one follow-up went out.
    fn dispatch(&mut self, followup_due: bool) -> bool {
        let ready: Vec<Ready> = self
            .events
            .iter()
            .map(|event| Ready {
                index: event.token().0,
                read: event.is_readable()
                    || event.is_read_closed()
                    || event.is_write_closed()
                    || event.is_error(),
                write: event.is_writable(),
            })
            .collect();

        let mut fired = false;
        for Ready { index, read, write } in ready {
            if read && !self.receive(index) {
                continue;
            }
            if write {
                fired |= self.send(index, followup_due);
            } else if let Some(conn) = self.pool.get_mut(index) {
                if conn.requests_remaining() > 0 {
                    trace!("pending connection on sock {index}");
                }
            }
        }

        fired
    }

    /// Returns `false` when the connection is gone afterwards.
    fn receive(&mut self, index: usize) -> bool {
        let Some(conn) = self.pool.get_mut(index) else {
            return false;
        };
        match conn.recv_once(&mut self.recv_buf) {
            Ok(RecvOutcome::Received(n)) => {
                match parse_status_code(&self.recv_buf[..n]) {
                    Some(code) => debug!("sock {index} replied with status {code} ({n} bytes)"),
                    None => debug!("sock {index} replied with {n} bytes"),
                }
                true
            }
            Ok(RecvOutcome::WouldBlock) => true,
            Ok(RecvOutcome::Closed) => {
                debug!("sock {index} closed by peer");
                self.retire(index);
                false
            }
            Err(err) => {
                debug!("sock {index} failed on read: {err}");
                self.retire(index);
                false
            }
        }
    }

    /// Returns `true` when a follow-up went out.
    fn send(&mut self, index: usize, followup_due: bool) -> bool {
        let Some(conn) = self.pool.get_mut(index) else {
            return false;
        };
        let initial = conn.requests_remaining() > 0;
        let (what, payload) = if initial {
            ("initial request", self.template.initial())
        } else if followup_due {
            ("follow up data", self.template.followup())
        } else {
            return false;
        };

        let result = if initial {
            conn.send_initial(payload)
        } else {
            conn.send_followup(payload)
        };
        match result {
            Ok(SendOutcome::Sent(n)) => {
                debug!(
                    "{n} of {len} bytes of {what} sent on sock {index}, {left} follow ups left",
                    len = payload.len(),
                    left = conn.followups_remaining(),
                );
                !initial
            }
            Ok(SendOutcome::WouldBlock) => {
                trace!("sock {index} not ready for {what}");
                false
            }
            Ok(SendOutcome::NotOwed) => false,
            Err(err) => {
                debug!("error sending {what} on sock {index}: {err}");
                self.retire(index);
                false
            }
        }
    }

    fn retire(&mut self, index: usize) {
        if let Some(mut conn) = self.pool.remove(index) {
            let _ = self.poll.registry().deregister(conn.stream_mut());
            debug!(
                "sock {index} removed after {idle}s idle, {active} left",
                idle = conn.idle_secs(),
                active = self.pool.active_count(),
            );
        }
    }

    fn shutdown(&mut self) {
        let registry = self.poll.registry();
        for mut conn in self.pool.drain() {
            let _ = registry.deregister(conn.stream_mut());
        }
    }
}
