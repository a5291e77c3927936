//! Runs the real event loop against a loopback listener.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use slowdrip::request::{RequestTemplate, BODY_FOLLOWUP, HEADER_FOLLOWUP};
use slowdrip::{Dialer, Driver, Reporter, Summary, Target, TcpDialer, TestConfig, TestMode};

#[derive(Debug, Default)]
struct Recorder {
    started: usize,
    heartbeats: Vec<(usize, u64)>,
    finished: Option<Summary>,
}

impl Reporter for Recorder {
    fn started(&mut self, _config: &TestConfig, _target: &Target) {
        self.started += 1;
    }

    fn heartbeat(&mut self, active: usize, elapsed: u64) {
        self.heartbeats.push((active, elapsed));
    }

    fn finished(&mut self, summary: &Summary) {
        self.finished = Some(*summary);
    }
}

/// Lets the first `remaining` dials through, then fails like a process
/// that ran out of descriptors.
struct LimitedDialer {
    inner: TcpDialer,
    remaining: usize,
}

impl Dialer for LimitedDialer {
    type Stream = mio::net::TcpStream;

    fn dial(&mut self) -> io::Result<Self::Stream> {
        if self.remaining == 0 {
            return Err(io::Error::from_raw_os_error(24));
        }
        self.remaining -= 1;
        self.inner.dial()
    }
}

fn listen() -> (TcpListener, Target, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let target = Target::parse(&format!("http://{addr}/slow")).unwrap();
    (listener, target, addr)
}

/// Accepts `n` connections and returns everything each one sent before
/// hanging up.
fn collect(listener: TcpListener, n: usize) -> JoinHandle<Vec<Vec<u8>>> {
    thread::spawn(move || {
        let readers: Vec<JoinHandle<Vec<u8>>> = (0..n)
            .map(|_| {
                let (mut stream, _) = listener.accept().unwrap();
                thread::spawn(move || {
                    stream.set_read_timeout(Some(Duration::from_secs(20))).unwrap();
                    let mut received = Vec::new();
                    let _ = stream.read_to_end(&mut received);
                    received
                })
            })
            .collect();
        readers.into_iter().map(|r| r.join().unwrap()).collect()
    })
}

fn run(
    config: TestConfig,
    target: Target,
    addr: SocketAddr,
    recorder: &mut Recorder,
) -> (Summary, Duration) {
    let started = Instant::now();
    let driver = Driver::new(config, target, TcpDialer::new(addr), recorder).unwrap();
    let summary = driver.run().unwrap();
    (summary, started.elapsed())
}

/// Splits what the server saw into the initial request and the number of
/// follow-up chunks after it, checking every chunk is a complete copy.
fn followups_after(received: &[u8], initial: &[u8], chunk: &[u8]) -> usize {
    assert!(received.starts_with(initial), "initial request missing");
    let tail = &received[initial.len()..];
    assert_eq!(tail.len() % chunk.len(), 0, "partial follow-up chunk");
    let n = tail.len() / chunk.len();
    assert_eq!(tail, chunk.repeat(n).as_slice());
    n
}

#[test]
fn single_connection_sends_request_and_stops_after_duration() {
    let (listener, target, addr) = listen();
    let server = collect(listener, 1);
    let config = TestConfig::new(100, 1, 2, 10, TestMode::HeaderStarve).unwrap();
    let expected = RequestTemplate::new(&target, config.mode, config.followup_budget());

    let mut recorder = Recorder::default();
    let (summary, took) = run(config, target, addr, &mut recorder);

    assert!((3..=4).contains(&summary.elapsed), "{summary:?}");
    assert!(took < Duration::from_secs(6));
    assert_eq!(summary.active, 1);
    assert_eq!(summary.admitted, 1);
    assert_eq!(summary.target, 1);
    assert_eq!(recorder.started, 1);
    assert_eq!(recorder.heartbeats, vec![(1, 0)]);
    assert_eq!(recorder.finished, Some(summary));

    let received = server.join().unwrap();
    assert_eq!(received[0], expected.initial());
}

#[test]
fn header_followups_arrive_as_whole_lines() {
    let (listener, target, addr) = listen();
    let server = collect(listener, 2);
    let config = TestConfig::new(100, 2, 3, 1, TestMode::HeaderStarve).unwrap();
    let expected = RequestTemplate::new(&target, config.mode, config.followup_budget());

    let mut recorder = Recorder::default();
    let (summary, _) = run(config, target, addr, &mut recorder);
    assert_eq!(summary.active, 2);

    let received = server.join().unwrap();
    let counts: Vec<usize> = received
        .iter()
        .map(|bytes| followups_after(bytes, expected.initial(), HEADER_FOLLOWUP))
        .collect();
    for n in &counts {
        assert!((1..=3).contains(n), "{counts:?}");
    }
}

#[test]
fn body_followups_add_exact_fragments() {
    let (listener, target, addr) = listen();
    let server = collect(listener, 1);
    let config = TestConfig::new(100, 1, 3, 1, TestMode::BodyStarve).unwrap();
    let expected = RequestTemplate::new(&target, config.mode, config.followup_budget());

    let mut recorder = Recorder::default();
    run(config, target, addr, &mut recorder);

    let received = server.join().unwrap();
    let n = followups_after(&received[0], expected.initial(), BODY_FOLLOWUP);
    assert!((1..=3).contains(&n));
    assert_eq!(
        received[0].len() - expected.initial().len(),
        n * BODY_FOLLOWUP.len()
    );
}

#[test]
fn heartbeat_fires_once_per_five_seconds() {
    let (listener, target, addr) = listen();
    let server = collect(listener, 1);
    let config = TestConfig::new(100, 1, 5, 10, TestMode::HeaderStarve).unwrap();

    let mut recorder = Recorder::default();
    let (summary, _) = run(config, target, addr, &mut recorder);

    assert_eq!(recorder.heartbeats, vec![(1, 0), (1, 5)]);
    assert!(summary.elapsed > 5);
    server.join().unwrap();
}

#[test]
fn peer_close_removes_connection_and_ends_run_early() {
    let (listener, target, addr) = listen();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        drop(stream);
    });
    let config = TestConfig::new(100, 1, 30, 1, TestMode::HeaderStarve).unwrap();

    let mut recorder = Recorder::default();
    let (summary, took) = run(config, target, addr, &mut recorder);
    server.join().unwrap();

    assert_eq!(summary.active, 0);
    assert_eq!(summary.admitted, 1);
    assert!(summary.elapsed < 30);
    assert!(took < Duration::from_secs(10));
}

#[test]
fn refused_connection_is_dropped() {
    let (listener, target, addr) = listen();
    drop(listener);
    let config = TestConfig::new(100, 1, 30, 1, TestMode::BodyStarve).unwrap();

    let mut recorder = Recorder::default();
    let (summary, took) = run(config, target, addr, &mut recorder);

    assert_eq!(summary.active, 0);
    assert!(took < Duration::from_secs(10));
}

#[test]
fn failed_admission_caps_the_run() {
    let (listener, target, addr) = listen();
    let server = collect(listener, 2);
    let config = TestConfig::new(100, 5, 1, 10, TestMode::HeaderStarve).unwrap();
    let dialer = LimitedDialer {
        inner: TcpDialer::new(addr),
        remaining: 2,
    };

    let mut recorder = Recorder::default();
    let driver = Driver::new(config, target, dialer, &mut recorder).unwrap();
    let summary = driver.run().unwrap();

    assert_eq!(summary.admitted, 2);
    assert_eq!(summary.target, 2);
    assert_eq!(summary.active, 2);
    assert_eq!(server.join().unwrap().len(), 2);
}

/// Records when each follow-up chunk reached the server, after the
/// initial request has been read in full.
fn collect_followup_arrivals(
    listener: TcpListener,
    initial_len: usize,
) -> JoinHandle<Vec<(Instant, usize)>> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(20))).unwrap();
        let mut buf = [0u8; 4096];
        let mut seen = 0;
        let mut arrivals = Vec::new();
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let before = seen;
            seen += n;
            if seen > initial_len {
                let followup_bytes = seen - initial_len.max(before);
                arrivals.push((Instant::now(), followup_bytes));
            }
        }
        arrivals
    })
}

#[test]
fn at_most_one_followup_per_second() {
    let (listener, target, addr) = listen();
    let config = TestConfig::new(100, 1, 3, 1, TestMode::HeaderStarve).unwrap();
    let expected = RequestTemplate::new(&target, config.mode, config.followup_budget());
    let server = collect_followup_arrivals(listener, expected.initial().len());

    let mut recorder = Recorder::default();
    run(config, target, addr, &mut recorder);

    let arrivals = server.join().unwrap();
    assert!(!arrivals.is_empty());
    for (_, bytes) in &arrivals {
        assert_eq!(*bytes, HEADER_FOLLOWUP.len(), "{arrivals:?}");
    }
    for pair in arrivals.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].0);
        assert!(gap >= Duration::from_millis(500), "{arrivals:?}");
    }
}
