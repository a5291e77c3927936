//! The bytes every connection sends: one initial partial request and the
//! follow-up chunk trickled after it.

use crate::config::TestMode;
use crate::target::Target;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; U; Intel Mac OS X 10_6_8; en-us) \
AppleWebKit/533.21.1 (KHTML, like Gecko) Version/5.0.5 Safari/533.21.1";

pub const HEADER_FOLLOWUP: &[u8] = b"X-Header: 1234567\r\n";
pub const BODY_FOLLOWUP: &[u8] = b"alpha=beta&";

const BODY_PREFIX: &str = "foo=bar";
const MIN_CONTENT_LENGTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    initial: Vec<u8>,
    followup: &'static [u8],
}

impl RequestTemplate {
    /// `followup_budget` is how many follow-ups a single connection may
    /// send; the declared body length is sized so it is never reached.
    pub fn new(target: &Target, mode: TestMode, followup_budget: u64) -> Self {
        let method = match mode {
            TestMode::HeaderStarve => "GET",
            TestMode::BodyStarve => "POST",
        };
        let mut initial = format!(
            "{method} {path} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: {USER_AGENT}\r\n",
            path = target.path(),
            host = target.host_header(),
        );

        let followup = match mode {
            TestMode::HeaderStarve => HEADER_FOLLOWUP,
            TestMode::BodyStarve => {
                let budget = usize::try_from(followup_budget).unwrap_or(usize::MAX);
                let longest_body = BODY_FOLLOWUP
                    .len()
                    .saturating_mul(budget)
                    .saturating_add(BODY_PREFIX.len());
                let content_length = MIN_CONTENT_LENGTH.max(longest_body.saturating_add(1));
                initial.push_str("Connection: close\r\n");
                initial.push_str("Referer: http://code.google.com/p/slowhttptest/\r\n");
                initial.push_str("Content-Type: application/x-www-form-urlencoded\r\n");
                initial.push_str(&format!("Content-Length: {content_length}\r\n"));
                initial.push_str("Accept: text/html;q=0.9,text/plain;q=0.8,image/png,*/*;q=0.5\r\n");
                initial.push_str("\r\n");
                initial.push_str(BODY_PREFIX);
                BODY_FOLLOWUP
            }
        };

        Self {
            initial: initial.into_bytes(),
            followup,
        }
    }

    pub fn initial(&self) -> &[u8] {
        &self.initial
    }

    pub fn followup(&self) -> &[u8] {
        self.followup
    }
}
