//! Pulls the status code out of whatever the server sent back.

/// Only the head of a reply is searched for the status line.
pub const STATUS_SCAN_WINDOW: usize = 1024;

const VERSION_PREFIX: &[u8] = b"HTTP/";

/// Finds `HTTP/x.y NNN` within the first [`STATUS_SCAN_WINDOW`] bytes and
/// returns `NNN`. `None` when there is no version marker or it is not
/// followed by exactly three digits.
pub fn parse_status_code(reply: &[u8]) -> Option<u16> {
    let window = &reply[..reply.len().min(STATUS_SCAN_WINDOW)];
    let start = window
        .windows(VERSION_PREFIX.len())
        .position(|w| w == VERSION_PREFIX)?;

    let rest = &window[start..];
    let version_end = rest
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(rest.len());
    let rest = &rest[version_end..];
    let code_start = rest
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(rest.len());
    let rest = &rest[code_start..];

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits != 3 {
        return None;
    }
    let code = rest[..3]
        .iter()
        .fold(0u16, |code, b| code * 10 + u16::from(b - b'0'));
    (code != 0).then_some(code)
}
