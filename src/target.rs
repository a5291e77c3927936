//! The server under test: what the URL says, and where it resolves to.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    host: String,
    port: u16,
    path: String,
}

impl Target {
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)?;
        if url.scheme() != "http" {
            return Err(Error::config(format!(
                "unsupported scheme {scheme:?}, only plain http targets are supported",
                scheme = url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| Error::config(format!("{input} has no host")))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(Self {
            url,
            host,
            port,
            path,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Request target including the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value of the `Host` header: the port is only spelled out when the
    /// URL names a non-default one.
    pub fn host_header(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{host}:{port}", host = self.host),
            None => self.host.clone(),
        }
    }

    /// Resolves the host once; every connection of the run dials the same
    /// address.
    pub fn resolve(&self) -> Result<SocketAddr> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let mut addrs = (host, self.port)
            .to_socket_addrs()
            .map_err(|source| Error::Resolve {
                host: self.host.clone(),
                source,
            })?;
        addrs.next().ok_or_else(|| Error::NoAddress {
            host: self.host.clone(),
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_omitted_from_host_header() {
        let target = Target::parse("http://example.com/index.html").unwrap();
        assert_eq!(target.host(), "example.com");
        assert_eq!(target.port(), 80);
        assert_eq!(target.path(), "/index.html");
        assert_eq!(target.host_header(), "example.com");
    }

    #[test]
    fn explicit_port_is_kept_in_host_header() {
        let target = Target::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(target.port(), 8080);
        assert_eq!(target.path(), "/");
        assert_eq!(target.host_header(), "127.0.0.1:8080");
    }

    #[test]
    fn query_is_part_of_the_path() {
        let target = Target::parse("http://localhost/search?q=slow&n=1").unwrap();
        assert_eq!(target.path(), "/search?q=slow&n=1");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            Target::parse("https://example.com/"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            Target::parse("ftp://example.com/"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(Target::parse("not a url"), Err(Error::Url(_))));
    }

    #[test]
    fn resolves_loopback() {
        let target = Target::parse("http://127.0.0.1:9/").unwrap();
        let addr = target.resolve().unwrap();
        assert_eq!(addr, "127.0.0.1:9".parse().unwrap());
    }
}
