//! Channel to the metrics aggregator.

use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::net::UdpSocket;
use std::ops::Deref;
use std::ops::DerefMut;

use error_stack::Report;
use error_stack::ResultExt;

use crate::error::ReporterError;
use crate::error::ReporterResult;

/// Connection-oriented sink for `(key, value)` pairs.
///
/// `connect` must be atomic: on error the transport is left closed.
pub trait Transport: Send {
    /// Human readable destination, used in errors and logs.
    fn address(&self) -> String;

    fn connect(&mut self) -> ReporterResult<()>;

    /// Best-effort delivery of one sample. Failures are recorded by the
    /// transport and never surface to the caller.
    fn send(&mut self, key: &str, value: &str);

    fn close(&mut self) -> ReporterResult<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn address(&self) -> String {
        (**self).address()
    }

    fn connect(&mut self) -> ReporterResult<()> {
        (**self).connect()
    }

    fn send(&mut self, key: &str, value: &str) {
        (**self).send(key, value)
    }

    fn close(&mut self) -> ReporterResult<()> {
        (**self).close()
    }
}

/// An open transport that is closed when dropped.
///
/// A close failure is logged at warn and otherwise ignored, so it never
/// replaces whatever the caller was doing when the guard went out of scope.
pub struct ConnectedTransport<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> ConnectedTransport<'a, T> {
    pub fn open(transport: &'a mut T) -> ReporterResult<Self> {
        transport.connect()?;
        Ok(Self { transport })
    }
}

impl<T: Transport + ?Sized> Deref for ConnectedTransport<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: Transport + ?Sized> DerefMut for ConnectedTransport<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: Transport + ?Sized> Drop for ConnectedTransport<'_, T> {
    fn drop(&mut self) {
        if let Err(report) = self.transport.close() {
            tracing::warn!(
                msg = "Failed to close transport",
                address = %self.transport.address(),
                error = ?report,
            );
        }
    }
}

/// StatsD over UDP: one `<key>:<value>|g` datagram per sample.
#[derive(Debug)]
pub struct UdpTransport {
    host: String,
    port: u16,
    socket: Option<UdpSocket>,
    failures: u64,
}

impl UdpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            socket: None,
            failures: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Number of samples that could not be sent since creation.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn connect_error(&self) -> ReporterError {
        ReporterError::TransportConnect {
            address: self.address(),
        }
    }

    fn resolve(&self) -> ReporterResult<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .change_context_lazy(|| self.connect_error())?
            .next()
            .ok_or_else(|| {
                Report::new(self.connect_error()).attach_printable("host resolved to no addresses")
            })
    }
}

fn frame(key: &str, value: &str) -> String {
    format!("{key}:{value}|g")
}

impl Transport for UdpTransport {
    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connect(&mut self) -> ReporterResult<()> {
        if self.socket.is_some() {
            return Err(Report::new(self.connect_error()).attach_printable("already connected"));
        }

        let remote = self.resolve()?;
        let local: SocketAddr = if remote.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)
            .change_context_lazy(|| self.connect_error())
            .attach_printable_lazy(|| format!("bind {local}"))?;
        socket
            .connect(remote)
            .change_context_lazy(|| self.connect_error())
            .attach_printable_lazy(|| format!("connect {remote}"))?;

        self.socket = Some(socket);
        Ok(())
    }

    fn send(&mut self, key: &str, value: &str) {
        let Some(socket) = &self.socket else {
            self.failures += 1;
            tracing::debug!(msg = "Dropping sample on closed transport", key);
            return;
        };
        if let Err(error) = socket.send(frame(key, value).as_bytes()) {
            self.failures += 1;
            tracing::debug!(msg = "Failed to send sample", key, error = %error);
        }
    }

    fn close(&mut self) -> ReporterResult<()> {
        self.socket = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use similar_asserts::assert_eq;

    use super::*;

    fn aggregator() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    fn recv(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 1024];
        let n = socket.recv(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn sends_gauge_datagrams() {
        let (server, port) = aggregator();
        let mut transport = UdpTransport::new("127.0.0.1", port);
        transport.connect().unwrap();

        transport.send("app.requests", "42");
        transport.send("app.latency.mean", "1.50");

        assert_eq!(recv(&server), "app.requests:42|g");
        assert_eq!(recv(&server), "app.latency.mean:1.50|g");
        assert_eq!(transport.failures(), 0);
    }

    #[test]
    fn double_connect_fails_and_stays_open() {
        let (_server, port) = aggregator();
        let mut transport = UdpTransport::new("127.0.0.1", port);
        transport.connect().unwrap();

        let err = transport.connect().unwrap_err();
        assert!(matches!(
            err.current_context(),
            ReporterError::TransportConnect { address } if *address == format!("127.0.0.1:{port}")
        ));
        assert!(transport.is_connected());
    }

    #[test]
    fn send_after_close_counts_failure() {
        let (_server, port) = aggregator();
        let mut transport = UdpTransport::new("127.0.0.1", port);
        transport.send("never.opened", "1");
        transport.connect().unwrap();
        transport.close().unwrap();
        transport.send("after.close", "1");

        assert_eq!(transport.failures(), 2);
        assert!(!transport.is_connected());
    }

    #[test]
    fn closing_unopened_transport_is_noop() {
        let mut transport = UdpTransport::new("127.0.0.1", 8125);
        assert!(transport.close().is_ok());
    }

    #[test]
    fn guard_closes_on_drop() {
        let (server, port) = aggregator();
        let mut transport = UdpTransport::new("127.0.0.1", port);
        {
            let mut connected = ConnectedTransport::open(&mut transport).unwrap();
            connected.send("scoped", "7");
        }
        assert!(!transport.is_connected());
        assert_eq!(recv(&server), "scoped:7|g");
    }
}
