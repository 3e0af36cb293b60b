use std::io;
use std::os::fd::AsRawFd;

/// A connected, message-oriented socket the event loop can drive.
///
/// Every call moves exactly one datagram. Implementations must be usable in
/// non-blocking mode and report "nothing to do right now" as
/// [`io::ErrorKind::WouldBlock`], so the loop can wait for readiness on the
/// raw fd and retry.
pub trait DatagramIo: AsRawFd + Send + Sync + 'static {
    /// Send one datagram, returning the number of bytes accepted.
    fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// Receive one datagram into `buf`, returning its length.
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Toggle `O_NONBLOCK` on the underlying descriptor.
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

#[cfg(unix)]
impl DatagramIo for std::os::unix::net::UnixDatagram {
    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        std::os::unix::net::UnixDatagram::send(self, buf)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        std::os::unix::net::UnixDatagram::recv(self, buf)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        std::os::unix::net::UnixDatagram::set_nonblocking(self, nonblocking)
    }

    fn transport_name(&self) -> &'static str {
        "unix-datagram"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixDatagram;

    use super::*;

    fn pair() -> (UnixDatagram, UnixDatagram) {
        UnixDatagram::pair().expect("socketpair should be creatable")
    }

    #[test]
    fn unix_datagram_preserves_message_boundaries() {
        let (a, b) = pair();
        DatagramIo::send(&a, b"first").unwrap();
        DatagramIo::send(&a, b"second").unwrap();

        let mut buf = [0u8; 64];
        let n = DatagramIo::recv(&b, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"first");
        let n = DatagramIo::recv(&b, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"second");
    }

    #[test]
    fn nonblocking_recv_reports_would_block() {
        let (_a, b) = pair();
        DatagramIo::set_nonblocking(&b, true).unwrap();

        let mut buf = [0u8; 16];
        let err = DatagramIo::recv(&b, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn transport_name_is_stable() {
        let (a, _b) = pair();
        assert_eq!(a.transport_name(), "unix-datagram");
    }
}
