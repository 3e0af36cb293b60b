use std::io;
use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::resolver::{resolve, InterfaceIndex};
use crate::traits::DatagramIo;

/// A `PF_CAN / SOCK_DGRAM / CAN_BCM` socket connected to one interface.
///
/// BCM sessions are interface-scoped, so the socket is `connect`ed (never
/// `bind`ed) to the interface index. The descriptor is created non-blocking
/// and close-on-exec, and is closed when the socket is dropped.
#[derive(Debug)]
pub struct BcmSocket {
    fd: OwnedFd,
    index: InterfaceIndex,
}

impl BcmSocket {
    /// Resolve `interface` and open a BCM socket connected to it.
    pub fn open_by_name(interface: &str) -> Result<Self> {
        let index = resolve(interface)?;
        Self::open(index)
    }

    /// Open a BCM socket and connect it to the interface at `index`.
    pub fn open(index: InterfaceIndex) -> Result<Self> {
        let connect_error = |source| TransportError::Connect {
            index: index.get(),
            source,
        };

        // SAFETY: plain socket(2) call; the return value is checked below.
        let raw = unsafe {
            libc::socket(
                libc::PF_CAN,
                libc::SOCK_DGRAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                libc::CAN_BCM,
            )
        };
        if raw < 0 {
            return Err(connect_error(io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly created descriptor that nothing else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: `sockaddr_can` is plain old data; all-zero is a valid value.
        let mut addr: libc::sockaddr_can = unsafe { mem::zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        addr.can_ifindex = index.get() as libc::c_int;

        // SAFETY: `addr` is a valid `sockaddr_can` and the length matches its size.
        let rc = unsafe {
            libc::connect(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_can).cast::<libc::sockaddr>(),
                mem::size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(connect_error(io::Error::last_os_error()));
        }

        info!(%index, "connected BCM socket");
        Ok(Self { fd, index })
    }

    /// The interface this socket is connected to.
    pub fn interface_index(&self) -> InterfaceIndex {
        self.index
    }

    /// Close the socket, reporting any error from `close(2)`.
    ///
    /// Dropping the socket also closes it; this only surfaces the result.
    pub fn close(self) -> Result<()> {
        let index = self.index;
        let raw = self.fd.into_raw_fd();
        // SAFETY: `raw` was just released from the `OwnedFd`, so it is closed exactly once.
        let rc = unsafe { libc::close(raw) };
        if rc < 0 {
            return Err(TransportError::Io(io::Error::last_os_error()));
        }
        debug!(%index, "closed BCM socket");
        Ok(())
    }
}

impl DatagramIo for BcmSocket {
    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        loop {
            // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
            let sent = unsafe {
                libc::send(
                    self.fd.as_raw_fd(),
                    buf.as_ptr().cast::<libc::c_void>(),
                    buf.len(),
                    0,
                )
            };
            if sent >= 0 {
                return Ok(sent as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
            let received = unsafe {
                libc::recv(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr().cast::<libc::c_void>(),
                    buf.len(),
                    0,
                )
            };
            if received >= 0 {
                return Ok(received as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let fd = self.fd.as_raw_fd();
        // SAFETY: F_GETFL on an open descriptor has no memory-safety requirements.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        let flags = if nonblocking {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        // SAFETY: as above; only the status flags are changed.
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "can-bcm"
    }
}

impl AsRawFd for BcmSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for BcmSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
