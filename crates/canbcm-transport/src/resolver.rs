use std::ffi::CString;
use std::fmt;
use std::io;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Kernel index of a network interface, as returned by `if_nametoindex(3)`.
///
/// Never zero: the kernel uses 0 to mean "no interface".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceIndex(u32);

impl InterfaceIndex {
    /// Wrap a raw index. Returns `None` for 0.
    pub fn new(index: u32) -> Option<Self> {
        (index != 0).then_some(Self(index))
    }

    /// The raw kernel index.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InterfaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve an interface name (e.g. `vcan0`) to its kernel index.
///
/// Names that cannot be valid are rejected before the kernel is asked.
pub fn resolve(name: &str) -> Result<InterfaceIndex> {
    if name.is_empty() || name.len() >= libc::IFNAMSIZ {
        return Err(lookup_error(
            name,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "interface name must be 1..={} bytes",
                    libc::IFNAMSIZ - 1
                ),
            ),
        ));
    }

    let c_name = CString::new(name).map_err(|_| {
        lookup_error(
            name,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "interface name contains a NUL byte",
            ),
        )
    })?;

    // SAFETY: `c_name` is a valid NUL-terminated string for the duration of the call.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };

    match InterfaceIndex::new(index) {
        Some(index) => {
            debug!(interface = name, %index, "resolved interface");
            Ok(index)
        }
        None => Err(lookup_error(name, io::Error::last_os_error())),
    }
}

fn lookup_error(name: &str, source: io::Error) -> TransportError {
    TransportError::Lookup {
        name: name.to_string(),
        source,
    }
}
