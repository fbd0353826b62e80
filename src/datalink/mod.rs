//! BACnet datalink layer: the two concrete port transports this router
//! supports, BACnet/IP and MS/TP.
//!
//! The teacher crate's `datalink` module covers five datalink types
//! (BACnet/IP, Ethernet, MS/TP, PTP, ARCnet) behind a full-duplex
//! `DataLink` trait with BVLC/BBMD, foreign-device registration, and
//! token-passing state machines. Those concerns are the collaborators
//! `spec.md` §1 calls "opaque 'port' transports" and puts out of scope; only
//! BACnet/IP and MS/TP survive here, trimmed to thin adapters implementing
//! [`crate::network::port::PortTransport`].

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::string::String;

/// Result type for datalink operations.
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, DataLinkError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, DataLinkError>;

/// Errors a concrete datalink adapter can report.
#[derive(Debug)]
pub enum DataLinkError {
    #[cfg(feature = "std")]
    IoError(std::io::Error),
    InvalidFrame,
    AddressError(String),
}

impl fmt::Display for DataLinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "std")]
            DataLinkError::IoError(e) => write!(f, "I/O error: {}", e),
            DataLinkError::InvalidFrame => write!(f, "Invalid frame format"),
            DataLinkError::AddressError(msg) => write!(f, "Address error: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl Error for DataLinkError {}

/// BACnet datalink layer types this crate provides a port adapter for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLinkType {
    BacnetIp,
    MsTP,
}

/// BACnet/IP (Annex J) port adapter.
pub mod bip;

/// MS/TP (Master-Slave/Token-Passing) port adapter.
pub mod mstp;

#[cfg(feature = "std")]
pub use bip::BipPort;

pub use mstp::MstpPort;
