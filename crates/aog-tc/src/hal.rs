use crate::can::CanFrame;
use core::array::TryFromSliceError;
use core::fmt;

/// Defines a portable, descriptive error type for the task controller stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcError {
    /// The provided buffer is too small for the operation.
    BufferTooShort,
    /// An underlying I/O error occurred.
    IoError,
    /// A received CAN frame is fundamentally invalid (e.g., not 29-bit).
    InvalidCanFrame,
    /// A multi-byte value could not be parsed from a slice.
    SliceConversion,
    /// An object table identifier in a DDOP was not one of DVC/DET/DPD/DPT/DVP.
    UnknownObjectType([u8; 3]),
    /// A device element carried an element type outside 1..=7.
    InvalidElementType(u8),
    /// A DDOP object referenced an object id that is not present in the pool.
    PoolObjectNotFound(u16),
    /// The binary pool data ended in the middle of an object definition.
    TruncatedPool,
    /// The pool did not contain exactly one device (DVC) object.
    MalformedPool(&'static str),
    /// Activation was requested before any pool data was uploaded.
    NoPoolUploaded,
    /// An AOG packet failed its checksum.
    ChecksumMismatch { expected: u8, actual: u8 },
    /// An AOG packet payload did not match the layout for its PGN.
    InvalidPacket(&'static str),
    /// A transport protocol session was violated (bad sequence, overrun).
    TransportSession(&'static str),
    /// The local address claim was contested and lost.
    AddressClaimLost,
    /// Internal logic error.
    InternalError(&'static str),
}

impl fmt::Display for TcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooShort => write!(f, "Buffer is too short"),
            Self::IoError => write!(f, "Underlying I/O error"),
            Self::InvalidCanFrame => write!(f, "Invalid CAN frame"),
            Self::SliceConversion => write!(f, "Failed to convert slice to fixed-size array"),
            Self::UnknownObjectType(t) => {
                write!(f, "Unknown DDOP object table: {:02X} {:02X} {:02X}", t[0], t[1], t[2])
            }
            Self::InvalidElementType(v) => write!(f, "Invalid device element type: {}", v),
            Self::PoolObjectNotFound(id) => write!(f, "DDOP object id {} not found", id),
            Self::TruncatedPool => write!(f, "Binary pool truncated mid-object"),
            Self::MalformedPool(s) => write!(f, "Malformed device descriptor pool: {}", s),
            Self::NoPoolUploaded => write!(f, "No object pool uploaded for this client"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "Checksum mismatch: expected {:#04X}, got {:#04X}", expected, actual)
            }
            Self::InvalidPacket(s) => write!(f, "Invalid AOG packet: {}", s),
            Self::TransportSession(s) => write!(f, "Transport session error: {}", s),
            Self::AddressClaimLost => write!(f, "Address claim contested by higher-priority NAME"),
            Self::InternalError(s) => write!(f, "Internal error: {}", s),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TcError {}

impl From<TryFromSliceError> for TcError {
    fn from(_: TryFromSliceError) -> Self {
        TcError::SliceConversion
    }
}

/// Abstraction over the CAN link driver.
///
/// Any adapter that can put a frame on the bus and take one off it can back
/// the task controller; the protocol logic above this trait stays
/// platform-agnostic (no_std).
pub trait CanDriver {
    /// Sends a single CAN frame. Backpressure is reported as `IoError` and
    /// retried by the caller on the next loop iteration.
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), TcError>;

    /// Attempts to receive a single CAN frame without blocking.
    ///
    /// Returns `Ok(None)` when no frame is pending.
    fn receive_frame(&mut self) -> Result<Option<CanFrame>, TcError>;
}
