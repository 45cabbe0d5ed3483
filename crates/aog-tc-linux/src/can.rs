//! SocketCAN-backed link driver.
//!
//! All supported USB adapters surface as SocketCAN network devices through
//! their kernel drivers, so adapter selection is a matter of naming the
//! expected hardware and `--can_channel` picking the `canN` interface.

use aog_tc::can::CanId;
use aog_tc::{CanDriver, CanFrame, TcError};
use core::fmt;
use log::{error, info, warn};
use socketcan::{EmbeddedFrame, ExtendedId, Socket};
use std::io;

/// The supported CAN hardware adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanAdapter {
    PeakPcan,
    InnomakerUsb2Can,
    RusokuToucan,
    SysTecUsb2Can,
}

impl CanAdapter {
    pub const NAMES: [&'static str; 4] = [
        "peak-pcan",
        "innomaker-usb2can",
        "rusoku-toucan",
        "sys-tec-usb2can",
    ];

    pub fn from_name(name: &str) -> Result<Self, String> {
        match name {
            "peak-pcan" => Ok(CanAdapter::PeakPcan),
            "innomaker-usb2can" => Ok(CanAdapter::InnomakerUsb2Can),
            "rusoku-toucan" => Ok(CanAdapter::RusokuToucan),
            "sys-tec-usb2can" => Ok(CanAdapter::SysTecUsb2Can),
            other => Err(format!(
                "unknown CAN adapter '{}', expected one of: {}",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

impl fmt::Display for CanAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CanAdapter::PeakPcan => "peak-pcan",
            CanAdapter::InnomakerUsb2Can => "innomaker-usb2can",
            CanAdapter::RusokuToucan => "rusoku-toucan",
            CanAdapter::SysTecUsb2Can => "sys-tec-usb2can",
        };
        f.write_str(name)
    }
}

/// Non-blocking SocketCAN channel implementing the core `CanDriver` trait.
pub struct SocketCanDriver {
    socket: socketcan::CanSocket,
}

impl SocketCanDriver {
    pub fn open(adapter: CanAdapter, channel: u32) -> Result<Self, TcError> {
        let interface = format!("can{}", channel);
        info!("Opening SocketCAN interface {} for adapter {}", interface, adapter);
        let socket = socketcan::CanSocket::open(&interface).map_err(|e| {
            error!("Failed to open {}: {}", interface, e);
            TcError::IoError
        })?;
        socket.set_nonblocking(true).map_err(|e| {
            error!("Failed to make {} non-blocking: {}", interface, e);
            TcError::IoError
        })?;
        Ok(SocketCanDriver { socket })
    }
}

impl CanDriver for SocketCanDriver {
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), TcError> {
        let id = ExtendedId::new(frame.id.as_raw()).ok_or(TcError::InvalidCanFrame)?;
        let wire_frame =
            socketcan::CanFrame::new(id, frame.payload()).ok_or(TcError::InvalidCanFrame)?;
        self.socket.write_frame(&wire_frame).map_err(|e| {
            if e.kind() != io::ErrorKind::WouldBlock {
                warn!("CAN transmit failed: {}", e);
            }
            TcError::IoError
        })
    }

    fn receive_frame(&mut self) -> Result<Option<CanFrame>, TcError> {
        match self.socket.read_frame() {
            Ok(socketcan::CanFrame::Data(data_frame)) => {
                let raw = match data_frame.id() {
                    socketcan::Id::Extended(extended) => extended.as_raw(),
                    // ISOBUS only uses 29-bit identifiers.
                    socketcan::Id::Standard(_) => return Ok(None),
                };
                Ok(Some(CanFrame::new(CanId::from_raw(raw), data_frame.data())?))
            }
            Ok(_) => Ok(None), // remote and error frames
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                warn!("CAN receive failed: {}", e);
                Err(TcError::IoError)
            }
        }
    }
}
