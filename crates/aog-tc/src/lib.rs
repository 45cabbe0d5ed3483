#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' is used for dynamic allocation (pool objects, frame buffers, client maps)
extern crate alloc;

// --- Foundation Modules ---
pub mod types;
pub mod hal;
pub mod can;

// --- Device Descriptor Object Pool ---
pub mod ddop;

// --- Process Data & Session Layer ---
pub mod process_data;
pub mod transport;

// --- Task Controller Server ---
pub mod tc;

// --- AgOpenGPS Wire Protocol ---
pub mod aog;

// --- Cyclic Speed Broadcast ---
pub mod speed;

// Export core types and the CAN link abstraction
pub use can::{CanFrame, CanId};
pub use hal::{CanDriver, TcError};
pub use tc::{ClientState, TaskControllerServer, TcCommand};
pub use transport::{Transport, TransportConfig};
pub use types::IsoName;
