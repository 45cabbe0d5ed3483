#![cfg(target_os = "linux")]

pub mod app;
pub mod can;
pub mod settings;
pub mod udp;

pub use app::Application;
pub use can::{CanAdapter, SocketCanDriver};
pub use settings::Settings;
pub use udp::UdpConnections;
