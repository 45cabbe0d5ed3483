//! Application wiring: one object owning the CAN driver, the session
//! layer, the TC server, the UDP codec and the periodic timers, advanced
//! one cooperative iteration at a time.

use crate::settings::Settings;
use crate::udp::UdpConnections;
use aog_tc::aog::{
    heartbeat_payload, parse_section_control, parse_subnet_announce, SteerData, AOG_SOURCE,
    PGN_HEARTBEAT, PGN_SECTION_CONTROL, PGN_STEER_DATA, PGN_SUBNET_ANNOUNCE, TC_SOURCE,
};
use aog_tc::speed::{kmh_tenths_to_mm_per_s, MachineDirection, SpeedMessagesInterface};
use aog_tc::types::MAX_SECTIONS;
use aog_tc::{CanDriver, TaskControllerServer, TcError, Transport, TransportConfig};
use log::{debug, error, info, warn};
use std::io;
use std::thread;
use std::time::{Duration, Instant};

const HEARTBEAT_INTERVAL_MS: u64 = 100;
const ADDRESS_CLAIM_TIMEOUT_MS: u64 = 5_000;

/// True when another heartbeat round is due.
fn heartbeat_due(last_ms: Option<u64>, now_ms: u64) -> bool {
    last_ms.map_or(true, |last| now_ms.saturating_sub(last) >= HEARTBEAT_INTERVAL_MS)
}

pub struct Application {
    settings: Settings,
    udp: UdpConnections,
    driver: Box<dyn CanDriver>,
    transport: Transport,
    server: TaskControllerServer,
    speed: SpeedMessagesInterface,
    started: Instant,
    last_heartbeat_ms: Option<u64>,
}

impl Application {
    pub fn new(driver: Box<dyn CanDriver>) -> io::Result<Self> {
        let settings = Settings::load();
        info!("Configured subnet: {}", settings.subnet_string());
        let udp = UdpConnections::open(settings.subnet)?;
        info!("UDP connections opened");
        Ok(Application {
            settings,
            udp,
            driver,
            transport: Transport::new(TransportConfig::default()),
            server: TaskControllerServer::new(),
            speed: SpeedMessagesInterface::new(),
            started: Instant::now(),
            last_heartbeat_ms: None,
        })
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Claims the bus address; fails when the claim is contested or does
    /// not settle within five seconds.
    pub fn initialize(&mut self) -> Result<(), TcError> {
        self.transport.start(self.now_ms());
        let deadline = Instant::now() + Duration::from_millis(ADDRESS_CLAIM_TIMEOUT_MS);
        while !self.transport.address_claimed() {
            if self.transport.claim_lost() {
                error!("Failed to claim address for the TC server");
                return Err(TcError::AddressClaimLost);
            }
            if Instant::now() >= deadline {
                error!("Address claim did not settle within 5 s");
                return Err(TcError::InternalError("address claim timeout"));
            }
            self.pump_can();
            thread::sleep(Duration::from_millis(10));
        }
        info!("Task controller server started");
        Ok(())
    }

    /// One cooperative event-loop iteration.
    pub fn update(&mut self) {
        self.handle_address_detection();
        self.handle_aog_packets();
        self.server.request_measurement_commands();
        self.pump_can();
        self.update_speed();
        self.send_heartbeats();
    }

    pub fn stop(&mut self) {
        info!("Shutting down task controller");
        let now = self.now_ms();
        self.transport.update(&mut self.server, now);
        for frame in self.transport.take_tx() {
            let _ = self.driver.send_frame(&frame);
        }
    }

    fn handle_address_detection(&mut self) {
        for packet in self.udp.handle_address_detection() {
            if packet.source != AOG_SOURCE || packet.pgn != PGN_SUBNET_ANNOUNCE {
                continue;
            }
            let subnet = match parse_subnet_announce(&packet.payload) {
                Ok(subnet) => subnet,
                Err(e) => {
                    warn!("Bad subnet announcement: {}", e);
                    continue;
                }
            };
            if subnet == self.udp.subnet() {
                continue;
            }
            info!(
                "Subnet from AOG: {}.{}.{}, rebinding UDP connection",
                subnet[0], subnet[1], subnet[2]
            );
            self.settings.subnet = subnet;
            if let Err(e) = self.settings.save() {
                warn!("Could not persist settings: {}", e);
            }
            if let Err(e) = self.udp.rebind(subnet) {
                error!("Rebind failed: {}", e);
            }
        }
    }

    fn handle_aog_packets(&mut self) {
        for packet in self.udp.handle_incoming_packets() {
            if packet.source != AOG_SOURCE {
                continue;
            }
            match packet.pgn {
                PGN_STEER_DATA => match SteerData::parse(&packet.payload) {
                    Ok(steer) => self.handle_steer_data(steer),
                    Err(e) => warn!("Bad steer data packet: {}", e),
                },
                PGN_SECTION_CONTROL => match parse_section_control(&packet.payload) {
                    Ok(enabled) => {
                        info!(
                            "AOG requests section control {}",
                            if enabled { "enabled" } else { "disabled" }
                        );
                        self.server.update_section_control_enabled(enabled);
                    }
                    Err(e) => warn!("Bad section control packet: {}", e),
                },
                other => debug!("Ignoring AOG packet with PGN {:#04X}", other),
            }
        }
    }

    fn handle_steer_data(&mut self, steer: SteerData) {
        self.speed
            .set_machine_speed(kmh_tenths_to_mm_per_s(steer.speed_kmh_tenths));
        self.speed.set_machine_direction(MachineDirection::Forward);
        self.speed.set_machine_distance(0);

        let mut desired = steer.desired_sections();
        desired.resize(MAX_SECTIONS as usize, false);
        self.server.update_section_states(&desired);
    }

    fn pump_can(&mut self) {
        let now = self.now_ms();
        loop {
            match self.driver.receive_frame() {
                Ok(Some(frame)) => self.transport.process_frame(&mut self.server, &frame, now),
                Ok(None) => break,
                Err(e) => {
                    warn!("CAN receive error: {}", e);
                    break;
                }
            }
        }
        self.transport.update(&mut self.server, now);
        for frame in self.transport.take_tx() {
            if let Err(e) = self.driver.send_frame(&frame) {
                warn!("CAN transmit error: {}", e);
            }
        }
    }

    fn update_speed(&mut self) {
        let now = self.now_ms();
        let address = self.transport.local_address();
        match self.speed.update(now, address) {
            Ok(Some(frame)) => {
                if let Err(e) = self.driver.send_frame(&frame) {
                    warn!("Speed broadcast failed: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Could not build speed message: {}", e),
        }
    }

    fn send_heartbeats(&mut self) {
        let now = self.now_ms();
        if !heartbeat_due(self.last_heartbeat_ms, now) {
            return;
        }
        self.last_heartbeat_ms = Some(now);
        for (_, state) in self.server.clients() {
            self.udp.send(TC_SOURCE, PGN_HEARTBEAT, &heartbeat_payload(state));
        }
    }
}
