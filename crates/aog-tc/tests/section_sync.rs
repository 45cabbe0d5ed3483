//! Section state synchronisation between AOG and the implement: actual
//! states flowing into the heartbeat, desired states flowing out as
//! condensed setpoints, and the auto/manual mode switch.

mod common;

use aog_tc::aog::{
    encode_packet, heartbeat_payload, parse_section_control, Deframer, AOG_SOURCE,
    PGN_SECTION_CONTROL,
};
use aog_tc::can::PGN_PROCESS_DATA;
use aog_tc::process_data::{decode_value_command, ProcessDataCommand};
use aog_tc::types::ddi;
use aog_tc::{TaskControllerServer, Transport, TransportConfig};
use common::{sprayer_pool, ClientSim, CLIENT_NAME};

fn setup_with_sections(sections: u16) -> (Transport, TaskControllerServer, ClientSim, u64) {
    let mut transport = Transport::new(TransportConfig::default());
    let mut server = TaskControllerServer::new();
    transport.start(0);
    transport.update(&mut server, 300);
    transport.take_tx();

    let client = ClientSim::new();
    let now = 400;
    transport.process_frame(&mut server, &client.address_claim(), now);
    let tc = transport.local_address();
    let pool = sprayer_pool(sections);
    transport.process_frame(&mut server, &client.request_pool_transfer(tc, pool.len() as u32), now);
    for frame in client.pool_transfer_frames(tc, &pool) {
        transport.process_frame(&mut server, &frame, now);
    }
    transport.process_frame(&mut server, &client.activate_pool(tc), now);
    transport.take_tx();
    (transport, server, client, now)
}

#[test]
fn actual_condensed_state_shows_up_in_heartbeat() {
    let (mut transport, mut server, client, now) = setup_with_sections(3);

    // Sections 1 and 2 report on.
    let value = 0b0101;
    let frame = client.value_command(
        transport.local_address(),
        ddi::ACTUAL_CONDENSED_WORK_STATE_1_16,
        5,
        value,
    );
    transport.process_frame(&mut server, &frame, now);

    let state = server.client(&CLIENT_NAME).unwrap();
    let heartbeat = heartbeat_payload(state);
    assert_eq!(heartbeat, [0, 3, 0b0000_0011]);

    // And the heartbeat survives the AOG framing round trip.
    let packet = encode_packet(0x80, 0xF0, &heartbeat).unwrap();
    let mut deframer = Deframer::new();
    deframer.extend(&packet);
    let decoded = deframer.next_packet().unwrap();
    assert_eq!(decoded.source, 0x80);
    assert_eq!(decoded.pgn, 0xF0);
    assert_eq!(decoded.payload, heartbeat);
}

#[test]
fn desired_sections_flush_as_condensed_setpoints() {
    let (mut transport, mut server, _client, now) = setup_with_sections(20);
    server.update_section_control_enabled(true);
    transport.update(&mut server, now + 100);
    transport.take_tx();

    let mut desired = vec![true; 17];
    desired.extend_from_slice(&[false; 3]);
    server.update_section_states(&desired);
    transport.update(&mut server, now + 200);
    let frames = transport.take_tx();

    let set_values: Vec<_> = frames
        .iter()
        .filter(|f| f.id.pgn() == PGN_PROCESS_DATA)
        .filter_map(|f| decode_value_command(&f.data).ok())
        .filter(|c| c.command == ProcessDataCommand::Value)
        .collect();
    assert_eq!(set_values.len(), 3);

    assert_eq!(set_values[0].ddi, ddi::SETPOINT_CONDENSED_WORK_STATE_1_16);
    assert_eq!(set_values[0].element_number, 5);
    assert_eq!(set_values[0].value as u32, 0x5555_5555);

    assert_eq!(set_values[1].ddi, ddi::SETPOINT_CONDENSED_WORK_STATE_1_16 + 1);
    assert_eq!(set_values[1].value as u32, 0xFFFF_FF01);

    assert_eq!(set_values[2].ddi, ddi::SETPOINT_WORK_STATE);
    assert_eq!(set_values[2].value, 1);
}

#[test]
fn manual_mode_suppresses_setpoints() {
    let (mut transport, mut server, _client, now) = setup_with_sections(3);
    server.update_section_states(&[true, true, true]);
    transport.update(&mut server, now + 100);
    let frames = transport.take_tx();
    assert!(frames
        .iter()
        .filter_map(|f| decode_value_command(&f.data).ok())
        .all(|c| c.command != ProcessDataCommand::Value));
}

#[test]
fn aog_mode_switch_reaches_the_implement_once() {
    let (mut transport, mut server, _client, now) = setup_with_sections(3);

    // AOG requests auto mode over the wire.
    let packet = encode_packet(AOG_SOURCE, PGN_SECTION_CONTROL, &[1]).unwrap();
    let mut deframer = Deframer::new();
    deframer.extend(&packet);
    let decoded = deframer.next_packet().unwrap();
    assert_eq!(decoded.source, AOG_SOURCE);
    assert_eq!(decoded.pgn, PGN_SECTION_CONTROL);
    let enabled = parse_section_control(&decoded.payload).unwrap();
    server.update_section_control_enabled(enabled);

    transport.update(&mut server, now + 100);
    let frames = transport.take_tx();
    let commands: Vec<_> = frames
        .iter()
        .filter_map(|f| decode_value_command(&f.data).ok())
        .filter(|c| c.command == ProcessDataCommand::Value)
        .collect();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].ddi, ddi::SECTION_CONTROL_STATE);
    assert_eq!(commands[0].value, 1);

    // Re-sending the same mode is a no-op.
    server.update_section_control_enabled(true);
    transport.update(&mut server, now + 200);
    let frames = transport.take_tx();
    assert!(frames
        .iter()
        .filter_map(|f| decode_value_command(&f.data).ok())
        .all(|c| c.command != ProcessDataCommand::Value));
}

#[test]
fn setpoint_work_state_follows_any_section_on() {
    let (mut transport, mut server, _client, now) = setup_with_sections(3);
    server.update_section_control_enabled(true);
    transport.update(&mut server, now + 100);
    transport.take_tx();

    server.update_section_states(&[true, false, false]);
    let on_commands = server.take_pending_commands();
    assert!(on_commands.iter().any(|c| matches!(
        c,
        aog_tc::TcCommand::SetValue {
            ddi: ddi::SETPOINT_WORK_STATE,
            value: 1,
            ..
        }
    )));

    server.update_section_states(&[false, false, false]);
    let off_commands = server.take_pending_commands();
    assert!(off_commands.iter().any(|c| matches!(
        c,
        aog_tc::TcCommand::SetValue {
            ddi: ddi::SETPOINT_WORK_STATE,
            value: 0,
            ..
        }
    )));
}
