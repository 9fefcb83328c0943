//! Session and client over the in-process loopback link

use gantry_hal::ByteDevice;
use gantry_protocol::frame::Frame;
use gantry_protocol::loopback::{pair, LoopbackEndpoint};
use gantry_protocol::messages::{MSG_ACK, MSG_GET_STATUS, MSG_PING, MSG_STOP};
use gantry_protocol::{
    Client, ClientError, Command, Reply, Session, SessionError, StatusCode, TransportError,
};
use std::thread;

/// Minimal device side: answers ping and get_status, acknowledges the rest
fn responder(device: LoopbackEndpoint, requests: usize) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut session = Session::new(device);
        let mut seen = Vec::new();
        while seen.len() < requests {
            let frame = match session.receive(2000) {
                Ok(frame) => frame,
                Err(_) => break,
            };
            seen.push(frame.id);
            let reply = match Command::from_frame(&frame) {
                Ok(Command::Ping(data)) => Some(Reply::Log(data)),
                Ok(Command::GetStatus) => Some(Reply::Status(StatusCode::Idle)),
                _ => None,
            };
            if let Some(reply) = reply {
                session.send(&reply.to_frame().unwrap()).unwrap();
            }
        }
        seen
    })
}

#[test]
fn client_round_trips_over_loopback() {
    let (host, device) = pair();
    let handle = responder(device, 3);

    let mut client = Client::new(host);
    client.ping(b"hello gantry").unwrap();
    assert_eq!(client.status().unwrap(), StatusCode::Idle);
    client.stop().unwrap();

    let seen = handle.join().unwrap();
    assert_eq!(seen, vec![MSG_PING, MSG_GET_STATUS, MSG_STOP]);
}

#[test]
fn send_times_out_without_peer() {
    let (host, _device) = pair();
    let mut session = Session::with_ack_timeout(host, 30);

    let err = session.send(&Frame::empty(MSG_STOP)).unwrap_err();
    assert_eq!(err, SessionError::Transport(TransportError::Timeout));
}

#[test]
fn short_write_reported_as_send_failed() {
    let (mut host, _device) = pair();
    host.set_write_limit(Some(2));
    let mut client = Client::new(host);

    assert_eq!(
        client.stop(),
        Err(ClientError::Session(SessionError::Transport(
            TransportError::SendFailed
        )))
    );
}

#[test]
fn inbound_frame_is_acknowledged_on_the_wire() {
    let (host, mut device) = pair();
    host.inject(&Frame::empty(MSG_GET_STATUS).encode_to_vec().unwrap())
        .unwrap();
    let mut session = Session::new(host);

    let frame = session.check_for_message().unwrap().unwrap();
    assert_eq!(frame.id, MSG_GET_STATUS);

    let mut ack = Vec::new();
    while device.available() > 0 {
        ack.push(device.read_byte().unwrap());
    }
    assert_eq!(ack, Frame::empty(MSG_ACK).encode_to_vec().unwrap().to_vec());
}

#[test]
fn closed_endpoint_rejects_io() {
    let (mut host, _device) = pair();
    host.close();
    assert!(host.write(&[1, 2, 3]).is_err());
    host.open(gantry_hal::DEFAULT_BAUDRATE).unwrap();
    assert_eq!(host.write(&[1, 2, 3]), Ok(3));
}
