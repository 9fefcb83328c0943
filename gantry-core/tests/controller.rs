//! Controller scenarios over the loopback link

mod common;

use std::thread;
use std::time::Duration;

use common::{rig, run_host, wait_for_status, Mechanism, SimProbe, Store};
use gantry_core::config::DEFAULT_START_VELOCITY;
use gantry_core::motion::{AxisEvent, AxisEventQueue, AxisMotionSpec, LimitSwitch};
use gantry_core::state::{FaultKind, Status};
use gantry_core::{Controller, Handled, MotionEnd, Transition};
use gantry_hal::{ByteDevice, CalibrationStore, Scalar};
use gantry_protocol::loopback::pair;
use gantry_protocol::messages::{MSG_CALIBRATE, MSG_GET_STATUS, MSG_MOVE};
use gantry_protocol::{
    AxisId, AxisParam, CalibrationKey, Command, Direction, Frame, MoveRequest, Reply, ResultCode,
    Session, SessionError, StatusCode, ThermistorParam, TransportError,
};

const FAR: i64 = 100_000;

fn move_x(distance: i32, hold_velocity: u32) -> MoveRequest {
    MoveRequest {
        accel: 0,
        hold_velocity,
        distance,
        axis: AxisId::X,
        direction: if distance < 0 {
            Direction::Negative
        } else {
            Direction::Positive
        },
    }
}

#[test]
fn move_runs_full_trapezoid() {
    let mut mech = Mechanism::new(1000, 1000, FAR);
    let (mut ctl, host) = rig(&mech, Store::new());

    let (result, idle, position) = run_host(&mut ctl, &mut mech, host, |client| {
        let start = CalibrationKey::Axis {
            axis: AxisId::X,
            param: AxisParam::StartVelocity,
        };
        assert_eq!(client.calibrate(start, 490.0).unwrap(), ResultCode::Ok);

        let result = client.move_axis(move_x(1000, 500)).unwrap();
        let idle = wait_for_status(client, StatusCode::Idle);
        (result, idle, client.position().unwrap())
    });

    assert_eq!(result, ResultCode::Ok);
    assert_eq!(idle, StatusCode::Idle);
    assert_eq!(position, (1000, 0));
    assert_eq!(mech.abs[0], 2000);
    assert_eq!(
        mech.transitions,
        [
            Transition {
                from: Status::Idle,
                to: Status::Moving,
            },
            Transition {
                from: Status::Moving,
                to: Status::Idle,
            },
        ]
    );

    let x = ctl.axes().get(AxisId::X);
    assert_eq!(x.driver().first_rate, Some(490));
    assert_eq!(x.driver().max_rate, 500);
    assert_eq!(x.driver().step_rate, None);
    assert_eq!(x.driver().masked, 0);
}

#[test]
fn move_rejections_reported() {
    let mut mech = Mechanism::new(0, 1000, FAR);
    let (mut ctl, host) = rig(&mech, Store::new());

    let results = run_host(&mut ctl, &mut mech, host, |client| {
        let mismatch = MoveRequest {
            direction: Direction::Negative,
            ..move_x(100, 500)
        };
        let zero_accel = MoveRequest {
            accel: 0,
            ..move_x(100, 500)
        };
        [
            client.move_axis(move_x(0, 500)).unwrap(),
            client.move_axis(mismatch).unwrap(),
            // X sits on its home switch
            client.move_axis(move_x(-100, 500)).unwrap(),
            // Zero in the payload selects the calibrated acceleration
            client.move_axis(zero_accel).unwrap(),
        ]
    });

    assert_eq!(
        results,
        [
            ResultCode::ZeroDistance,
            ResultCode::DirectionMismatch,
            ResultCode::LimitBlocked,
            ResultCode::Ok,
        ]
    );
}

#[test]
fn homing_zeroes_both_axes() {
    let mut mech = Mechanism::new(300, 120, FAR);
    let (mut ctl, host) = rig(&mech, Store::new());

    let (home, idle, position, snapshot) = run_host(&mut ctl, &mut mech, host, |client| {
        let home = client.home().unwrap();
        let idle = wait_for_status(client, StatusCode::Idle);
        (
            home,
            idle,
            client.position().unwrap(),
            client.axis_state(AxisId::Y).unwrap(),
        )
    });

    assert_eq!(home, ResultCode::Ok);
    assert_eq!(idle, StatusCode::Idle);
    assert_eq!(position, (0, 0));
    assert!(!snapshot.moving);
    assert!(!snapshot.home_pressed);
    // Retract stops one count past the switch
    assert_eq!(mech.abs, [1, 1]);
    assert_eq!(ctl.status(), Status::Idle);
}

#[test]
fn homing_from_pressed_switches_retracts() {
    let mut mech = Mechanism::new(0, 0, FAR);
    let (mut ctl, host) = rig(&mech, Store::new());

    let idle = run_host(&mut ctl, &mut mech, host, |client| {
        assert_eq!(client.home().unwrap(), ResultCode::Ok);
        wait_for_status(client, StatusCode::Idle)
    });

    assert_eq!(idle, StatusCode::Idle);
    assert_eq!(mech.abs, [1, 1]);
}

#[test]
fn far_limit_faults_until_stop() {
    let mut mech = Mechanism::new(100, 100, 600);
    let (mut ctl, host) = rig(&mech, Store::new());

    let script = run_host(&mut ctl, &mut mech, host, |client| {
        assert_eq!(client.move_axis(move_x(1000, 500)).unwrap(), ResultCode::Ok);
        let fault = wait_for_status(client, StatusCode::Fault);
        let busy_move = client.move_axis(move_x(-10, 500)).unwrap();
        let busy_home = client.home().unwrap();
        client.stop().unwrap();
        let after_stop = client.status().unwrap();
        let retreat = client.move_axis(move_x(-10, 500)).unwrap();
        wait_for_status(client, StatusCode::Idle);
        (fault, busy_move, busy_home, after_stop, retreat)
    });

    assert_eq!(
        script,
        (
            StatusCode::Fault,
            ResultCode::Busy,
            ResultCode::Busy,
            StatusCode::Idle,
            ResultCode::Ok,
        )
    );
    assert_eq!(mech.abs[0], 600 - 10);
}

#[test]
fn fault_kind_is_unexpected_limit() {
    let mut mech = Mechanism::new(100, 100, 150);
    let (mut ctl, host) = rig(&mech, Store::new());

    run_host(&mut ctl, &mut mech, host, |client| {
        client.move_axis(move_x(1000, 500)).unwrap();
        wait_for_status(client, StatusCode::Fault);
    });
    assert_eq!(ctl.status(), Status::Fault(FaultKind::UnexpectedLimit));
    assert!(ctl.axes().get(AxisId::X).state().far_pressed);
}

#[test]
fn malformed_payloads_answered_with_invalid() {
    let mech = Mechanism::new(1000, 1000, FAR);
    let (mut ctl, host) = rig(&mech, Store::new());
    let mut mech = mech;

    let replies = run_host(&mut ctl, &mut mech, host, |client| {
        let session = client.session_mut();
        let mut replies = Vec::new();

        // Short move payload
        session.send(&Frame::new(MSG_MOVE, &[0; 3]).unwrap()).unwrap();
        replies.push(Reply::from_frame(&session.receive(1000).unwrap()).unwrap());

        // Unknown calibration key
        session
            .send(&Frame::new(MSG_CALIBRATE, &[0xEE, 0, 0, 0, 0]).unwrap())
            .unwrap();
        replies.push(Reply::from_frame(&session.receive(1000).unwrap()).unwrap());

        // Unknown id: acknowledged, then ignored
        session.send(&Frame::empty(0x40)).unwrap();
        client.ping(b"still here").unwrap();
        replies
    });

    assert_eq!(
        replies,
        vec![
            Reply::AxisResult(ResultCode::Invalid),
            Reply::AxisResult(ResultCode::Invalid),
        ]
    );
}

#[test]
fn calibrate_persists_and_enables_channels() {
    let mech = Mechanism::new(1000, 1000, FAR);
    let (mut ctl, host) = rig(&mech, Store::new());
    let mut mech = mech;

    let (temps, negative) = run_host(&mut ctl, &mut mech, host, |client| {
        for sensor in [0, 3, 4] {
            let key = CalibrationKey::Thermistor {
                sensor,
                param: ThermistorParam::Enabled,
            };
            assert_eq!(client.calibrate(key, 1.0).unwrap(), ResultCode::Ok);
        }
        let negative = client
            .calibrate(
                CalibrationKey::Axis {
                    axis: AxisId::Y,
                    param: AxisParam::HomeVelocity,
                },
                -5.0,
            )
            .unwrap();
        (client.temperature().unwrap(), negative)
    });

    assert_eq!(negative, ResultCode::Invalid);
    assert_eq!(temps[0], 20.0);
    assert!(temps[1].is_nan());
    assert!(temps[2].is_nan());
    // Enabled but open circuit
    assert!(temps[3].is_nan());
    assert_eq!(temps[4], 24.0);

    let key = CalibrationKey::Thermistor {
        sensor: 4,
        param: ThermistorParam::Enabled,
    };
    assert_eq!(ctl.store_mut().read(key.to_byte()), Ok(Scalar::Bool(true)));
}

#[test]
fn store_change_reloads_calibration() {
    let mech = Mechanism::new(1000, 1000, FAR);
    let mut store = Store::new();
    let key = CalibrationKey::Axis {
        axis: AxisId::X,
        param: AxisParam::StartVelocity,
    };
    store.write(key.to_byte(), Scalar::Float(120.0)).unwrap();
    let (mut ctl, _host) = rig(&mech, store);

    // Loaded at construction, not reported as a reload
    assert_eq!(ctl.calibration().axis(AxisId::X).start_velocity, 120);
    assert!(!ctl.poll().unwrap().reloaded);

    ctl.store_mut()
        .write(key.to_byte(), Scalar::Float(75.0))
        .unwrap();
    let outcome = ctl.poll().unwrap();
    assert!(outcome.reloaded);
    assert_eq!(ctl.calibration().axis(AxisId::X).start_velocity, 75);
    assert_eq!(
        ctl.calibration().axis(AxisId::Y).start_velocity,
        DEFAULT_START_VELOCITY
    );
    assert_eq!(outcome.handled, None::<Handled>);
}

#[test]
fn drained_events_report_motion_ends() {
    let mechanism = Mechanism::new(500, 500, FAR);
    let (mut ctl, _host) = rig(&mechanism, Store::new());
    let hold = AxisMotionSpec {
        direction: Direction::Positive,
        distance: 10,
        accel: 10,
        start_velocity: 50,
        hold_velocity: 50,
    };
    ctl.axes_mut().get_mut(AxisId::X).start(&hold).unwrap();
    ctl.axes_mut().get_mut(AxisId::Y).start(&hold).unwrap();

    let mut queue: AxisEventQueue<32> = AxisEventQueue::new();
    let (mut tx, mut rx) = queue.split();
    for _ in 0..10 {
        tx.enqueue(AxisEvent::Encoder(AxisId::X)).unwrap();
    }
    tx.enqueue(AxisEvent::Limit {
        axis: AxisId::Y,
        switch: LimitSwitch::Far,
        pressed: true,
        at_ms: 2000,
    })
    .unwrap();

    let mut ends = Vec::new();
    assert_eq!(ctl.drain_events(&mut rx, |end| ends.push(end)), 11);
    assert_eq!(
        ends,
        [
            MotionEnd::Completed(AxisId::X),
            MotionEnd::Limit(AxisId::Y, LimitSwitch::Far)
        ]
    );
    assert!(!ctl.axes().any_moving());
    assert_eq!(ctl.axes().positions(), (10, 0));
}

fn y_acceleration() -> CalibrationKey {
    CalibrationKey::Axis {
        axis: AxisId::Y,
        param: AxisParam::Acceleration,
    }
}

fn wire(command: Command) -> Vec<u8> {
    command.to_frame().unwrap().encode_to_vec().unwrap().to_vec()
}

#[test]
fn unacknowledged_reply_does_not_block_poll() {
    let mech = Mechanism::new(1000, 1000, FAR);
    let (mut host, device) = pair();
    let mut ctl = Controller::new(
        Session::with_ack_timeout(device, 20),
        mech.drivers(),
        SimProbe,
        Store::new(),
    );

    host.write(&wire(Command::GetStatus)).unwrap();
    let outcome = ctl.poll().unwrap();
    assert_eq!(
        outcome.handled,
        Some(Handled::Executed {
            id: MSG_GET_STATUS,
            result: None
        })
    );
    assert!(ctl.session().awaiting_ack());

    // Limit edges still stop a motion while the reply is unacknowledged
    let run = AxisMotionSpec {
        direction: Direction::Positive,
        distance: 1000,
        accel: 10,
        start_velocity: 50,
        hold_velocity: 50,
    };
    ctl.axes_mut().get_mut(AxisId::X).start(&run).unwrap();
    let end = ctl.handle_axis_event(AxisEvent::Limit {
        axis: AxisId::X,
        switch: LimitSwitch::Far,
        pressed: true,
        at_ms: 2000,
    });
    assert_eq!(end, Some(MotionEnd::Limit(AxisId::X, LimitSwitch::Far)));

    // The overdue ACK fails a later poll, which still reports the reload
    ctl.store_mut()
        .write(y_acceleration().to_byte(), Scalar::Float(75.0))
        .unwrap();
    thread::sleep(Duration::from_millis(30));
    let err = ctl.poll().unwrap_err();
    assert!(err.error.is_timeout());
    assert!(err.outcome.reloaded);
    assert_eq!(ctl.calibration().axis(AxisId::Y).acceleration, 75);
    assert!(!ctl.session().awaiting_ack());
    assert!(!ctl.poll().unwrap().reloaded);
}

#[test]
fn failed_reply_keeps_poll_outcome() {
    let mech = Mechanism::new(1000, 1000, FAR);
    let (mut host, mut device) = pair();
    device.set_write_limit(Some(2));
    let mut ctl = Controller::new(Session::new(device), mech.drivers(), SimProbe, Store::new());

    ctl.store_mut()
        .write(y_acceleration().to_byte(), Scalar::Float(75.0))
        .unwrap();
    host.write(&wire(Command::GetStatus)).unwrap();

    let err = ctl.poll().unwrap_err();
    assert_eq!(
        err.error,
        SessionError::Transport(TransportError::SendFailed)
    );
    assert!(err.outcome.reloaded);
    assert_eq!(ctl.calibration().axis(AxisId::Y).acceleration, 75);
}
