//! 控制器集成测试
//!
//! 完整的 `Microscope`（真实分发线程）连接到脚本化的模拟设备。

use mrcl_sdk::driver::{DispatchConfig, DriverError, Microscope, MicroscopeBuilder, MoveRequest};
use mrcl_sdk::protocol::{AxisId, ProtocolError, SpotStatus};
use mrcl_sdk::prelude::AxisStatus;
use mrcl_transport::{DeviceErrorKind, MockDevice};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> DispatchConfig {
    DispatchConfig {
        receive_timeout_ms: 20,
        reply_timeout_ms: 500,
        connection_timeout_ms: 200,
        join_timeout_ms: 1000,
    }
}

fn connect(device: &MockDevice) -> Microscope {
    MicroscopeBuilder::new()
        .dispatch_config(fast_config())
        .build_with(device.transport())
        .unwrap()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_unsolicited_lines_reach_cache_and_signals() {
    let device = MockDevice::new();
    let microscope = connect(&device);

    device.inject("X:ID1,12.500,340,1");
    assert!(wait_until(Duration::from_secs(2), || microscope.position(AxisId::X).is_some()));
    assert_eq!(microscope.position(AxisId::X), Some(12.5));

    let state = microscope.axis_state(AxisId::X);
    assert_eq!(state.steps, Some(340));
    assert_eq!(state.homed, Some(true));

    device.inject("$X1,45.0");
    assert!(wait_until(Duration::from_secs(2), || microscope.speed(AxisId::X).is_some()));
    assert_eq!(microscope.speed(AxisId::X), Some(45.0));

    // 其它轴不受影响
    assert_eq!(microscope.position(AxisId::Y), None);

    let metrics = microscope.metrics();
    assert_eq!(metrics.status_updates, 1);
    assert_eq!(metrics.speed_updates, 1);
    assert!(metrics.is_consistent());
    microscope.shutdown().unwrap();
}

#[test]
fn test_wait_for_position_update() {
    let device = MockDevice::new();
    let microscope = connect(&device);

    let injector = {
        let device = device.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            device.inject("Z:I4,60.000,1200,0");
        })
    };
    assert!(microscope.wait_for_position_update(AxisId::Z, Duration::from_secs(2)));
    injector.join().unwrap();
    assert_eq!(microscope.position(AxisId::Z), Some(60.0));
    assert!(!microscope.wait_for_speed_update(AxisId::Z, Duration::from_millis(50)));
}

#[test]
fn test_linear_and_rotary_status() {
    let device = MockDevice::new();
    device.respond("$C6", ["C:I2,45.125,900,1"]);
    device.respond("$R6", ["R:I7,-30.000"]);
    let microscope = connect(&device);

    assert_eq!(
        microscope.axis(AxisId::C).status().unwrap(),
        AxisStatus::Linear {
            position: 45.125,
            steps: 900,
            homed: true
        }
    );
    assert_eq!(microscope.axis(AxisId::R).get_position().unwrap(), -30.0);
    assert_eq!(device.written(), vec!["$C6", "$R6"]);
}

#[test]
fn test_rotary_status_ignores_stale_queue_line() {
    let device = MockDevice::new();
    let microscope = connect(&device);

    // 一条无关的行先进入未匹配队列
    device.inject("b:I1,1,80");
    assert!(wait_until(Duration::from_secs(2), || microscope.metrics().unmatched_lines == 1));

    device.respond("$A6", ["A:I3,12.000"]);
    assert_eq!(microscope.axis(AxisId::A).get_position().unwrap(), 12.0);
}

#[test]
fn test_status_with_garbage_reply_is_parse_error() {
    let device = MockDevice::new();
    device.respond("$B6", ["ERROR 17"]);
    let microscope = connect(&device);

    let err = microscope.axis(AxisId::B).status().unwrap_err();
    assert!(matches!(
        err,
        DriverError::Protocol(ProtocolError::Parse { ref line, .. }) if line == "ERROR 17"
    ));
}

#[test]
fn test_status_with_malformed_fields_is_protocol_error() {
    let device = MockDevice::new();
    device.respond("$X6", ["X:ID1,12.x,340,1"]);
    let microscope = connect(&device);

    let started = Instant::now();
    let err = microscope.axis(AxisId::X).status().unwrap_err();
    assert!(
        matches!(
            err,
            DriverError::Protocol(ProtocolError::InvalidField { field: "position", .. })
        ),
        "{err:?}"
    );
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(microscope.position(AxisId::X), None);

    // 下一次查询不受上一条非法应答影响
    device.respond("$X6", ["X:ID1,12.500,340,1"]);
    assert_eq!(microscope.axis(AxisId::X).get_position().unwrap(), 12.5);
}

#[test]
fn test_malformed_speed_line_keeps_dispatch_alive() {
    let device = MockDevice::new();
    let microscope = connect(&device);

    device.inject("$X1,abc");
    assert!(wait_until(Duration::from_secs(2), || microscope.metrics().parse_errors == 1));
    assert!(microscope.is_dispatch_alive());
    assert_eq!(microscope.speed(AxisId::X), None);

    device.inject("$X1,30");
    assert!(wait_until(Duration::from_secs(2), || microscope.speed(AxisId::X).is_some()));
    assert_eq!(microscope.speed(AxisId::X), Some(30.0));
    assert!(microscope.metrics().is_consistent());
    microscope.shutdown().unwrap();
}

#[test]
fn test_status_without_reply_times_out() {
    let device = MockDevice::new();
    let microscope = connect(&device);
    let started = Instant::now();
    assert!(matches!(
        microscope.axis(AxisId::Y).status(),
        Err(DriverError::Timeout)
    ));
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[test]
fn test_synchronized_move_equal_distances() {
    let device = MockDevice::new();
    device.respond("$X6", ["X:ID1,10.000,100,1"]);
    device.respond("$Y6", ["Y:ID1,20.000,200,1"]);
    let microscope = connect(&device);

    let plan = microscope
        .move_absolute(
            &[
                MoveRequest::new(AxisId::X, 30.0, 50.0),
                MoveRequest::new(AxisId::Y, 40.0, 50.0),
            ],
            true,
        )
        .unwrap();

    assert_eq!(plan[0].travel_time, plan[1].travel_time);
    assert!(plan.iter().all(|m| m.speed == 50.0));
    assert_eq!(
        device.written(),
        vec!["$X6", "$Y6", "$X3,50,30.000", "$Y3,50,40.000"]
    );
}

#[test]
fn test_synchronized_move_scales_shorter_axis() {
    let device = MockDevice::new();
    device.respond("$X6", ["X:ID1,0.000,0,1"]);
    device.respond("$C6", ["C:ID2,0.000,0,1"]);
    let microscope = connect(&device);

    // X: 70mm / (70/4.5) = 4.5s，C: 60mm / (120/7.5) = 3.75s
    let plan = microscope
        .move_absolute(
            &[
                MoveRequest::new(AxisId::X, 70.0, 100.0),
                MoveRequest::new(AxisId::C, 60.0, 100.0),
            ],
            true,
        )
        .unwrap();

    assert_eq!(plan[0].speed, 100.0);
    assert!((plan[1].speed - 100.0 * 3.75 / 4.5).abs() < 1e-9);
    assert_eq!(
        &device.written()[2..],
        &["$X3,100,70.000".to_string(), "$C3,83,60.000".to_string()]
    );
}

#[test]
fn test_out_of_limits_move_writes_nothing() {
    let device = MockDevice::new();
    let microscope = connect(&device);

    let err = microscope
        .move_absolute(
            &[
                MoveRequest::new(AxisId::X, 10.0, 50.0),
                MoveRequest::new(AxisId::Z, 121.0, 50.0),
            ],
            false,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DriverError::OutOfLimits {
            axis: AxisId::Z,
            min,
            max,
            ..
        } if min == 0.0 && max == 120.0
    ));
    assert!(device.written().is_empty());
}

#[test]
fn test_accessories_through_dispatch() {
    let device = MockDevice::new();
    device.respond("$b6", ["b:I1,1,65"]);
    device.respond("$c6", ["c:I8,0,10,255,15"]);
    let microscope = connect(&device);

    microscope.ring().on().unwrap();
    microscope.matrix().adjust_intensity(30).unwrap();
    microscope.spot().off().unwrap();
    assert_eq!(
        microscope.spot().status().unwrap(),
        SpotStatus {
            on: true,
            intensity: 65
        }
    );

    let ring = microscope.ring().status().unwrap();
    assert!(!ring.on);
    assert_eq!(ring.active_leds, (1..=8).collect::<Vec<u8>>());
    assert!(ring.colors.white);

    assert_eq!(
        device.written(),
        vec!["$c1", "$a2,30", "$b0", "$b6", "$c6"]
    );
}

#[test]
fn test_probe_and_connection_state() {
    let device = MockDevice::new();
    let microscope = connect(&device);

    assert!(microscope.test().unwrap());
    assert!(microscope.is_connected());

    // 200ms 无数据即视为断开
    thread::sleep(Duration::from_millis(300));
    assert!(!microscope.is_connected());
}

#[test]
fn test_fatal_transport_error_surfaces() {
    let device = MockDevice::new();
    let microscope = connect(&device);

    device.fail_with(DeviceErrorKind::Disconnected);
    assert!(wait_until(Duration::from_secs(2), || !microscope.is_dispatch_alive()));

    let reason = microscope.dispatch_error().unwrap();
    assert!(reason.contains("Disconnected"), "{reason}");
    assert!(matches!(
        microscope.axis(AxisId::X).stop(),
        Err(DriverError::DispatchStopped(_))
    ));
    assert!(matches!(
        microscope.axis(AxisId::X).status(),
        Err(DriverError::DispatchStopped(_))
    ));
    assert!(matches!(
        microscope.shutdown(),
        Err(DriverError::Transport(_))
    ));
}

#[test]
fn test_concurrent_status_queries_do_not_steal_replies() {
    let device = MockDevice::new();
    device.respond("$A6", ["A:I3,11.000"]);
    device.respond("$b6", ["b:I1,0,42"]);
    let microscope = std::sync::Arc::new(connect(&device));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let microscope = microscope.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    if i % 2 == 0 {
                        assert_eq!(microscope.axis(AxisId::A).get_position().unwrap(), 11.0);
                    } else {
                        assert_eq!(microscope.spot().status().unwrap().intensity, 42);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(microscope.metrics().commands_written, 20);
}
