//! 连接显微镜，回零后做一次 X/Y 同步运动，并打开环形照明
//!
//! 用法：`cargo run --example stage_tour -- /dev/ttyUSB0`
//! 或：`cargo run --example stage_tour -- --config microscope.toml`

use mrcl_sdk::prelude::*;
use std::time::Duration;
use tracing::{info, warn};

fn connect(args: &[String]) -> Result<Microscope, DriverError> {
    match args {
        [flag, path] if flag == "--config" => {
            let config = MicroscopeConfig::load(path)?;
            MicroscopeBuilder::from_config(&config).build()
        },
        [port] => MicroscopeBuilder::new().serial(port.as_str()).build(),
        _ => MicroscopeBuilder::new().serial("/dev/ttyUSB0").build(),
    }
}

fn main() -> Result<(), DriverError> {
    mrcl_sdk::init_logger();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let microscope = connect(&args)?;

    if !microscope.test()? {
        warn!("MRCL700 did not echo the probe command");
        return Ok(());
    }

    microscope.auto_home()?;
    for axis in [AxisId::X, AxisId::Y] {
        if !microscope.wait_for_position_update(axis, Duration::from_secs(10)) {
            warn!("No position update from axis {} while homing", axis);
        }
    }

    let plan = microscope.move_absolute(
        &[
            MoveRequest::new(AxisId::X, 35.0, 60.0),
            MoveRequest::new(AxisId::Y, 10.0, 60.0),
        ],
        true,
    )?;
    for planned in &plan {
        info!(
            "Axis {} -> {:.3} at {:.0}% ({:.2}s at full speed)",
            planned.axis, planned.target, planned.speed, planned.travel_time
        );
    }

    let ring = microscope.ring();
    ring.on()?;
    ring.adjust_intensity(40)?;
    ring.set_colors(false, false, false, true)?;
    info!("Ring illumination: {:?}", ring.status()?);

    for axis in AxisId::ALL {
        let actuator = microscope.axis(axis);
        match actuator.status() {
            Ok(status) => info!(
                "{} ({}): {:.3} {}",
                axis,
                actuator.spec().description,
                status.position(),
                actuator.kind().unit()
            ),
            Err(e) => warn!("Axis {} status failed: {}", axis, e),
        }
    }

    let metrics = microscope.metrics();
    info!(
        "{} lines received, {} unmatched, {} commands written",
        metrics.lines_total, metrics.unmatched_lines, metrics.commands_written
    );
    microscope.shutdown()
}
