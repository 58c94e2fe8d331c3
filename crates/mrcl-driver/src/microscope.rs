//! Microscope API 模块
//!
//! 提供对外的 `Microscope` 结构体，持有分发线程、命令链路以及全部轴和照明附件。

use crate::actuator::{Actuator, check_move_speed};
use crate::error::DriverError;
use crate::illumination::{MatrixIllumination, RingIllumination, SpotIllumination, check_percentage};
use crate::link::CommandLink;
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::pipeline::{DispatchConfig, dispatch_loop};
use crate::state::{AxisState, DriverContext};
use mrcl_protocol::{AxisId, MOVE_SPEED_MAX, MOVE_SPEED_MIN, SystemCommand};
use mrcl_transport::{LineReader, SplittableTransport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // Watchdog thread joins the target; the receiver may have given up already
        thread::spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 多轴绝对运动中单个轴的请求
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    pub axis: AxisId,
    /// 目标位置（mm 或 deg）
    pub target: f64,
    /// 速度百分比（1..=100）
    pub speed: f64,
}

impl MoveRequest {
    pub fn new(axis: AxisId, target: f64, speed: f64) -> Self {
        Self {
            axis,
            target,
            speed,
        }
    }
}

/// 实际下发的单轴运动
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedMove {
    pub axis: AxisId,
    pub target: f64,
    /// 下发的速度百分比（同步模式下已按行程时间缩放）
    pub speed: f64,
    /// 以 100% 速度走完本次行程所需时间（秒）
    pub travel_time: f64,
}

/// 在写出任何命令之前检查整批请求
fn validate_requests(requests: &[MoveRequest]) -> Result<(), DriverError> {
    for (i, request) in requests.iter().enumerate() {
        if requests[..i].iter().any(|r| r.axis == request.axis) {
            return Err(DriverError::invalid(format!(
                "axis {} requested more than once",
                request.axis
            )));
        }
        check_move_speed(request.speed)?;

        let spec = request.axis.spec();
        if !request.target.is_finite() || !spec.contains(request.target) {
            return Err(DriverError::OutOfLimits {
                axis: request.axis,
                target: request.target,
                min: spec.min,
                max: spec.max,
            });
        }
    }
    Ok(())
}

/// 计算每个轴的下发速度
///
/// `current` 与 `requests` 一一对应。同步模式下速度按 `行程时间 / 最长行程时间` 缩放，
/// 使所有轴同时到达；缩放后的速度限制在 [1, 100]。
pub fn plan_move(requests: &[MoveRequest], current: &[f64], sync: bool) -> Vec<PlannedMove> {
    let travel_times: Vec<f64> = requests
        .iter()
        .zip(current)
        .map(|(r, &from)| r.axis.spec().travel_time(from, r.target))
        .collect();
    let longest = travel_times.iter().copied().fold(0.0_f64, f64::max);

    requests
        .iter()
        .zip(travel_times)
        .map(|(r, travel_time)| {
            let speed = if sync {
                let ratio = if longest > 0.0 {
                    travel_time / longest
                } else {
                    1.0
                };
                (r.speed * ratio).clamp(MOVE_SPEED_MIN, MOVE_SPEED_MAX)
            } else {
                r.speed
            };
            PlannedMove {
                axis: r.axis,
                target: r.target,
                speed,
                travel_time,
            }
        })
        .collect()
}

/// MRCL700 显微镜控制器（对外 API）
///
/// 构造时启动分发线程，`shutdown()` 或 Drop 时停止并等待其退出。
pub struct Microscope {
    ctx: Arc<DriverContext>,
    link: Arc<CommandLink>,
    metrics: Arc<DispatchMetrics>,
    axes: [Actuator; 7],
    ring: RingIllumination,
    matrix: MatrixIllumination,
    spot: SpotIllumination,
    /// 分发线程句柄（停止时 join）
    dispatch_thread: Option<JoinHandle<()>>,
    /// 运行标志（分发线程每轮检查）
    is_running: Arc<AtomicBool>,
    config: DispatchConfig,
}

impl Microscope {
    /// 接管传输并启动分发线程
    ///
    /// 传输被拆分为读写两半：读半部移交分发线程独占，写半部留在前台。
    pub fn new<T>(mut transport: T, config: DispatchConfig) -> Result<Self, DriverError>
    where
        T: SplittableTransport,
    {
        transport.flush_read_buffer()?;
        let (rx, tx) = transport.split()?;

        let ctx = Arc::new(DriverContext::new(config.connection_timeout()));
        let metrics = Arc::new(DispatchMetrics::new());
        let is_running = Arc::new(AtomicBool::new(true));
        let link = Arc::new(CommandLink::new(
            Box::new(tx),
            ctx.clone(),
            metrics.clone(),
            config.reply_timeout(),
        ));

        let dispatch_thread = {
            let reader = LineReader::new(rx);
            let ctx = ctx.clone();
            let loop_config = config.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            thread::Builder::new()
                .name("mrcl-dispatch".into())
                .spawn(move || dispatch_loop(reader, ctx, loop_config, is_running, metrics))
                .map_err(|e| DriverError::IoThread(e.to_string()))?
        };
        info!("Microscope connected, dispatch thread started");

        Ok(Self {
            axes: AxisId::ALL.map(|axis| Actuator::new(axis.spec(), link.clone())),
            ring: RingIllumination::new(link.clone()),
            matrix: MatrixIllumination::new(link.clone()),
            spot: SpotIllumination::new(link.clone()),
            ctx,
            link,
            metrics,
            dispatch_thread: Some(dispatch_thread),
            is_running,
            config,
        })
    }

    pub fn axis(&self, axis: AxisId) -> &Actuator {
        &self.axes[axis.index()]
    }

    pub fn axes(&self) -> &[Actuator; 7] {
        &self.axes
    }

    pub fn ring(&self) -> &RingIllumination {
        &self.ring
    }

    pub fn matrix(&self) -> &MatrixIllumination {
        &self.matrix
    }

    pub fn spot(&self) -> &SpotIllumination {
        &self.spot
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// 设备探测：发 `$*8`，设备原样回显即认为在线
    ///
    /// 应答超时返回 `Ok(false)`，其它错误照常返回。
    pub fn test(&self) -> Result<bool, DriverError> {
        let probe = SystemCommand::StatusLed(None);
        let mut exchange = self.link.exchange();
        exchange.send(&probe)?;
        match exchange.next_line() {
            Ok(line) => Ok(line == probe.to_string()),
            Err(DriverError::Timeout) => {
                warn!("Device did not answer the presence probe");
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }

    /// 所有轴回零（不等待完成）
    pub fn auto_home(&self) -> Result<(), DriverError> {
        self.link.send(&SystemCommand::AutoHomeAll)
    }

    /// 急停所有轴
    pub fn emergency_stop(&self) -> Result<(), DriverError> {
        self.link.send(&SystemCommand::EmergencyStop)
    }

    /// 状态灯亮度（0..=100）
    pub fn set_status_led_intensity(&self, percentage: u8) -> Result<(), DriverError> {
        let percentage = check_percentage(percentage)?;
        self.link.send(&SystemCommand::StatusLed(Some(percentage)))
    }

    /// 多轴绝对运动
    ///
    /// 1. 整批检查：轴不重复、速度在 [1, 100]、目标在行程内；任一失败则不写任何命令
    /// 2. 逐轴查询当前位置，计算行程时间
    /// 3. `sync = true` 时按行程时间缩放速度，使各轴同时到达
    ///
    /// 返回实际下发的运动。
    pub fn move_absolute(
        &self,
        requests: &[MoveRequest],
        sync: bool,
    ) -> Result<Vec<PlannedMove>, DriverError> {
        validate_requests(requests)?;

        let current = requests
            .iter()
            .map(|r| self.axis(r.axis).get_position())
            .collect::<Result<Vec<_>, _>>()?;

        let plan = plan_move(requests, &current, sync);
        for planned in &plan {
            self.axis(planned.axis)
                .move_absolute(planned.speed, planned.target)?;
        }
        info!(
            "Started {} move on {} axes",
            if sync { "synchronized" } else { "independent" },
            plan.len()
        );
        Ok(plan)
    }

    /// 缓存中的位置
    pub fn position(&self, axis: AxisId) -> Option<f64> {
        self.ctx.cache.load(axis).position
    }

    /// 缓存中的速度
    pub fn speed(&self, axis: AxisId) -> Option<f64> {
        self.ctx.cache.load(axis).speed
    }

    pub fn axis_state(&self, axis: AxisId) -> AxisState {
        self.ctx.cache.load(axis)
    }

    pub fn wait_for_position_update(&self, axis: AxisId, timeout: Duration) -> bool {
        self.axis(axis).wait_for_position_update(timeout)
    }

    pub fn wait_for_speed_update(&self, axis: AxisId, timeout: Duration) -> bool {
        self.axis(axis).wait_for_speed_update(timeout)
    }

    /// 分发线程是否仍在运行
    pub fn is_dispatch_alive(&self) -> bool {
        self.dispatch_thread
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 分发线程因致命错误退出时的原因
    pub fn dispatch_error(&self) -> Option<String> {
        self.ctx.fatal_message()
    }

    /// 最近 `connection_timeout_ms` 内是否收到过任何行
    pub fn is_connected(&self) -> bool {
        self.ctx.connection.is_connected()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 停止分发线程并返回其退出原因
    ///
    /// 分发线程因传输错误退出时，返回该错误（`DriverError::Transport`）。
    pub fn shutdown(mut self) -> Result<(), DriverError> {
        self.stop_dispatch()?;
        match self.ctx.take_fatal() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn stop_dispatch(&mut self) -> Result<(), DriverError> {
        // Release: 之前的写入对分发线程可见
        self.is_running.store(false, Ordering::Release);

        let Some(handle) = self.dispatch_thread.take() else {
            return Ok(());
        };
        let join_timeout = self.config.join_timeout();
        if let Err(_e) = handle.join_timeout(join_timeout) {
            error!(
                "Dispatch thread panicked or failed to shut down within {:?}",
                join_timeout
            );
            return Err(DriverError::IoThread(format!(
                "dispatch thread did not stop within {join_timeout:?}"
            )));
        }
        info!("Dispatch thread stopped");
        Ok(())
    }
}

impl Drop for Microscope {
    fn drop(&mut self) {
        let _ = self.stop_dispatch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrcl_transport::{DeviceErrorKind, MockDevice};

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            receive_timeout_ms: 20,
            reply_timeout_ms: 300,
            ..DispatchConfig::default()
        }
    }

    #[test]
    fn test_plan_equal_distances_keep_speed() {
        let requests = [
            MoveRequest::new(AxisId::X, 30.0, 50.0),
            MoveRequest::new(AxisId::Y, 40.0, 50.0),
        ];
        let plan = plan_move(&requests, &[10.0, 20.0], true);
        assert_eq!(plan[0].travel_time, plan[1].travel_time);
        assert_eq!(plan[0].speed, 50.0);
        assert_eq!(plan[1].speed, 50.0);
    }

    #[test]
    fn test_plan_slows_shorter_move() {
        let requests = [
            MoveRequest::new(AxisId::X, 70.0, 80.0),
            MoveRequest::new(AxisId::Y, 35.0, 80.0),
        ];
        let plan = plan_move(&requests, &[0.0, 0.0], true);
        assert_eq!(plan[0].speed, 80.0);
        assert!((plan[1].speed - 40.0).abs() < 1e-9);

        let independent = plan_move(&requests, &[0.0, 0.0], false);
        assert_eq!(independent[1].speed, 80.0);
    }

    #[test]
    fn test_plan_clamps_and_handles_zero_travel() {
        let requests = [
            MoveRequest::new(AxisId::C, 120.0, 10.0),
            MoveRequest::new(AxisId::Z, 0.5, 10.0),
        ];
        let plan = plan_move(&requests, &[0.0, 0.0], true);
        assert_eq!(plan[1].speed, MOVE_SPEED_MIN);

        let still = [MoveRequest::new(AxisId::R, 15.0, 30.0)];
        assert_eq!(plan_move(&still, &[15.0], true)[0].speed, 30.0);
    }

    #[test]
    fn test_validation_rejects_whole_batch() {
        let out_of_range = [
            MoveRequest::new(AxisId::X, 10.0, 50.0),
            MoveRequest::new(AxisId::A, 95.0, 50.0),
        ];
        assert!(matches!(
            validate_requests(&out_of_range),
            Err(DriverError::OutOfLimits { axis: AxisId::A, .. })
        ));

        let duplicate = [
            MoveRequest::new(AxisId::X, 10.0, 50.0),
            MoveRequest::new(AxisId::X, 20.0, 50.0),
        ];
        assert!(matches!(validate_requests(&duplicate), Err(DriverError::InvalidInput(_))));

        let slow = [MoveRequest::new(AxisId::Y, 10.0, 0.0)];
        assert!(matches!(validate_requests(&slow), Err(DriverError::InvalidInput(_))));
    }

    #[test]
    fn test_move_out_of_limits_writes_nothing() {
        let device = MockDevice::new();
        let microscope = Microscope::new(device.transport(), fast_config()).unwrap();

        let err = microscope
            .move_absolute(&[MoveRequest::new(AxisId::X, 71.0, 50.0)], true)
            .unwrap_err();
        assert!(matches!(err, DriverError::OutOfLimits { axis: AxisId::X, .. }));
        assert!(device.written().is_empty());
        microscope.shutdown().unwrap();
    }

    #[test]
    fn test_system_commands() {
        let device = MockDevice::new();
        let microscope = Microscope::new(device.transport(), fast_config()).unwrap();

        microscope.auto_home().unwrap();
        microscope.emergency_stop().unwrap();
        microscope.set_status_led_intensity(40).unwrap();
        assert!(microscope.set_status_led_intensity(101).is_err());

        assert_eq!(device.written(), vec!["$*5", "$*0", "$*8,40"]);
        assert_eq!(microscope.metrics().commands_written, 3);
    }

    #[test]
    fn test_probe_follows_echo() {
        let device = MockDevice::new();
        let microscope = Microscope::new(device.transport(), fast_config()).unwrap();
        assert!(microscope.test().unwrap());

        device.set_echo(false);
        assert!(!microscope.test().unwrap());
    }

    #[test]
    fn test_shutdown_returns_fatal_error() {
        let device = MockDevice::new();
        let microscope = Microscope::new(device.transport(), fast_config()).unwrap();
        assert!(microscope.is_dispatch_alive());

        device.fail_with(DeviceErrorKind::Disconnected);
        for _ in 0..200 {
            if !microscope.is_dispatch_alive() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!microscope.is_dispatch_alive());
        assert!(microscope.dispatch_error().is_some());
        assert!(matches!(
            microscope.emergency_stop(),
            Err(DriverError::DispatchStopped(_))
        ));
        assert!(matches!(microscope.shutdown(), Err(DriverError::Transport(_))));
    }

    #[test]
    fn test_drop_stops_dispatch_thread() {
        let device = MockDevice::new();
        let microscope = Microscope::new(device.transport(), fast_config()).unwrap();
        let started = std::time::Instant::now();
        drop(microscope);
        // 读超时 20ms，停止标志应在一个读周期内被观察到
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
