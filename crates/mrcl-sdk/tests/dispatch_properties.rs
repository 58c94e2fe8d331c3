//! 分发路由的性质测试

use mrcl_sdk::driver::{DispatchMetrics, DriverContext, Routing, dispatch_line};
use mrcl_sdk::protocol::{AxisId, UpdateCategory};
use proptest::prelude::*;

fn axis_strategy() -> impl Strategy<Value = AxisId> {
    prop::sample::select(AxisId::ALL.to_vec())
}

proptest! {
    /// 合法状态行只更新被点名的轴
    #[test]
    fn prop_status_line_touches_only_named_axis(
        axis in axis_strategy(),
        position in -90.0f64..90.0,
        steps in -100_000i64..100_000,
        homed in any::<bool>(),
    ) {
        let ctx = DriverContext::default();
        let metrics = DispatchMetrics::new();
        let line = format!("{}:ID1,{:.3},{},{}", axis, position, steps, u8::from(homed));

        prop_assert_eq!(
            dispatch_line(&line, &ctx, &metrics),
            Routing::Signalled(axis, UpdateCategory::Position)
        );
        let state = ctx.cache.load(axis);
        prop_assert!((state.position.unwrap() - position).abs() < 1e-3);
        prop_assert_eq!(state.steps, Some(steps));
        prop_assert_eq!(state.homed, Some(homed));
        prop_assert!(ctx.inbox.is_empty());

        for other in AxisId::ALL.into_iter().filter(|a| *a != axis) {
            prop_assert_eq!(ctx.cache.load(other).position, None);
            prop_assert!(!ctx.signals.is_set(other, UpdateCategory::Position));
        }
    }

    /// 无法识别的行原样、恰好一次进入未匹配队列
    #[test]
    fn prop_unmatched_lines_queued_verbatim_once(
        lines in prop::collection::vec("[a-z][a-z0-9 ]{0,30}", 1..20),
    ) {
        let ctx = DriverContext::default();
        let metrics = DispatchMetrics::new();

        for line in &lines {
            prop_assert_eq!(dispatch_line(line, &ctx, &metrics), Routing::Queued);
        }

        let mut drained = Vec::new();
        while let Some(line) = ctx.inbox.try_pop() {
            drained.push(line);
        }
        prop_assert_eq!(drained, lines);
        prop_assert!(metrics.snapshot().is_consistent());
    }
}
