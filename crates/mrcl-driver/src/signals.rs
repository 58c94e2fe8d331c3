//! 更新信号表
//!
//! 每个 (轴, 类别) 对应一个可复用的二值事件：分发线程在写入缓存后置位，
//! 前台调用者先清除、再发命令、然后等待置位，用来得知“新数据已到达”。

use mrcl_protocol::{AxisId, UpdateCategory};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// 二值事件（置位后保持，直到被显式清除）
#[derive(Debug, Default)]
pub struct UpdateSignal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl UpdateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// 置位并唤醒所有等待者
    pub fn set(&self) {
        *self.flag.lock() = true;
        self.cond.notify_all();
    }

    pub fn clear(&self) {
        *self.flag.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.flag.lock()
    }

    /// 等待置位，返回超时前是否已置位（不会清除）
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flag = self.flag.lock();
        while !*flag {
            if self.cond.wait_until(&mut flag, deadline).timed_out() {
                return *flag;
            }
        }
        true
    }
}

/// 全部轴的更新信号
#[derive(Debug)]
pub struct UpdateSignals {
    table: [[UpdateSignal; UpdateCategory::COUNT]; AxisId::COUNT],
}

impl Default for UpdateSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateSignals {
    pub fn new() -> Self {
        Self {
            table: std::array::from_fn(|_| std::array::from_fn(|_| UpdateSignal::new())),
        }
    }

    pub fn get(&self, axis: AxisId, category: UpdateCategory) -> &UpdateSignal {
        &self.table[axis.index()][category.index()]
    }

    pub fn set(&self, axis: AxisId, category: UpdateCategory) {
        self.get(axis, category).set();
    }

    pub fn clear(&self, axis: AxisId, category: UpdateCategory) {
        self.get(axis, category).clear();
    }

    pub fn is_set(&self, axis: AxisId, category: UpdateCategory) -> bool {
        self.get(axis, category).is_set()
    }

    pub fn wait(&self, axis: AxisId, category: UpdateCategory, timeout: Duration) -> bool {
        self.get(axis, category).wait(timeout)
    }
}
