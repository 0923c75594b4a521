//! 进度事件节流器
//!
//! 按百分比步长节流：进度每前进 `step` 个百分点才发布一次，100% 总是发布。
//! 进度回退（重试从头开始）时重新计数。

use std::sync::atomic::{AtomicU64, Ordering};

/// 默认步长（百分点）
pub const DEFAULT_PROGRESS_STEP: f64 = 5.0;

/// 尚未发布过
const NONE: u64 = u64::MAX;

/// 进度事件节流器
///
/// 内部以万分比保存上次发布的进度，使用原子操作，可在回调中共享
#[derive(Debug)]
pub struct ProgressThrottler {
    last_emitted: AtomicU64,
    step: u64,
}

impl ProgressThrottler {
    /// `step` 为百分点，例如 5.0
    pub fn new(step: f64) -> Self {
        Self {
            last_emitted: AtomicU64::new(NONE),
            step: to_basis_points(step).max(1),
        }
    }

    /// 是否应该发布这次进度
    pub fn should_emit(&self, percent: f64) -> bool {
        let current = to_basis_points(percent);
        let last = self.last_emitted.load(Ordering::Relaxed);

        let due = last == NONE
            || current < last
            || (current >= 10_000 && last < 10_000)
            || current >= last.saturating_add(self.step);
        if !due {
            return false;
        }

        self.last_emitted
            .compare_exchange(last, current, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

}

impl Default for ProgressThrottler {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_STEP)
    }
}

fn to_basis_points(percent: f64) -> u64 {
    (percent.clamp(0.0, 100.0) * 100.0).round() as u64
}
