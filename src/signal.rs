// 该文件是 Tingliu （停留） 项目的一部分。
// src/signal.rs - 停止信号
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// 可克隆的停止信号。所有克隆共享同一状态，`stop` 之后不可恢复。
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
  inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn stop(&self) {
    let (flag, condvar) = &*self.inner;
    *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
    condvar.notify_all();
  }

  pub fn is_stopped(&self) -> bool {
    *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 最多等待 `timeout`，期间收到停止信号则提前返回。返回值表示是否已停止。
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let (flag, condvar) = &*self.inner;
    let deadline = Instant::now() + timeout;
    let mut stopped = flag.lock().unwrap_or_else(PoisonError::into_inner);
    while !*stopped {
      let remaining = deadline.saturating_duration_since(Instant::now());
      if remaining.is_zero() {
        break;
      }
      stopped = condvar
        .wait_timeout(stopped, remaining)
        .unwrap_or_else(PoisonError::into_inner)
        .0;
    }
    *stopped
  }
}
