// 该文件是 Tingliu （停留） 项目的一部分。
// src/clock.rs - 时钟
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

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};

/// 时间来源。时间戳精度为微秒，与持久化格式一致。
pub trait Clock {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
  }
}

/// 手动推进的时钟，用于回放与测试
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn starting_at(now: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(now),
    }
  }

  pub fn advance(&self, delta: TimeDelta) {
    let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
    *now += delta;
  }

  pub fn set(&self, at: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
  fn now(&self) -> DateTime<Utc> {
    (**self).now()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn system_clock_has_microsecond_precision() {
    let now = SystemClock.now();
    assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
  }

  #[test]
  fn manual_clock_advances() {
    let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let clock = ManualClock::starting_at(start);
    clock.advance(TimeDelta::seconds(10));
    assert_eq!(clock.now() - start, TimeDelta::seconds(10));
  }
}
