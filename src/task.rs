// 该文件是 Tingliu （停留） 项目的一部分。
// src/task.rs - 整体重启与中断处理
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

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::{thread, time::Duration};

use tracing::{error, info, warn};

use crate::{config::RestartConfig, signal::StopSignal};

const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
  pub delay: Duration,
  /// `None` 表示不限次数
  pub max_restarts: Option<u32>,
}

impl From<&RestartConfig> for RestartPolicy {
  fn from(config: &RestartConfig) -> Self {
    Self {
      delay: Duration::from_millis(config.delay_ms),
      max_restarts: config.max_restarts,
    }
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  payload
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| payload.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown panic".to_string())
}

/// 反复执行 `work`，出错或 panic 后等待固定时间再整体重来。
///
/// `work` 正常返回、收到停止信号或重启次数用尽时结束；次数用尽时返回最后一次的错误。
pub fn run_with_restart<F>(policy: &RestartPolicy, stop: &StopSignal, mut work: F) -> anyhow::Result<()>
where
  F: FnMut() -> anyhow::Result<()>,
{
  let mut restarts = 0u32;
  loop {
    let failure = match catch_unwind(AssertUnwindSafe(&mut work)) {
      Ok(Ok(())) => return Ok(()),
      Ok(Err(e)) => e,
      Err(payload) => anyhow::anyhow!("panic: {}", panic_message(payload.as_ref())),
    };
    error!(kind = "unexpected", restarts, error = %failure, "运行出错");

    if stop.is_stopped() {
      info!("已收到停止信号，不再重启");
      return Ok(());
    }
    if policy.max_restarts.is_some_and(|max| restarts >= max) {
      warn!(restarts, "重启次数已用尽");
      return Err(failure);
    }

    if stop.wait_timeout(policy.delay) {
      return Ok(());
    }
    restarts += 1;
    info!(restarts, "重新启动");
  }
}

/// Ctrl-C 时设置停止信号；若 30 秒后仍未退出则强制结束进程
pub fn install_interrupt_handler(stop: StopSignal) -> anyhow::Result<()> {
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    stop.stop();
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  Ok(())
}
