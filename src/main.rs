// 该文件是 Tingliu （停留） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use tingliu::{
  FromUrl,
  config::AppConfig,
  detector::{DetectorWrapper, SharedDetector},
  orchestrator::Orchestrator,
  signal::StopSignal,
  task::{RestartPolicy, install_interrupt_handler, run_with_restart},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let mut config = AppConfig::load(&args.config)?;
  args.apply(&mut config);

  info!("配置文件: {}", args.config.display());
  info!("持久化目录: {}", config.state_dir.display());
  info!(
    "报表目录: {} ({:?})",
    config.report.directory.display(),
    config.report.policy
  );
  info!("检测后端: {}", config.detector);

  let detector = SharedDetector::new(DetectorWrapper::from_url(&config.detector)?);
  let policy = RestartPolicy::from(&config.restart);
  let orchestrator = Orchestrator::new(config, detector);

  let stop = StopSignal::new();
  install_interrupt_handler(stop.clone())?;

  run_with_restart(&policy, &stop, || Ok(orchestrator.run(&stop)?))?;

  info!("程序退出");
  Ok(())
}
