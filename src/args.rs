// 该文件是 Tingliu （停留） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;

use tingliu::{config::AppConfig, report::ReportPolicy};

/// Tingliu 区域停留时长统计
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// JSON 配置文件路径
  #[arg(long, value_name = "FILE")]
  pub config: PathBuf,

  /// 覆盖配置中的持久化目录
  #[arg(long, value_name = "DIR")]
  pub state_dir: Option<PathBuf>,

  /// 覆盖配置中的报表目录
  #[arg(long, value_name = "DIR")]
  pub report_dir: Option<PathBuf>,

  /// 覆盖配置中的报表策略（append 或 daily）
  #[arg(long, value_name = "POLICY")]
  pub report_policy: Option<ReportPolicy>,
}

impl Args {
  pub fn apply(&self, config: &mut AppConfig) {
    if let Some(state_dir) = &self.state_dir {
      config.state_dir = state_dir.clone();
    }
    if let Some(report_dir) = &self.report_dir {
      config.report.directory = report_dir.clone();
    }
    if let Some(policy) = self.report_policy {
      config.report.policy = policy;
    }
  }
}
