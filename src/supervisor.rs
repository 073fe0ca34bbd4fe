// 该文件是 Tingliu （停留） 项目的一部分。
// src/supervisor.rs - 单摄像头流监管
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

//! # 单摄像头流监管
//!
//! ```text
//! Connecting --成功--> Running --读取失败/流结束--> Backoff --等待--> Connecting
//!      \--失败-----------------------------------------^
//! ```
//!
//! 输入故障永远按暂时性处理，只有停止信号能结束循环。
//! 检测失败与持久化失败不属于输入故障，会直接返回给外层，由整体重启兜底。

use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  clock::Clock,
  detector::{Detector, SubjectFilter},
  frame::Frame,
  geometry::Zone,
  input::{Connect, FrameSource},
  occupancy::ZoneOccupancy,
  output::{FrameOutcome, Render},
  report::ReportWriter,
  signal::StopSignal,
  store::{DurationStore, StoreError},
};

#[derive(Error, Debug)]
pub enum SupervisorError {
  #[error("检测失败: {0}")]
  Detect(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("持久化失败: {0}")]
  Persist(#[from] StoreError),
}

/// 输入连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Connecting,
  Running,
  Backoff,
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
  pub store: DurationStore,
  pub reporter: ReportWriter,
  /// 每处理多少帧保存一次
  pub persist_every_frames: u64,
  pub report_interval: TimeDelta,
  pub backoff: Duration,
  pub filter: SubjectFilter,
}

pub struct StreamSupervisor<C, D, O, K> {
  camera_id: String,
  connector: C,
  detector: D,
  output: O,
  clock: K,
  occupancy: ZoneOccupancy,
  settings: SupervisorSettings,
  state: ConnectionState,
  frames_since_save: u64,
  last_report: DateTime<Utc>,
  reconnects: u64,
}

impl<C, D, O, K> StreamSupervisor<C, D, O, K>
where
  C: Connect,
  C::Error: Display,
  D: Detector,
  D::Error: std::error::Error + Send + Sync + 'static,
  O: Render<Frame, FrameOutcome>,
  O::Error: Display,
  K: Clock,
{
  /// 从持久化目录恢复各区域记录；报表周期从此刻开始计算
  pub fn new(
    camera_id: impl Into<String>,
    zones: Vec<Zone>,
    connector: C,
    detector: D,
    output: O,
    clock: K,
    settings: SupervisorSettings,
  ) -> Self {
    let camera_id = camera_id.into();
    let state = settings.store.load(&camera_id, &zones);
    let occupancy = ZoneOccupancy::new(zones, &state);
    let last_report = clock.now();
    Self {
      camera_id,
      connector,
      detector,
      output,
      clock,
      occupancy,
      settings,
      state: ConnectionState::Connecting,
      frames_since_save: 0,
      last_report,
      reconnects: 0,
    }
  }

  pub fn camera_id(&self) -> &str {
    &self.camera_id
  }

  pub fn occupancy(&self) -> &ZoneOccupancy {
    &self.occupancy
  }

  pub fn state(&self) -> ConnectionState {
    self.state
  }

  /// 进入 Backoff 的次数
  pub fn reconnects(&self) -> u64 {
    self.reconnects
  }

  /// 运行到停止信号为止。退出前总会再保存一次状态。
  pub fn run(&mut self, stop: &StopSignal) -> Result<(), SupervisorError> {
    info!(camera = %self.camera_id, zones = self.occupancy.zones().len(), "开始监管输入流");
    let mut source: Option<C::Source> = None;

    let result = loop {
      if stop.is_stopped() {
        break Ok(());
      }

      self.state = match self.state {
        ConnectionState::Connecting => match self.connector.connect() {
          Ok(connected) => {
            info!(camera = %self.camera_id, "输入已连接");
            source = Some(connected);
            ConnectionState::Running
          }
          Err(e) => {
            warn!(kind = "stream", camera = %self.camera_id, error = %e, "打开输入失败");
            ConnectionState::Backoff
          }
        },
        ConnectionState::Running => match source.as_mut().map(FrameSource::read_frame) {
          Some(Ok(Some(frame))) => match self.process_frame(&frame) {
            Ok(_) => ConnectionState::Running,
            Err(e) => break Err(e),
          },
          Some(Ok(None)) => {
            warn!(kind = "stream", camera = %self.camera_id, "输入流已结束");
            ConnectionState::Backoff
          }
          Some(Err(e)) => {
            warn!(kind = "stream", camera = %self.camera_id, error = %e, "读取帧失败");
            ConnectionState::Backoff
          }
          None => ConnectionState::Connecting,
        },
        ConnectionState::Backoff => {
          source = None;
          self.reconnects += 1;
          debug!(
            camera = %self.camera_id,
            backoff_ms = self.settings.backoff.as_millis() as u64,
            "等待后重新连接"
          );
          if stop.wait_timeout(self.settings.backoff) {
            break Ok(());
          }
          ConnectionState::Connecting
        }
      };
    };

    drop(source);
    let saved = self.persist();
    info!(camera = %self.camera_id, "监管结束");
    result.and(saved)
  }

  /// 处理一帧：检测、推进占用状态、按节奏保存与写报表、交给输出
  pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameOutcome, SupervisorError> {
    let subjects = self
      .detector
      .detect(frame)
      .map_err(|e| SupervisorError::Detect(Box::new(e)))?;
    let subjects = self.settings.filter.apply(subjects);
    // 检测可能耗时较长，时间戳取检测完成之后
    let now = self.clock.now();
    let zones = self.occupancy.observe(&subjects, now);

    self.frames_since_save += 1;
    if self.frames_since_save >= self.settings.persist_every_frames {
      self.persist()?;
    }

    if now - self.last_report >= self.settings.report_interval {
      self.report(now);
    }

    let outcome = FrameOutcome {
      camera_id: self.camera_id.clone(),
      timestamp: now,
      subjects,
      zones,
    };
    if let Err(e) = self.output.render_result(frame, &outcome) {
      warn!(kind = "output", camera = %self.camera_id, error = %e, "输出失败");
    }
    Ok(outcome)
  }

  fn persist(&mut self) -> Result<(), SupervisorError> {
    self
      .settings
      .store
      .save(&self.camera_id, &self.occupancy.to_state())?;
    self.frames_since_save = 0;
    Ok(())
  }

  // 报表失败不影响计时，下一个周期再写
  fn report(&mut self, now: DateTime<Utc>) {
    let durations = self.occupancy.durations(now);
    match self
      .settings
      .reporter
      .append_snapshot(&self.camera_id, now, &durations)
    {
      Ok(path) => debug!(camera = %self.camera_id, path = %path.display(), "报表已写入"),
      Err(e) => warn!(kind = "report", camera = %self.camera_id, error = %e, "写入报表失败"),
    }
    self.last_report = now;
  }
}
