// 该文件是 Tingliu （停留） 项目的一部分。
// src/orchestrator.rs - 多摄像头编排
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

use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, info_span, warn};

use crate::{
  FromUrl,
  clock::SystemClock,
  config::{AppConfig, CameraConfig},
  detector::{DetectorWrapper, SharedDetector, SubjectFilter},
  input::UrlConnector,
  output::{OutputError, OutputWrapper},
  report::ReportWriter,
  signal::StopSignal,
  store::DurationStore,
  supervisor::{StreamSupervisor, SupervisorError, SupervisorSettings},
};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum OrchestratorError {
  #[error("没有可以启动的摄像头")]
  NoCameras,
  #[error("创建输出失败: {0}")]
  Output(#[from] OutputError),
  #[error("启动工作线程失败: {0}")]
  Spawn(#[from] std::io::Error),
  #[error("摄像头 {camera} 异常退出: {source}")]
  Worker {
    camera: String,
    #[source]
    source: SupervisorError,
  },
  #[error("摄像头 {camera} 的工作线程 panic")]
  WorkerPanicked { camera: String },
}

pub type CameraWorker =
  StreamSupervisor<UrlConnector, SharedDetector<DetectorWrapper>, OutputWrapper, SystemClock>;

/// 每个摄像头一个线程，互不共享占用状态；只有检测后端经 [`SharedDetector`] 共用
pub struct Orchestrator {
  config: AppConfig,
  detector: SharedDetector<DetectorWrapper>,
}

impl Orchestrator {
  pub fn new(config: AppConfig, detector: SharedDetector<DetectorWrapper>) -> Self {
    Self { config, detector }
  }

  pub fn config(&self) -> &AppConfig {
    &self.config
  }

  pub fn settings(&self) -> SupervisorSettings {
    SupervisorSettings {
      store: DurationStore::new(&self.config.state_dir),
      reporter: ReportWriter::new(&self.config.report.directory, self.config.report.policy),
      persist_every_frames: self.config.persist_every_frames,
      report_interval: self.config.report.interval(),
      backoff: self.config.backoff,
      filter: SubjectFilter::new(&self.config.tracked_class, self.config.min_confidence),
    }
  }

  pub fn build_worker(&self, camera: &CameraConfig) -> Result<CameraWorker, OrchestratorError> {
    let output_url = camera.output.as_ref().unwrap_or(&self.config.output);
    let output = OutputWrapper::from_url(output_url)?;
    Ok(StreamSupervisor::new(
      camera.id.clone(),
      camera.zones.clone(),
      UrlConnector::new(camera.source.clone()),
      self.detector.clone(),
      output,
      SystemClock,
      self.settings(),
    ))
  }

  /// 启动全部摄像头并等待。任一工作线程出错或 panic 时停止其余线程并返回错误，
  /// 由外层整体重启；收到外部停止信号时全部正常退出。
  pub fn run(&self, stop: &StopSignal) -> Result<(), OrchestratorError> {
    let round = StopSignal::new();
    let mut handles: Vec<(String, JoinHandle<Result<(), SupervisorError>>)> = Vec::new();

    for camera in &self.config.cameras {
      let mut worker = match self.build_worker(camera) {
        Ok(worker) => worker,
        Err(e) => {
          warn!(camera = %camera.id, error = %e, "摄像头无法启动，已跳过");
          continue;
        }
      };
      let worker_round = round.clone();
      let span = info_span!("camera", id = %camera.id);
      let spawned = thread::Builder::new()
        .name(format!("camera-{}", camera.id))
        .spawn(move || span.in_scope(|| worker.run(&worker_round)));
      match spawned {
        Ok(handle) => handles.push((camera.id.clone(), handle)),
        Err(e) => {
          round.stop();
          let _ = join_all(handles);
          return Err(e.into());
        }
      }
    }

    if handles.is_empty() {
      return Err(OrchestratorError::NoCameras);
    }
    info!(cameras = handles.len(), "全部摄像头已启动");

    loop {
      if stop.wait_timeout(POLL_INTERVAL) {
        info!("收到停止信号，等待摄像头退出");
        break;
      }
      if handles.iter().any(|(_, handle)| handle.is_finished()) {
        break;
      }
    }
    round.stop();
    join_all(handles)
  }
}

fn join_all(
  handles: Vec<(String, JoinHandle<Result<(), SupervisorError>>)>,
) -> Result<(), OrchestratorError> {
  let mut result = Ok(());
  for (camera, handle) in handles {
    let failure = match handle.join() {
      Ok(Ok(())) => continue,
      Ok(Err(source)) => {
        error!(kind = "unexpected", camera = %camera, error = %source, "摄像头异常退出");
        OrchestratorError::Worker { camera, source }
      }
      Err(_) => {
        error!(kind = "unexpected", camera = %camera, "摄像头工作线程 panic");
        OrchestratorError::WorkerPanicked { camera }
      }
    };
    if result.is_ok() {
      result = Err(failure);
    }
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detector::RecordDetector;

  fn detector() -> SharedDetector<DetectorWrapper> {
    SharedDetector::new(DetectorWrapper::RecordDetector(RecordDetector))
  }

  #[test]
  fn no_startable_camera_is_an_error() {
    let config = AppConfig::from_slice(
      br#"{
        "output": "mp4:///tmp/out.mp4",
        "cameras": [{ "id": "a", "source": "image:///nowhere", "zones": [] }]
      }"#,
    )
    .unwrap();
    let orchestrator = Orchestrator::new(config, detector());
    assert!(matches!(
      orchestrator.run(&StopSignal::new()),
      Err(OrchestratorError::NoCameras)
    ));
  }

  #[test]
  fn camera_output_overrides_global_output() {
    let config = AppConfig::from_slice(
      br#"{
        "output": "mp4:///tmp/out.mp4",
        "cameras": [{ "id": "a", "source": "image:///nowhere", "zones": [], "output": "none:" }]
      }"#,
    )
    .unwrap();
    let orchestrator = Orchestrator::new(config, detector());
    let worker = orchestrator
      .build_worker(&orchestrator.config().cameras[0])
      .unwrap();
    assert_eq!(worker.camera_id(), "a");
  }

  #[cfg(feature = "read_image_file")]
  #[test]
  fn workers_stop_on_signal_and_save_state() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("frames");
    std::fs::create_dir_all(&frames).unwrap();
    image::RgbImage::new(8, 8)
      .save(frames.join("0001.png"))
      .unwrap();
    std::fs::write(frames.join("0001.txt"), "person, 0.9, 1, 1, 5, 5\n").unwrap();

    let document = serde_json::json!({
      "state_dir": dir.path().join("state"),
      "report": { "directory": dir.path().join("reports") },
      "backoff_ms": 10,
      "cameras": [
        {
          "id": "cam-1",
          "source": format!("image://{}", frames.display()),
          "zones": [{ "name": "A", "x": 0, "y": 0, "width": 4, "height": 4 }]
        },
        {
          "id": "cam-2",
          "source": "image:///does/not/exist",
          "zones": [{ "name": "A", "x": 0, "y": 0, "width": 4, "height": 4 }]
        }
      ]
    });
    let config = AppConfig::from_slice(document.to_string().as_bytes()).unwrap();
    let orchestrator = Orchestrator::new(config, detector());

    let stop = StopSignal::new();
    let remote = stop.clone();
    let stopper = thread::spawn(move || {
      thread::sleep(Duration::from_millis(300));
      remote.stop();
    });
    orchestrator.run(&stop).unwrap();
    stopper.join().unwrap();

    let store = DurationStore::new(dir.path().join("state"));
    assert!(store.path_for("cam-1").exists());
    assert!(store.path_for("cam-2").exists());
  }
}
