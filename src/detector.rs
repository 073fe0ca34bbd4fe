// 该文件是 Tingliu （停留） 项目的一部分。
// src/detector.rs - 目标检测接口
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

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, geometry::SubjectBox};

/// 检测后端：一帧输入，返回所有目标框
pub trait Detector {
  type Error;

  fn detect(&self, frame: &Frame) -> Result<Vec<SubjectBox>, Self::Error>;
}

mod record;
pub use self::record::{RecordDetector, RecordDetectorError, parse_records};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("检测记录回放错误: {0}")]
  RecordDetectorError(#[from] RecordDetectorError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum DetectorWrapper {
  RecordDetector(RecordDetector),
}

impl FromUrl for DetectorWrapper {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      RecordDetector::SCHEME => Ok(DetectorWrapper::RecordDetector(RecordDetector::from_url(
        url,
      )?)),
      _ => Err(DetectorError::SchemeMismatch),
    }
  }
}

impl Detector for DetectorWrapper {
  type Error = DetectorError;

  fn detect(&self, frame: &Frame) -> Result<Vec<SubjectBox>, Self::Error> {
    match self {
      DetectorWrapper::RecordDetector(detector) => {
        detector.detect(frame).map_err(DetectorError::from)
      }
    }
  }
}

/// 多个摄像头共用一个检测后端实例时使用。
///
/// 后端不一定可重入，所有调用经由同一把锁串行执行；各摄像头的占用状态不经过这里。
pub struct SharedDetector<D> {
  inner: Arc<Mutex<D>>,
}

impl<D> Clone for SharedDetector<D> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<D: Detector> SharedDetector<D> {
  pub fn new(detector: D) -> Self {
    Self {
      inner: Arc::new(Mutex::new(detector)),
    }
  }
}

impl<D: Detector> Detector for SharedDetector<D> {
  type Error = D::Error;

  fn detect(&self, frame: &Frame) -> Result<Vec<SubjectBox>, Self::Error> {
    // 持锁线程 panic 时后端状态仍可用，整体重启由外层负责
    let detector = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    detector.detect(frame)
  }
}

/// 只保留被跟踪类别且置信度达标的目标
#[derive(Debug, Clone)]
pub struct SubjectFilter {
  pub class: String,
  pub min_confidence: f32,
}

impl SubjectFilter {
  pub fn new(class: impl Into<String>, min_confidence: f32) -> Self {
    Self {
      class: class.into(),
      min_confidence,
    }
  }

  pub fn apply(&self, subjects: Vec<SubjectBox>) -> Vec<SubjectBox> {
    subjects
      .into_iter()
      .filter(|subject| subject.class == self.class && subject.confidence >= self.min_confidence)
      .collect()
  }
}
