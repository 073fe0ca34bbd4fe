// 该文件是 Tingliu （停留） 项目的一部分。
// src/output.rs - 输出定义
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

use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

#[cfg(feature = "directory_record")]
use crate::FromUrlWithScheme;
use crate::{FromUrl, frame::Frame, geometry::SubjectBox, occupancy::ZoneStatus};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

/// 一帧处理完成后交给输出的全部信息
#[derive(Debug, Clone)]
pub struct FrameOutcome {
  pub camera_id: String,
  pub timestamp: DateTime<Utc>,
  pub subjects: Vec<SubjectBox>,
  pub zones: Vec<ZoneStatus>,
}

impl FrameOutcome {
  pub fn any_occupied(&self) -> bool {
    self.zones.iter().any(|zone| zone.occupied)
  }
}

#[cfg(feature = "directory_record")]
pub mod draw;

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 丢弃所有帧
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl NullOutput {
  pub const SCHEME: &'static str = "none";
}

impl<F, O> Render<F, O> for NullOutput {
  type Error = std::convert::Infallible;

  fn render_result(&self, _frame: &F, _result: &O) -> Result<(), Self::Error> {
    Ok(())
  }
}

pub enum OutputWrapper {
  NullOutput(NullOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      NullOutput::SCHEME => Ok(OutputWrapper::NullOutput(NullOutput)),
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Render<Frame, FrameOutcome> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &FrameOutcome) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::NullOutput(output) => match output.render_result(frame, result) {
        Ok(()) => Ok(()),
        Err(never) => match never {},
      },
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn none_scheme_builds_null_output() {
    let url = Url::parse("none:").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::NullOutput(_))
    ));
    let url = Url::parse("mp4:///tmp/out.mp4").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
  }
}
