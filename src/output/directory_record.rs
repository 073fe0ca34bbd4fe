// 该文件是 Tingliu （停留） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

//! `folder:///path?every=25&always&record`
//!
//! - `every`：每隔多少帧保存一次，默认 1；
//! - `always`：没有区域被占用时也保存；
//! - `record`：保存原始帧与检测记录（可被 `image://` + `record:` 回放），
//!   否则保存标注后的图像。

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, Local};
use thiserror::Error;
use tracing::error;

use crate::output::draw::{Draw, Record, ToRgbImage};
use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::{FrameOutcome, Render},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &PathBuf,
    frame: &Frame,
    outcome: &FrameOutcome,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_outcome(frame, outcome).save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.to_rgb_image().save(path)?;
        record.record(outcome, path)?;
      }
    };

    Ok(())
  }
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU64,
  every: u64,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        uri.scheme()
      );
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let draw = if uri.query_pairs().any(|(k, _)| k == "record") {
      DrawWrapper::Record(Record)
    } else {
      DrawWrapper::Draw(Box::default())
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let every = uri
      .query_pairs()
      .find(|(k, _)| k == "every")
      .and_then(|(_, v)| v.parse::<u64>().ok())
      .unwrap_or(1)
      .max(1);

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw,
      frame_counter: AtomicU64::new(0),
      every,
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_path(&self, outcome: &FrameOutcome, frame_id: u64) -> Result<PathBuf, std::io::Error> {
    let now = outcome.timestamp.with_timezone(&Local);
    let directory = self
      .directory
      .join(&outcome.camera_id)
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:06}.png",
      now.format("%H-%M-%S"),
      frame_id
    )))
  }
}

impl Render<Frame, FrameOutcome> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, outcome: &FrameOutcome) -> Result<(), Self::Error> {
    let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1;
    if frame_id % self.every != 0 {
      return Ok(());
    }
    if self.always || outcome.any_occupied() {
      let path = self.frame_path(outcome, frame_id)?;
      self.draw.save_result(&path, frame, outcome)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;

  fn collect_files(root: &std::path::Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files.sort();
    files
  }

  #[test]
  fn record_mode_writes_frame_and_sidecars() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!(
      "folder://{}?record&always&every=2",
      dir.path().display()
    ))
    .unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    let outcome = FrameOutcome {
      camera_id: "cam".into(),
      timestamp: Utc::now(),
      subjects: Vec::new(),
      zones: Vec::new(),
    };

    for _ in 0..3 {
      output.render_result(&Frame::blank(4, 4), &outcome).unwrap();
    }

    let files = collect_files(dir.path());
    let extensions: Vec<_> = files
      .iter()
      .map(|f| f.extension().unwrap().to_str().unwrap().to_string())
      .collect();
    assert_eq!(extensions, vec!["png", "txt", "zones"]);
    assert!(files[0].starts_with(dir.path().join("cam")));
  }

  #[test]
  fn skips_idle_frames_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    let outcome = FrameOutcome {
      camera_id: "cam".into(),
      timestamp: Utc::now(),
      subjects: Vec::new(),
      zones: Vec::new(),
    };
    output.render_result(&Frame::blank(4, 4), &outcome).unwrap();
    assert!(collect_files(dir.path()).is_empty());
  }
}
