// 该文件是 Tingliu （停留） 项目的一部分。
// src/detector/record.rs - 检测记录回放
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

//! 从帧文件旁的 `.txt` 记录回放检测结果。
//!
//! 每行一个目标：`类别, 置信度, x1, y1, x2, y2`，坐标为像素。
//! 与 `folder://...?record` 输出写出的格式相同，可以把录制的帧目录原样回放。

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, detector::Detector, frame::Frame, geometry::SubjectBox};

const RECORD_EXTENSION: &str = "txt";

#[derive(Error, Debug)]
pub enum RecordDetectorError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] io::Error),
  #[error("记录格式错误 {path}:{line}")]
  Malformed { path: PathBuf, line: usize },
}

#[derive(Debug, Default, Clone)]
pub struct RecordDetector;

impl FromUrlWithScheme for RecordDetector {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordDetector {
  type Error = RecordDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(RecordDetectorError::SchemeMismatch);
    }
    Ok(RecordDetector)
  }
}

impl RecordDetector {
  pub fn record_path(frame_path: &Path) -> PathBuf {
    frame_path.with_extension(RECORD_EXTENSION)
  }
}

fn parse_line(line: &str) -> Option<SubjectBox> {
  let fields: Vec<&str> = line.split(',').map(str::trim).collect();
  let [class, rest @ ..] = fields.as_slice() else {
    return None;
  };
  if rest.len() != 5 || class.is_empty() {
    return None;
  }
  let mut values = [0f32; 5];
  for (value, field) in values.iter_mut().zip(rest) {
    *value = field.parse().ok()?;
  }
  let [confidence, x1, y1, x2, y2] = values;
  Some(SubjectBox::new(*class, confidence, [x1, y1, x2, y2]))
}

fn record_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
  text
    .lines()
    .enumerate()
    .filter(|(_, line)| !line.trim().is_empty())
    .map(|(index, line)| (index + 1, line))
}

/// 解析一份记录文件的内容，空行忽略，遇到格式错误的行即报错
pub fn parse_records(text: &str, path: &Path) -> Result<Vec<SubjectBox>, RecordDetectorError> {
  record_lines(text)
    .map(|(line, content)| {
      parse_line(content).ok_or_else(|| RecordDetectorError::Malformed {
        path: path.to_path_buf(),
        line,
      })
    })
    .collect()
}

impl Detector for RecordDetector {
  type Error = RecordDetectorError;

  fn detect(&self, frame: &Frame) -> Result<Vec<SubjectBox>, Self::Error> {
    // 实时流没有来源文件，也就没有记录
    let Some(origin) = frame.origin() else {
      return Ok(Vec::new());
    };
    let path = Self::record_path(origin);
    match std::fs::read_to_string(&path) {
      // 坏行只告警并跳过，检测本身不失败
      Ok(text) => Ok(
        record_lines(&text)
          .filter_map(|(line, content)| {
            let subject = parse_line(content);
            if subject.is_none() {
              warn!(kind = "record", path = %path.display(), line, "忽略格式错误的检测记录");
            }
            subject
          })
          .collect(),
      ),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "没有检测记录");
        Ok(Vec::new())
      }
      Err(e) => Err(e.into()),
    }
  }
}
