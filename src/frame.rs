// 该文件是 Tingliu （停留） 项目的一部分。
// src/frame.rs - RGB 帧定义
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

use std::path::{Path, PathBuf};

use thiserror::Error;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  SizeMismatch { expected: usize, actual: usize },
}

/// NHWC 排列的 RGB 帧
#[derive(Debug, Clone)]
pub struct Frame {
  index: u64,
  width: u32,
  height: u32,
  data: Box<[u8]>,
  origin: Option<PathBuf>,
}

impl Frame {
  pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::SizeMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      index: 0,
      width,
      height,
      data: data.into_boxed_slice(),
      origin: None,
    })
  }

  /// 全黑帧
  pub fn blank(width: u32, height: u32) -> Self {
    let size = RGB_CHANNELS * width as usize * height as usize;
    Self {
      index: 0,
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
      origin: None,
    }
  }

  pub fn with_index(mut self, index: u64) -> Self {
    self.index = index;
    self
  }

  /// 记录帧来自的文件，回放检测结果时据此查找记录
  pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
    self.origin = Some(origin.into());
    self
  }

  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn origin(&self) -> Option<&Path> {
    self.origin.as_deref()
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

impl AsMut<[u8]> for Frame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}
