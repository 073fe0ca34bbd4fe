// 该文件是 Tingliu （停留） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::FrameSource};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单张图片，或按文件名排序的一个图片目录；读完即为流结束
pub struct ImageFileInput {
  pending: VecDeque<PathBuf>,
  index: u64,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Self::open(Path::new(url.path()))
  }
}

impl ImageFileInput {
  pub fn open(path: &Path) -> Result<Self, ImageFileInputError> {
    let pending = if path.is_dir() {
      let mut files = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|file| is_image(file))
        .collect::<Vec<_>>();
      files.sort();
      files.into()
    } else {
      // 不存在时在这里报错，按连接失败处理
      std::fs::metadata(path)?;
      VecDeque::from([path.to_path_buf()])
    };
    debug!(path = %path.display(), frames = pending.len(), "图像输入已打开");

    Ok(ImageFileInput { pending, index: 0 })
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    .unwrap_or(false)
}

impl FrameSource for ImageFileInput {
  type Error = ImageFileInputError;

  fn read_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
    let Some(path) = self.pending.pop_front() else {
      return Ok(None);
    };
    let image: RgbImage = ImageReader::open(&path)?.decode()?.to_rgb8();
    self.index += 1;
    Ok(Some(
      Frame::from(image).with_index(self.index).with_origin(path),
    ))
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let mut frame = Frame::blank(width, height);
    frame.as_mut().copy_from_slice(image.as_raw());
    frame
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_directory_in_name_order_then_ends() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.png", "a.png"] {
      RgbImage::new(4, 3).save(dir.path().join(name)).unwrap();
    }
    std::fs::write(dir.path().join("a.txt"), "person, 1, 0, 0, 1, 1").unwrap();

    let mut input = ImageFileInput::open(dir.path()).unwrap();
    let first = input.read_frame().unwrap().unwrap();
    assert_eq!(first.origin(), Some(dir.path().join("a.png").as_path()));
    assert_eq!((first.width(), first.height(), first.index()), (4, 3, 1));
    let second = input.read_frame().unwrap().unwrap();
    assert_eq!(second.origin(), Some(dir.path().join("b.png").as_path()));
    assert!(input.read_frame().unwrap().is_none());
  }

  #[test]
  fn missing_path_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      ImageFileInput::open(&dir.path().join("missing.png")),
      Err(ImageFileInputError::IoError(_))
    ));
  }
}
