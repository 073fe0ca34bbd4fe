// 该文件是 Tingliu （停留） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, frame::Frame};

/// 已打开的帧来源。`Ok(None)` 表示流已结束。
pub trait FrameSource {
  type Error;

  fn read_frame(&mut self) -> Result<Option<Frame>, Self::Error>;
}

/// 打开（或重新打开）帧来源
pub trait Connect {
  type Error;
  type Source: FrameSource<Error = Self::Error>;

  fn connect(&self) -> Result<Self::Source, Self::Error>;
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      if GStreamerInputPipelineBuilder::accepts(url) {
        let input = GStreamerInputPipelineBuilder::from_url(url)?.build()?;
        return Ok(InputWrapper::GStreamerInput(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl FrameSource for InputWrapper {
  type Error = InputError;

  fn read_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
    match self {
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.read_frame().map_err(InputError::from),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.read_frame().map_err(InputError::from),
    }
  }
}

/// 每次连接都按同一个 URL 重新打开输入
#[derive(Debug, Clone)]
pub struct UrlConnector {
  url: Url,
}

impl UrlConnector {
  pub fn new(url: Url) -> Self {
    Self { url }
  }

  pub fn url(&self) -> &Url {
    &self.url
  }
}

impl Connect for UrlConnector {
  type Error = InputError;
  type Source = InputWrapper;

  fn connect(&self) -> Result<Self::Source, Self::Error> {
    InputWrapper::from_url(&self.url)
  }
}
