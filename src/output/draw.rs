// 该文件是 Tingliu （停留） 项目的一部分。
// src/output/draw.rs - 区域与目标可视化
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

use std::fmt::Write as _;
use std::path::Path;

use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::{frame::Frame, output::FrameOutcome, report::format_duration};

const ZONE_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const OCCUPIED_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const SUBJECT_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const LINE_THICKNESS: i32 = 2;

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for Frame {
  fn to_rgb_image(&self) -> RgbImage {
    let width = self.width();
    let height = self.height();
    let data = self.as_nhwc();

    ImageBuffer::from_fn(width, height, |x, y| {
      let idx = (y as usize * width as usize + x as usize) * 3;
      Rgb([data[idx], data[idx + 1], data[idx + 2]])
    })
  }
}

pub struct Draw {
  zone_color: [u8; 3],
  occupied_color: [u8; 3],
  subject_color: [u8; 3],
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      zone_color: ZONE_COLOR,
      occupied_color: OCCUPIED_COLOR,
      subject_color: SUBJECT_COLOR,
      thickness: LINE_THICKNESS,
    }
  }
}

impl Draw {
  // 向内加粗的矩形边框，完全在图像外的部分由 imageproc 裁剪
  fn draw_rect(&self, image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: [u8; 3]) {
    for t in 0..self.thickness {
      let width = right - left - 2 * t;
      let height = bottom - top - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(left + t, top + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }

  pub fn draw_outcome(&self, frame: &Frame, outcome: &FrameOutcome) -> RgbImage {
    let mut image = frame.to_rgb_image();

    for zone in &outcome.zones {
      let color = if zone.occupied {
        self.occupied_color
      } else {
        self.zone_color
      };
      let rect = zone.rect;
      self.draw_rect(
        &mut image,
        rect.x,
        rect.y,
        rect.x + rect.width as i32,
        rect.y + rect.height as i32,
        color,
      );
    }

    for subject in &outcome.subjects {
      self.draw_rect(
        &mut image,
        subject.x1.floor() as i32,
        subject.y1.floor() as i32,
        subject.x2.ceil() as i32,
        subject.y2.ceil() as i32,
        self.subject_color,
      );
    }

    image
  }
}

/// 文本记录：检测目标与区域时长
pub struct Record;

impl Record {
  /// 与 `record:` 检测回放读取的格式一致
  pub fn subjects_text(outcome: &FrameOutcome) -> String {
    let mut text = String::new();
    for subject in &outcome.subjects {
      let _ = writeln!(
        text,
        "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}",
        subject.class, subject.confidence, subject.x1, subject.y1, subject.x2, subject.y2
      );
    }
    text
  }

  pub fn zones_text(outcome: &FrameOutcome) -> String {
    let mut text = String::new();
    for zone in &outcome.zones {
      let _ = writeln!(
        text,
        "{}: {}{}",
        zone.name,
        format_duration(zone.duration),
        if zone.occupied { " *" } else { "" }
      );
    }
    text
  }

  pub fn record(&self, outcome: &FrameOutcome, frame_path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(frame_path.with_extension("txt"), Self::subjects_text(outcome))?;
    std::fs::write(frame_path.with_extension("zones"), Self::zones_text(outcome))?;
    Ok(())
  }
}
