// 该文件是 Tingliu （停留） 项目的一部分。
// src/geometry.rs - 区域与检测框几何判定
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

/// 区域矩形，帧像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneRect {
  pub x: i32,
  pub y: i32,
  pub width: u32,
  pub height: u32,
}

impl ZoneRect {
  pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// 返回 `(left, top, right, bottom)`
  pub fn bounds(&self) -> (f32, f32, f32, f32) {
    let left = self.x as f32;
    let top = self.y as f32;
    (
      left,
      top,
      left + self.width as f32,
      top + self.height as f32,
    )
  }
}

/// 监控区域，名称在同一摄像头内唯一
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
  pub name: String,
  pub rect: ZoneRect,
}

impl Zone {
  pub fn new(name: impl Into<String>, rect: ZoneRect) -> Self {
    Self {
      name: name.into(),
      rect,
    }
  }
}

/// 单帧检测结果中的一个目标框，坐标为 `[x1, y1, x2, y2]`
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectBox {
  pub class: String,
  pub confidence: f32,
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl SubjectBox {
  pub fn new(class: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
    let [x1, y1, x2, y2] = bbox;
    Self {
      class: class.into(),
      confidence,
      x1,
      y1,
      x2,
      y2,
    }
  }
}

/// 目标框是否“进入”区域。
///
/// 目标框的某条竖边（`x1` 或 `x2`）严格落在区域的水平范围内，且某条横边
/// （`y1` 或 `y2`）严格落在区域的垂直范围内时才算进入。这是边穿透判定而非矩形
/// 相交：完全包住区域、自身没有任何边落入区域的大框不算进入。
/// 宽或高为零的区域永远返回 `false`。
pub fn overlaps(subject: &SubjectBox, zone: &ZoneRect) -> bool {
  let (left, top, right, bottom) = zone.bounds();
  let inside_x = |v: f32| left < v && v < right;
  let inside_y = |v: f32| top < v && v < bottom;

  (inside_x(subject.x1) || inside_x(subject.x2)) && (inside_y(subject.y1) || inside_y(subject.y2))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn subject(bbox: [f32; 4]) -> SubjectBox {
    SubjectBox::new("person", 0.9, bbox)
  }

  #[test]
  fn disjoint_box_is_outside() {
    let zone = ZoneRect::new(100, 100, 50, 50);
    assert!(!overlaps(&subject([0.0, 0.0, 40.0, 40.0]), &zone));
    assert!(!overlaps(&subject([200.0, 120.0, 260.0, 130.0]), &zone));
  }

  #[test]
  fn corner_inside_counts() {
    let zone = ZoneRect::new(100, 100, 50, 50);
    // 右下角落在区域内
    assert!(overlaps(&subject([80.0, 80.0, 110.0, 110.0]), &zone));
    // 左上角落在区域内
    assert!(overlaps(&subject([140.0, 140.0, 300.0, 300.0]), &zone));
  }

  #[test]
  fn box_enclosing_zone_is_not_counted() {
    let zone = ZoneRect::new(100, 100, 50, 50);
    assert!(!overlaps(&subject([0.0, 0.0, 500.0, 500.0]), &zone));
  }

  #[test]
  fn box_inside_zone_counts() {
    let zone = ZoneRect::new(100, 100, 50, 50);
    assert!(overlaps(&subject([110.0, 110.0, 120.0, 120.0]), &zone));
  }

  #[test]
  fn vertical_edges_inside_but_spanning_height_is_not_counted() {
    let zone = ZoneRect::new(100, 100, 50, 50);
    // 竖边都在区域内，但上下边都在区域外
    assert!(!overlaps(&subject([110.0, 50.0, 140.0, 200.0]), &zone));
  }

  #[test]
  fn boundary_is_exclusive() {
    let zone = ZoneRect::new(100, 100, 50, 50);
    assert!(!overlaps(&subject([100.0, 100.0, 150.0, 150.0]), &zone));
  }

  #[test]
  fn degenerate_zone_never_overlaps() {
    let flat = ZoneRect::new(100, 100, 0, 50);
    let thin = ZoneRect::new(100, 100, 50, 0);
    let b = subject([90.0, 90.0, 120.0, 120.0]);
    assert!(!overlaps(&b, &flat));
    assert!(!overlaps(&b, &thin));
  }
}
