// 该文件是 Tingliu （停留） 项目的一部分。
// src/occupancy.rs - 区域占用状态机
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

//! # 区域占用状态机
//!
//! 每个区域一条 [`OccupancyRecord`]，只保存已累计时长与当前占用段的起点。
//! 实时时长 `accumulated + (now - episode_start)` 总是由这两个值推导，
//! 因此任意时刻从持久化状态都能复算出同样的结果。

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::geometry::{SubjectBox, Zone, ZoneRect, overlaps};
use crate::store::PersistedState;

/// 单帧观测引起的状态变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  /// 未占用 → 占用
  Entered,
  /// 占用 → 未占用，附带本段计入的时长
  Left(TimeDelta),
  Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyRecord {
  accumulated: TimeDelta,
  episode_start: Option<DateTime<Utc>>,
}

impl Default for OccupancyRecord {
  fn default() -> Self {
    Self {
      accumulated: TimeDelta::zero(),
      episode_start: None,
    }
  }
}

impl OccupancyRecord {
  pub fn new(accumulated: TimeDelta, episode_start: Option<DateTime<Utc>>) -> Self {
    Self {
      accumulated,
      episode_start,
    }
  }

  pub fn accumulated(&self) -> TimeDelta {
    self.accumulated
  }

  pub fn episode_start(&self) -> Option<DateTime<Utc>> {
    self.episode_start
  }

  pub fn is_occupied(&self) -> bool {
    self.episode_start.is_some()
  }

  /// 根据本帧是否占用推进状态。只有“占用 → 未占用”会增加累计时长。
  pub fn observe(&mut self, occupied: bool, now: DateTime<Utc>) -> Transition {
    match (occupied, self.episode_start) {
      (true, None) => {
        self.episode_start = Some(now);
        Transition::Entered
      }
      (false, Some(start)) => {
        let elapsed = elapsed_since(start, now);
        self.accumulated += elapsed;
        self.episode_start = None;
        Transition::Left(elapsed)
      }
      _ => Transition::Unchanged,
    }
  }

  pub fn current_duration(&self, now: DateTime<Utc>) -> TimeDelta {
    match self.episode_start {
      Some(start) => self.accumulated + elapsed_since(start, now),
      None => self.accumulated,
    }
  }
}

// 时钟回拨时不允许累计时长减少
fn elapsed_since(start: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
  let elapsed = now - start;
  if elapsed < TimeDelta::zero() {
    warn!(start = %start, now = %now, "时间戳早于占用起点，本段按 0 计");
    TimeDelta::zero()
  } else {
    elapsed
  }
}

/// 单个区域在某一帧的状态
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStatus {
  pub name: String,
  pub rect: ZoneRect,
  pub occupied: bool,
  pub duration: TimeDelta,
}

/// 一个摄像头的全部区域及其占用记录
#[derive(Debug, Clone)]
pub struct ZoneOccupancy {
  zones: Vec<Zone>,
  records: Vec<OccupancyRecord>,
}

impl ZoneOccupancy {
  /// 按区域名称从持久化状态中取记录，缺失的区域从零开始
  pub fn new(zones: Vec<Zone>, state: &PersistedState) -> Self {
    let records = zones
      .iter()
      .map(|zone| state.get(&zone.name).copied().unwrap_or_default())
      .collect();
    Self { zones, records }
  }

  pub fn zones(&self) -> &[Zone] {
    &self.zones
  }

  pub fn record(&self, name: &str) -> Option<&OccupancyRecord> {
    self
      .zones
      .iter()
      .position(|zone| zone.name == name)
      .map(|index| &self.records[index])
  }

  /// 每个区域本帧是否被任一目标占用；多个目标同在一个区域只算一次
  pub fn occupied_flags(&self, subjects: &[SubjectBox]) -> Vec<bool> {
    self
      .zones
      .iter()
      .map(|zone| subjects.iter().any(|subject| overlaps(subject, &zone.rect)))
      .collect()
  }

  pub fn observe(&mut self, subjects: &[SubjectBox], now: DateTime<Utc>) -> Vec<ZoneStatus> {
    let flags = self.occupied_flags(subjects);
    self.observe_flags(&flags, now)
  }

  /// 以显式的占用标志推进各区域状态，区域之间互不影响
  pub fn observe_flags(&mut self, flags: &[bool], now: DateTime<Utc>) -> Vec<ZoneStatus> {
    self
      .zones
      .iter()
      .zip(self.records.iter_mut())
      .zip(flags.iter().copied().chain(std::iter::repeat(false)))
      .map(|((zone, record), occupied)| {
        match record.observe(occupied, now) {
          Transition::Entered => info!(zone = %zone.name, "区域进入占用"),
          Transition::Left(elapsed) => info!(
            zone = %zone.name,
            episode_secs = elapsed.num_milliseconds() as f64 / 1000.0,
            "区域结束占用"
          ),
          Transition::Unchanged => {}
        }
        ZoneStatus {
          name: zone.name.clone(),
          rect: zone.rect,
          occupied: record.is_occupied(),
          duration: record.current_duration(now),
        }
      })
      .collect()
  }

  /// 各区域截至 `now` 的实时时长，顺序与配置一致
  pub fn durations(&self, now: DateTime<Utc>) -> Vec<(String, TimeDelta)> {
    self
      .zones
      .iter()
      .zip(self.records.iter())
      .map(|(zone, record)| (zone.name.clone(), record.current_duration(now)))
      .collect()
  }

  pub fn to_state(&self) -> PersistedState {
    let mut state = PersistedState::default();
    for (zone, record) in self.zones.iter().zip(self.records.iter()) {
      state.insert(zone.name.clone(), *record);
    }
    debug!(zones = self.zones.len(), "生成持久化快照");
    state
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
  }

  fn zone(name: &str, x: i32, y: i32, w: u32, h: u32) -> Zone {
    Zone::new(name, ZoneRect::new(x, y, w, h))
  }

  #[test]
  fn enter_then_leave_accumulates_delta() {
    let mut record = OccupancyRecord::default();
    assert_eq!(record.observe(true, at(0)), Transition::Entered);
    assert_eq!(
      record.observe(false, at(7)),
      Transition::Left(TimeDelta::seconds(7))
    );
    assert_eq!(record.accumulated(), TimeDelta::seconds(7));
    assert_eq!(record.episode_start(), None);
  }

  #[test]
  fn repeated_occupied_frames_are_no_ops() {
    let mut direct = OccupancyRecord::default();
    direct.observe(true, at(0));
    direct.observe(false, at(5));

    let mut repeated = OccupancyRecord::default();
    repeated.observe(true, at(0));
    assert_eq!(repeated.observe(true, at(3)), Transition::Unchanged);
    repeated.observe(false, at(5));

    assert_eq!(direct, repeated);
  }

  #[test]
  fn idle_frames_are_no_ops() {
    let mut record = OccupancyRecord::new(TimeDelta::seconds(4), None);
    assert_eq!(record.observe(false, at(10)), Transition::Unchanged);
    assert_eq!(record.accumulated(), TimeDelta::seconds(4));
  }

  #[test]
  fn current_duration_includes_open_episode() {
    let mut record = OccupancyRecord::new(TimeDelta::seconds(100), None);
    record.observe(true, at(0));
    assert_eq!(record.current_duration(at(30)), TimeDelta::seconds(130));
    assert_eq!(record.accumulated(), TimeDelta::seconds(100));
  }

  #[test]
  fn clock_going_backwards_never_decreases_total() {
    let mut record = OccupancyRecord::new(TimeDelta::seconds(10), None);
    record.observe(true, at(50));
    record.observe(false, at(40));
    assert_eq!(record.accumulated(), TimeDelta::seconds(10));
  }

  #[test]
  fn result_is_independent_of_frame_rate() {
    let pattern = |step: i64| {
      let mut record = OccupancyRecord::default();
      let mut t = 0;
      while t <= 60 {
        record.observe((10..40).contains(&t), at(t));
        t += step;
      }
      record.accumulated()
    };
    assert_eq!(pattern(1), pattern(2));
    assert_eq!(pattern(1), TimeDelta::seconds(30));
  }

  #[test]
  fn many_subjects_in_one_zone_count_once() {
    let mut occupancy = ZoneOccupancy::new(
      vec![zone("A", 0, 0, 100, 100)],
      &PersistedState::default(),
    );
    let subjects = vec![
      SubjectBox::new("person", 0.9, [10.0, 10.0, 20.0, 20.0]),
      SubjectBox::new("person", 0.8, [50.0, 50.0, 60.0, 60.0]),
    ];
    occupancy.observe(&subjects, at(0));
    occupancy.observe(&[], at(5));
    assert_eq!(
      occupancy.record("A").unwrap().accumulated(),
      TimeDelta::seconds(5)
    );
  }

  #[test]
  fn restores_records_by_zone_name() {
    let mut state = PersistedState::default();
    state.insert(
      "B".to_string(),
      OccupancyRecord::new(TimeDelta::seconds(9), Some(at(0))),
    );
    let occupancy = ZoneOccupancy::new(
      vec![zone("A", 0, 0, 10, 10), zone("B", 20, 20, 10, 10)],
      &state,
    );
    assert_eq!(occupancy.record("A"), Some(&OccupancyRecord::default()));
    assert!(occupancy.record("B").unwrap().is_occupied());
    assert_eq!(
      occupancy.durations(at(1)),
      vec![
        ("A".to_string(), TimeDelta::zero()),
        ("B".to_string(), TimeDelta::seconds(10)),
      ]
    );
  }
}
