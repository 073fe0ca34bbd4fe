// 该文件是 Tingliu （停留） 项目的一部分。
// src/store.rs - 时长持久化
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

//! # 时长持久化
//!
//! 每个摄像头一个 JSON 文件 `time_data_<camera_id>.json`，按区域名称保存
//! `{ "accumulated_seconds": 数值, "episode_start": ISO-8601 或 null }`。
//!
//! 读取时文件不存在或内容损坏都会退回全零状态，不会阻止摄像头启动。
//! 写入先落到临时文件再改名，读者不会看到写了一半的记录。

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::Zone;
use crate::occupancy::OccupancyRecord;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] io::Error),
  #[error("序列化错误: {0}")]
  EncodeError(#[from] serde_json::Error),
  #[error("区域 {zone} 的累计时长无法表示")]
  DurationOverflow { zone: String },
}

/// 持久化内容无法解析的原因
#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("JSON 格式错误: {0}")]
  Malformed(#[from] serde_json::Error),
  #[error("区域 {zone} 的累计时长无效: {value}")]
  InvalidDuration { zone: String, value: f64 },
  #[error("区域 {zone} 的起始时间无效: {value}")]
  InvalidTimestamp { zone: String, value: String },
}

/// 一个摄像头全部区域的占用记录，按区域名称索引
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
  records: BTreeMap<String, OccupancyRecord>,
}

impl PersistedState {
  /// 每个区域一条全零记录
  pub fn fresh(zones: &[Zone]) -> Self {
    Self {
      records: zones
        .iter()
        .map(|zone| (zone.name.clone(), OccupancyRecord::default()))
        .collect(),
    }
  }

  pub fn get(&self, zone: &str) -> Option<&OccupancyRecord> {
    self.records.get(zone)
  }

  pub fn insert(&mut self, zone: String, record: OccupancyRecord) {
    self.records.insert(zone, record);
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &OccupancyRecord)> {
    self.records.iter()
  }
}

// 兼容旧文件的 `total_time` / `start_time` 字段名
#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
  #[serde(alias = "total_time")]
  accumulated_seconds: f64,
  // 缺失字段视为损坏，而不是默认为 null
  #[serde(alias = "start_time", deserialize_with = "Option::deserialize")]
  episode_start: Option<String>,
}

/// 解析持久化内容，只保留 `zones` 中配置的区域
pub fn decode(data: &[u8], zones: &[Zone]) -> Result<PersistedState, DecodeError> {
  let mut file: BTreeMap<String, RecordFile> = serde_json::from_slice(data)?;
  let mut state = PersistedState::default();

  for zone in zones {
    let record = match file.remove(&zone.name) {
      Some(entry) => decode_record(&zone.name, entry)?,
      None => {
        debug!(zone = %zone.name, "持久化文件中没有该区域，从零开始");
        OccupancyRecord::default()
      }
    };
    state.insert(zone.name.clone(), record);
  }

  for stale in file.keys() {
    debug!(zone = %stale, "忽略未配置区域的持久化记录");
  }

  Ok(state)
}

fn decode_record(zone: &str, entry: RecordFile) -> Result<OccupancyRecord, DecodeError> {
  let seconds = entry.accumulated_seconds;
  let invalid_duration = || DecodeError::InvalidDuration {
    zone: zone.to_string(),
    value: seconds,
  };
  if !seconds.is_finite() || seconds < 0.0 {
    return Err(invalid_duration());
  }
  let micros = (seconds * 1_000_000.0).round();
  if micros > i64::MAX as f64 {
    return Err(invalid_duration());
  }
  let accumulated = TimeDelta::microseconds(micros as i64);

  let episode_start = match entry.episode_start {
    Some(text) => Some(parse_timestamp(&text).ok_or_else(|| DecodeError::InvalidTimestamp {
      zone: zone.to_string(),
      value: text.clone(),
    })?),
    None => None,
  };

  Ok(OccupancyRecord::new(accumulated, episode_start))
}

/// 接受带时区偏移的 RFC 3339，或不带偏移的 ISO-8601（按本地时间解释）
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
  if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
    return Some(stamp.with_timezone(&Utc));
  }
  let naive = text.parse::<NaiveDateTime>().ok()?;
  Local
    .from_local_datetime(&naive)
    .earliest()
    .map(|stamp| stamp.with_timezone(&Utc))
}

pub fn encode(state: &PersistedState) -> Result<Vec<u8>, StoreError> {
  let mut file = BTreeMap::new();
  for (zone, record) in state.iter() {
    let micros = record
      .accumulated()
      .num_microseconds()
      .ok_or_else(|| StoreError::DurationOverflow { zone: zone.clone() })?;
    file.insert(
      zone.as_str(),
      RecordFile {
        accumulated_seconds: micros as f64 / 1_000_000.0,
        episode_start: record
          .episode_start()
          .map(|stamp| stamp.to_rfc3339_opts(SecondsFormat::Micros, true)),
      },
    );
  }
  Ok(serde_json::to_vec_pretty(&file)?)
}

/// 按摄像头划分的持久化目录
#[derive(Debug, Clone)]
pub struct DurationStore {
  directory: PathBuf,
}

impl DurationStore {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn path_for(&self, camera_id: &str) -> PathBuf {
    self.directory.join(format!("time_data_{}.json", camera_id))
  }

  /// 读取摄像头的持久化状态。任何读取或解析失败都退回全零状态。
  pub fn load(&self, camera_id: &str, zones: &[Zone]) -> PersistedState {
    let path = self.path_for(camera_id);
    let data = match fs::read(&path) {
      Ok(data) => data,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "没有持久化文件，创建新的记录");
        return PersistedState::fresh(zones);
      }
      Err(e) => {
        warn!(kind = "corrupt_state", path = %path.display(), error = %e, "读取持久化文件失败，重新开始计时");
        return PersistedState::fresh(zones);
      }
    };

    match decode(&data, zones) {
      Ok(state) => state,
      Err(e) => {
        warn!(kind = "corrupt_state", path = %path.display(), error = %e, "持久化文件已损坏，重新开始计时");
        PersistedState::fresh(zones)
      }
    }
  }

  /// 覆盖写入摄像头的全部区域记录
  pub fn save(&self, camera_id: &str, state: &PersistedState) -> Result<(), StoreError> {
    let data = encode(state)?;
    fs::create_dir_all(&self.directory)?;
    let path = self.path_for(camera_id);
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, &data)?;
    fs::rename(&staging, &path)?;
    Ok(())
  }
}
