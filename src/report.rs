// 该文件是 Tingliu （停留） 项目的一部分。
// src/report.rs - 周期报表
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

//! # 周期报表
//!
//! 报表位于 `<directory>/<camera_id>/` 下，每张表是一个制表符分隔的文本文件，
//! 每列按最宽的单元格补齐空格。
//!
//! - [`ReportPolicy::Append`]：`time_tracking.tsv`，每个周期追加一行；
//! - [`ReportPolicy::Daily`]：每天一张 `<YYYY-MM-DD>.tsv`，只有一行数据，每次覆盖。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const APPEND_TABLE: &str = "time_tracking";
const TABLE_EXTENSION: &str = "tsv";
const COLUMN_PADDING: usize = 2;

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] io::Error),
  #[error("未知的报表策略: {0}")]
  UnknownPolicy(String),
}

/// 报表写入策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPolicy {
  /// 每个周期追加一行
  #[default]
  Append,
  /// 每天一行，同一天内覆盖
  Daily,
}

impl FromStr for ReportPolicy {
  type Err = ReportError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "append" => Ok(ReportPolicy::Append),
      "daily" => Ok(ReportPolicy::Daily),
      other => Err(ReportError::UnknownPolicy(other.to_string())),
    }
  }
}

/// 将时长格式化为 `HH:MM:SS`，不足一秒的部分直接舍去
pub fn format_duration(duration: TimeDelta) -> String {
  let total = duration.num_seconds().max(0);
  let (hours, remainder) = (total / 3600, total % 3600);
  let (minutes, seconds) = (remainder / 60, remainder % 60);
  format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// 内存中的报表：表头加若干数据行
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTable {
  pub header: Vec<String>,
  pub rows: Vec<Vec<String>>,
}

impl ReportTable {
  pub fn parse(text: &str) -> Self {
    let mut lines = text
      .lines()
      .filter(|line| !line.trim().is_empty())
      .map(|line| {
        line
          .split('\t')
          .map(|cell| cell.trim_end().to_string())
          .collect::<Vec<_>>()
      });
    let header = lines.next().unwrap_or_default();
    Self {
      header,
      rows: lines.collect(),
    }
  }

  /// 每列宽度为该列最长内容加两个空格
  pub fn render(&self) -> String {
    let columns = std::iter::once(&self.header)
      .chain(self.rows.iter())
      .map(Vec::len)
      .max()
      .unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(&self.header).chain(self.rows.iter()) {
      for (width, cell) in widths.iter_mut().zip(row.iter()) {
        *width = (*width).max(cell.chars().count());
      }
    }

    let mut text = String::new();
    for row in std::iter::once(&self.header).chain(self.rows.iter()) {
      let last = row.len().saturating_sub(1);
      for (index, cell) in row.iter().enumerate() {
        text.push_str(cell);
        if index < last {
          let pad = widths[index] + COLUMN_PADDING - cell.chars().count();
          text.extend(std::iter::repeat_n(' ', pad));
          text.push('\t');
        }
      }
      text.push('\n');
    }
    text
  }
}

/// 报表写入器，每个摄像头一个子目录
#[derive(Debug, Clone)]
pub struct ReportWriter {
  directory: PathBuf,
  policy: ReportPolicy,
}

impl ReportWriter {
  pub fn new(directory: impl Into<PathBuf>, policy: ReportPolicy) -> Self {
    Self {
      directory: directory.into(),
      policy,
    }
  }

  pub fn policy(&self) -> ReportPolicy {
    self.policy
  }

  pub fn table_path(&self, camera_id: &str, timestamp: DateTime<Utc>) -> PathBuf {
    let name = match self.policy {
      ReportPolicy::Append => APPEND_TABLE.to_string(),
      ReportPolicy::Daily => period_key(timestamp),
    };
    self
      .directory
      .join(camera_id)
      .join(name)
      .with_extension(TABLE_EXTENSION)
  }

  /// 写入一次快照。`durations` 的顺序决定新表的列顺序。
  pub fn append_snapshot(
    &self,
    camera_id: &str,
    timestamp: DateTime<Utc>,
    durations: &[(String, TimeDelta)],
  ) -> Result<PathBuf, ReportError> {
    let path = self.table_path(camera_id, timestamp);
    let mut table = read_table(&path)?;

    let (first_column, label) = match self.policy {
      ReportPolicy::Append => ("Time", local_time(timestamp)),
      ReportPolicy::Daily => ("Date", period_key(timestamp)),
    };

    if table.header.is_empty() {
      table.header = std::iter::once(first_column.to_string())
        .chain(durations.iter().map(|(name, _)| name.clone()))
        .collect();
    } else if !same_columns(&table.header, durations) {
      warn!(
        kind = "report",
        path = %path.display(),
        "区域列表与报表表头不一致，按表头列名写入"
      );
    }

    let row = std::iter::once(label)
      .chain(table.header.iter().skip(1).map(|column| {
        durations
          .iter()
          .find(|(name, _)| name == column)
          .map(|(_, duration)| format_duration(*duration))
          .unwrap_or_default()
      }))
      .collect::<Vec<_>>();

    match self.policy {
      ReportPolicy::Append => table.rows.push(row),
      ReportPolicy::Daily => table.rows = vec![row],
    }

    write_table(&path, &table)?;
    debug!(path = %path.display(), rows = table.rows.len(), "报表已更新");
    Ok(path)
  }
}

fn period_key(timestamp: DateTime<Utc>) -> String {
  timestamp
    .with_timezone(&Local)
    .format("%Y-%m-%d")
    .to_string()
}

fn local_time(timestamp: DateTime<Utc>) -> String {
  timestamp
    .with_timezone(&Local)
    .format("%Y-%m-%d %H:%M:%S")
    .to_string()
}

fn same_columns(header: &[String], durations: &[(String, TimeDelta)]) -> bool {
  header.len() == durations.len() + 1
    && header
      .iter()
      .skip(1)
      .zip(durations.iter())
      .all(|(column, (name, _))| column == name)
}

fn read_table(path: &Path) -> Result<ReportTable, io::Error> {
  match fs::read_to_string(path) {
    Ok(text) => Ok(ReportTable::parse(&text)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ReportTable::default()),
    Err(e) => Err(e),
  }
}

fn write_table(path: &Path, table: &ReportTable) -> Result<(), io::Error> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let staging = path.with_extension("tsv.tmp");
  fs::write(&staging, table.render())?;
  fs::rename(&staging, path)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
  }

  fn durations(values: &[(&str, i64)]) -> Vec<(String, TimeDelta)> {
    values
      .iter()
      .map(|(name, secs)| (name.to_string(), TimeDelta::seconds(*secs)))
      .collect()
  }

  #[test]
  fn formats_hours_minutes_seconds() {
    assert_eq!(format_duration(TimeDelta::seconds(3661)), "01:01:01");
    assert_eq!(format_duration(TimeDelta::zero()), "00:00:00");
    assert_eq!(format_duration(TimeDelta::milliseconds(59_999)), "00:00:59");
    assert_eq!(format_duration(TimeDelta::hours(123)), "123:00:00");
  }

  #[test]
  fn parses_policy_names() {
    assert_eq!("daily".parse::<ReportPolicy>().unwrap(), ReportPolicy::Daily);
    assert_eq!("append".parse::<ReportPolicy>().unwrap(), ReportPolicy::Append);
    assert!("weekly".parse::<ReportPolicy>().is_err());
  }

  #[test]
  fn rendered_table_parses_back() {
    let table = ReportTable {
      header: vec!["Time".into(), "Desk A".into(), "B".into()],
      rows: vec![vec!["2026-01-01 10:00:00".into(), "01:01:01".into(), "".into()]],
    };
    let text = table.render();
    assert!(text.starts_with("Time                 \tDesk A    \tB\n"));
    assert_eq!(ReportTable::parse(&text), table);
  }

  #[test]
  fn append_policy_adds_a_row_each_time() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ReportWriter::new(dir.path(), ReportPolicy::Append);

    writer
      .append_snapshot("cam", at(0), &durations(&[("A", 3661), ("B", 0)]))
      .unwrap();
    let path = writer
      .append_snapshot("cam", at(60), &durations(&[("A", 3700), ("B", 5)]))
      .unwrap();

    assert_eq!(path, dir.path().join("cam").join("time_tracking.tsv"));
    let table = ReportTable::parse(&fs::read_to_string(&path).unwrap());
    assert_eq!(table.header, vec!["Time", "A", "B"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0][0], local_time(at(0)));
    assert_eq!(table.rows[0][1..], ["01:01:01", "00:00:00"]);
    assert_eq!(table.rows[1][1..], ["01:01:40", "00:00:05"]);
  }

  #[test]
  fn daily_policy_replaces_the_row_of_the_day() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ReportWriter::new(dir.path(), ReportPolicy::Daily);

    writer
      .append_snapshot("cam", at(0), &durations(&[("A", 10)]))
      .unwrap();
    let path = writer
      .append_snapshot("cam", at(1), &durations(&[("A", 20)]))
      .unwrap();

    assert_eq!(
      path,
      dir.path().join("cam").join(format!("{}.tsv", period_key(at(0))))
    );
    let table = ReportTable::parse(&fs::read_to_string(&path).unwrap());
    assert_eq!(table.header, vec!["Date", "A"]);
    assert_eq!(table.rows, vec![vec![period_key(at(1)), "00:00:20".to_string()]]);
  }

  #[test]
  fn existing_header_wins_when_zones_change() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ReportWriter::new(dir.path(), ReportPolicy::Append);

    writer
      .append_snapshot("cam", at(0), &durations(&[("A", 1), ("B", 2)]))
      .unwrap();
    let path = writer
      .append_snapshot("cam", at(60), &durations(&[("B", 3), ("C", 4)]))
      .unwrap();

    let table = ReportTable::parse(&fs::read_to_string(&path).unwrap());
    assert_eq!(table.header, vec!["Time", "A", "B"]);
    assert_eq!(table.rows[1][1..], ["", "00:00:03"]);
  }
}
