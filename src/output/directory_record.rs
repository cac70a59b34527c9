// 该文件是 Bloco （积木编程） 项目的一部分。
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

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  compiler::Program,
  frame::RawTensor,
  input::url_path,
  interpreter::ExecutionReport,
  model::DetectResult,
  output::Render,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Serialize)]
struct DetectionRecord<'a> {
  recorded_at: DateTime<Utc>,
  num_anchors: usize,
  detections: &'a DetectResult,
}

#[derive(Serialize)]
struct ExecutionRecord<'a> {
  recorded_at: DateTime<Utc>,
  program: &'a Program,
  report: &'a ExecutionReport,
}

/// 把每次结果写成 JSON 文件，按 `年/月/日` 分目录存放
///
/// `folder:///path?always` 连空检测结果也会记录。
#[derive(Debug, Clone)]
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counters: Arc<Mutex<u16>>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(url_path(uri)).always(always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    DirectoryRecordOutput {
      directory: directory.into(),
      frame_counters: Arc::new(Mutex::new(0)),
      always: false,
    }
  }

  pub fn always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counters
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn record_path(&self, now: &DateTime<Utc>, kind: &str) -> Result<PathBuf, std::io::Error> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}-{}.json",
      now.format("%H-%M-%S"),
      self.frame_id(),
      kind
    )))
  }

  fn write_record<T: Serialize>(
    &self,
    path: &Path,
    record: &T,
  ) -> Result<(), DirectoryRecordOutputError> {
    let text = serde_json::to_string_pretty(record)?;
    std::fs::write(path, text)?;
    debug!("记录已写入 {}", path.display());
    Ok(())
  }
}

impl Render<RawTensor, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RawTensor, result: &DetectResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }
    let now = Utc::now();
    let path = self.record_path(&now, "detections")?;
    let record = DetectionRecord {
      recorded_at: now,
      num_anchors: frame.num_anchors(),
      detections: result,
    };
    self.write_record(&path, &record)
  }
}

impl Render<Program, ExecutionReport> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Program, result: &ExecutionReport) -> Result<(), Self::Error> {
    let now = Utc::now();
    let path = self.record_path(&now, "program")?;
    let record = ExecutionRecord {
      recorded_at: now,
      program: frame,
      report: result,
    };
    self.write_record(&path, &record)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn json_files(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == "json") {
          found.push(path);
        }
      }
    }
    found
  }

  #[test]
  fn empty_results_are_skipped_unless_always() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    let output = DirectoryRecordOutput::new(dir);
    output
      .render_result(&RawTensor::empty(), &DetectResult::default())
      .unwrap();
    assert!(json_files(dir).is_empty());

    let output = output.always(true);
    output
      .render_result(&RawTensor::empty(), &DetectResult::default())
      .unwrap();
    let files = json_files(dir);
    assert_eq!(files.len(), 1);
    let text = std::fs::read_to_string(&files[0]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["num_anchors"], 0);
  }

  #[test]
  fn execution_record_contains_program_and_report() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    let output = DirectoryRecordOutput::new(dir);
    output
      .render_result(&Program::default(), &ExecutionReport::default())
      .unwrap();

    let files = json_files(dir);
    assert_eq!(files.len(), 1);
    assert!(files[0].to_string_lossy().ends_with("-program.json"));
    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert!(value["program"]["nodes"].is_array());
    assert_eq!(value["report"]["commands_executed"], 0);
  }

  #[test]
  fn folder_scheme_is_required() {
    let url = url::Url::parse("log:///tmp/out").unwrap();
    assert!(matches!(
      DirectoryRecordOutput::from_url(&url),
      Err(DirectoryRecordOutputError::SchemeMismatch)
    ));
  }
}
