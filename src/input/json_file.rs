// 该文件是 Bloco （积木编程） 项目的一部分。
// src/input/json_file.rs - JSON 张量输入
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RawTensor,
  input::{ShapeError, TensorShape, url_path},
};

#[derive(Error, Debug)]
pub enum JsonTensorInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("Shape error: {0}")]
  ShapeError(#[from] ShapeError),
}

/// 单帧为扁平数组，多帧为数组的数组
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonFrames {
  Single(Vec<f32>),
  Multiple(Vec<Vec<f32>>),
}

pub struct JsonTensorInput {
  frames: Vec<Vec<f32>>,
  shape: TensorShape,
}

impl FromUrlWithScheme for JsonTensorInput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonTensorInput {
  type Error = JsonTensorInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonTensorInputError::SchemaMismatch);
    }

    let shape = TensorShape::from_query(url)?;
    let text = std::fs::read_to_string(url_path(url))?;
    let input = JsonTensorInput::from_json(&text, shape)?;
    debug!("JSON 张量帧数: {}", input.frames.len());
    Ok(input)
  }
}

impl JsonTensorInput {
  pub fn from_json(text: &str, shape: TensorShape) -> Result<Self, JsonTensorInputError> {
    let frames = match serde_json::from_str::<JsonFrames>(text)? {
      JsonFrames::Single(data) => vec![data],
      JsonFrames::Multiple(frames) => frames,
    };
    Ok(JsonTensorInput { frames, shape })
  }

  pub fn with_classes(mut self, num_classes: usize) -> Result<Self, ShapeError> {
    self.shape = self.shape.with_classes(num_classes)?;
    Ok(self)
  }

  pub fn into_frames(self) -> std::vec::IntoIter<RawTensor> {
    let shape = self.shape;
    self
      .frames
      .into_iter()
      .map(|data| shape.tensor(data))
      .collect::<Vec<_>>()
      .into_iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_frame_array() {
    let shape = TensorShape {
      classes: Some(2),
      ..Default::default()
    };
    let input = JsonTensorInput::from_json("[1, 2, 3, 4, 0.9, 0.1]", shape).unwrap();
    let frames: Vec<RawTensor> = input.into_frames().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].num_anchors(), 1);
  }

  #[test]
  fn multiple_frames() {
    let shape = TensorShape {
      anchors: Some(1),
      classes: Some(1),
      ..Default::default()
    };
    let input = JsonTensorInput::from_json("[[1, 2, 3, 4, 0.9], []]", shape).unwrap();
    let frames: Vec<RawTensor> = input.into_frames().collect();
    assert_eq!(frames.len(), 2);
    assert!(frames[1].is_empty());
  }

  #[test]
  fn rejects_non_numeric_json() {
    assert!(JsonTensorInput::from_json("{\"a\": 1}", TensorShape::default()).is_err());
  }
}
