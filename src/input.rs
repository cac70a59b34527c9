// 该文件是 Bloco （积木编程） 项目的一部分。
// src/input.rs - 检测张量输入
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

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl,
  frame::{BOX_FIELDS, RawTensor, TensorLayout},
  vocab::STANDARD_LABELS,
};

#[cfg(feature = "tensor_file")]
mod tensor_file;
#[cfg(feature = "tensor_file")]
pub use self::tensor_file::{TensorFileInput, TensorFileInputError, TensorFileIter};

#[cfg(feature = "json_file")]
mod json_file;
#[cfg(feature = "json_file")]
pub use self::json_file::{JsonTensorInput, JsonTensorInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "tensor_file")]
  #[error("Tensor file input error: {0}")]
  TensorFileInputError(#[from] TensorFileInputError),
  #[cfg(feature = "json_file")]
  #[error("JSON tensor input error: {0}")]
  JsonTensorInputError(#[from] JsonTensorInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

#[derive(Error, Debug)]
pub enum ShapeError {
  #[error("invalid query '{0}={1}'")]
  InvalidQuery(String, String),
  #[error("classes={0} in URL does not match the {1}-class vocabulary")]
  ClassMismatch(usize, usize),
}

/// 从 URL 查询参数读取的张量形状
///
/// `anchors` 显式给出锚点数；否则按类别数从数据长度推算。类别数取 URL 中的
/// `classes`，其次是检测器词表（[`TensorShape::with_classes`]），都没有时为 20。
/// `layout` 取 `anchor` 或 `channel`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TensorShape {
  pub anchors: Option<usize>,
  pub classes: Option<usize>,
  pub layout: TensorLayout,
}

impl TensorShape {
  pub fn from_query(url: &Url) -> Result<Self, ShapeError> {
    let mut shape = TensorShape::default();
    for (k, v) in url.query_pairs() {
      let invalid = || ShapeError::InvalidQuery(k.to_string(), v.to_string());
      match k.as_ref() {
        "anchors" => shape.anchors = Some(v.parse().map_err(|_| invalid())?),
        "classes" => shape.classes = Some(v.parse().map_err(|_| invalid())?),
        "layout" => shape.layout = TensorLayout::from_name(&v).ok_or_else(invalid)?,
        _ => {}
      }
    }
    Ok(shape)
  }

  pub fn classes(&self) -> usize {
    self.classes.unwrap_or(STANDARD_LABELS.len())
  }

  /// 与检测器词表的类别数对齐，URL 中给出的 `classes` 不一致时报错
  pub fn with_classes(mut self, num_classes: usize) -> Result<Self, ShapeError> {
    match self.classes {
      Some(classes) if classes != num_classes => {
        Err(ShapeError::ClassMismatch(classes, num_classes))
      }
      _ => {
        self.classes = Some(num_classes);
        Ok(self)
      }
    }
  }

  /// 按形状包装数据，推算不出锚点数时锚点记为 0，解码结果为空
  pub fn tensor(&self, data: Vec<f32>) -> RawTensor {
    let stride = BOX_FIELDS + self.classes();
    let anchors = self.anchors.unwrap_or(if data.len() % stride == 0 {
      data.len() / stride
    } else {
      0
    });
    RawTensor::new(data, anchors, self.layout)
  }
}

/// URL 路径解码为文件路径
pub(crate) fn url_path(url: &Url) -> PathBuf {
  let path = url.path();
  let decoded = urlencoding::decode(path)
    .map(|p| p.into_owned())
    .unwrap_or_else(|_| path.to_string());
  PathBuf::from(decoded)
}

pub enum InputWrapper {
  #[cfg(feature = "tensor_file")]
  TensorFile(TensorFileInput),
  #[cfg(feature = "json_file")]
  JsonTensor(JsonTensorInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "tensor_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == TensorFileInput::SCHEME {
        let input = TensorFileInput::from_url(url)?;
        return Ok(InputWrapper::TensorFile(input));
      }
    }
    #[cfg(feature = "json_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == JsonTensorInput::SCHEME {
        let input = JsonTensorInput::from_url(url)?;
        return Ok(InputWrapper::JsonTensor(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl InputWrapper {
  /// 使用检测器词表的类别数推算锚点
  pub fn with_classes(self, num_classes: usize) -> Result<Self, InputError> {
    match self {
      #[cfg(feature = "tensor_file")]
      InputWrapper::TensorFile(input) => Ok(InputWrapper::TensorFile(
        input
          .with_classes(num_classes)
          .map_err(TensorFileInputError::from)?,
      )),
      #[cfg(feature = "json_file")]
      InputWrapper::JsonTensor(input) => Ok(InputWrapper::JsonTensor(
        input
          .with_classes(num_classes)
          .map_err(JsonTensorInputError::from)?,
      )),
    }
  }

  pub fn into_frames(self) -> InputWrapperIter {
    match self {
      #[cfg(feature = "tensor_file")]
      InputWrapper::TensorFile(input) => InputWrapperIter::TensorFile(input.into_frames()),
      #[cfg(feature = "json_file")]
      InputWrapper::JsonTensor(input) => InputWrapperIter::JsonTensor(input.into_frames()),
    }
  }
}

pub enum InputWrapperIter {
  #[cfg(feature = "tensor_file")]
  TensorFile(TensorFileIter),
  #[cfg(feature = "json_file")]
  JsonTensor(std::vec::IntoIter<RawTensor>),
}

impl Iterator for InputWrapperIter {
  type Item = RawTensor;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "tensor_file")]
      InputWrapperIter::TensorFile(input) => input.next(),
      #[cfg(feature = "json_file")]
      InputWrapperIter::JsonTensor(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shape_from_query() {
    let url = Url::parse("tensor:///tmp/a.bin?anchors=3&layout=channel").unwrap();
    let shape = TensorShape::from_query(&url).unwrap();
    assert_eq!(shape.anchors, Some(3));
    assert_eq!(shape.layout, TensorLayout::ChannelMajor);
    assert_eq!(shape.classes, None);
    assert_eq!(shape.classes(), 20);
  }

  #[test]
  fn shape_rejects_bad_values() {
    let url = Url::parse("tensor:///tmp/a.bin?layout=diagonal").unwrap();
    assert!(TensorShape::from_query(&url).is_err());
    let url = Url::parse("tensor:///tmp/a.bin?anchors=many").unwrap();
    assert!(TensorShape::from_query(&url).is_err());
  }

  #[test]
  fn anchors_inferred_from_length() {
    let shape = TensorShape {
      classes: Some(8),
      ..Default::default()
    };
    assert_eq!(shape.tensor(vec![0.0; 24]).num_anchors(), 2);
    assert_eq!(shape.tensor(vec![0.0; 25]).num_anchors(), 0);
  }

  #[test]
  fn percent_encoded_paths_are_decoded() {
    let url = Url::parse("json:///tmp/my%20blocks.json").unwrap();
    assert_eq!(url_path(&url), PathBuf::from("/tmp/my blocks.json"));
  }

  #[test]
  fn vocabulary_classes_fill_in_missing_query() {
    let shape = TensorShape::default().with_classes(8).unwrap();
    assert_eq!(shape.classes(), 8);
    assert_eq!(shape.tensor(vec![0.0; 24]).num_anchors(), 2);

    let url = Url::parse("json:///tmp/a.json?classes=20").unwrap();
    let shape = TensorShape::from_query(&url).unwrap();
    assert!(matches!(
      shape.with_classes(8),
      Err(ShapeError::ClassMismatch(20, 8))
    ));
    assert!(shape.with_classes(20).is_ok());
  }
}
