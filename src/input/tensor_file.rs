// 该文件是 Bloco （积木编程） 项目的一部分。
// src/input/tensor_file.rs - 二进制张量文件输入
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RawTensor,
  input::{ShapeError, TensorShape, url_path},
};

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Shape error: {0}")]
  ShapeError(#[from] ShapeError),
  #[error("No tensor file found in {0}")]
  NoTensorFile(String),
}

const TENSOR_FILE_EXTENSION: &str = "bin";

/// 小端 `f32` 张量转储
///
/// 路径为目录时，目录下所有 `.bin` 文件按文件名排序作为连续帧。
pub struct TensorFileInput {
  files: Vec<PathBuf>,
  shape: TensorShape,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemaMismatch);
    }

    let shape = TensorShape::from_query(url)?;
    let path = url_path(url);
    let files = if path.is_dir() {
      let mut files: Vec<PathBuf> = std::fs::read_dir(&path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == TENSOR_FILE_EXTENSION))
        .collect();
      files.sort();
      if files.is_empty() {
        return Err(TensorFileInputError::NoTensorFile(path.display().to_string()));
      }
      files
    } else {
      std::fs::metadata(&path)?;
      vec![path]
    };
    debug!("张量文件数量: {}", files.len());

    Ok(TensorFileInput { files, shape })
  }
}

impl TensorFileInput {
  pub fn with_classes(mut self, num_classes: usize) -> Result<Self, ShapeError> {
    self.shape = self.shape.with_classes(num_classes)?;
    Ok(self)
  }

  pub fn into_frames(self) -> TensorFileIter {
    TensorFileIter {
      files: self.files.into_iter(),
      shape: self.shape,
    }
  }
}

/// 逐个文件读取，读取失败的文件跳过
pub struct TensorFileIter {
  files: std::vec::IntoIter<PathBuf>,
  shape: TensorShape,
}

impl Iterator for TensorFileIter {
  type Item = RawTensor;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match read_f32_le(&path) {
        Ok(data) => return Some(self.shape.tensor(data)),
        Err(e) => warn!("读取张量文件 {} 失败: {}", path.display(), e),
      }
    }
    None
  }
}

fn read_f32_le(path: &Path) -> Result<Vec<f32>, std::io::Error> {
  let bytes = std::fs::read(path)?;
  let chunks = bytes.chunks_exact(4);
  if !chunks.remainder().is_empty() {
    warn!(
      "张量文件 {} 长度 {} 不是 4 的倍数，忽略末尾 {} 字节",
      path.display(),
      bytes.len(),
      chunks.remainder().len()
    );
  }
  Ok(
    chunks
      .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_tensor(path: &Path, values: &[f32]) {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    std::fs::write(path, bytes).unwrap();
  }

  #[test]
  fn reads_little_endian_dump() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("frame.bin");
    write_tensor(&file, &[1.0, 2.0, 3.0, 4.0, 0.5, 0.25]);

    let url = Url::parse(&format!("tensor://{}?classes=2", file.display())).unwrap();
    let frames: Vec<RawTensor> = TensorFileInput::from_url(&url).unwrap().into_frames().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].num_anchors(), 1);
    assert_eq!(frames[0].data(), &[1.0f32, 2.0, 3.0, 4.0, 0.5, 0.25][..]);
  }

  #[test]
  fn directory_frames_are_sorted() {
    let dir = tempfile::tempdir().unwrap();
    write_tensor(&dir.path().join("b.bin"), &[2.0]);
    write_tensor(&dir.path().join("a.bin"), &[1.0]);
    std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

    let url = Url::parse(&format!("tensor://{}?anchors=0", dir.path().display())).unwrap();
    let frames: Vec<RawTensor> = TensorFileInput::from_url(&url).unwrap().into_frames().collect();
    let firsts: Vec<f32> = frames.iter().map(|f| f.data()[0]).collect();
    assert_eq!(firsts, vec![1.0, 2.0]);
  }

  #[test]
  fn vocabulary_classes_set_the_stride() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("frame.bin");
    // 2 个锚点，每个 4 + 8 个浮点数
    write_tensor(&file, &[0.0; 24]);

    let url = Url::parse(&format!("tensor://{}", file.display())).unwrap();
    let frames: Vec<RawTensor> = TensorFileInput::from_url(&url)
      .unwrap()
      .with_classes(8)
      .unwrap()
      .into_frames()
      .collect();
    assert_eq!(frames[0].num_anchors(), 2);

    let url = Url::parse(&format!("tensor://{}?classes=20", file.display())).unwrap();
    assert!(matches!(
      TensorFileInput::from_url(&url).unwrap().with_classes(8),
      Err(ShapeError::ClassMismatch(20, 8))
    ));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("json:///tmp/x.bin").unwrap();
    assert!(matches!(
      TensorFileInput::from_url(&url),
      Err(TensorFileInputError::SchemaMismatch)
    ));
  }
}
