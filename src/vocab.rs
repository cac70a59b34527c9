// 该文件是 Bloco （积木编程） 项目的一部分。
// src/vocab.rs - 积木类别词表
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

use std::sync::OnceLock;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::agent::Heading;

/// 完整模型的 20 个类别，顺序与训练时的 obj.names 一致
pub const STANDARD_LABELS: [&str; 20] = [
  "andar",
  "circulo",
  "inicio",
  "looping",
  "pegar",
  "pular",
  "triangulo",
  "zzz",
  "2",
  "3",
  "4",
  "5",
  "6",
  "7",
  "8",
  "9",
  "seta_up",
  "seta_down",
  "seta_left",
  "seta_right",
];

/// 积木类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
  Action,
  Direction,
  Multiplier,
  Control,
  Decorative,
}

/// 积木符号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
  /// andar
  Walk,
  /// pular
  Jump,
  /// pegar
  PickUp,
  /// seta_*
  Arrow(Heading),
  /// 2..=9
  Digit(u8),
  /// inicio
  Start,
  /// looping
  Loop,
  /// circulo
  Circle,
  /// triangulo
  Triangle,
  /// zzz
  Sleep,
}

impl Token {
  pub fn from_label(label: &str) -> Option<Token> {
    let token = match label {
      "andar" => Token::Walk,
      "pular" => Token::Jump,
      "pegar" => Token::PickUp,
      "seta_up" => Token::Arrow(Heading::Up),
      "seta_down" => Token::Arrow(Heading::Down),
      "seta_left" => Token::Arrow(Heading::Left),
      "seta_right" => Token::Arrow(Heading::Right),
      "inicio" => Token::Start,
      "looping" => Token::Loop,
      "circulo" => Token::Circle,
      "triangulo" => Token::Triangle,
      "zzz" => Token::Sleep,
      "2" => Token::Digit(2),
      "3" => Token::Digit(3),
      "4" => Token::Digit(4),
      "5" => Token::Digit(5),
      "6" => Token::Digit(6),
      "7" => Token::Digit(7),
      "8" => Token::Digit(8),
      "9" => Token::Digit(9),
      _ => return None,
    };
    Some(token)
  }

  pub fn label(self) -> &'static str {
    match self {
      Token::Walk => "andar",
      Token::Jump => "pular",
      Token::PickUp => "pegar",
      Token::Arrow(Heading::Up) => "seta_up",
      Token::Arrow(Heading::Down) => "seta_down",
      Token::Arrow(Heading::Left) => "seta_left",
      Token::Arrow(Heading::Right) => "seta_right",
      Token::Digit(n) => DIGIT_LABELS[(n.clamp(2, 9) - 2) as usize],
      Token::Start => "inicio",
      Token::Loop => "looping",
      Token::Circle => "circulo",
      Token::Triangle => "triangulo",
      Token::Sleep => "zzz",
    }
  }

  pub fn category(self) -> Category {
    match self {
      Token::Walk | Token::Jump | Token::PickUp => Category::Action,
      Token::Arrow(_) => Category::Direction,
      Token::Digit(_) => Category::Multiplier,
      Token::Start | Token::Loop => Category::Control,
      Token::Circle | Token::Triangle | Token::Sleep => Category::Decorative,
    }
  }
}

const DIGIT_LABELS: [&str; 8] = ["2", "3", "4", "5", "6", "7", "8", "9"];

impl Serialize for Token {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.label())
  }
}

impl std::fmt::Display for Token {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Error, Debug)]
pub enum VocabularyError {
  #[error("未知的积木标签: {0}")]
  UnknownLabel(String),
  #[error("重复的积木标签: {0}")]
  DuplicateLabel(String),
  #[error("词表为空")]
  Empty,
}

/// 类别编号到积木符号的映射，构建后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassVocabulary {
  tokens: Box<[Token]>,
}

impl ClassVocabulary {
  /// 按模型的类别顺序构建词表，用于 10/8 类等裁剪版本
  pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, VocabularyError> {
    if labels.is_empty() {
      return Err(VocabularyError::Empty);
    }

    let mut tokens = Vec::with_capacity(labels.len());
    for label in labels {
      let label = label.as_ref().trim();
      let token =
        Token::from_label(label).ok_or_else(|| VocabularyError::UnknownLabel(label.to_string()))?;
      if tokens.contains(&token) {
        return Err(VocabularyError::DuplicateLabel(label.to_string()));
      }
      tokens.push(token);
    }

    Ok(ClassVocabulary {
      tokens: tokens.into_boxed_slice(),
    })
  }

  /// 完整 20 类词表
  pub fn standard() -> &'static ClassVocabulary {
    static STANDARD: OnceLock<ClassVocabulary> = OnceLock::new();
    STANDARD.get_or_init(|| ClassVocabulary {
      tokens: STANDARD_LABELS
        .iter()
        .filter_map(|label| Token::from_label(label))
        .collect(),
    })
  }

  pub fn num_classes(&self) -> usize {
    self.tokens.len()
  }

  pub fn token(&self, class_id: u32) -> Option<Token> {
    self.tokens.get(class_id as usize).copied()
  }

  pub fn class_id(&self, token: Token) -> Option<u32> {
    self
      .tokens
      .iter()
      .position(|t| *t == token)
      .map(|idx| idx as u32)
  }

  pub fn tokens(&self) -> &[Token] {
    &self.tokens
  }
}
