// 该文件是 Bloco （积木编程） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

use bloco::{
  agent::Heading,
  compiler::{DEFAULT_LOOP_REPEAT, LINE_TOLERANCE},
  model::NMS_IOU_THRESHOLD,
  world::{CellParseError, parse_cell},
};

/// Bloco 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测器原始输出来源
  /// 支持格式:
  /// - 二进制: tensor:///path/frame.bin?anchors=8400&layout=channel
  /// - JSON: json:///path/frames.json?classes=20
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 日志: log://?verbose
  /// - 目录记录: folder:///path/to/dir?always
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,

  /// 检测器类别顺序，逗号分隔（缺省为 20 类标准词表）
  #[arg(long, value_name = "LABELS", value_delimiter = ',')]
  pub labels: Vec<String>,

  /// 置信度阈值 (0.0 - 1.0)，缺省为拍照阈值 0.4
  #[arg(long, value_name = "THRESHOLD")]
  pub score_threshold: Option<f32>,

  /// 使用实时预览阈值 0.25
  #[arg(long)]
  pub preview: bool,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = NMS_IOU_THRESHOLD, value_name = "THRESHOLD")]
  pub iou_threshold: f32,

  /// 分行容差（像素）
  #[arg(long, default_value_t = LINE_TOLERANCE, value_name = "PIXELS")]
  pub line_tolerance: f32,

  /// 循环积木没有数字时的重复次数
  #[arg(long, default_value_t = DEFAULT_LOOP_REPEAT, value_name = "COUNT")]
  pub loop_repeat: u32,

  /// 网格宽度
  #[arg(long, default_value_t = 8)]
  pub width: i32,

  /// 网格高度
  #[arg(long, default_value_t = 8)]
  pub height: i32,

  /// 机器人起点 x,y
  #[arg(long, value_parser = parse_cell_arg, default_value = "0,0", value_name = "X,Y")]
  pub start: (i32, i32),

  /// 机器人初始朝向 (up, right, down, left)
  #[arg(long, value_parser = parse_heading, default_value = "up")]
  pub heading: Heading,

  /// 障碍格，可重复
  #[arg(long, value_parser = parse_cell_arg, value_name = "X,Y")]
  pub blocked: Vec<(i32, i32)>,

  /// 可收集物所在格，可重复
  #[arg(long, value_parser = parse_cell_arg, value_name = "X,Y")]
  pub collectible: Vec<(i32, i32)>,

  /// 终点格
  #[arg(long, value_parser = parse_cell_arg, value_name = "X,Y")]
  pub goal: Option<(i32, i32)>,

  /// 按真实时长等待动作与命令间隔
  #[arg(long)]
  pub realtime: bool,

  /// 检测循环最多处理的帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 检测循环每帧之间的间隔（毫秒）
  #[arg(long, value_name = "MILLIS")]
  pub tick_ms: Option<u64>,
}

fn parse_cell_arg(text: &str) -> Result<(i32, i32), CellParseError> {
  parse_cell(text)
}

fn parse_heading(text: &str) -> Result<Heading, String> {
  Heading::from_name(text).ok_or_else(|| format!("未知朝向: {}", text))
}
