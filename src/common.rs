//! 全局基础类型、配置与错误定义

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use thiserror::Error;

// ── 索引类型别名 ───────────────────────────────────────────────────────────────
//
// Catalog 内部以 arena 方式存放各类定义，互相引用一律使用下标。

pub type TableIdx     = usize;
pub type ColumnIdx    = usize;
pub type PartitionIdx = usize;
pub type SegmentIdx   = usize;

/// 每秒的 100ns tick 数
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// 1601-01-01 00:00:00，Windows FILETIME 起点
pub fn windows_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1601, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("1601-01-01 is a valid calendar date")
}

// ── 配置 ──────────────────────────────────────────────────────────────────────

/// 只读配置，在加载时确定，随 Model 一起向下传递（不存在全局状态）
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// tick 的零点
    pub epoch:            NaiveDateTime,
    /// 压缩包内承载数据库镜像的条目名
    pub data_model_entry: String,
    /// 镜像内 catalog 流的路径
    pub catalog_stream:   String,
    /// 镜像声明的解压长度上限
    pub max_image_size:   u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            epoch:            windows_epoch(),
            data_model_entry: "DataModel".into(),
            catalog_stream:   "metadata.catalog".into(),
            max_image_size:   4 << 30,
        }
    }
}

impl ModelConfig {
    pub fn with_epoch(mut self, epoch: NaiveDateTime) -> Self {
        self.epoch = epoch; self
    }
    pub fn with_data_model_entry(mut self, entry: &str) -> Self {
        self.data_model_entry = entry.into(); self
    }
    pub fn with_catalog_stream(mut self, stream: &str) -> Self {
        self.catalog_stream = stream.into(); self
    }
    pub fn with_max_image_size(mut self, bytes: u64) -> Self {
        self.max_image_size = bytes; self
    }

    /// tick（100ns）→ 绝对时间点；超出 chrono 可表示范围时返回 None
    pub fn ticks_to_datetime(&self, ticks: i64) -> Option<NaiveDateTime> {
        let delta = TimeDelta::microseconds(ticks / 10)
            + TimeDelta::nanoseconds((ticks % 10) * 100);
        self.epoch.checked_add_signed(delta)
    }
}

/// 导出与视图统一使用的时间格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// serde `serialize_with` 辅助：时间点输出为固定格式字符串
pub fn serialize_timestamp<S>(ts: &NaiveDateTime, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&format_timestamp(ts))
}

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ModelError {
    // 加载阶段
    #[error("container format error: {0}")]
    ContainerFormat(String),
    #[error("missing stream in container: {0}")]
    MissingStream(String),
    #[error("decompression error: {0}")]
    Decompression(String),
    #[error("schema corrupt: {0}")]
    SchemaCorrupt(String),

    // 查找
    #[error("not found: {0}")]
    NotFound(String),

    // 解码阶段
    #[error("unsupported encoding {code} for column {column}")]
    UnsupportedEncoding { column: String, code: u8 },
    #[error("segment corrupt in stream {stream}: {reason}")]
    SegmentCorrupt { stream: String, reason: String },
    #[error("row count mismatch for {column}: expected {expected}, got {actual}")]
    RowCountMismatch { column: String, expected: u64, actual: u64 },
    #[error("dictionary index {index} out of range for {column} (dictionary size {len})")]
    DictionaryIndexOutOfRange { column: String, index: u64, len: usize },
    #[error("dictionary corrupt in stream {stream}: {reason}")]
    DictionaryCorrupt { stream: String, reason: String },
    #[error("hash key {key} not found for {column}")]
    HashKeyNotFound { column: String, key: u64 },
    #[error("type mismatch for {column}: {data_type} column cannot hold {found}")]
    TypeMismatch { column: String, data_type: String, found: String },
    #[error("tick value {0} is outside the representable date-time range")]
    TimestampOutOfRange(i64),

    // 外围
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// 加载阶段错误：Model 构造整体失败
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::ContainerFormat(_) | Self::MissingStream(_)
                | Self::Decompression(_) | Self::SchemaCorrupt(_)
        )
    }

    /// 解码阶段错误：只影响被请求的表/列
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedEncoding { .. } | Self::SegmentCorrupt { .. }
                | Self::RowCountMismatch { .. } | Self::DictionaryIndexOutOfRange { .. }
                | Self::DictionaryCorrupt { .. } | Self::HashKeyNotFound { .. }
                | Self::TypeMismatch { .. } | Self::TimestampOutOfRange(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
