//! # pbix-vertipaq
//!
//! 从报表容器（.pbix 风格的 zip 包）中提取内嵌的列式数据模型：
//! schema、元数据与逐行数据，不依赖任何厂商运行时。
//!
//! ## 整体架构
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         Model                            │
//! │   schema / statistics / relationships / measures ...     │
//! │   get_table(name)  ──────────────┐   （按需、无缓存）     │
//! │           │                      │                       │
//! │        Catalog                   ▼                       │
//! │   ┌─────────────────┐   ┌────────────────────────────┐  │
//! │   │ TableDef        │   │  decode_table               │  │
//! │   │ ColumnDef       │──►│   └─ decode_column × N      │  │
//! │   │ PartitionDef    │   │       ├─ Dictionary / Hash  │  │
//! │   │ SegmentDef      │   │       ├─ SegmentReader      │  │
//! │   │ Relationship... │   │       └─ 逻辑类型转换        │  │
//! │   └───────▲─────────┘   └──────────────┬─────────────┘  │
//! │           │ catalog::parse             │ read_stream     │
//! │   ┌───────┴────────────────────────────▼─────────────┐   │
//! │   │  Container：zip → DataModel → LZ4 镜像 → 虚拟文件表 │   │
//! │   └──────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```

// ── 基础 ──────────────────────────────────────────────────────────────────────
pub mod common;
pub mod reader;
pub mod field_type;

// ── 解包层 ────────────────────────────────────────────────────────────────────
pub mod compression;
pub mod container;

// ── Catalog 层 ────────────────────────────────────────────────────────────────
pub mod meta;
pub mod catalog;

// ── 解码层 ────────────────────────────────────────────────────────────────────
pub mod encoding;
pub mod dictionary;
pub mod segment;
pub mod column;
pub mod table;

// ── 门面与导出 ────────────────────────────────────────────────────────────────
pub mod model;
pub mod export;

pub use common::{ModelConfig, ModelError, Result};
pub use field_type::{DataType, EncodingKind, FixedDecimal, Value};
pub use model::Model;
pub use table::{ColumnData, TableData};

/// 打开一个报表容器文件
pub fn open(path: impl AsRef<std::path::Path>) -> Result<Model> {
    Model::open(path)
}
