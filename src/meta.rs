//! Catalog 元数据：表 / 列 / 分区 / 段 / 关系 / 公式定义，以及派生视图
//!
//! 所有定义以 arena 方式存放在 `Catalog` 中，交叉引用使用下标，
//! 解析阶段已校验全部下标可解析。

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::common::{
    serialize_timestamp, ColumnIdx, PartitionIdx, SegmentIdx, TableIdx,
};
use crate::field_type::{DataType, Encoding, EncodingKind};

// ── 模型 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name:                String,
    pub culture:             String,
    pub compatibility_level: u32,
    pub modified_time:       Option<NaiveDateTime>,
    /// catalog 头部声明的格式版本
    pub catalog_version:     u16,
}

// ── 表 ────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TableDef {
    pub name:          String,
    pub row_count:     u64,
    pub is_hidden:     bool,
    pub modified_time: NaiveDateTime,
    pub description:   String,
    /// catalog 顺序
    pub columns:       Vec<ColumnIdx>,
    /// catalog 顺序
    pub partitions:    Vec<PartitionIdx>,
}

// ── 列 ────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub table:           TableIdx,
    pub name:            String,
    pub data_type:       DataType,
    pub encoding:        Encoding,
    pub is_hidden:       bool,
    pub dictionary:      Option<String>,
    pub dictionary_size: u64,
    pub hash_index:      Option<String>,
    pub hash_index_size: u64,
    pub description:     String,
    pub format_string:   String,
    /// 按 (分区在表内的位置, 段序号) 排序
    pub segments:        Vec<SegmentIdx>,
    pub is_calculated:   bool,
}

// ── 分区 / 段 ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMode {
    Import,
    DirectQuery,
    Dual,
    Other(u8),
}

impl PartitionMode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Import,
            1 => Self::DirectQuery,
            2 => Self::Dual,
            n => Self::Other(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSource {
    None,
    /// M 查询
    Query,
    /// DAX 计算表
    Calculated,
    Other(u8),
}

impl PartitionSource {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Query,
            2 => Self::Calculated,
            n => Self::Other(n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PartitionDef {
    pub table:          TableIdx,
    pub name:           String,
    pub mode:           PartitionMode,
    pub source:         PartitionSource,
    pub query:          String,
    pub refreshed_time: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct SegmentDef {
    pub partition:   PartitionIdx,
    pub column:      ColumnIdx,
    pub ordinal:     u32,
    pub row_count:   u64,
    /// 直接值编码的基准（段内最小值）
    pub min_value:   i64,
    pub stream:      String,
    pub stream_size: u64,
}

// ── 关系 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::One),
            2 => Some(Self::Many),
            _ => None,
        }
    }
    fn symbol(self) -> char {
        match self { Self::One => '1', Self::Many => 'M' }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossFilter {
    OneDirection,
    BothDirections,
    Automatic,
}

impl CrossFilter {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::OneDirection),
            2 => Some(Self::BothDirections),
            3 => Some(Self::Automatic),
            _ => None,
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            Self::OneDirection   => "OneDirection",
            Self::BothDirections => "BothDirections",
            Self::Automatic      => "Automatic",
        }
    }
}

/// (表, 列) → (表, 列) 的有向引用边，不拥有任何一端
#[derive(Debug, Clone)]
pub struct RelationshipDef {
    pub name:             String,
    pub from_column:      ColumnIdx,
    pub to_column:        ColumnIdx,
    pub from_cardinality: Cardinality,
    pub to_cardinality:   Cardinality,
    pub cross_filter:     CrossFilter,
    pub is_active:        bool,
}

// ── 公式（不求值，原样透出）─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MeasureDef {
    pub table:          TableIdx,
    pub name:           String,
    pub expression:     String,
    pub display_folder: String,
    pub description:    String,
    pub format_string:  String,
}

#[derive(Debug, Clone)]
pub struct CalculatedColumnDef {
    pub column:     ColumnIdx,
    pub expression: String,
}

#[derive(Debug, Clone)]
pub struct ParameterDef {
    pub name:          String,
    pub description:   String,
    pub expression:    String,
    pub modified_time: NaiveDateTime,
}

// ── Catalog ───────────────────────────────────────────────────────────────────

/// 解析完成的逻辑 schema；构造后只读
#[derive(Debug, Clone)]
pub struct Catalog {
    pub info:               ModelInfo,
    pub tables:             Vec<TableDef>,
    pub columns:            Vec<ColumnDef>,
    pub partitions:         Vec<PartitionDef>,
    pub segments:           Vec<SegmentDef>,
    pub relationships:      Vec<RelationshipDef>,
    pub measures:           Vec<MeasureDef>,
    pub calculated_columns: Vec<CalculatedColumnDef>,
    pub parameters:         Vec<ParameterDef>,
    pub(crate) table_index: HashMap<String, TableIdx>,
}

impl Catalog {
    /// 大小写敏感的精确匹配
    pub fn table_by_name(&self, name: &str) -> Option<(TableIdx, &TableDef)> {
        self.table_index.get(name).map(|&i| (i, &self.tables[i]))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn table_columns(&self, table: TableIdx) -> impl Iterator<Item = (ColumnIdx, &ColumnDef)> {
        self.tables[table].columns.iter().map(move |&c| (c, &self.columns[c]))
    }

    /// "表名[列名]"，用于错误与日志
    pub fn qualified_name(&self, column: ColumnIdx) -> String {
        let col = &self.columns[column];
        format!("{}[{}]", self.tables[col.table].name, col.name)
    }

    pub fn column_data_size(&self, column: ColumnIdx) -> u64 {
        self.columns[column].segments.iter()
            .map(|&s| self.segments[s].stream_size)
            .sum()
    }

    pub fn column_total_size(&self, column: ColumnIdx) -> u64 {
        let col = &self.columns[column];
        col.dictionary_size + col.hash_index_size + self.column_data_size(column)
    }

    /// 所有流声明大小之和
    pub fn total_size(&self) -> u64 {
        (0..self.columns.len()).map(|c| self.column_total_size(c)).sum()
    }

    // ── 视图 ──────────────────────────────────────────────────────────────────

    pub fn schema(&self) -> Vec<SchemaEntry> {
        self.tables.iter().enumerate()
            .flat_map(|(t, table)| self.table_columns(t).map(move |(_, col)| SchemaEntry {
                table_name:    table.name.clone(),
                column_name:   col.name.clone(),
                data_type:     col.data_type,
                encoding:      col.encoding.kind,
                bit_width:     col.encoding.bit_width,
                cardinality:   col.encoding.cardinality,
                is_hidden:     col.is_hidden,
                is_calculated: col.is_calculated,
            }))
            .collect()
    }

    pub fn statistics(&self) -> Vec<ColumnStatistics> {
        self.tables.iter().enumerate()
            .flat_map(|(t, table)| self.table_columns(t).map(move |(c, col)| ColumnStatistics {
                table_name:    table.name.clone(),
                column_name:   col.name.clone(),
                cardinality:   col.encoding.cardinality,
                dictionary:    col.dictionary_size,
                hash_index:    col.hash_index_size,
                data_size:     self.column_data_size(c),
                row_count:     table.row_count,
                segment_count: col.segments.len(),
            }))
            .collect()
    }

    pub fn table_statistics(&self) -> Vec<TableStatistics> {
        self.tables.iter()
            .map(|table| TableStatistics {
                table_name:      table.name.clone(),
                row_count:       table.row_count,
                column_count:    table.columns.len(),
                partition_count: table.partitions.len(),
                total_size:      table.columns.iter().map(|&c| self.column_total_size(c)).sum(),
            })
            .collect()
    }

    pub fn relationships(&self) -> Vec<RelationshipView> {
        self.relationships.iter()
            .map(|r| {
                let from = &self.columns[r.from_column];
                let to   = &self.columns[r.to_column];
                RelationshipView {
                    name:                     r.name.clone(),
                    from_table_name:          self.tables[from.table].name.clone(),
                    from_column_name:         from.name.clone(),
                    to_table_name:            self.tables[to.table].name.clone(),
                    to_column_name:           to.name.clone(),
                    is_active:                r.is_active,
                    cardinality:              format!(
                        "{}:{}", r.from_cardinality.symbol(), r.to_cardinality.symbol()
                    ),
                    cross_filtering_behavior: r.cross_filter.name(),
                    from_key_count:           from.encoding.cardinality,
                    to_key_count:             to.encoding.cardinality,
                }
            })
            .collect()
    }

    pub fn measures(&self) -> Vec<MeasureView> {
        self.measures.iter()
            .map(|m| MeasureView {
                table_name:     self.tables[m.table].name.clone(),
                name:           m.name.clone(),
                expression:     m.expression.clone(),
                display_folder: m.display_folder.clone(),
                description:    m.description.clone(),
                format_string:  m.format_string.clone(),
            })
            .collect()
    }

    pub fn calculated_columns(&self) -> Vec<CalculatedColumnView> {
        self.calculated_columns.iter()
            .map(|cc| {
                let col = &self.columns[cc.column];
                CalculatedColumnView {
                    table_name:  self.tables[col.table].name.clone(),
                    column_name: col.name.clone(),
                    expression:  cc.expression.clone(),
                }
            })
            .collect()
    }

    pub fn calculated_tables(&self) -> Vec<CalculatedTableView> {
        self.partitions.iter()
            .filter(|p| p.source == PartitionSource::Calculated)
            .map(|p| CalculatedTableView {
                table_name: self.tables[p.table].name.clone(),
                expression: p.query.clone(),
            })
            .collect()
    }

    pub fn query_expressions(&self) -> Vec<QueryExpressionView> {
        self.partitions.iter()
            .filter(|p| p.source == PartitionSource::Query)
            .map(|p| QueryExpressionView {
                table_name:     self.tables[p.table].name.clone(),
                partition_name: p.name.clone(),
                expression:     p.query.clone(),
            })
            .collect()
    }

    pub fn parameters(&self) -> Vec<ParameterView> {
        self.parameters.iter()
            .map(|p| ParameterView {
                name:          p.name.clone(),
                description:   p.description.clone(),
                expression:    p.expression.clone(),
                modified_time: p.modified_time,
            })
            .collect()
    }

    /// 通用模型属性（名称 / 值对）
    pub fn metadata(&self, stream_count: usize) -> Vec<ModelProperty> {
        let info = &self.info;
        let mut out = vec![
            ModelProperty::new("Name", &info.name),
            ModelProperty::new("Culture", &info.culture),
            ModelProperty::new("CompatibilityLevel", &info.compatibility_level.to_string()),
        ];
        if let Some(ts) = &info.modified_time {
            out.push(ModelProperty::new("ModifiedTime", &crate::common::format_timestamp(ts)));
        }
        out.push(ModelProperty::new("CatalogVersion", &info.catalog_version.to_string()));
        out.push(ModelProperty::new("StreamCount", &stream_count.to_string()));
        out
    }
}

// ── 视图行 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelProperty {
    pub name:  String,
    pub value: String,
}

impl ModelProperty {
    fn new(name: &str, value: &str) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaEntry {
    pub table_name:    String,
    pub column_name:   String,
    pub data_type:     DataType,
    pub encoding:      EncodingKind,
    pub bit_width:     u8,
    pub cardinality:   u32,
    pub is_hidden:     bool,
    pub is_calculated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnStatistics {
    pub table_name:    String,
    pub column_name:   String,
    pub cardinality:   u32,
    pub dictionary:    u64,
    pub hash_index:    u64,
    pub data_size:     u64,
    pub row_count:     u64,
    pub segment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableStatistics {
    pub table_name:      String,
    pub row_count:       u64,
    pub column_count:    usize,
    pub partition_count: usize,
    pub total_size:      u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RelationshipView {
    pub name:                     String,
    pub from_table_name:          String,
    pub from_column_name:         String,
    pub to_table_name:            String,
    pub to_column_name:           String,
    pub is_active:                bool,
    pub cardinality:              String,
    pub cross_filtering_behavior: &'static str,
    pub from_key_count:           u32,
    pub to_key_count:             u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeasureView {
    pub table_name:     String,
    pub name:           String,
    pub expression:     String,
    pub display_folder: String,
    pub description:    String,
    pub format_string:  String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CalculatedColumnView {
    pub table_name:  String,
    pub column_name: String,
    pub expression:  String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CalculatedTableView {
    pub table_name: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryExpressionView {
    pub table_name:     String,
    pub partition_name: String,
    pub expression:     String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterView {
    pub name:          String,
    pub description:   String,
    pub expression:    String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub modified_time: NaiveDateTime,
}
