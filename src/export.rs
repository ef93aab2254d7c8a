//! JSON 导出
//!
//! 纯格式化：只消费 `Model` 的只读视图与已解码的表，不做任何解码。
//! 表数据可选；某张表解码失败时以 `{"error": "..."}` 内联记录，不影响整体导出。
//! 表按 `table_names()` 顺序、行对象的键按列顺序输出。

use std::path::Path;

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::common::Result;
use crate::meta::{
    CalculatedColumnView, CalculatedTableView, ColumnStatistics, MeasureView, ModelProperty,
    ParameterView, QueryExpressionView, RelationshipView, SchemaEntry,
};
use crate::model::Model;
use crate::table::TableData;

pub const EXPORT_TYPE: &str = "full_metadata";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// 是否附带每张表的全部行（可能很大）
    pub include_table_data: bool,
}

impl ExportOptions {
    pub fn with_table_data(mut self) -> Self {
        self.include_table_data = true; self
    }
}

// ── 文档结构 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub export_info: ExportInfo,
    pub model_info:  ModelSummary,
    pub metadata:    MetadataSection,
    pub power_query: PowerQuerySection,
    pub dax:         DaxSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_data:  Option<IndexMap<String, TableExport>>,
}

#[derive(Debug, Serialize)]
pub struct ExportInfo {
    pub exported_at:      String,
    pub exporter_version: &'static str,
    pub export_type:      &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub size_bytes:  u64,
    pub table_count: usize,
    pub table_names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MetadataSection {
    pub general:       Vec<ModelProperty>,
    pub schema:        Vec<SchemaEntry>,
    pub statistics:    Vec<ColumnStatistics>,
    pub relationships: Vec<RelationshipView>,
}

#[derive(Debug, Serialize)]
pub struct PowerQuerySection {
    pub expressions: Vec<QueryExpressionView>,
    pub parameters:  Vec<ParameterView>,
}

#[derive(Debug, Serialize)]
pub struct DaxSection {
    pub tables:   Vec<CalculatedTableView>,
    pub measures: Vec<MeasureView>,
    pub columns:  Vec<CalculatedColumnView>,
}

/// 单表导出：成功为行对象数组，失败为错误信息
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TableExport {
    Rows(Vec<Map<String, Json>>),
    Error { error: String },
}

impl TableExport {
    pub fn is_error(&self) -> bool { matches!(self, Self::Error { .. }) }
}

// ── 构建 ──────────────────────────────────────────────────────────────────────

pub fn build_document(model: &Model, options: &ExportOptions) -> Result<ExportDocument> {
    let table_names = model.table_names();

    let table_data = if options.include_table_data {
        let mut data = IndexMap::with_capacity(table_names.len());
        for name in &table_names {
            let entry = match model.get_table(name) {
                Ok(table) => TableExport::Rows(rows_as_objects(&table)?),
                Err(e)    => {
                    log::warn!("export: table {name:?} failed to decode: {e}");
                    TableExport::Error { error: e.to_string() }
                }
            };
            data.insert(name.clone(), entry);
        }
        Some(data)
    } else {
        None
    };

    Ok(ExportDocument {
        export_info: ExportInfo {
            exported_at:      Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string(),
            exporter_version: env!("CARGO_PKG_VERSION"),
            export_type:      EXPORT_TYPE,
        },
        model_info: ModelSummary {
            size_bytes:  model.size(),
            table_count: table_names.len(),
            table_names,
        },
        metadata: MetadataSection {
            general:       model.metadata(),
            schema:        model.schema(),
            statistics:    model.statistics(),
            relationships: model.relationships(),
        },
        power_query: PowerQuerySection {
            expressions: model.query_expressions(),
            parameters:  model.parameters(),
        },
        dax: DaxSection {
            tables:   model.calculated_tables(),
            measures: model.measures(),
            columns:  model.calculated_columns(),
        },
        table_data,
    })
}

/// 行对象：列名 → 值
fn rows_as_objects(table: &TableData) -> Result<Vec<Map<String, Json>>> {
    let mut rows = Vec::with_capacity(table.row_count());
    for row in table.rows() {
        let mut obj = Map::with_capacity(row.len());
        for (col, value) in table.columns.iter().zip(row) {
            obj.insert(col.name.clone(), serde_json::to_value(value)?);
        }
        rows.push(obj);
    }
    Ok(rows)
}

pub fn export_json(model: &Model, options: &ExportOptions) -> Result<String> {
    let doc = build_document(model, options)?;
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn export_json_to_file(
    model:   &Model,
    path:    impl AsRef<Path>,
    options: &ExportOptions,
) -> Result<()> {
    let json = export_json(model, options)?;
    std::fs::write(path.as_ref(), json)?;
    log::info!("exported model metadata to {}", path.as_ref().display());
    Ok(())
}
