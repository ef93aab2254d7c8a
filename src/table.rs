//! 表级解码与表格结果

use crate::column::decode_column;
use crate::common::{ModelConfig, ModelError, Result};
use crate::container::Container;
use crate::field_type::{DataType, Value};
use crate::meta::Catalog;

// ── ColumnData ────────────────────────────────────────────────────────────────

/// 一列完整物化后的值
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    pub name:      String,
    pub data_type: DataType,
    pub values:    Vec<Value>,
}

// ── TableData ─────────────────────────────────────────────────────────────────

/// 列式存放、按行位置对齐的表格结果；列顺序即 catalog 顺序
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub name:    String,
    pub columns: Vec<ColumnData>,
    row_count:   usize,
}

impl TableData {
    pub fn row_count(&self)    -> usize { self.row_count }
    pub fn column_count(&self) -> usize { self.columns.len() }
    pub fn is_empty(&self)     -> bool  { self.row_count == 0 }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 第 `index` 行，按列顺序
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.row_count).filter_map(move |i| self.row(i))
    }
}

/// 按名称解码整张表（大小写敏感精确匹配）；各列独立解码后按行位置对齐
pub fn decode_table(
    container: &Container,
    catalog:   &Catalog,
    name:      &str,
    config:    &ModelConfig,
) -> Result<TableData> {
    let (t, table) = catalog.table_by_name(name)
        .ok_or_else(|| ModelError::NotFound(format!("table {name:?}")))?;

    let mut columns = Vec::with_capacity(table.columns.len());
    for (c, col) in catalog.table_columns(t) {
        let values = decode_column(container, catalog, c, config)?;
        columns.push(ColumnData { name: col.name.clone(), data_type: col.data_type, values });
    }

    // 每列长度已等于声明行数，这里只是确认对齐
    let row_count = table.row_count as usize;
    if let Some(bad) = columns.iter().find(|c| c.values.len() != row_count) {
        return Err(ModelError::RowCountMismatch {
            column:   format!("{name}[{}]", bad.name),
            expected: table.row_count,
            actual:   bad.values.len() as u64,
        });
    }

    log::debug!("decoded table {name:?}: {row_count} rows × {} columns", columns.len());
    Ok(TableData { name: name.into(), columns, row_count })
}
