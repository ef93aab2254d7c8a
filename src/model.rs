//! 顶层只读门面

use std::io::{Read, Seek};
use std::path::Path;

use crate::catalog;
use crate::common::{ModelConfig, Result};
use crate::container::Container;
use crate::meta::{
    CalculatedColumnView, CalculatedTableView, Catalog, ColumnStatistics, MeasureView,
    ModelInfo, ModelProperty, ParameterView, QueryExpressionView, RelationshipView,
    SchemaEntry, TableDef, TableStatistics,
};
use crate::table::{decode_table, TableData};

/// 加载完成的数据模型
///
/// 加载（解包 → catalog 解析）是同步、原子的：任一步失败都不会返回
/// 部分构造的 Model。表数据在 `get_table` 时按需解码，不缓存。
#[derive(Debug)]
pub struct Model {
    container: Container,
    catalog:   Catalog,
    config:    ModelConfig,
    size:      u64,
}

impl Model {
    // ── 加载 ──────────────────────────────────────────────────────────────────

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, ModelConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: ModelConfig) -> Result<Self> {
        let container = Container::open(path, &config)?;
        Self::load(container, config)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_config(bytes, ModelConfig::default())
    }

    pub fn from_bytes_with_config(bytes: &[u8], config: ModelConfig) -> Result<Self> {
        let container = Container::from_bytes(bytes, &config)?;
        Self::load(container, config)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_reader_with_config(reader, ModelConfig::default())
    }

    pub fn from_reader_with_config<R: Read + Seek>(reader: R, config: ModelConfig) -> Result<Self> {
        let container = Container::from_reader(reader, &config)?;
        Self::load(container, config)
    }

    fn load(container: Container, config: ModelConfig) -> Result<Self> {
        let catalog = catalog::parse(&container, &config)?;
        let size    = catalog.total_size();
        log::info!(
            "model loaded: {} streams, {} tables, {} columns, {size} bytes",
            container.stream_count(), catalog.tables.len(), catalog.columns.len()
        );
        Ok(Self { container, catalog, config, size })
    }

    // ── Schema / 元数据视图 ────────────────────────────────────────────────────

    pub fn table_names(&self) -> Vec<String> { self.catalog.table_names() }
    pub fn tables(&self) -> &[TableDef] { &self.catalog.tables }
    pub fn catalog(&self) -> &Catalog { &self.catalog }
    pub fn container(&self) -> &Container { &self.container }
    pub fn config(&self) -> &ModelConfig { &self.config }
    pub fn info(&self) -> &ModelInfo { &self.catalog.info }

    pub fn schema(&self) -> Vec<SchemaEntry> { self.catalog.schema() }
    pub fn statistics(&self) -> Vec<ColumnStatistics> { self.catalog.statistics() }
    pub fn table_statistics(&self) -> Vec<TableStatistics> { self.catalog.table_statistics() }
    pub fn metadata(&self) -> Vec<ModelProperty> {
        self.catalog.metadata(self.container.stream_count())
    }

    pub fn relationships(&self) -> Vec<RelationshipView> { self.catalog.relationships() }
    pub fn measures(&self) -> Vec<MeasureView> { self.catalog.measures() }
    pub fn calculated_columns(&self) -> Vec<CalculatedColumnView> { self.catalog.calculated_columns() }
    pub fn calculated_tables(&self) -> Vec<CalculatedTableView> { self.catalog.calculated_tables() }
    pub fn query_expressions(&self) -> Vec<QueryExpressionView> { self.catalog.query_expressions() }
    pub fn parameters(&self) -> Vec<ParameterView> { self.catalog.parameters() }

    /// catalog 声明的所有流字节数之和（加载时计算一次）
    pub fn size(&self) -> u64 { self.size }

    // ── 表数据 ────────────────────────────────────────────────────────────────

    /// 解码一张表；每次调用都重新解码
    pub fn get_table(&self, name: &str) -> Result<TableData> {
        decode_table(&self.container, &self.catalog, name, &self.config)
    }

    /// 并发解码多张表（每表一个 scoped 线程）；单表失败不影响其他表
    pub fn get_tables(&self, names: &[&str]) -> Vec<(String, Result<TableData>)> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = names.iter()
                .map(|&name| (name, scope.spawn(move || self.get_table(name))))
                .collect();
            handles.into_iter()
                .map(|(name, h)| {
                    let result = h.join().unwrap_or_else(|p| std::panic::resume_unwind(p));
                    (name.to_string(), result)
                })
                .collect()
        })
    }
}
