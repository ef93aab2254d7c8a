//! Catalog 流解析
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │  MAGIC   (8 bytes) "VPQCATLG"      │
//! │  version (u16)                     │
//! │  count   (u32)                     │
//! ├────────────────────────────────────┤
//! │  kind (u16) | body_len (u32) | body│ × count
//! └────────────────────────────────────┘
//! ```
//!
//! 每条记录只读取已知字段，随后按 body_len 跳到下一条记录边界：
//! 新版本追加的尾部字段被当作填充忽略；未知 kind 整条跳过。
//! 记录体短于必需字段、或下标引用不可解析，均为 `SchemaCorrupt`。

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::common::{ModelConfig, ModelError, Result, TableIdx};
use crate::container::Container;
use crate::encoding::min_bit_width;
use crate::field_type::{DataType, Encoding, EncodingKind};
use crate::meta::{
    CalculatedColumnDef, Cardinality, Catalog, ColumnDef, CrossFilter, MeasureDef,
    ModelInfo, ParameterDef, PartitionDef, PartitionMode, PartitionSource,
    RelationshipDef, SegmentDef, TableDef,
};
use crate::reader::{ByteReader, ReadError};

pub const CATALOG_MAGIC:   &[u8; 8] = b"VPQCATLG";
/// 本实现完整理解的最高格式版本
pub const CATALOG_VERSION: u16      = 1;

// ── 记录类型 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Model,
    Table,
    Column,
    Partition,
    Segment,
    Relationship,
    Measure,
    CalculatedColumn,
    Parameter,
}

impl RecordKind {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Model),
            2 => Some(Self::Table),
            3 => Some(Self::Column),
            4 => Some(Self::Partition),
            5 => Some(Self::Segment),
            6 => Some(Self::Relationship),
            7 => Some(Self::Measure),
            8 => Some(Self::CalculatedColumn),
            9 => Some(Self::Parameter),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Model            => 1,
            Self::Table            => 2,
            Self::Column           => 3,
            Self::Partition        => 4,
            Self::Segment          => 5,
            Self::Relationship     => 6,
            Self::Measure          => 7,
            Self::CalculatedColumn => 8,
            Self::Parameter        => 9,
        }
    }
}

// ── 版本化记录读取器 ───────────────────────────────────────────────────────────

/// 一条记录：kind 码 + 限定在记录体内的游标
pub struct Record<'a> {
    pub kind:  u16,
    pub index: u32,
    pub body:  ByteReader<'a>,
}

/// 逐条产出记录；记录体长度越过流末尾即为损坏
pub struct RecordReader<'a> {
    reader:    ByteReader<'a>,
    version:   u16,
    remaining: u32,
    next:      u32,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let magic = reader.take(8).map_err(|e| corrupt(format!("catalog header: {e}")))?;
        if magic != CATALOG_MAGIC {
            return Err(corrupt("catalog stream has bad magic".into()));
        }
        let version   = reader.read_u16().map_err(|e| corrupt(format!("catalog header: {e}")))?;
        let remaining = reader.read_u32().map_err(|e| corrupt(format!("catalog header: {e}")))?;
        Ok(Self { reader, version, remaining, next: 0 })
    }

    pub fn version(&self) -> u16 { self.version }

    pub fn next_record(&mut self) -> Result<Option<Record<'a>>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let index = self.next;
        let kind = self.reader.read_u16()
            .map_err(|e| corrupt(format!("record {index} header: {e}")))?;
        let len  = self.reader.read_u32()
            .map_err(|e| corrupt(format!("record {index} header: {e}")))?;
        let body = self.reader.take(len as usize)
            .map_err(|e| corrupt(format!("record {index} (kind {kind}) body: {e}")))?;
        self.remaining -= 1;
        self.next      += 1;
        Ok(Some(Record { kind, index, body: ByteReader::new(body) }))
    }

    /// 所有记录读完后剩余的字节数
    pub fn trailing(&self) -> usize { self.reader.remaining() }
}

fn corrupt(reason: String) -> ModelError {
    ModelError::SchemaCorrupt(reason)
}

// ── 原始记录 ──────────────────────────────────────────────────────────────────
//
// 第一遍只做字段解码；交叉引用在第二遍统一校验。

struct RawModel {
    name: String, culture: String, compatibility_level: u32, modified: i64,
}

struct RawTable {
    name: String, row_count: u64, flags: u8, modified: i64, description: String,
}

struct RawColumn {
    table: u32, name: String, data_type: u8, encoding: u8, bit_width: u8, flags: u8,
    cardinality: u32, scale_factor: u32,
    dictionary: String, dictionary_size: u64,
    hash_index: String, hash_index_size: u64,
    description: String, format_string: String,
}

struct RawPartition {
    table: u32, name: String, mode: u8, source: u8, query: String, refreshed: i64,
}

struct RawSegment {
    partition: u32, column: u32, ordinal: u32, row_count: u64, min_value: i64,
    stream: String, stream_size: u64,
}

struct RawRelationship {
    name: String, from_column: u32, to_column: u32,
    from_cardinality: u8, to_cardinality: u8, cross_filter: u8, flags: u8,
}

struct RawMeasure {
    table: u32, name: String, expression: String,
    display_folder: String, description: String, format_string: String,
}

struct RawParameter {
    name: String, description: String, expression: String, modified: i64,
}

#[derive(Default)]
struct RawCatalog {
    model:         Vec<RawModel>,
    tables:        Vec<RawTable>,
    columns:       Vec<RawColumn>,
    partitions:    Vec<RawPartition>,
    segments:      Vec<RawSegment>,
    relationships: Vec<RawRelationship>,
    measures:      Vec<RawMeasure>,
    calc_columns:  Vec<(u32, String)>,
    parameters:    Vec<RawParameter>,
}

type Field<T> = std::result::Result<T, ReadError>;

fn owned_opt(r: &mut ByteReader<'_>) -> Field<String> {
    Ok(r.read_opt_str()?.unwrap_or_default().to_string())
}

fn owned(r: &mut ByteReader<'_>) -> Field<String> {
    Ok(r.read_str()?.to_string())
}

impl RawCatalog {
    fn push(&mut self, kind: RecordKind, r: &mut ByteReader<'_>) -> Field<()> {
        match kind {
            RecordKind::Model => self.model.push(RawModel {
                name:                owned(r)?,
                culture:             owned(r)?,
                compatibility_level: r.read_u32()?,
                modified:            r.read_i64()?,
            }),
            RecordKind::Table => self.tables.push(RawTable {
                name:        owned(r)?,
                row_count:   r.read_u64()?,
                flags:       r.read_u8()?,
                modified:    r.read_i64()?,
                description: owned_opt(r)?,
            }),
            RecordKind::Column => self.columns.push(RawColumn {
                table:           r.read_u32()?,
                name:            owned(r)?,
                data_type:       r.read_u8()?,
                encoding:        r.read_u8()?,
                bit_width:       r.read_u8()?,
                flags:           r.read_u8()?,
                cardinality:     r.read_u32()?,
                scale_factor:    r.read_u32()?,
                dictionary:      owned(r)?,
                dictionary_size: r.read_u64()?,
                hash_index:      owned(r)?,
                hash_index_size: r.read_u64()?,
                description:     owned_opt(r)?,
                format_string:   owned_opt(r)?,
            }),
            RecordKind::Partition => self.partitions.push(RawPartition {
                table:     r.read_u32()?,
                name:      owned(r)?,
                mode:      r.read_u8()?,
                source:    r.read_u8()?,
                query:     owned(r)?,
                refreshed: r.read_i64()?,
            }),
            RecordKind::Segment => self.segments.push(RawSegment {
                partition:   r.read_u32()?,
                column:      r.read_u32()?,
                ordinal:     r.read_u32()?,
                row_count:   r.read_u64()?,
                min_value:   r.read_i64()?,
                stream:      owned(r)?,
                stream_size: r.read_u64()?,
            }),
            RecordKind::Relationship => self.relationships.push(RawRelationship {
                name:             owned(r)?,
                from_column:      r.read_u32()?,
                to_column:        r.read_u32()?,
                from_cardinality: r.read_u8()?,
                to_cardinality:   r.read_u8()?,
                cross_filter:     r.read_u8()?,
                flags:            r.read_u8()?,
            }),
            RecordKind::Measure => self.measures.push(RawMeasure {
                table:          r.read_u32()?,
                name:           owned(r)?,
                expression:     owned(r)?,
                display_folder: owned_opt(r)?,
                description:    owned_opt(r)?,
                format_string:  owned_opt(r)?,
            }),
            RecordKind::CalculatedColumn => {
                let column = r.read_u32()?;
                self.calc_columns.push((column, owned(r)?));
            }
            RecordKind::Parameter => self.parameters.push(RawParameter {
                name:        owned(r)?,
                description: owned(r)?,
                expression:  owned(r)?,
                modified:    r.read_i64()?,
            }),
        }
        Ok(())
    }
}

// ── 解析入口 ──────────────────────────────────────────────────────────────────

pub fn parse(container: &Container, config: &ModelConfig) -> Result<Catalog> {
    let data = container.read_stream(&config.catalog_stream).map_err(|e| match e {
        ModelError::NotFound(_) => ModelError::MissingStream(config.catalog_stream.clone()),
        other                   => other,
    })?;
    parse_bytes(data, config)
}

pub fn parse_bytes(data: &[u8], config: &ModelConfig) -> Result<Catalog> {
    let mut records = RecordReader::new(data)?;
    if records.version() > CATALOG_VERSION {
        log::warn!(
            "catalog version {} is newer than supported {CATALOG_VERSION}; unknown fields are skipped",
            records.version()
        );
    }

    let mut raw = RawCatalog::default();
    while let Some(mut rec) = records.next_record()? {
        let Some(kind) = RecordKind::from_code(rec.kind) else {
            log::debug!("skipping unknown catalog record kind {} (#{})", rec.kind, rec.index);
            continue;
        };
        raw.push(kind, &mut rec.body).map_err(|e| {
            corrupt(format!("record {} ({kind:?}) truncated: {e}", rec.index))
        })?;
        if !rec.body.is_empty() {
            log::debug!("record {} ({kind:?}): {} unread trailing bytes", rec.index, rec.body.remaining());
        }
    }
    if records.trailing() > 0 {
        log::debug!("{} bytes after last catalog record ignored", records.trailing());
    }

    Resolver { config, version: records.version() }.resolve(raw)
}

// ── 第二遍：校验并构建 Catalog ─────────────────────────────────────────────────

struct Resolver<'c> {
    config:  &'c ModelConfig,
    version: u16,
}

fn index<T>(items: &[T], idx: u32, what: &str, owner: &str) -> Result<usize> {
    let i = idx as usize;
    if i < items.len() {
        Ok(i)
    } else {
        Err(corrupt(format!("{owner} references {what} {idx}, only {} exist", items.len())))
    }
}

impl Resolver<'_> {
    fn time(&self, ticks: i64, what: &str) -> Result<NaiveDateTime> {
        self.config.ticks_to_datetime(ticks)
            .ok_or_else(|| corrupt(format!("{what}: tick value {ticks} is not a valid date-time")))
    }

    fn resolve(self, raw: RawCatalog) -> Result<Catalog> {
        // ── 模型 ──────────────────────────────────────────────────────────────
        if raw.model.len() > 1 {
            return Err(corrupt(format!("{} MODEL records, expected at most one", raw.model.len())));
        }
        let info = match raw.model.into_iter().next() {
            Some(m) => ModelInfo {
                modified_time:       Some(self.time(m.modified, "model modified time")?),
                name:                m.name,
                culture:             m.culture,
                compatibility_level: m.compatibility_level,
                catalog_version:     self.version,
            },
            None => ModelInfo {
                name: String::new(), culture: String::new(), compatibility_level: 0,
                modified_time: None, catalog_version: self.version,
            },
        };

        // ── 表 ────────────────────────────────────────────────────────────────
        let mut table_index: HashMap<String, TableIdx> = HashMap::new();
        let mut tables = Vec::with_capacity(raw.tables.len());
        for (i, t) in raw.tables.into_iter().enumerate() {
            if table_index.insert(t.name.clone(), i).is_some() {
                return Err(corrupt(format!("duplicate table name {:?}", t.name)));
            }
            tables.push(TableDef {
                modified_time: self.time(t.modified, &format!("table {:?}", t.name))?,
                name:          t.name,
                row_count:     t.row_count,
                is_hidden:     t.flags & 1 != 0,
                description:   t.description,
                columns:       Vec::new(),
                partitions:    Vec::new(),
            });
        }

        // ── 列 ────────────────────────────────────────────────────────────────
        let mut seen_columns: HashSet<(usize, String)> = HashSet::new();
        let mut columns = Vec::with_capacity(raw.columns.len());
        for (i, c) in raw.columns.into_iter().enumerate() {
            let owner = format!("column {i} ({:?})", c.name);
            let table = index(&tables, c.table, "table", &owner)?;
            if !seen_columns.insert((table, c.name.clone())) {
                return Err(corrupt(format!(
                    "duplicate column {:?} in table {:?}", c.name, tables[table].name
                )));
            }
            let qualified = format!("{}[{}]", tables[table].name, c.name);
            let data_type = DataType::from_code(c.data_type)
                .ok_or_else(|| corrupt(format!("{qualified}: unknown data type {}", c.data_type)))?;
            let encoding = Encoding {
                kind:         EncodingKind::from_code(c.encoding),
                bit_width:    c.bit_width,
                cardinality:  c.cardinality,
                scale_factor: c.scale_factor,
            };
            let dictionary = Some(c.dictionary).filter(|s| !s.is_empty());
            let hash_index = Some(c.hash_index).filter(|s| !s.is_empty());
            validate_encoding(&qualified, data_type, &encoding, dictionary.is_some(), hash_index.is_some())?;

            tables[table].columns.push(i);
            columns.push(ColumnDef {
                table,
                name:            c.name,
                data_type,
                encoding,
                is_hidden:       c.flags & 1 != 0,
                dictionary,
                dictionary_size: c.dictionary_size,
                hash_index,
                hash_index_size: c.hash_index_size,
                description:     c.description,
                format_string:   c.format_string,
                segments:        Vec::new(),
                is_calculated:   false,
            });
        }

        // ── 分区 ──────────────────────────────────────────────────────────────
        let mut partitions = Vec::with_capacity(raw.partitions.len());
        for (i, p) in raw.partitions.into_iter().enumerate() {
            let owner = format!("partition {i} ({:?})", p.name);
            let table = index(&tables, p.table, "table", &owner)?;
            tables[table].partitions.push(i);
            partitions.push(PartitionDef {
                table,
                refreshed_time: self.time(p.refreshed, &owner)?,
                name:           p.name,
                mode:           PartitionMode::from_code(p.mode),
                source:         PartitionSource::from_code(p.source),
                query:          p.query,
            });
        }

        // ── 段 ────────────────────────────────────────────────────────────────
        let mut seen_segments: HashSet<(usize, usize, u32)> = HashSet::new();
        let mut segments = Vec::with_capacity(raw.segments.len());
        for (i, s) in raw.segments.into_iter().enumerate() {
            let owner     = format!("segment {i} ({:?})", s.stream);
            let partition = index(&partitions, s.partition, "partition", &owner)?;
            let column    = index(&columns, s.column, "column", &owner)?;
            if partitions[partition].table != columns[column].table {
                return Err(corrupt(format!(
                    "{owner}: partition {partition} and column {column} belong to different tables"
                )));
            }
            if !seen_segments.insert((partition, column, s.ordinal)) {
                return Err(corrupt(format!(
                    "{owner}: duplicate ordinal {} for partition {partition}, column {column}", s.ordinal
                )));
            }
            columns[column].segments.push(i);
            segments.push(SegmentDef {
                partition,
                column,
                ordinal:     s.ordinal,
                row_count:   s.row_count,
                min_value:   s.min_value,
                stream:      s.stream,
                stream_size: s.stream_size,
            });
        }
        // 段按 (分区在表内的位置, 段序号) 排序
        for col in &mut columns {
            let order = &tables[col.table].partitions;
            col.segments.sort_by_key(|&s| {
                let seg = &segments[s];
                let pos = order.iter().position(|&p| p == seg.partition).unwrap_or(usize::MAX);
                (pos, seg.ordinal)
            });
        }

        // ── 关系 ──────────────────────────────────────────────────────────────
        let mut relationships = Vec::with_capacity(raw.relationships.len());
        for (i, r) in raw.relationships.into_iter().enumerate() {
            let owner = format!("relationship {i} ({:?})", r.name);
            let cardinality = |code: u8| Cardinality::from_code(code)
                .ok_or_else(|| corrupt(format!("{owner}: unknown cardinality {code}")));
            relationships.push(RelationshipDef {
                from_column:      index(&columns, r.from_column, "column", &owner)?,
                to_column:        index(&columns, r.to_column, "column", &owner)?,
                from_cardinality: cardinality(r.from_cardinality)?,
                to_cardinality:   cardinality(r.to_cardinality)?,
                cross_filter:     CrossFilter::from_code(r.cross_filter)
                    .ok_or_else(|| corrupt(format!("{owner}: unknown cross filter {}", r.cross_filter)))?,
                is_active:        r.flags & 1 != 0,
                name:             r.name,
            });
        }

        // ── 度量值 / 计算列 / 参数 ─────────────────────────────────────────────
        let mut measures = Vec::with_capacity(raw.measures.len());
        for (i, m) in raw.measures.into_iter().enumerate() {
            let table = index(&tables, m.table, "table", &format!("measure {i} ({:?})", m.name))?;
            measures.push(MeasureDef {
                table,
                name:           m.name,
                expression:     m.expression,
                display_folder: m.display_folder,
                description:    m.description,
                format_string:  m.format_string,
            });
        }

        let mut calculated_columns = Vec::with_capacity(raw.calc_columns.len());
        for (i, (column, expression)) in raw.calc_columns.into_iter().enumerate() {
            let column = index(&columns, column, "column", &format!("calculated column {i}"))?;
            if columns[column].is_calculated {
                return Err(corrupt(format!(
                    "calculated column {i}: column {column} already has an expression"
                )));
            }
            columns[column].is_calculated = true;
            calculated_columns.push(CalculatedColumnDef { column, expression });
        }

        let mut parameters = Vec::with_capacity(raw.parameters.len());
        for p in raw.parameters {
            parameters.push(ParameterDef {
                modified_time: self.time(p.modified, &format!("parameter {:?}", p.name))?,
                name:          p.name,
                description:   p.description,
                expression:    p.expression,
            });
        }

        Ok(Catalog {
            info, tables, columns, partitions, segments,
            relationships, measures, calculated_columns, parameters,
            table_index,
        })
    }
}

/// 编码描述符的结构性约束（只检查已识别的编码）
fn validate_encoding(
    column:         &str,
    data_type:      DataType,
    encoding:       &Encoding,
    has_dictionary: bool,
    has_hash_index: bool,
) -> Result<()> {
    let width = encoding.bit_width;
    match encoding.kind {
        EncodingKind::Dictionary => {
            let need = min_bit_width(encoding.cardinality as u64);
            if width != need {
                return Err(corrupt(format!(
                    "{column}: bit width {width} for cardinality {} (expected {need})", encoding.cardinality
                )));
            }
        }
        EncodingKind::Direct | EncodingKind::Hash if !(1..=64).contains(&width) => {
            return Err(corrupt(format!("{column}: bit width {width} outside 1..=64")));
        }
        _ => {}
    }
    if matches!(encoding.kind, EncodingKind::Dictionary | EncodingKind::Hash) && !has_dictionary {
        return Err(corrupt(format!("{column}: {} encoding without a dictionary stream", encoding.kind)));
    }
    if encoding.kind == EncodingKind::Hash && !has_hash_index {
        return Err(corrupt(format!("{column}: hash encoding without a hash index stream")));
    }
    if data_type == DataType::Decimal && !is_power_of_ten(encoding.scale_factor) {
        return Err(corrupt(format!(
            "{column}: decimal scale factor {} is not a power of ten", encoding.scale_factor
        )));
    }
    Ok(())
}

fn is_power_of_ten(mut n: u32) -> bool {
    if n == 0 { return false; }
    while n % 10 == 0 { n /= 10; }
    n == 1
}
