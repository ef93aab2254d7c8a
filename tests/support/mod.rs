//! 测试夹具：在内存中合成完整的报表容器
//! （zip → DataModel 信封 → LZ4 镜像 → 虚拟文件表 → catalog / 字典 / 段）

#![allow(dead_code)]

use std::io::{Cursor, Write};

use chrono::NaiveDate;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CATALOG_STREAM: &str = "metadata.catalog";

pub mod kind {
    pub const MODEL:        u16 = 1;
    pub const TABLE:        u16 = 2;
    pub const COLUMN:       u16 = 3;
    pub const PARTITION:    u16 = 4;
    pub const SEGMENT:      u16 = 5;
    pub const RELATIONSHIP: u16 = 6;
    pub const MEASURE:      u16 = 7;
    pub const CALC_COLUMN:  u16 = 8;
    pub const PARAMETER:    u16 = 9;
}

pub mod dt {
    pub const STRING:   u8 = 2;
    pub const INT64:    u8 = 6;
    pub const DOUBLE:   u8 = 8;
    pub const DATETIME: u8 = 9;
    pub const DECIMAL:  u8 = 10;
    pub const BOOLEAN:  u8 = 11;
    pub const VARIANT:  u8 = 20;
}

pub mod enc {
    pub const DICTIONARY: u8 = 1;
    pub const DIRECT:     u8 = 2;
    pub const RUN_LENGTH: u8 = 3;
    pub const HASH:       u8 = 4;
}

pub mod source {
    pub const NONE:       u8 = 0;
    pub const QUERY:      u8 = 1;
    pub const CALCULATED: u8 = 2;
}

pub const TICKS_PER_DAY: i64 = 86_400 * 10_000_000;

/// 自 1601-01-01 起的 tick 数
pub fn ticks(y: i32, m: u32, d: u32) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1601, 1, 1).unwrap();
    let date  = NaiveDate::from_ymd_opt(y, m, d).unwrap();
    (date - epoch).num_days() * TICKS_PER_DAY
}

// ── 流编码 ────────────────────────────────────────────────────────────────────

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// 定宽位压缩：每字 64/width 个值，低位在前，不跨字
pub fn pack_bits(values: &[u64], width: u8) -> Vec<u8> {
    let per_word = 64 / width as usize;
    let mut out = Vec::new();
    for chunk in values.chunks(per_word) {
        let mut word = 0u64;
        for (i, v) in chunk.iter().enumerate() {
            word |= v << (i * width as usize);
        }
        out.extend_from_slice(&word.to_le_bytes());
    }
    out
}

pub fn runs(pairs: &[(u32, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (value, run) in pairs {
        out.extend_from_slice(&value.to_le_bytes());
        out.extend_from_slice(&run.to_le_bytes());
    }
    out
}

pub fn text_dictionary(items: &[Option<&str>]) -> Vec<u8> {
    let mut out = b"VPQD".to_vec();
    out.push(2);
    out.extend_from_slice(&(items.len() as u32).to_le_bytes());
    for item in items {
        match item {
            Some(s) => put_str(&mut out, s),
            None    => out.extend_from_slice(&u32::MAX.to_le_bytes()),
        }
    }
    out
}

pub fn int_dictionary(items: &[i64]) -> Vec<u8> {
    let mut out = b"VPQD".to_vec();
    out.push(0);
    out.extend_from_slice(&(items.len() as u32).to_le_bytes());
    for v in items {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn real_dictionary(items: &[f64]) -> Vec<u8> {
    let mut out = b"VPQD".to_vec();
    out.push(1);
    out.extend_from_slice(&(items.len() as u32).to_le_bytes());
    for v in items {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn hash_index(entries: &[(u64, u32)]) -> Vec<u8> {
    let mut out = b"VPQH".to_vec();
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (key, idx) in entries {
        out.extend_from_slice(&key.to_le_bytes());
        out.extend_from_slice(&idx.to_le_bytes());
    }
    out
}

// ── 列规格 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ColumnFixture {
    pub name:         String,
    pub data_type:    u8,
    pub encoding:     u8,
    pub bit_width:    u8,
    pub cardinality:  u32,
    pub scale_factor: u32,
    pub hidden:       bool,
    pub dictionary:   Option<Vec<u8>>,
    pub hash_index:   Option<Vec<u8>>,
}

impl ColumnFixture {
    pub fn new(name: &str, data_type: u8, encoding: u8, bit_width: u8) -> Self {
        Self {
            name: name.into(), data_type, encoding, bit_width,
            cardinality: 0, scale_factor: 1, hidden: false,
            dictionary: None, hash_index: None,
        }
    }
    pub fn dictionary(mut self, bytes: Vec<u8>, cardinality: u32) -> Self {
        self.dictionary = Some(bytes); self.cardinality = cardinality; self
    }
    pub fn hash_index(mut self, bytes: Vec<u8>) -> Self {
        self.hash_index = Some(bytes); self
    }
    pub fn scale(mut self, factor: u32) -> Self {
        self.scale_factor = factor; self
    }
    pub fn hidden(mut self) -> Self {
        self.hidden = true; self
    }
}

// ── ModelBuilder ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct ModelBuilder {
    streams:    Vec<(String, Vec<u8>)>,
    records:    Vec<(u16, Vec<u8>)>,
    tables:     Vec<String>,
    columns:    Vec<(u32, String)>,
    partitions: Vec<u32>,
}

impl ModelBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn set_stream(&mut self, name: &str, bytes: Vec<u8>) {
        match self.streams.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = bytes,
            None       => self.streams.push((name.into(), bytes)),
        }
    }

    pub fn remove_stream(&mut self, name: &str) {
        self.streams.retain(|(n, _)| n != name);
    }

    pub fn raw_record(&mut self, kind: u16, body: Vec<u8>) {
        self.records.push((kind, body));
    }

    pub fn model(&mut self, name: &str, culture: &str, level: u32, modified: i64) {
        let mut b = Vec::new();
        put_str(&mut b, name);
        put_str(&mut b, culture);
        b.extend_from_slice(&level.to_le_bytes());
        b.extend_from_slice(&modified.to_le_bytes());
        self.raw_record(kind::MODEL, b);
    }

    pub fn table(&mut self, name: &str, rows: u64) -> u32 {
        let mut b = Vec::new();
        put_str(&mut b, name);
        b.extend_from_slice(&rows.to_le_bytes());
        b.push(0);
        b.extend_from_slice(&ticks(2020, 1, 15).to_le_bytes());
        put_str(&mut b, "");
        self.raw_record(kind::TABLE, b);
        self.tables.push(name.into());
        (self.tables.len() - 1) as u32
    }

    pub fn column(&mut self, table: u32, col: ColumnFixture) -> u32 {
        let table_name = self.tables[table as usize].clone();
        let base       = format!("{table_name}/{}", col.name);

        let (dict_path, dict_size) = match &col.dictionary {
            Some(bytes) => {
                let path = format!("{base}.dictionary");
                self.set_stream(&path, bytes.clone());
                (path, bytes.len() as u64)
            }
            None => (String::new(), 0),
        };
        let (hidx_path, hidx_size) = match &col.hash_index {
            Some(bytes) => {
                let path = format!("{base}.hidx");
                self.set_stream(&path, bytes.clone());
                (path, bytes.len() as u64)
            }
            None => (String::new(), 0),
        };

        let mut b = Vec::new();
        b.extend_from_slice(&table.to_le_bytes());
        put_str(&mut b, &col.name);
        b.push(col.data_type);
        b.push(col.encoding);
        b.push(col.bit_width);
        b.push(col.hidden as u8);
        b.extend_from_slice(&col.cardinality.to_le_bytes());
        b.extend_from_slice(&col.scale_factor.to_le_bytes());
        put_str(&mut b, &dict_path);
        b.extend_from_slice(&dict_size.to_le_bytes());
        put_str(&mut b, &hidx_path);
        b.extend_from_slice(&hidx_size.to_le_bytes());
        put_str(&mut b, "");
        put_str(&mut b, "");
        self.raw_record(kind::COLUMN, b);

        self.columns.push((table, col.name));
        (self.columns.len() - 1) as u32
    }

    pub fn partition(&mut self, table: u32, name: &str, source: u8, query: &str) -> u32 {
        let mut b = Vec::new();
        b.extend_from_slice(&table.to_le_bytes());
        put_str(&mut b, name);
        b.push(0);
        b.push(source);
        put_str(&mut b, query);
        b.extend_from_slice(&ticks(2020, 1, 15).to_le_bytes());
        self.raw_record(kind::PARTITION, b);
        self.partitions.push(table);
        (self.partitions.len() - 1) as u32
    }

    /// 写入段流与 SEGMENT 记录，返回流名
    pub fn segment(
        &mut self,
        partition: u32,
        column:    u32,
        ordinal:   u32,
        rows:      u64,
        min_value: i64,
        bytes:     Vec<u8>,
    ) -> String {
        let (table, col_name) = self.columns[column as usize].clone();
        let path = format!("{}/{col_name}.{partition}.{ordinal}.idf", self.tables[table as usize]);
        self.segment_record(partition, column, ordinal, rows, min_value, &path, bytes.len() as u64);
        self.set_stream(&path, bytes);
        path
    }

    pub fn segment_record(
        &mut self,
        partition:   u32,
        column:      u32,
        ordinal:     u32,
        rows:        u64,
        min_value:   i64,
        stream:      &str,
        stream_size: u64,
    ) {
        let mut b = Vec::new();
        b.extend_from_slice(&partition.to_le_bytes());
        b.extend_from_slice(&column.to_le_bytes());
        b.extend_from_slice(&ordinal.to_le_bytes());
        b.extend_from_slice(&rows.to_le_bytes());
        b.extend_from_slice(&min_value.to_le_bytes());
        put_str(&mut b, stream);
        b.extend_from_slice(&stream_size.to_le_bytes());
        self.raw_record(kind::SEGMENT, b);
    }

    pub fn relationship(&mut self, name: &str, from: u32, to: u32, active: bool) {
        let mut b = Vec::new();
        put_str(&mut b, name);
        b.extend_from_slice(&from.to_le_bytes());
        b.extend_from_slice(&to.to_le_bytes());
        b.push(2); // Many
        b.push(1); // One
        b.push(1); // OneDirection
        b.push(active as u8);
        self.raw_record(kind::RELATIONSHIP, b);
    }

    pub fn measure(&mut self, table: u32, name: &str, expression: &str, format: &str) {
        let mut b = Vec::new();
        b.extend_from_slice(&table.to_le_bytes());
        put_str(&mut b, name);
        put_str(&mut b, expression);
        put_str(&mut b, "Sales KPIs");
        put_str(&mut b, "");
        put_str(&mut b, format);
        self.raw_record(kind::MEASURE, b);
    }

    pub fn calculated_column(&mut self, column: u32, expression: &str) {
        let mut b = Vec::new();
        b.extend_from_slice(&column.to_le_bytes());
        put_str(&mut b, expression);
        self.raw_record(kind::CALC_COLUMN, b);
    }

    pub fn parameter(&mut self, name: &str, expression: &str, modified: i64) {
        let mut b = Vec::new();
        put_str(&mut b, name);
        put_str(&mut b, "");
        put_str(&mut b, expression);
        b.extend_from_slice(&modified.to_le_bytes());
        self.raw_record(kind::PARAMETER, b);
    }

    // ── 组装 ──────────────────────────────────────────────────────────────────

    pub fn catalog_bytes(&self) -> Vec<u8> {
        let mut out = b"VPQCATLG".to_vec();
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        for (kind, body) in &self.records {
            out.extend_from_slice(&kind.to_le_bytes());
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(body);
        }
        out
    }

    pub fn image(&self) -> Vec<u8> {
        let mut streams = self.streams.clone();
        if !streams.iter().any(|(n, _)| n == CATALOG_STREAM) {
            streams.push((CATALOG_STREAM.into(), self.catalog_bytes()));
        }
        image_from(&streams)
    }

    pub fn envelope(&self) -> Vec<u8> {
        envelope_lz4(&self.image())
    }

    pub fn build(&self) -> Vec<u8> {
        zip_with(&[("Version", b"1.28".to_vec()), ("DataModel", self.envelope())])
    }
}

pub fn image_from(streams: &[(String, Vec<u8>)]) -> Vec<u8> {
    let header_len: usize = 12 + streams.iter().map(|(n, _)| 2 + n.len() + 16).sum::<usize>();
    let mut out = b"VPQFILES".to_vec();
    out.extend_from_slice(&(streams.len() as u32).to_le_bytes());
    let mut offset = header_len as u64;
    for (name, bytes) in streams {
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        offset += bytes.len() as u64;
    }
    for (_, bytes) in streams {
        out.extend_from_slice(bytes);
    }
    out
}

pub fn envelope_with(codec: u8, payload: &[u8], declared_len: u64, crc: u32) -> Vec<u8> {
    let mut out = b"VPQIMAGE".to_vec();
    out.extend_from_slice(&1u16.to_le_bytes());
    out.push(codec);
    out.push(0);
    out.extend_from_slice(&declared_len.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn envelope_lz4(image: &[u8]) -> Vec<u8> {
    let payload = lz4::block::compress(image, None, false).unwrap();
    envelope_with(1, &payload, image.len() as u64, crc32fast::hash(image))
}

pub fn zip_with(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

// ── 标准样例模型 ───────────────────────────────────────────────────────────────
//
// Age   (5 行, 1 分区)：AgeBucket String/Dictionary, AgeKey Int64/Direct
// Sales (6 行, 2 分区 4+2)：
//   OrderDate DateTime/Direct, Amount Decimal/RunLength(无字典),
//   AgeKey Int64/Hash, IsReturn Boolean/Direct, Channel String/RunLength(字典),
//   Discount Double/Dictionary
// Calendar（计算表, 0 行）：Date DateTime/Direct

pub const AGE_BUCKETS: [&str; 5] = ["18-24", "25-34", "18-24", "35-44", "25-34"];
pub const AGE_KEYS:    [i64; 5]  = [1, 2, 1, 3, 2];
pub const SALES_AMOUNTS: [f64; 6] = [12.5, 12.5, 12.5, 3.25, 7.0, 7.0];
pub const SALES_AGE_KEYS: [i64; 6] = [1, 3, 2, 1, 2, 2];
pub const SALES_RETURNS: [bool; 6] = [false, true, false, false, true, false];
pub const SALES_CHANNELS: [&str; 6] = ["Online", "Online", "Store", "Store", "Store", "Store"];
pub const SALES_DISCOUNTS: [f64; 6] = [0.0, 0.15, 0.15, 0.0, 0.0, 0.15];
pub const SALES_DAY_OFFSETS: [i64; 6] = [0, 0, 1, 3, 5, 6];

pub fn sample_builder() -> ModelBuilder {
    let mut b = ModelBuilder::new();
    b.model("Sales & Returns", "en-US", 1550, ticks(2020, 2, 1));
    b.raw_record(42, b"record kind from a future writer".to_vec());

    // ── Age ───────────────────────────────────────────────────────────────────
    let age = b.table("Age", 5);
    let p_age = b.partition(age, "Age-p0", source::QUERY, "let Source = Csv.Document(\"age.csv\") in Source");
    let bucket = b.column(age, ColumnFixture::new("AgeBucket", dt::STRING, enc::DICTIONARY, 2)
        .dictionary(text_dictionary(&[Some("18-24"), Some("25-34"), Some("35-44")]), 3));
    b.segment(p_age, bucket, 0, 5, 0, pack_bits(&[0, 1, 0, 2, 1], 2));
    let age_key = b.column(age, ColumnFixture::new("AgeKey", dt::INT64, enc::DIRECT, 2));
    b.segment(p_age, age_key, 0, 5, 1, pack_bits(&[0, 1, 0, 2, 1], 2));

    // ── Sales ─────────────────────────────────────────────────────────────────
    let sales = b.table("Sales", 6);
    let p0 = b.partition(sales, "Sales-2019", source::QUERY, "let Source = Sql.Database(\"srv\", \"db\") in Source");
    let p1 = b.partition(sales, "Sales-2020", source::QUERY, "let Source = Sql.Database(\"srv\", \"db2\") in Source");

    let base = ticks(2019, 12, 1);
    let order_date = b.column(sales, ColumnFixture::new("OrderDate", dt::DATETIME, enc::DIRECT, 64));
    let day = |d: i64| (d * TICKS_PER_DAY) as u64;
    // 第二个分区以自身最小值为基准
    b.segment(p0, order_date, 0, 4, base, pack_bits(&[day(0), day(0), day(1), day(3)], 64));
    b.segment(p1, order_date, 0, 2, base + 5 * TICKS_PER_DAY, pack_bits(&[day(0), day(1)], 64));

    let amount = b.column(sales, ColumnFixture::new("Amount", dt::DECIMAL, enc::RUN_LENGTH, 0).scale(10_000));
    b.segment(p0, amount, 0, 4, 0, runs(&[(125_000, 3), (32_500, 1)]));
    b.segment(p1, amount, 0, 2, 70_000, runs(&[(0, 2)]));

    let sales_key = b.column(sales, ColumnFixture::new("AgeKey", dt::INT64, enc::HASH, 11)
        .dictionary(int_dictionary(&[1, 2, 3]), 3)
        .hash_index(hash_index(&[(1001, 0), (1002, 1), (1003, 2)])));
    b.segment(p0, sales_key, 0, 4, 0, pack_bits(&[1001, 1003, 1002, 1001], 11));
    b.segment(p1, sales_key, 0, 2, 0, pack_bits(&[1002, 1002], 11));

    let is_return = b.column(sales, ColumnFixture::new("IsReturn", dt::BOOLEAN, enc::DIRECT, 1));
    b.segment(p0, is_return, 0, 4, 0, pack_bits(&[0, 1, 0, 0], 1));
    b.segment(p1, is_return, 0, 2, 0, pack_bits(&[1, 0], 1));

    let channel = b.column(sales, ColumnFixture::new("Channel", dt::STRING, enc::RUN_LENGTH, 0)
        .dictionary(text_dictionary(&[Some("Online"), Some("Store")]), 2));
    // 段按序号拆分：p0 的两个段故意倒序写入 catalog
    b.segment(p0, channel, 1, 2, 0, runs(&[(1, 2)]));
    b.segment(p0, channel, 0, 2, 0, runs(&[(0, 2)]));
    b.segment(p1, channel, 0, 2, 0, runs(&[(1, 2)]));

    let discount = b.column(sales, ColumnFixture::new("Discount", dt::DOUBLE, enc::DICTIONARY, 1)
        .dictionary(real_dictionary(&[0.0, 0.15]), 2));
    b.segment(p0, discount, 0, 4, 0, pack_bits(&[0, 1, 1, 0], 1));
    b.segment(p1, discount, 0, 2, 0, pack_bits(&[0, 1], 1));

    // ── Calendar（计算表）─────────────────────────────────────────────────────
    let calendar = b.table("Calendar", 0);
    b.partition(calendar, "Calendar", source::CALCULATED, "CALENDARAUTO()");
    b.column(calendar, ColumnFixture::new("Date", dt::DATETIME, enc::DIRECT, 64));

    // ── 关系 / 公式 / 参数 ─────────────────────────────────────────────────────
    b.relationship("Sales_Age", sales_key, age_key, true);
    b.measure(sales, "Total Sales", "SUM(Sales[Amount])", "#,0.00");
    b.measure(sales, "Return Rate", "DIVIDE(COUNTROWS(FILTER(Sales, Sales[IsReturn])), COUNTROWS(Sales))", "0.0%");
    b.calculated_column(channel, "IF(Sales[IsOnline], \"Online\", \"Store\")");
    b.parameter("StartDate", "#date(2019, 1, 1) meta [IsParameterQuery=true]", ticks(2020, 1, 10));

    b
}

pub fn sample_container() -> Vec<u8> {
    sample_builder().build()
}
