//! 列解码器
//!
//! 给定一列的 catalog 定义，定位字典 / 哈希索引 / 段流，按编码方式
//! 还原出每行的类型化值：
//!
//! ```text
//!   segments (分区顺序)          ┌────────────┐
//!   ──────────────────► codes ─►│ 值解析      │─► raw Value ─► 逻辑类型转换 ─► Vec<Value>
//!     unpack_bits / expand_runs  │  Dictionary │
//!                                │  Direct     │
//!                                │  Hash       │
//!                                └────────────┘
//! ```
//!
//! 解码是 (字典字节, 段字节, 描述符) 的纯函数，不修改任何共享状态。

use crate::common::{ColumnIdx, ModelConfig, ModelError, Result};
use crate::container::Container;
use crate::dictionary::{Dictionary, HashIndex};
use crate::field_type::{EncodingKind, Value};
use crate::meta::{Catalog, ColumnDef};
use crate::segment::{SegmentLayout, SegmentReader};

/// 每行码值的解释方式
enum Resolver {
    Dictionary(Dictionary),
    Direct,
    Hash(HashIndex, Dictionary),
}

pub fn decode_column(
    container: &Container,
    catalog:   &Catalog,
    column:    ColumnIdx,
    config:    &ModelConfig,
) -> Result<Vec<Value>> {
    let col       = catalog.columns.get(column)
        .ok_or_else(|| ModelError::NotFound(format!("column #{column}")))?;
    let qualified = catalog.qualified_name(column);
    let expected  = catalog.tables[col.table].row_count;

    // 1. 行数不变式：先于任何流读取
    let declared = col.segments.iter()
        .try_fold(0u64, |acc, &s| acc.checked_add(catalog.segments[s].row_count))
        .unwrap_or(u64::MAX);
    if declared != expected {
        return Err(ModelError::RowCountMismatch {
            column: qualified, expected, actual: declared,
        });
    }

    // 2. 按编码方式选择段布局与值解析器；未识别的编码只在这里拒绝
    let packed = SegmentLayout::BitPacked(col.encoding.bit_width);
    let (layout, resolver) = match col.encoding.kind {
        EncodingKind::Dictionary => (packed, Resolver::Dictionary(load_dictionary(container, col)?)),
        EncodingKind::Direct     => (packed, Resolver::Direct),
        EncodingKind::RunLength  => (SegmentLayout::RunLength, match col.dictionary {
            Some(_) => Resolver::Dictionary(load_dictionary(container, col)?),
            None    => Resolver::Direct,
        }),
        EncodingKind::Hash       => (packed, Resolver::Hash(
            load_hash_index(container, col)?,
            load_dictionary(container, col)?,
        )),
        EncodingKind::Unsupported(code) => {
            return Err(ModelError::UnsupportedEncoding { column: qualified, code });
        }
    };

    // 3. 段按分区顺序拼接
    let mut out = Vec::with_capacity(expected.min(1 << 24) as usize);
    for &s in &col.segments {
        let seg   = SegmentReader::open(container, &catalog.segments[s])?;
        let codes = seg.read_codes(layout)?;
        for code in codes {
            let raw = match &resolver {
                Resolver::Dictionary(dict) => dict.resolve(code, &qualified)?,
                Resolver::Direct           => Value::Integer(seg.direct_value(code)?),
                Resolver::Hash(hidx, dict) => dict.resolve(hidx.lookup(code, &qualified)?, &qualified)?,
            };
            // 4. 逻辑类型转换
            out.push(raw.into_logical(col.data_type, &col.encoding, config, &qualified)?);
        }
    }

    // 5. 输出长度校验
    if out.len() as u64 != expected {
        return Err(ModelError::RowCountMismatch {
            column: qualified, expected, actual: out.len() as u64,
        });
    }
    log::debug!("decoded {qualified}: {} rows, {} segments, {}", out.len(), col.segments.len(), col.encoding.kind);
    Ok(out)
}

fn load_dictionary(container: &Container, col: &ColumnDef) -> Result<Dictionary> {
    let stream = col.dictionary.as_deref()
        .ok_or_else(|| ModelError::NotFound(format!("dictionary for column {}", col.name)))?;
    let dict = Dictionary::parse(container.read_stream(stream)?, stream)?;
    if dict.len() as u64 != col.encoding.cardinality as u64 {
        return Err(ModelError::DictionaryCorrupt {
            stream: stream.into(),
            reason: format!(
                "{} entries, catalog declares cardinality {}", dict.len(), col.encoding.cardinality
            ),
        });
    }
    Ok(dict)
}

fn load_hash_index(container: &Container, col: &ColumnDef) -> Result<HashIndex> {
    let stream = col.hash_index.as_deref()
        .ok_or_else(|| ModelError::NotFound(format!("hash index for column {}", col.name)))?;
    HashIndex::parse(container.read_stream(stream)?, stream)
}
