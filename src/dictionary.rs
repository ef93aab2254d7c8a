//! 列字典与哈希索引
//!
//! 字典流：
//! ```text
//! ┌──────────────────────────────────┐
//! │ MAGIC "VPQD" (4 bytes)           │
//! │ value_kind (u8) 0=Int64 1=Real 2=Text
//! │ count      (u32)                 │
//! │ values     i64 | f64 | (u32 len + UTF-8)，len=0xFFFFFFFF 为 null
//! └──────────────────────────────────┘
//! ```
//! 哈希索引流：`"VPQH"` + count (u32) + [surrogate u64 | index u32] × count

use std::collections::HashMap;

use crate::common::{ModelError, Result};
use crate::field_type::Value;
use crate::reader::{ByteReader, ReadResult};

pub const DICTIONARY_MAGIC: &[u8; 4] = b"VPQD";
pub const HASH_INDEX_MAGIC: &[u8; 4] = b"VPQH";
pub const NULL_STRING_LEN:  u32      = u32::MAX;

/// 字典中的值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryKind {
    Int64,
    Real,
    Text,
}

impl DictionaryKind {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Int64),
            1 => Some(Self::Real),
            2 => Some(Self::Text),
            _ => None,
        }
    }
}

fn corrupt(stream: &str, reason: impl Into<String>) -> ModelError {
    ModelError::DictionaryCorrupt { stream: stream.into(), reason: reason.into() }
}

// ── Dictionary ────────────────────────────────────────────────────────────────

/// 一列的有序 distinct 值，下标 0..N-1
#[derive(Debug, Clone)]
pub struct Dictionary {
    pub kind: DictionaryKind,
    values:   Vec<Value>,
}

impl Dictionary {
    pub fn parse(data: &[u8], stream: &str) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let magic = r.take(4).map_err(|e| corrupt(stream, e.to_string()))?;
        if magic != DICTIONARY_MAGIC {
            return Err(corrupt(stream, "bad magic"));
        }
        let code  = r.read_u8().map_err(|e| corrupt(stream, e.to_string()))?;
        let kind  = DictionaryKind::from_code(code)
            .ok_or_else(|| corrupt(stream, format!("unknown value kind {code}")))?;
        let count = r.read_u32().map_err(|e| corrupt(stream, e.to_string()))? as usize;

        // 每项至少 4 字节：count 超过剩余字节即为损坏，避免巨量预分配
        if count > r.remaining() / 4 {
            return Err(corrupt(stream, format!("{count} entries cannot fit in {} bytes", r.remaining())));
        }

        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            let v = read_entry(&mut r, kind)
                .map_err(|e| corrupt(stream, format!("entry {i}: {e}")))?;
            values.push(v);
        }
        if !r.is_empty() {
            return Err(corrupt(stream, format!("{} trailing bytes after {count} entries", r.remaining())));
        }
        Ok(Self { kind, values })
    }

    pub fn len(&self)      -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool  { self.values.is_empty() }

    pub fn get(&self, index: u64) -> Option<&Value> {
        usize::try_from(index).ok().and_then(|i| self.values.get(i))
    }

    /// 按下标取值；越界即 DictionaryIndexOutOfRange
    pub fn resolve(&self, index: u64, column: &str) -> Result<Value> {
        self.get(index).cloned().ok_or_else(|| ModelError::DictionaryIndexOutOfRange {
            column: column.into(),
            index,
            len:    self.values.len(),
        })
    }

    pub fn values(&self) -> &[Value] { &self.values }
}

fn read_entry(r: &mut ByteReader<'_>, kind: DictionaryKind) -> ReadResult<Value> {
    Ok(match kind {
        DictionaryKind::Int64 => Value::Integer(r.read_i64()?),
        DictionaryKind::Real  => Value::Real(r.read_f64()?),
        DictionaryKind::Text  => match r.read_u32()? {
            NULL_STRING_LEN => Value::Null,
            len             => Value::Text(r.read_utf8(len as usize)?.to_string()),
        },
    })
}

// ── Hash Index ────────────────────────────────────────────────────────────────

/// 代理键 → 字典下标
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    entries: HashMap<u64, u32>,
}

impl HashIndex {
    pub fn parse(data: &[u8], stream: &str) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let magic = r.take(4).map_err(|e| corrupt(stream, e.to_string()))?;
        if magic != HASH_INDEX_MAGIC {
            return Err(corrupt(stream, "bad magic"));
        }
        let count = r.read_u32().map_err(|e| corrupt(stream, e.to_string()))? as usize;
        if r.remaining() != count * 12 {
            return Err(corrupt(stream, format!(
                "{count} entries need {} bytes, {} present", count * 12, r.remaining()
            )));
        }

        let mut entries = HashMap::with_capacity(count);
        for _ in 0..count {
            let key   = r.read_u64().map_err(|e| corrupt(stream, e.to_string()))?;
            let index = r.read_u32().map_err(|e| corrupt(stream, e.to_string()))?;
            if entries.insert(key, index).is_some() {
                return Err(corrupt(stream, format!("duplicate surrogate key {key}")));
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self)      -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool  { self.entries.is_empty() }

    pub fn lookup(&self, key: u64, column: &str) -> Result<u64> {
        self.entries.get(&key)
            .map(|&i| i as u64)
            .ok_or_else(|| ModelError::HashKeyNotFound { column: column.into(), key })
    }
}
