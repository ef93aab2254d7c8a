//! 逻辑类型、编码描述符与运行时值

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::common::{format_timestamp, ModelConfig, ModelError, Result};

// ── 逻辑类型 ──────────────────────────────────────────────────────────────────

/// 列对外呈现的数据类型（catalog 中的类型码沿用表格模型的 DataType 编号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Int64,
    Double,
    DateTime,
    /// 定点小数 / 货币
    Decimal,
    Boolean,
    /// 字典中的值原样透出
    Variant,
}

impl DataType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2  => Some(Self::String),
            6  => Some(Self::Int64),
            8  => Some(Self::Double),
            9  => Some(Self::DateTime),
            10 => Some(Self::Decimal),
            11 => Some(Self::Boolean),
            20 => Some(Self::Variant),
            _  => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::String   => 2,
            Self::Int64    => 6,
            Self::Double   => 8,
            Self::DateTime => 9,
            Self::Decimal  => 10,
            Self::Boolean  => 11,
            Self::Variant  => 20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String   => "String",
            Self::Int64    => "Int64",
            Self::Double   => "Double",
            Self::DateTime => "DateTime",
            Self::Decimal  => "Decimal",
            Self::Boolean  => "Boolean",
            Self::Variant  => "Variant",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

// ── 编码 ──────────────────────────────────────────────────────────────────────

/// 列的压缩方案；未识别的编码码值保留原值，到解码时才报错
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingKind {
    /// 字典 + 定宽位压缩索引
    Dictionary,
    /// 无字典，定宽位压缩的直接值（相对段最小值）
    Direct,
    /// (值, 游程) 对
    RunLength,
    /// 代理键 → 哈希索引 → 字典
    Hash,
    Unsupported(u8),
}

impl EncodingKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Dictionary,
            2 => Self::Direct,
            3 => Self::RunLength,
            4 => Self::Hash,
            n => Self::Unsupported(n),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Dictionary     => 1,
            Self::Direct         => 2,
            Self::RunLength      => 3,
            Self::Hash           => 4,
            Self::Unsupported(n) => n,
        }
    }
}

impl std::fmt::Display for EncodingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dictionary     => write!(f, "Dictionary"),
            Self::Direct         => write!(f, "Direct"),
            Self::RunLength      => write!(f, "RunLength"),
            Self::Hash           => write!(f, "Hash"),
            Self::Unsupported(n) => write!(f, "Unsupported({n})"),
        }
    }
}

impl Serialize for EncodingKind {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// 每列的编码描述符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub kind:         EncodingKind,
    pub bit_width:    u8,
    /// 字典基数（distinct 值个数）
    pub cardinality:  u32,
    /// 定点小数的缩放因子（10 的幂）
    pub scale_factor: u32,
}

// ── 定点小数 ──────────────────────────────────────────────────────────────────

/// 值 = units / scale_factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedDecimal {
    pub units:        i64,
    pub scale_factor: u32,
}

impl FixedDecimal {
    pub fn new(units: i64, scale_factor: u32) -> Self { Self { units, scale_factor } }

    pub fn to_f64(self) -> f64 { self.units as f64 / self.scale_factor as f64 }

    /// 小数位数（scale_factor 已在解析时校验为 10 的幂）
    pub fn decimal_places(self) -> usize {
        self.scale_factor.checked_ilog10().unwrap_or(0) as usize
    }
}

impl std::fmt::Display for FixedDecimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let places = self.decimal_places();
        if places == 0 {
            return write!(f, "{}", self.units);
        }
        let factor = self.scale_factor as u64;
        let abs    = self.units.unsigned_abs();
        let sign   = if self.units < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:0places$}", abs / factor, abs % factor)
    }
}

// ── 运行时值 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Decimal(FixedDecimal),
    Text(String),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

    pub fn as_i64(&self) -> Option<i64> {
        match self { Self::Integer(v) => Some(*v), _ => None }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Real(v)    => Some(*v),
            Self::Decimal(d) => Some(d.to_f64()),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self { Self::Text(s) => Some(s), _ => None }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self { Self::Boolean(b) => Some(*b), _ => None }
    }
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self { Self::DateTime(t) => Some(*t), _ => None }
    }

    /// 变体名，用于错误信息
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null       => "null",
            Self::Integer(_) => "integer",
            Self::Real(_)    => "real",
            Self::Decimal(_) => "decimal",
            Self::Text(_)    => "text",
            Self::Boolean(_) => "boolean",
            Self::DateTime(_)=> "date-time",
        }
    }

    /// 对已解析出的原始值（整数 / 实数 / 文本）应用列的逻辑类型转换
    pub fn into_logical(
        self,
        data_type: DataType,
        encoding:  &Encoding,
        config:    &ModelConfig,
        column:    &str,
    ) -> Result<Value> {
        let mismatch = |found: &Value| ModelError::TypeMismatch {
            column:    column.into(),
            data_type: data_type.to_string(),
            found:     found.kind_name().into(),
        };
        match (data_type, self) {
            (_, Self::Null) => Ok(Self::Null),

            (DataType::Int64,    v @ Self::Integer(_)) => Ok(v),
            (DataType::Double,   v @ Self::Real(_))    => Ok(v),
            (DataType::Double,   Self::Integer(v))     => Ok(Self::Real(v as f64)),
            (DataType::Decimal,  Self::Integer(v))     =>
                Ok(Self::Decimal(FixedDecimal::new(v, encoding.scale_factor))),
            (DataType::DateTime, Self::Integer(ticks)) => config.ticks_to_datetime(ticks)
                .map(Self::DateTime)
                .ok_or(ModelError::TimestampOutOfRange(ticks)),
            (DataType::Boolean,  Self::Integer(0))     => Ok(Self::Boolean(false)),
            (DataType::Boolean,  Self::Integer(1))     => Ok(Self::Boolean(true)),
            (DataType::String,   v @ Self::Text(_))    => Ok(v),
            (DataType::Variant,  v @ (Self::Integer(_) | Self::Real(_) | Self::Text(_))) => Ok(v),

            (_, other) => Err(mismatch(&other)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null        => write!(f, "NULL"),
            Self::Integer(v)  => write!(f, "{v}"),
            Self::Real(v)     => write!(f, "{v}"),
            Self::Decimal(d)  => write!(f, "{d}"),
            Self::Text(s)     => write!(f, "{s}"),
            Self::Boolean(b)  => write!(f, "{b}"),
            Self::DateTime(t) => write!(f, "{}", format_timestamp(t)),
        }
    }
}

/// 导出为 JSON 时的形态：时间为固定格式字符串，小数为数字，非有限实数为 null
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null        => s.serialize_none(),
            Self::Integer(v)  => s.serialize_i64(*v),
            Self::Real(v) if v.is_finite() => s.serialize_f64(*v),
            Self::Real(_)     => s.serialize_none(),
            Self::Decimal(d)  => s.serialize_f64(d.to_f64()),
            Self::Text(t)     => s.serialize_str(t),
            Self::Boolean(b)  => s.serialize_bool(*b),
            Self::DateTime(t) => s.serialize_str(&format_timestamp(t)),
        }
    }
}
