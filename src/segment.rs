//! 段读取
//!
//! 一个段是某列在某分区内的一段连续行。段流只保存编码后的整数码
//! （字典下标 / 相对最小值的直接值 / 代理键），解释由列解码器完成。

use crate::common::{ModelError, Result};
use crate::container::Container;
use crate::encoding;
use crate::meta::SegmentDef;

/// 段流的物理布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentLayout {
    /// 定宽位压缩，参数为位宽
    BitPacked(u8),
    /// (value, run) 对
    RunLength,
}

pub struct SegmentReader<'a> {
    def:  &'a SegmentDef,
    data: &'a [u8],
}

impl<'a> SegmentReader<'a> {
    /// 借出段流字节；流缺失为 NotFound
    pub fn open(container: &'a Container, def: &'a SegmentDef) -> Result<Self> {
        let data = container.read_stream(&def.stream)?;
        Ok(Self { def, data })
    }

    pub fn num_rows(&self) -> u64 { self.def.row_count }
    pub fn min_value(&self) -> i64 { self.def.min_value }
    pub fn stream(&self) -> &str { &self.def.stream }

    /// 读出本段每行的整数码，长度恰为段声明的行数
    pub fn read_codes(&self, layout: SegmentLayout) -> Result<Vec<u64>> {
        let stream = self.stream();
        match layout {
            SegmentLayout::BitPacked(width) =>
                encoding::unpack_bits(self.data, width, self.def.row_count, stream),
            SegmentLayout::RunLength =>
                encoding::expand_runs(self.data, self.def.row_count, stream)
                    .map(|v| v.into_iter().map(u64::from).collect()),
        }
    }

    /// 直接值：段最小值 + 码
    pub fn direct_value(&self, code: u64) -> Result<i64> {
        i64::try_from(code).ok()
            .and_then(|c| self.def.min_value.checked_add(c))
            .ok_or_else(|| ModelError::SegmentCorrupt {
                stream: self.def.stream.clone(),
                reason: format!("value {code} + base {} overflows i64", self.def.min_value),
            })
    }
}
