//! 有界字节游标
//!
//! 所有二进制结构（镜像文件表、catalog 记录、字典、哈希索引）都通过
//! `ByteReader` 读取：每次读取先检查剩余长度，越界返回 `ReadError`，
//! 由调用方映射为各阶段对应的 `ModelError`。

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("truncated at offset {offset}: need {needed} bytes, {remaining} left")]
    Truncated { offset: usize, needed: usize, remaining: usize },
    #[error("invalid UTF-8 at offset {0}")]
    InvalidUtf8(usize),
}

pub type ReadResult<T> = std::result::Result<T, ReadError>;

#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos:  usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self { Self { data, pos: 0 } }

    pub fn position(&self)  -> usize { self.pos }
    pub fn remaining(&self) -> usize { self.data.len() - self.pos }
    pub fn is_empty(&self)  -> bool  { self.remaining() == 0 }

    /// 借出接下来的 `n` 个字节
    pub fn take(&mut self, n: usize) -> ReadResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(ReadError::Truncated {
                offset: self.pos, needed: n, remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> ReadResult<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self)  -> ReadResult<u8>  { Ok(self.take(1)?[0]) }
    pub fn read_u16(&mut self) -> ReadResult<u16> { Ok(LittleEndian::read_u16(self.take(2)?)) }
    pub fn read_u32(&mut self) -> ReadResult<u32> { Ok(LittleEndian::read_u32(self.take(4)?)) }
    pub fn read_u64(&mut self) -> ReadResult<u64> { Ok(LittleEndian::read_u64(self.take(8)?)) }
    pub fn read_i64(&mut self) -> ReadResult<i64> { Ok(LittleEndian::read_i64(self.take(8)?)) }
    pub fn read_f64(&mut self) -> ReadResult<f64> { Ok(LittleEndian::read_f64(self.take(8)?)) }

    /// 读取 `n` 字节并按 UTF-8 解释
    pub fn read_utf8(&mut self, n: usize) -> ReadResult<&'a str> {
        let at    = self.pos;
        let bytes = self.take(n)?;
        std::str::from_utf8(bytes).map_err(|_| ReadError::InvalidUtf8(at))
    }

    /// u32 长度前缀字符串
    pub fn read_str(&mut self) -> ReadResult<&'a str> {
        let len = self.read_u32()? as usize;
        self.read_utf8(len)
    }

    /// 可选尾部字段：游标已到末尾时返回 None（旧版本记录不带该字段）
    pub fn read_opt_str(&mut self) -> ReadResult<Option<&'a str>> {
        if self.is_empty() { Ok(None) } else { self.read_str().map(Some) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0xBEEFu16.to_le_bytes());
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&(-3i64).to_le_bytes());
        buf.extend_from_slice(&2.5f64.to_le_bytes());
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_u16().unwrap(), 0xBEEF);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert_eq!(r.read_i64().unwrap(), -3);
        assert_eq!(r.read_f64().unwrap(), 2.5);
        assert!(r.is_empty());
    }

    #[test]
    fn truncation_reports_offset() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        r.read_u8().unwrap();
        assert_eq!(
            r.read_u32(),
            Err(ReadError::Truncated { offset: 1, needed: 4, remaining: 2 }),
        );
    }

    #[test]
    fn length_prefixed_strings() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(b"Age");
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_str().unwrap(), "Age");
        assert_eq!(r.read_opt_str().unwrap(), None);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&[0xC3, 0x28]);
        assert_eq!(ByteReader::new(&buf).read_str(), Err(ReadError::InvalidUtf8(4)));
    }
}
