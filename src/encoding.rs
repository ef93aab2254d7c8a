//! 段数据的位级解码
//!
//! 两种物理布局：
//! - **定宽位压缩**：小端 u64 字序列，每个字容纳 `64 / bit_width` 个值，
//!   低位在前，值不跨字
//! - **游程**：(value u32, run_length u32) 对，按顺序展开

use byteorder::{ByteOrder, LittleEndian};

use crate::common::{ModelError, Result};

/// 索引 `cardinality` 个字典项所需的最小位宽（至少 1）
pub fn min_bit_width(cardinality: u64) -> u8 {
    if cardinality <= 2 {
        return 1;
    }
    (64 - (cardinality - 1).leading_zeros()) as u8
}

/// `rows` 个 `bit_width` 位的值所占的字节数；位宽非法或长度溢出 u64 时为 None
pub fn packed_len(rows: u64, bit_width: u8) -> Option<u64> {
    if bit_width == 0 || bit_width > 64 {
        return None;
    }
    let per_word = 64 / bit_width as u64;
    rows.div_ceil(per_word).checked_mul(8)
}

fn corrupt(stream: &str, reason: String) -> ModelError {
    ModelError::SegmentCorrupt { stream: stream.into(), reason }
}

// ── 定宽位压缩 ─────────────────────────────────────────────────────────────────

/// 解出 `rows` 个定宽值；字节数必须与行数精确吻合
pub fn unpack_bits(data: &[u8], bit_width: u8, rows: u64, stream: &str) -> Result<Vec<u64>> {
    if !(1..=64).contains(&bit_width) {
        return Err(corrupt(stream, format!("invalid bit width {bit_width}")));
    }
    let need = packed_len(rows, bit_width)
        .ok_or_else(|| corrupt(stream, format!("{rows} rows at {bit_width} bits overflow the segment length")))?;
    if data.len() as u64 != need {
        return Err(corrupt(stream, format!(
            "{rows} rows at {bit_width} bits need {need} bytes, stream has {}", data.len()
        )));
    }

    let width    = bit_width as u32;
    let per_word = (64 / width) as usize;
    let mask     = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };

    let mut out = Vec::with_capacity(rows as usize);
    for chunk in data.chunks_exact(8) {
        let mut word = LittleEndian::read_u64(chunk);
        for _ in 0..per_word {
            if out.len() as u64 == rows { break; }
            out.push(word & mask);
            word = word.checked_shr(width).unwrap_or(0);
        }
    }
    Ok(out)
}

// ── 游程 ──────────────────────────────────────────────────────────────────────

/// 展开 (value, run) 对，总行数必须恰好等于 `rows`
pub fn expand_runs(data: &[u8], rows: u64, stream: &str) -> Result<Vec<u32>> {
    if data.len() % 8 != 0 {
        return Err(corrupt(stream, format!("run-length stream of {} bytes is not a whole number of pairs", data.len())));
    }

    // 行数来自 catalog，不可信：预分配设上限
    let mut out = Vec::with_capacity(rows.min(1 << 20) as usize);
    for (i, pair) in data.chunks_exact(8).enumerate() {
        let value = LittleEndian::read_u32(&pair[0..4]);
        let run   = LittleEndian::read_u32(&pair[4..8]) as u64;
        let have  = out.len() as u64;
        if have + run > rows {
            return Err(corrupt(stream, format!(
                "run {i} ({run} × {value}) overruns declared {rows} rows at row {have}"
            )));
        }
        out.extend(std::iter::repeat(value).take(run as usize));
    }

    if out.len() as u64 != rows {
        return Err(corrupt(stream, format!(
            "runs end after {} of {rows} declared rows", out.len()
        )));
    }
    Ok(out)
}
