//! 数据库镜像解压（LZ4 / None）+ CRC32 校验

use crate::common::{ModelError, Result};

/// 镜像信封中声明的压缩方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Lz4,
}

impl TryFrom<u8> for CompressionType {
    type Error = ModelError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            n => Err(ModelError::Decompression(format!("unknown image codec {n}"))),
        }
    }
}

/// 一次性解压整个镜像，并校验长度与 CRC32
pub fn inflate_image(
    payload:      &[u8],
    codec:        CompressionType,
    inflated_len: u64,
    expected_crc: u32,
) -> Result<Vec<u8>> {
    let image = match codec {
        CompressionType::None => payload.to_vec(),
        CompressionType::Lz4  => {
            let size = i32::try_from(inflated_len).map_err(|_| {
                ModelError::Decompression(format!("declared length {inflated_len} too large for LZ4 block"))
            })?;
            lz4::block::decompress(payload, Some(size))
                .map_err(|e| ModelError::Decompression(e.to_string()))?
        }
    };

    if image.len() as u64 != inflated_len {
        return Err(ModelError::Decompression(format!(
            "inflated {} bytes, header declares {inflated_len}", image.len()
        )));
    }
    let actual_crc = crc32fast::hash(&image);
    if actual_crc != expected_crc {
        return Err(ModelError::Decompression(format!(
            "checksum mismatch: stored {expected_crc:#010x}, computed {actual_crc:#010x}"
        )));
    }
    Ok(image)
}
