//! Container 解包
//!
//! 外层是 zip 压缩包，其中 `DataModel` 条目保存压缩后的数据库镜像：
//! ```text
//! ┌────────────────────────────────────┐
//! │  MAGIC        (8 bytes) "VPQIMAGE" │
//! │  version      (u16) = 1            │
//! │  codec        (u8)  0=None 1=LZ4   │
//! │  reserved     (u8)                 │
//! │  inflated_len (u64)                │
//! │  crc32        (u32)                │
//! ├────────────────────────────────────┤
//! │  PAYLOAD（压缩后的镜像）             │
//! └────────────────────────────────────┘
//! ```
//! 解压后的镜像是一张虚拟文件表：
//! ```text
//! ┌────────────────────────────────────┐
//! │  MAGIC (8 bytes) "VPQFILES"        │
//! │  count (u32)                       │
//! │  [path_len u16 | path | off u64 | len u64] × count
//! ├────────────────────────────────────┤
//! │  流数据（按 off/len 定位）           │
//! └────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::ops::Range;
use std::path::Path;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::common::{ModelConfig, ModelError, Result};
use crate::compression::{self, CompressionType};
use crate::reader::{ByteReader, ReadResult};

pub const IMAGE_MAGIC: &[u8; 8] = b"VPQIMAGE";
pub const FILES_MAGIC: &[u8; 8] = b"VPQFILES";
const IMAGE_HEADER_LEN: usize   = 8 + 2 + 1 + 1 + 8 + 4;

/// 打开后的 Container：只读，生命周期与 Model 一致
#[derive(Debug)]
pub struct Container {
    archive_entries: Vec<String>,
    image:           Vec<u8>,
    streams:         BTreeMap<String, Range<usize>>,
}

impl Container {
    pub fn open(path: impl AsRef<Path>, config: &ModelConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("opening container {}", path.display());
        Self::from_reader(BufReader::new(file), config)
    }

    pub fn from_bytes(bytes: &[u8], config: &ModelConfig) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes), config)
    }

    pub fn from_reader<R: Read + Seek>(reader: R, config: &ModelConfig) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| ModelError::ContainerFormat(e.to_string()))?;
        let archive_entries: Vec<String> = archive.file_names().map(String::from).collect();

        let envelope = {
            let mut entry = archive.by_name(&config.data_model_entry).map_err(|e| match e {
                ZipError::FileNotFound => ModelError::MissingStream(config.data_model_entry.clone()),
                other                  => ModelError::ContainerFormat(other.to_string()),
            })?;
            // zip 元数据不可信，不按声明大小预分配
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)
                .map_err(|e| ModelError::ContainerFormat(format!("read {}: {e}", config.data_model_entry)))?;
            buf
        };

        let image   = unpack_envelope(&envelope, config)?;
        let streams = parse_file_table(&image)?;
        log::debug!("image inflated: {} bytes, {} streams", image.len(), streams.len());

        Ok(Self { archive_entries, image, streams })
    }

    /// 借出一个流的字节（不复制）
    pub fn read_stream(&self, name: &str) -> Result<&[u8]> {
        self.streams.get(name)
            .map(|r| &self.image[r.clone()])
            .ok_or_else(|| ModelError::NotFound(format!("stream {name}")))
    }

    pub fn has_stream(&self, name: &str) -> bool { self.streams.contains_key(name) }

    /// 按前缀列出流名（有序）；没有任何匹配时返回 NotFound
    pub fn list_streams(&self, prefix: &str) -> Result<Vec<&str>> {
        let names: Vec<&str> = self.streams
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_str())
            .collect();
        if names.is_empty() {
            return Err(ModelError::NotFound(format!("no stream with prefix {prefix:?}")));
        }
        Ok(names)
    }

    pub fn stream_count(&self) -> usize { self.streams.len() }
    pub fn image_len(&self) -> usize { self.image.len() }
    pub fn archive_entries(&self) -> &[String] { &self.archive_entries }
}

fn unpack_envelope(data: &[u8], config: &ModelConfig) -> Result<Vec<u8>> {
    if data.len() < IMAGE_HEADER_LEN || &data[..8] != IMAGE_MAGIC {
        return Err(ModelError::ContainerFormat(format!(
            "{} is not a database image envelope", config.data_model_entry
        )));
    }
    let mut r = ByteReader::new(&data[8..IMAGE_HEADER_LEN]);
    let (version, codec, inflated_len, crc) = read_envelope_header(&mut r)
        .map_err(|e| ModelError::ContainerFormat(e.to_string()))?;

    log::debug!("image envelope v{version}, codec {codec}, {inflated_len} bytes inflated");
    if inflated_len > config.max_image_size {
        return Err(ModelError::Decompression(format!(
            "declared image size {inflated_len} exceeds limit {}", config.max_image_size
        )));
    }
    let codec = CompressionType::try_from(codec)?;
    compression::inflate_image(&data[IMAGE_HEADER_LEN..], codec, inflated_len, crc)
}

fn read_envelope_header(r: &mut ByteReader<'_>) -> ReadResult<(u16, u8, u64, u32)> {
    let version      = r.read_u16()?;
    let codec        = r.read_u8()?;
    let _reserved    = r.read_u8()?;
    let inflated_len = r.read_u64()?;
    let crc          = r.read_u32()?;
    Ok((version, codec, inflated_len, crc))
}

fn read_file_entry<'a>(r: &mut ByteReader<'a>) -> ReadResult<(&'a str, u64, u64)> {
    let path_len = r.read_u16()? as usize;
    let path     = r.read_utf8(path_len)?;
    Ok((path, r.read_u64()?, r.read_u64()?))
}

fn parse_file_table(image: &[u8]) -> Result<BTreeMap<String, Range<usize>>> {
    let corrupt = |reason: String| ModelError::Decompression(format!("image file table: {reason}"));

    let mut r = ByteReader::new(image);
    let magic = r.take(8).map_err(|e| corrupt(e.to_string()))?;
    if magic != FILES_MAGIC {
        return Err(corrupt("bad magic".into()));
    }
    let count = r.read_u32().map_err(|e| corrupt(e.to_string()))?;

    let mut streams = BTreeMap::new();
    for _ in 0..count {
        let (path, offset, len) = read_file_entry(&mut r).map_err(|e| corrupt(e.to_string()))?;

        let end = offset.checked_add(len)
            .filter(|&end| end <= image.len() as u64)
            .ok_or_else(|| corrupt(format!("{path} [{offset}+{len}] outside image of {} bytes", image.len())))?;
        if streams.insert(path.to_string(), offset as usize..end as usize).is_some() {
            return Err(corrupt(format!("duplicate path {path}")));
        }
    }
    Ok(streams)
}
