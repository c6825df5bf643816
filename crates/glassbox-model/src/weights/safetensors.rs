//! Safetensors file format parser.
//!
//! Layout:
//! - 8-byte little-endian header size
//! - JSON header with tensor metadata (name, dtype, shape, data offsets)
//! - Raw tensor data
//!
//! The parser reads the JSON header and decodes f32 tensors out of the
//! memory-mapped data section. Decoding goes through buffered reads, so
//! tensors whose data section happens to be unaligned are handled the same
//! as aligned ones.

use std::collections::HashMap;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Deserialize;

use crate::error::{ModelError, Result};
use crate::weights::mmap::MappedFile;

/// Metadata for a single tensor in a safetensors file.
#[derive(Debug, Clone, Deserialize)]
pub struct TensorInfo {
    /// Data type string (e.g., "F32", "F16", "BF16").
    pub dtype: String,

    /// Tensor shape.
    pub shape: Vec<usize>,

    /// Byte offset range `[start, end)` within the data section.
    pub data_offsets: [usize; 2],
}

impl TensorInfo {
    /// Total byte size of the tensor data.
    pub fn byte_size(&self) -> usize {
        self.data_offsets[1] - self.data_offsets[0]
    }

    /// Number of elements implied by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Parsed safetensors file header.
pub struct SafetensorsHeader {
    /// Map from tensor name to metadata.
    pub tensors: HashMap<String, TensorInfo>,

    /// Optional metadata (e.g., format info).
    pub metadata: HashMap<String, String>,

    /// Byte offset where the data section begins (after header).
    pub data_offset: usize,
}

/// Parse a safetensors header from raw file bytes.
pub fn parse_header(bytes: &[u8]) -> Result<SafetensorsHeader> {
    if bytes.len() < 8 {
        return Err(ModelError::WeightLoad(
            "file too small for safetensors header".into(),
        ));
    }

    let header_size = (&bytes[..8])
        .read_u64::<LittleEndian>()
        .map_err(|e| ModelError::WeightLoad(format!("failed to read header size: {e}")))?
        as usize;

    if 8 + header_size > bytes.len() {
        return Err(ModelError::WeightLoad(format!(
            "header size {header_size} exceeds file size {}",
            bytes.len()
        )));
    }

    let header_str = std::str::from_utf8(&bytes[8..8 + header_size])
        .map_err(|e| ModelError::WeightLoad(format!("invalid UTF-8 in header: {e}")))?;

    // The header is a map of tensor_name -> TensorInfo, with an optional
    // "__metadata__" key carrying a flat string map.
    let raw: HashMap<String, serde_json::Value> = serde_json::from_str(header_str)?;

    let mut tensors = HashMap::new();
    let mut metadata = HashMap::new();
    for (key, value) in raw {
        if key == "__metadata__" {
            if let Some(obj) = value.as_object() {
                for (mk, mv) in obj {
                    if let Some(s) = mv.as_str() {
                        metadata.insert(mk.clone(), s.to_string());
                    }
                }
            }
        } else {
            let info: TensorInfo = serde_json::from_value(value).map_err(|e| {
                ModelError::WeightLoad(format!("failed to parse tensor '{key}': {e}"))
            })?;
            tensors.insert(key, info);
        }
    }

    Ok(SafetensorsHeader {
        tensors,
        metadata,
        data_offset: 8 + header_size,
    })
}

/// A loaded safetensors file with parsed header and memory-mapped data.
pub struct SafetensorsFile {
    /// Parsed header with tensor metadata.
    pub header: SafetensorsHeader,

    /// Memory-mapped file data.
    pub mapped: MappedFile,
}

impl SafetensorsFile {
    /// Open and parse a safetensors file.
    pub fn open(path: &Path) -> Result<Self> {
        let mapped = MappedFile::open(path)?;
        let header = parse_header(mapped.as_bytes())?;
        Ok(SafetensorsFile { header, mapped })
    }

    /// Raw bytes for a named tensor.
    pub fn tensor_data(&self, name: &str) -> Result<&[u8]> {
        let info = self
            .header
            .tensors
            .get(name)
            .ok_or_else(|| ModelError::MissingTensor(name.to_string()))?;
        let start = self.header.data_offset + info.data_offsets[0];
        self.mapped.slice(start, info.byte_size())
    }

    /// Decode a named tensor into f32 values.
    ///
    /// Only F32 tensors are supported.
    pub fn tensor_f32(&self, name: &str) -> Result<Vec<f32>> {
        let info = self
            .header
            .tensors
            .get(name)
            .ok_or_else(|| ModelError::MissingTensor(name.to_string()))?;
        if info.dtype != "F32" {
            return Err(ModelError::UnsupportedDtype(format!(
                "{} for tensor {name}",
                info.dtype
            )));
        }

        let elements = info.element_count();
        if info.byte_size() != elements * 4 {
            return Err(ModelError::shape(
                format!("{elements} f32 elements ({} bytes)", elements * 4),
                format!("{} bytes", info.byte_size()),
            ));
        }

        let mut reader = self.tensor_data(name)?;
        let mut values = Vec::with_capacity(elements);
        for _ in 0..elements {
            values.push(reader.read_f32::<LittleEndian>()?);
        }
        Ok(values)
    }

    /// Shape of a named tensor, if present.
    pub fn shape(&self, name: &str) -> Option<&[usize]> {
        self.header.tensors.get(name).map(|i| i.shape.as_slice())
    }

    /// List all tensor names in the file.
    pub fn tensor_names(&self) -> Vec<&str> {
        self.header.tensors.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a tensor exists.
    pub fn has_tensor(&self, name: &str) -> bool {
        self.header.tensors.contains_key(name)
    }
}
