//! Header-delimited `.ply` decoder for 3D Gaussian splatting exports.

use rayon::prelude::*;
use tracing::debug;

use crate::error::FormatError;
use crate::math::{clamp_u8, sigmoid, Vec3};
use crate::splat::{quantize_rotation, Splat, SH_C0};

/// Vertex properties every splat export must carry, in decode order.
const REQUIRED_COUNT: usize = 14;
const REQUIRED_PROPERTIES: [&str; REQUIRED_COUNT] = [
    "x", "y", "z", "scale_0", "scale_1", "scale_2", "opacity", "f_dc_0", "f_dc_1", "f_dc_2",
    "rot_0", "rot_1", "rot_2", "rot_3",
];

#[derive(Debug, Clone, Copy)]
enum PlyType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl PlyType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "char" | "int8" => Some(Self::Char),
            "uchar" | "uint8" => Some(Self::UChar),
            "short" | "int16" => Some(Self::Short),
            "ushort" | "uint16" => Some(Self::UShort),
            "int" | "int32" => Some(Self::Int),
            "uint" | "uint32" => Some(Self::UInt),
            "float" | "float32" => Some(Self::Float),
            "double" | "float64" => Some(Self::Double),
            _ => None,
        }
    }

    fn size(self) -> usize {
        match self {
            Self::Char | Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Double => 8,
        }
    }

    fn read_as_f32(self, bytes: &[u8]) -> f32 {
        match self {
            Self::Char => i8::from_le_bytes([bytes[0]]) as f32,
            Self::UChar => bytes[0] as f32,
            Self::Short => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Self::UShort => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Self::Int => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            Self::UInt => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            Self::Float => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Self::Double => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes[0..8]);
                f64::from_le_bytes(arr) as f32
            }
        }
    }
}

#[derive(Debug, Clone)]
struct PlyProperty {
    name: String,
    ty: PlyType,
}

#[derive(Debug, Clone)]
struct PlyElement {
    name: String,
    count: usize,
    properties: Vec<PlyProperty>,
    list_property: Option<String>,
}

impl PlyElement {
    fn stride(&self) -> Result<usize, FormatError> {
        if let Some(name) = &self.list_property {
            return Err(FormatError::ListProperty(name.clone()));
        }
        self.properties.iter().try_fold(0usize, |acc, prop| {
            acc.checked_add(prop.ty.size())
                .ok_or(FormatError::SizeOverflow("element stride"))
        })
    }
}

#[derive(Debug)]
struct PlyHeader {
    elements: Vec<PlyElement>,
    payload_offset: usize,
}

#[derive(Debug, Clone, Copy)]
struct Field {
    offset: usize,
    ty: PlyType,
}

impl Field {
    #[inline]
    fn read(self, vertex: &[u8]) -> f32 {
        self.ty.read_as_f32(&vertex[self.offset..self.offset + self.ty.size()])
    }
}

/// Byte offsets of the required properties inside one vertex record.
#[derive(Debug)]
struct VertexLayout {
    fields: [Field; REQUIRED_COUNT],
    stride: usize,
}

impl VertexLayout {
    fn resolve(element: &PlyElement) -> Result<Self, FormatError> {
        let stride = element.stride()?;
        let mut fields = [None; REQUIRED_COUNT];
        let mut offset = 0usize;
        for prop in &element.properties {
            if let Some(slot) = REQUIRED_PROPERTIES.iter().position(|&n| n == prop.name) {
                fields[slot].get_or_insert(Field {
                    offset,
                    ty: prop.ty,
                });
            }
            offset += prop.ty.size();
        }

        let mut resolved = [Field {
            offset: 0,
            ty: PlyType::Float,
        }; REQUIRED_COUNT];
        for (slot, field) in fields.into_iter().enumerate() {
            resolved[slot] = field.ok_or(FormatError::MissingProperty(REQUIRED_PROPERTIES[slot]))?;
        }

        Ok(Self {
            fields: resolved,
            stride,
        })
    }

    /// Decodes one vertex into a splat plus its streaming importance.
    fn decode(&self, vertex: &[u8]) -> (Splat, f32) {
        let v = self.fields.map(|f| f.read(vertex));
        let [x, y, z, s0, s1, s2, opacity, dc0, dc1, dc2, r0, r1, r2, r3] = v;

        let alpha = sigmoid(opacity);
        let importance = (s0 + s1 + s2).exp() * alpha;
        let scale = Vec3::new(positive_exp(s0), positive_exp(s1), positive_exp(s2));
        let color = [
            sh_dc_to_u8(dc0),
            sh_dc_to_u8(dc1),
            sh_dc_to_u8(dc2),
            clamp_u8(alpha.clamp(0.0, 1.0) * 255.0),
        ];

        let splat = Splat {
            position: Vec3::new(x, y, z),
            scale,
            color,
            rotation: quantize_rotation([r0, r1, r2, r3]),
        };
        (splat, importance)
    }
}

#[inline]
fn positive_exp(log_scale: f32) -> f32 {
    log_scale.exp().max(f32::MIN_POSITIVE)
}

#[inline]
fn sh_dc_to_u8(dc: f32) -> u8 {
    clamp_u8((0.5 + dc * SH_C0).clamp(0.0, 1.0) * 255.0)
}

#[inline]
fn next_line<'b>(buffer: &'b [u8], offset: &mut usize) -> Option<&'b [u8]> {
    if *offset >= buffer.len() {
        return None;
    }
    let start = *offset;

    match memchr::memchr(b'\n', &buffer[start..]) {
        Some(pos) => {
            *offset = start + pos + 1;
            Some(&buffer[start..start + pos])
        }
        None => {
            *offset = buffer.len();
            Some(&buffer[start..])
        }
    }
}

fn header_line(raw: &[u8]) -> Result<&str, FormatError> {
    std::str::from_utf8(raw)
        .map(str::trim)
        .map_err(|_| FormatError::InvalidHeader(String::from_utf8_lossy(raw).into_owned()))
}

/// Returns true when `data` starts with the PLY magic line.
pub fn has_ply_magic(data: &[u8]) -> bool {
    let mut offset = 0;
    matches!(next_line(data, &mut offset), Some(line) if line.strip_suffix(b"\r").unwrap_or(line) == b"ply")
}

fn parse_header(data: &[u8]) -> Result<PlyHeader, FormatError> {
    if !has_ply_magic(data) {
        return Err(FormatError::MissingMagic);
    }
    let mut offset = 0;
    next_line(data, &mut offset);

    let mut encoding: Option<String> = None;
    let mut elements: Vec<PlyElement> = Vec::new();

    loop {
        let raw = next_line(data, &mut offset).ok_or(FormatError::MissingEndHeader)?;
        let line = header_line(raw)?;
        if line == "end_header" {
            break;
        }
        // The final line may be cut off mid-download.
        if offset == data.len() && !data.ends_with(b"\n") {
            return Err(FormatError::MissingEndHeader);
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["comment", ..] | ["obj_info", ..] => {}
            ["format", enc, ..] => encoding = Some((*enc).to_string()),
            ["element", name, count] => {
                let count = count
                    .parse::<usize>()
                    .map_err(|_| FormatError::InvalidHeader(line.to_string()))?;
                elements.push(PlyElement {
                    name: (*name).to_string(),
                    count,
                    properties: Vec::new(),
                    list_property: None,
                });
            }
            ["property", "list", .., name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| FormatError::InvalidHeader(line.to_string()))?;
                element.list_property.get_or_insert_with(|| (*name).to_string());
            }
            ["property", ty, name] => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| FormatError::InvalidHeader(line.to_string()))?;
                let ty = PlyType::parse(ty)
                    .ok_or_else(|| FormatError::UnsupportedPropertyType((*ty).to_string()))?;
                element.properties.push(PlyProperty {
                    name: (*name).to_string(),
                    ty,
                });
            }
            ["element", ..] | ["property", ..] | ["format"] => {
                return Err(FormatError::InvalidHeader(line.to_string()));
            }
            _ => {}
        }
    }

    match encoding.as_deref() {
        Some("binary_little_endian") => {}
        Some(other) => return Err(FormatError::UnsupportedEncoding(other.to_string())),
        None => return Err(FormatError::InvalidHeader("missing format line".to_string())),
    }

    Ok(PlyHeader {
        elements,
        payload_offset: offset,
    })
}

/// Decodes a binary little-endian PLY buffer into canonical splats.
///
/// Records come back ordered by descending visual importance
/// (`exp(sum of log scales) * opacity`), ties kept in file order, so that a
/// host streaming the converted rows sees the most visible splats first.
pub fn decode_ply(data: &[u8]) -> Result<Vec<Splat>, FormatError> {
    let header = parse_header(data)?;

    let mut vertex_offset = header.payload_offset;
    let mut vertex_element = None;
    for element in &header.elements {
        if element.name == "vertex" {
            vertex_element = Some(element);
            break;
        }
        let bytes = element
            .count
            .checked_mul(element.stride()?)
            .ok_or(FormatError::SizeOverflow("element payload"))?;
        vertex_offset = vertex_offset
            .checked_add(bytes)
            .ok_or(FormatError::SizeOverflow("element payload"))?;
    }
    let vertex = vertex_element.ok_or(FormatError::MissingVertexElement)?;
    let layout = VertexLayout::resolve(vertex)?;

    let vertex_bytes = vertex
        .count
        .checked_mul(layout.stride)
        .ok_or(FormatError::SizeOverflow("vertex payload"))?;
    let needed = vertex_offset
        .checked_add(vertex_bytes)
        .ok_or(FormatError::SizeOverflow("vertex payload"))?;
    if data.len() < needed {
        return Err(FormatError::TruncatedPayload {
            needed,
            available: data.len(),
        });
    }
    if vertex.count == 0 || layout.stride == 0 {
        return Ok(Vec::new());
    }

    let payload = &data[vertex_offset..needed];
    let mut decoded: Vec<(Splat, f32)> = payload
        .par_chunks_exact(layout.stride)
        .map(|chunk| layout.decode(chunk))
        .collect();
    decoded.par_sort_by(|a, b| b.1.total_cmp(&a.1));

    debug!(
        vertices = vertex.count,
        stride = layout.stride,
        "decoded ply payload"
    );
    Ok(decoded.into_iter().map(|(splat, _)| splat).collect())
}
