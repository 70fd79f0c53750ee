//! The back-end shader wrapper, a tagged sub-container around one compiled
//! shader blob. It keeps its back-end lineage: one-byte uniform name
//! lengths and a trailing attribute block whose presence is simply whether
//! bytes remain, which is well defined because the enclosing shader
//! definition length-prefixes the whole wrapper.

use crate::cursor::{Reader, Writer};
use crate::enums::{ShaderPlatform, ShaderStage};
use crate::FormatError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WrapperTag {
    Vertex,
    Fragment,
    Compute,
}

impl serde::Serialize for WrapperTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl WrapperTag {
    pub fn bytes(&self) -> [u8; 3] {
        match self {
            Self::Vertex => *b"VSH",
            Self::Fragment => *b"FSH",
            Self::Compute => *b"CSH",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Vertex => "VSH",
            Self::Fragment => "FSH",
            Self::Compute => "CSH",
        }
    }

    /// The wrapper format version this tag is written with.
    pub fn version(&self) -> u8 {
        match self {
            Self::Vertex | Self::Fragment => 5,
            Self::Compute => 3,
        }
    }

    pub fn for_stage(stage: ShaderStage) -> Result<Self, FormatError> {
        match stage {
            ShaderStage::Vertex => Ok(Self::Vertex),
            ShaderStage::Fragment => Ok(Self::Fragment),
            ShaderStage::Compute => Ok(Self::Compute),
            ShaderStage::Unknown => Err(FormatError::UntaggedStage(stage)),
        }
    }

    fn from_bytes(bytes: [u8; 3]) -> Result<Self, FormatError> {
        match &bytes {
            b"VSH" => Ok(Self::Vertex),
            b"FSH" => Ok(Self::Fragment),
            b"CSH" => Ok(Self::Compute),
            _ => Err(FormatError::WrapperTag(bytes)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BgfxUniform {
    pub name: String,
    pub type_bits: u8,
    pub count: u8,
    pub reg_index: u16,
    pub reg_count: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct VertexLayout {
    pub attributes: Vec<u16>,
    pub size: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct BgfxShader {
    pub tag: WrapperTag,
    pub hash: u64,
    pub uniforms: Vec<BgfxUniform>,
    /// Compute work group size, only on the wire for Metal compute shaders.
    pub group_size: [u16; 3],
    pub shader_bytes: Vec<u8>,
    pub layout: Option<VertexLayout>,
}

impl BgfxShader {
    /// A bare wrapper around freshly compiled object code, as the
    /// compilation pipeline emits it.
    pub fn new(stage: ShaderStage, shader_bytes: Vec<u8>) -> Result<Self, FormatError> {
        Ok(Self {
            tag: WrapperTag::for_stage(stage)?,
            hash: 0,
            uniforms: Vec::new(),
            group_size: [0; 3],
            shader_bytes,
            layout: None,
        })
    }

    fn has_group_size(platform: ShaderPlatform, stage: ShaderStage) -> bool {
        platform == ShaderPlatform::Metal && stage == ShaderStage::Compute
    }

    pub fn read(
        reader: &mut Reader<'_>,
        platform: ShaderPlatform,
        stage: ShaderStage,
    ) -> Result<Self, FormatError> {
        let mut tag_bytes = [0; 3];
        tag_bytes.copy_from_slice(reader.read_bytes(3)?);
        let tag = WrapperTag::from_bytes(tag_bytes)?;

        let version = reader.read_u8()?;
        if version != tag.version() {
            return Err(FormatError::WrapperVersion {
                tag: tag.name(),
                version,
            });
        }

        let hash = reader.read_u64()?;

        let uniform_count = reader.read_u16()?;
        let mut uniforms = Vec::with_capacity(uniform_count as usize);
        for _ in 0..uniform_count {
            uniforms.push(Self::read_uniform(reader)?);
        }

        let group_size = if Self::has_group_size(platform, stage) {
            [reader.read_u16()?, reader.read_u16()?, reader.read_u16()?]
        } else {
            [0; 3]
        };

        let shader_bytes = reader.read_array()?.to_vec();

        let pad = reader.read_u8()?;
        if pad != 0 {
            return Err(FormatError::WrapperPad(pad));
        }

        let layout = if reader.is_empty() {
            None
        } else {
            let attribute_count = reader.read_u8()?;
            let mut attributes = Vec::with_capacity(attribute_count as usize);
            for _ in 0..attribute_count {
                attributes.push(reader.read_u16()?);
            }
            Some(VertexLayout {
                attributes,
                size: reader.read_u16()?,
            })
        };

        Ok(Self {
            tag,
            hash,
            uniforms,
            group_size,
            shader_bytes,
            layout,
        })
    }

    pub fn write(&self, writer: &mut Writer, platform: ShaderPlatform, stage: ShaderStage) {
        writer.write_bytes(&self.tag.bytes());
        writer.write_u8(self.tag.version());
        writer.write_u64(self.hash);

        writer.write_u16(self.uniforms.len() as u16);
        for uniform in &self.uniforms {
            Self::write_uniform(writer, uniform);
        }

        if Self::has_group_size(platform, stage) {
            for dim in self.group_size {
                writer.write_u16(dim);
            }
        }

        writer.write_array(&self.shader_bytes);
        writer.write_u8(0);

        if let Some(layout) = &self.layout {
            writer.write_u8(layout.attributes.len() as u8);
            for attribute in &layout.attributes {
                writer.write_u16(*attribute);
            }
            writer.write_u16(layout.size);
        }
    }

    fn read_uniform(reader: &mut Reader<'_>) -> Result<BgfxUniform, FormatError> {
        let name_len = reader.read_u8()?;
        let name_offset = reader.offset();
        let name = std::str::from_utf8(reader.read_bytes(name_len as usize)?)
            .map_err(|_| crate::cursor::CursorError::InvalidUtf8 {
                offset: name_offset,
            })?
            .to_owned();

        Ok(BgfxUniform {
            name,
            type_bits: reader.read_u8()?,
            count: reader.read_u8()?,
            reg_index: reader.read_u16()?,
            reg_count: reader.read_u16()?,
        })
    }

    fn write_uniform(writer: &mut Writer, uniform: &BgfxUniform) {
        writer.write_u8(uniform.name.len() as u8);
        writer.write_bytes(uniform.name.as_bytes());
        writer.write_u8(uniform.type_bits);
        writer.write_u8(uniform.count);
        writer.write_u16(uniform.reg_index);
        writer.write_u16(uniform.reg_count);
    }
}

#[cfg(test)]
mod tests {
    use super::{BgfxShader, BgfxUniform, VertexLayout, WrapperTag};
    use crate::cursor::{Reader, Writer};
    use crate::enums::{ShaderPlatform, ShaderStage};
    use crate::FormatError;

    fn shader() -> BgfxShader {
        BgfxShader {
            tag: WrapperTag::Fragment,
            hash: 0x1122_3344_5566_7788,
            uniforms: vec![BgfxUniform {
                name: "u_Time".to_owned(),
                type_bits: 2,
                count: 1,
                reg_index: 4,
                reg_count: 1,
            }],
            group_size: [0; 3],
            shader_bytes: vec![0xAA; 24],
            layout: Some(VertexLayout {
                attributes: vec![1, 5, 9],
                size: 20,
            }),
        }
    }

    fn round_trip(
        shader: &BgfxShader,
        platform: ShaderPlatform,
        stage: ShaderStage,
    ) -> (Vec<u8>, BgfxShader) {
        let mut writer = Writer::new();
        shader.write(&mut writer, platform, stage);
        let bytes = writer.finish();

        let mut reader = Reader::new(&bytes);
        let decoded = BgfxShader::read(&mut reader, platform, stage).unwrap();
        assert!(reader.is_empty());
        (bytes, decoded)
    }

    #[test]
    fn fragment_round_trip() {
        let value = shader();
        let (bytes, decoded) = round_trip(&value, ShaderPlatform::Vulkan, ShaderStage::Fragment);
        assert_eq!(decoded, value);

        // And byte-exact the other way round.
        let mut writer = Writer::new();
        decoded.write(&mut writer, ShaderPlatform::Vulkan, ShaderStage::Fragment);
        assert_eq!(writer.finish(), bytes);
    }

    #[test]
    fn metal_compute_carries_group_size() {
        let mut value = shader();
        value.tag = WrapperTag::Compute;
        value.group_size = [8, 8, 1];
        value.layout = None;

        let (_, decoded) = round_trip(&value, ShaderPlatform::Metal, ShaderStage::Compute);
        assert_eq!(decoded.group_size, [8, 8, 1]);

        // The same wrapper targeted at a non-Metal platform does not
        // serialize the group size.
        let mut metal = Writer::new();
        value.write(&mut metal, ShaderPlatform::Metal, ShaderStage::Compute);
        let mut vulkan = Writer::new();
        value.write(&mut vulkan, ShaderPlatform::Vulkan, ShaderStage::Compute);
        assert_eq!(metal.len(), vulkan.len() + 6);
    }

    #[test]
    fn missing_layout_block_reads_as_none() {
        let mut value = shader();
        value.layout = None;
        let (_, decoded) = round_trip(&value, ShaderPlatform::Vulkan, ShaderStage::Fragment);
        assert_eq!(decoded.layout, None);
    }

    #[test]
    fn rejects_unknown_tag() {
        let mut writer = Writer::new();
        writer.write_bytes(b"XSH");
        writer.write_u8(5);
        let bytes = writer.finish();

        let err = BgfxShader::read(
            &mut Reader::new(&bytes),
            ShaderPlatform::Vulkan,
            ShaderStage::Fragment,
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::WrapperTag(_)));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut writer = Writer::new();
        writer.write_bytes(b"CSH");
        writer.write_u8(5);
        let bytes = writer.finish();

        let err = BgfxShader::read(
            &mut Reader::new(&bytes),
            ShaderPlatform::Vulkan,
            ShaderStage::Compute,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FormatError::WrapperVersion { tag: "CSH", version: 5 }
        ));
    }

    #[test]
    fn unknown_stage_has_no_tag() {
        assert!(matches!(
            BgfxShader::new(ShaderStage::Unknown, Vec::new()).unwrap_err(),
            FormatError::UntaggedStage(ShaderStage::Unknown)
        ));
    }
}
