use crate::cursor::{Reader, Writer};
use crate::enums::{BufferAccess, BufferType, ContainerVersion, Precision, SamplerFilter, SamplerWrap};
use crate::FormatError;

/// A GPU resource binding of the material.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MaterialBuffer {
    pub name: String,
    pub reg1: u16,
    pub reg2: u8,
    pub access: BufferAccess,
    pub precision: Precision,
    pub unordered_access: bool,
    pub ty: BufferType,
    pub texture_format: String,
    /// Observed to be 1 in shipped containers, but round-tripped verbatim.
    pub always_one: u64,
    pub sampler_state: Option<SamplerState>,
    pub default_texture: Option<String>,
    /// Not on the wire before version 24.
    pub texture_path: Option<String>,
    pub custom_type_info: Option<CustomTypeInfo>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SamplerState {
    pub filter: SamplerFilter,
    pub wrap: SamplerWrap,
}

impl SamplerState {
    fn to_byte(self) -> u8 {
        self.filter as u8 | (self.wrap as u8) << 1
    }

    fn from_byte(byte: u8) -> Result<Self, FormatError> {
        if byte > 3 {
            return Err(FormatError::SamplerState(byte));
        }

        Ok(Self {
            filter: SamplerFilter::from_value(byte & 1)?,
            wrap: SamplerWrap::from_value(byte >> 1)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CustomTypeInfo {
    pub struct_name: String,
    pub size: u64,
}

impl MaterialBuffer {
    pub fn read(reader: &mut Reader<'_>, version: ContainerVersion) -> Result<Self, FormatError> {
        let name = reader.read_string()?;
        let reg1 = reader.read_u16()?;
        let access = BufferAccess::from_value(reader.read_u8()?)?;
        let precision = Precision::from_value(reader.read_u8()?)?;
        let unordered_access = reader.read_bool()?;
        let reg2 = reader.read_u8()?;
        let ty = BufferType::from_value(reader.read_u8()?)?;
        let texture_format = reader.read_string()?;
        let always_one = reader.read_u64()?;

        let sampler_state = if reader.read_bool()? {
            Some(SamplerState::from_byte(reader.read_u8()?)?)
        } else {
            None
        };

        let default_texture = if reader.read_bool()? {
            Some(reader.read_string()?)
        } else {
            None
        };

        let texture_path = if version.has_texture_path() && reader.read_bool()? {
            Some(reader.read_string()?)
        } else {
            None
        };

        let custom_type_info = if reader.read_bool()? {
            Some(CustomTypeInfo {
                struct_name: reader.read_string()?,
                size: reader.read_u64()?,
            })
        } else {
            None
        };

        Ok(Self {
            name,
            reg1,
            reg2,
            access,
            precision,
            unordered_access,
            ty,
            texture_format,
            always_one,
            sampler_state,
            default_texture,
            texture_path,
            custom_type_info,
        })
    }

    pub fn write(&self, writer: &mut Writer, version: ContainerVersion) {
        writer.write_string(&self.name);
        writer.write_u16(self.reg1);
        writer.write_u8(self.access as u8);
        writer.write_u8(self.precision as u8);
        writer.write_bool(self.unordered_access);
        writer.write_u8(self.reg2);
        writer.write_u8(self.ty as u8);
        writer.write_string(&self.texture_format);
        writer.write_u64(self.always_one);

        writer.write_bool(self.sampler_state.is_some());
        if let Some(state) = self.sampler_state {
            writer.write_u8(state.to_byte());
        }

        writer.write_bool(self.default_texture.is_some());
        if let Some(texture) = &self.default_texture {
            writer.write_string(texture);
        }

        if version.has_texture_path() {
            writer.write_bool(self.texture_path.is_some());
            if let Some(path) = &self.texture_path {
                writer.write_string(path);
            }
        }

        writer.write_bool(self.custom_type_info.is_some());
        if let Some(info) = &self.custom_type_info {
            writer.write_string(&info.struct_name);
            writer.write_u64(info.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CustomTypeInfo, MaterialBuffer, SamplerState};
    use crate::cursor::{Reader, Writer};
    use crate::enums::{
        BufferAccess, BufferType, ContainerVersion, Precision, SamplerFilter, SamplerWrap,
    };
    use crate::FormatError;

    fn buffer() -> MaterialBuffer {
        MaterialBuffer {
            name: "s_MatTexture".to_owned(),
            reg1: 3,
            reg2: 3,
            access: BufferAccess::Readonly,
            precision: Precision::Highp,
            unordered_access: false,
            ty: BufferType::Texture2D,
            texture_format: String::new(),
            always_one: 1,
            sampler_state: Some(SamplerState {
                filter: SamplerFilter::Bilinear,
                wrap: SamplerWrap::Repeat,
            }),
            default_texture: Some("textures/misc/white".to_owned()),
            texture_path: Some("textures/atlas".to_owned()),
            custom_type_info: None,
        }
    }

    #[test]
    fn round_trip() {
        let version = ContainerVersion::LATEST;
        let mut writer = Writer::new();
        buffer().write(&mut writer, version);
        let bytes = writer.finish();

        let mut reader = Reader::new(&bytes);
        let decoded = MaterialBuffer::read(&mut reader, version).unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded, buffer());
    }

    #[test]
    fn texture_path_gated_on_version() {
        let old = ContainerVersion::new(23).unwrap();
        let mut writer = Writer::new();
        buffer().write(&mut writer, old);
        let bytes = writer.finish();

        let decoded = MaterialBuffer::read(&mut Reader::new(&bytes), old).unwrap();
        assert_eq!(decoded.texture_path, None);
    }

    #[test]
    fn custom_type_info_round_trip() {
        let version = ContainerVersion::LATEST;
        let mut value = buffer();
        value.custom_type_info = Some(CustomTypeInfo {
            struct_name: "LightData".to_owned(),
            size: 48,
        });

        let mut writer = Writer::new();
        value.write(&mut writer, version);
        let bytes = writer.finish();
        let decoded = MaterialBuffer::read(&mut Reader::new(&bytes), version).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn sampler_state_rejects_high_bits() {
        assert!(matches!(
            SamplerState::from_byte(4).unwrap_err(),
            FormatError::SamplerState(4)
        ));
    }

    #[test]
    fn always_one_is_preserved_not_validated() {
        let version = ContainerVersion::LATEST;
        let mut value = buffer();
        value.always_one = 0xDEAD_BEEF;

        let mut writer = Writer::new();
        value.write(&mut writer, version);
        let bytes = writer.finish();
        let decoded = MaterialBuffer::read(&mut Reader::new(&bytes), version).unwrap();
        assert_eq!(decoded.always_one, 0xDEAD_BEEF);
    }
}
