use crate::cursor::{Reader, Writer};
use crate::enums::{EnumError, UniformType};
use crate::FormatError;

/// A material-level shader uniform with an optional default value.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Uniform {
    pub name: String,
    pub ty: UniformType,
    /// Array element count. Not on the wire for [`UniformType::External`].
    pub count: u32,
    /// Default value words, 4/9/16 by type.
    pub default: Option<Vec<f32>>,
}

impl UniformType {
    /// Number of f32 words in a default value of this type.
    pub fn word_count(&self) -> usize {
        match self {
            Self::Vec4 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
            Self::External => 0,
        }
    }
}

impl Uniform {
    pub fn read(reader: &mut Reader<'_>) -> Result<Self, FormatError> {
        let name = reader.read_string()?;
        let raw = reader.read_u16()?;
        let value = u8::try_from(raw).map_err(|_| EnumError::InvalidValue {
            kind: UniformType::KIND,
            value: raw as u64,
        })?;
        let ty = UniformType::from_value(value)?;

        if ty == UniformType::External {
            return Ok(Self {
                name,
                ty,
                count: 0,
                default: None,
            });
        }

        let count = reader.read_u32()?;
        let default = if reader.read_bool()? {
            Some(reader.read_f32_array(ty.word_count())?)
        } else {
            None
        };

        Ok(Self {
            name,
            ty,
            count,
            default,
        })
    }

    pub fn write(&self, writer: &mut Writer) {
        writer.write_string(&self.name);
        writer.write_u16(self.ty as u16);

        if self.ty == UniformType::External {
            return;
        }

        writer.write_u32(self.count);
        writer.write_bool(self.default.is_some());
        if let Some(default) = &self.default {
            writer.write_f32_array(default);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Uniform;
    use crate::cursor::{Reader, Writer};
    use crate::enums::UniformType;

    fn round_trip(uniform: &Uniform) -> Uniform {
        let mut writer = Writer::new();
        uniform.write(&mut writer);
        let bytes = writer.finish();

        let mut reader = Reader::new(&bytes);
        let decoded = Uniform::read(&mut reader).unwrap();
        assert!(reader.is_empty());
        decoded
    }

    #[test]
    fn vec4_with_default() {
        let uniform = Uniform {
            name: "u_FogColor".to_owned(),
            ty: UniformType::Vec4,
            count: 1,
            default: Some(vec![0.0, 0.25, 0.5, 1.0]),
        };
        assert_eq!(round_trip(&uniform), uniform);
    }

    #[test]
    fn mat4_without_default() {
        let uniform = Uniform {
            name: "u_World".to_owned(),
            ty: UniformType::Mat4,
            count: 4,
            default: None,
        };
        assert_eq!(round_trip(&uniform), uniform);
    }

    #[test]
    fn external_carries_no_count() {
        let uniform = Uniform {
            name: "u_ViewProj".to_owned(),
            ty: UniformType::External,
            count: 0,
            default: None,
        };

        let mut writer = Writer::new();
        uniform.write(&mut writer);
        // string + u16 type, nothing else
        assert_eq!(writer.len(), 4 + uniform.name.len() + 2);
        assert_eq!(round_trip(&uniform), uniform);
    }
}
