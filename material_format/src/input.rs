use crate::cursor::{Reader, Writer};
use crate::enums::{InputType, Interpolation, Precision, SemanticIndex};
use crate::FormatError;

/// Vertex attribute or varying metadata attached to a shader.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ShaderInput {
    pub name: String,
    pub ty: InputType,
    pub semantic: Semantic,
    pub per_instance: bool,
    pub precision: Option<Precision>,
    pub interpolation: Option<Interpolation>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Semantic {
    pub index: SemanticIndex,
    pub sub_index: u8,
}

impl Semantic {
    /// `TEXCOORD4` style spelling; the sub index is omitted when zero.
    pub fn label(&self) -> String {
        if self.sub_index == 0 {
            self.index.name().to_owned()
        } else {
            format!("{}{}", self.index.name(), self.sub_index)
        }
    }
}

impl ShaderInput {
    /// Reads the fields following the input's name, which the enclosing
    /// shader definition reads itself.
    pub fn read(reader: &mut Reader<'_>, name: String) -> Result<Self, FormatError> {
        let ty = InputType::from_value(reader.read_u8()?)?;
        let semantic = Semantic {
            index: SemanticIndex::from_value(reader.read_u8()?)?,
            sub_index: reader.read_u8()?,
        };
        let per_instance = reader.read_bool()?;

        let precision = if reader.read_bool()? {
            Some(Precision::from_value(reader.read_u8()?)?)
        } else {
            None
        };

        let interpolation = if reader.read_bool()? {
            Some(Interpolation::from_value(reader.read_u8()?)?)
        } else {
            None
        };

        Ok(Self {
            name,
            ty,
            semantic,
            per_instance,
            precision,
            interpolation,
        })
    }

    pub fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.ty as u8);
        writer.write_u8(self.semantic.index as u8);
        writer.write_u8(self.semantic.sub_index);
        writer.write_bool(self.per_instance);

        writer.write_bool(self.precision.is_some());
        if let Some(precision) = self.precision {
            writer.write_u8(precision as u8);
        }

        writer.write_bool(self.interpolation.is_some());
        if let Some(interpolation) = self.interpolation {
            writer.write_u8(interpolation as u8);
        }
    }
}
