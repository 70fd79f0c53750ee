use crate::bgfx::BgfxShader;
use crate::cursor::{Reader, Writer};
use crate::enums::{ContainerVersion, ShaderPlatform, ShaderStage};
use crate::input::ShaderInput;
use crate::FormatError;

/// One compiled shader of a variant: a (platform, stage) slot with its
/// input metadata and wrapped object code.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ShaderDefinition {
    pub stage: ShaderStage,
    pub platform: ShaderPlatform,
    pub inputs: Vec<ShaderInput>,
    pub hash: u64,
    pub shader: BgfxShader,
}

impl ShaderDefinition {
    pub fn read(reader: &mut Reader<'_>, version: ContainerVersion) -> Result<Self, FormatError> {
        let stage_name = reader.read_string()?;
        let platform_name = reader.read_string()?;
        let stage_index = reader.read_u8()?;
        let platform_index = reader.read_u8()?;

        // The name and the index fields are redundant on the wire; they
        // must agree, with the platform index interpreted under the
        // container version.
        let stage = ShaderStage::from_name(&stage_name)?;
        if stage as u8 != stage_index {
            return Err(FormatError::StageMismatch {
                name: stage_name,
                index: stage_index,
            });
        }

        let platform = ShaderPlatform::from_name(&platform_name)?;
        if ShaderPlatform::from_wire(platform_index, version)? != platform {
            return Err(FormatError::PlatformMismatch {
                name: platform_name,
                index: platform_index,
            });
        }

        let input_count = reader.read_u16()?;
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            let name = reader.read_string()?;
            inputs.push(ShaderInput::read(reader, name)?);
        }

        let hash = reader.read_u64()?;

        let wrapper_bytes = reader.read_array()?;
        let mut wrapper_reader = Reader::new(wrapper_bytes);
        let shader = BgfxShader::read(&mut wrapper_reader, platform, stage)?;

        Ok(Self {
            stage,
            platform,
            inputs,
            hash,
            shader,
        })
    }

    pub fn write(
        &self,
        writer: &mut Writer,
        version: ContainerVersion,
    ) -> Result<(), FormatError> {
        let platform = self.platform.canonical(version);
        let platform_index = platform.wire_index(version)?;

        writer.write_string(self.stage.name());
        writer.write_string(platform.name());
        writer.write_u8(self.stage as u8);
        writer.write_u8(platform_index);

        writer.write_u16(self.inputs.len() as u16);
        for input in &self.inputs {
            writer.write_string(&input.name);
            input.write(writer);
        }

        writer.write_u64(self.hash);

        let mut wrapper = Writer::new();
        self.shader.write(&mut wrapper, platform, self.stage);
        writer.write_array(&wrapper.finish());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ShaderDefinition;
    use crate::bgfx::BgfxShader;
    use crate::cursor::{Reader, Writer};
    use crate::enums::{ContainerVersion, ShaderPlatform, ShaderStage};
    use crate::FormatError;

    fn definition(platform: ShaderPlatform) -> ShaderDefinition {
        ShaderDefinition {
            stage: ShaderStage::Fragment,
            platform,
            inputs: Vec::new(),
            hash: 0xABCD_EF01_2345_6789,
            shader: BgfxShader::new(ShaderStage::Fragment, vec![1, 2, 3, 4]).unwrap(),
        }
    }

    fn write(definition: &ShaderDefinition, version: ContainerVersion) -> Vec<u8> {
        let mut writer = Writer::new();
        definition.write(&mut writer, version).unwrap();
        writer.finish()
    }

    #[test]
    fn round_trip() {
        let version = ContainerVersion::new(24).unwrap();
        let value = definition(ShaderPlatform::Essl300);
        let bytes = write(&value, version);

        let mut reader = Reader::new(&bytes);
        let decoded = ShaderDefinition::read(&mut reader, version).unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded, value);
    }

    #[test]
    fn essl_300_written_as_essl_310_in_current_versions() {
        let version = ContainerVersion::LATEST;
        let bytes = write(&definition(ShaderPlatform::Essl300), version);

        let decoded = ShaderDefinition::read(&mut Reader::new(&bytes), version).unwrap();
        assert_eq!(decoded.platform, ShaderPlatform::Essl310);

        // The emitted name is the canonical one, not ESSL_300.
        let mut reader = Reader::new(&bytes);
        reader.read_string().unwrap();
        assert_eq!(reader.read_string().unwrap(), "ESSL_310");
    }

    #[test]
    fn rejects_stage_disagreement() {
        let version = ContainerVersion::LATEST;
        let mut bytes = write(&definition(ShaderPlatform::Vulkan), version);

        // Stage index directly follows the two strings.
        let offset = (4 + "Fragment".len()) + (4 + "Vulkan".len());
        bytes[offset] = ShaderStage::Compute as u8;

        let err = ShaderDefinition::read(&mut Reader::new(&bytes), version).unwrap_err();
        assert!(matches!(err, FormatError::StageMismatch { .. }));
    }

    #[test]
    fn rejects_platform_disagreement() {
        let version = ContainerVersion::LATEST;
        let mut bytes = write(&definition(ShaderPlatform::Vulkan), version);

        let offset = (4 + "Fragment".len()) + (4 + "Vulkan".len()) + 1;
        bytes[offset] = ShaderPlatform::Metal.wire_index(version).unwrap();

        let err = ShaderDefinition::read(&mut Reader::new(&bytes), version).unwrap_err();
        assert!(matches!(err, FormatError::PlatformMismatch { .. }));
    }
}
