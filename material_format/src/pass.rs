use indexmap::IndexMap;

use crate::cursor::{Reader, Writer};
use crate::enums::{BlendMode, ContainerVersion, EnumError, ShaderPlatform, ShaderStage};
use crate::shader::ShaderDefinition;
use crate::FormatError;

/// Per-platform support flags of a pass.
///
/// Serialized as a bitstring whose length is the number of wire platform
/// slots of the container version, most significant (highest slot) first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupportedPlatforms {
    bits: [bool; 15],
}

impl serde::Serialize for SupportedPlatforms {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(ShaderPlatform::ALL.len()))?;
        for platform in ShaderPlatform::ALL {
            map.serialize_entry(platform.name(), &self.is_supported(*platform))?;
        }
        map.end()
    }
}

impl SupportedPlatforms {
    pub fn none() -> Self {
        Self { bits: [false; 15] }
    }

    pub fn all() -> Self {
        Self { bits: [true; 15] }
    }

    pub fn is_supported(&self, platform: ShaderPlatform) -> bool {
        self.bits[platform as usize]
    }

    pub fn set(&mut self, platform: ShaderPlatform, supported: bool) {
        self.bits[platform as usize] = supported;
    }

    pub fn read(reader: &mut Reader<'_>, version: ContainerVersion) -> Result<Self, FormatError> {
        let bitstring = reader.read_string()?;

        if bitstring.bytes().any(|b| b != b'0' && b != b'1') {
            tracing::warn!("unrecognized platform bitstring {:?}, enabling all", bitstring);
            return Ok(Self::all());
        }

        let mut platforms = Self::none();
        // Rightmost character is wire slot 0; missing leading characters
        // are zeros, extra leading characters have no slot.
        for (slot, bit) in bitstring.bytes().rev().enumerate() {
            if bit == b'1' {
                if let Ok(platform) = ShaderPlatform::from_wire(slot as u8, version) {
                    platforms.set(platform, true);
                }
            }
        }

        Ok(platforms)
    }

    pub fn write(&self, writer: &mut Writer, version: ContainerVersion) {
        let count = version.platform_count();
        let mut bitstring = String::with_capacity(count);

        for slot in (0..count).rev() {
            // Table lookups over the version's own slot range cannot miss.
            let platform = ShaderPlatform::from_wire(slot as u8, version)
                .unwrap_or(ShaderPlatform::Direct3DSm40);
            bitstring.push(if self.is_supported(platform) { '1' } else { '0' });
        }

        writer.write_string(&bitstring);
    }
}

/// One flag combination of a pass and its per-(platform, stage) shaders.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Variant {
    pub is_supported: bool,
    pub flags: IndexMap<String, String>,
    pub shaders: Vec<ShaderDefinition>,
}

impl Variant {
    pub fn read(reader: &mut Reader<'_>, version: ContainerVersion) -> Result<Self, FormatError> {
        let is_supported = reader.read_bool()?;
        let flag_count = reader.read_u16()?;
        let shader_count = reader.read_u16()?;

        let mut flags = IndexMap::with_capacity(flag_count as usize);
        for _ in 0..flag_count {
            let key = reader.read_string()?;
            let value = reader.read_string()?;
            flags.insert(key, value);
        }

        let mut shaders = Vec::with_capacity(shader_count as usize);
        for _ in 0..shader_count {
            shaders.push(ShaderDefinition::read(reader, version)?);
        }

        Ok(Self {
            is_supported,
            flags,
            shaders,
        })
    }

    pub fn write(
        &self,
        writer: &mut Writer,
        version: ContainerVersion,
    ) -> Result<(), FormatError> {
        writer.write_bool(self.is_supported);
        writer.write_u16(self.flags.len() as u16);
        writer.write_u16(self.shaders.len() as u16);

        for (key, value) in &self.flags {
            writer.write_string(key);
            writer.write_string(value);
        }

        for shader in &self.shaders {
            shader.write(writer, version)?;
        }

        Ok(())
    }

    /// The shader for a (platform, stage) slot, if the variant carries one.
    pub fn shader(
        &self,
        platform: ShaderPlatform,
        stage: ShaderStage,
    ) -> Option<&ShaderDefinition> {
        self.shaders
            .iter()
            .find(|s| s.platform == platform && s.stage == stage)
    }
}

/// A render step of the material.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Pass {
    pub name: String,
    pub supported_platforms: SupportedPlatforms,
    pub fallback_pass: String,
    /// [`BlendMode::Unspecified`] is represented as an absent optional on
    /// the wire.
    pub default_blend_mode: Option<BlendMode>,
    pub default_variant: IndexMap<String, String>,
    /// Zero and not on the wire before version 23.
    pub framebuffer_binding: u32,
    pub variants: Vec<Variant>,
}

impl Pass {
    pub fn read(reader: &mut Reader<'_>, version: ContainerVersion) -> Result<Self, FormatError> {
        let name = reader.read_string()?;
        let supported_platforms = SupportedPlatforms::read(reader, version)?;
        let fallback_pass = reader.read_string()?;

        let default_blend_mode = if reader.read_bool()? {
            let raw = reader.read_u16()?;
            let value = u8::try_from(raw).map_err(|_| EnumError::InvalidValue {
                kind: BlendMode::KIND,
                value: raw as u64,
            })?;
            Some(BlendMode::from_value(value)?)
        } else {
            None
        };

        let default_variant_count = reader.read_u16()?;
        let mut default_variant = IndexMap::with_capacity(default_variant_count as usize);
        for _ in 0..default_variant_count {
            let key = reader.read_string()?;
            let value = reader.read_string()?;
            default_variant.insert(key, value);
        }

        let framebuffer_binding = if version.has_framebuffer_binding() {
            reader.read_u32()?
        } else {
            0
        };

        let variant_count = reader.read_u16()?;
        let mut variants = Vec::with_capacity(variant_count as usize);
        for _ in 0..variant_count {
            variants.push(Variant::read(reader, version)?);
        }

        Ok(Self {
            name,
            supported_platforms,
            fallback_pass,
            default_blend_mode,
            default_variant,
            framebuffer_binding,
            variants,
        })
    }

    pub fn write(
        &self,
        writer: &mut Writer,
        version: ContainerVersion,
    ) -> Result<(), FormatError> {
        writer.write_string(&self.name);
        self.supported_platforms.write(writer, version);
        writer.write_string(&self.fallback_pass);

        writer.write_bool(self.default_blend_mode.is_some());
        if let Some(blend_mode) = self.default_blend_mode {
            writer.write_u16(blend_mode as u16);
        }

        writer.write_u16(self.default_variant.len() as u16);
        for (key, value) in &self.default_variant {
            writer.write_string(key);
            writer.write_string(value);
        }

        if version.has_framebuffer_binding() {
            writer.write_u32(self.framebuffer_binding);
        }

        writer.write_u16(self.variants.len() as u16);
        for variant in &self.variants {
            variant.write(writer, version)?;
        }

        Ok(())
    }

    /// The variant whose flag map equals `flags` exactly.
    pub fn variant(&self, flags: &IndexMap<String, String>) -> Option<&Variant> {
        self.variants.iter().find(|v| &v.flags == flags)
    }
}
