use indexmap::IndexMap;

use crate::buffer::MaterialBuffer;
use crate::cursor::{Reader, Writer};
use crate::encryption::{self, EncryptionError};
use crate::enums::{ContainerVersion, Encryption};
use crate::pass::Pass;
use crate::uniform::Uniform;
use crate::{FormatError, BUILTINS_MATERIAL, IDENTIFIER, MAGIC};

/// Key and nonce of a passphrase-encrypted container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassphraseSecret {
    pub key: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// The root entity: one named material and all of its passes.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Material {
    pub version: ContainerVersion,
    pub name: String,
    pub encryption: Encryption,
    pub parent: String,
    pub buffers: Vec<MaterialBuffer>,
    pub uniforms: Vec<Uniform>,
    /// Not on the wire for the `Core/Builtins` material.
    pub uniform_overrides: IndexMap<String, String>,
    pub passes: Vec<Pass>,
    /// Present exactly when `encryption` is
    /// [`Encryption::SimplePassphrase`]. Key material stays out of
    /// serialized inspection output.
    #[serde(skip)]
    pub secret: Option<PassphraseSecret>,
}

impl Material {
    pub fn read(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut reader = Reader::new(bytes);

        read_magic(&mut reader)?;

        let identifier = reader.read_string()?;
        if identifier != IDENTIFIER {
            return Err(FormatError::BadIdentifier(identifier));
        }

        let raw_version = reader.read_u64()?;
        let version = ContainerVersion::new(raw_version)
            .ok_or(FormatError::UnsupportedVersion(raw_version))?;

        let mut tag = [0; 4];
        tag.copy_from_slice(reader.read_bytes(4)?);
        let encryption =
            Encryption::from_wire_tag(tag).ok_or(EncryptionError::UnknownTag(tag))?;

        tracing::debug!(
            "reading material container version {} ({})",
            version.get(),
            version.release_label()
        );

        match encryption {
            Encryption::None => Self::read_body(&mut reader, version, encryption, None),
            Encryption::SimplePassphrase => {
                let key = reader.read_array()?.to_vec();
                let nonce = reader.read_array()?.to_vec();
                let ciphertext = reader.read_array()?;

                let body = encryption::crypt(&key, &nonce, ciphertext)?;
                let mut body_reader = Reader::new(&body);
                Self::read_body(
                    &mut body_reader,
                    version,
                    encryption,
                    Some(PassphraseSecret { key, nonce }),
                )
            }
            Encryption::KeyPair => Err(EncryptionError::KeyPairUnsupported.into()),
        }
    }

    fn read_body(
        reader: &mut Reader<'_>,
        version: ContainerVersion,
        encryption: Encryption,
        secret: Option<PassphraseSecret>,
    ) -> Result<Self, FormatError> {
        let name = reader.read_string()?;

        let parent = if reader.read_bool()? {
            reader.read_string()?
        } else {
            String::new()
        };

        let buffer_count = reader.read_u8()?;
        let mut buffers = Vec::with_capacity(buffer_count as usize);
        for _ in 0..buffer_count {
            buffers.push(MaterialBuffer::read(reader, version)?);
        }

        let uniform_count = reader.read_u16()?;
        let mut uniforms = Vec::with_capacity(uniform_count as usize);
        for _ in 0..uniform_count {
            uniforms.push(Uniform::read(reader)?);
        }

        let mut uniform_overrides = IndexMap::new();
        if name != BUILTINS_MATERIAL {
            let override_count = reader.read_u16()?;
            for _ in 0..override_count {
                let key = reader.read_string()?;
                let value = reader.read_string()?;
                uniform_overrides.insert(key, value);
            }
        }

        let pass_count = reader.read_u16()?;
        let mut passes = Vec::with_capacity(pass_count as usize);
        for _ in 0..pass_count {
            passes.push(Pass::read(reader, version)?);
        }

        read_magic(reader)?;

        Ok(Self {
            version,
            name,
            encryption,
            parent,
            buffers,
            uniforms,
            uniform_overrides,
            passes,
            secret,
        })
    }

    pub fn write(&self) -> Result<Vec<u8>, FormatError> {
        let mut writer = Writer::new();
        writer.write_u64(MAGIC);
        writer.write_string(IDENTIFIER);
        writer.write_u64(self.version.get());
        writer.write_bytes(&self.encryption.wire_tag());

        let mut body = Writer::new();
        self.write_body(&mut body)?;
        let body = body.finish();

        match self.encryption {
            Encryption::None => writer.write_bytes(&body),
            Encryption::SimplePassphrase => {
                let secret = self
                    .secret
                    .as_ref()
                    .ok_or(FormatError::MissingSecret(self.encryption))?;

                writer.write_array(&secret.key);
                writer.write_array(&secret.nonce);
                writer.write_array(&encryption::crypt(&secret.key, &secret.nonce, &body)?);
            }
            Encryption::KeyPair => return Err(EncryptionError::KeyPairUnsupported.into()),
        }

        Ok(writer.finish())
    }

    fn write_body(&self, writer: &mut Writer) -> Result<(), FormatError> {
        writer.write_string(&self.name);

        writer.write_bool(!self.parent.is_empty());
        if !self.parent.is_empty() {
            writer.write_string(&self.parent);
        }

        writer.write_u8(self.buffers.len() as u8);
        for buffer in &self.buffers {
            buffer.write(writer, self.version);
        }

        writer.write_u16(self.uniforms.len() as u16);
        for uniform in &self.uniforms {
            uniform.write(writer);
        }

        if self.name != BUILTINS_MATERIAL {
            writer.write_u16(self.uniform_overrides.len() as u16);
            for (key, value) in &self.uniform_overrides {
                writer.write_string(key);
                writer.write_string(value);
            }
        }

        writer.write_u16(self.passes.len() as u16);
        for pass in &self.passes {
            pass.write(writer, self.version)?;
        }

        writer.write_u64(MAGIC);
        Ok(())
    }

    pub fn pass(&self, name: &str) -> Option<&Pass> {
        self.passes.iter().find(|p| p.name == name)
    }

    /// A copy with `pass` appended.
    pub fn with_pass(&self, pass: Pass) -> Self {
        let mut material = self.clone();
        material.passes.push(pass);
        material
    }

    /// A copy without the named pass.
    pub fn without_pass(&self, name: &str) -> Self {
        let mut material = self.clone();
        material.passes.retain(|p| p.name != name);
        material
    }

    /// The same conceptual material targeted at another container
    /// version. Version-conditional fields and platform indices are
    /// resolved by the writer, not here.
    pub fn retargeted(&self, version: ContainerVersion) -> Self {
        let mut material = self.clone();
        material.version = version;
        material
    }

    /// The register-binding defines other materials compile against:
    /// one `s_<BufferName>_REG = <slot>` pair per buffer.
    pub fn register_defines(&self) -> IndexMap<String, String> {
        self.buffers
            .iter()
            .map(|buffer| {
                (
                    format!("s_{}_REG", buffer.name.trim_start_matches("s_")),
                    buffer.reg1.to_string(),
                )
            })
            .collect()
    }
}

fn read_magic(reader: &mut Reader<'_>) -> Result<(), FormatError> {
    let offset = reader.offset();
    let found = reader.read_u64()?;
    if found != MAGIC {
        return Err(FormatError::BadMagic {
            offset,
            expected: MAGIC,
            found,
        });
    }
    Ok(())
}
