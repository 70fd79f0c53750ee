//! Compiled-material container format.
//!
//! Bit-exact reader and writer for the material containers consumed by the
//! game's rendering backend, versions 22 through 25. A container stores one
//! named material: its GPU resource bindings, uniforms and render passes,
//! where every pass holds one shader variant per feature-flag combination.

pub mod bgfx;
pub mod buffer;
pub mod cursor;
pub mod encryption;
pub mod enums;
pub mod input;
pub mod material;
pub mod pass;
pub mod shader;
pub mod uniform;

use thiserror::Error;

use crate::cursor::CursorError;
use crate::encryption::EncryptionError;
use crate::enums::EnumError;

/// Magic sentinel framing every container.
pub const MAGIC: u64 = 168_942_106;

/// ASCII identifier following the leading magic.
pub const IDENTIFIER: &str = "RenderDragon.CompiledMaterialDefinition";

/// Material name whose serialized form carries no uniform-override block.
pub const BUILTINS_MATERIAL: &str = "Core/Builtins";

pub use crate::enums::{ContainerVersion, Encryption, ShaderPlatform, ShaderStage};
pub use crate::material::Material;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error(transparent)]
    Enum(#[from] EnumError),
    #[error(transparent)]
    Encryption(#[from] EncryptionError),
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u64),
    #[error("bad magic at offset {offset}: expected {expected:#x}, found {found:#x}")]
    BadMagic {
        offset: usize,
        expected: u64,
        found: u64,
    },
    #[error("bad container identifier: {0:?}")]
    BadIdentifier(String),
    #[error("stage name {name:?} does not match stage index {index}")]
    StageMismatch { name: String, index: u8 },
    #[error("platform name {name:?} does not match wire index {index}")]
    PlatformMismatch { name: String, index: u8 },
    #[error("invalid sampler state byte {0:#x}")]
    SamplerState(u8),
    #[error("invalid shader wrapper tag {0:?}")]
    WrapperTag([u8; 3]),
    #[error("invalid shader wrapper version {version} for tag {tag}")]
    WrapperVersion { tag: &'static str, version: u8 },
    #[error("shader wrapper pad byte is {0:#x}, expected 0")]
    WrapperPad(u8),
    #[error("stage {0:?} has no shader wrapper tag")]
    UntaggedStage(ShaderStage),
    #[error("material is marked {0:?} but carries no key and nonce")]
    MissingSecret(Encryption),
}
