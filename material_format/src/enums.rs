use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EnumError {
    #[error("unknown {kind} name: {name:?}")]
    UnknownName { kind: &'static str, name: String },
    #[error("invalid {kind} value: {value}")]
    InvalidValue { kind: &'static str, value: u64 },
    #[error("platform {platform} has no wire index under version {version}")]
    PlatformNotEncodable { platform: &'static str, version: u64 },
}

macro_rules! catalog {
    ($ty:ident, $kind:literal, $($variant:ident = $value:literal => $name:literal),*$(,)?) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $ty {
            $($variant = $value,)*
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.name())
            }
        }

        impl $ty {
            pub const KIND: &'static str = $kind;

            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Result<Self, EnumError> {
                match name {
                    $($name => Ok(Self::$variant),)*
                    _ => Err(EnumError::UnknownName {
                        kind: $kind,
                        name: name.to_owned(),
                    }),
                }
            }

            pub fn from_value(value: u8) -> Result<Self, EnumError> {
                match value {
                    $($value => Ok(Self::$variant),)*
                    _ => Err(EnumError::InvalidValue {
                        kind: $kind,
                        value: value as u64,
                    }),
                }
            }
        }
    };
}

catalog!(ShaderStage, "shader stage",
    Vertex = 0 => "Vertex",
    Fragment = 1 => "Fragment",
    Compute = 2 => "Compute",
    Unknown = 3 => "Unknown",
);

catalog!(ShaderPlatform, "shader platform",
    Direct3DSm40 = 0 => "Direct3D_SM40",
    Direct3DSm50 = 1 => "Direct3D_SM50",
    Direct3DSm60 = 2 => "Direct3D_SM60",
    Direct3DSm65 = 3 => "Direct3D_SM65",
    Direct3DXb1 = 4 => "Direct3D_XB1",
    Direct3DXbx = 5 => "Direct3D_XBX",
    Glsl120 = 6 => "GLSL_120",
    Glsl430 = 7 => "GLSL_430",
    Essl100 = 8 => "ESSL_100",
    Essl300 = 9 => "ESSL_300",
    Essl310 = 10 => "ESSL_310",
    Metal = 11 => "Metal",
    Vulkan = 12 => "Vulkan",
    Nvn = 13 => "Nvn",
    Pssl = 14 => "PSSL",
);

catalog!(BufferAccess, "buffer access",
    Undefined = 0 => "Undefined",
    Readonly = 1 => "Readonly",
    Writeonly = 2 => "Writeonly",
    Readwrite = 3 => "Readwrite",
);

catalog!(Precision, "precision",
    None = 0 => "None",
    Lowp = 1 => "Lowp",
    Mediump = 2 => "Mediump",
    Highp = 3 => "Highp",
);

catalog!(BufferType, "buffer type",
    Texture2D = 0 => "Texture2D",
    Texture2DArray = 1 => "Texture2DArray",
    External2D = 2 => "External2D",
    Texture3D = 3 => "Texture3D",
    TextureCube = 4 => "TextureCube",
    TextureCubeArray = 5 => "TextureCubeArray",
    StructBuffer = 6 => "StructBuffer",
    RawBuffer = 7 => "RawBuffer",
    AccelerationStructure = 8 => "AccelerationStructure",
    Shadow2D = 9 => "Shadow2D",
    Shadow2DArray = 10 => "Shadow2DArray",
);

catalog!(UniformType, "uniform type",
    Vec4 = 2 => "Vec4",
    Mat3 = 3 => "Mat3",
    Mat4 = 4 => "Mat4",
    External = 5 => "External",
);

catalog!(BlendMode, "blend mode",
    None = 0 => "None",
    Replace = 1 => "Replace",
    AlphaBlend = 2 => "AlphaBlend",
    ColorBlendAlphaAdd = 3 => "ColorBlendAlphaAdd",
    PreMultiplied = 4 => "PreMultiplied",
    InvertColor = 5 => "InvertColor",
    Additive = 6 => "Additive",
    AdditiveAlpha = 7 => "AdditiveAlpha",
    Multiply = 8 => "Multiply",
    MultiplyBoth = 9 => "MultiplyBoth",
    InverseSrcAlpha = 10 => "InverseSrcAlpha",
    SrcAlpha = 11 => "SrcAlpha",
);

catalog!(InputType, "input type",
    Float = 0 => "float",
    Vec2 = 1 => "vec2",
    Vec3 = 2 => "vec3",
    Vec4 = 3 => "vec4",
    Int = 4 => "int",
    IVec2 = 5 => "ivec2",
    IVec3 = 6 => "ivec3",
    IVec4 = 7 => "ivec4",
    UInt = 8 => "uint",
    UVec2 = 9 => "uvec2",
    UVec3 = 10 => "uvec3",
    UVec4 = 11 => "uvec4",
    Mat4 = 12 => "mat4",
);

catalog!(SemanticIndex, "input semantic",
    Position = 0 => "POSITION",
    Normal = 1 => "NORMAL",
    Tangent = 2 => "TANGENT",
    Bitangent = 3 => "BITANGENT",
    Color = 4 => "COLOR",
    BlendIndices = 5 => "BLENDINDICES",
    BlendWeight = 6 => "BLENDWEIGHT",
    TexCoord = 7 => "TEXCOORD",
    Unknown = 8 => "UNKNOWN",
    FrontFacing = 9 => "FRONTFACING",
);

catalog!(Interpolation, "interpolation",
    Flat = 0 => "Flat",
    Smooth = 1 => "Smooth",
    Noperspective = 2 => "Noperspective",
    Centroid = 3 => "Centroid",
);

catalog!(SamplerFilter, "sampler filter",
    Point = 0 => "Point",
    Bilinear = 1 => "Bilinear",
);

catalog!(SamplerWrap, "sampler wrap",
    Clamp = 0 => "Clamp",
    Repeat = 1 => "Repeat",
);

impl Precision {
    /// GLSL source keyword, empty for [`Precision::None`].
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Lowp => "lowp",
            Self::Mediump => "mediump",
            Self::Highp => "highp",
        }
    }
}

impl Interpolation {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Smooth => "smooth",
            Self::Noperspective => "noperspective",
            Self::Centroid => "centroid",
        }
    }
}

/// Container version, restricted to the supported range.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct ContainerVersion(u64);

impl ContainerVersion {
    pub const MIN: Self = Self(22);
    pub const LATEST: Self = Self(25);

    pub fn new(version: u64) -> Option<Self> {
        (22..=25).contains(&version).then_some(Self(version))
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The game release that introduced this container version.
    pub fn release_label(&self) -> &'static str {
        match self.0 {
            22 => "1.19.60",
            23 => "1.20.0",
            24 => "1.20.10",
            _ => "1.20.20",
        }
    }

    pub fn has_framebuffer_binding(&self) -> bool {
        self.0 >= 23
    }

    pub fn has_texture_path(&self) -> bool {
        self.0 >= 24
    }

    /// Number of wire platform slots, which is also the length of the
    /// supported-platforms bitstring.
    pub fn platform_count(&self) -> usize {
        Self::platform_table(*self).len()
    }

    fn platform_table(version: Self) -> &'static [ShaderPlatform] {
        use ShaderPlatform as P;

        // ESSL_300 lost its slot in version 25; ESSL_100 predates the
        // supported version range and has no slot in either table.
        const LEGACY: [ShaderPlatform; 14] = [
            P::Direct3DSm40,
            P::Direct3DSm50,
            P::Direct3DSm60,
            P::Direct3DSm65,
            P::Direct3DXb1,
            P::Direct3DXbx,
            P::Glsl120,
            P::Glsl430,
            P::Essl300,
            P::Essl310,
            P::Metal,
            P::Vulkan,
            P::Nvn,
            P::Pssl,
        ];
        const CURRENT: [ShaderPlatform; 13] = [
            P::Direct3DSm40,
            P::Direct3DSm50,
            P::Direct3DSm60,
            P::Direct3DSm65,
            P::Direct3DXb1,
            P::Direct3DXbx,
            P::Glsl120,
            P::Glsl430,
            P::Essl310,
            P::Metal,
            P::Vulkan,
            P::Nvn,
            P::Pssl,
        ];

        if version.0 <= 24 {
            &LEGACY
        } else {
            &CURRENT
        }
    }
}

impl ShaderPlatform {
    /// The platform actually emitted when targeting `version`.
    ///
    /// Version 25 dropped the ESSL_300 wire slot; writing it is allowed and
    /// produces ESSL_310.
    pub fn canonical(self, version: ContainerVersion) -> Self {
        if self == Self::Essl300 && version.get() >= 25 {
            Self::Essl310
        } else {
            self
        }
    }

    pub fn wire_index(self, version: ContainerVersion) -> Result<u8, EnumError> {
        let canonical = self.canonical(version);

        ContainerVersion::platform_table(version)
            .iter()
            .position(|p| *p == canonical)
            .map(|i| i as u8)
            .ok_or(EnumError::PlatformNotEncodable {
                platform: self.name(),
                version: version.get(),
            })
    }

    pub fn from_wire(index: u8, version: ContainerVersion) -> Result<Self, EnumError> {
        ContainerVersion::platform_table(version)
            .get(index as usize)
            .copied()
            .ok_or(EnumError::InvalidValue {
                kind: Self::KIND,
                value: index as u64,
            })
    }
}

/// Container encryption mode, stored on disk as a reversed 4-byte ASCII tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Encryption {
    None,
    SimplePassphrase,
    KeyPair,
}

impl Encryption {
    pub fn tag(&self) -> [u8; 4] {
        match self {
            Self::None => *b"NONE",
            Self::SimplePassphrase => *b"SMPL",
            Self::KeyPair => *b"KYPR",
        }
    }

    /// The on-disk byte order of [`Encryption::tag`].
    pub fn wire_tag(&self) -> [u8; 4] {
        let mut tag = self.tag();
        tag.reverse();
        tag
    }

    pub fn from_wire_tag(wire: [u8; 4]) -> Option<Self> {
        let mut tag = wire;
        tag.reverse();

        match &tag {
            b"NONE" => Some(Self::None),
            b"SMPL" => Some(Self::SimplePassphrase),
            b"KYPR" => Some(Self::KeyPair),
            _ => None,
        }
    }
}
