use indexmap::IndexMap;
use material_format::bgfx::{BgfxShader, BgfxUniform, VertexLayout};
use material_format::buffer::MaterialBuffer;
use material_format::cursor::Writer;
use material_format::enums::{
    BlendMode, BufferAccess, BufferType, ContainerVersion, Encryption, InputType, Interpolation,
    Precision, SemanticIndex, ShaderPlatform, ShaderStage, UniformType,
};
use material_format::input::{Semantic, ShaderInput};
use material_format::material::{Material, PassphraseSecret};
use material_format::pass::{Pass, SupportedPlatforms, Variant};
use material_format::shader::ShaderDefinition;
use material_format::uniform::Uniform;
use material_format::{IDENTIFIER, MAGIC};

/// A material with every field populated, valid for `version`.
fn sample_material(version: u64) -> Material {
    let version = ContainerVersion::new(version).unwrap();

    let buffer = MaterialBuffer {
        name: "s_LightMap".to_owned(),
        reg1: 5,
        reg2: 5,
        access: BufferAccess::Readonly,
        precision: Precision::Mediump,
        unordered_access: false,
        ty: BufferType::Texture2D,
        texture_format: "rgba8".to_owned(),
        always_one: 1,
        sampler_state: None,
        default_texture: Some("textures/lightmap".to_owned()),
        texture_path: version.has_texture_path().then(|| "textures".to_owned()),
        custom_type_info: None,
    };

    let uniform = Uniform {
        name: "u_TintColor".to_owned(),
        ty: UniformType::Vec4,
        count: 1,
        default: Some(vec![1.0, 1.0, 1.0, 1.0]),
    };

    let platform = if version.get() >= 25 {
        ShaderPlatform::Essl310
    } else {
        ShaderPlatform::Essl300
    };

    let shader = ShaderDefinition {
        stage: ShaderStage::Fragment,
        platform,
        inputs: vec![ShaderInput {
            name: "v_color0".to_owned(),
            ty: InputType::Vec4,
            semantic: Semantic {
                index: SemanticIndex::Color,
                sub_index: 0,
            },
            per_instance: false,
            precision: Some(Precision::Highp),
            interpolation: Some(Interpolation::Smooth),
        }],
        hash: 0x1357_9BDF_0246_8ACE,
        shader: BgfxShader {
            tag: material_format::bgfx::WrapperTag::Fragment,
            hash: 77,
            uniforms: vec![BgfxUniform {
                name: "u_TintColor".to_owned(),
                type_bits: 2,
                count: 1,
                reg_index: 0,
                reg_count: 1,
            }],
            group_size: [0; 3],
            shader_bytes: vec![0x42; 64],
            layout: Some(VertexLayout {
                attributes: vec![0, 4],
                size: 16,
            }),
        },
    };

    let mut flags = IndexMap::new();
    flags.insert("Fancy".to_owned(), "On".to_owned());

    let mut supported_platforms = SupportedPlatforms::all();
    supported_platforms.set(ShaderPlatform::Essl100, false);
    if version.get() >= 25 {
        supported_platforms.set(ShaderPlatform::Essl300, false);
    }

    let mut uniform_overrides = IndexMap::new();
    uniform_overrides.insert("u_TintColor".to_owned(), "u_OverrideTint".to_owned());

    Material {
        version,
        name: "ActorTinted".to_owned(),
        encryption: Encryption::None,
        parent: "Actor".to_owned(),
        buffers: vec![buffer],
        uniforms: vec![uniform],
        uniform_overrides,
        passes: vec![Pass {
            name: "Opaque".to_owned(),
            supported_platforms,
            fallback_pass: String::new(),
            default_blend_mode: Some(BlendMode::Replace),
            default_variant: IndexMap::new(),
            framebuffer_binding: u32::from(version.has_framebuffer_binding()),
            variants: vec![Variant {
                is_supported: true,
                flags,
                shaders: vec![shader],
            }],
        }],
        secret: None,
    }
}

#[test]
fn stub_container_bytes_round_trip() {
    // An empty named material written out by hand, field for field.
    let mut writer = Writer::new();
    writer.write_u64(MAGIC);
    writer.write_string(IDENTIFIER);
    writer.write_u64(25);
    writer.write_bytes(b"ENON");
    writer.write_string("RTXStub");
    writer.write_u8(0); // no parent
    writer.write_u8(0); // buffers
    writer.write_u16(0); // uniforms
    writer.write_u16(0); // overrides, present because not Core/Builtins
    writer.write_u16(0); // passes
    writer.write_u64(MAGIC);
    let bytes = writer.finish();

    assert_eq!(&bytes[..8], 168_942_106u64.to_le_bytes());

    let material = Material::read(&bytes).unwrap();
    assert_eq!(material.name, "RTXStub");
    assert_eq!(material.version.get(), 25);
    assert_eq!(material.write().unwrap(), bytes);
}

#[test]
fn structural_round_trip_all_versions() {
    for version in 22..=25 {
        let material = sample_material(version);
        let bytes = material.write().unwrap();
        let decoded = Material::read(&bytes).unwrap();
        assert_eq!(decoded, material, "version {version}");
        assert_eq!(decoded.write().unwrap(), bytes, "version {version}");
    }
}

#[test]
fn legacy_essl_300_survives_byte_exact() {
    // A v24 container holding an ESSL_300 shader keeps wire index 8 across
    // read and write.
    let material = sample_material(24);
    let bytes = material.write().unwrap();

    let decoded = Material::read(&bytes).unwrap();
    let shader = &decoded.passes[0].variants[0].shaders[0];
    assert_eq!(shader.platform, ShaderPlatform::Essl300);
    assert_eq!(decoded.write().unwrap(), bytes);
}

#[test]
fn essl_300_targeted_at_current_version_reads_as_essl_310() {
    let mut material = sample_material(25);
    material.passes[0].variants[0].shaders[0].platform = ShaderPlatform::Essl300;

    let bytes = material.write().unwrap();
    let decoded = Material::read(&bytes).unwrap();
    assert_eq!(
        decoded.passes[0].variants[0].shaders[0].platform,
        ShaderPlatform::Essl310
    );

    // Writing the decoded material reproduces the bytes: the
    // canonicalization is idempotent.
    assert_eq!(decoded.write().unwrap(), bytes);
}

#[test]
fn encrypted_container_round_trip() {
    let mut material = sample_material(25);
    material.encryption = Encryption::SimplePassphrase;
    material.secret = Some(PassphraseSecret {
        key: (0u8..32).collect(),
        nonce: (100u8..112).collect(),
    });

    let bytes = material.write().unwrap();
    let decoded = Material::read(&bytes).unwrap();
    assert_eq!(decoded, material);
    assert_eq!(decoded.write().unwrap(), bytes);
}
