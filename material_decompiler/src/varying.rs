//! Varying-definition restoration.
//!
//! A material does not store the `varying.def` file its shaders were built
//! against, but it does store every shader's input metadata. Formatting
//! those inputs per platform and collapsing the per-platform differences
//! through the decompiler reconstructs a single definition file guarded by
//! shader-language conditionals.

use std::time::Duration;

use material_format::enums::{ShaderPlatform, ShaderStage};
use material_format::input::ShaderInput;
use material_format::Material;

use crate::synth::upper_snake;
use crate::{decompile, DecompileOptions, DecompiledSource, DecompilerError, InputVariant};

/// The shader-language symbol and version a platform compiles under.
fn shader_language(platform: ShaderPlatform) -> (&'static str, u32) {
    use ShaderPlatform as P;

    match platform {
        P::Direct3DSm40 => ("HLSL", 400),
        P::Direct3DSm50 | P::Direct3DXb1 => ("HLSL", 500),
        P::Direct3DSm60 | P::Direct3DXbx => ("HLSL", 600),
        P::Direct3DSm65 => ("HLSL", 650),
        P::Glsl120 => ("GLSL", 120),
        P::Glsl430 => ("GLSL", 430),
        P::Essl100 => ("GLSL", 100),
        P::Essl300 => ("GLSL", 300),
        P::Essl310 => ("GLSL", 310),
        P::Metal => ("METAL", 1),
        P::Vulkan | P::Nvn => ("SPIRV", 1),
        P::Pssl => ("PSSL", 1),
    }
}

/// Collects the per-platform input sets of one pass for a stage, ready
/// for [`restore`]. Inputs are deduplicated by name in first-seen order;
/// platforms without any input for the stage are omitted.
pub fn collect_inputs(
    material: &Material,
    pass_name: &str,
    stage: ShaderStage,
) -> Vec<(ShaderPlatform, Vec<ShaderInput>)> {
    let Some(pass) = material.pass(pass_name) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for platform in ShaderPlatform::ALL {
        let mut inputs: Vec<ShaderInput> = Vec::new();
        for variant in pass.variants.iter().filter(|v| v.is_supported) {
            if let Some(shader) = variant.shader(*platform, stage) {
                for input in &shader.inputs {
                    if !inputs.iter().any(|i| i.name == input.name) {
                        inputs.push(input.clone());
                    }
                }
            }
        }

        if !inputs.is_empty() {
            out.push((*platform, inputs));
        }
    }

    out
}

/// Reconstructs one `varying.def` text from per-platform input sets.
pub fn restore(
    per_platform: &[(ShaderPlatform, Vec<ShaderInput>)],
    search_timeout: Duration,
) -> Result<DecompiledSource, DecompilerError> {
    let variants: Vec<InputVariant> = per_platform
        .iter()
        .map(|(platform, inputs)| {
            let mut flags = indexmap::IndexMap::new();
            flags.insert("platform".to_owned(), platform.name().to_owned());
            InputVariant {
                code: format_block(inputs),
                flags,
            }
        })
        .collect();

    let options = DecompileOptions {
        preprocess: false,
        postprocess: false,
        search_timeout,
    };
    let mut source = decompile(&variants, &options)?;
    source.code = rewrite_platform_conditionals(&source.code, per_platform);
    source.used_macros.clear();

    Ok(source)
}

/// One aligned declaration line per input, attribute group first, then
/// instance data, then varyings.
fn format_block(inputs: &[ShaderInput]) -> String {
    let groups: [&str; 3] = ["a_", "i_", "v_"];

    let mut ordered: Vec<&ShaderInput> = Vec::with_capacity(inputs.len());
    for prefix in groups {
        ordered.extend(inputs.iter().filter(|i| i.name.starts_with(prefix)));
    }
    ordered.extend(
        inputs
            .iter()
            .filter(|i| !groups.iter().any(|p| i.name.starts_with(p))),
    );

    let prefix_of = |input: &ShaderInput| -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(precision) = input.precision {
            let keyword = precision.keyword();
            if !keyword.is_empty() {
                parts.push(keyword);
            }
        }
        if let Some(interpolation) = input.interpolation {
            parts.push(interpolation.keyword());
        }
        parts.push(input.ty.name());
        let mut prefix = parts.join(" ");
        prefix.push(' ');
        prefix.push_str(&input.name);
        prefix
    };

    let group_of = |input: &ShaderInput| -> usize {
        groups
            .iter()
            .position(|p| input.name.starts_with(p))
            .unwrap_or(groups.len())
    };

    let mut widths = [0usize; 4];
    for input in &ordered {
        let group = group_of(input);
        widths[group] = widths[group].max(prefix_of(input).len());
    }

    let mut out = String::new();
    for input in ordered {
        let prefix = prefix_of(input);
        let width = widths[group_of(input)];
        out.push_str(&format!(
            "{prefix:<width$} : {};\n",
            input.semantic.label()
        ));
    }
    out
}

fn rewrite_platform_conditionals(
    code: &str,
    per_platform: &[(ShaderPlatform, Vec<ShaderInput>)],
) -> String {
    let mut code = code.to_owned();

    for (platform, _) in per_platform {
        let macro_name = upper_snake(&format!("platform{}", platform.name()));
        let (language, version) = shader_language(*platform);
        let test = format!("BGFX_SHADER_LANGUAGE_{language} == {version}");

        code = code.replace(&format!("#ifdef {macro_name}"), &format!("#if {test}"));
        code = code.replace(&format!("#ifndef {macro_name}"), &format!("#if !({test})"));
        code = code.replace(&format!("defined({macro_name})"), &format!("({test})"));
    }

    code
}
