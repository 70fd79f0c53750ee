//! Input normalization and the back-end text rewrite.
//!
//! Compiled GLSL variants carry back-end boilerplate (auto-registered
//! uniforms, IO declarations, expanded preprocessor output) that the
//! reconstruction replaces with the source-level pseudo-directives and
//! `*_AUTOREG(...)` macros the build understands.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

macro_rules! regex {
    ($name:ident, $pattern:literal) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).unwrap());
    };
}

regex!(BLOCK_COMMENT, r"(?s)/\*.*?\*/");
regex!(LINE_COMMENT, r"//[^\n]*");

regex!(VERTEX_MARKER, r"(?m)^#define varying out$");

regex!(UNIFORM_U, r"(?m)^uniform\s+[^;\n]*\bu_\w+[^;\n]*;[^\n]*\n?");
regex!(OUT_DECL, r"(?m)^out\s+[^;\n]*;[^\n]*\n?");
regex!(IF_BLOCK_SINGLE, r"(?m)^#if[^\n]*#endif[^\n]*\n?");
regex!(IF_BLOCK_MULTI, r"(?ms)^#if[^\n]*\n.*?^#endif[^\n]*\n?");
regex!(DEFINE_LINE, r"(?m)^#define[^\n]*\n?");
regex!(EXTENSION_LINE, r"(?m)^#extension[^\n]*\n?");
regex!(VERSION_LINE, r"(?m)^#version[^\n]*\n?");

regex!(
    ATTRIBUTE_DECL,
    r"(?m)^attribute\s+(?:(?:lowp|mediump|highp|flat|smooth|noperspective|centroid)\s+)*\w+\s+(\w+)\s*;"
);
regex!(
    VARYING_DECL,
    r"(?m)^varying\s+(?:(?:lowp|mediump|highp|flat|smooth|noperspective|centroid)\s+)*\w+\s+(\w+)\s*;"
);

regex!(
    SSBO_DECL,
    r"(?ms)^layout\s*\(\s*std430[^)]*\)\s*(readonly|writeonly)?\s*buffer\s+(\w+)\s*\{\s*(\w+).*?\}\s*;?"
);
regex!(
    IMAGE_DECL,
    r"(?m)^layout\s*\(\s*(\w+)[^)]*\)\s*(readonly|writeonly)?\s*uniform\s+(?:(?:lowp|mediump|highp)\s+)*(u?)image(2DArray|2D|3D)\s+(\w+)\s*;"
);
regex!(
    LOCAL_SIZE,
    r"(?m)^layout\s*\(\s*local_size_x\s*=\s*(\d+)\s*,\s*local_size_y\s*=\s*(\d+)\s*,\s*local_size_z\s*=\s*(\d+)\s*\)\s*in\s*;"
);

/// GLSL sampler type to auto-register macro.
const SAMPLERS: [(&str, &str); 14] = [
    ("sampler2D", "SAMPLER2D_AUTOREG"),
    ("sampler2DArray", "SAMPLER2DARRAY_AUTOREG"),
    ("sampler2DShadow", "SAMPLER2DSHADOW_AUTOREG"),
    ("sampler2DArrayShadow", "SAMPLER2DARRAYSHADOW_AUTOREG"),
    ("sampler3D", "SAMPLER3D_AUTOREG"),
    ("samplerCube", "SAMPLERCUBE_AUTOREG"),
    ("samplerCubeArray", "SAMPLERCUBEARRAY_AUTOREG"),
    ("isampler2D", "ISAMPLER2D_AUTOREG"),
    ("isampler2DArray", "ISAMPLER2DARRAY_AUTOREG"),
    ("isampler3D", "ISAMPLER3D_AUTOREG"),
    ("usampler2D", "USAMPLER2D_AUTOREG"),
    ("usampler2DArray", "USAMPLER2DARRAY_AUTOREG"),
    ("usampler3D", "USAMPLER3D_AUTOREG"),
    ("samplerExternalOES", "SAMPLEREXTERNAL_AUTOREG"),
];

static SAMPLER_DECLS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SAMPLERS
        .iter()
        .map(|(ty, name)| {
            let pattern = format!(
                r"(?m)^uniform\s+(?:(?:lowp|mediump|highp)\s+)?{ty}\s+(\w+)\s*;"
            );
            (Regex::new(&pattern).unwrap(), *name)
        })
        .collect()
});

pub fn strip_comments(code: &str) -> String {
    let code = BLOCK_COMMENT.replace_all(code, "");
    LINE_COMMENT.replace_all(&code, "").into_owned()
}

/// Drops blank lines entirely.
pub fn collapse_blank_lines(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    for line in code.lines() {
        if !line.trim().is_empty() {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// The vertex stage marker the back-end plants into vertex shader text.
pub fn is_vertex_stage(code: &str) -> bool {
    VERTEX_MARKER.is_match(code)
}

pub fn rewrite_backend(code: &str, vertex: bool) -> String {
    let mut code = Cow::Borrowed(code);

    replace(&mut code, &UNIFORM_U, |_: &regex::Captures<'_>| {
        String::new()
    });

    if code.contains("bgfx_Frag") {
        let renamed = code
            .replace("bgfx_FragColor", "gl_FragColor")
            .replace("bgfx_FragData", "gl_FragData");
        code = Cow::Owned(renamed);
    }

    replace(&mut code, &OUT_DECL, |_: &regex::Captures<'_>| String::new());

    replace(&mut code, &IF_BLOCK_SINGLE, |_: &regex::Captures<'_>| {
        String::new()
    });
    replace(&mut code, &IF_BLOCK_MULTI, |_: &regex::Captures<'_>| {
        String::new()
    });
    replace(&mut code, &DEFINE_LINE, |_: &regex::Captures<'_>| {
        String::new()
    });
    replace(&mut code, &EXTENSION_LINE, |_: &regex::Captures<'_>| {
        String::new()
    });
    replace(&mut code, &VERSION_LINE, |_: &regex::Captures<'_>| {
        String::new()
    });

    replace(&mut code, &ATTRIBUTE_DECL, |caps: &regex::Captures<'_>| {
        format!("$input {};", &caps[1])
    });
    let varying_directive = if vertex { "$output" } else { "$input" };
    replace(&mut code, &VARYING_DECL, |caps: &regex::Captures<'_>| {
        format!("{varying_directive} {};", &caps[1])
    });

    for (pattern, macro_name) in SAMPLER_DECLS.iter() {
        replace(&mut code, pattern, |caps: &regex::Captures<'_>| {
            format!("{macro_name}({});", &caps[1])
        });
    }

    replace(&mut code, &SSBO_DECL, |caps: &regex::Captures<'_>| {
        let access = match caps.get(1).map(|m| m.as_str()) {
            Some("readonly") => "RO",
            Some("writeonly") => "WR",
            _ => "RW",
        };
        format!("BUFFER_{access}_AUTOREG({}, {});", &caps[2], &caps[3])
    });

    replace(&mut code, &IMAGE_DECL, |caps: &regex::Captures<'_>| {
        let access = match caps.get(2).map(|m| m.as_str()) {
            Some("readonly") => "RO",
            Some("writeonly") => "WR",
            _ => "RW",
        };
        let unsigned = if &caps[3] == "u" { "U" } else { "" };
        let kind = match &caps[4] {
            "2DArray" => "2D_ARRAY",
            "3D" => "3D",
            _ => "2D",
        };
        format!(
            "{unsigned}IMAGE{kind}_{access}_AUTOREG({}, {});",
            &caps[5], &caps[1]
        )
    });

    replace(&mut code, &LOCAL_SIZE, |caps: &regex::Captures<'_>| {
        format!("NUM_THREADS({}, {}, {})", &caps[1], &caps[2], &caps[3])
    });

    code.into_owned()
}

fn replace<F>(code: &mut Cow<'_, str>, pattern: &Regex, rep: F)
where
    F: FnMut(&regex::Captures<'_>) -> String,
{
    if pattern.is_match(code) {
        *code = Cow::Owned(pattern.replace_all(code, rep).into_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::{
        collapse_blank_lines, is_vertex_stage, rewrite_backend, strip_comments,
    };

    #[test]
    fn comments_are_stripped() {
        let code = "a; // trailing\n/* block\nspanning */b;\n";
        assert_eq!(strip_comments(code), "a; \nb;\n");
    }

    #[test]
    fn blank_lines_collapse() {
        assert_eq!(collapse_blank_lines("a\n\n\nb\n   \nc\n"), "a\nb\nc\n");
    }

    #[test]
    fn vertex_detection() {
        assert!(is_vertex_stage("#define varying out\nvoid main() {}\n"));
        assert!(!is_vertex_stage("#define varying in\nvoid main() {}\n"));
    }

    #[test]
    fn auto_uniforms_are_removed() {
        let code = "uniform vec4 u_viewRect;\nuniform mat4 u_proj;\nvoid main() {}\n";
        let out = rewrite_backend(code, false);
        assert_eq!(out, "void main() {}\n");
    }

    #[test]
    fn frag_outputs_are_renamed() {
        let code = "out vec4 bgfx_FragData[8];\nvoid main() { bgfx_FragColor = x; }\n";
        let out = rewrite_backend(code, false);
        assert!(!out.contains("out vec4"));
        assert!(out.contains("gl_FragColor = x;"));
    }

    #[test]
    fn preprocessor_residue_is_removed() {
        let code = "#version 310 es\n#extension GL_EXT_foo : enable\n#define X 1\n#if X\nkept?\n#endif\nbody;\n";
        let out = rewrite_backend(code, false);
        assert_eq!(out, "body;\n");
    }

    #[test]
    fn io_declarations_become_pseudo_directives() {
        let vertex = "attribute vec3 a_position;\nvarying vec4 v_color0;\n";
        let out = rewrite_backend(vertex, true);
        assert_eq!(out, "$input a_position;\n$output v_color0;\n");

        let fragment = "varying highp vec4 v_color0;\n";
        let out = rewrite_backend(fragment, false);
        assert_eq!(out, "$input v_color0;\n");
    }

    #[test]
    fn samplers_are_auto_registered() {
        let code = "uniform lowp sampler2D s_MatTexture;\nuniform highp sampler2DArray s_Frames;\n";
        let out = rewrite_backend(code, false);
        assert_eq!(
            out,
            "SAMPLER2D_AUTOREG(s_MatTexture);\nSAMPLER2DARRAY_AUTOREG(s_Frames);\n"
        );
    }

    #[test]
    fn ssbo_rewrite() {
        let code = "layout(std430, binding=0) readonly buffer LightData { LightInfo lights[]; };\n";
        let out = rewrite_backend(code, false);
        assert_eq!(out, "BUFFER_RO_AUTOREG(LightData, LightInfo);\n");

        let code = "layout(std430) buffer Histogram { uint counts[]; };\n";
        let out = rewrite_backend(code, false);
        assert_eq!(out, "BUFFER_RW_AUTOREG(Histogram, uint);\n");
    }

    #[test]
    fn image_rewrite() {
        let code = "layout(rgba16f, binding=1) writeonly uniform highp image2D s_Output;\n";
        let out = rewrite_backend(code, false);
        assert_eq!(out, "IMAGE2D_WR_AUTOREG(s_Output, rgba16f);\n");

        let code = "layout(r32ui) readonly uniform highp uimage2DArray s_Voxels;\n";
        let out = rewrite_backend(code, false);
        assert_eq!(out, "UIMAGE2D_ARRAY_RO_AUTOREG(s_Voxels, r32ui);\n");
    }

    #[test]
    fn local_size_becomes_num_threads() {
        let code = "layout(local_size_x = 8, local_size_y = 8, local_size_z = 1) in;\n";
        let out = rewrite_backend(code, false);
        assert_eq!(out, "NUM_THREADS(8, 8, 1)\n");
    }
}
