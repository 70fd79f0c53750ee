//! Shader variant decompiler.
//!
//! Takes the N compiled shader texts a material stores for one render pass
//! (one per feature-flag combination) and reconstructs a single source
//! file whose `#if`/`#ifdef` conditionals reproduce every variant when
//! re-preprocessed under its flag assignment.

pub mod assemble;
pub mod diff;
pub mod extract;
pub mod minimize;
pub mod preprocess;
pub mod search;
pub mod synth;
pub mod varying;

use std::collections::BTreeSet;
use std::time::Duration;

use indexmap::IndexMap;
use material_format::enums::{ShaderPlatform, ShaderStage};
use material_format::Material;
use thiserror::Error;

use crate::assemble::{RenderedConditional, RenderedItem};
use crate::diff::{
    dedup_permutations, group_lines, merge_permutations, verify_merge, LineGroup, LineTable,
};
use crate::search::{FlagSet, SearchCase, SearchInput};

#[derive(Debug, Error)]
pub enum DecompilerError {
    #[error("no input variants")]
    Empty,
    #[error("unbalanced braces in function {name:?}")]
    UnbalancedBraces { name: String },
    #[error("no extracted function matches marker {0:?}")]
    MissingFunction(String),
    #[error("diff fold lost the permutation with flags {0}")]
    DiffInconsistency(String),
}

/// One compiled shader text and the flag assignment that produced it.
#[derive(Clone, Debug)]
pub struct InputVariant {
    pub code: String,
    pub flags: FlagSet,
}

#[derive(Clone, Debug)]
pub struct DecompileOptions {
    /// Strip comments, collapse blank lines and apply the back-end
    /// rewrite before diffing.
    pub preprocess: bool,
    /// Merge IO declaration runs and flag preprocessor-fragile lines.
    pub postprocess: bool,
    /// Budget for the brute-force half of each expression search.
    pub search_timeout: Duration,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            preprocess: true,
            postprocess: true,
            search_timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecompiledSource {
    pub code: String,
    pub used_macros: BTreeSet<String>,
}

struct PreparedContext {
    groups: Vec<LineGroup>,
    searches: Vec<Option<usize>>,
    is_struct: bool,
}

pub fn decompile(
    variants: &[InputVariant],
    options: &DecompileOptions,
) -> Result<DecompiledSource, DecompilerError> {
    if variants.is_empty() {
        return Err(DecompilerError::Empty);
    }

    tracing::debug!("decompiling {} variants", variants.len());

    let prepared: Vec<(String, FlagSet)> = variants
        .iter()
        .map(|variant| {
            let code = if options.preprocess {
                let vertex = preprocess::is_vertex_stage(&variant.code);
                let code = preprocess::strip_comments(&variant.code);
                let code = preprocess::collapse_blank_lines(&code);
                preprocess::rewrite_backend(&code, vertex)
            } else {
                variant.code.clone()
            };
            (code, variant.flags.clone())
        })
        .collect();

    let mut table = LineTable::new();
    let mut main_raw: Vec<(Vec<u32>, FlagSet)> = Vec::new();
    let mut item_raw: IndexMap<String, (Vec<(Vec<u32>, FlagSet)>, bool)> = IndexMap::new();

    for (code, flags) in &prepared {
        let extraction = extract::extract(code)?;
        main_raw.push((table.encode(&extraction.main), flags.clone()));

        for item in extraction.items {
            let (bodies, _) = item_raw
                .entry(item.name.clone())
                .or_insert_with(|| (Vec::new(), item.is_struct));
            bodies.push((table.encode(&item.body), flags.clone()));
        }
    }

    let mut search_inputs: Vec<SearchInput> = Vec::new();

    let main = prepare_context(main_raw, false, &mut search_inputs)?;
    let mut items: IndexMap<String, PreparedContext> = IndexMap::new();
    for (name, (raw, is_struct)) in item_raw {
        items.insert(name, prepare_context(raw, is_struct, &mut search_inputs)?);
    }

    // Every deduplicated search input runs exactly once.
    let conditionals: Vec<RenderedConditional> = search_inputs
        .iter()
        .map(|input| {
            let result = search::search(input, options.search_timeout);
            let conditional = synth::conditional(&result.tokens);
            RenderedConditional {
                directive: conditional.directive,
                macros: conditional.macros,
                approximation: (result.score < result.total).then(|| {
                    format!(
                        "// Approximation, matches {} cases out of {}",
                        result.score, result.total
                    )
                }),
            }
        })
        .collect();

    let rendered_items: IndexMap<String, RenderedItem> = items
        .iter()
        .map(|(name, context)| {
            let body = assemble::render_groups(
                &context.groups,
                &context.searches,
                &conditionals,
                &table,
            );
            (
                name.clone(),
                RenderedItem {
                    body,
                    is_struct: context.is_struct,
                },
            )
        })
        .collect();

    let main_text = assemble::render_groups(&main.groups, &main.searches, &conditionals, &table);
    let mut code = assemble::splice_markers(&main_text, &rendered_items)?;

    if options.postprocess {
        code = assemble::postprocess(&code);
    }

    let used_macros = conditionals
        .iter()
        .flat_map(|c| c.macros.iter().cloned())
        .collect();

    Ok(DecompiledSource { code, used_macros })
}

fn prepare_context(
    raw: Vec<(Vec<u32>, FlagSet)>,
    is_struct: bool,
    search_inputs: &mut Vec<SearchInput>,
) -> Result<PreparedContext, DecompilerError> {
    let perms = dedup_permutations(raw);
    let merged = merge_permutations(&perms);
    verify_merge(&merged, &perms)?;
    let groups = group_lines(merged);

    let universe: Vec<FlagSet> = perms
        .iter()
        .flat_map(|p| p.flag_sets.iter().cloned())
        .collect();
    let definition = search::flag_definition(&universe);

    let searches = groups
        .iter()
        .map(|group| {
            let is_full = universe
                .iter()
                .all(|assignment| group.condition.contains(assignment));
            if is_full {
                return None;
            }

            let input = SearchInput {
                cases: universe
                    .iter()
                    .map(|assignment| SearchCase {
                        expected: group.condition.contains(assignment),
                        assignment: assignment.clone(),
                    })
                    .collect(),
                flags: definition.clone(),
            };

            let index = match search_inputs.iter().position(|s| *s == input) {
                Some(index) => index,
                None => {
                    search_inputs.push(input);
                    search_inputs.len() - 1
                }
            };
            Some(index)
        })
        .collect();

    Ok(PreparedContext {
        groups,
        searches,
        is_struct,
    })
}

/// Reconstructs one source per pass of `material` for a (platform, stage)
/// slot, feeding every supported variant's shader text through the
/// decompiler.
pub fn decompile_material(
    material: &Material,
    platform: ShaderPlatform,
    stage: ShaderStage,
    options: &DecompileOptions,
) -> Result<Vec<(String, DecompiledSource)>, DecompilerError> {
    let mut out = Vec::new();

    for pass in &material.passes {
        let variants: Vec<InputVariant> = pass
            .variants
            .iter()
            .filter(|variant| variant.is_supported)
            .filter_map(|variant| {
                variant.shader(platform, stage).map(|shader| InputVariant {
                    code: String::from_utf8_lossy(&shader.shader.shader_bytes).into_owned(),
                    flags: variant.flags.clone(),
                })
            })
            .collect();

        if variants.is_empty() {
            continue;
        }

        tracing::debug!(
            "decompiling pass {:?}: {} variants for {} {}",
            pass.name,
            variants.len(),
            platform.name(),
            stage.name()
        );

        out.push((pass.name.clone(), decompile(&variants, options)?));
    }

    Ok(out)
}
