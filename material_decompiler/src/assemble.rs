//! Reassembly of the grouped, conditioned lines into source text.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::diff::{LineGroup, LineTable};
use crate::extract::{MARKER_END, MARKER_START};
use crate::DecompilerError;

/// A fully rendered conditional, shared by every group that produced the
/// same search input.
#[derive(Clone, Debug)]
pub struct RenderedConditional {
    pub directive: String,
    pub approximation: Option<String>,
    pub macros: BTreeSet<String>,
}

/// A rendered function or struct body, ready to be spliced over its
/// markers.
#[derive(Clone, Debug)]
pub struct RenderedItem {
    pub body: String,
    pub is_struct: bool,
}

pub fn render_groups(
    groups: &[LineGroup],
    searches: &[Option<usize>],
    conditionals: &[RenderedConditional],
    table: &LineTable,
) -> String {
    let mut out = String::new();

    for (group, search) in groups.iter().zip(searches) {
        if let Some(index) = search {
            let conditional = &conditionals[*index];
            if let Some(approximation) = &conditional.approximation {
                out.push_str(approximation);
                out.push('\n');
            }
            out.push_str(&conditional.directive);
            out.push('\n');
            for &line in &group.lines {
                out.push_str(table.decode(line));
                out.push('\n');
            }
            out.push_str("#endif\n");
        } else {
            for &line in &group.lines {
                out.push_str(table.decode(line));
                out.push('\n');
            }
        }
    }

    out
}

/// Replaces every `START_NAME|||signature|||END_NAME` marker line with the
/// signature and the assembled body of the named item.
pub fn splice_markers(
    main: &str,
    items: &IndexMap<String, RenderedItem>,
) -> Result<String, DecompilerError> {
    let mut out = String::with_capacity(main.len());

    for line in main.lines() {
        let trimmed = line.trim();
        let marker = trimmed
            .strip_prefix(MARKER_START)
            .and_then(|rest| rest.strip_suffix(MARKER_END));

        let Some(signature) = marker else {
            out.push_str(line);
            out.push('\n');
            continue;
        };

        let name = item_name(signature);
        let item = items
            .get(name)
            .ok_or_else(|| DecompilerError::MissingFunction(name.to_owned()))?;

        let body = item.body.trim_end_matches('\n');
        out.push_str(signature);
        out.push_str(" {\n");
        if !body.is_empty() {
            out.push_str(body);
            out.push('\n');
        }
        out.push('}');
        if item.is_struct {
            out.push(';');
        }
        out.push('\n');
    }

    Ok(out)
}

fn item_name(signature: &str) -> &str {
    if let Some(name) = signature.strip_prefix("struct ") {
        return name.trim();
    }

    signature
        .split('(')
        .next()
        .unwrap_or(signature)
        .split_whitespace()
        .last()
        .unwrap_or(signature)
}

/// Merges runs of `$input`/`$output` declarations and flags constructs the
/// build's preprocessor is known to mangle.
pub fn postprocess(code: &str) -> String {
    fn flush(out: &mut String, run: &mut Option<(&'static str, Vec<String>)>) {
        if let Some((directive, names)) = run.take() {
            out.push_str(directive);
            out.push(' ');
            out.push_str(&names.join(", "));
            out.push_str(";\n");
        }
    }

    let mut out = String::with_capacity(code.len());
    let mut run: Option<(&'static str, Vec<String>)> = None;

    for line in code.lines() {
        let directive = ["$input", "$output"]
            .into_iter()
            .find(|d| line.trim().starts_with(&format!("{d} ")) && line.trim().ends_with(';'));

        match directive {
            Some(directive) => {
                let trimmed = line.trim();
                let names = trimmed[directive.len()..trimmed.len() - 1].trim();

                match &mut run {
                    Some((current, list)) if *current == directive => {
                        list.push(names.to_owned());
                    }
                    _ => {
                        flush(&mut out, &mut run);
                        run = Some((directive, vec![names.to_owned()]));
                    }
                }
            }
            None => {
                flush(&mut out, &mut run);
                out.push_str(line);
                if line.contains(") * (") || line.contains("][") {
                    out.push_str(" // Attention!");
                }
                out.push('\n');
            }
        }
    }
    flush(&mut out, &mut run);

    out
}
