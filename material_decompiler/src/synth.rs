//! Macro synthesis: turning a found token sequence into a preprocessor
//! conditional over defined() checks.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::minimize::{self, SimplifiedExpression};
use crate::search::{Join, Token};

/// UPPER_SNAKE conversion splitting camelCase boundaries; any non
/// alphanumeric character becomes an underscore.
pub fn upper_snake(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase()
                    && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase()));
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }

        out.push(c.to_ascii_uppercase());
    }

    out.trim_matches('_').to_owned()
}

/// The macro a (flag, value) pair tests, plus its polarity: an `Off`
/// boolean flag tests the *absence* of the `On` macro.
pub fn macro_for(flag: &str, value: &str) -> (String, bool) {
    if flag == "pass" {
        let base = upper_snake(value);
        let name = if base.ends_with("_PASS") {
            base
        } else {
            format!("{base}_PASS")
        };
        return (name, true);
    }

    if let Some(stripped) = flag.strip_prefix("f_") {
        return match value {
            "On" => (upper_snake(stripped), true),
            "Off" => (upper_snake(stripped), false),
            _ => (upper_snake(&format!("{stripped}__{value}")), true),
        };
    }

    (upper_snake(&format!("{flag}{value}")), true)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conditional {
    /// The opening directive: `#ifdef X`, `#ifndef X` or `#if <formula>`.
    pub directive: String,
    pub macros: BTreeSet<String>,
}

/// Converts a token sequence into a preprocessor conditional.
///
/// Each distinct macro referenced by the sequence becomes a boolean
/// variable; the sequence's truth table over all defined/undefined
/// combinations is minimized and formatted for the preprocessor.
pub fn conditional(tokens: &[Token]) -> Conditional {
    // Macro variables in first-appearance order, MSB first.
    let mut variables: IndexMap<String, ()> = IndexMap::new();
    for token in tokens {
        let (name, _) = macro_for(&token.flag, &token.value);
        variables.entry(name).or_insert(());
    }
    let variables: Vec<String> = variables.into_keys().collect();

    let n = variables.len() as u32;
    let mut minterms = Vec::new();
    for assignment in 0..1u32 << n {
        if evaluate_against_macros(tokens, &variables, assignment) {
            minterms.push(assignment);
        }
    }

    let simplified = minimize::simplify(&variables, &minterms);
    let directive = directive(&simplified);

    Conditional {
        directive,
        macros: simplified.atoms,
    }
}

/// Token evaluation where a flag test reads "is the macro defined",
/// honoring the macro's polarity.
fn evaluate_against_macros(tokens: &[Token], variables: &[String], assignment: u32) -> bool {
    let n = variables.len() as u32;
    let defined = |name: &str| {
        let i = variables.iter().position(|v| v == name).unwrap_or(0) as u32;
        assignment & (1 << (n - 1 - i)) != 0
    };

    for token in tokens.iter().rev() {
        let (name, positive) = macro_for(&token.flag, &token.value);
        let truth = (defined(&name) == positive) ^ token.negative;

        match token.join {
            Join::And if !truth => return false,
            Join::Or if truth => return true,
            Join::Initial => return truth,
            _ => {}
        }
    }

    false
}

static ATOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

fn directive(simplified: &SimplifiedExpression) -> String {
    match simplified.expression.as_str() {
        "True" => return "#if 1".to_owned(),
        "False" => return "#if 0".to_owned(),
        _ => {}
    }

    if simplified.atoms.len() == 1 {
        let atom = simplified.atoms.iter().next().unwrap();
        if simplified.expression == *atom {
            return format!("#ifdef {atom}");
        }
        if simplified.expression == format!("~{atom}") {
            return format!("#ifndef {atom}");
        }
    }

    let formula = simplified
        .expression
        .replace(" & ", " && ")
        .replace(" | ", " || ")
        .replace('~', "!");
    let formula = ATOM.replace_all(&formula, "defined($0)");

    format!("#if {formula}")
}

#[cfg(test)]
mod tests {
    use super::{conditional, macro_for, upper_snake};
    use crate::search::{Join, Token};

    fn token(join: Join, negative: bool, flag: &str, value: &str) -> Token {
        Token {
            join,
            negative,
            flag: flag.to_owned(),
            value: value.to_owned(),
        }
    }

    #[test]
    fn upper_snake_splits_camel_case() {
        assert_eq!(upper_snake("AlphaTest"), "ALPHA_TEST");
        assert_eq!(upper_snake("depth_prepass"), "DEPTH_PREPASS");
        assert_eq!(upper_snake("Seasons"), "SEASONS");
        assert_eq!(upper_snake("RenderAsBillboards"), "RENDER_AS_BILLBOARDS");
    }

    #[test]
    fn pass_macro_naming() {
        assert_eq!(macro_for("pass", "AlphaTest"), ("ALPHA_TEST_PASS".to_owned(), true));
        // An existing suffix is not doubled.
        assert_eq!(macro_for("pass", "DepthPass"), ("DEPTH_PASS".to_owned(), true));
    }

    #[test]
    fn boolean_flag_macro_naming() {
        assert_eq!(macro_for("f_AlphaTest", "On"), ("ALPHA_TEST".to_owned(), true));
        assert_eq!(macro_for("f_AlphaTest", "Off"), ("ALPHA_TEST".to_owned(), false));
        assert_eq!(
            macro_for("f_RenderMode", "Fancy"),
            ("RENDER_MODE__FANCY".to_owned(), true)
        );
    }

    #[test]
    fn plain_flag_macro_naming() {
        assert_eq!(macro_for("Fancy", "On"), ("FANCY_ON".to_owned(), true));
    }

    #[test]
    fn single_positive_atom_is_ifdef() {
        let cond = conditional(&[token(Join::Initial, false, "f_Fog", "On")]);
        assert_eq!(cond.directive, "#ifdef FOG");
    }

    #[test]
    fn single_negative_atom_is_ifndef() {
        let cond = conditional(&[token(Join::Initial, true, "f_Fog", "On")]);
        assert_eq!(cond.directive, "#ifndef FOG");

        // Testing for Off is the same macro with flipped polarity.
        let cond = conditional(&[token(Join::Initial, false, "f_Fog", "Off")]);
        assert_eq!(cond.directive, "#ifndef FOG");
    }

    #[test]
    fn conjunction_formats_with_defined() {
        let cond = conditional(&[
            token(Join::Initial, false, "f_A", "On"),
            token(Join::And, false, "f_B", "Enabled"),
        ]);
        assert_eq!(cond.directive, "#if defined(A) && defined(B__ENABLED)");
    }

    #[test]
    fn disjunction_of_same_flag_values() {
        let cond = conditional(&[
            token(Join::Initial, false, "pass", "Opaque"),
            token(Join::Or, false, "pass", "AlphaTest"),
        ]);
        assert_eq!(
            cond.directive,
            "#if defined(ALPHA_TEST_PASS) || defined(OPAQUE_PASS)"
        );
    }
}
