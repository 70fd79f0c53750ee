//! Function and struct extraction.
//!
//! Each function body is lifted out of the main text and replaced with a
//! marker carrying the signature, so that the main text and every function
//! body diff independently across variants.

use std::sync::LazyLock;

use regex::Regex;

use crate::DecompilerError;

pub const MARKER_START: &str = "START_NAME|||";
pub const MARKER_END: &str = "|||END_NAME";

static FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*?([^#\s][\w]+)\s+([\w]+)\s*\(([^;]*?)\)\s*\{").unwrap()
});

static STRUCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^\s*?struct\s+([\w]+)\s*\{(.*?)\};").unwrap());

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedItem {
    pub name: String,
    pub signature: String,
    pub body: String,
    pub is_struct: bool,
}

#[derive(Clone, Debug)]
pub struct Extraction {
    pub main: String,
    pub items: Vec<ExtractedItem>,
}

pub fn extract(code: &str) -> Result<Extraction, DecompilerError> {
    let mut items = Vec::new();

    // Functions first. Always take the first remaining match: a top level
    // definition precedes anything brace-shaped inside its own body, so
    // consuming through the matching brace never splits a function.
    let mut main = String::with_capacity(code.len());
    let mut rest = code;
    while let Some(caps) = FUNCTION.captures(rest) {
        let m = caps.get(0).unwrap();
        let open = m.end() - 1;
        let close = matching_brace(rest, open).ok_or_else(|| {
            DecompilerError::UnbalancedBraces {
                name: caps[2].to_owned(),
            }
        })?;

        let args: String = caps[3].split_whitespace().collect::<Vec<_>>().join(" ");
        let signature = format!("{} {}({})", &caps[1], &caps[2], args);

        main.push_str(&rest[..m.start()]);
        main.push_str(MARKER_START);
        main.push_str(&signature);
        main.push_str(MARKER_END);
        main.push('\n');

        items.push(ExtractedItem {
            name: caps[2].to_owned(),
            signature,
            body: rest[open + 1..close].trim_matches('\n').to_owned(),
            is_struct: false,
        });

        rest = &rest[close + 1..];
        rest = rest.strip_prefix('\n').unwrap_or(rest);
    }
    main.push_str(rest);

    // Then structs, out of whatever stayed in the main text.
    let mut out = String::with_capacity(main.len());
    let mut rest = main.as_str();
    while let Some(caps) = STRUCT.captures(rest) {
        let m = caps.get(0).unwrap();
        let signature = format!("struct {}", &caps[1]);

        out.push_str(&rest[..m.start()]);
        out.push_str(MARKER_START);
        out.push_str(&signature);
        out.push_str(MARKER_END);
        out.push('\n');

        items.push(ExtractedItem {
            name: caps[1].to_owned(),
            signature,
            body: caps[2].trim_matches('\n').to_owned(),
            is_struct: true,
        });

        rest = &rest[m.end()..];
        rest = rest.strip_prefix('\n').unwrap_or(rest);
    }
    out.push_str(rest);

    Ok(Extraction { main: out, items })
}

fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, byte) in text.bytes().enumerate().skip(open) {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
