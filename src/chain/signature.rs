/// Parses textual function signatures like `transfer(address,uint256)(bool)`
/// into typed parameter lists, including nested tuples and tuple arrays.

use super::error::{ChainError, ChainResult};

/// Shape of a single parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Any non-tuple type tag, kept verbatim (`uint256`, `address[]`, `bytes32`)
    Scalar(String),
    /// `(T1,T2,...)`
    Tuple(Vec<Param>),
    /// `(T1,T2,...)[]`
    TupleArray(Vec<Param>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
}

impl Signature {
    /// Parse `name(inputs)` with an optional trailing `(outputs)` group
    pub fn parse(sig: &str) -> ChainResult<Self> {
        let syntax = || ChainError::SignatureSyntax(sig.to_string());
        let sig = sig.trim();

        let open = sig.find('(').ok_or_else(syntax)?;
        let name = &sig[..open];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(syntax());
        }

        let inputs_end = matching_paren(sig, open).ok_or_else(syntax)?;
        let inputs_src = &sig[open + 1..inputs_end];
        let rest = &sig[inputs_end + 1..];

        let outputs_src = if rest.is_empty() {
            ""
        } else {
            // The remainder must be exactly one balanced group
            if !rest.starts_with('(') || matching_paren(rest, 0) != Some(rest.len() - 1) {
                return Err(syntax());
            }
            &rest[1..rest.len() - 1]
        };

        Ok(Self {
            name: name.to_string(),
            inputs: parse_params(inputs_src, "arg")?,
            outputs: parse_params(outputs_src, "out")?,
        })
    }

    /// Canonical textual form used for the function selector
    pub fn canonical(&self) -> ChainResult<String> {
        let types = self
            .inputs
            .iter()
            .map(|p| p.sol_type().map(|t| t.sol_type_name().into_owned()))
            .collect::<ChainResult<Vec<_>>>()?;
        Ok(format!("{}({})", self.name, types.join(",")))
    }
}

fn parse_params(src: &str, prefix: &str) -> ChainResult<Vec<Param>> {
    split_top_level(src)?
        .into_iter()
        .enumerate()
        .map(|(i, ty)| {
            Ok(Param {
                name: format!("{}{}", prefix, i),
                kind: parse_kind(ty)?,
            })
        })
        .collect()
}

fn parse_kind(ty: &str) -> ChainResult<ParamKind> {
    if ty.starts_with('(') {
        let (body, is_array) = if let Some(stripped) = ty.strip_suffix("[]") {
            (stripped, true)
        } else {
            (ty, false)
        };
        // Only a group spanning the whole body is a tuple; anything else
        // (e.g. fixed-size tuple arrays) stays a scalar tag.
        if body.len() > 2 && matching_paren(body, 0) == Some(body.len() - 1) {
            let components = parse_params(&body[1..body.len() - 1], "v")?;
            return Ok(if is_array {
                ParamKind::TupleArray(components)
            } else {
                ParamKind::Tuple(components)
            });
        }
    }
    Ok(ParamKind::Scalar(ty.to_string()))
}

/// Split on commas at paren depth zero, trimming and dropping empty entries
pub fn split_top_level(src: &str) -> ChainResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;

    for (i, c) in src.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ChainError::SignatureSyntax(src.to_string()));
                }
            }
            ',' if depth == 0 => {
                parts.push(src[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ChainError::SignatureSyntax(src.to_string()));
    }
    parts.push(src[start..].trim());

    Ok(parts.into_iter().filter(|p| !p.is_empty()).collect())
}

/// Byte index of the paren closing the one opened at `open`
fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}
