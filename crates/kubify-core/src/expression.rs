//! Placeholder scanning.
//!
//! A placeholder is a `{resource.path}` span inside a string field. The
//! resource name is everything before the first `.`; the rest is a dotted
//! field path (`bindings.tcp.port`, `connectionString`, `inputs.value.value`).

use std::fmt;

/// A parsed `{resource.path}` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub resource: String,
    pub path: Vec<String>,
}

impl Reference {
    /// Parse the inside of a placeholder (without braces).
    pub fn parse(token: &str) -> Result<Self, MalformedExpression> {
        if token.is_empty() {
            return Err(MalformedExpression::new(token, "empty placeholder"));
        }
        let Some((resource, path)) = token.split_once('.') else {
            return Err(MalformedExpression::new(
                token,
                "placeholder has no field path",
            ));
        };
        if resource.is_empty() {
            return Err(MalformedExpression::new(token, "missing resource name"));
        }
        let path: Vec<String> = path.split('.').map(str::to_owned).collect();
        if path.iter().any(String::is_empty) {
            return Err(MalformedExpression::new(token, "empty path segment"));
        }
        Ok(Self {
            resource: resource.to_owned(),
            path,
        })
    }

    pub fn path_str(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}.{}}}", self.resource, self.path_str())
    }
}

/// A placeholder occurrence. `start..end` is the byte span including braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub reference: Reference,
}

/// Find every placeholder in `text`.
///
/// A `}` outside a placeholder is literal text; an unterminated or nested
/// `{` is an error.
pub fn scan(text: &str) -> Result<Vec<Token>, MalformedExpression> {
    let mut tokens = Vec::new();
    let mut open: Option<usize> = None;

    for (i, c) in text.char_indices() {
        match c {
            '{' if open.is_some() => {
                return Err(MalformedExpression::new(text, "nested '{' in placeholder"));
            }
            '{' => open = Some(i),
            '}' => {
                if let Some(start) = open.take() {
                    let reference = Reference::parse(&text[start + 1..i])
                        .map_err(|e| MalformedExpression::new(text, e.reason))?;
                    tokens.push(Token {
                        start,
                        end: i + 1,
                        reference,
                    });
                }
            }
            _ => {}
        }
    }

    if open.is_some() {
        return Err(MalformedExpression::new(text, "unterminated placeholder"));
    }
    Ok(tokens)
}

/// References in `text`, in order of appearance.
pub fn references(text: &str) -> Result<Vec<Reference>, MalformedExpression> {
    Ok(scan(text)?.into_iter().map(|t| t.reference).collect())
}

/// First placeholder-shaped `{name.path}` substring in rendered output.
///
/// Lenient: never fails, and ignores brace spans that could not be a
/// reference (whitespace, quotes, empty segments).
pub fn find_placeholder(text: &str) -> Option<&str> {
    let mut rest = text;
    let mut offset = 0;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(['{', '}']) else {
            return None;
        };
        let inner = &after[..close];
        if after[close..].starts_with('}') && looks_like_reference(inner) {
            let start = offset + open;
            return Some(&text[start..start + close + 2]);
        }
        offset += open + 1;
        rest = after;
    }
    None
}

fn looks_like_reference(inner: &str) -> bool {
    !inner.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ':')
        && Reference::parse(inner).is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed expression {text:?}: {reason}")]
pub struct MalformedExpression {
    pub text: String,
    pub reason: &'static str,
}

impl MalformedExpression {
    fn new(text: &str, reason: &'static str) -> Self {
        Self {
            text: text.to_owned(),
            reason,
        }
    }
}
