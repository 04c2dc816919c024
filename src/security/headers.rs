//! Header value tokens.
//!
//! # Responsibilities
//! - Parse header values into literal text and `%TOKEN%` / `%TOKEN(arg)%` segments
//! - Validate delimiter pairing for the policy merger (no evaluation)
//! - Render tokens on the data-plane side from request/connection/TLS context
//!
//! # Design Decisions
//! - `%%` is an escaped literal percent sign
//! - Unknown tokens render literally, unexpanded
//! - `%REQ(name)%` for an absent request header renders as the empty string
//! - Surrounding literal text is always preserved

use std::collections::BTreeMap;

use thiserror::Error;

/// Syntax error in a header value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("unterminated token starting at byte {0}")]
    Unterminated(usize),

    #[error("malformed token {0:?}")]
    Malformed(String),
}

/// A piece of a header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token {
        name: String,
        arg: Option<String>,
        /// The token exactly as written, including delimiters.
        raw: String,
    },
}

/// Split a header value into segments. Only syntax is checked.
pub fn parse_tokens(value: &str) -> Result<Vec<Segment>, TokenError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = value;
    let mut offset = 0usize;

    while let Some(start) = rest.find('%') {
        literal.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        if let Some(tail) = after.strip_prefix('%') {
            literal.push('%');
            offset += start + 2;
            rest = tail;
            continue;
        }

        let end = after
            .find('%')
            .ok_or(TokenError::Unterminated(offset + start))?;
        let body = &after[..end];
        let (name, arg) = split_token(body)?;

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Token {
            name,
            arg,
            raw: format!("%{}%", body),
        });

        offset += start + end + 2;
        rest = &after[end + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn split_token(body: &str) -> Result<(String, Option<String>), TokenError> {
    let malformed = || TokenError::Malformed(format!("%{}%", body));

    let (name, arg) = match body.find('(') {
        Some(open) => {
            let inner = body[open + 1..].strip_suffix(')').ok_or_else(malformed)?;
            if inner.is_empty() || inner.contains(['(', ')']) {
                return Err(malformed());
            }
            (&body[..open], Some(inner.to_string()))
        }
        None => (body, None),
    };

    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if !valid_name {
        return Err(malformed());
    }
    Ok((name.to_string(), arg))
}

/// Request, connection and TLS context available when rendering tokens.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Request headers, keyed by lowercase name.
    pub headers: BTreeMap<String, String>,
    pub host: String,
    pub sni: Option<String>,
    pub remote_addr: Option<String>,
    pub protocol: Option<String>,
}

impl RequestContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Render a header value against a request context.
///
/// A value that fails to parse is returned unchanged; the resolver rejects
/// such values before they reach a route table.
pub fn render(value: &str, ctx: &RequestContext) -> String {
    let segments = match parse_tokens(value) {
        Ok(s) => s,
        Err(_) => return value.to_string(),
    };

    let mut out = String::with_capacity(value.len());
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Token { name, arg, raw } => match (name.as_str(), arg) {
                ("REQ", Some(header)) => out.push_str(ctx.header(&header).unwrap_or("")),
                ("HOSTNAME", None) => out.push_str(&ctx.host),
                ("REQUESTED_SERVER_NAME", None) => {
                    out.push_str(ctx.sni.as_deref().unwrap_or(""))
                }
                ("DOWNSTREAM_REMOTE_ADDRESS", None) => {
                    out.push_str(ctx.remote_addr.as_deref().unwrap_or(""))
                }
                ("PROTOCOL", None) => out.push_str(ctx.protocol.as_deref().unwrap_or("")),
                _ => out.push_str(&raw),
            },
        }
    }
    out
}
