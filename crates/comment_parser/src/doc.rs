// ==============================================================================
// Doc comment unwrapping and tag splitting
// ==============================================================================
//
// `/** ... */` text is unwrapped line by line (leading `*` and one space
// stripped), then split into a free-form description and one block per line
// starting with `@`. Continuation lines belong to the preceding block.

use smol_str::SmolStr;

use crate::{parse_type_expr, TypeExpr};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocComment {
    pub description: Option<SmolStr>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub title: SmolStr,
    pub ty: Option<TypeExpr>,
    pub name: Option<SmolStr>,
    pub description: Option<SmolStr>,
}

impl DocComment {
    pub fn has_tag(&self, title: &str) -> bool {
        self.tags.iter().any(|tag| tag.title == title)
    }
}

/// Tags whose first word after the type is a parameter name.
fn takes_name(title: &str) -> bool {
    matches!(title, "param" | "arg" | "argument")
}

/// Tags that accept a bare (unbraced) type, e.g. `@extends ns.Base`.
fn takes_bare_type(title: &str) -> bool {
    matches!(title, "extends" | "augments" | "implements" | "this")
}

/// Parse raw comment text. Never fails: a malformed type expression leaves
/// its tag without a type.
pub fn parse_comment(raw: &str) -> DocComment {
    let lines = unwrap_lines(raw);

    let mut description = Vec::new();
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    for line in lines {
        if line.trim_start().starts_with('@') {
            blocks.push(vec![line.trim_start()]);
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        } else {
            description.push(line);
        }
    }

    DocComment {
        description: non_empty(&description.join("\n")),
        tags: blocks.iter().map(|block| parse_tag(&block.join("\n"))).collect(),
    }
}

fn unwrap_lines(raw: &str) -> Vec<&str> {
    let body = raw.trim();
    let body = body
        .strip_prefix("/**")
        .or_else(|| body.strip_prefix("/*"))
        .unwrap_or(body);
    let body = body.strip_suffix("*/").unwrap_or(body);
    body.lines()
        .map(|line| {
            let trimmed = line.trim_start();
            match trimmed.strip_prefix('*') {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
                None => trimmed,
            }
        })
        .collect()
}

fn non_empty(text: &str) -> Option<SmolStr> {
    let text = text.trim();
    (!text.is_empty()).then(|| SmolStr::from(text))
}

fn parse_tag(text: &str) -> Tag {
    let body = text.strip_prefix('@').unwrap_or(text);
    let title_end = body
        .find(|c: char| c.is_whitespace() || c == '{')
        .unwrap_or(body.len());
    let title = SmolStr::from(&body[..title_end]);
    let mut rest = body[title_end..].trim_start();

    let mut ty = None;
    if rest.starts_with('{') {
        match braced_extent(rest) {
            Some(end) => {
                ty = parse_logged(&title, &rest[1..end]);
                rest = rest[end + 1..].trim_start();
            }
            None => {
                log::debug!("unterminated type in @{title}");
                rest = "";
            }
        }
    } else if takes_bare_type(&title) {
        let (word, after) = split_word(rest);
        if !word.is_empty() {
            ty = parse_logged(&title, word);
            rest = after;
        }
    }

    let mut name = None;
    if takes_name(&title) {
        let (word, after) = split_word(rest);
        name = param_name(word);
        rest = after;
    }

    Tag {
        title,
        ty,
        name,
        description: non_empty(rest),
    }
}

fn parse_logged(title: &str, text: &str) -> Option<TypeExpr> {
    match parse_type_expr(text) {
        Ok(ty) => Some(ty),
        Err(err) => {
            log::debug!("unparsable type `{text}` in @{title}: {err}");
            None
        }
    }
}

/// Byte index of the `}` closing the `{` at the start of `text`.
fn braced_extent(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    (&text[..end], text[end..].trim_start())
}

/// `name`, `[name]` or `[name=default]`.
fn param_name(word: &str) -> Option<SmolStr> {
    let word = word
        .strip_prefix('[')
        .map(|inner| inner.trim_end_matches(']'))
        .unwrap_or(word);
    let word = word.split('=').next().unwrap_or(word).trim();
    (!word.is_empty()).then(|| SmolStr::from(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_and_tags() {
        let doc = parse_comment(
            r#"/**
             * Adds two things.
             * Second line.
             * @param {number} a The first.
             * @param {string=} [b=foo] Optional second,
             *     continued here.
             * @return {boolean}
             */"#,
        );
        assert_eq!(doc.description.as_deref(), Some("Adds two things.\nSecond line."));
        assert_eq!(doc.tags.len(), 3);

        let a = &doc.tags[0];
        assert_eq!(a.title, "param");
        assert_eq!(a.name.as_deref(), Some("a"));
        assert_eq!(a.ty, Some(TypeExpr::Name("number".into())));
        assert_eq!(a.description.as_deref(), Some("The first."));

        let b = &doc.tags[1];
        assert_eq!(b.name.as_deref(), Some("b"));
        assert_eq!(
            b.ty,
            Some(TypeExpr::Optional(Box::new(TypeExpr::Name("string".into()))))
        );
        assert_eq!(
            b.description.as_deref(),
            Some("Optional second,\n    continued here.")
        );

        assert_eq!(doc.tags[2].title, "return");
        assert!(doc.tags[2].description.is_none());
    }

    #[test]
    fn single_line_and_flag_tags() {
        let doc = parse_comment("/** @constructor */");
        assert_eq!(doc.description, None);
        assert!(doc.has_tag("constructor"));

        let doc = parse_comment("/** @type {number} */");
        assert_eq!(doc.tags[0].ty, Some(TypeExpr::Name("number".into())));
    }

    #[test]
    fn nested_braces_and_bare_types() {
        let doc = parse_comment("/** @type {{a: number}} the record\n @extends ns.Base */");
        assert!(matches!(doc.tags[0].ty, Some(TypeExpr::Record(_))));
        assert_eq!(doc.tags[0].description.as_deref(), Some("the record"));
        assert_eq!(doc.tags[1].ty, Some(TypeExpr::Name("ns.Base".into())));
    }

    #[test]
    fn malformed_type_is_dropped() {
        let doc = parse_comment("/** @param {Array.<} x the x */");
        let tag = &doc.tags[0];
        assert_eq!(tag.ty, None);
        assert_eq!(tag.name.as_deref(), Some("x"));

        let doc = parse_comment("/** @type {number */");
        assert_eq!(doc.tags[0].ty, None);
    }
}
