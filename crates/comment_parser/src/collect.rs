use pest::iterators::{Pair, Pairs};
use smol_str::SmolStr;

use crate::{CommentError, Rule, TypeExpr};

/// Build a [`TypeExpr`] from the pairs produced for `Rule::type_expr`.
pub fn collect_type_expr(mut pairs: Pairs<Rule>) -> Result<TypeExpr, CommentError> {
    let pair = pairs
        .next()
        .ok_or_else(|| CommentError::new("empty type expression"))?;
    collect_one(pair)
}

fn err_at_pair(message: impl Into<String>, pair: &Pair<Rule>) -> CommentError {
    let span = pair.as_span();
    CommentError::with_span(message, span.start(), span.end())
}

/// The single child of a transparent wrapper rule.
fn only_child(pair: Pair<Rule>) -> Result<TypeExpr, CommentError> {
    let rule = pair.as_rule();
    let span = pair.as_span();
    match pair.into_inner().next() {
        Some(child) => collect_one(child),
        None => Err(CommentError::with_span(
            format!("{rule:?} has no inner type"),
            span.start(),
            span.end(),
        )),
    }
}

fn boxed(pair: Pair<Rule>) -> Result<Box<TypeExpr>, CommentError> {
    only_child(pair).map(Box::new)
}

/// Collect a single rule node. Wrapper rules with one member are unwrapped
/// so the tree never contains a spurious one-element union.
fn collect_one(pair: Pair<Rule>) -> Result<TypeExpr, CommentError> {
    let ty = match pair.as_rule() {
        Rule::type_expr | Rule::top_type | Rule::paren_type | Rule::fn_result => {
            return only_child(pair);
        }

        Rule::rest_type => {
            let inner = pair
                .into_inner()
                .next()
                .map(collect_one)
                .transpose()?
                .map(Box::new);
            TypeExpr::Rest(inner)
        }

        Rule::union_type => {
            let mut members = pair
                .into_inner()
                .map(collect_one)
                .collect::<Result<Vec<_>, _>>()?;
            if members.len() == 1 {
                return Ok(members.remove(0));
            }
            TypeExpr::Union(members)
        }

        Rule::optional_type => {
            let mut inner = pair.clone().into_inner();
            let base = match inner.next() {
                Some(base) => collect_one(base)?,
                None => return Err(err_at_pair("optional type has no inner type", &pair)),
            };
            match inner.next() {
                Some(mark) if mark.as_rule() == Rule::optional_mark => {
                    TypeExpr::Optional(Box::new(base))
                }
                _ => base,
            }
        }

        Rule::nullable => TypeExpr::Nullable(boxed(pair)?),
        Rule::non_nullable => TypeExpr::NonNullable(boxed(pair)?),

        Rule::function_type => collect_function(pair)?,

        Rule::record_type => TypeExpr::Record(
            pair.into_inner()
                .map(collect_one)
                .collect::<Result<_, _>>()?,
        ),
        Rule::field_type => {
            let mut inner = pair.clone().into_inner();
            let key = match inner.next() {
                Some(key) => unquote(key.as_str()),
                None => return Err(err_at_pair("record field has no key", &pair)),
            };
            let value = inner.next().map(collect_one).transpose()?.map(Box::new);
            TypeExpr::Field { key, value }
        }

        Rule::array_type => TypeExpr::ArrayTuple(
            pair.into_inner()
                .map(collect_one)
                .collect::<Result<_, _>>()?,
        ),

        Rule::applied_type => {
            let mut inner = pair.clone().into_inner();
            let base = match inner.next() {
                Some(name) => TypeExpr::Name(name.as_str().into()),
                None => return Err(err_at_pair("type application has no name", &pair)),
            };
            match inner.next() {
                Some(params) => TypeExpr::Application {
                    base: Box::new(base),
                    params: params
                        .into_inner()
                        .map(collect_one)
                        .collect::<Result<_, _>>()?,
                },
                None => base,
            }
        }

        Rule::null_literal => TypeExpr::NullLiteral,
        Rule::undefined_literal => TypeExpr::UndefinedLiteral,
        Rule::void_literal => TypeExpr::VoidLiteral,
        Rule::all_literal => TypeExpr::AllLiteral,
        Rule::nullable_literal => TypeExpr::NullableLiteral,
        Rule::string_literal => TypeExpr::StringLiteral(unquote(pair.as_str())),
        Rule::number_literal => TypeExpr::NumberLiteral(pair.as_str().into()),

        other => return Err(err_at_pair(format!("unexpected {other:?}"), &pair)),
    };
    Ok(ty)
}

fn collect_function(pair: Pair<Rule>) -> Result<TypeExpr, CommentError> {
    let mut this = None;
    let mut new = None;
    let mut params = Vec::new();
    let mut result = None;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::fn_this => this = Some(boxed(child)?),
            Rule::fn_new => new = Some(boxed(child)?),
            Rule::fn_result => result = Some(boxed(child)?),
            _ => params.push(collect_one(child)?),
        }
    }
    Ok(TypeExpr::Function {
        this,
        new,
        params,
        result,
    })
}

fn unquote(text: &str) -> SmolStr {
    let stripped = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')));
    SmolStr::from(stripped.unwrap_or(text))
}
