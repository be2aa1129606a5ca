mod collect;
mod doc;

pub use doc::{parse_comment, DocComment, Tag};

use derive_more::Debug;
use pest::Parser;
use pest_derive::Parser;
use smol_str::SmolStr;

#[derive(Parser)]
#[grammar = "jsdoc.pest"]
pub struct TypeExprParser;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CommentError {
    pub message: String,
    /// Byte range within the type expression text.
    pub span: Option<(usize, usize)>,
}

impl CommentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(message: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            message: message.into(),
            span: Some((start, end)),
        }
    }
}

impl From<pest::error::Error<Rule>> for CommentError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let (start, end) = match err.location {
            pest::error::InputLocation::Pos(pos) => (pos, pos),
            pest::error::InputLocation::Span(span) => span,
        };
        CommentError::with_span(err.variant.message().into_owned(), start, end)
    }
}

/// A parsed closure type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// `number`, `goog.ui.Component`
    #[debug("{_0}")]
    Name(SmolStr),
    /// `?T`
    #[debug("?{_0:?}")]
    Nullable(Box<TypeExpr>),
    /// `!T`
    #[debug("!{_0:?}")]
    NonNullable(Box<TypeExpr>),
    /// `T=`
    #[debug("{_0:?}=")]
    Optional(Box<TypeExpr>),
    /// `...T`
    Rest(Option<Box<TypeExpr>>),
    Union(Vec<TypeExpr>),
    /// `Array.<T>`, `Object<K, V>`
    Application {
        base: Box<TypeExpr>,
        params: Vec<TypeExpr>,
    },
    /// `{a: T, b}`; members are always [`TypeExpr::Field`].
    Record(Vec<TypeExpr>),
    Field {
        key: SmolStr,
        value: Option<Box<TypeExpr>>,
    },
    Function {
        this: Option<Box<TypeExpr>>,
        new: Option<Box<TypeExpr>>,
        params: Vec<TypeExpr>,
        result: Option<Box<TypeExpr>>,
    },
    /// `[A, B]`
    ArrayTuple(Vec<TypeExpr>),
    StringLiteral(SmolStr),
    NumberLiteral(SmolStr),
    NullLiteral,
    UndefinedLiteral,
    VoidLiteral,
    /// `?` on its own.
    NullableLiteral,
    /// `*`
    AllLiteral,
}

pub fn parse_type_expr(source: &str) -> Result<TypeExpr, CommentError> {
    let pairs = TypeExprParser::parse(Rule::type_expr, source)?;
    collect::collect_type_expr(pairs)
}
