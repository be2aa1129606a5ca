use std::rc::Rc;

use derive_more::Debug;
use smol_str::SmolStr;

use crate::{AValId, Constraint, TyId, Weight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[debug("{ty:?}@{}", weight.get())]
pub struct Fact {
    pub ty: TyId,
    pub weight: Weight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum AValKind {
    #[default]
    Normal,
    /// A type literal handed out by annotations: frozen, never documented.
    Literal,
    /// The canonical unknown value. Swallows everything.
    Null,
}

#[derive(Debug, Clone)]
pub(crate) enum Target {
    AVal(AValId),
    Constraint(Rc<dyn Constraint>),
}

#[derive(Debug, Clone)]
pub(crate) struct Edge {
    pub(crate) target: Target,
    pub(crate) weight: Weight,
}

/// An append-only set of types observed for one program location.
#[derive(Debug, Default)]
pub struct AVal {
    pub(crate) facts: Vec<Fact>,
    #[debug(skip)]
    pub(crate) forward: Vec<Edge>,
    pub(crate) doc: Option<SmolStr>,
    pub(crate) kind: AValKind,
    /// Ancestor values this value already receives an override link from.
    pub(crate) linked_ancestors: Vec<AValId>,
}

impl AVal {
    pub(crate) fn with_kind(kind: AValKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn doc(&self) -> Option<&SmolStr> {
        self.doc.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn is_literal(&self) -> bool {
        self.kind == AValKind::Literal
    }

    pub fn is_null(&self) -> bool {
        self.kind == AValKind::Null
    }

    pub(crate) fn accepts_types(&self) -> bool {
        self.kind == AValKind::Normal
    }
}
