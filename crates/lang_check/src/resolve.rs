use comment_parser::TypeExpr;
use lang_ty::{AValId, TypeCx, Weight};

use crate::registry::QualifiedNameRegistry;

/// Turns parsed annotation type expressions into values of the session.
pub struct TypeResolver<'a> {
    pub cx: &'a mut TypeCx,
    pub registry: &'a mut QualifiedNameRegistry,
}

impl<'a> TypeResolver<'a> {
    pub fn new(cx: &'a mut TypeCx, registry: &'a mut QualifiedNameRegistry) -> Self {
        Self { cx, registry }
    }

    /// `None` when the expression contributes no type. Nullability,
    /// optionality and rest markers are dropped in favour of the type they
    /// wrap.
    pub fn resolve(&mut self, expr: &TypeExpr, inner: Option<AValId>) -> Option<AValId> {
        match expr {
            TypeExpr::Name(name) => {
                Some(self.registry.resolve_qualified_type(self.cx, name, inner))
            }
            TypeExpr::Nullable(wrapped)
            | TypeExpr::NonNullable(wrapped)
            | TypeExpr::Optional(wrapped) => self.resolve(wrapped, inner),
            TypeExpr::Rest(wrapped) => self.resolve(wrapped.as_deref()?, inner),
            TypeExpr::Union(members) => {
                let union = self.cx.new_aval();
                for member in members {
                    if let Some(av) = self.resolve(member, None) {
                        self.cx.propagate(av, union, Weight::DEFAULT);
                    }
                }
                Some(union)
            }
            TypeExpr::Application { base, params } => {
                let inner = params.last().and_then(|param| self.resolve(param, None));
                self.resolve(base, inner)
            }
            TypeExpr::NullLiteral | TypeExpr::UndefinedLiteral => Some(self.cx.null_aval()),
            TypeExpr::NullableLiteral | TypeExpr::AllLiteral | TypeExpr::VoidLiteral => None,
            TypeExpr::Record(_) | TypeExpr::Field { .. } | TypeExpr::Function { .. } => {
                log::debug!("unsupported type expression {expr:?}");
                None
            }
            TypeExpr::ArrayTuple(_) | TypeExpr::StringLiteral(_) | TypeExpr::NumberLiteral(_) => {
                log::debug!("unresolved type expression {expr:?}");
                None
            }
        }
    }
}
