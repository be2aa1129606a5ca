// ==============================================================================
// Annotation attachment
// ==============================================================================
//
// Binds the doc comments recorded by the parser to declarations. Runs twice
// per module: before inference to find the functions documented as
// constructors, and after it to apply every comment to the values inference
// produced.

use comment_parser::{parse_comment, DocComment};
use lang_ast::{DocTarget, Expr, ExprId, Module, Stmt};
use lang_ty::TypeCx;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::annotation::{declares_constructor, AnnotationRecord};
use crate::apply::{apply_annotation, DeclSite, SiteValue};
use crate::infer::FileFacts;
use crate::registry::QualifiedNameRegistry;
use crate::resolve::TypeResolver;

/// Every doc comment of the module, parsed, in source order.
pub fn parse_comments(module: &Module) -> Vec<(DocTarget, DocComment)> {
    let mut comments: Vec<(usize, DocTarget, DocComment)> = module
        .docs
        .iter()
        .map(|(target, raw)| (target_offset(module, target), target, parse_comment(raw)))
        .collect();
    comments.sort_by_key(|(offset, _, _)| *offset);
    comments
        .into_iter()
        .map(|(_, target, comment)| (target, comment))
        .collect()
}

fn target_offset(module: &Module, target: DocTarget) -> usize {
    match target {
        DocTarget::Stmt(stmt) => module.stmt_span(stmt).start,
        DocTarget::Property(obj, idx) => match &module[obj] {
            Expr::Object(props) => props
                .get(idx)
                .map_or(module.expr_span(obj).start, |prop| {
                    module.expr_span(prop.value).start
                }),
            _ => module.expr_span(obj).start,
        },
    }
}

/// The function literal a documented declaration defines, if any.
pub fn declared_function(module: &Module, target: DocTarget) -> Option<ExprId> {
    let value = match target {
        DocTarget::Stmt(stmt) => match &module[stmt] {
            Stmt::Var { init, .. } => (*init)?,
            Stmt::FunctionDecl { func, .. } => *func,
            Stmt::Expr(expr) => match &module[*expr] {
                Expr::Assign { value, .. } => *value,
                _ => return None,
            },
            _ => return None,
        },
        DocTarget::Property(obj, idx) => match &module[obj] {
            Expr::Object(props) => props.get(idx)?.value,
            _ => return None,
        },
    };
    matches!(module[value], Expr::Function(_)).then_some(value)
}

/// Pre-pass: function literals documented with `@constructor` or
/// `@interface`.
pub fn constructor_functions(
    module: &Module,
    comments: &[(DocTarget, DocComment)],
) -> FxHashSet<ExprId> {
    comments
        .iter()
        .filter(|(_, comment)| declares_constructor(comment))
        .filter_map(|(target, _)| declared_function(module, *target))
        .collect()
}

/// The declaration a comment is attached to, in terms of inferred values.
pub fn decl_site(
    cx: &TypeCx,
    module: &Module,
    facts: &FileFacts,
    target: DocTarget,
) -> Option<DeclSite> {
    let func = declared_function(module, target).and_then(|expr| facts.fn_tys.get(expr).copied());
    match target {
        DocTarget::Stmt(stmt) => match &module[stmt] {
            Stmt::Var { name, init, .. } => Some(DeclSite {
                name: Some(name.clone()),
                value: SiteValue::Slot(*facts.decl_slots.get(stmt)?),
                func,
                initialized: init.is_some(),
            }),
            Stmt::FunctionDecl { name, .. } => Some(DeclSite {
                name: Some(name.clone()),
                value: SiteValue::Slot(*facts.decl_slots.get(stmt)?),
                func,
                initialized: true,
            }),
            Stmt::Expr(expr) => match &module[*expr] {
                Expr::Assign { target, .. } => Some(DeclSite {
                    name: module.static_path(*target).map(SmolStr::from),
                    value: target_value(module, facts, *target)?,
                    func,
                    initialized: true,
                }),
                Expr::Member { .. } => Some(DeclSite {
                    name: module.static_path(*expr).map(SmolStr::from),
                    value: target_value(module, facts, *expr)?,
                    func: None,
                    initialized: false,
                }),
                _ => None,
            },
            _ => None,
        },
        DocTarget::Property(obj, idx) => {
            let Expr::Object(props) = &module[obj] else {
                return None;
            };
            let prop = props.get(idx)?;
            let obj_ty = facts.obj_tys.get(obj).copied()?;
            Some(DeclSite {
                name: Some(prop.key.clone()),
                value: SiteValue::Slot(cx.own_prop(obj_ty, &prop.key)?),
                func,
                initialized: true,
            })
        }
    }
}

fn target_value(module: &Module, facts: &FileFacts, target: ExprId) -> Option<SiteValue> {
    match &module[target] {
        Expr::Ident(_) => facts.expr_avals.get(target).copied().map(SiteValue::Slot),
        Expr::Member { object, prop } => Some(SiteValue::Member {
            object: facts.expr_avals.get(*object).copied()?,
            prop: prop.clone(),
        }),
        _ => None,
    }
}

/// Post-pass: resolve and apply every comment of the module.
pub fn apply_comments(
    cx: &mut TypeCx,
    registry: &mut QualifiedNameRegistry,
    module: &Module,
    facts: &FileFacts,
    comments: &[(DocTarget, DocComment)],
) {
    for (target, comment) in comments {
        let Some(site) = decl_site(cx, module, facts, *target) else {
            log::trace!("doc comment on {target:?} documents nothing");
            continue;
        };
        let record = AnnotationRecord::from_comment(comment, &mut TypeResolver::new(cx, registry));
        apply_annotation(cx, &site, &record);
    }
}
