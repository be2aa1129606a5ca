use std::rc::Rc;

use lang_ty::{AValId, Constraint, SetProp, TyId, TypeCx, Weight};
use smol_str::SmolStr;

use crate::annotation::AnnotationRecord;
use crate::infer::shape_constructor;
use crate::inherit::{ImplementsInterface, IsSuperclassInstance};

/// Where the value of an annotated declaration lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteValue {
    /// Variables, function declarations and object literal keys.
    Slot(AValId),
    /// `object.prop = ...` and bare `object.prop;` declarations. The object
    /// is only known through the types arriving at its value.
    Member { object: AValId, prop: SmolStr },
}

/// An annotated declaration as seen after inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclSite {
    /// Dotted name of the declaration, given to synthesized functions.
    pub name: Option<SmolStr>,
    pub value: SiteValue,
    /// The function literal declared here, if any.
    pub func: Option<TyId>,
    pub initialized: bool,
}

/// Sets the documentation of a property on every object arriving at the
/// watched value.
#[derive(Debug)]
struct PropDoc {
    prop: SmolStr,
    doc: SmolStr,
}

impl Constraint for PropDoc {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, _weight: Weight) {
        if cx.ty(ty).obj().is_none() {
            return;
        }
        let slot = cx.def_prop(ty, &self.prop);
        cx.set_doc(slot, self.doc.clone());
    }
}

/// Merge one declaration's annotations into the inferred values.
pub fn apply_annotation(cx: &mut TypeCx, site: &DeclSite, record: &AnnotationRecord) {
    match site.func.or_else(|| expected_fn(cx, site, record)) {
        Some(func) => apply_to_fn(cx, func, record),
        None => apply_to_value(cx, site, record),
    }
}

/// A commented declaration without a function literal is still treated as
/// a function when its tags only make sense on one, or when it is left
/// uninitialized with no type of its own.
fn expected_fn(cx: &mut TypeCx, site: &DeclSite, record: &AnnotationRecord) -> Option<TyId> {
    let bare = !site.initialized && !record.declares_value;
    if !record.has_fn_tags() && !bare {
        return None;
    }

    let arg_names = record.params.iter().map(|param| param.name.clone()).collect();
    let func = cx.new_fn(site.name.clone(), arg_names);
    if record.is_ctor || record.is_interface {
        shape_constructor(cx, func);
    }
    log::trace!("synthesized {} for {:?}", cx.display_ty(func), site.name);

    match &site.value {
        SiteValue::Slot(slot) => cx.add_type(*slot, func, Weight::DEFAULT),
        SiteValue::Member { object, prop } => {
            let value = cx.new_aval();
            cx.add_type(value, func, Weight::DEFAULT);
            cx.attach(
                *object,
                Rc::new(SetProp {
                    prop: prop.clone(),
                    value,
                    method: Some(func),
                }),
            );
        }
    }
    Some(func)
}

fn apply_to_fn(cx: &mut TypeCx, func: TyId, record: &AnnotationRecord) {
    let Some(data) = cx.as_fn(func) else {
        return;
    };
    let (args, arg_names, retval) = (data.args.clone(), data.arg_names.clone(), data.retval);

    for (arg, name) in args.iter().zip(&arg_names) {
        let Some(param) = record.param(name) else {
            continue;
        };
        if let Some(ty) = param.ty {
            cx.propagate(ty, *arg, Weight::DEFAULT);
        }
        if let Some(doc) = &param.doc {
            cx.set_doc(*arg, doc.clone());
        }
    }

    if let Some(ty) = record.return_type {
        cx.propagate(ty, retval, Weight::DEFAULT);
    }
    if let Some(doc) = &record.return_doc {
        cx.set_doc(retval, doc.clone());
    }
    if let Some(doc) = &record.description {
        cx.set_fn_doc(func, doc.clone());
    }

    if let Some(super_type) = record.super_type {
        if cx.has_own_prop(func, "prototype") {
            cx.attach(super_type, Rc::new(IsSuperclassInstance::new(func)));
        } else {
            log::debug!("@extends on {} without a prototype", cx.display_ty(func));
        }
    }
    for interface in &record.interfaces {
        cx.attach(*interface, Rc::new(ImplementsInterface { ctor: func }));
    }
}

fn apply_to_value(cx: &mut TypeCx, site: &DeclSite, record: &AnnotationRecord) {
    let Some(ty) = record.value_type else {
        return;
    };
    let doc = record.doc_for_value().cloned();
    match &site.value {
        SiteValue::Slot(slot) => {
            cx.propagate(ty, *slot, Weight::DEFAULT);
            if let Some(doc) = doc {
                cx.set_doc(*slot, doc);
            }
        }
        SiteValue::Member { object, prop } => {
            let value = cx.new_aval();
            cx.propagate(ty, value, Weight::DEFAULT);
            cx.attach(
                *object,
                Rc::new(SetProp {
                    prop: prop.clone(),
                    value,
                    method: None,
                }),
            );
            if let Some(doc) = doc {
                cx.attach(
                    *object,
                    Rc::new(PropDoc {
                        prop: prop.clone(),
                        doc,
                    }),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use comment_parser::parse_comment;
    use lang_ty::PrimitiveTy;

    use super::*;
    use crate::registry::QualifiedNameRegistry;
    use crate::resolve::TypeResolver;

    fn apply_str(cx: &mut TypeCx, registry: &mut QualifiedNameRegistry, site: &DeclSite, raw: &str) {
        let comment = parse_comment(raw);
        let record = AnnotationRecord::from_comment(&comment, &mut TypeResolver::new(cx, registry));
        apply_annotation(cx, site, &record);
    }

    fn slot_site(slot: AValId, func: Option<TyId>, initialized: bool) -> DeclSite {
        DeclSite {
            name: Some("decl".into()),
            value: SiteValue::Slot(slot),
            func,
            initialized,
        }
    }

    #[test]
    fn value_type_and_doc_land_on_the_value() {
        let mut cx = TypeCx::new();
        let mut registry = QualifiedNameRegistry::new(&cx);
        let slot = cx.new_aval();
        apply_str(
            &mut cx,
            &mut registry,
            &slot_site(slot, None, false),
            "/** @type {number} Some docs. */",
        );
        assert_eq!(cx.display(slot), "number");
        assert_eq!(cx.doc_of(slot).as_deref(), Some("Some docs."));
        assert_eq!(cx.aval(cx.prim_aval(PrimitiveTy::Number)).doc(), None);
    }

    #[test]
    fn unmatched_params_are_ignored() {
        let mut cx = TypeCx::new();
        let mut registry = QualifiedNameRegistry::new(&cx);
        let func = cx.new_fn(Some("f".into()), vec!["a".into(), "b".into()]);
        let slot = cx.new_aval();
        cx.add_type(slot, func, Weight::DEFAULT);
        apply_str(
            &mut cx,
            &mut registry,
            &slot_site(slot, Some(func), true),
            "/**\n * Docs.\n * @param {string} b Second.\n * @param {number} missing\n * @return {bool}\n */",
        );
        assert_eq!(cx.display_ty(func), "fn(a: ?, b: string) -> bool");
        assert_eq!(cx.fn_doc(func).as_deref(), Some("Docs."));
        let b = cx.as_fn(func).unwrap().args[1];
        assert_eq!(cx.doc_of(b).as_deref(), Some("Second."));
    }

    #[test]
    fn uninitialized_declarations_become_functions() {
        let mut cx = TypeCx::new();
        let mut registry = QualifiedNameRegistry::new(&cx);
        let slot = cx.new_aval();
        apply_str(&mut cx, &mut registry, &slot_site(slot, None, false), "/** Just docs. */");
        assert_eq!(cx.display(slot), "fn()");

        let typed = cx.new_aval();
        apply_str(&mut cx, &mut registry, &slot_site(typed, None, false), "/** @type {string} */");
        assert_eq!(cx.display(typed), "string");

        let initialized = cx.new_aval();
        apply_str(&mut cx, &mut registry, &slot_site(initialized, None, true), "/** Docs. */");
        assert_eq!(cx.display(initialized), "?");

        let unsupported = cx.new_aval();
        apply_str(
            &mut cx,
            &mut registry,
            &slot_site(unsupported, None, false),
            "/** @type {function(A): B} */",
        );
        assert_eq!(cx.display(unsupported), "?");
    }

    #[test]
    fn synthesized_constructor_has_prototype() {
        let mut cx = TypeCx::new();
        let mut registry = QualifiedNameRegistry::new(&cx);
        let slot = cx.new_aval();
        apply_str(
            &mut cx,
            &mut registry,
            &slot_site(slot, None, true),
            "/** @constructor\n * @param {Property} first */",
        );
        let func = cx.effective_fn(slot).unwrap();
        assert!(cx.has_own_prop(func, "prototype"));
        assert_eq!(cx.display(slot), "fn(first: Property)");
        let self_ty = cx.as_fn(func).unwrap().self_ty;
        assert_eq!(cx.display(self_ty), "decl");
    }

    #[test]
    fn member_sites_follow_the_object() {
        let mut cx = TypeCx::new();
        let mut registry = QualifiedNameRegistry::new(&cx);
        let object = cx.new_aval();
        let site = DeclSite {
            name: None,
            value: SiteValue::Member {
                object,
                prop: "myProperty".into(),
            },
            func: None,
            initialized: true,
        };
        apply_str(&mut cx, &mut registry, &site, "/** @private {Property} The property. */");
        let obj = cx.new_obj(None);
        cx.add_type(object, obj, Weight::DEFAULT);
        let slot = cx.own_prop(obj, "myProperty").unwrap();
        assert_eq!(cx.display(slot), "Property");
        assert_eq!(cx.doc_of(slot).as_deref(), Some("The property."));
    }
}
