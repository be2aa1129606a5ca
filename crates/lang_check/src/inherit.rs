// ==============================================================================
// Inheritance linking
// ==============================================================================
//
// `@extends` splices a constructor's prototype onto the superclass instance
// once that instance shows up, and methods the subclass prototype redefines
// are linked to the ancestor version they override. Either side may resolve
// first: an override is noticed when the subclass defines a property that
// already exists up the chain, and when the chain gains a property the
// subclass already shadows.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lang_ty::{
    AValId, Constraint, HandlerKey, PropHandler, PropListener, TyId, TypeCx, Weight,
};
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

/// The object behind `ctor.prototype`, if the constructor exposes one.
fn prototype_of(cx: &TypeCx, ctor: TyId) -> Option<TyId> {
    let slot = cx.own_prop(ctor, "prototype")?;
    cx.get_type(slot).filter(|ty| cx.ty(*ty).obj().is_some())
}

/// Attached to the instance value of a superclass. Re-parents the prototype
/// of `child_ctor` onto every object instance that arrives, unless a heavier
/// one was spliced in already.
#[derive(Debug)]
pub struct IsSuperclassInstance {
    child_ctor: TyId,
    spliced: Cell<Option<Weight>>,
}

impl IsSuperclassInstance {
    pub fn new(child_ctor: TyId) -> Self {
        Self {
            child_ctor,
            spliced: Cell::new(None),
        }
    }
}

impl Constraint for IsSuperclassInstance {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, weight: Weight) {
        if !cx.ty(ty).is_plain_obj() {
            return;
        }
        if self.spliced.get().is_some_and(|best| weight < best) {
            log::trace!("keeping heavier superclass over {ty:?}@{}", weight.get());
            return;
        }
        let Some(proto) = prototype_of(cx, self.child_ctor) else {
            return;
        };
        if cx.chain_contains(ty, proto) {
            log::debug!("not splicing {proto:?} onto {ty:?}: the chain would loop");
            return;
        }

        self.spliced.set(Some(weight));
        log::debug!(
            "splicing {} onto {}",
            cx.display_ty(proto),
            cx.display_ty(ty)
        );
        cx.for_all_props(
            proto,
            PropListener::Handler(Rc::new(OverrideScan {
                proto,
                interface: None,
            })),
        );
        cx.set_proto(proto, ty);
    }
}

/// Attached to the instance value of an implemented interface. Links the
/// constructor's methods to the interface's without touching the prototype
/// chain.
#[derive(Debug)]
pub struct ImplementsInterface {
    pub ctor: TyId,
}

impl Constraint for ImplementsInterface {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, _weight: Weight) {
        if !cx.ty(ty).is_plain_obj() {
            return;
        }
        let Some(proto) = prototype_of(cx, self.ctor) else {
            return;
        };
        if proto == ty {
            return;
        }
        cx.for_all_props(
            proto,
            PropListener::Handler(Rc::new(OverrideScan {
                proto,
                interface: Some(ty),
            })),
        );
        cx.for_all_props(
            ty,
            PropListener::Handler(Rc::new(InterfaceScan {
                interface: ty,
                proto,
            })),
        );
    }
}

/// Watches a subclass prototype. Own properties are matched against the
/// ancestors (the prototype chain, or `interface` when set).
#[derive(Debug)]
struct OverrideScan {
    proto: TyId,
    interface: Option<TyId>,
}

impl PropHandler for OverrideScan {
    fn key(&self) -> HandlerKey {
        HandlerKey {
            kind: "override-scan",
            owner: self.proto,
            other: self.interface,
        }
    }

    fn on_prop(&self, cx: &mut TypeCx, prop: &SmolStr, val: AValId, local: bool) {
        if !local {
            return;
        }
        let ancestors = match self.interface {
            Some(interface) => Some(interface),
            None => cx.proto_of(self.proto),
        };
        if let Some(ancestor) = ancestors.and_then(|obj| cx.lookup_prop(obj, prop)) {
            link_override(cx, val, ancestor);
        }
    }

    fn on_shadowed(&self, cx: &mut TypeCx, _prop: &SmolStr, inherited: AValId, own: AValId) {
        if self.interface.is_none() {
            link_override(cx, own, inherited);
        }
    }
}

/// Watches an interface instance for members the implementing prototype
/// already defines.
#[derive(Debug)]
struct InterfaceScan {
    interface: TyId,
    proto: TyId,
}

impl PropHandler for InterfaceScan {
    fn key(&self) -> HandlerKey {
        HandlerKey {
            kind: "interface-scan",
            owner: self.interface,
            other: Some(self.proto),
        }
    }

    fn on_prop(&self, cx: &mut TypeCx, prop: &SmolStr, val: AValId, _local: bool) {
        if let Some(own) = cx.own_prop(self.proto, prop) {
            link_override(cx, own, val);
        }
    }
}

/// Make `descendant` receive the signature of every function stored in
/// `ancestor`. Linking the same pair again does nothing.
pub fn link_override(cx: &mut TypeCx, descendant: AValId, ancestor: AValId) {
    if descendant == ancestor || !cx.mark_linked(descendant, ancestor) {
        return;
    }
    log::trace!("override link {ancestor:?} -> {descendant:?}");
    cx.attach(
        ancestor,
        Rc::new(ForwardAncestor {
            descendant,
            seen: RefCell::default(),
        }),
    );
}

/// For each ancestor function, waits for the descendant's functions.
#[derive(Debug)]
struct ForwardAncestor {
    descendant: AValId,
    seen: RefCell<FxHashSet<TyId>>,
}

impl Constraint for ForwardAncestor {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, _weight: Weight) {
        if !cx.ty(ty).is_fn() || !self.seen.borrow_mut().insert(ty) {
            return;
        }
        cx.attach(self.descendant, Rc::new(InheritSignature { parent: ty }));
    }
}

/// Forwards `parent`'s result and positional parameters into each function
/// arriving at the overriding value. The override's own documentation, when
/// it has any, stays in front of the parent's.
#[derive(Debug)]
struct InheritSignature {
    parent: TyId,
}

impl Constraint for InheritSignature {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, _weight: Weight) {
        if ty == self.parent {
            return;
        }
        let (Some(parent), Some(child)) = (cx.as_fn(self.parent), cx.as_fn(ty)) else {
            return;
        };
        let (parent_args, parent_ret) = (parent.args.clone(), parent.retval);
        let (child_args, child_ret) = (child.args.clone(), child.retval);

        cx.propagate(parent_ret, child_ret, Weight::DEFAULT);
        for (from, to) in parent_args.into_iter().zip(child_args) {
            cx.propagate(from, to, Weight::DEFAULT);
        }
        cx.inherit_fn_doc(ty, self.parent);
    }
}

#[cfg(test)]
mod tests {
    use lang_ty::PrimitiveTy;

    use super::*;

    struct Class {
        ctor: TyId,
        proto: TyId,
        instance: AValId,
    }

    fn class(cx: &mut TypeCx, name: &str) -> Class {
        let ctor = cx.new_fn(Some(name.into()), Vec::new());
        let proto = cx.fn_prototype(ctor).unwrap();
        let instance_ty = cx.instance_of(ctor).unwrap();
        let instance = cx.new_aval();
        cx.add_type(instance, instance_ty, Weight::DEFAULT);
        Class {
            ctor,
            proto,
            instance,
        }
    }

    fn method(cx: &mut TypeCx, owner: TyId, name: &str, args: &[&str]) -> TyId {
        let func = cx.new_fn(Some(name.into()), args.iter().map(|a| (*a).into()).collect());
        let slot = cx.def_prop(owner, name);
        cx.add_type(slot, func, Weight::DEFAULT);
        func
    }

    fn extend(cx: &mut TypeCx, child: &Class, parent: &Class) {
        cx.attach(parent.instance, Rc::new(IsSuperclassInstance::new(child.ctor)));
    }

    #[test]
    fn splice_exposes_parent_members() {
        let mut cx = TypeCx::new();
        let parent = class(&mut cx, "Parent");
        let child = class(&mut cx, "Child");
        extend(&mut cx, &child, &parent);
        let parent_instance = cx.instance_of(parent.ctor).unwrap();
        assert_eq!(cx.proto_of(child.proto), Some(parent_instance));

        let later = cx.def_prop(parent.proto, "later");
        let child_instance = cx.instance_of(child.ctor).unwrap();
        assert_eq!(cx.lookup_prop(child_instance, "later"), Some(later));
    }

    #[test]
    fn override_gets_parent_signature_either_order() {
        for parent_first in [true, false] {
            let mut cx = TypeCx::new();
            let parent = class(&mut cx, "Parent");
            let child = class(&mut cx, "Child");
            let (parent_m, child_m) = if parent_first {
                let p = method(&mut cx, parent.proto, "m", &["x"]);
                extend(&mut cx, &child, &parent);
                (p, method(&mut cx, child.proto, "m", &["x"]))
            } else {
                let c = method(&mut cx, child.proto, "m", &["x"]);
                extend(&mut cx, &child, &parent);
                (method(&mut cx, parent.proto, "m", &["x"]), c)
            };
            let (p_arg, p_ret) = {
                let func = cx.as_fn(parent_m).unwrap();
                (func.args[0], func.retval)
            };
            cx.propagate(cx.prim_aval(PrimitiveTy::Number), p_arg, Weight::DEFAULT);
            cx.propagate(cx.prim_aval(PrimitiveTy::String), p_ret, Weight::DEFAULT);
            cx.set_fn_doc(parent_m, "parent docs");

            assert_eq!(cx.display_ty(child_m), "fn(x: number) -> string", "parent_first={parent_first}");
            assert_eq!(cx.fn_doc(child_m).as_deref(), Some("parent docs"));
        }
    }

    #[test]
    fn own_docs_win_over_inherited() {
        let mut cx = TypeCx::new();
        let parent = class(&mut cx, "Parent");
        let child = class(&mut cx, "Child");
        let parent_m = method(&mut cx, parent.proto, "m", &[]);
        let child_m = method(&mut cx, child.proto, "m", &[]);
        cx.set_fn_doc(parent_m, "D");
        cx.set_fn_doc(child_m, "D2");
        extend(&mut cx, &child, &parent);
        assert_eq!(cx.fn_doc(child_m).as_deref(), Some("D2"));
    }

    #[test]
    fn override_link_fires_once_per_pair() {
        let mut cx = TypeCx::new();
        let (ancestor, descendant) = (cx.new_aval(), cx.new_aval());
        link_override(&mut cx, descendant, ancestor);
        link_override(&mut cx, descendant, ancestor);
        assert!(!cx.mark_linked(descendant, ancestor));

        let parent = cx.new_fn(None, vec!["x".into()]);
        let child = cx.new_fn(None, vec!["x".into()]);
        cx.add_type(descendant, child, Weight::DEFAULT);
        cx.add_type(ancestor, parent, Weight::new(40));
        cx.add_type(ancestor, parent, Weight::DEFAULT);
        let arg = cx.as_fn(parent).unwrap().args[0];
        cx.propagate(cx.prim_aval(PrimitiveTy::Bool), arg, Weight::DEFAULT);
        let child_arg = cx.as_fn(child).unwrap().args[0];
        assert_eq!(cx.aval(child_arg).facts().len(), 1);
    }

    #[test]
    fn lighter_superclass_does_not_displace_heavier() {
        let mut cx = TypeCx::new();
        let real = class(&mut cx, "Real");
        let child = class(&mut cx, "Child");
        let superclass = cx.new_aval();
        cx.attach(superclass, Rc::new(IsSuperclassInstance::new(child.ctor)));
        let real_instance = cx.instance_of(real.ctor).unwrap();
        cx.add_type(superclass, real_instance, Weight::DEFAULT);
        let placeholder = cx.new_obj(Some("Placeholder".into()));
        cx.add_type(superclass, placeholder, Weight::new(50));
        assert_eq!(cx.proto_of(child.proto), Some(real_instance));
    }

    #[test]
    fn splice_refuses_cycles_and_non_objects() {
        let mut cx = TypeCx::new();
        let a = class(&mut cx, "A");
        let b = class(&mut cx, "B");
        extend(&mut cx, &b, &a);
        extend(&mut cx, &a, &b);
        let a_instance = cx.instance_of(a.ctor).unwrap();
        assert!(!cx.chain_contains(a_instance, b.proto));

        let superclass = cx.new_aval();
        cx.attach(superclass, Rc::new(IsSuperclassInstance::new(a.ctor)));
        cx.add_type(superclass, cx.prim_ty(PrimitiveTy::Number), Weight::DEFAULT);
        let func = cx.new_fn(None, Vec::new());
        cx.add_type(superclass, func, Weight::DEFAULT);
        assert_eq!(cx.proto_of(a.proto), None);
    }

    #[test]
    fn interface_members_reach_implementation() {
        let mut cx = TypeCx::new();
        let iface = class(&mut cx, "Iface");
        let imp = class(&mut cx, "Impl");
        let iface_m = method(&mut cx, iface.proto, "method", &["param"]);
        cx.attach(iface.instance, Rc::new(ImplementsInterface { ctor: imp.ctor }));
        let imp_m = method(&mut cx, imp.proto, "method", &["param"]);
        let arg = cx.as_fn(iface_m).unwrap().args[0];
        cx.propagate(cx.prim_aval(PrimitiveTy::String), arg, Weight::DEFAULT);
        assert_eq!(cx.display_ty(imp_m), "fn(param: string)");
        assert_eq!(cx.proto_of(imp.proto), None);
    }
}
