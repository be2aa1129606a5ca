use std::fmt;

use smol_str::SmolStr;

use crate::{AValId, TyId, TypeCx, Weight};

/// A propagation target that reacts to each type delivered to the value it
/// is attached to. Constraints run while the worklist is draining.
pub trait Constraint: fmt::Debug {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, weight: Weight);
}

/// Pushes the instance object of every function arriving at the watched
/// value into `target`.
#[derive(Debug)]
pub struct InstanceOf {
    pub target: AValId,
}

impl Constraint for InstanceOf {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, weight: Weight) {
        if !cx.ty(ty).is_fn() {
            return;
        }
        if let Some(instance) = cx.instance_of(ty) {
            cx.add_type(self.target, instance, weight);
        }
    }
}

/// `obj.prop` read into `target`.
#[derive(Debug)]
pub struct PropOf {
    pub prop: SmolStr,
    pub target: AValId,
}

impl Constraint for PropOf {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, weight: Weight) {
        if let Some(val) = cx.read_prop(ty, &self.prop) {
            cx.propagate(val, self.target, weight);
        }
    }
}

/// `obj.prop = value`. When `method` is set it is the function being
/// stored, and receives the object (or the prototype's instance) as `this`.
///
/// The stored value keeps its own weight whatever the weight of the object
/// it was stored on, so assignments onto placeholder namespaces are not
/// demoted.
#[derive(Debug)]
pub struct SetProp {
    pub prop: SmolStr,
    pub value: AValId,
    pub method: Option<TyId>,
}

impl Constraint for SetProp {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, _weight: Weight) {
        if cx.ty(ty).obj().is_none() {
            return;
        }
        let slot = cx.def_prop(ty, &self.prop);
        cx.propagate(self.value, slot, Weight::DEFAULT);
        if let Some(method) = self.method {
            cx.bind_receiver(method, ty, Weight::DEFAULT);
        }
    }
}

/// `callee(args...)` with its result flowing into `target`.
#[derive(Debug)]
pub struct CallResult {
    pub args: Vec<AValId>,
    pub target: AValId,
}

impl Constraint for CallResult {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, weight: Weight) {
        let Some(func) = cx.as_fn(ty) else {
            return;
        };
        let (params, retval) = (func.args.clone(), func.retval);
        for (arg, param) in self.args.iter().zip(params) {
            cx.propagate(*arg, param, weight);
        }
        cx.propagate(retval, self.target, weight);
    }
}

/// `new callee(args...)`: the instance becomes both the result and the
/// callee's receiver.
#[derive(Debug)]
pub struct NewInstance {
    pub args: Vec<AValId>,
    pub target: AValId,
}

impl Constraint for NewInstance {
    fn add_type(&self, cx: &mut TypeCx, ty: TyId, weight: Weight) {
        let Some(func) = cx.as_fn(ty) else {
            return;
        };
        let (params, self_ty) = (func.args.clone(), func.self_ty);
        for (arg, param) in self.args.iter().zip(params) {
            cx.propagate(*arg, param, weight);
        }
        if let Some(instance) = cx.instance_of(ty) {
            cx.add_type(self_ty, instance, weight);
            cx.add_type(self.target, instance, weight);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::PrimitiveTy;

    #[test]
    fn prop_of_follows_later_objects() {
        let mut cx = TypeCx::new();
        let num = cx.prim_ty(PrimitiveTy::Number);
        let (obj_val, out) = (cx.new_aval(), cx.new_aval());
        cx.attach(
            obj_val,
            Rc::new(PropOf {
                prop: "x".into(),
                target: out,
            }),
        );
        let obj = cx.new_obj(None);
        let slot = cx.def_prop(obj, "x");
        cx.add_type(slot, num, Weight::DEFAULT);
        cx.add_type(obj_val, obj, Weight::DEFAULT);
        assert_eq!(cx.get_type(out), Some(num));
    }

    #[test]
    fn set_prop_on_prototype_binds_instance_receiver() {
        let mut cx = TypeCx::new();
        let ctor = cx.new_fn(Some("Foo".into()), Vec::new());
        let method = cx.new_fn(None, Vec::new());
        let proto = cx.fn_prototype(ctor).unwrap();
        let (target, value) = (cx.new_aval(), cx.new_aval());
        cx.add_type(value, method, Weight::DEFAULT);
        cx.attach(
            target,
            Rc::new(SetProp {
                prop: "bar".into(),
                value,
                method: Some(method),
            }),
        );
        cx.add_type(target, proto, Weight::DEFAULT);

        let slot = cx.own_prop(proto, "bar").unwrap();
        assert_eq!(cx.get_type(slot), Some(method));
        let receiver = cx.as_fn(method).unwrap().self_ty;
        assert_eq!(cx.get_type(receiver), cx.instance_of(ctor));
    }

    #[test]
    fn new_instance_yields_instance() {
        let mut cx = TypeCx::new();
        let ctor = cx.new_fn(Some("Foo".into()), vec!["a".into()]);
        let (callee, arg, out) = (cx.new_aval(), cx.prim_aval(PrimitiveTy::String), cx.new_aval());
        cx.attach(
            callee,
            Rc::new(NewInstance {
                args: vec![arg],
                target: out,
            }),
        );
        cx.add_type(callee, ctor, Weight::DEFAULT);
        let instance = cx.instance_of(ctor);
        assert_eq!(cx.get_type(out), instance);
        let param = cx.as_fn(ctor).unwrap().args[0];
        assert_eq!(cx.get_type(param), Some(cx.prim_ty(PrimitiveTy::String)));
    }

    #[test]
    fn call_result_forwards_retval_at_edge_weight() {
        let mut cx = TypeCx::new();
        let func = cx.new_fn(None, Vec::new());
        let retval = cx.as_fn(func).unwrap().retval;
        let num = cx.prim_ty(PrimitiveTy::Number);
        cx.add_type(retval, num, Weight::DEFAULT);
        let (callee, out) = (cx.new_aval(), cx.new_aval());
        cx.attach(
            callee,
            Rc::new(CallResult {
                args: Vec::new(),
                target: out,
            }),
        );
        cx.add_type(callee, func, Weight::new(50));
        assert_eq!(cx.aval(out).facts()[0].weight, Weight::new(50));
    }
}
