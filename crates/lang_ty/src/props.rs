use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::{AValId, TyId, TypeCx, Weight, INDEX_PROP};

/// Identity of a property handler, used to avoid registering the same
/// handler twice on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub kind: &'static str,
    pub owner: TyId,
    pub other: Option<TyId>,
}

/// Callback run for each property visible on an object, including the ones
/// defined later and the ones inherited through the prototype chain.
pub trait PropHandler: fmt::Debug {
    fn key(&self) -> HandlerKey;

    /// `local` is true when the property is the object's own.
    fn on_prop(&self, cx: &mut TypeCx, prop: &SmolStr, val: AValId, local: bool);

    /// An inherited property appeared that the object already shadows with
    /// `own`.
    fn on_shadowed(&self, _cx: &mut TypeCx, _prop: &SmolStr, _inherited: AValId, _own: AValId) {}
}

#[derive(Debug, Clone)]
pub enum PropListener {
    /// A child object whose prototype is the observed object.
    Inherit(TyId),
    Handler(Rc<dyn PropHandler>),
}

impl PropListener {
    fn same_as(&self, other: &PropListener) -> bool {
        match (self, other) {
            (PropListener::Inherit(a), PropListener::Inherit(b)) => a == b,
            (PropListener::Handler(a), PropListener::Handler(b)) => a.key() == b.key(),
            _ => false,
        }
    }
}

impl TypeCx {
    pub fn own_prop(&self, obj: TyId, name: &str) -> Option<AValId> {
        self.ty(obj).obj().and_then(|data| data.get(name))
    }

    pub fn has_own_prop(&self, obj: TyId, name: &str) -> bool {
        self.own_prop(obj, name).is_some()
    }

    pub fn proto_of(&self, obj: TyId) -> Option<TyId> {
        self.ty(obj).obj().and_then(|data| data.proto)
    }

    /// Own properties in name order.
    pub fn props(&self, obj: TyId) -> Vec<(SmolStr, AValId)> {
        self.ty(obj)
            .obj()
            .map(|data| data.props.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }

    /// Find `name` on `obj` or up its prototype chain without side effects.
    pub fn lookup_prop(&self, obj: TyId, name: &str) -> Option<AValId> {
        let mut seen = FxHashSet::default();
        let mut current = Some(obj);
        while let Some(id) = current {
            if !seen.insert(id) {
                return None;
            }
            let data = self.ty(id).obj()?;
            if let Some(val) = data.get(name) {
                return Some(val);
            }
            current = data.proto;
        }
        None
    }

    /// Define (or fetch) an own property. Newly defined properties are
    /// announced to every listener of `obj`.
    pub fn def_prop(&mut self, obj: TyId, name: &str) -> AValId {
        let Some(data) = self.ty(obj).obj() else {
            log::debug!("defining `{name}` on non-object {obj:?}");
            return self.new_aval();
        };
        if let Some(val) = data.get(name) {
            return val;
        }
        let pending = self
            .ty_mut(obj)
            .obj_mut()
            .and_then(|data| data.maybe_props.remove(name));
        let val = match pending {
            Some(val) => val,
            None => self.new_aval(),
        };
        let name = SmolStr::new(name);
        if let Some(data) = self.ty_mut(obj).obj_mut() {
            data.props.insert(name.clone(), val);
        }
        self.broadcast(obj, &name, val, true);
        val
    }

    /// Read a property, creating a pending value when the name is not
    /// known yet. Returns `None` for non-objects.
    pub fn read_prop(&mut self, obj: TyId, name: &str) -> Option<AValId> {
        if name == "prototype" && self.ty(obj).is_fn() {
            self.fn_prototype(obj);
            return self.own_prop(obj, name);
        }
        let data = self.ty(obj).obj()?;
        if let Some(val) = data.get(name) {
            return Some(val);
        }
        let sealed = data.sealed;
        let index = data.get(INDEX_PROP);
        if let Some(pending) = data.maybe_props.get(name) {
            return Some(*pending);
        }
        if let Some(val) = self.lookup_prop(obj, name) {
            return Some(val);
        }
        if let (false, Some(index)) = (sealed, index) {
            return Some(index);
        }
        let val = self.new_aval();
        if let Some(data) = self.ty_mut(obj).obj_mut() {
            data.maybe_props.insert(SmolStr::new(name), val);
        }
        self.ensure_listening(obj);
        Some(val)
    }

    /// Subscribe `listener` to every property of `obj`, own and inherited,
    /// present and future. Existing properties are replayed nearest first;
    /// registering the same listener twice does nothing.
    pub fn for_all_props(&mut self, obj: TyId, listener: PropListener) {
        self.ensure_listening(obj);
        {
            let Some(data) = self.ty_mut(obj).obj_mut() else {
                return;
            };
            let listeners = data.listeners.get_or_insert_with(Vec::new);
            if listeners.iter().any(|existing| existing.same_as(&listener)) {
                return;
            }
            listeners.push(listener.clone());
        }

        let mut seen_names = FxHashSet::default();
        let mut visited = FxHashSet::default();
        let mut current = Some(obj);
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            let Some(data) = self.ty(id).obj() else {
                break;
            };
            let own: Vec<(SmolStr, AValId)> =
                data.props.iter().map(|(k, v)| (k.clone(), *v)).collect();
            current = data.proto;
            for (name, val) in own {
                if seen_names.insert(name.clone()) {
                    self.notify(&listener, &name, val, id == obj);
                }
            }
        }
    }

    /// Remove `listener` from `obj`. An object left with no listeners and no
    /// pending reads stops listening to its own prototype.
    pub fn unregister_prop_listener(&mut self, obj: TyId, listener: &PropListener) {
        let Some(data) = self.ty_mut(obj).obj_mut() else {
            return;
        };
        let Some(listeners) = data.listeners.as_mut() else {
            return;
        };
        listeners.retain(|existing| !existing.same_as(listener));
        if !listeners.is_empty() || !data.maybe_props.is_empty() {
            return;
        }
        data.listeners = None;
        if let Some(proto) = data.proto {
            self.unregister_prop_listener(proto, &PropListener::Inherit(obj));
        }
    }

    /// Re-parent `obj`. A listening object moves its subscription from the
    /// old prototype to the new one and receives the new chain's properties.
    pub fn set_proto(&mut self, obj: TyId, proto: TyId) {
        let Some(data) = self.ty(obj).obj() else {
            return;
        };
        if data.proto == Some(proto) {
            return;
        }
        let old = data.proto;
        let listening = data.listeners.is_some();
        if let (true, Some(old)) = (listening, old) {
            self.unregister_prop_listener(old, &PropListener::Inherit(obj));
        }
        if let Some(data) = self.ty_mut(obj).obj_mut() {
            data.proto = Some(proto);
        }
        if listening {
            self.for_all_props(proto, PropListener::Inherit(obj));
        }
    }

    fn ensure_listening(&mut self, obj: TyId) {
        let Some(data) = self.ty_mut(obj).obj_mut() else {
            return;
        };
        if data.listeners.is_some() {
            return;
        }
        data.listeners = Some(Vec::new());
        if let Some(proto) = data.proto {
            self.for_all_props(proto, PropListener::Inherit(obj));
        }
    }

    fn broadcast(&mut self, obj: TyId, name: &SmolStr, val: AValId, local: bool) {
        let listeners = match self.ty(obj).obj().and_then(|data| data.listeners.clone()) {
            Some(listeners) => listeners,
            None => return,
        };
        for listener in &listeners {
            self.notify(listener, name, val, local);
        }
    }

    fn notify(&mut self, listener: &PropListener, name: &SmolStr, val: AValId, local: bool) {
        match listener {
            PropListener::Inherit(child) => self.on_proto_prop(*child, name, val),
            PropListener::Handler(handler) => handler.clone().on_prop(self, name, val, local),
        }
    }

    fn on_proto_prop(&mut self, obj: TyId, name: &SmolStr, val: AValId) {
        let Some(data) = self.ty(obj).obj() else {
            return;
        };
        if let Some(own) = data.get(name) {
            let handlers: Vec<_> = data
                .listeners
                .iter()
                .flatten()
                .filter_map(|listener| match listener {
                    PropListener::Handler(handler) => Some(handler.clone()),
                    PropListener::Inherit(_) => None,
                })
                .collect();
            for handler in handlers {
                handler.on_shadowed(self, name, val, own);
            }
            return;
        }
        if let Some(pending) = data.maybe_props.get(name).copied() {
            self.propagate(val, pending, Weight::DEFAULT);
        }
        self.broadcast(obj, name, val, false);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{PrimitiveTy, Ty};

    fn is_listening(cx: &TypeCx, obj: TyId) -> bool {
        matches!(cx.ty(obj), Ty::Obj(data) if data.listeners.is_some())
    }

    #[derive(Debug, Default)]
    struct Recorder {
        owner: Option<TyId>,
        seen: RefCell<Vec<(SmolStr, bool)>>,
        shadowed: RefCell<Vec<SmolStr>>,
    }

    impl PropHandler for Recorder {
        fn key(&self) -> HandlerKey {
            HandlerKey {
                kind: "recorder",
                owner: self.owner.expect("owner set"),
                other: None,
            }
        }

        fn on_prop(&self, _cx: &mut TypeCx, prop: &SmolStr, _val: AValId, local: bool) {
            self.seen.borrow_mut().push((prop.clone(), local));
        }

        fn on_shadowed(&self, _cx: &mut TypeCx, prop: &SmolStr, _inherited: AValId, _own: AValId) {
            self.shadowed.borrow_mut().push(prop.clone());
        }
    }

    #[test]
    fn pending_read_is_promoted_by_definition() {
        let mut cx = TypeCx::new();
        let obj = cx.new_obj(None);
        let read = cx.read_prop(obj, "x").unwrap();
        let defined = cx.def_prop(obj, "x");
        assert_eq!(read, defined);
    }

    #[test]
    fn pending_read_receives_inherited_definition() {
        let mut cx = TypeCx::new();
        let num = cx.prim_ty(PrimitiveTy::Number);
        let parent = cx.new_obj(None);
        let child = cx.new_obj(None);
        cx.set_proto(child, parent);
        let read = cx.read_prop(child, "x").unwrap();
        let slot = cx.def_prop(parent, "x");
        cx.add_type(slot, num, Weight::DEFAULT);
        assert_eq!(cx.get_type(read), Some(num));
        assert_eq!(cx.lookup_prop(child, "x"), Some(slot));
    }

    #[test]
    fn handler_replays_nearest_first_and_sees_later_props() {
        let mut cx = TypeCx::new();
        let parent = cx.new_obj(None);
        let child = cx.new_obj(None);
        cx.def_prop(parent, "shared");
        cx.def_prop(parent, "inherited");
        cx.def_prop(child, "shared");
        cx.set_proto(child, parent);

        let recorder = Rc::new(Recorder {
            owner: Some(child),
            ..Default::default()
        });
        cx.for_all_props(child, PropListener::Handler(recorder.clone()));
        cx.for_all_props(child, PropListener::Handler(recorder.clone()));
        cx.def_prop(child, "later");
        cx.def_prop(parent, "later_parent");

        let seen = recorder.seen.borrow().clone();
        assert_eq!(
            seen,
            vec![
                ("shared".into(), true),
                ("inherited".into(), false),
                ("later".into(), true),
                ("later_parent".into(), false),
            ]
        );
    }

    #[test]
    fn set_proto_moves_subscription() {
        let mut cx = TypeCx::new();
        let old = cx.new_obj(None);
        let new = cx.new_obj(None);
        let child = cx.new_obj(None);
        cx.set_proto(child, old);
        let recorder = Rc::new(Recorder {
            owner: Some(child),
            ..Default::default()
        });
        cx.for_all_props(child, PropListener::Handler(recorder.clone()));
        assert!(is_listening(&cx, old));

        cx.def_prop(new, "from_new");
        cx.set_proto(child, new);
        assert!(!is_listening(&cx, old));
        cx.def_prop(old, "from_old");

        let names: Vec<_> = recorder.seen.borrow().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec![SmolStr::new("from_new")]);
    }

    #[test]
    fn sealed_objects_do_not_fall_back_to_index() {
        let mut cx = TypeCx::new();
        let open = cx.new_obj(None);
        let index = cx.def_prop(open, INDEX_PROP);
        assert_eq!(cx.read_prop(open, "anything"), Some(index));

        let sealed = cx.new_sealed_obj(None);
        let index = cx.def_prop(sealed, INDEX_PROP);
        assert_ne!(cx.read_prop(sealed, "anything"), Some(index));
    }

    #[test]
    fn reading_fn_prototype_creates_it() {
        let mut cx = TypeCx::new();
        let func = cx.new_fn(Some("Foo".into()), Vec::new());
        let slot = cx.read_prop(func, "prototype").unwrap();
        let proto = cx.get_type(slot).unwrap();
        assert!(cx.ty(proto).obj().unwrap().is_prototype());
        assert_eq!(cx.fn_prototype(func), Some(proto));
    }

    #[test]
    fn primitives_have_no_props() {
        let mut cx = TypeCx::new();
        let num = cx.prim_ty(PrimitiveTy::Number);
        assert_eq!(cx.read_prop(num, "x"), None);
        assert_eq!(cx.lookup_prop(num, "x"), None);
    }

    #[test]
    fn shadowed_inherited_props_reach_handlers() {
        let mut cx = TypeCx::new();
        let parent = cx.new_obj(None);
        let child = cx.new_obj(None);
        cx.set_proto(child, parent);
        cx.def_prop(child, "m");
        let recorder = Rc::new(Recorder {
            owner: Some(child),
            ..Default::default()
        });
        cx.for_all_props(child, PropListener::Handler(recorder.clone()));
        cx.def_prop(parent, "m");
        cx.def_prop(parent, "other");
        assert_eq!(recorder.shadowed.borrow().clone(), vec![SmolStr::new("m")]);
        assert_eq!(
            recorder.seen.borrow().clone(),
            vec![("m".into(), true), ("other".into(), false)]
        );
    }
}
