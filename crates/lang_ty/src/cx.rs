use std::collections::VecDeque;
use std::rc::Rc;

use la_arena::Arena;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::aval::{AVal, AValKind, Edge, Fact, Target};
use crate::{AValId, ArrTy, Constraint, FnTy, ObjTy, PrimitiveTy, Ty, TyId, Weight, INDEX_PROP};

// Documentation chains longer than this are treated as cyclic.
const MAX_DOC_DEPTH: usize = 64;

/// Owns every abstract value and type of an analysis session and runs the
/// propagation worklist.
///
/// Facts are delivered through a FIFO queue. Operations called while the
/// queue is draining (from inside a [`Constraint`]) only enqueue, so
/// constraints must not read back the effect of their own writes.
#[derive(Debug)]
pub struct TypeCx {
    avals: Arena<AVal>,
    tys: Arena<Ty>,
    null: AValId,
    prims: [(TyId, AValId); 3],
    top_scope: TyId,
    pending: VecDeque<(TyId, Weight, Target)>,
    flushing: bool,
}

impl Default for TypeCx {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCx {
    pub fn new() -> Self {
        let mut avals = Arena::new();
        let mut tys = Arena::new();
        let null = avals.alloc(AVal::with_kind(AValKind::Null));
        let prims = PrimitiveTy::ALL.map(|prim| {
            let ty = tys.alloc(Ty::Primitive(prim));
            let mut aval = AVal::with_kind(AValKind::Literal);
            aval.facts.push(Fact {
                ty,
                weight: Weight::DEFAULT,
            });
            (ty, avals.alloc(aval))
        });
        let top_scope = tys.alloc(Ty::Obj(ObjTy::sealed(None)));
        Self {
            avals,
            tys,
            null,
            prims,
            top_scope,
            pending: VecDeque::new(),
            flushing: false,
        }
    }

    // ==============================================================================
    //
    // Allocation
    //
    // ==============================================================================

    /// The canonical unknown value: reads as empty and ignores every fact.
    pub fn null_aval(&self) -> AValId {
        self.null
    }

    /// The global scope object. Top-level declarations are its properties.
    pub fn top_scope(&self) -> TyId {
        self.top_scope
    }

    fn prim_slot(prim: PrimitiveTy) -> usize {
        match prim {
            PrimitiveTy::Number => 0,
            PrimitiveTy::Bool => 1,
            PrimitiveTy::String => 2,
        }
    }

    pub fn prim_ty(&self, prim: PrimitiveTy) -> TyId {
        self.prims[Self::prim_slot(prim)].0
    }

    /// Shared frozen value holding exactly `prim`.
    pub fn prim_aval(&self, prim: PrimitiveTy) -> AValId {
        self.prims[Self::prim_slot(prim)].1
    }

    pub fn new_aval(&mut self) -> AValId {
        self.avals.alloc(AVal::default())
    }

    /// A frozen value holding exactly `ty`, the way annotation type literals
    /// are handed around.
    pub fn literal_aval(&mut self, ty: TyId) -> AValId {
        let mut aval = AVal::with_kind(AValKind::Literal);
        aval.facts.push(Fact {
            ty,
            weight: Weight::DEFAULT,
        });
        self.avals.alloc(aval)
    }

    pub fn alloc_ty(&mut self, ty: Ty) -> TyId {
        self.tys.alloc(ty)
    }

    pub fn new_obj(&mut self, name: Option<SmolStr>) -> TyId {
        self.alloc_ty(Ty::Obj(ObjTy::new(name)))
    }

    pub fn new_sealed_obj(&mut self, name: Option<SmolStr>) -> TyId {
        self.alloc_ty(Ty::Obj(ObjTy::sealed(name)))
    }

    /// A function with fresh values for its receiver, parameters and result.
    pub fn new_fn(&mut self, name: Option<SmolStr>, arg_names: Vec<SmolStr>) -> TyId {
        let self_ty = self.new_aval();
        let args = arg_names.iter().map(|_| self.new_aval()).collect();
        let retval = self.new_aval();
        self.alloc_ty(Ty::Fn(FnTy::new(name, self_ty, args, arg_names, retval)))
    }

    /// An array whose element slot receives everything flowing into `inner`.
    pub fn new_arr(&mut self, inner: Option<AValId>) -> TyId {
        let elem = self.new_aval();
        if let Some(inner) = inner {
            self.propagate(inner, elem, Weight::DEFAULT);
        }
        let mut obj = ObjTy::new(None);
        obj.props.insert(SmolStr::new_static(INDEX_PROP), elem);
        self.alloc_ty(Ty::Arr(ArrTy { obj, elem }))
    }

    pub fn ty(&self, id: TyId) -> &Ty {
        &self.tys[id]
    }

    pub(crate) fn ty_mut(&mut self, id: TyId) -> &mut Ty {
        &mut self.tys[id]
    }

    pub fn aval(&self, id: AValId) -> &AVal {
        &self.avals[id]
    }

    pub fn as_fn(&self, id: TyId) -> Option<&FnTy> {
        self.tys[id].as_fn()
    }

    // ==============================================================================
    //
    // Propagation
    //
    // ==============================================================================

    /// Deliver `ty` to `av` and everything downstream of it.
    pub fn add_type(&mut self, av: AValId, ty: TyId, weight: Weight) {
        self.pending.push_back((ty, weight, Target::AVal(av)));
        self.flush();
    }

    /// Forward every present and future fact of `from` into `to`, capped at
    /// `weight`.
    pub fn propagate(&mut self, from: AValId, to: AValId, weight: Weight) {
        if to == from || !self.avals[to].accepts_types() {
            return;
        }
        self.connect(from, Target::AVal(to), weight);
    }

    /// Run `constraint` for every present and future fact of `from`.
    pub fn attach(&mut self, from: AValId, constraint: Rc<dyn Constraint>) {
        self.connect(from, Target::Constraint(constraint), Weight::DEFAULT);
    }

    fn connect(&mut self, from: AValId, target: Target, weight: Weight) {
        if from == self.null {
            return;
        }
        let source = &mut self.avals[from];
        if source.kind == AValKind::Normal {
            let duplicate = match &target {
                Target::AVal(to) => source.forward.iter().any(|edge| {
                    matches!(edge.target, Target::AVal(existing) if existing == *to)
                        && edge.weight >= weight
                }),
                Target::Constraint(_) => false,
            };
            if duplicate {
                return;
            }
            source.forward.push(Edge {
                target: target.clone(),
                weight,
            });
        }
        for fact in &source.facts {
            self.pending
                .push_back((fact.ty, fact.weight.min(weight), target.clone()));
        }
        self.flush();
    }

    fn deliver(&mut self, av: AValId, ty: TyId, weight: Weight) {
        let aval = &mut self.avals[av];
        if !aval.accepts_types() {
            return;
        }
        if let Some(pos) = aval.facts.iter().position(|fact| fact.ty == ty) {
            if aval.facts[pos].weight >= weight {
                return;
            }
            aval.facts.remove(pos);
        }
        aval.facts.push(Fact { ty, weight });
        for edge in &aval.forward {
            self.pending
                .push_back((ty, weight.min(edge.weight), edge.target.clone()));
        }
    }

    fn flush(&mut self) {
        if self.flushing {
            return;
        }
        self.flushing = true;
        while let Some((ty, weight, target)) = self.pending.pop_front() {
            match target {
                Target::AVal(av) => self.deliver(av, ty, weight),
                Target::Constraint(constraint) => constraint.add_type(self, ty, weight),
            }
        }
        self.flushing = false;
    }

    // ==============================================================================
    //
    // Queries
    //
    // ==============================================================================

    /// The effective type: the most recent fact among those with the highest
    /// weight.
    pub fn get_type(&self, av: AValId) -> Option<TyId> {
        let facts = &self.avals[av].facts;
        let max = facts.iter().map(|fact| fact.weight).max()?;
        facts
            .iter()
            .rev()
            .find(|fact| fact.weight == max)
            .map(|fact| fact.ty)
    }

    /// Every type sharing the highest weight, in delivery order.
    pub fn types(&self, av: AValId) -> Vec<TyId> {
        let facts = &self.avals[av].facts;
        let Some(max) = facts.iter().map(|fact| fact.weight).max() else {
            return Vec::new();
        };
        facts
            .iter()
            .filter(|fact| fact.weight == max)
            .map(|fact| fact.ty)
            .collect()
    }

    pub fn has_type(&self, av: AValId, ty: TyId) -> bool {
        self.avals[av].facts.iter().any(|fact| fact.ty == ty)
    }

    /// The effective type of `av` when it is a function.
    pub fn effective_fn(&self, av: AValId) -> Option<TyId> {
        self.get_type(av).filter(|ty| self.tys[*ty].is_fn())
    }

    // ==============================================================================
    //
    // Documentation
    //
    // ==============================================================================

    /// Attach documentation to a value. Frozen and null values stay bare.
    pub fn set_doc(&mut self, av: AValId, doc: impl Into<SmolStr>) {
        let aval = &mut self.avals[av];
        if aval.accepts_types() {
            aval.doc = Some(doc.into());
        }
    }

    pub fn set_fn_doc(&mut self, func: TyId, doc: impl Into<SmolStr>) {
        if let Some(func) = self.tys[func].as_fn_mut() {
            func.doc = Some(doc.into());
        }
    }

    /// Show `parent`'s documentation on `child` for as long as `child` has
    /// none of its own. The first ancestor linked wins.
    pub fn inherit_fn_doc(&mut self, child: TyId, parent: TyId) {
        if child == parent {
            return;
        }
        if let Some(func) = self.tys[child].as_fn_mut() {
            if func.doc_parent.is_none() {
                func.doc_parent = Some(parent);
            }
        }
    }

    /// A function's own documentation, or the nearest documented ancestor's.
    pub fn fn_doc(&self, func: TyId) -> Option<SmolStr> {
        let mut current = Some(func);
        let mut depth = 0;
        while let Some(id) = current {
            let func = self.tys[id].as_fn()?;
            if let Some(doc) = &func.doc {
                return Some(doc.clone());
            }
            depth += 1;
            if depth > MAX_DOC_DEPTH {
                log::debug!("documentation chain too deep at {id:?}");
                return None;
            }
            current = func.doc_parent;
        }
        None
    }

    /// Documentation shown for a value: its own, else its function's.
    pub fn doc_of(&self, av: AValId) -> Option<SmolStr> {
        if let Some(doc) = &self.avals[av].doc {
            return Some(doc.clone());
        }
        self.effective_fn(av).and_then(|func| self.fn_doc(func))
    }

    // ==============================================================================
    //
    // Override links
    //
    // ==============================================================================

    /// Record that `descendant` now receives from `ancestor`. Returns false
    /// when that link already exists.
    pub fn mark_linked(&mut self, descendant: AValId, ancestor: AValId) -> bool {
        let aval = &mut self.avals[descendant];
        if aval.linked_ancestors.contains(&ancestor) {
            return false;
        }
        aval.linked_ancestors.push(ancestor);
        true
    }

    // ==============================================================================
    //
    // Constructors and instances
    //
    // ==============================================================================

    /// The object behind `func.prototype`, created on first use.
    pub fn fn_prototype(&mut self, func: TyId) -> Option<TyId> {
        let Ty::Fn(data) = &self.tys[func] else {
            return None;
        };
        if let Some(prop) = data.obj.get("prototype") {
            if let Some(ty) = self.get_type(prop).filter(|ty| self.tys[*ty].obj().is_some()) {
                return Some(ty);
            }
        }
        if let Some(proto) = data.prototype_obj {
            return Some(proto);
        }
        let name = data
            .obj
            .name
            .as_ref()
            .map(|name| SmolStr::from(format!("{name}.prototype")));
        let mut obj = ObjTy::new(name);
        obj.is_prototype = true;
        let proto = self.alloc_ty(Ty::Obj(obj));
        if let Some(data) = self.tys[func].as_fn_mut() {
            data.prototype_obj = Some(proto);
        }
        let prop = self.def_prop(func, "prototype");
        self.add_type(prop, proto, Weight::DEFAULT);
        Some(proto)
    }

    /// The instance object produced by `new func()`.
    pub fn instance_of(&mut self, func: TyId) -> Option<TyId> {
        let proto = self.fn_prototype(func)?;
        Some(self.instance_for_proto(proto))
    }

    /// The cached object whose prototype is `proto`, named after it without
    /// the `.prototype` suffix.
    pub fn instance_for_proto(&mut self, proto: TyId) -> TyId {
        let Some(obj) = self.tys[proto].obj() else {
            return self.new_obj(None);
        };
        if let Some(instance) = obj.instance {
            return instance;
        }
        let name = obj.name.as_ref().map(|name| match name.strip_suffix(".prototype") {
            Some(stripped) => SmolStr::from(stripped),
            None => name.clone(),
        });
        let mut instance = ObjTy::new(name);
        instance.proto = Some(proto);
        let id = self.alloc_ty(Ty::Obj(instance));
        if let Some(obj) = self.tys[proto].obj_mut() {
            obj.instance = Some(id);
        }
        id
    }

    /// Deliver the receiver for a method stored on `owner`: the instance
    /// when `owner` is a prototype, otherwise `owner` itself.
    pub fn bind_receiver(&mut self, method: TyId, owner: TyId, weight: Weight) {
        let Some(self_ty) = self.tys[method].as_fn().map(|func| func.self_ty) else {
            return;
        };
        let is_prototype = self.tys[owner].obj().is_some_and(|obj| obj.is_prototype);
        let receiver = if is_prototype {
            self.instance_for_proto(owner)
        } else {
            owner
        };
        self.add_type(self_ty, receiver, weight);
    }

    /// Whether `ancestor` appears on `obj`'s prototype chain, `obj` included.
    pub fn chain_contains(&self, obj: TyId, ancestor: TyId) -> bool {
        let mut seen = FxHashSet::default();
        let mut current = Some(obj);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.tys[id].obj().and_then(|obj| obj.proto);
        }
        false
    }
}
