// ==============================================================================
// Qualified Name Registry
// ==============================================================================
//
// Dotted names (`a.b.C`) live as properties of the global scope object and of
// the namespace objects hanging off it. A name referenced before anything
// defines it gets a placeholder at reduced weight, so a genuine definition
// discovered later dominates the merge without anything being retracted.

use std::rc::Rc;

use lang_ty::{AValId, InstanceOf, PrimitiveTy, TyId, TypeCx, Weight, INDEX_PROP};
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

/// Weight of placeholder namespace objects.
pub const TEMP_OBJ_WEIGHT: Weight = Weight::new(40);

/// Weight of placeholder constructors. Above namespace placeholders, so a
/// name used as a type reads as a constructor until a real one shows up.
pub const TEMP_CTOR_WEIGHT: Weight = Weight::new(50);

#[derive(Debug)]
pub struct QualifiedNameRegistry {
    /// The global scope object every dotted name starts from.
    root: TyId,

    /// Every name defined so far. Slots are not remembered: a namespace
    /// placeholder can be outranked by a real object at any time, and the
    /// walk has to follow whichever object currently wins.
    names: FxHashSet<SmolStr>,
}

impl QualifiedNameRegistry {
    pub fn new(cx: &TypeCx) -> Self {
        Self {
            root: cx.top_scope(),
            names: FxHashSet::default(),
        }
    }

    pub fn root(&self) -> TyId {
        self.root
    }

    /// Number of distinct names defined through the registry.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Walk `name` from the root, defining every missing segment. Segments
    /// that carry no object yet get a namespace placeholder named after the
    /// path so far. Returns the slot of the last segment.
    pub fn define_qualified_name(&mut self, cx: &mut TypeCx, name: &str) -> AValId {
        let segments: Vec<&str> = name.split('.').filter(|seg| !seg.is_empty()).collect();
        if segments.is_empty() {
            log::debug!("ignoring empty qualified name {name:?}");
            return cx.null_aval();
        }

        let mut base = self.root;
        let mut slot = cx.null_aval();
        for (idx, segment) in segments.iter().enumerate() {
            slot = cx.def_prop(base, segment);
            base = match namespace_of(cx, slot) {
                Some(ty) => ty,
                None => {
                    let path = segments[..=idx].join(".");
                    log::trace!("placeholder namespace `{path}`");
                    let placeholder = cx.new_sealed_obj(Some(SmolStr::from(path)));
                    cx.add_type(slot, placeholder, TEMP_OBJ_WEIGHT);
                    placeholder
                }
            };
        }

        if !self.names.contains(name) {
            self.names.insert(SmolStr::new(name));
        }
        slot
    }

    /// Resolve a type name from an annotation into a value holding the
    /// type it denotes. `inner` is the element type of `Array.<T>` and the
    /// value type of `Object.<K, V>`.
    pub fn resolve_qualified_type(
        &mut self,
        cx: &mut TypeCx,
        name: &str,
        inner: Option<AValId>,
    ) -> AValId {
        if let Some(prim) = PrimitiveTy::from_keyword(name) {
            return cx.prim_aval(prim);
        }

        match name.to_ascii_lowercase().as_str() {
            "array" => {
                let arr = cx.new_arr(inner);
                return cx.literal_aval(arr);
            }
            "object" => {
                let obj = cx.new_obj(None);
                let index = cx.def_prop(obj, INDEX_PROP);
                if let Some(inner) = inner {
                    cx.propagate(inner, index, Weight::DEFAULT);
                }
                return cx.literal_aval(obj);
            }
            _ => {}
        }

        let ctor = self.define_qualified_name(cx, name);
        let has_ctor = cx
            .aval(ctor)
            .facts()
            .iter()
            .any(|fact| cx.ty(fact.ty).is_fn());
        if !has_ctor {
            log::trace!("placeholder constructor `{name}`");
            let placeholder = cx.new_fn(Some(SmolStr::new(name)), Vec::new());
            cx.add_type(ctor, placeholder, TEMP_CTOR_WEIGHT);
        }

        let instance = cx.new_aval();
        cx.attach(ctor, Rc::new(InstanceOf { target: instance }));
        instance
    }

    /// The slot of `name` if it exists, without defining anything.
    pub fn lookup(&self, cx: &TypeCx, name: &str) -> Option<AValId> {
        let mut base = self.root;
        let mut segments = name.split('.').filter(|seg| !seg.is_empty()).peekable();
        while let Some(segment) = segments.next() {
            let slot = cx.lookup_prop(base, segment)?;
            if segments.peek().is_none() {
                return Some(slot);
            }
            base = namespace_of(cx, slot)?;
        }
        None
    }
}

/// The object a name segment descends into: the value's own type when it
/// is an object, otherwise its strongest object fact.
fn namespace_of(cx: &TypeCx, slot: AValId) -> Option<TyId> {
    cx.get_type(slot)
        .filter(|ty| cx.ty(*ty).obj().is_some())
        .or_else(|| {
            cx.aval(slot)
                .facts()
                .iter()
                .filter(|fact| cx.ty(fact.ty).obj().is_some())
                .max_by_key(|fact| fact.weight)
                .map(|fact| fact.ty)
        })
}
