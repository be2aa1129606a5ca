use std::collections::BTreeMap;

use derive_more::Debug;
use smol_str::SmolStr;

use crate::{AValId, PropListener, TyId};

/// Name of the index slot that generic objects (`Object<K, V>`) and arrays
/// store their value type in.
pub const INDEX_PROP: &str = "<i>";

#[derive(Debug, Clone, Default)]
pub struct ObjTy {
    pub name: Option<SmolStr>,

    pub(crate) props: BTreeMap<SmolStr, AValId>,

    pub(crate) proto: Option<TyId>,

    /// Created with an explicit null prototype. Unknown names read from a
    /// sealed object never fall back to its index slot.
    pub sealed: bool,

    /// Values handed out for names that were read before being defined.
    /// `def_prop` promotes them to real properties, and properties appearing
    /// up the prototype chain flow into them.
    pub(crate) maybe_props: BTreeMap<SmolStr, AValId>,

    /// `None` until something subscribes. Once `Some`, this object is itself
    /// subscribed to its prototype.
    #[debug(skip)]
    pub(crate) listeners: Option<Vec<PropListener>>,

    /// Set on the `X.prototype` objects created for constructors.
    pub(crate) is_prototype: bool,

    /// Instance object cached on a prototype.
    pub(crate) instance: Option<TyId>,
}

impl ObjTy {
    pub fn new(name: Option<SmolStr>) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn sealed(name: Option<SmolStr>) -> Self {
        Self {
            name,
            sealed: true,
            ..Default::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<AValId> {
        self.props.get(name).copied()
    }

    pub fn keys(&self) -> std::collections::btree_map::Keys<'_, SmolStr, AValId> {
        self.props.keys()
    }

    pub fn proto(&self) -> Option<TyId> {
        self.proto
    }

    pub fn is_prototype(&self) -> bool {
        self.is_prototype
    }
}

#[derive(Debug, Clone)]
pub struct FnTy {
    pub obj: ObjTy,
    /// The receiver (`this`) inside the function body.
    pub self_ty: AValId,
    pub args: Vec<AValId>,
    pub arg_names: Vec<SmolStr>,
    pub retval: AValId,
    pub doc: Option<SmolStr>,
    /// Ancestor whose documentation is shown while this function has none.
    pub(crate) doc_parent: Option<TyId>,
    pub(crate) prototype_obj: Option<TyId>,
}

impl FnTy {
    pub fn new(
        name: Option<SmolStr>,
        self_ty: AValId,
        args: Vec<AValId>,
        arg_names: Vec<SmolStr>,
        retval: AValId,
    ) -> Self {
        Self {
            obj: ObjTy::new(name),
            self_ty,
            args,
            arg_names,
            retval,
            doc: None,
            doc_parent: None,
            prototype_obj: None,
        }
    }

    pub fn name(&self) -> Option<&SmolStr> {
        self.obj.name.as_ref()
    }

    pub fn arg_index(&self, name: &str) -> Option<usize> {
        self.arg_names.iter().position(|arg| arg == name)
    }
}

#[derive(Debug, Clone)]
pub struct ArrTy {
    pub obj: ObjTy,
    pub elem: AValId,
}
