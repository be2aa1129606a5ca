mod aval;
mod constraint;
mod cx;
mod display;
mod object;
mod primitive;
mod props;

pub use aval::{AVal, Fact};
pub use constraint::{CallResult, Constraint, InstanceOf, NewInstance, PropOf, SetProp};
pub use cx::TypeCx;
pub use object::{ArrTy, FnTy, ObjTy, INDEX_PROP};
pub use primitive::PrimitiveTy;
pub use props::{HandlerKey, PropHandler, PropListener};

use derive_more::Debug;
use la_arena::Idx;

pub type AValId = Idx<AVal>;
pub type TyId = Idx<Ty>;

/// Precedence of a fact delivered to an abstract value. The effective type of
/// a value is the most recent of its highest-weight facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[debug("Weight({_0})")]
pub struct Weight(u8);

impl Weight {
    pub const DEFAULT: Weight = Weight(100);

    pub const fn new(value: u8) -> Self {
        Weight(value)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Weight {
    fn default() -> Self {
        Weight::DEFAULT
    }
}

#[derive(Debug, Clone)]
pub enum Ty {
    #[debug("{_0:?}")]
    Primitive(PrimitiveTy),
    #[debug("{_0:?}")]
    Obj(ObjTy),
    #[debug("{_0:?}")]
    Fn(FnTy),
    #[debug("{_0:?}")]
    Arr(ArrTy),
}

impl Ty {
    /// The object header shared by plain objects, functions and arrays.
    pub fn obj(&self) -> Option<&ObjTy> {
        match self {
            Ty::Primitive(_) => None,
            Ty::Obj(obj) => Some(obj),
            Ty::Fn(func) => Some(&func.obj),
            Ty::Arr(arr) => Some(&arr.obj),
        }
    }

    pub fn obj_mut(&mut self) -> Option<&mut ObjTy> {
        match self {
            Ty::Primitive(_) => None,
            Ty::Obj(obj) => Some(obj),
            Ty::Fn(func) => Some(&mut func.obj),
            Ty::Arr(arr) => Some(&mut arr.obj),
        }
    }

    pub fn as_fn(&self) -> Option<&FnTy> {
        match self {
            Ty::Fn(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_fn_mut(&mut self) -> Option<&mut FnTy> {
        match self {
            Ty::Fn(func) => Some(func),
            _ => None,
        }
    }

    pub fn is_fn(&self) -> bool {
        matches!(self, Ty::Fn(_))
    }

    /// A structural object that is neither a function nor an array.
    pub fn is_plain_obj(&self) -> bool {
        matches!(self, Ty::Obj(_))
    }

    pub fn name(&self) -> Option<&smol_str::SmolStr> {
        self.obj().and_then(|obj| obj.name.as_ref())
    }
}
