use itertools::Itertools;

use crate::{AValId, Ty, TyId, TypeCx, INDEX_PROP};

// Nested function and array types deeper than this are elided as `?`.
const MAX_DISPLAY_DEPTH: usize = 4;

impl TypeCx {
    /// Render the effective types of a value: `?` when empty, a single type,
    /// or `(A|B)` when several types share the highest weight.
    pub fn display(&self, av: AValId) -> String {
        self.display_aval(av, 0)
    }

    pub fn display_ty(&self, ty: TyId) -> String {
        self.display_ty_at(ty, 0)
    }

    fn display_aval(&self, av: AValId, depth: usize) -> String {
        let rendered: Vec<String> = self
            .types(av)
            .into_iter()
            .map(|ty| self.display_ty_at(ty, depth))
            .unique()
            .collect();
        match rendered.as_slice() {
            [] => "?".to_string(),
            [single] => single.clone(),
            many => format!("({})", many.join("|")),
        }
    }

    fn display_ty_at(&self, ty: TyId, depth: usize) -> String {
        if depth > MAX_DISPLAY_DEPTH {
            return "?".to_string();
        }
        match self.ty(ty) {
            Ty::Primitive(prim) => prim.to_string(),
            Ty::Fn(func) => {
                let args = func
                    .arg_names
                    .iter()
                    .zip(&func.args)
                    .map(|(name, arg)| format!("{name}: {}", self.display_aval(*arg, depth + 1)))
                    .join(", ");
                if self.aval(func.retval).is_empty() {
                    format!("fn({args})")
                } else {
                    format!("fn({args}) -> {}", self.display_aval(func.retval, depth + 1))
                }
            }
            Ty::Arr(arr) => format!("[{}]", self.display_aval(arr.elem, depth + 1)),
            Ty::Obj(obj) => match &obj.name {
                Some(name) => name.to_string(),
                None => format!(
                    "{{{}}}",
                    obj.keys().filter(|key| key.as_str() != INDEX_PROP).join(", ")
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{PrimitiveTy, TypeCx, Weight};

    #[test]
    fn primitives_and_unions() {
        let mut cx = TypeCx::new();
        let av = cx.new_aval();
        assert_eq!(cx.display(av), "?");
        cx.add_type(av, cx.prim_ty(PrimitiveTy::String), Weight::DEFAULT);
        assert_eq!(cx.display(av), "string");
        cx.add_type(av, cx.prim_ty(PrimitiveTy::Number), Weight::DEFAULT);
        assert_eq!(cx.display(av), "(string|number)");
    }

    #[test]
    fn functions_arrays_and_objects() {
        let mut cx = TypeCx::new();
        let func = cx.new_fn(None, vec!["a".into(), "b".into()]);
        assert_eq!(cx.display_ty(func), "fn(a: ?, b: ?)");

        let (a, retval) = {
            let data = cx.as_fn(func).unwrap();
            (data.args[0], data.retval)
        };
        cx.add_type(a, cx.prim_ty(PrimitiveTy::Number), Weight::DEFAULT);
        let elem = cx.prim_aval(PrimitiveTy::Bool);
        let arr = cx.new_arr(Some(elem));
        cx.add_type(retval, arr, Weight::DEFAULT);
        assert_eq!(cx.display_ty(func), "fn(a: number, b: ?) -> [bool]");

        let anon = cx.new_obj(None);
        cx.def_prop(anon, "y");
        cx.def_prop(anon, "x");
        assert_eq!(cx.display_ty(anon), "{x, y}");
        let named = cx.new_obj(Some("ns.Thing".into()));
        assert_eq!(cx.display_ty(named), "ns.Thing");
    }

    #[test]
    fn self_referential_types_terminate() {
        let mut cx = TypeCx::new();
        let func = cx.new_fn(None, Vec::new());
        let retval = cx.as_fn(func).unwrap().retval;
        cx.add_type(retval, func, Weight::DEFAULT);
        assert_eq!(cx.display_ty(func), "fn() -> fn() -> fn() -> fn() -> fn() -> ?");
    }
}
