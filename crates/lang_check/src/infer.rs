// ==============================================================================
// Structural inference
// ==============================================================================
//
// One walk over a module that builds the value graph: every expression gets
// a value, assignments and returns become propagation edges, and member
// accesses, calls and `new` become constraints that keep working as types
// keep arriving. Globals are properties of the registry root, so names read
// before they are defined (in this file or a later one) still connect.

use std::rc::Rc;

use derive_more::Debug;
use la_arena::ArenaMap;
use lang_ast::{Expr, ExprId, FunctionDef, Literal, Module, Stmt, StmtId};
use lang_ty::{
    AValId, CallResult, FnTy, NewInstance, PrimitiveTy, PropOf, SetProp, Ty, TyId, TypeCx,
    Weight,
};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::registry::QualifiedNameRegistry;
use crate::AnalysisConfig;

/// What inference learned about one module, kept for the annotation pass
/// and for queries.
#[derive(Debug, Default)]
pub struct FileFacts {
    #[debug(skip)]
    pub expr_avals: ArenaMap<ExprId, AValId>,
    /// Function type created for each function literal.
    #[debug(skip)]
    pub fn_tys: ArenaMap<ExprId, TyId>,
    /// Object type created for each object literal.
    #[debug(skip)]
    pub obj_tys: ArenaMap<ExprId, TyId>,
    /// The variable slot of each `var` and function declaration.
    #[debug(skip)]
    pub decl_slots: ArenaMap<StmtId, AValId>,
}

/// Give a constructor its prototype up front and make its receiver the
/// instance object.
pub fn shape_constructor(cx: &mut TypeCx, func: TyId) {
    let Some(instance) = cx.instance_of(func) else {
        return;
    };
    if let Some(self_ty) = cx.as_fn(func).map(|data| data.self_ty) {
        cx.add_type(self_ty, instance, Weight::DEFAULT);
    }
}

#[derive(Debug)]
struct FnScope {
    vars: FxHashMap<SmolStr, AValId>,
    self_ty: AValId,
    retval: AValId,
}

pub struct InferCtx<'a> {
    cx: &'a mut TypeCx,
    registry: &'a mut QualifiedNameRegistry,
    config: &'a AnalysisConfig,
    module: &'a Module,
    /// Function literals whose declaration is documented as a constructor.
    ctor_fns: &'a FxHashSet<ExprId>,
    scopes: Vec<FnScope>,
    facts: FileFacts,
}

impl<'a> InferCtx<'a> {
    pub fn new(
        cx: &'a mut TypeCx,
        registry: &'a mut QualifiedNameRegistry,
        config: &'a AnalysisConfig,
        module: &'a Module,
        ctor_fns: &'a FxHashSet<ExprId>,
    ) -> Self {
        Self {
            cx,
            registry,
            config,
            module,
            ctor_fns,
            scopes: Vec::new(),
            facts: FileFacts::default(),
        }
    }

    pub fn infer_module(mut self) -> FileFacts {
        let module = self.module;
        self.hoist(&module.body);
        for stmt in &module.body {
            self.infer_stmt(*stmt);
        }
        self.facts
    }

    // ==============================================================================
    // Scopes
    // ==============================================================================

    fn hoist(&mut self, stmts: &[StmtId]) {
        let module = self.module;
        for stmt in stmts {
            match &module[*stmt] {
                Stmt::Var { name, .. } | Stmt::FunctionDecl { name, .. } => self.declare(name),
                Stmt::Block(inner) => self.hoist(inner),
                _ => {}
            }
        }
    }

    fn declare(&mut self, name: &SmolStr) {
        match self.scopes.last_mut() {
            Some(scope) => {
                if !scope.vars.contains_key(name) {
                    scope.vars.insert(name.clone(), self.cx.new_aval());
                }
            }
            None => {
                self.cx.def_prop(self.registry.root(), name);
            }
        }
    }

    fn lookup(&mut self, name: &str) -> AValId {
        for scope in self.scopes.iter().rev() {
            if let Some(av) = scope.vars.get(name) {
                return *av;
            }
        }
        match self.cx.read_prop(self.registry.root(), name) {
            Some(av) => av,
            None => self.cx.null_aval(),
        }
    }

    // ==============================================================================
    // Statements
    // ==============================================================================

    fn infer_stmt(&mut self, id: StmtId) {
        let module = self.module;
        match &module[id] {
            Stmt::Var { name, init, .. } => {
                let slot = self.lookup(name);
                self.facts.decl_slots.insert(id, slot);
                if let Some(init) = init {
                    let value = self.infer_named(*init, Some(name.clone()));
                    self.cx.propagate(value, slot, Weight::DEFAULT);
                }
            }
            Stmt::FunctionDecl { name, func } => {
                let slot = self.lookup(name);
                self.facts.decl_slots.insert(id, slot);
                let value = self.infer_named(*func, Some(name.clone()));
                self.cx.propagate(value, slot, Weight::DEFAULT);
            }
            Stmt::Expr(expr) => {
                self.infer_expr(*expr);
            }
            Stmt::Return(value) => {
                let value = value.map(|expr| self.infer_expr(expr));
                let retval = self.scopes.last().map(|scope| scope.retval);
                if let (Some(value), Some(retval)) = (value, retval) {
                    self.cx.propagate(value, retval, Weight::DEFAULT);
                }
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.infer_stmt(*stmt);
                }
            }
            Stmt::Empty => {}
        }
    }

    // ==============================================================================
    // Expressions
    // ==============================================================================

    /// Infer `expr`, naming it `name` if it is a function literal.
    fn infer_named(&mut self, expr: ExprId, name: Option<SmolStr>) -> AValId {
        let module = self.module;
        match &module[expr] {
            Expr::Function(def) => {
                let av = self.infer_function(expr, def, name.or_else(|| def.name.clone()));
                self.facts.expr_avals.insert(expr, av);
                av
            }
            _ => self.infer_expr(expr),
        }
    }

    fn infer_expr(&mut self, expr: ExprId) -> AValId {
        let module = self.module;
        let av = match &module[expr] {
            Expr::Ident(name) => self.lookup(name),
            Expr::This => match self.scopes.last() {
                Some(scope) => scope.self_ty,
                None => self.cx.null_aval(),
            },
            Expr::Literal(lit) => match lit {
                Literal::Number(_) => self.cx.prim_aval(PrimitiveTy::Number),
                Literal::String(_) => self.cx.prim_aval(PrimitiveTy::String),
                Literal::Bool(_) => self.cx.prim_aval(PrimitiveTy::Bool),
                Literal::Null => self.cx.null_aval(),
            },
            Expr::Array(elems) => {
                let elem = self.cx.new_aval();
                for item in elems {
                    let value = self.infer_expr(*item);
                    self.cx.propagate(value, elem, Weight::DEFAULT);
                }
                let arr = self.cx.new_arr(Some(elem));
                self.typed(arr)
            }
            Expr::Object(props) => {
                let obj = self.cx.new_obj(None);
                self.facts.obj_tys.insert(expr, obj);
                for prop in props {
                    let slot = self.cx.def_prop(obj, &prop.key);
                    let value = self.infer_named(prop.value, Some(prop.key.clone()));
                    self.cx.propagate(value, slot, Weight::DEFAULT);
                    if let Some(method) = self.facts.fn_tys.get(prop.value).copied() {
                        self.cx.bind_receiver(method, obj, Weight::DEFAULT);
                    }
                }
                self.typed(obj)
            }
            Expr::Function(def) => self.infer_function(expr, def, def.name.clone()),
            Expr::Member { object, prop } => {
                let obj = self.infer_expr(*object);
                let out = self.cx.new_aval();
                self.cx.attach(
                    obj,
                    Rc::new(PropOf {
                        prop: prop.clone(),
                        target: out,
                    }),
                );
                out
            }
            Expr::Call { callee, args } => match self.namespace_call(*callee, args) {
                Some(av) => av,
                None => {
                    let callee = self.infer_expr(*callee);
                    let args = args.iter().map(|arg| self.infer_expr(*arg)).collect();
                    let out = self.cx.new_aval();
                    self.cx.attach(callee, Rc::new(CallResult { args, target: out }));
                    out
                }
            },
            Expr::New { callee, args } => {
                let callee = self.infer_expr(*callee);
                let args = args.iter().map(|arg| self.infer_expr(*arg)).collect();
                let out = self.cx.new_aval();
                self.cx.attach(callee, Rc::new(NewInstance { args, target: out }));
                out
            }
            Expr::Assign { target, value } => self.infer_assign(*target, *value),
        };
        self.facts.expr_avals.insert(expr, av);
        av
    }

    fn typed(&mut self, ty: TyId) -> AValId {
        let av = self.cx.new_aval();
        self.cx.add_type(av, ty, Weight::DEFAULT);
        av
    }

    fn infer_function(&mut self, expr: ExprId, def: &FunctionDef, name: Option<SmolStr>) -> AValId {
        let self_ty = self.cx.new_aval();
        let args: Vec<AValId> = def.params.iter().map(|_| self.cx.new_aval()).collect();
        let retval = self.cx.new_aval();
        let func = self.cx.alloc_ty(Ty::Fn(FnTy::new(
            name,
            self_ty,
            args.clone(),
            def.params.clone(),
            retval,
        )));
        self.facts.fn_tys.insert(expr, func);
        if self.ctor_fns.contains(&expr) {
            shape_constructor(self.cx, func);
        }

        self.scopes.push(FnScope {
            vars: def.params.iter().cloned().zip(args).collect(),
            self_ty,
            retval,
        });
        self.hoist(&def.body);
        for stmt in &def.body {
            self.infer_stmt(*stmt);
        }
        self.scopes.pop();

        self.typed(func)
    }

    fn infer_assign(&mut self, target: ExprId, value: ExprId) -> AValId {
        let module = self.module;
        let path = module.static_path(target).map(SmolStr::from);
        match &module[target] {
            Expr::Ident(name) => {
                let value = self.infer_named(value, path);
                let slot = self.lookup(name);
                self.facts.expr_avals.insert(target, slot);
                self.cx.propagate(value, slot, Weight::DEFAULT);
                value
            }
            Expr::Member { object, prop } => {
                let obj = self.infer_expr(*object);
                let value_av = self.infer_named(value, path.or_else(|| Some(prop.clone())));
                let method = self.facts.fn_tys.get(value).copied();
                self.cx.attach(
                    obj,
                    Rc::new(SetProp {
                        prop: prop.clone(),
                        value: value_av,
                        method,
                    }),
                );
                value_av
            }
            other => {
                log::debug!("assignment to unsupported target {other:?}");
                self.infer_expr(value)
            }
        }
    }

    /// `goog.provide('a.b')`-style calls only register the name.
    fn namespace_call(&mut self, callee: ExprId, args: &[ExprId]) -> Option<AValId> {
        let module = self.module;
        let path = module.static_path(callee)?;
        if !self.config.is_namespace_fn(&path) {
            return None;
        }
        let Some(Expr::Literal(Literal::String(name))) = args.first().map(|arg| &module[*arg]) else {
            log::debug!("{path} called without a string literal");
            return None;
        };
        log::trace!("{path}({name:?})");
        self.registry.define_qualified_name(self.cx, name);
        Some(self.cx.null_aval())
    }
}
