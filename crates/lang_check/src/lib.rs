mod annotation;
mod apply;
mod attach;
mod infer;
mod inherit;
pub mod registry;
mod resolve;


#[cfg(test)]
mod pbt;

pub use annotation::{AnnotationRecord, ParamAnnotation};
pub use apply::{apply_annotation, DeclSite, SiteValue};
pub use inherit::{link_override, ImplementsInterface, IsSuperclassInstance};
pub use registry::{QualifiedNameRegistry, TEMP_CTOR_WEIGHT, TEMP_OBJ_WEIGHT};
pub use resolve::TypeResolver;

use derive_more::Debug;
use infer::{FileFacts, InferCtx};
use lang_ast::{Expr, ExprId, Module, ParseError};
use lang_ty::{AValId, TypeCx};
use serde::Deserialize;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, miette::Diagnostic)]
pub enum AnalysisError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
}

/// Analysis options, read from the `[analysis]` table of the project
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Calls that declare the namespace named by their string argument.
    pub provide_functions: Vec<String>,

    /// Calls that name a namespace declared elsewhere. Treated the same as
    /// provides: the name is defined, nothing is returned.
    pub require_functions: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provide_functions: vec!["goog.provide".into()],
            require_functions: vec!["goog.require".into()],
        }
    }
}

impl AnalysisConfig {
    pub fn is_namespace_fn(&self, path: &str) -> bool {
        self.provide_functions
            .iter()
            .chain(&self.require_functions)
            .any(|name| name == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[debug("FileId({_0})")]
pub struct FileId(usize);

#[derive(Debug)]
pub struct AnalyzedFile {
    pub path: SmolStr,
    pub module: Module,
    facts: FileFacts,
}

// ==============================================================================
// Session
// ==============================================================================

/// One analysis over any number of files. Files may be added in any order;
/// annotations and inheritance links keep resolving as later files define
/// what earlier ones referenced.
#[derive(Debug)]
pub struct Session {
    cx: TypeCx,
    registry: QualifiedNameRegistry,
    config: AnalysisConfig,
    files: Vec<AnalyzedFile>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl Session {
    pub fn new(config: AnalysisConfig) -> Self {
        let cx = TypeCx::new();
        let registry = QualifiedNameRegistry::new(&cx);
        Self {
            cx,
            registry,
            config,
            files: Vec::new(),
        }
    }

    pub fn analyze(&mut self, path: impl Into<SmolStr>, source: &str) -> Result<FileId, AnalysisError> {
        let path = path.into();
        let module = lang_ast::parse_module(source)?;

        let comments = attach::parse_comments(&module);
        let ctor_fns = attach::constructor_functions(&module, &comments);
        let facts = InferCtx::new(
            &mut self.cx,
            &mut self.registry,
            &self.config,
            &module,
            &ctor_fns,
        )
        .infer_module();
        attach::apply_comments(&mut self.cx, &mut self.registry, &module, &facts, &comments);

        log::debug!(
            "analyzed {path}: {} doc comments, {} constructors",
            comments.len(),
            ctor_fns.len()
        );
        let id = FileId(self.files.len());
        self.files.push(AnalyzedFile {
            path,
            module,
            facts,
        });
        Ok(id)
    }

    pub fn cx(&self) -> &TypeCx {
        &self.cx
    }

    pub fn registry(&self) -> &QualifiedNameRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn file(&self, id: FileId) -> Option<&AnalyzedFile> {
        self.files.get(id.0)
    }

    pub fn files(&self) -> impl Iterator<Item = (FileId, &AnalyzedFile)> + '_ {
        self.files
            .iter()
            .enumerate()
            .map(|(idx, file)| (FileId(idx), file))
    }

    // ==============================================================================
    // Queries
    // ==============================================================================

    /// Every global defined so far, sorted.
    pub fn global_names(&self) -> Vec<SmolStr> {
        let mut names: Vec<SmolStr> = self
            .cx
            .props(self.registry.root())
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| name.as_str() != lang_ty::INDEX_PROP)
            .collect();
        names.sort();
        names
    }

    /// The value stored under a dotted global name.
    pub fn value_of_name(&self, name: &str) -> Option<AValId> {
        self.registry.lookup(&self.cx, name)
    }

    pub fn type_of_name(&self, name: &str) -> Option<String> {
        self.value_of_name(name).map(|av| self.cx.display(av))
    }

    pub fn doc_of_name(&self, name: &str) -> Option<SmolStr> {
        self.value_of_name(name).and_then(|av| self.cx.doc_of(av))
    }

    /// The value behind an expression. Member accesses resolve to the
    /// property itself when it can be found, so its documentation comes
    /// along.
    pub fn expr_value(&self, file: FileId, expr: ExprId) -> Option<AValId> {
        let analyzed = self.file(file)?;
        if let Expr::Member { object, prop } = &analyzed.module[expr] {
            let object = analyzed.facts.expr_avals.get(*object).copied();
            if let Some(slot) = object.and_then(|obj| self.member_slot(obj, prop)) {
                return Some(slot);
            }
        }
        analyzed.facts.expr_avals.get(expr).copied()
    }

    fn member_slot(&self, object: AValId, prop: &str) -> Option<AValId> {
        self.cx
            .types(object)
            .into_iter()
            .rev()
            .find_map(|ty| self.cx.lookup_prop(ty, prop))
    }

    pub fn describe_expr(&self, file: FileId, expr: ExprId) -> Option<String> {
        self.expr_value(file, expr).map(|av| self.cx.display(av))
    }

    /// Documentation of an expression. A call shows what its callee
    /// documents about the returned value.
    pub fn doc_of_expr(&self, file: FileId, expr: ExprId) -> Option<SmolStr> {
        let analyzed = self.file(file)?;
        if let Expr::Call { callee, .. } = &analyzed.module[expr] {
            let callee = self.expr_value(file, *callee)?;
            let func = self.cx.effective_fn(callee)?;
            let retval = self.cx.as_fn(func)?.retval;
            return self.cx.aval(retval).doc().cloned();
        }
        self.cx.doc_of(self.expr_value(file, expr)?)
    }

    /// The innermost expression at a byte offset of a file.
    pub fn expr_at(&self, file: FileId, offset: usize) -> Option<ExprId> {
        self.file(file)?.module.expr_at(offset)
    }
}
