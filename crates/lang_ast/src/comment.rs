use std::collections::HashMap;

use smol_str::SmolStr;

use crate::{ExprId, StmtId};

/// Where a doc comment was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocTarget {
    Stmt(StmtId),
    /// Property `index` of an object literal.
    Property(ExprId, usize),
}

/// Raw `/** */` comment text per declaration. Only the last doc comment
/// before a statement or object-literal key is kept; comments followed by
/// anything else are recorded as orphans.
#[derive(Default, Debug)]
pub struct DocCommentCtx {
    docs: HashMap<DocTarget, SmolStr>,
    pub(crate) orphan_docs: Vec<SmolStr>,
}

impl DocCommentCtx {
    pub fn get(&self, target: DocTarget) -> Option<&SmolStr> {
        self.docs.get(&target)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocTarget, &SmolStr)> + '_ {
        self.docs.iter().map(|(target, doc)| (*target, doc))
    }

    pub fn orphans(&self) -> &[SmolStr] {
        &self.orphan_docs
    }

    pub(crate) fn attach(&mut self, target: DocTarget, doc: SmolStr) {
        self.docs.insert(target, doc);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
