use comment_parser::DocComment;
use lang_ty::AValId;
use smol_str::SmolStr;

use crate::resolve::TypeResolver;

/// A documented parameter, in the order the tags were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamAnnotation {
    pub name: SmolStr,
    pub ty: Option<AValId>,
    pub doc: Option<SmolStr>,
}

/// The type information of one doc comment, resolved against the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationRecord {
    pub description: Option<SmolStr>,

    /// Set by any `@type`, `@private`, `@protected` or `@public` tag, even
    /// one whose type could not be resolved.
    pub declares_value: bool,
    pub value_type: Option<AValId>,
    pub value_doc: Option<SmolStr>,

    /// Set by any `@return`/`@returns` tag, typed or not.
    pub returns: bool,
    pub return_type: Option<AValId>,
    pub return_doc: Option<SmolStr>,

    pub params: Vec<ParamAnnotation>,

    /// From `@extends` or `@augments`.
    pub super_type: Option<AValId>,
    pub interfaces: Vec<AValId>,

    pub is_ctor: bool,
    pub is_interface: bool,
}

impl AnnotationRecord {
    pub fn from_comment(comment: &DocComment, resolver: &mut TypeResolver<'_>) -> Self {
        let mut record = AnnotationRecord {
            description: comment.description.clone(),
            ..Default::default()
        };

        for tag in &comment.tags {
            let ty = tag.ty.as_ref().and_then(|expr| resolver.resolve(expr, None));
            match tag.title.as_str() {
                "type" | "private" | "protected" | "public" => {
                    record.declares_value |= tag.ty.is_some();
                    if ty.is_some() {
                        record.value_type = ty;
                        record.value_doc = tag.description.clone();
                    }
                }
                "return" | "returns" => {
                    record.returns = true;
                    record.return_type = ty;
                    record.return_doc = tag.description.clone();
                }
                "param" | "arg" | "argument" => match &tag.name {
                    Some(name) => record.params.push(ParamAnnotation {
                        name: name.clone(),
                        ty,
                        doc: tag.description.clone(),
                    }),
                    None => log::debug!("@{} without a parameter name", tag.title),
                },
                "extends" | "augments" => record.super_type = ty,
                "implements" => record.interfaces.extend(ty),
                "constructor" => record.is_ctor = true,
                "interface" => record.is_interface = true,
                _ => {}
            }
        }
        record
    }

    /// Tags that only make sense on a function.
    pub fn has_fn_tags(&self) -> bool {
        !self.params.is_empty() || self.returns || self.is_ctor || self.is_interface
    }

    pub fn param(&self, name: &str) -> Option<&ParamAnnotation> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Documentation for a plain value: the description, else the text
    /// after the type tag.
    pub fn doc_for_value(&self) -> Option<&SmolStr> {
        self.description.as_ref().or(self.value_doc.as_ref())
    }
}

/// Whether a comment marks its declaration as a constructor. Checked
/// before inference so constructors can be shaped up front.
pub fn declares_constructor(comment: &DocComment) -> bool {
    comment.has_tag("constructor") || comment.has_tag("interface")
}

#[cfg(test)]
mod tests {
    use comment_parser::parse_comment;
    use indoc::indoc;
    use lang_ty::TypeCx;

    use super::*;
    use crate::registry::QualifiedNameRegistry;

    fn annotate(cx: &mut TypeCx, raw: &str) -> AnnotationRecord {
        let mut registry = QualifiedNameRegistry::new(cx);
        let comment = parse_comment(raw);
        AnnotationRecord::from_comment(&comment, &mut TypeResolver::new(cx, &mut registry))
    }

    #[test]
    fn function_tags() {
        let mut cx = TypeCx::new();
        let record = annotate(
            &mut cx,
            indoc! {"
                /**
                 * A test function.
                 * @param {number} first The first argument.
                 * @arg {string} second
                 * @return {Class} The return value.
                 */
            "},
        );
        assert_eq!(record.description.as_deref(), Some("A test function."));
        assert_eq!(record.params.len(), 2);
        let first = record.param("first").unwrap();
        assert_eq!(first.doc.as_deref(), Some("The first argument."));
        assert_eq!(cx.display(first.ty.unwrap()), "number");
        assert_eq!(record.param("second").unwrap().doc, None);
        assert!(record.returns);
        assert_eq!(cx.display(record.return_type.unwrap()), "Class");
        assert_eq!(record.return_doc.as_deref(), Some("The return value."));
        assert!(record.has_fn_tags());
    }

    #[test]
    fn value_tags_and_docs() {
        let mut cx = TypeCx::new();
        let record = annotate(&mut cx, "/** @private {Property} The property. */");
        assert_eq!(cx.display(record.value_type.unwrap()), "Property");
        assert_eq!(record.doc_for_value().map(|d| d.as_str()), Some("The property."));
        assert!(!record.has_fn_tags());

        let record = record_with_description(&mut cx);
        assert_eq!(record.doc_for_value().map(|d| d.as_str()), Some("Docs for this var."));
    }

    fn record_with_description(cx: &mut TypeCx) -> AnnotationRecord {
        annotate(
            cx,
            indoc! {"
                /**
                 * Docs for this var.
                 * @type {Blah} tag docs
                 */
            "},
        )
    }

    #[test]
    fn class_tags() {
        let mut cx = TypeCx::new();
        let record = annotate(
            &mut cx,
            indoc! {"
                /**
                 * @constructor
                 * @augments {ns.Parent}
                 * @implements {ns.Iface}
                 * @implements ns.Other
                 */
            "},
        );
        assert!(record.is_ctor);
        assert!(!record.is_interface);
        assert_eq!(cx.display(record.super_type.unwrap()), "ns.Parent");
        assert_eq!(record.interfaces.len(), 2);
        assert!(declares_constructor(&parse_comment("/** @interface */")));
        assert!(!declares_constructor(&parse_comment("/** @struct */")));
    }
}
