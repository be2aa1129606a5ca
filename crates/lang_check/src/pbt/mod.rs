// ==============================================================================
// Property-Based Tests for Annotation Inference
// ==============================================================================
//
// Two families:
// - Qualified names: defining random dotted names (in any order, any number
//   of times) always yields the same value per name, and every prefix is
//   reachable as a namespace named by its path.
// - Inheritance chains: a chain of classes, one per file, each extending the
//   previous one, analyzed in a shuffled file order. Every class must see
//   the members of its ancestors and none of its descendants, whatever order
//   the files arrived in. Every subclass also overrides the root class's
//   method unannotated and must still show its signature and documentation.
//
// Known limitations:
// - Generated names are short lowercase identifiers, so they never collide
//   with `prototype` or the index property.
// - Chains are linear. Diamond shapes cannot be written with `@extends`.

use std::fmt::Write;

use lang_ty::TypeCx;
use proptest::prelude::{prop, prop_assert, prop_assert_eq, proptest, Just, ProptestConfig, Strategy};

use crate::registry::QualifiedNameRegistry;
use crate::tests::{analyze_files, check_expectations};

fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,5}"
}

fn arb_dotted_name() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_segment(), 1..4).prop_map(|segments| segments.join("."))
}

fn prefixes(name: &str) -> impl Iterator<Item = &str> + '_ {
    name.match_indices('.')
        .map(move |(idx, _)| &name[..idx])
        .chain(std::iter::once(name))
}

// ==============================================================================
// Inheritance chains
// ==============================================================================

/// The source of class `idx` in a chain of `len` classes.
fn chain_class(idx: usize, len: usize) -> String {
    let mut src = String::new();
    let _ = writeln!(src, "goog.provide('pbt.Class{idx}');");
    let _ = writeln!(src, "/**\n * Class number {idx}.\n * @constructor");
    if idx > 0 {
        let _ = writeln!(src, " * @extends {{pbt.Class{}}}", idx - 1);
    }
    let _ = writeln!(src, " */");
    let _ = writeln!(src, "pbt.Class{idx} = function() {{");
    let _ = writeln!(src, "  /** @protected {{Prop{idx}}} */");
    let _ = writeln!(src, "  this.prop{idx} = makeProp();");
    let _ = writeln!(src, "}};");

    let _ = writeln!(src, "/**");
    if idx == 0 {
        let _ = writeln!(src, " * Root method.");
    }
    let _ = writeln!(src, " * @param {{Arg{idx}}} arg\n * @return {{Ret{idx}}}\n */");
    let _ = writeln!(src, "pbt.Class{idx}.prototype.method{idx} = function(arg) {{");
    for ancestor in 0..=idx {
        let _ = writeln!(src, "  this.prop{ancestor}; //: Prop{ancestor}");
        let _ = writeln!(
            src,
            "  this.method{ancestor}; //: fn(arg: Arg{ancestor}) -> Ret{ancestor}"
        );
    }
    for descendant in idx + 1..len {
        let _ = writeln!(src, "  this.prop{descendant}; //: ?");
        let _ = writeln!(src, "  this.method{descendant}; //: ?");
    }
    let _ = writeln!(src, "  return unknown;");
    let _ = writeln!(src, "}};");

    // Every subclass overrides the root method without annotating it.
    if idx > 0 {
        let _ = writeln!(src, "/** @override */");
        let _ = writeln!(src, "pbt.Class{idx}.prototype.method0 = function(arg) {{");
        let _ = writeln!(src, "  arg; //: Arg0");
        let _ = writeln!(src, "  return describe(arg);");
        let _ = writeln!(src, "}};");
        let _ = writeln!(src, "pbt.Class{idx}.prototype.method0; //: fn(arg: Arg0) -> Ret0");
        let _ = writeln!(src, "pbt.Class{idx}.prototype.method0; //doc: Root method.");
    }
    src
}

/// A chain length and a permutation of its files.
fn arb_chain_order() -> impl Strategy<Value = Vec<usize>> {
    (2usize..6).prop_flat_map(|len| Just((0..len).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256, .. ProptestConfig::default()
    })]

    #[test]
    fn test_define_is_idempotent(names in prop::collection::vec(arb_dotted_name(), 1..8)) {
        let mut cx = TypeCx::new();
        let mut registry = QualifiedNameRegistry::new(&cx);

        let first: Vec<_> = names
            .iter()
            .map(|name| registry.define_qualified_name(&mut cx, name))
            .collect();
        let size = registry.len();

        for (name, av) in names.iter().zip(&first).rev() {
            prop_assert_eq!(registry.define_qualified_name(&mut cx, name), *av);
            prop_assert_eq!(registry.lookup(&cx, name), Some(*av));
        }
        prop_assert_eq!(registry.len(), size);
    }

    #[test]
    fn test_prefixes_are_namespaces(name in arb_dotted_name()) {
        let mut cx = TypeCx::new();
        let mut registry = QualifiedNameRegistry::new(&cx);
        registry.define_qualified_name(&mut cx, &name);

        for prefix in prefixes(&name) {
            let av = registry.lookup(&cx, prefix);
            prop_assert!(av.is_some(), "{} is not defined", prefix);
            if let Some(av) = av {
                prop_assert_eq!(cx.display(av), prefix);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64, .. ProptestConfig::default()
    })]

    #[test]
    fn test_inheritance_is_order_independent(order in arb_chain_order()) {
        let len = order.len();
        let sources: Vec<String> = order.iter().map(|idx| chain_class(*idx, len)).collect();
        let files: Vec<&str> = sources.iter().map(String::as_str).collect();

        let (session, ids) = analyze_files(&files);
        for id in ids {
            check_expectations(&session, id);
        }

        for idx in 1..len {
            prop_assert_eq!(
                session.type_of_name(&format!("pbt.Class{idx}")),
                Some("fn()".to_string())
            );
        }
    }
}
