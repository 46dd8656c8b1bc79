/*
 * resolution_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for directive expansion and compilation using test fixtures.
 */

use ftpl_core::{
    Builder, CompileConfig, EnvironmentParams, FileSystemStore, JsonTemplateParser, MemoryStore,
    ResourceId, TemplateCompiler, TemplateError, TemplateResult, XmlTemplateParser,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;

/// Helper to get the store over the test fixtures
fn fixtures() -> FileSystemStore {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    FileSystemStore::new(Path::new(manifest_dir).join("test-fixtures"))
}

fn resolve_json(name: &str) -> TemplateResult<Value> {
    let store = fixtures();
    JsonTemplateParser::new(&store).parse(&ResourceId::new(name))
}

fn compiler() -> TemplateCompiler {
    TemplateCompiler::new(Arc::new(fixtures()), CompileConfig::default())
}

#[test]
fn test_flat_vs_nested_splice() {
    assert_eq!(
        resolve_json("includes/flat.json").unwrap(),
        json!(["first", "two", "three", "last"])
    );
    assert_eq!(
        resolve_json("includes/nested.json").unwrap(),
        json!(["first", ["two", "three"], "last"])
    );
}

#[test]
fn test_merge_override_semantics() {
    let merged = resolve_json("merge/overlay.json").unwrap();
    assert_eq!(
        merged,
        json!({
            "a": {"a1": 1, "a2": 2},
            "c": "theCValue",
            "array": "notAnArray"
        })
    );
    assert!(merged.get("b").is_none());
}

#[test]
fn test_static_inclusion_is_transparent() {
    let direct: Value = serde_json::from_str(r#"{"x": [1, {"y": "${y}"}], "z": null}"#).unwrap();
    let store = MemoryStore::with_resources([("leaf.json", r#"{"x": [1, {"y": "${y}"}], "z": null}"#)]);

    // Wrap the same content behind increasingly deep chains of includes
    for depth in 1..8 {
        for level in 0..depth {
            let next = if level + 1 == depth {
                "leaf.json".to_string()
            } else {
                format!("level{}.json", level + 1)
            };
            store.insert(format!("level{}.json", level), format!(r#""$include{{{}}}""#, next));
        }
        let resolved = JsonTemplateParser::new(&store)
            .parse(&ResourceId::new("level0.json"))
            .unwrap();
        assert_eq!(resolved, direct, "depth {}", depth);
    }
}

#[test]
fn test_cycle_names_both_resources() {
    let err = resolve_json("cycle/a.json").unwrap_err();
    assert!(matches!(err, TemplateError::CyclicInclusion { .. }));

    let message = err.to_string();
    assert!(message.contains("cycle/a.json"), "{}", message);
    assert!(message.contains("cycle/b.json"), "{}", message);
}

// A resource including itself never gets near the depth bound: the chain
// is checked for a repeat before its length, so this is reported as a loop.
#[test]
fn test_self_include_is_a_cycle() {
    let store = MemoryStore::with_resources([("self.json", r#"{"me": "$include{self.json}"}"#)]);
    let err = JsonTemplateParser::new(&store)
        .parse(&ResourceId::new("self.json"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Went in a loop while including templates: self.json -> self.json"
    );
}

#[test]
fn test_depth_bound_reports_maximum() {
    let store = MemoryStore::new();
    for i in 0..60 {
        store.insert(format!("t{}.json", i), format!(r#"{{"next": "$include{{t{}.json}}"}}"#, i + 1));
    }
    store.insert("t60.json", "{}");

    let err = JsonTemplateParser::new(&store)
        .parse(&ResourceId::new("t0.json"))
        .unwrap_err();
    match &err {
        TemplateError::ExpansionDepthExceeded { max_depth, chain } => {
            assert_eq!(*max_depth, 51);
            assert_eq!(chain.len(), 52);
        }
        other => panic!("expected a depth error, got {:?}", other),
    }
    assert!(err.to_string().contains("(51)"));

    // 51 files in the chain, root included, is still fine
    let store = MemoryStore::new();
    for i in 0..50 {
        store.insert(format!("t{}.json", i), format!(r#"["$include{{t{}.json}}"]"#, i + 1));
    }
    store.insert("t50.json", "1");
    assert!(
        JsonTemplateParser::new(&store)
            .parse(&ResourceId::new("t0.json"))
            .is_ok()
    );
}

#[test]
fn test_configured_depth() {
    let store = MemoryStore::with_resources([
        ("a.json", r#"["$include{b.json}"]"#),
        ("b.json", r#"["$include{c.json}"]"#),
        ("c.json", "[]"),
    ]);
    let err = JsonTemplateParser::new(&store)
        .with_max_depth(2)
        .parse(&ResourceId::new("a.json"))
        .unwrap_err();
    assert_eq!(err.code(), "FT-2-2");
}

#[test]
fn test_dangling_references() {
    let err = resolve_json("dangling/include.json").unwrap_err();
    assert_eq!(err.to_string(), "$include path missing.json does not exist");

    let err = resolve_json("dangling/merge.json").unwrap_err();
    assert_eq!(
        err.to_string(),
        "$merge resource missing-base.json could not be found"
    );

    let err = resolve_json("dangling/traversal.json").unwrap_err();
    assert!(matches!(err, TemplateError::InvalidPath { ref reference } if reference == "../merge/base.json"));

    let err = resolve_json("dangling/nope.json").unwrap_err();
    assert!(matches!(err, TemplateError::ResourceNotFound { .. }));
}

#[test]
fn test_feature_template_resolution() {
    let resolved = resolve_json("features/feature.json").unwrap();
    let keys: Vec<&str> = resolved
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["$options", "type", "id", "geometry", "links", "properties"]);

    assert_eq!(
        resolved["properties"],
        json!({
            "name": "${STATE_NAME}",
            "region": {"name": "${SUB_REGION}", "code": "${STATE_FIPS}"},
            "$dynamicMerge_labels": {
                "base": {"en": "${STATE_NAME}"},
                "overlay": "$${mergeLabels(STATE_ABBR)}"
            }
        })
    );
}

#[test]
fn test_watched_resources_cover_every_file_read() {
    let store = fixtures();
    let mut parser = JsonTemplateParser::new(&store);
    parser.parse(&ResourceId::new("features/feature.json")).unwrap();

    let watched: Vec<&str> = parser.watched().keys().map(ResourceId::as_str).collect();
    assert_eq!(
        watched,
        vec![
            "features/feature.json",
            "features/parts/common.json",
            "features/shared/properties.json",
        ]
    );
    assert!(parser.watched().values().all(Option::is_some));
}

#[test]
fn test_flat_output_follows_environment() {
    let compiler = compiler();
    let template = ResourceId::new("features/feature.json");

    let nested = compiler.compile(&template, &EnvironmentParams::new()).unwrap();
    assert!(!nested.options().flat_output);
    assert!(matches!(nested.child("properties"), Some(Builder::Composite(_))));
    assert!(matches!(nested.child("links"), Some(Builder::Iterating(_))));

    let flat_env: EnvironmentParams = [("flat_output", "true")].into_iter().collect();
    let flat = compiler.compile(&template, &flat_env).unwrap();
    assert!(flat.options().flat_output);
    assert_eq!(flat.options().separator, ".");

    let Some(Builder::FlatComposite(properties)) = flat.child("properties") else {
        panic!("properties should compile flat");
    };
    let Some(Builder::FlatComposite(region)) = flat.child("properties").and_then(|p| p.child("region"))
    else {
        panic!("region should compile flat");
    };
    assert_eq!(properties.child_key("name"), Some("name".to_string()));
    assert_eq!(region.child_key("code"), Some("region.code".to_string()));
    assert!(matches!(flat.child("links"), Some(Builder::FlatIterating(_))));

    // The deferred merge survives compilation untouched
    let merge = flat
        .child("properties")
        .map(Builder::children)
        .and_then(|children| children.iter().find(|c| matches!(c, Builder::DynamicMerge(_))));
    assert!(merge.is_some());
}

#[test]
fn test_gml_template_resolution() {
    let store = fixtures();
    let mut parser = XmlTemplateParser::new(&store);
    let root = parser.parse(&ResourceId::new("gml/template.xml")).unwrap();

    let states = root.get_children("states");
    assert_eq!(states.len(), 1);
    let names: Vec<String> = states[0]
        .child_elements()
        .iter()
        .map(|e| e.qualified_name())
        .collect();
    assert_eq!(
        names,
        vec!["topp:name", "topp:abbr", "topp:persons", "topp:workers", "topp:the_geom"]
    );
    assert_eq!(states[0].child_elements()[0].text(), Some("${STATE_NAME}"));
    assert_eq!(states[0].get_prefixed_attribute("gml", "id"), Some("${@id}"));

    let watched: Vec<&str> = parser.watched().keys().map(ResourceId::as_str).collect();
    assert_eq!(
        watched,
        vec![
            "gml/base-state.xml",
            "gml/geometry.xml",
            "gml/people.xml",
            "gml/template.xml",
        ]
    );
}

#[test]
fn test_gml_template_compilation() {
    let root = compiler()
        .compile(&ResourceId::new("gml/template.xml"), &EnvironmentParams::new())
        .unwrap();

    assert_eq!(
        root.options().schema_location.as_deref(),
        Some("http://www.openplans.org/topp states.xsd")
    );
    let Some(Builder::Composite(states)) = root.child("topp:states") else {
        panic!("topp:states should be a composite");
    };
    assert_eq!(
        states.hints.namespace_uri.as_deref(),
        Some("http://www.openplans.org/topp")
    );
    assert_eq!(states.children.len(), 5);
    assert!(
        states
            .children
            .iter()
            .all(|child| matches!(child, Builder::Dynamic(_)))
    );
}
