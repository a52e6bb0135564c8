//! End-to-end compiles through the public API.

use std::cell::RefCell;
use std::collections::BTreeMap;

use protocore::{CompileError, Compiler, LinkError, MapResolver, Target};

fn roots(files: &[(&str, &str)]) -> BTreeMap<String, String> {
    files.iter().map(|(p, s)| (p.to_string(), s.to_string())).collect()
}

fn rust() -> Vec<Target> {
    vec![Target::new("rust")]
}

#[test]
fn test_single_message_to_rust() {
    let out = Compiler::new()
        .compile(
            &roots(&[("a.proto", r#"syntax = "proto3"; message A { string name = 1; }"#)]),
            &rust(),
            None,
        )
        .unwrap();
    assert_eq!(out.len(), 1);
    let code = &out["a.rs"];
    assert!(code.contains("pub struct A {"));
    assert!(code.contains("/// Field 1.\n    pub name: String,"));
}

#[test]
fn test_two_file_cycle() {
    let files = roots(&[
        ("a.proto", r#"syntax = "proto3"; import "b.proto";"#),
        ("b.proto", r#"syntax = "proto3"; import "a.proto";"#),
    ]);
    let err = Compiler::new().compile(&files, &rust(), None).unwrap_err();
    match err {
        CompileError::CircularDependency { path, chain } => {
            assert!(path == "a.proto" || path == "b.proto");
            assert!(chain.contains(&"a.proto".to_string()));
            assert!(chain.contains(&"b.proto".to_string()));
        }
        other => panic!("expected a cycle, got {other}"),
    }
}

#[test]
fn test_three_file_cycle_through_resolver() {
    let resolver: MapResolver = [
        ("b.proto", r#"syntax = "proto3"; import "c.proto";"#),
        ("c.proto", r#"syntax = "proto3"; import "a.proto";"#),
    ]
    .into_iter()
    .collect();
    let files = roots(&[("a.proto", r#"syntax = "proto3"; import "b.proto";"#)]);
    let err = Compiler::new().compile(&files, &rust(), Some(&resolver)).unwrap_err();
    assert!(matches!(err, CompileError::CircularDependency { ref path, .. } if path == "a.proto"));
    assert!(err.to_string().contains("a.proto -> b.proto -> c.proto -> a.proto"));
}

#[test]
fn test_dependencies_are_not_emitted() {
    let resolver: MapResolver = [(
        "q.proto",
        r#"syntax = "proto3"; package q; message Q { int32 id = 1; }"#,
    )]
    .into_iter()
    .collect();
    let files = roots(&[(
        "p.proto",
        r#"syntax = "proto3"; package p; import "q.proto"; message P { q.Q q = 1; }"#,
    )]);
    let out = Compiler::new()
        .compile(&files, &[Target::new("rust"), Target::new("proto")], Some(&resolver))
        .unwrap();
    assert_eq!(out.keys().collect::<Vec<_>>(), ["p.proto", "p.rs"]);
    assert!(out["p.proto"].contains("  .q.Q q = 1;"));
}

#[test]
fn test_missing_dependency() {
    let files = roots(&[("a.proto", r#"syntax = "proto3"; import "gone.proto";"#)]);
    let err = Compiler::new().compile(&files, &rust(), None).unwrap_err();
    assert_eq!(err.to_string(), "a.proto: import \"gone.proto\" was not found");
}

#[test]
fn test_well_known_import_without_resolver() {
    let files = roots(&[(
        "event.proto",
        r#"syntax = "proto3";
        import "google/protobuf/timestamp.proto";
        import "google/protobuf/any.proto";
        message Event {
            google.protobuf.Timestamp at = 1;
            google.protobuf.Any payload = 2;
        }"#,
    )]);
    let linked = Compiler::new().link(&files, None).unwrap();
    let event = linked["event.proto"].get_message("Event").unwrap();
    assert_eq!(event.fields[0].type_name.as_deref(), Some(".google.protobuf.Timestamp"));
    assert_eq!(event.fields[1].type_name.as_deref(), Some(".google.protobuf.Any"));
}

#[test]
fn test_well_known_import_when_resolver_misses() {
    let asked = RefCell::new(Vec::new());
    let resolver = |path: &str| -> Option<String> {
        asked.borrow_mut().push(path.to_string());
        None
    };
    let files = roots(&[(
        "event.proto",
        r#"syntax = "proto3";
        import "google/protobuf/timestamp.proto";
        message Event { google.protobuf.Timestamp at = 1; }"#,
    )]);
    let linked = Compiler::new().link(&files, Some(&resolver)).unwrap();
    assert_eq!(*asked.borrow(), ["google/protobuf/timestamp.proto"]);
    let file = &linked["event.proto"];
    let event = file.get_message("Event").unwrap();
    assert_eq!(event.fields[0].type_name.as_deref(), Some(".google.protobuf.Timestamp"));
    assert_eq!(file.dependencies()[0].name(), "google/protobuf/timestamp.proto");
    assert!(file.find_type(".google.protobuf.Timestamp").is_some());
}

#[test]
fn test_resolver_is_not_asked_for_roots() {
    let asked = RefCell::new(Vec::new());
    let resolver = |path: &str| {
        asked.borrow_mut().push(path.to_string());
        Some(r#"syntax = "proto3"; message FromResolver {}"#.to_string())
    };
    let files = roots(&[
        ("a.proto", r#"syntax = "proto3"; import "b.proto"; message A { B b = 1; }"#),
        ("b.proto", r#"syntax = "proto3"; message B {}"#),
    ]);
    Compiler::new().compile(&files, &rust(), Some(&resolver)).unwrap();
    assert!(asked.borrow().is_empty());
}

#[test]
fn test_resolver_overrides_well_known() {
    let resolver = |path: &str| {
        (path == "google/protobuf/empty.proto")
            .then(|| r#"syntax = "proto3"; package google.protobuf; message Empty { int32 marker = 1; }"#.to_string())
    };
    let files = roots(&[(
        "a.proto",
        r#"syntax = "proto3"; import "google/protobuf/empty.proto";
        message A { google.protobuf.Empty e = 1; }"#,
    )]);
    let linked = Compiler::new().link(&files, Some(&resolver)).unwrap();
    let empty = linked["a.proto"].dependencies()[0].get_message("google.protobuf.Empty").unwrap();
    assert_eq!(empty.fields.len(), 1);
}

#[test]
fn test_compile_is_idempotent() {
    let files = roots(&[(
        "shop.proto",
        r#"syntax = "proto3"; package shop;
        message Order { repeated Item items = 1; map<string, int32> counts = 2; }
        message Item { string sku = 1; }
        service Shop { rpc Place(Order) returns (Order); }"#,
    )]);
    let targets = [Target::new("rust"), Target::new("proto"), Target::new("json")];
    let compiler = Compiler::new();
    let first = compiler.compile(&files, &targets, None).unwrap();
    let second = compiler.compile(&files, &targets, None).unwrap();
    assert_eq!(first, second);
    let fresh = Compiler::new().compile(&files, &targets, None).unwrap();
    assert_eq!(first, fresh);
}

#[test]
fn test_failing_compile_is_idempotent() {
    let files = roots(&[("bad.proto", "syntax = \"proto3\";\nmessage M { int32 = 1; }\nenum E {")]);
    let compiler = Compiler::new();
    let first = compiler.compile(&files, &rust(), None).unwrap_err().to_string();
    let second = compiler.compile(&files, &rust(), None).unwrap_err().to_string();
    assert_eq!(first, second);
    assert!(first.starts_with("bad.proto:2:"));
}

#[test]
fn test_parse_error_lists_diagnostics() {
    let files = roots(&[(
        "bad.proto",
        "syntax = \"proto3\";\nmessage A { int32 x = ; }\nmessage B { string y = 1 }\n",
    )]);
    match Compiler::new().compile(&files, &rust(), None).unwrap_err() {
        CompileError::Parse(err) => {
            assert_eq!(err.path, "bad.proto");
            assert_eq!(err.diagnostics.len(), 2);
            assert_eq!(err.diagnostics[0].line, 2);
            assert_eq!(err.diagnostics[1].line, 3);
        }
        other => panic!("expected a parse error, got {other}"),
    }
}

#[test]
fn test_unknown_target_fails_before_resolution() {
    let files = roots(&[("a.proto", r#"syntax = "proto3"; import "missing.proto";"#)]);
    let err = Compiler::new()
        .compile(&files, &[Target::new("cobol")], None)
        .unwrap_err();
    assert!(matches!(err, CompileError::UnknownTarget(name) if name == "cobol"));
}

#[test]
fn test_link_error_is_reported() {
    let files = roots(&[(
        "a.proto",
        r#"syntax = "proto3"; message A { Missing m = 1; }"#,
    )]);
    let err = Compiler::new().compile(&files, &rust(), None).unwrap_err();
    assert!(matches!(err, CompileError::Link(LinkError::UndefinedType { .. })));
}

#[test]
fn test_duplicate_output_across_targets() {
    let files = roots(&[("a.proto", r#"syntax = "proto3";"#)]);
    let err = Compiler::new()
        .compile(&files, &[Target::new("rust"), Target::new("rust").with_parameter("map=btree")], None)
        .unwrap_err();
    assert_eq!(err.to_string(), "output \"a.rs\" was generated twice");
}

#[test]
fn test_printed_proto_compiles_again() {
    let source = r#"syntax = "proto3";
        package demo;
        import "google/protobuf/duration.proto";
        message Job {
            enum State { STATE_UNSPECIFIED = 0; RUNNING = 1; }
            string id = 1;
            State state = 2;
            google.protobuf.Duration timeout = 3;
            oneof owner { string user = 4; string team = 5; }
            optional int64 retries = 6;
            map<string, Job> children = 7;
        }"#;
    let compiler = Compiler::new();
    let first = compiler.compile(&roots(&[("job.proto", source)]), &[Target::new("proto")], None).unwrap();
    let printed = &first["job.proto"];
    let second = compiler
        .compile(&roots(&[("job.proto", printed)]), &[Target::new("proto")], None)
        .unwrap();
    assert_eq!(&second["job.proto"], printed);

    let a = compiler.link(&roots(&[("job.proto", source)]), None).unwrap();
    let b = compiler.link(&roots(&[("job.proto", printed)]), None).unwrap();
    pretty_assertions::assert_eq!(a["job.proto"].to_proto(), b["job.proto"].to_proto());
}
