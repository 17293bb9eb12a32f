use rtelq_parser::{
    parse_query, validate_progressive, validate_query, EntityType, QueryNode, Stage,
};

#[test]
fn unmatched_open_paren_reports_paren_position_and_quick_fix() {
    // "(protocol:tcp" -- the paren itself is the error location, and the
    // suggestion is the query with ')' appended.
    let err = parse_query("(protocol:tcp").unwrap_err();
    let e = &err.errors[0];
    assert_eq!(e.position, 0, "error should point at the '(': {e}");
    assert!(e.suggestion.ends_with("(protocol:tcp)"), "got: {}", e.suggestion);
}

#[test]
fn every_syntax_error_carries_position_and_suggestion() {
    let cases = [
        "(protocol:tcp",
        "protocol:tcp)",
        "device_name:\"laptop",
        "severity high",
        "severity=high",
        "protocol:tcp AND",
        "severity:",
        "",
    ];
    for q in cases {
        let err = parse_query(q).unwrap_err();
        assert!(!err.errors.is_empty(), "no errors for {q:?}");
        for e in &err.errors {
            assert!(!e.suggestion.is_empty(), "no suggestion for {q:?}: {e}");
            assert!(e.position <= q.len(), "position out of range for {q:?}");
        }
    }
}

#[test]
fn multiple_findings_surface_together() {
    // one pass reports both the '=' typo and the unmatched paren
    let err = parse_query("(severity=high").unwrap_err();
    assert!(err.errors.len() >= 2, "expected several findings: {err:?}");
}

#[test]
fn parse_never_panics_on_garbage() {
    let cases = [
        ":", "::", "a::b", ")(", "[TO]", "x:[1 TO", "AND AND", "NOT NOT",
        "\\", "a:\"\\\"", "🦀:🦀",
    ];
    for q in cases {
        let _ = parse_query(q);
    }
}

#[test]
fn validation_report_serializes_to_json() {
    let report = validate_query("severity:>=high", EntityType::Alarms);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["is_valid"], false);
    assert!(json["errors"].as_array().unwrap()[0]
        .as_str()
        .unwrap()
        .contains("severity"));
}

#[test]
fn ast_serializes_with_node_tags() {
    let ast = parse_query("protocol:tcp AND bytes:>100").unwrap();
    let json = serde_json::to_value(&ast).unwrap();
    assert_eq!(json["node"], "and");
    assert_eq!(json["left"]["node"], "field");
    assert_eq!(json["right"]["node"], "comparison");
}

#[test]
fn round_trip_preserves_structure_for_rendered_queries() {
    let queries = [
        "protocol:tcp AND bytes:>1000000",
        "NOT (blocked:true OR blocked:false)",
        "device_name:\"home office pc\" AND source_ip:10.0.*",
        "timestamp:[1700000000 TO 1800000000]",
    ];
    for q in queries {
        let ast = parse_query(q).unwrap();
        let reparsed = parse_query(&ast.to_string()).unwrap();
        assert_eq!(ast, reparsed, "round-trip mismatch for {q:?}");
    }
}

#[test]
fn corrected_query_reparses_cleanly() {
    // the corrector's output for common typos must itself be parseable
    let broken = [
        "severity=high",
        "protocol:tcp blocked:true",
        "device_name:my laptop",
    ];
    for q in broken {
        let report = validate_query(q, EntityType::Flows);
        let corrected = report
            .corrected_query
            .unwrap_or_else(|| panic!("no correction offered for {q:?}"));
        assert!(
            parse_query(&corrected).is_ok(),
            "correction of {q:?} does not parse: {corrected:?}"
        );
    }
}

#[test]
fn validating_corrected_query_yields_no_further_corrections() {
    for q in ["severity=high AND resolved:1", "src_ip:10.0.0.1 proto:tcp"] {
        let first = validate_query(q, EntityType::Alarms);
        let corrected = first.corrected_query.expect("first pass should correct");
        let second = validate_query(&corrected, EntityType::Alarms);
        assert!(
            second.corrected_query.is_none(),
            "correction of {q:?} is not a fixed point: {:?}",
            second.corrected_query
        );
    }
}

#[test]
fn progressive_and_plain_validation_agree_on_validity() {
    let cases = [
        ("protocol:tcp AND bytes:>1000000", true),
        ("severity:>=high", false),
        ("bogus:1", false),
        ("bytes:[500 TO 100]", false),
        ("*", true),
    ];
    for (q, valid) in cases {
        let entity = if q.contains("severity") {
            EntityType::Alarms
        } else {
            EntityType::Flows
        };
        assert_eq!(
            validate_query(q, entity).is_valid,
            valid,
            "validate_query({q:?})"
        );
        assert_eq!(
            validate_progressive(q, entity).is_valid,
            valid,
            "validate_progressive({q:?})"
        );
    }
}

#[test]
fn progressive_halts_in_stage_order() {
    // a query broken at several levels reports only the earliest stage
    let report = validate_progressive("(bogus:>=x", EntityType::Flows);
    assert_eq!(report.halted_at, Some(Stage::BasicSyntax));
    assert_eq!(report.stages.len(), 1);
}

#[test]
fn entity_type_round_trips_through_strings() {
    for e in EntityType::ALL {
        assert_eq!(EntityType::from_str(e.as_str()), Some(e));
    }
    assert_eq!(EntityType::from_str("flows"), Some(EntityType::Flows));
    assert_eq!(EntityType::from_str("bogus"), None);
}

#[test]
fn match_all_is_its_own_leaf() {
    let ast = parse_query("*").unwrap();
    assert!(ast.is_match_all());
    assert!(matches!(ast, QueryNode::Field { .. }));
}
