//! Tests for the catalog module

use super::*;
use crate::error::Error;
use crate::pagination::PaginationMode;
use pretty_assertions::assert_eq;

const MINIMAL: &str = r#"
base_url: https://odata.example.com/api/v2/views
streams:
  - name: parents
    path: /Parent
    primary_key: [parentId]
    replication_key: modifiedOn
    pagination: time_windowed_with_skip
    children: batched
    fields:
      - { name: parentId, type: string }
      - { name: modifiedOn, type: date_time }
  - name: kids
    path: /Kid
    primary_key: [kidId]
    pagination: skip_only
    page_size: 100
    parent:
      stream: parents
      parent_key: parentId
      child_key: parentId
    fields:
      - { name: kidId, type: string }
      - { name: parentId, type: string }
"#;

// ============================================================================
// Built-in Catalog Tests
// ============================================================================

#[test]
fn test_builtin_catalog_loads() {
    let catalog = Catalog::builtin().unwrap();
    assert_eq!(catalog.base_url(), "https://odata.restaurant365.net/api/v2/views");
    assert_eq!(catalog.descriptors().len(), 20);
}

#[test]
fn test_builtin_defaults_applied() {
    let catalog = Catalog::builtin().unwrap();
    let bills = catalog.descriptor("bills").unwrap();

    assert_eq!(bills.path, "/Transaction");
    assert_eq!(bills.page_size, 5000);
    assert_eq!(bills.window_days, 10);
    assert_eq!(bills.window(), chrono::Duration::days(10));
    assert_eq!(bills.records_path, "$.value[*]");
    assert_eq!(bills.continuation_key, "@odata.nextLink");
    assert_eq!(bills.type_filter.as_deref(), Some("type eq 'AP Invoice'"));
    assert_eq!(bills.pagination, PaginationMode::TimeWindowedWithSkip);
}

#[test]
fn test_builtin_transaction_family() {
    let catalog = Catalog::builtin().unwrap();

    let parent = catalog.descriptor("transaction").unwrap();
    assert_eq!(parent.children, DispatchStrategy::Batched);
    assert_eq!(parent.key_field(), Some("transactionId"));

    let child = catalog.child_of("transaction").unwrap();
    assert_eq!(child.name, "transaction_detail");
    assert!(child.is_child());
    assert_eq!(child.pagination, PaginationMode::SkipOnly);
    assert_eq!(child.parent.as_ref().unwrap().child_key, "transactionId");
}

#[test]
fn test_builtin_payroll_uses_window_fields() {
    let catalog = Catalog::builtin().unwrap();
    let payroll = catalog.descriptor("payroll_summary").unwrap();

    assert!(payroll.replication_key.is_none());
    assert!(payroll.primary_key.is_empty());
    assert_eq!(payroll.pagination, PaginationMode::TimeWindowed);
    let fields = payroll.window_fields.as_ref().unwrap();
    assert_eq!(fields.lower, "payrollStart");
    assert_eq!(fields.upper, "payrollEnd");
}

#[test]
fn test_top_level_excludes_children() {
    let catalog = Catalog::builtin().unwrap();
    let names: Vec<&str> = catalog.top_level().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"transaction"));
    assert!(!names.contains(&"transaction_detail"));
    assert_eq!(names.len(), 19);
}

// ============================================================================
// Lookup Tests
// ============================================================================

#[test]
fn test_unknown_stream() {
    let catalog = Catalog::builtin().unwrap();
    assert!(matches!(
        catalog.descriptor("nope"),
        Err(Error::StreamNotFound { .. })
    ));
}

#[test]
fn test_schema_catalog_lookup() {
    let catalog = Catalog::from_yaml(MINIMAL).unwrap();
    let fields = catalog.fields_for("kids").unwrap();
    assert_eq!(fields[0].name, "kidId");
    assert_eq!(fields[0].field_type, FieldType::String);
    assert_eq!(catalog.primary_key_for("parents").unwrap(), ["parentId"]);
}

#[test]
fn test_select_maps_child_to_parent() {
    let catalog = Catalog::from_yaml(MINIMAL).unwrap();

    let all = catalog.select(None).unwrap();
    assert_eq!(all, vec!["parents"]);

    let picked = catalog
        .select(Some(&["kids".to_string(), "parents".to_string()]))
        .unwrap();
    assert_eq!(picked, vec!["parents"]);
}

#[test]
fn test_stream_override_wins_over_default() {
    let catalog = Catalog::from_yaml(MINIMAL).unwrap();
    assert_eq!(catalog.descriptor("kids").unwrap().page_size, 100);
    assert_eq!(catalog.descriptor("parents").unwrap().page_size, 5000);
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_duplicate_names_rejected() {
    let yaml = r#"
base_url: https://x.example.com
streams:
  - { name: a, path: /A }
  - { name: a, path: /B }
"#;
    assert!(matches!(Catalog::from_yaml(yaml), Err(Error::Config { .. })));
}

#[test]
fn test_windowed_stream_needs_bound_field() {
    let yaml = r#"
base_url: https://x.example.com
streams:
  - { name: a, path: /A, pagination: time_windowed }
"#;
    let err = Catalog::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { .. }));
}

#[test]
fn test_window_days_out_of_range_rejected() {
    for days in ["0", "3651", "9999999999999"] {
        let yaml = format!(
            "base_url: https://x.example.com\nstreams:\n  - {{ name: a, path: /A, replication_key: modifiedOn, pagination: time_windowed_with_skip, window_days: {days} }}\n"
        );
        let err = Catalog::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "a.window_days"));
    }

    let unwindowed = "base_url: https://x.example.com\nwindow_days: 100000\nstreams:\n  - { name: a, path: /A }\n";
    assert!(Catalog::from_yaml(unwindowed).is_err());
}

#[test]
fn test_invalid_field_name_rejected() {
    let yaml = r#"
base_url: https://x.example.com
streams:
  - { name: a, path: /A, replication_key: "modifiedOn gt 1" }
"#;
    assert!(Catalog::from_yaml(yaml).is_err());
}

#[test]
fn test_zero_page_size_rejected() {
    let yaml = r#"
base_url: https://x.example.com
page_size: 0
streams:
  - { name: a, path: /A }
"#;
    assert!(Catalog::from_yaml(yaml).is_err());
}

#[test]
fn test_parent_must_exist() {
    let yaml = r#"
base_url: https://x.example.com
streams:
  - name: kid
    path: /Kid
    parent: { stream: ghost, parent_key: id, child_key: id }
"#;
    assert!(Catalog::from_yaml(yaml).is_err());
}

#[test]
fn test_parent_must_declare_children() {
    let yaml = r#"
base_url: https://x.example.com
streams:
  - { name: p, path: /P, primary_key: [id] }
  - name: kid
    path: /Kid
    parent: { stream: p, parent_key: id, child_key: id }
"#;
    assert!(Catalog::from_yaml(yaml).is_err());
}

#[test]
fn test_children_without_child_stream_rejected() {
    let yaml = r#"
base_url: https://x.example.com
streams:
  - { name: p, path: /P, primary_key: [id], children: per_record }
"#;
    assert!(Catalog::from_yaml(yaml).is_err());
}

#[test]
fn test_unknown_pagination_mode_is_yaml_error() {
    let yaml = r#"
base_url: https://x.example.com
streams:
  - { name: a, path: /A, pagination: cursor }
"#;
    assert!(matches!(Catalog::from_yaml(yaml), Err(Error::YamlParse(_))));
}

#[test]
fn test_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.yaml");
    std::fs::write(&path, MINIMAL).unwrap();

    let catalog = Catalog::from_file(&path).unwrap();
    assert_eq!(catalog.descriptors().len(), 2);

    assert!(Catalog::from_file(dir.path().join("missing.yaml")).is_err());
}

#[test]
fn test_json_schema_from_fields() {
    let catalog = Catalog::builtin().unwrap();
    let schema = catalog.descriptor("transaction").unwrap().json_schema();

    assert_eq!(schema["type"], "object");
    assert_eq!(schema["additionalProperties"], false);
    assert_eq!(
        schema["properties"]["modifiedOn"],
        serde_json::json!({"type": ["null", "string"], "format": "date-time"})
    );
    assert_eq!(
        schema["properties"]["isApproved"]["type"],
        serde_json::json!(["null", "boolean"])
    );
}
