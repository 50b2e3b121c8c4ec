//! Integration tests for rules file loading.

mod common;

use common::fixtures::{zephyr_rules_json, ProjectBuilder};

use zgate::core::rules::{Rules, RulesError};

#[test]
fn test_load_committed_rules() {
    let fx = ProjectBuilder::new().rules_json(zephyr_rules_json()).build();

    let rules = Rules::load(fx.path(".agent_rules.json")).unwrap();
    let project = rules.project("zephyr").unwrap();
    assert_eq!(project.file_rules.allowed_to_modify, vec!["unit_tests/"]);
    assert_eq!(project.coverage_rules.threshold, 80.0);
    assert_eq!(project.mock_rules.app_target, "app");
    assert!(project.test_runner().is_some());
}

#[test]
fn test_single_project_selected_implicitly() {
    let fx = ProjectBuilder::new().rules_json(zephyr_rules_json()).build();

    let rules = Rules::load(fx.path(".agent_rules.json")).unwrap();
    assert_eq!(rules.select(None).unwrap().project_type, "zephyr");
}

#[test]
fn test_unknown_project_lists_available() {
    let fx = ProjectBuilder::new().rules_json(zephyr_rules_json()).build();

    let rules = Rules::load(fx.path(".agent_rules.json")).unwrap();
    let err = rules.project("nrf").unwrap_err();
    assert!(matches!(err, RulesError::UnknownProject { .. }));
    assert!(err.to_string().contains("zephyr"));
}

#[test]
fn test_missing_rules_file() {
    let fx = ProjectBuilder::new().build();
    let err = Rules::load(fx.path(".agent_rules.json")).unwrap_err();
    assert!(matches!(err, RulesError::NotFound(_)));
}

#[test]
fn test_malformed_rules_file() {
    let fx = ProjectBuilder::new().build();
    fx.write(".agent_rules.json", "{ not json");

    let err = Rules::load(fx.path(".agent_rules.json")).unwrap_err();
    assert!(matches!(err, RulesError::Parse(_)));
}
