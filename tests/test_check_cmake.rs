//! Integration tests for the CMakeLists policy check.

mod common;

use common::fixtures::{zephyr_rules_json, ProjectBuilder};

use zgate::checks::cmake::check_cmake;
use zgate::git::ChangedFiles;

#[test]
fn test_modified_cmakelists_with_violation() {
    let fx = ProjectBuilder::new()
        .rules_json(zephyr_rules_json())
        .file("unit_tests/CMakeLists.txt", "project(tests)\n")
        .build();
    let rules = fx.load_rules();
    let config = rules.project("zephyr").unwrap();

    fx.write(
        "unit_tests/CMakeLists.txt",
        "project(tests)\ninclude_directories(../../src/core)\n",
    );

    let changed = ChangedFiles::collect(&fx.root).unwrap();
    assert_eq!(changed.modified, vec!["unit_tests/CMakeLists.txt"]);

    let findings = check_cmake(&fx.root, &changed, &config.file_rules, &config.cmake_rules).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].file, "unit_tests/CMakeLists.txt");
    assert_eq!(findings[0].line, Some(2));
    assert!(findings[0].reason.contains("include dir"));
}

#[test]
fn test_untracked_cmakelists_is_scanned() {
    let fx = ProjectBuilder::new().rules_json(zephyr_rules_json()).build();
    let rules = fx.load_rules();
    let config = rules.project("zephyr").unwrap();

    fx.write(
        "unit_tests/driver/CMakeLists.txt",
        "add_subdirectory(../../drivers/uart build_uart)\n",
    );

    let changed = ChangedFiles::collect(&fx.root).unwrap();
    let findings = check_cmake(&fx.root, &changed, &config.file_rules, &config.cmake_rules).unwrap();
    assert_eq!(findings.len(), 1);
    assert!(findings[0].reason.contains("subdirectory"));
}

#[test]
fn test_cmakelists_outside_allowed_paths_not_scanned() {
    let fx = ProjectBuilder::new().rules_json(zephyr_rules_json()).build();
    let rules = fx.load_rules();
    let config = rules.project("zephyr").unwrap();

    // Violating content, but not under unit_tests/ so the cmake check skips
    // it (the file check reports it instead)
    fx.write("src/CMakeLists.txt", "include_directories(../../src/x)\n");

    let changed = ChangedFiles::collect(&fx.root).unwrap();
    let findings = check_cmake(&fx.root, &changed, &config.file_rules, &config.cmake_rules).unwrap();
    assert!(findings.is_empty());
}

#[test]
fn test_clean_cmakelists_passes() {
    let fx = ProjectBuilder::new().rules_json(zephyr_rules_json()).build();
    let rules = fx.load_rules();
    let config = rules.project("zephyr").unwrap();

    fx.write(
        "unit_tests/CMakeLists.txt",
        "project(tests)\n\
         include_directories(mocks)\n\
         target_link_libraries(test_uart PRIVATE mock_uart)\n",
    );

    let changed = ChangedFiles::collect(&fx.root).unwrap();
    let findings = check_cmake(&fx.root, &changed, &config.file_rules, &config.cmake_rules).unwrap();
    assert!(findings.is_empty(), "unexpected findings: {:?}", findings);
}

#[test]
fn test_forbidden_linked_library() {
    let fx = ProjectBuilder::new().rules_json(zephyr_rules_json()).build();
    let rules = fx.load_rules();
    let config = rules.project("zephyr").unwrap();

    fx.write(
        "unit_tests/CMakeLists.txt",
        "target_link_libraries(test_uart\n    PRIVATE\n    app_prod\n)\n",
    );

    let changed = ChangedFiles::collect(&fx.root).unwrap();
    let findings = check_cmake(&fx.root, &changed, &config.file_rules, &config.cmake_rules).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule, "app_prod");
    assert!(findings[0].reason.contains("linked library"));
}
