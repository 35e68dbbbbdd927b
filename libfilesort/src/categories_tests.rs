// libfilesort/src/categories_tests.rs

use super::categories::{normalize_extension, CategoryTable, ExtensionIndex, DEFAULT_CATCH_ALL};
use super::error::Error;

fn default_index() -> ExtensionIndex {
    ExtensionIndex::build(&CategoryTable::default(), DEFAULT_CATCH_ALL).unwrap()
}

#[test]
fn classify_ignores_case() {
    let idx = default_index();
    assert_eq!(idx.classify(".PDF"), "Documents");
    assert_eq!(idx.classify(".pdf"), "Documents");
    assert_eq!(idx.classify(".Jpg"), "Images");
    assert_eq!(idx.classify("mp3"), "Audio");
}

#[test]
fn every_configured_extension_maps_back_to_its_category() {
    let table = CategoryTable::default();
    let idx = ExtensionIndex::build(&table, DEFAULT_CATCH_ALL).unwrap();
    for (category, exts) in table.iter() {
        for ext in exts {
            assert_eq!(idx.classify(ext), category);
            assert_eq!(idx.classify(&ext.to_uppercase()), category);
        }
    }
}

#[test]
fn unknown_and_empty_extensions_use_catch_all() {
    let idx = default_index();
    assert_eq!(idx.classify(".xyz"), "Other");
    assert_eq!(idx.classify(""), "Other");
    assert_eq!(idx.catch_all(), "Other");
}

#[test]
fn catch_all_name_is_configurable() {
    let idx = ExtensionIndex::build(&CategoryTable::default(), "Outros").unwrap();
    assert_eq!(idx.classify(".xyz"), "Outros");
    assert!(idx.category_names().contains("Outros"));
}

#[test]
fn duplicate_extension_across_categories_is_rejected() {
    let mut table = CategoryTable::empty();
    table.insert("Documents", [".pdf", ".txt"]);
    table.insert("Scans", ["PDF"]);

    let err = ExtensionIndex::build(&table, DEFAULT_CATCH_ALL).unwrap_err();
    match err {
        Error::Config(msg) => assert!(msg.contains(".pdf"), "got: {msg}"),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn duplicate_within_one_category_is_merged() {
    let mut table = CategoryTable::empty();
    table.insert("Documents", [".pdf", ".PDF", "pdf"]);
    let idx = ExtensionIndex::build(&table, DEFAULT_CATCH_ALL).unwrap();
    assert_eq!(idx.len(), 1);
}

#[test]
fn category_names_must_be_plain_directory_names() {
    for bad in ["", "..", "a/b", "/abs", "."] {
        let mut table = CategoryTable::empty();
        table.insert(bad, [".x"]);
        assert!(
            matches!(ExtensionIndex::build(&table, DEFAULT_CATCH_ALL), Err(Error::Config(_))),
            "`{bad}` should be rejected"
        );
        assert!(
            matches!(ExtensionIndex::build(&CategoryTable::empty(), bad), Err(Error::Config(_))),
            "catch-all `{bad}` should be rejected"
        );
    }
}

#[test]
fn empty_extension_is_rejected() {
    let mut table = CategoryTable::empty();
    table.insert("Blank", ["."]);
    assert!(matches!(
        ExtensionIndex::build(&table, DEFAULT_CATCH_ALL),
        Err(Error::Config(_))
    ));
}

#[test]
fn normalize_extension_forms() {
    assert_eq!(normalize_extension("PDF"), ".pdf");
    assert_eq!(normalize_extension(".Tar"), ".tar");
    assert_eq!(normalize_extension("  .md "), ".md");
    assert_eq!(normalize_extension(""), "");
    assert_eq!(normalize_extension("."), "");
}

#[test]
fn table_from_pairs() {
    let table: CategoryTable = vec![("Code", vec!["rs", "py"]), ("Books", vec!["epub"])]
        .into_iter()
        .collect();
    let idx = ExtensionIndex::build(&table, "Misc").unwrap();
    assert_eq!(idx.classify(".RS"), "Code");
    assert_eq!(idx.classify(".epub"), "Books");
    assert_eq!(idx.classify(".pdf"), "Misc");
}
