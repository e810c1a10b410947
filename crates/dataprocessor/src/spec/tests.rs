use super::*;
use crate::error::ErrorClass;
use proptest::prelude::*;

fn field(name: &str) -> FieldSpecification {
    FieldSpecification::new(name, FieldType::String, name.to_uppercase(), None, name)
}

fn spec_of(names: &[&str]) -> DataSpecification {
    DataSpecification::try_from_fields(names.iter().map(|n| field(n)))
        .expect("fixture names should be unique")
}

#[test]
fn add_then_exists() {
    let mut spec = DataSpecification::new();
    spec.add_field_specification("id", field("id")).expect("first add should succeed");

    assert!(spec.does_field_exist("id"));
    assert_eq!(spec.field_specification_by_name("id")
            .expect("added field should exist")
            .title(), "ID");
}

#[test]
fn duplicate_add_fails_without_mutation() {
    let mut spec = spec_of(&["id"]);
    let before = spec.clone();

    let replacement = FieldSpecification::new("id", FieldType::Integer, "Other", None, "x");
    let err = spec
        .add_field_specification("id", replacement)
        .expect_err("duplicate add should fail");

    assert_eq!(err.name, "id");
    assert_eq!(spec, before);
}

#[test]
fn missing_lookup_is_not_found() {
    let spec = spec_of(&["id"]);
    let err = spec
        .field_specification_by_name("nope")
        .expect_err("missing field should not resolve");
    assert_eq!(err.class, ErrorClass::NotFound);
}

#[test]
fn duplicate_converts_to_duplicate_field_error() {
    let err: Error = FieldExistsError {
        name: "id".to_string(),
    }
    .into();
    assert!(err.is_duplicate_field());
}

#[test]
fn merge_prefixes_names_and_keeps_order() {
    let mut target = spec_of(&["a"]);
    let other = spec_of(&["z", "m", "b"]);

    target
        .merge(&other, "src::")
        .expect("disjoint merge should succeed");

    let names: Vec<_> = target.names().collect();
    assert_eq!(names, ["a", "src::z", "src::m", "src::b"]);
    // aliases are not rewritten by a merge
    assert_eq!(
        target
            .field_specification_by_name("src::m")
            .expect("merged field should exist")
            .alias(),
        "m"
    );
}

#[test]
fn merge_collision_reports_first_clash() {
    let mut target = spec_of(&["p_b"]);
    let other = spec_of(&["a", "b", "c"]);

    let err = target
        .merge(&other, "p_")
        .expect_err("colliding merge should fail");
    assert_eq!(err.name, "p_b");
    assert!(target.does_field_exist("p_a"));
    assert!(!target.does_field_exist("p_c"));
}

#[test]
fn option_labels_resolve_by_key() {
    let mut options = FieldOptions::new();
    options.insert("1".to_string(), "Child of".to_string());
    let f = FieldSpecification::new("t", FieldType::Integer, "Type", Some(options), "t");

    assert_eq!(f.option_label(&crate::value::Value::Int(1)), Some("Child of"));
    assert_eq!(f.option_label(&crate::value::Value::Int(2)), None);
}

fn arb_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,6}", 0..8).prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn add_makes_field_exist(names in arb_names(), extra in "[A-Z]{1,6}") {
        let mut spec = DataSpecification::try_from_fields(names.iter().map(|n| field(n)))
            .expect("generated names should be unique");
        let len = spec.len();

        spec.add_field_specification(extra.clone(), field(&extra))
            .expect("uppercase name should be new");
        prop_assert!(spec.does_field_exist(&extra));
        prop_assert_eq!(spec.len(), len + 1);

        let before = spec.clone();
        prop_assert!(spec.add_field_specification(extra.clone(), field(&extra)).is_err());
        prop_assert_eq!(spec, before);
    }

    #[test]
    fn merge_copies_every_field(a in arb_names(), b in arb_names(), prefix in "[A-Z]{1,3}_") {
        let mut target = DataSpecification::try_from_fields(a.iter().map(|n| field(n)))
            .expect("generated names should be unique");
        let other = DataSpecification::try_from_fields(b.iter().map(|n| field(n)))
            .expect("generated names should be unique");
        let original_other = other.clone();

        // lowercase names never collide with an uppercase prefix
        target
            .merge(&other, &prefix)
            .expect("prefixed merge should succeed");

        prop_assert_eq!(&other, &original_other);
        prop_assert_eq!(target.len(), a.len() + b.len());
        for f in other.fields() {
            let merged = target
                .field_specification_by_name(&format!("{prefix}{}", f.name()))
                .expect("every field should be merged");
            prop_assert_eq!(merged.field_type(), f.field_type());
            prop_assert_eq!(merged.title(), f.title());
            prop_assert_eq!(merged.options(), f.options());
        }
    }
}
