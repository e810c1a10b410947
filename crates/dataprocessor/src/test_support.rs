use crate::{
    catalog::{CatalogField, CustomGroup, InMemoryCatalog, RelationshipType, SharedCatalog},
    config::EngineConfig,
    configuration::Configuration,
    processor::Registry,
    source::{EntitySource, RelationshipSource, Source, SourceSet},
    spec::{FieldOptions, FieldType},
    store::InMemoryStore,
    value::Value,
};
use std::sync::Arc;

pub(crate) const CONTACT_TABLE: &str = "civicrm_contact";
pub(crate) const RELATIONSHIP_TABLE: &str = "civicrm_relationship";
pub(crate) const ACTIVITY_TABLE: &str = "civicrm_activity";
pub(crate) const CONSTITUENT_TABLE: &str = "civicrm_value_constituent_info";

pub(crate) fn options(pairs: &[(&str, &str)]) -> FieldOptions {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Contact, Relationship and Activity with one custom group on Contact.
pub(crate) fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_entity(
            "Contact",
            CONTACT_TABLE,
            vec![
                CatalogField::new("id", FieldType::Integer, "Contact ID"),
                CatalogField::new("display_name", FieldType::String, "Display name"),
                CatalogField::new("contact_type", FieldType::String, "Contact type").with_options(
                    options(&[
                        ("Individual", "Individual"),
                        ("Organization", "Organization"),
                        ("Household", "Household"),
                    ]),
                ),
                CatalogField::new("birth_date", FieldType::Date, "Birth date"),
                CatalogField::new("is_deleted", FieldType::Boolean, "Deleted"),
            ],
        )
        .with_entity(
            "Relationship",
            RELATIONSHIP_TABLE,
            vec![
                CatalogField::new("id", FieldType::Integer, "Relationship ID"),
                CatalogField::new("contact_id_a", FieldType::Integer, "Contact A"),
                CatalogField::new("contact_id_b", FieldType::Integer, "Contact B"),
                CatalogField::new("relationship_type_id", FieldType::Integer, "Type ID"),
                CatalogField::new("is_active", FieldType::Boolean, "Active"),
            ],
        )
        .with_entity(
            "Activity",
            ACTIVITY_TABLE,
            vec![
                CatalogField::new("id", FieldType::Integer, "Activity ID"),
                CatalogField::new("subject", FieldType::String, "Subject"),
                CatalogField::new("activity_date_time", FieldType::Timestamp, "Date"),
                CatalogField::new("status_id", FieldType::Integer, "Status")
                    .with_options(options(&[("1", "Scheduled"), ("2", "Completed")])),
            ],
        )
        .with_custom_group(CustomGroup {
            name: "constituent_info".to_string(),
            title: "Constituent information".to_string(),
            table: CONSTITUENT_TABLE.to_string(),
            extends: "Contact".to_string(),
            fields: vec![
                CatalogField::new("most_important_issue", FieldType::String, "Most important issue")
                    .with_column("most_important_issue_1"),
                CatalogField::new("marital_status", FieldType::String, "Marital status")
                    .with_column("marital_status_2")
                    .with_options(options(&[("S", "Single"), ("M", "Married")])),
            ],
        })
        .with_relationship_type(RelationshipType {
            id: 1,
            name_a_b: "Child of".to_string(),
            label_a_b: "Child of".to_string(),
            label_b_a: "Parent of".to_string(),
        })
        .with_relationship_type(RelationshipType {
            id: 5,
            name_a_b: "Employee of".to_string(),
            label_a_b: "Employee of".to_string(),
            label_b_a: "Employer of".to_string(),
        })
}

pub(crate) fn shared_catalog() -> SharedCatalog {
    Arc::new(catalog())
}

pub(crate) fn engine_config() -> Arc<EngineConfig> {
    Arc::new(EngineConfig {
        base_url: "https://crm.example.org".to_string(),
        ..EngineConfig::default()
    })
}

pub(crate) fn registry() -> Registry {
    Registry::with_defaults(shared_catalog(), engine_config())
        .expect("built-in registrations should not clash")
}

/// Configuration mapping from a JSON object literal.
pub(crate) fn config(value: serde_json::Value) -> Configuration {
    value
        .as_object()
        .cloned()
        .expect("test configuration should be a JSON object")
}

pub(crate) fn contact_source(catalog: &SharedCatalog, name: &str) -> Box<dyn Source> {
    let mut source = EntitySource::new(catalog.clone(), "contact", "Contact");
    source
        .initialize(&Configuration::new(), name)
        .expect("contact source should initialize");
    Box::new(source)
}

pub(crate) fn relationship_source(catalog: &SharedCatalog, name: &str) -> Box<dyn Source> {
    let mut source = RelationshipSource::new(catalog.clone(), "relationship");
    source
        .initialize(&Configuration::new(), name)
        .expect("relationship source should initialize");
    Box::new(source)
}

/// A source set holding one contact source named `contact`.
pub(crate) fn contact_set() -> SourceSet {
    let mut sources = SourceSet::new();
    sources.push(contact_source(&shared_catalog(), "contact"));
    sources
}

/// Rows matching [`catalog`].
pub(crate) fn store() -> InMemoryStore {
    InMemoryStore::new()
        .with_rows(
            CONTACT_TABLE,
            &["id", "display_name", "contact_type", "birth_date", "is_deleted"],
            vec![
                vec![
                    42.into(),
                    "Jane Doe".into(),
                    "Individual".into(),
                    "1980-04-12".into(),
                    0.into(),
                ],
                vec![
                    7.into(),
                    "Acme Corp".into(),
                    "Organization".into(),
                    Value::Null,
                    0.into(),
                ],
                vec![
                    99.into(),
                    "John Roe".into(),
                    "Individual".into(),
                    "1975-11-02".into(),
                    0.into(),
                ],
                vec![
                    13.into(),
                    "Old Contact".into(),
                    "Individual".into(),
                    Value::Null,
                    1.into(),
                ],
            ],
        )
        .with_rows(
            RELATIONSHIP_TABLE,
            &["id", "contact_id_a", "contact_id_b", "relationship_type_id", "is_active"],
            vec![
                vec![1.into(), 42.into(), 7.into(), 5.into(), 1.into()],
                vec![2.into(), 99.into(), 42.into(), 1.into(), 1.into()],
            ],
        )
        .with_rows(
            CONSTITUENT_TABLE,
            &["id", "entity_id", "most_important_issue_1", "marital_status_2"],
            vec![vec![1.into(), 42.into(), "Environment".into(), "S".into()]],
        )
        .with_rows(
            ACTIVITY_TABLE,
            &["id", "subject", "activity_date_time", "status_id"],
            vec![vec![
                1.into(),
                "Follow-up call".into(),
                "2024-03-05 14:30:00".into(),
                2.into(),
            ]],
        )
}
