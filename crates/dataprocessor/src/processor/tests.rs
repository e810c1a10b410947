use super::*;
use crate::{
    error::ErrorClass,
    output::RawOutput,
    test_support::{config, registry, store},
    value::Value,
};
use serde_json::json;

fn employees_json() -> serde_json::Value {
    json!({
        "name": "employees",
        "title": "Employees",
        "sources": [
            { "type": "contact", "name": "contact" },
            {
                "type": "relationship",
                "name": "relationship",
                "join_configuration": {
                    "left_source": "contact",
                    "left_field": "id",
                    "right_field": "contact_id_a",
                },
            },
            {
                "type": "contact",
                "name": "employer",
                "join_type": "simple_join",
                "join_configuration": {
                    "left_source": "relationship",
                    "left_field": "contact_id_b",
                    "right_field": "id",
                },
            },
        ],
        "filters": [
            {
                "type": "fixed_filter",
                "name": "not_deleted",
                "configuration": {
                    "datasource": "contact",
                    "field": "is_deleted",
                    "op": "=",
                    "value": 0,
                },
            },
            {
                "type": "simple_filter",
                "name": "relationship_type",
                "is_required": true,
                "configuration": {
                    "datasource": "relationship",
                    "field": "relationship_type_id",
                },
            },
        ],
        "outputs": [
            {
                "type": "contact_link",
                "alias": "display",
                "title": "Contact",
                "configuration": {
                    "contact_id_datasource": "contact",
                    "contact_id_field": "id",
                    "contact_name_datasource": "contact",
                    "contact_name_field": "display_name",
                },
            },
            {
                "type": "raw",
                "alias": "employer",
                "title": "Employer",
                "configuration": { "datasource": "employer", "field": "display_name" },
            },
            {
                "type": "date",
                "alias": "born",
                "configuration": { "datasource": "contact", "field": "birth_date" },
            },
            {
                "type": "concat",
                "alias": "summary",
                "title": "Summary",
                "configuration": { "fields": ["employer", "born"], "separator": " / " },
            },
        ],
    })
}

fn employees() -> ProcessorDefinition {
    ProcessorDefinition::from_json(&employees_json().to_string())
        .expect("fixture definition should parse")
}

fn processor() -> DataProcessor {
    registry()
        .build_processor(&employees())
        .expect("fixture definition should assemble")
}

fn employees_of() -> ProcessorRequest {
    ProcessorRequest::new().with_filter("relationship_type", SubmittedFilter::value(5))
}

// ----------------------------------------------------------------------
// Assembly
// ----------------------------------------------------------------------

#[test]
fn definition_json_fills_defaults() {
    let definition = employees();

    assert_eq!(definition.processor_type, DEFAULT_PROCESSOR_TYPE);
    assert_eq!(definition.id, None);
    assert_eq!(definition.sources[0].join_type, None);
    assert!(definition.sources[0].join_configuration.is_empty());
    assert!(definition.filters[1].is_required);
    assert_eq!(definition.outputs[2].title, "");
}

#[test]
fn malformed_definition_json_is_a_configuration_error() {
    let err = ProcessorDefinition::from_json("{ \"sources\": 3 }")
        .expect_err("malformed definition should fail");

    assert_eq!(err.class, ErrorClass::Configuration);
}

#[test]
fn assembly_keeps_declaration_order() {
    let processor = processor();

    assert_eq!(processor.name(), "employees");
    assert_eq!(processor.stage(), Stage::Assembled);
    let sources: Vec<_> = processor.data_sources().map(|s| s.source_name().to_string()).collect();
    assert_eq!(sources, ["contact", "relationship", "employer"]);
    let filters: Vec<_> = processor.filter_handlers().map(|f| f.name().to_string()).collect();
    assert_eq!(filters, ["not_deleted", "relationship_type"]);
    let outputs: Vec<_> = processor.output_handlers().map(|(alias, _)| alias.to_string()).collect();
    assert_eq!(outputs, ["display", "employer", "born", "summary"]);
    assert!(processor.has_required_filters());

    let born = processor
        .output_fields()
        .field_specification_by_name("born")
        .expect("born output should be described");
    assert_eq!(born.title(), "Birth date", "blank output titles fall back to the field");
}

#[test]
fn same_entity_sources_stay_distinct() {
    let processor = processor();
    let fields = processor
        .available_fields()
        .expect("merged fields should not collide");

    assert!(fields.does_field_exist("contact::display_name"));
    assert!(fields.does_field_exist("employer::display_name"));
    assert_eq!(
        fields
            .field_specification_by_name("employer::display_name")
            .map(|f| f.alias().to_string())
            .expect("employer field should exist"),
        "employer_display_name"
    );

    let filter_fields = processor
        .available_filter_fields()
        .expect("merged filter fields should not collide");
    assert!(filter_fields.does_field_exist("relationship::relationship_type_id"));
}

#[test]
fn registered_types_are_listed_and_duplicates_rejected() {
    let mut registry = registry();

    assert!(registry.contains(Kind::Source, "custom_group"));
    assert_eq!(
        registry.registered(Kind::Output),
        ["concat", "contact_link", "date", "raw"]
    );

    let err = registry
        .register_output("raw", |_| Box::new(RawOutput::new()))
        .expect_err("duplicate registration should fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn unknown_handler_types_fail_assembly() {
    let mut definition = employees();
    definition.outputs[1].output_type = "sparkline".to_string();

    let err = registry()
        .build_processor(&definition)
        .err()
        .expect("unknown output type should fail");
    assert_eq!(err.class, ErrorClass::Configuration);
    assert!(err.message.contains("sparkline"), "message: {}", err.message);
}

#[test]
fn non_primary_sources_need_a_join() {
    let mut definition = employees();
    definition.sources[1].join_configuration = Configuration::new();

    let err = registry()
        .build_processor(&definition)
        .err()
        .expect("unjoined source should fail");
    assert_eq!(err.class, ErrorClass::Configuration);
}

#[test]
fn duplicate_source_names_fail_assembly() {
    let mut definition = employees();
    definition.sources[2].name = "relationship".to_string();

    let err = registry()
        .build_processor(&definition)
        .err()
        .expect("duplicate source name should fail");
    assert_eq!(err.class, ErrorClass::Configuration);
}

#[test]
fn duplicate_output_aliases_fail_assembly() {
    let mut definition = employees();
    definition.outputs[3].alias = "born".to_string();

    let err = registry()
        .build_processor(&definition)
        .err()
        .expect("duplicate alias should fail");
    assert_eq!(err.class, ErrorClass::Configuration);
}

#[test]
fn names_are_built_from_titles_and_reserved_names_rejected() {
    assert_eq!(build_name_from_title("My Report: 2024!"), "my_report_2024_");
    assert_eq!(build_name_from_title("already_fine"), "already_fine");

    let mut definition = employees();
    definition.name = String::new();
    definition.title = "Staff List".to_string();
    assert_eq!(definition.validate_name().expect("title should yield a name"), "staff_list");

    definition.name = "Get".to_string();
    let err = definition
        .validate_name()
        .expect_err("reserved name should fail");
    assert_eq!(err.class, ErrorClass::Configuration);

    definition.name = String::new();
    definition.title = String::new();
    assert!(definition.validate_name().is_err());
}

#[test]
fn definitions_are_stored_under_unique_names() {
    let definitions = InMemoryDefinitions::new();

    let first = definitions.insert(employees()).expect("first insert should succeed");
    let mut other = employees();
    other.name = "staff".to_string();
    let second = definitions.insert(other).expect("second insert should succeed");
    assert_eq!((first, second), (1, 2));

    let err = definitions
        .insert(employees())
        .expect_err("duplicate name should fail");
    assert_eq!(err.class, ErrorClass::Configuration);

    let err = definitions
        .load_processor_definition(9)
        .expect_err("unknown id should fail");
    assert_eq!(err.class, ErrorClass::NotFound);

    let processor = registry()
        .build_processor_from(&definitions, second)
        .expect("stored definition should assemble");
    assert_eq!(processor.name(), "staff");
    assert_eq!(processor.id(), Some(2));
}

#[test]
fn definition_ids_do_not_overflow() {
    let definitions = InMemoryDefinitions::new();
    let mut last = employees();
    last.id = Some(i64::MAX);
    definitions.insert(last).expect("explicit id should be stored");

    let mut next = employees();
    next.name = "staff".to_string();
    let err = definitions
        .insert(next)
        .expect_err("no id after i64::MAX should be assigned");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

// ----------------------------------------------------------------------
// Planning and execution
// ----------------------------------------------------------------------

#[test]
fn plan_projects_exactly_what_outputs_use() {
    let mut processor = processor();
    let plan = processor.prepare(&employees_of()).expect("plan should build");

    let aliases: Vec<_> = plan.aliases().collect();
    assert_eq!(
        aliases,
        [
            "contact_id",
            "contact_display_name",
            "contact_birth_date",
            "employer_display_name",
        ]
    );
    assert_eq!(plan.joins.len(), 2);
    assert_eq!(plan.conditions.len(), 2);
    assert_eq!(plan.limit, Some(10));
    assert_eq!(plan.offset, 0);
    assert_eq!(processor.stage(), Stage::Planned);
}

#[test]
fn request_paging_overrides_the_default_limit() {
    let mut processor = processor();
    let plan = processor
        .prepare(&employees_of().with_page(Some(1), 3))
        .expect("plan should build");

    assert_eq!((plan.limit, plan.offset), (Some(1), 3));
}

#[test]
fn execute_formats_every_output_in_order() {
    let store = store();
    let mut processor = processor();

    let execution = processor
        .execute(&employees_of(), &store)
        .expect("execution should succeed");
    let rows = execution.rows().expect("valid request should yield rows");

    assert_eq!(store.executions(), 1);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    let keys: Vec<_> = row.keys().map(String::as_str).collect();
    assert_eq!(keys, ["display", "employer", "born", "summary"]);
    assert_eq!(
        row.formatted("display"),
        "<a href=\"https://crm.example.org/civicrm/contact/view?reset=1&cid=42\">Jane Doe</a>"
    );
    assert_eq!(row.formatted("employer"), "Acme Corp");
    assert_eq!(row.formatted("born"), "1980-04-12");
    assert_eq!(row.formatted("summary"), "Acme Corp / 1980-04-12");
    assert_eq!(row["display"].raw_value, Value::from("Jane Doe"));
    assert_eq!(processor.stage(), Stage::Done);
}

#[test]
fn formatting_is_repeatable_over_fetched_rows() {
    let store = store();
    let mut processor = processor();
    processor.prepare(&employees_of()).expect("plan should build");
    let plan = processor.plan().expect("prepared processor has a plan");
    let raw = store.execute(plan).expect("plan should execute");

    assert_eq!(processor.format_rows(&raw), processor.format_rows(&raw));
}

#[test]
fn invalid_filters_reject_without_touching_the_store() {
    let store = store();
    let mut processor = processor();

    let missing = processor
        .execute(&ProcessorRequest::new(), &store)
        .expect("validation failures are not errors");
    assert_eq!(missing.messages(), ["Relationship type is required"]);
    assert!(missing.is_rejected());
    assert_eq!(store.executions(), 0);
    assert_eq!(processor.stage(), Stage::Done);

    let mut processor = self::processor();
    let unknown = processor
        .execute(
            &ProcessorRequest::new().with_filter("relationship_type", SubmittedFilter::value(3)),
            &store,
        )
        .expect("validation failures are not errors");
    assert_eq!(unknown.messages(), ["Relationship type: '3' is not a valid option"]);
    assert_eq!(store.executions(), 0);
}

#[test]
fn processors_serve_a_single_request() {
    let store = store();
    let mut processor = processor();
    processor
        .execute(&employees_of(), &store)
        .expect("first execution should succeed");

    let err = processor
        .execute(&employees_of(), &store)
        .expect_err("second execution should fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert_eq!(store.executions(), 1);

    let mut prepared = self::processor();
    prepared.prepare(&employees_of()).expect("plan should build");
    let err = prepared
        .execute(&employees_of(), &store)
        .expect_err("execute after prepare should fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn planned_processors_reject_further_assembly() {
    let mut processor = processor();
    processor.prepare(&employees_of()).expect("plan should build");

    let err = processor
        .add_output_handler(
            Box::new(RawOutput::new()),
            "late",
            "",
            &config(json!({ "datasource": "contact", "field": "id" })),
        )
        .expect_err("late output should fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn store_failures_propagate_unchanged() {
    let store = store().with_failure("connection refused");
    let mut processor = processor();

    let err = processor
        .execute(&employees_of(), &store)
        .expect_err("store failure should propagate");
    assert_eq!(err.class, ErrorClass::Execution);
    assert_eq!(err.message, "store unavailable: connection refused");
    assert_eq!(processor.stage(), Stage::Done);
    assert_eq!(store.executions(), 1);
}

#[test]
fn reconfigured_outputs_format_with_their_new_settings() {
    let store = store();
    let mut processor = processor();
    processor
        .reconfigure_output(
            "born",
            &config(json!({ "datasource": "contact", "field": "birth_date", "format": "%d.%m.%Y" })),
        )
        .expect("reconfiguration should succeed");

    let execution = processor
        .execute(&employees_of(), &store)
        .expect("execution should succeed");
    let rows = execution.rows().expect("valid request should yield rows");
    assert_eq!(rows[0].formatted("born"), "12.04.1980");
    assert_eq!(rows[0].formatted("summary"), "Acme Corp / 12.04.1980");

    let err = processor
        .reconfigure_output("born", &Configuration::new())
        .expect_err("reconfiguring after execution should fail");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn reconfiguring_an_unknown_output_is_not_found() {
    let mut processor = processor();
    let err = processor
        .reconfigure_output("nope", &Configuration::new())
        .expect_err("unknown alias should fail");

    assert_eq!(err.class, ErrorClass::NotFound);
}

#[test]
fn reconfiguring_drops_fields_only_the_old_settings_read() {
    let mut processor = processor();
    processor
        .reconfigure_output(
            "born",
            &config(json!({ "datasource": "contact", "field": "contact_type" })),
        )
        .expect("reconfiguration should succeed");

    let plan = processor.prepare(&employees_of()).expect("plan should build");
    let aliases: Vec<_> = plan.aliases().collect();
    assert_eq!(
        aliases,
        [
            "contact_id",
            "contact_display_name",
            "contact_contact_type",
            "employer_display_name",
        ]
    );
}

#[test]
fn failed_reconfiguration_leaves_the_processor_unusable() {
    let store = store();
    let mut processor = processor();

    let err = processor
        .reconfigure_output(
            "display",
            &config(json!({
                "contact_id_datasource": "contact",
                "contact_id_field": "id",
                "contact_name_datasource": "contact",
            })),
        )
        .expect_err("missing name field should fail");
    assert_eq!(err.class, ErrorClass::Configuration);
    assert_eq!(processor.stage(), Stage::Failed);

    let err = processor
        .execute(&employees_of(), &store)
        .expect_err("failed processor should not execute");
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert_eq!(store.executions(), 0);
}

#[test]
fn colliding_projection_aliases_fail_assembly() {
    // `a` + `custom_most_important_issue` and `a_custom` + `most_important_issue`
    // would both be fetched as `a_custom_most_important_issue`.
    let definition = ProcessorDefinition::from_json(
        &json!({
            "title": "Issues",
            "sources": [
                { "type": "contact", "name": "a" },
                {
                    "type": "custom_group",
                    "name": "a_custom",
                    "configuration": { "custom_group": "constituent_info" },
                    "join_configuration": {
                        "type": "LEFT",
                        "left_source": "a",
                        "left_field": "id",
                        "right_field": "entity_id",
                    },
                },
            ],
            "outputs": [
                {
                    "type": "raw",
                    "alias": "mine",
                    "configuration": { "datasource": "a", "field": "custom_most_important_issue" },
                },
                {
                    "type": "raw",
                    "alias": "theirs",
                    "configuration": { "datasource": "a_custom", "field": "most_important_issue" },
                },
            ],
        })
        .to_string(),
    )
    .expect("definition should parse");

    let err = registry()
        .build_processor(&definition)
        .err()
        .expect("colliding aliases should fail");
    assert_eq!(err.class, ErrorClass::Configuration);
    assert!(
        err.message.contains("a_custom_most_important_issue"),
        "message: {}",
        err.message
    );
}

#[test]
fn colliding_table_aliases_fail_assembly() {
    // The implicit custom-group join of `contact` binds `contact_constituent_info`.
    let definition = ProcessorDefinition::from_json(
        &json!({
            "title": "Issues",
            "sources": [
                { "type": "contact", "name": "contact" },
                {
                    "type": "contact",
                    "name": "contact_constituent_info",
                    "join_configuration": {
                        "left_source": "contact",
                        "left_field": "id",
                        "right_field": "id",
                    },
                },
            ],
            "outputs": [
                {
                    "type": "raw",
                    "alias": "issue",
                    "configuration": { "datasource": "contact", "field": "custom_most_important_issue" },
                },
            ],
        })
        .to_string(),
    )
    .expect("definition should parse");

    let err = registry()
        .build_processor(&definition)
        .err()
        .expect("colliding table aliases should fail");
    assert_eq!(err.class, ErrorClass::Configuration);
    assert!(err.message.contains("contact_constituent_info"), "message: {}", err.message);
}

fn with_kind_filter(first: bool) -> DataProcessor {
    let mut document = employees_json();
    let kind = json!({
        "type": "simple_filter",
        "name": "kind",
        "title": "Kind",
        "configuration": { "datasource": "contact", "field": "contact_type" },
    });
    let filters = document["filters"]
        .as_array_mut()
        .expect("fixture filters should be a list");
    if first {
        filters.insert(0, kind);
    } else {
        filters.push(kind);
    }
    let definition = ProcessorDefinition::from_json(&document.to_string())
        .expect("fixture definition should parse");

    registry()
        .build_processor(&definition)
        .expect("fixture definition should assemble")
}

#[test]
fn every_filter_reports_its_messages_in_attachment_order() {
    let store = store();
    let request = ProcessorRequest::new().with_filter("kind", SubmittedFilter::value("Robot"));

    let execution = with_kind_filter(false)
        .execute(&request, &store)
        .expect("validation failures are not errors");
    assert_eq!(
        execution.messages(),
        ["Relationship type is required", "Kind: 'Robot' is not a valid option"]
    );

    let execution = with_kind_filter(true)
        .execute(&request, &store)
        .expect("validation failures are not errors");
    assert_eq!(
        execution.messages(),
        ["Kind: 'Robot' is not a valid option", "Relationship type is required"]
    );
    assert_eq!(store.executions(), 0);
}

#[test]
fn filter_conditions_follow_attachment_order_within_a_source() {
    let request = employees_of().with_filter("kind", SubmittedFilter::value("Individual"));

    let mut appended = with_kind_filter(false);
    let plan = appended.prepare(&request).expect("plan should build");
    let columns: Vec<_> = plan.conditions.iter().map(|c| c.column.column.as_str()).collect();
    assert_eq!(columns, ["is_deleted", "contact_type", "relationship_type_id"]);

    let mut prepended = with_kind_filter(true);
    let plan = prepended.prepare(&request).expect("plan should build");
    let columns: Vec<_> = plan.conditions.iter().map(|c| c.column.column.as_str()).collect();
    assert_eq!(columns, ["contact_type", "is_deleted", "relationship_type_id"]);
}

#[test]
fn reconfigured_contact_link_follows_its_new_sources() {
    let store = store();
    let mut processor = processor();
    processor
        .reconfigure_output(
            "display",
            &config(json!({
                "contact_id_datasource": "employer",
                "contact_id_field": "id",
                "contact_name_datasource": "employer",
                "contact_name_field": "display_name",
            })),
        )
        .expect("reconfiguration should succeed");

    let execution = processor
        .execute(&employees_of(), &store)
        .expect("execution should succeed");
    let plan = processor.plan().expect("executed processor keeps its plan");
    let aliases: Vec<_> = plan.aliases().collect();
    assert_eq!(
        aliases,
        ["contact_birth_date", "employer_id", "employer_display_name"]
    );

    let rows = execution.rows().expect("valid request should yield rows");
    assert_eq!(
        rows[0].formatted("display"),
        "<a href=\"https://crm.example.org/civicrm/contact/view?reset=1&cid=7\">Acme Corp</a>"
    );
}
