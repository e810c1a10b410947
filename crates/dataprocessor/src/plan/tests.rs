use super::*;

fn fragment(table: &str, alias: &str, columns: &[&str]) -> SourceFragment {
    let mut fragment = SourceFragment::new(TableRef::new(table, alias));
    for column in columns {
        fragment.projection.push(ProjectedColumn {
            column: ColumnRef::new(alias, *column),
            alias: format!("{alias}_{column}"),
        });
    }
    fragment
}

#[test]
fn builder_appends_fragments_in_source_order() {
    let contact = fragment("civicrm_contact", "contact", &["id", "display_name"]);
    let mut relationship = fragment("civicrm_relationship", "relationship", &["id"]);
    relationship.conditions.push(Condition {
        column: ColumnRef::new("relationship", "is_active"),
        op: CompareOp::Eq,
        value: Value::Int(1),
    });

    let plan = PlanBuilder::new(contact)
        .join(
            JoinClause {
                join_type: JoinType::Left,
                table: relationship.table.clone(),
                left: ColumnRef::new("contact", "id"),
                right: ColumnRef::new("relationship", "contact_id_a"),
            },
            relationship,
        )
        .page(Some(10), 20)
        .build();

    let aliases: Vec<_> = plan.aliases().collect();
    assert_eq!(
        aliases,
        ["contact_id", "contact_display_name", "relationship_id"]
    );
    assert_eq!(plan.joins.len(), 1);
    assert_eq!(plan.conditions.len(), 1);
    assert_eq!(
        plan.to_string(),
        "SELECT `contact`.`id` AS `contact_id`, `contact`.`display_name` AS `contact_display_name`, \
         `relationship`.`id` AS `relationship_id` FROM `civicrm_contact` `contact` \
         LEFT JOIN `civicrm_relationship` `relationship` ON `contact`.`id` = `relationship`.`contact_id_a` \
         WHERE `relationship`.`is_active` = 1 LIMIT 20, 10"
    );
}

#[test]
fn implicit_joins_follow_their_source_join() {
    let contact = fragment("civicrm_contact", "contact", &["id"]);
    let mut other = fragment("civicrm_contact", "spouse", &["id"]);
    other.joins.push(JoinClause {
        join_type: JoinType::Left,
        table: TableRef::new("civicrm_value_extra", "spouse_extra"),
        left: ColumnRef::new("spouse", "id"),
        right: ColumnRef::new("spouse_extra", "entity_id"),
    });

    let plan = PlanBuilder::new(contact)
        .join(
            JoinClause {
                join_type: JoinType::Inner,
                table: other.table.clone(),
                left: ColumnRef::new("contact", "id"),
                right: ColumnRef::new("spouse", "id"),
            },
            other,
        )
        .build();

    let tables: Vec<_> = plan.joins.iter().map(|j| j.table.alias.as_str()).collect();
    assert_eq!(tables, ["spouse", "spouse_extra"]);
}

#[test]
fn join_type_parses_platform_tags() {
    assert_eq!(JoinType::parse("INNER"), Some(JoinType::Inner));
    assert_eq!(JoinType::parse("left outer"), Some(JoinType::Left));
    assert_eq!(JoinType::parse("cross"), None);
}

#[test]
fn operators_check_operand_shape() {
    assert!(CompareOp::In.accepts(&Value::from(vec![1i64, 2])));
    assert!(!CompareOp::In.accepts(&Value::Int(1)));
    assert!(!CompareOp::In.accepts(&Value::List(Vec::new())));
    assert!(CompareOp::Between.accepts(&Value::from(vec![1i64, 5])));
    assert!(!CompareOp::Between.accepts(&Value::from(vec![1i64])));
    assert!(CompareOp::IsNull.accepts(&Value::Null));
    assert!(!CompareOp::Eq.accepts(&Value::Null));
}

#[test]
fn operators_deserialize_from_platform_symbols() {
    let op: CompareOp = serde_json::from_str("\"NOT IN\"").expect("NOT IN should parse");
    assert_eq!(op, CompareOp::NotIn);
    let op: CompareOp = serde_json::from_str("\"<=\"").expect("<= should parse");
    assert_eq!(op, CompareOp::Lte);
}

#[test]
fn between_renders_as_range() {
    let condition = Condition {
        column: ColumnRef::new("a", "b"),
        op: CompareOp::Between,
        value: Value::from(vec!["2024-01-01", "2024-12-31"]),
    };
    assert_eq!(
        condition.to_string(),
        "`a`.`b` BETWEEN '2024-01-01' AND '2024-12-31'"
    );
}

#[test]
fn duplicate_aliases_are_reported() {
    let clean = PlanBuilder::new(fragment("civicrm_contact", "a", &["id"])).build();
    assert_eq!(clean.duplicate_column_alias(), None);
    assert_eq!(clean.duplicate_table_alias(), None);

    // `a` + `custom_issue` and `a_custom` + `issue` share one alias.
    let group = JoinClause {
        join_type: JoinType::Left,
        table: TableRef::new("civicrm_value_issues", "a_custom"),
        left: ColumnRef::new("a", "id"),
        right: ColumnRef::new("a_custom", "entity_id"),
    };
    let mut contact = fragment("civicrm_contact", "a", &["custom_issue"]);
    contact.joins.push(group.clone());
    let issues = fragment("civicrm_value_issues", "a_custom", &["issue"]);
    let plan = PlanBuilder::new(contact).join(group, issues).build();

    assert_eq!(plan.duplicate_column_alias(), Some("a_custom_issue"));
    assert_eq!(plan.duplicate_table_alias(), Some("a_custom"));
}
