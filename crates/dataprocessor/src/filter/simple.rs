use crate::{
    configuration::{Configuration, optional_op},
    error::{Error, ErrorOrigin},
    filter::{FilterHandler, FilterTarget, SubmittedFilter, SubmittedFilterValues},
    plan::{CompareOp, OperandShape},
    source::SourceSet,
    spec::{FieldSpecification, FieldType},
    value::Value,
};

///
/// SimpleFilter
///
/// User-facing filter on one source field. Configuration: `datasource`,
/// `field`, and an optional default `op`.
///

#[derive(Debug, Default)]
pub struct SimpleFilter {
    name: String,
    title: String,
    is_required: bool,
    default_op: Option<CompareOp>,
    target: Option<FilterTarget>,
    field: Option<FieldSpecification>,
}

impl SimpleFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn op_for(&self, submitted: &SubmittedFilter) -> CompareOp {
        submitted
            .op
            .or(self.default_op)
            .unwrap_or(CompareOp::Eq)
    }

    // Submitted and carrying something to filter on.
    fn submission<'a>(&self, submitted: &'a SubmittedFilterValues) -> Option<&'a SubmittedFilter> {
        submitted.get(&self.name).filter(|entry| {
            self.op_for(entry).operand_shape() == OperandShape::None || !entry.value.is_empty()
        })
    }

    fn check_shape(&self, op: CompareOp, value: &Value) -> Option<String> {
        if op.accepts(value) {
            return None;
        }
        let expected = match op.operand_shape() {
            OperandShape::None => return None,
            OperandShape::Single => "a single value",
            OperandShape::List => "a list of values",
            OperandShape::Pair => "exactly two values",
        };

        Some(format!(
            "{}: operator {} requires {expected}",
            self.title,
            op.as_sql()
        ))
    }

    fn check_value(&self, field: &FieldSpecification, value: &Value) -> Option<String> {
        let valid = match field.field_type() {
            FieldType::Integer => value.as_int().is_some(),
            FieldType::Float | FieldType::Money => value.as_f64().is_some(),
            FieldType::Boolean => value.as_bool().is_some(),
            _ => true,
        };
        if !valid {
            return Some(format!(
                "{}: '{value}' is not a valid {}",
                self.title,
                field.field_type().as_str().to_lowercase()
            ));
        }

        if let Some(options) = field.options()
            && !options.contains_key(&value.option_key())
        {
            return Some(format!("{}: '{value}' is not a valid option", self.title));
        }

        None
    }

    fn target(&self) -> Result<&FilterTarget, Error> {
        self.target.as_ref().ok_or_else(|| {
            Error::invariant(
                ErrorOrigin::Filter,
                format!("filter '{}' used before initialize", self.name),
            )
        })
    }
}

impl FilterHandler for SimpleFilter {
    fn filter_type(&self) -> &str {
        "simple_filter"
    }

    fn initialize(
        &mut self,
        name: &str,
        title: &str,
        is_required: bool,
        configuration: &Configuration,
        sources: &mut SourceSet,
    ) -> Result<(), Error> {
        let owner = format!("filter '{name}'");
        let target = FilterTarget::resolve(configuration, &owner, sources)?;

        self.default_op = optional_op(configuration, "op", &owner, ErrorOrigin::Filter)?;
        self.name = name.to_string();
        self.title = if title.trim().is_empty() {
            target.field.title().to_string()
        } else {
            title.to_string()
        };
        self.is_required = is_required;
        self.field = Some(target.field.with_alias(name));
        self.target = Some(target);

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn field_specification(&self) -> Option<&FieldSpecification> {
        self.field.as_ref()
    }

    fn is_required(&self) -> bool {
        self.is_required
    }

    fn validate_submitted_filter_params(&self, submitted: &SubmittedFilterValues) -> Vec<String> {
        let Some(entry) = self.submission(submitted) else {
            return if self.is_required {
                vec![format!("{} is required", self.title)]
            } else {
                Vec::new()
            };
        };
        let Some(field) = &self.field else {
            return Vec::new();
        };

        let op = self.op_for(entry);
        if let Some(message) = self.check_shape(op, &entry.value) {
            return vec![message];
        }
        if op.operand_shape() == OperandShape::None {
            return Vec::new();
        }

        let values = match &entry.value {
            Value::List(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        values
            .iter()
            .filter_map(|value| self.check_value(field, value))
            .collect()
    }

    fn apply_filter_from_submitted_filter_params(
        &self,
        submitted: &SubmittedFilterValues,
        sources: &mut SourceSet,
    ) -> Result<(), Error> {
        let Some(entry) = self.submission(submitted) else {
            return Ok(());
        };

        self.target()?
            .apply(self.op_for(entry), entry.value.clone(), sources)
    }
}
