use crate::{
    configuration::{Configuration, optional_op, optional_value},
    error::{Error, ErrorOrigin},
    filter::{FilterHandler, FilterTarget, SubmittedFilterValues},
    plan::CompareOp,
    source::SourceSet,
    spec::FieldSpecification,
    value::Value,
};

///
/// FixedFilter
///
/// Structural filter with no form input: always applies the configured
/// `op` and `value` to `datasource`/`field`.
///

#[derive(Debug, Default)]
pub struct FixedFilter {
    name: String,
    title: String,
    op: Option<CompareOp>,
    value: Value,
    target: Option<FilterTarget>,
}

impl FixedFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FilterHandler for FixedFilter {
    fn filter_type(&self) -> &str {
        "fixed_filter"
    }

    fn initialize(
        &mut self,
        name: &str,
        title: &str,
        _is_required: bool,
        configuration: &Configuration,
        sources: &mut SourceSet,
    ) -> Result<(), Error> {
        let owner = format!("filter '{name}'");
        let op = optional_op(configuration, "op", &owner, ErrorOrigin::Filter)?
            .unwrap_or(CompareOp::Eq);
        let value = optional_value(configuration, "value", &owner, ErrorOrigin::Filter)?;
        if !op.accepts(&value) {
            return Err(Error::configuration(
                ErrorOrigin::Filter,
                format!(
                    "{owner}: configured value does not fit operator {}",
                    op.as_sql()
                ),
            ));
        }

        self.target = Some(FilterTarget::resolve(configuration, &owner, sources)?);
        self.name = name.to_string();
        self.title = title.to_string();
        self.op = Some(op);
        self.value = value;

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn field_specification(&self) -> Option<&FieldSpecification> {
        None
    }

    fn is_required(&self) -> bool {
        false
    }

    fn validate_submitted_filter_params(&self, _submitted: &SubmittedFilterValues) -> Vec<String> {
        Vec::new()
    }

    fn apply_filter_from_submitted_filter_params(
        &self,
        _submitted: &SubmittedFilterValues,
        sources: &mut SourceSet,
    ) -> Result<(), Error> {
        let (Some(target), Some(op)) = (&self.target, self.op) else {
            return Err(Error::invariant(
                ErrorOrigin::Filter,
                format!("filter '{}' used before initialize", self.name),
            ));
        };

        target.apply(op, self.value.clone(), sources)
    }
}
