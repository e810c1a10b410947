//! Processor assembly, planning, execution and formatting.
//!
//! A [`DataProcessor`] serves exactly one request: it is assembled from a
//! definition, planned once, executed once against the entity store, and
//! then only its fetched rows may be re-formatted.

mod definition;
mod registry;

#[cfg(test)]
mod tests;

use crate::{
    configuration::Configuration,
    error::{Error, ErrorOrigin},
    filter::{FilterHandler, SubmittedFilter, SubmittedFilterValues},
    join::Join,
    output::{FieldOutputHandler, FormattedRow, OutputContext},
    plan::{PlanBuilder, RetrievalPlan},
    source::{Source, SourceSet},
    spec::{DataSpecification, FieldSpecification},
    store::{EntityStore, RawRow},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use definition::{
    DEFAULT_PROCESSOR_TYPE, DefinitionRepository, FilterDefinition, InMemoryDefinitions,
    OutputDefinition, ProcessorDefinition, RESERVED_NAMES, SourceDefinition,
    build_name_from_title,
};
pub use registry::{DEFAULT_JOIN_TYPE, Kind, Registry, RegistryError, Services};

/// Prefix separating source name and field name in merged field lists.
pub const SOURCE_FIELD_SEPARATOR: &str = "::";

///
/// Stage
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Assembled,
    Planned,
    Done,
    /// A reconfiguration or planning step failed; the processor must be rebuilt.
    Failed,
}

///
/// ProcessorRequest
///
/// Submitted filter values and paging for one execution.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ProcessorRequest {
    pub filters: SubmittedFilterValues,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ProcessorRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(mut self, name: impl Into<String>, filter: SubmittedFilter) -> Self {
        self.filters.insert(name.into(), filter);
        self
    }

    #[must_use]
    pub const fn with_page(mut self, limit: Option<usize>, offset: usize) -> Self {
        self.limit = limit;
        self.offset = Some(offset);
        self
    }
}

///
/// Execution
///
/// Either formatted rows, or the validation messages that stopped the
/// request before the store was called.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Execution {
    Rows(Vec<FormattedRow>),
    Rejected(Vec<String>),
}

impl Execution {
    #[must_use]
    pub fn rows(&self) -> Option<&[FormattedRow]> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Rows(_) => &[],
            Self::Rejected(messages) => messages,
        }
    }

    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

///
/// OutputSlot
///

struct OutputSlot {
    alias: String,
    title: String,
    configuration: Configuration,
    handler: Box<dyn FieldOutputHandler>,
}

///
/// DataProcessor
///

pub struct DataProcessor {
    id: Option<i64>,
    name: String,
    title: String,
    processor_type: String,
    default_limit: Option<usize>,
    sources: SourceSet,
    filters: Vec<Box<dyn FilterHandler>>,
    outputs: Vec<OutputSlot>,
    output_fields: DataSpecification,
    plan: Option<RetrievalPlan>,
    stage: Stage,
}

impl DataProcessor {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        processor_type: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            title: title.into(),
            processor_type: processor_type.into(),
            default_limit: None,
            sources: SourceSet::new(),
            filters: Vec::new(),
            outputs: Vec::new(),
            output_fields: DataSpecification::new(),
            plan: None,
            stage: Stage::Assembled,
        }
    }

    #[must_use]
    pub const fn with_id(mut self, id: Option<i64>) -> Self {
        self.id = id;
        self
    }

    /// Limit applied when a request carries none.
    #[must_use]
    pub const fn with_default_limit(mut self, limit: Option<usize>) -> Self {
        self.default_limit = limit;
        self
    }

    #[must_use]
    pub const fn id(&self) -> Option<i64> {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn processor_type(&self) -> &str {
        &self.processor_type
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// The finalized plan, once planned.
    #[must_use]
    pub const fn plan(&self) -> Option<&RetrievalPlan> {
        self.plan.as_ref()
    }

    // ------------------------------------------------------------------
    // Assembly
    // ------------------------------------------------------------------

    /// Attach an initialized source. Every source after the first needs a
    /// join onto a source attached before it.
    pub fn add_data_source(
        &mut self,
        mut source: Box<dyn Source>,
        join: Option<Box<dyn Join>>,
    ) -> Result<(), Error> {
        self.check_assembling("add a data source")?;
        let name = source.source_name().to_string();

        if self.sources.contains(&name) {
            return Err(Error::configuration(
                ErrorOrigin::Processor,
                format!("processor '{}': data source '{name}' already exists", self.name),
            ));
        }

        match join {
            Some(_) if self.sources.is_empty() => {
                return Err(Error::configuration(
                    ErrorOrigin::Processor,
                    format!(
                        "processor '{}': primary source '{name}' cannot be joined",
                        self.name
                    ),
                ));
            }
            None if !self.sources.is_empty() => {
                return Err(Error::configuration(
                    ErrorOrigin::Processor,
                    format!(
                        "processor '{}': data source '{name}' needs a join onto an earlier source",
                        self.name
                    ),
                ));
            }
            Some(mut join) => {
                join.resolve(&mut *source, &mut self.sources)?;
                source.set_join(join);
            }
            None => {}
        }

        debug!(
            processor = %self.name,
            source = %name,
            source_type = source.source_type(),
            "attached data source"
        );
        self.sources.push(source);

        Ok(())
    }

    /// Initialize and attach a filter. Filters apply in attachment order.
    pub fn add_filter_handler(
        &mut self,
        mut filter: Box<dyn FilterHandler>,
        name: &str,
        title: &str,
        is_required: bool,
        configuration: &Configuration,
    ) -> Result<(), Error> {
        self.check_assembling("add a filter")?;
        if self.filters.iter().any(|f| f.name() == name) {
            return Err(Error::configuration(
                ErrorOrigin::Processor,
                format!("processor '{}': filter '{name}' already exists", self.name),
            ));
        }

        filter.initialize(name, title, is_required, configuration, &mut self.sources)?;
        debug!(processor = %self.name, filter = name, required = is_required, "attached filter");
        self.filters.push(filter);

        Ok(())
    }

    /// Initialize and attach an output. Outputs format in attachment order.
    pub fn add_output_handler(
        &mut self,
        mut handler: Box<dyn FieldOutputHandler>,
        alias: &str,
        title: &str,
        configuration: &Configuration,
    ) -> Result<(), Error> {
        self.check_assembling("add an output")?;
        if self.output_fields.does_field_exist(alias) {
            return Err(Error::configuration(
                ErrorOrigin::Processor,
                format!("processor '{}': output '{alias}' already exists", self.name),
            ));
        }

        let mut context = OutputContext {
            sources: &mut self.sources,
            earlier: &self.output_fields,
        };
        handler.initialize(alias, title, configuration, &mut context)?;

        let spec = output_spec_of(alias, handler.as_ref())?;
        self.output_fields.add_field_specification(alias, spec)?;
        debug!(
            processor = %self.name,
            output = alias,
            output_type = handler.output_type(),
            "attached output"
        );
        self.outputs.push(OutputSlot {
            alias: alias.to_string(),
            title: title.to_string(),
            configuration: configuration.clone(),
            handler,
        });

        Ok(())
    }

    /// Re-initialize an attached output with new configuration.
    ///
    /// Every source projection is rebuilt from the current outputs, so fields
    /// only the old configuration read are no longer fetched. On failure the
    /// processor moves to [`Stage::Failed`] and refuses to plan or execute.
    pub fn reconfigure_output(
        &mut self,
        alias: &str,
        configuration: &Configuration,
    ) -> Result<(), Error> {
        self.check_assembling("reconfigure an output")?;
        let slot = self
            .outputs
            .iter_mut()
            .find(|slot| slot.alias == alias)
            .ok_or_else(|| {
                Error::not_found(
                    ErrorOrigin::Processor,
                    format!("processor '{}': output '{alias}' does not exist", self.name),
                )
            })?;
        slot.configuration = configuration.clone();

        if let Err(err) = self.reinitialize_outputs() {
            warn!(
                processor = %self.name,
                output = alias,
                error = %err.display_with_class(),
                "output reconfiguration failed"
            );
            self.stage = Stage::Failed;
            return Err(err);
        }
        debug!(processor = %self.name, output = alias, "reconfigured output");

        Ok(())
    }

    /// Drop every projection and initialize all outputs again in
    /// declaration order.
    fn reinitialize_outputs(&mut self) -> Result<(), Error> {
        for source in self.sources.iter_mut() {
            source.clear_projection();
        }

        let mut fields = DataSpecification::new();
        for slot in &mut self.outputs {
            let mut context = OutputContext {
                sources: &mut self.sources,
                earlier: &fields,
            };
            slot.handler
                .initialize(&slot.alias, &slot.title, &slot.configuration, &mut context)?;

            let spec = output_spec_of(&slot.alias, slot.handler.as_ref())?;
            fields.add_field_specification(slot.alias.clone(), spec)?;
        }
        self.output_fields = fields;

        Ok(())
    }

    fn check_assembling(&self, action: &str) -> Result<(), Error> {
        match self.stage {
            Stage::Assembled => Ok(()),
            Stage::Failed => Err(self.failed(action)),
            Stage::Planned | Stage::Done => Err(Error::invariant(
                ErrorOrigin::Processor,
                format!(
                    "processor '{}': cannot {action} once planning has started",
                    self.name
                ),
            )),
        }
    }

    fn failed(&self, action: &str) -> Error {
        Error::invariant(
            ErrorOrigin::Processor,
            format!(
                "processor '{}': cannot {action} after a failed step; build a fresh processor",
                self.name
            ),
        )
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Every source's available fields, named `{source}::{field}`.
    pub fn available_fields(&self) -> Result<DataSpecification, Error> {
        let mut merged = DataSpecification::new();
        for source in self.sources.iter() {
            let prefix = format!("{}{SOURCE_FIELD_SEPARATOR}", source.source_name());
            merged.merge(source.available_fields()?, &prefix)?;
        }

        Ok(merged)
    }

    /// Every source's filter fields, named `{source}::{field}`.
    pub fn available_filter_fields(&self) -> Result<DataSpecification, Error> {
        let mut merged = DataSpecification::new();
        for source in self.sources.iter() {
            let prefix = format!("{}{SOURCE_FIELD_SEPARATOR}", source.source_name());
            merged.merge(source.available_filter_fields()?, &prefix)?;
        }

        Ok(merged)
    }

    pub fn data_sources(&self) -> impl Iterator<Item = &dyn Source> {
        self.sources.iter()
    }

    pub fn data_source_by_name(&self, name: &str) -> Result<&dyn Source, Error> {
        self.sources.get(name)
    }

    pub fn filter_handlers(&self) -> impl Iterator<Item = &dyn FilterHandler> {
        self.filters
            .iter()
            .map(|filter| filter.as_ref() as &dyn FilterHandler)
    }

    pub fn output_handlers(&self) -> impl Iterator<Item = (&str, &dyn FieldOutputHandler)> {
        self.outputs
            .iter()
            .map(|slot| (slot.alias.as_str(), slot.handler.as_ref() as &dyn FieldOutputHandler))
    }

    /// Output descriptors keyed by output alias.
    #[must_use]
    pub const fn output_fields(&self) -> &DataSpecification {
        &self.output_fields
    }

    #[must_use]
    pub fn has_required_filters(&self) -> bool {
        self.filters.iter().any(|filter| filter.is_required())
    }

    // ------------------------------------------------------------------
    // Planning and execution
    // ------------------------------------------------------------------

    /// Validation messages of every filter, in attachment order.
    #[must_use]
    pub fn validate_filters(&self, submitted: &SubmittedFilterValues) -> Vec<String> {
        self.filters
            .iter()
            .flat_map(|filter| filter.validate_submitted_filter_params(submitted))
            .collect()
    }

    /// Fail when two projected columns or two tables would share an alias,
    /// since fetched rows are keyed by alias.
    pub fn check_aliases(&self) -> Result<(), Error> {
        let plan = self.build_plan(None, 0)?;

        self.check_plan_aliases(&plan)
    }

    /// Apply filters, freeze the sources and finalize the plan. Expects
    /// filter values that already passed [`Self::validate_filters`].
    pub fn prepare(&mut self, request: &ProcessorRequest) -> Result<&RetrievalPlan, Error> {
        self.check_fresh("prepare")?;

        match self.finalize_plan(request) {
            Ok(plan) => {
                info!(processor = %self.name, plan = %plan, "finalized retrieval plan");
                self.stage = Stage::Planned;

                Ok(self.plan.insert(plan))
            }
            Err(err) => {
                self.stage = Stage::Failed;
                Err(err)
            }
        }
    }

    fn finalize_plan(&mut self, request: &ProcessorRequest) -> Result<RetrievalPlan, Error> {
        for filter in &self.filters {
            filter.apply_filter_from_submitted_filter_params(&request.filters, &mut self.sources)?;
        }
        for source in self.sources.iter_mut() {
            source.freeze();
        }

        let limit = request.limit.or(self.default_limit);
        let plan = self.build_plan(limit, request.offset.unwrap_or_default())?;
        self.check_plan_aliases(&plan)?;

        Ok(plan)
    }

    fn build_plan(&self, limit: Option<usize>, offset: usize) -> Result<RetrievalPlan, Error> {
        let mut sources = self.sources.iter();
        let primary = sources.next().ok_or_else(|| {
            Error::configuration(
                ErrorOrigin::Processor,
                format!("processor '{}' has no data sources", self.name),
            )
        })?;
        let mut builder = PlanBuilder::new(primary.plan_fragment()?);
        for source in sources {
            let join = source.join().ok_or_else(|| {
                Error::invariant(
                    ErrorOrigin::Processor,
                    format!("data source '{}' was attached without a join", source.source_name()),
                )
            })?;
            builder = builder.join(join.clause()?, source.plan_fragment()?);
        }

        Ok(builder.page(limit, offset).build())
    }

    fn check_plan_aliases(&self, plan: &RetrievalPlan) -> Result<(), Error> {
        if let Some(alias) = plan.duplicate_column_alias() {
            return Err(Error::configuration(
                ErrorOrigin::Processor,
                format!(
                    "processor '{}': more than one field is fetched as '{alias}'; rename a data source",
                    self.name
                ),
            ));
        }
        if let Some(alias) = plan.duplicate_table_alias() {
            return Err(Error::configuration(
                ErrorOrigin::Processor,
                format!(
                    "processor '{}': table alias '{alias}' is bound more than once; rename a data source",
                    self.name
                ),
            ));
        }

        Ok(())
    }

    /// Validate, plan, fetch once and format.
    pub fn execute(
        &mut self,
        request: &ProcessorRequest,
        store: &dyn EntityStore,
    ) -> Result<Execution, Error> {
        self.check_fresh("execute")?;

        let messages = self.validate_filters(&request.filters);
        if !messages.is_empty() {
            warn!(processor = %self.name, count = messages.len(), "rejected filter values");
            self.stage = Stage::Done;
            return Ok(Execution::Rejected(messages));
        }

        self.prepare(request)?;
        let plan = self.plan.as_ref().ok_or_else(|| {
            Error::invariant(ErrorOrigin::Processor, "plan missing after prepare")
        })?;
        let fetched = store.execute(plan);
        self.stage = Stage::Done;
        let rows = fetched?;

        info!(processor = %self.name, rows = rows.len(), "fetched rows");

        Ok(Execution::Rows(self.format_rows(&rows)))
    }

    /// Format fetched rows. Pure; safe to re-run over the same rows.
    #[must_use]
    pub fn format_rows(&self, rows: &[RawRow]) -> Vec<FormattedRow> {
        let formatted: Vec<FormattedRow> = rows
            .iter()
            .map(|raw| {
                let mut row = FormattedRow::new();
                for slot in &self.outputs {
                    let output = slot.handler.format_field(raw, &row);
                    row.insert(slot.alias.clone(), output);
                }
                row
            })
            .collect();
        debug!(processor = %self.name, rows = formatted.len(), "formatted rows");

        formatted
    }

    fn check_fresh(&self, action: &str) -> Result<(), Error> {
        match self.stage {
            Stage::Assembled => Ok(()),
            Stage::Failed => Err(self.failed(action)),
            Stage::Planned | Stage::Done => Err(Error::invariant(
                ErrorOrigin::Processor,
                format!(
                    "processor '{}': cannot {action} twice; build a fresh processor per request",
                    self.name
                ),
            )),
        }
    }
}

fn output_spec_of(
    alias: &str,
    handler: &dyn FieldOutputHandler,
) -> Result<FieldSpecification, Error> {
    handler.output_field_specification().cloned().ok_or_else(|| {
        Error::invariant(
            ErrorOrigin::Output,
            format!("output '{alias}' produced no field specification"),
        )
    })
}
