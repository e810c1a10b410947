use crate::{
    catalog::SharedCatalog,
    config::EngineConfig,
    error::{Error, ErrorClass, ErrorOrigin},
    filter::{FilterHandler, FixedFilter, SimpleFilter},
    join::{Join, SimpleJoin},
    output::{ConcatOutput, ContactLinkOutput, DateOutput, FieldOutputHandler, RawOutput},
    processor::{
        DataProcessor,
        definition::{DefinitionRepository, ProcessorDefinition},
    },
    source::{CustomGroupSource, EntitySource, RelationshipSource, Source},
};
use std::{collections::BTreeMap, fmt, sync::Arc};
use thiserror::Error as ThisError;
use tracing::{info, warn};

/// Join type used when a non-primary source names none.
pub const DEFAULT_JOIN_TYPE: &str = "simple_join";

///
/// Kind
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Kind {
    Source,
    Join,
    Filter,
    Output,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Source => "source",
            Self::Join => "join",
            Self::Filter => "filter",
            Self::Output => "output",
        };
        write!(f, "{label}")
    }
}

///
/// RegistryError
///

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("{kind} type '{name}' is not registered")]
    NotFound { kind: Kind, name: String },

    #[error("{kind} type '{name}' is already registered")]
    AlreadyRegistered { kind: Kind, name: String },
}

impl RegistryError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::Configuration,
            Self::AlreadyRegistered { .. } => ErrorClass::InvariantViolation,
        }
    }
}

///
/// Services
///
/// Collaborators handed to every constructor.
///

#[derive(Clone)]
pub struct Services {
    pub catalog: SharedCatalog,
    pub config: Arc<EngineConfig>,
}

type Constructor<T> = Arc<dyn Fn(&Services) -> Box<T> + Send + Sync>;

///
/// Registry
///
/// Type tag to constructor maps for every handler family. Populated at
/// startup and read-only afterwards; shareable across threads.
///

pub struct Registry {
    services: Services,
    sources: BTreeMap<String, Constructor<dyn Source>>,
    joins: BTreeMap<String, Constructor<dyn Join>>,
    filters: BTreeMap<String, Constructor<dyn FilterHandler>>,
    outputs: BTreeMap<String, Constructor<dyn FieldOutputHandler>>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new(catalog: SharedCatalog, config: Arc<EngineConfig>) -> Self {
        Self {
            services: Services { catalog, config },
            sources: BTreeMap::new(),
            joins: BTreeMap::new(),
            filters: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// A registry with every built-in type registered.
    pub fn with_defaults(catalog: SharedCatalog, config: Arc<EngineConfig>) -> Result<Self, Error> {
        let mut registry = Self::new(catalog, config);

        for (tag, entity) in [
            ("contact", "Contact"),
            ("activity", "Activity"),
            ("case", "Case"),
            ("group", "Group"),
        ] {
            registry.register_entity_source(tag, entity)?;
        }
        registry.register_source("relationship", |services| {
            Box::new(RelationshipSource::new(services.catalog.clone(), "relationship"))
        })?;
        registry.register_source("custom_group", |services| {
            Box::new(CustomGroupSource::new(services.catalog.clone()))
        })?;

        registry.register_join(DEFAULT_JOIN_TYPE, |_| Box::new(SimpleJoin::new()))?;

        registry.register_filter("simple_filter", |_| Box::new(SimpleFilter::new()))?;
        registry.register_filter("fixed_filter", |_| Box::new(FixedFilter::new()))?;

        registry.register_output("raw", |_| Box::new(RawOutput::new()))?;
        registry.register_output("contact_link", |services| {
            Box::new(ContactLinkOutput::new(services.config.clone()))
        })?;
        registry.register_output("date", |services| {
            Box::new(DateOutput::new(services.config.clone()))
        })?;
        registry.register_output("concat", |_| Box::new(ConcatOutput::new()))?;

        Ok(registry)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub fn register_source(
        &mut self,
        tag: &str,
        constructor: impl Fn(&Services) -> Box<dyn Source> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let constructor: Constructor<dyn Source> = Arc::new(constructor);
        insert(&mut self.sources, Kind::Source, tag, constructor)
    }

    /// Register `tag` as a catalog-backed source over `entity`.
    pub fn register_entity_source(&mut self, tag: &str, entity: &str) -> Result<(), Error> {
        let (tag_owned, entity) = (tag.to_string(), entity.to_string());
        self.register_source(tag, move |services| {
            Box::new(EntitySource::new(
                services.catalog.clone(),
                tag_owned.clone(),
                entity.clone(),
            ))
        })
    }

    pub fn register_join(
        &mut self,
        tag: &str,
        constructor: impl Fn(&Services) -> Box<dyn Join> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let constructor: Constructor<dyn Join> = Arc::new(constructor);
        insert(&mut self.joins, Kind::Join, tag, constructor)
    }

    pub fn register_filter(
        &mut self,
        tag: &str,
        constructor: impl Fn(&Services) -> Box<dyn FilterHandler> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let constructor: Constructor<dyn FilterHandler> = Arc::new(constructor);
        insert(&mut self.filters, Kind::Filter, tag, constructor)
    }

    pub fn register_output(
        &mut self,
        tag: &str,
        constructor: impl Fn(&Services) -> Box<dyn FieldOutputHandler> + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let constructor: Constructor<dyn FieldOutputHandler> = Arc::new(constructor);
        insert(&mut self.outputs, Kind::Output, tag, constructor)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Registered tags of one kind, sorted.
    #[must_use]
    pub fn registered(&self, kind: Kind) -> Vec<&str> {
        match kind {
            Kind::Source => self.sources.keys().map(String::as_str).collect(),
            Kind::Join => self.joins.keys().map(String::as_str).collect(),
            Kind::Filter => self.filters.keys().map(String::as_str).collect(),
            Kind::Output => self.outputs.keys().map(String::as_str).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, kind: Kind, tag: &str) -> bool {
        match kind {
            Kind::Source => self.sources.contains_key(tag),
            Kind::Join => self.joins.contains_key(tag),
            Kind::Filter => self.filters.contains_key(tag),
            Kind::Output => self.outputs.contains_key(tag),
        }
    }

    pub fn resolve_source(&self, tag: &str) -> Result<Box<dyn Source>, Error> {
        construct(&self.sources, Kind::Source, tag, &self.services)
    }

    pub fn resolve_join(&self, tag: &str) -> Result<Box<dyn Join>, Error> {
        construct(&self.joins, Kind::Join, tag, &self.services)
    }

    pub fn resolve_filter(&self, tag: &str) -> Result<Box<dyn FilterHandler>, Error> {
        construct(&self.filters, Kind::Filter, tag, &self.services)
    }

    pub fn resolve_output(&self, tag: &str) -> Result<Box<dyn FieldOutputHandler>, Error> {
        construct(&self.outputs, Kind::Output, tag, &self.services)
    }

    // ------------------------------------------------------------------
    // Assembly
    // ------------------------------------------------------------------

    /// Assemble a processor. Any failure aborts the whole assembly.
    pub fn build_processor(&self, definition: &ProcessorDefinition) -> Result<DataProcessor, Error> {
        let result = self.assemble(definition);
        if let Err(err) = &result {
            warn!(
                processor = %definition.effective_name(),
                error = %err.display_with_class(),
                "processor assembly failed"
            );
        }

        result
    }

    /// Load a stored definition and assemble it.
    pub fn build_processor_from(
        &self,
        repository: &dyn DefinitionRepository,
        id: i64,
    ) -> Result<DataProcessor, Error> {
        let definition = repository.load_processor_definition(id)?;

        self.build_processor(&definition)
    }

    fn assemble(&self, definition: &ProcessorDefinition) -> Result<DataProcessor, Error> {
        let name = definition.validate_name()?;
        if definition.sources.is_empty() {
            return Err(Error::configuration(
                ErrorOrigin::Processor,
                format!("processor '{name}' has no data sources"),
            ));
        }

        let mut processor =
            DataProcessor::new(name, &definition.title, &definition.processor_type)
                .with_id(definition.id)
                .with_default_limit(self.services.config.effective_default_limit());

        for (position, source_def) in definition.sources.iter().enumerate() {
            if source_def.name.trim().is_empty() {
                return Err(Error::configuration(
                    ErrorOrigin::Processor,
                    format!("data source #{} has no name", position + 1),
                ));
            }
            let mut source = self.resolve_source(&source_def.source_type)?;
            source.initialize(&source_def.configuration, &source_def.name)?;

            let join_type = match source_def.join_type.as_deref() {
                Some(tag) if !tag.trim().is_empty() => Some(tag),
                _ if position > 0 && !source_def.join_configuration.is_empty() => {
                    Some(DEFAULT_JOIN_TYPE)
                }
                _ => None,
            };
            let join = match join_type {
                Some(tag) => {
                    let mut join = self.resolve_join(tag)?;
                    join.initialize(&source_def.join_configuration, &source_def.name)?;
                    Some(join)
                }
                None => None,
            };

            processor.add_data_source(source, join)?;
        }

        for filter_def in &definition.filters {
            let filter = self.resolve_filter(&filter_def.filter_type)?;
            processor.add_filter_handler(
                filter,
                &filter_def.name,
                &filter_def.title,
                filter_def.is_required,
                &filter_def.configuration,
            )?;
        }

        for output_def in &definition.outputs {
            let output = self.resolve_output(&output_def.output_type)?;
            processor.add_output_handler(
                output,
                &output_def.alias,
                &output_def.title,
                &output_def.configuration,
            )?;
        }
        processor.check_aliases()?;

        info!(
            processor = %processor.name(),
            sources = definition.sources.len(),
            filters = definition.filters.len(),
            outputs = definition.outputs.len(),
            "assembled processor"
        );

        Ok(processor)
    }
}

fn insert<T: ?Sized>(
    map: &mut BTreeMap<String, Constructor<T>>,
    kind: Kind,
    tag: &str,
    constructor: Constructor<T>,
) -> Result<(), Error> {
    if map.contains_key(tag) {
        return Err(RegistryError::AlreadyRegistered {
            kind,
            name: tag.to_string(),
        }
        .into());
    }
    map.insert(tag.to_string(), constructor);

    Ok(())
}

fn construct<T: ?Sized>(
    map: &BTreeMap<String, Constructor<T>>,
    kind: Kind,
    tag: &str,
    services: &Services,
) -> Result<Box<T>, Error> {
    let constructor = map.get(tag).ok_or_else(|| RegistryError::NotFound {
        kind,
        name: tag.to_string(),
    })?;

    Ok((**constructor)(services))
}
