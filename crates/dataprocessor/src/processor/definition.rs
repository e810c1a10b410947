use crate::{
    configuration::Configuration,
    error::{Error, ErrorOrigin},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

/// Names the processor API dispatches on itself.
pub const RESERVED_NAMES: [&str; 5] = ["getactions", "getfields", "get", "create", "delete"];

/// Processor type used when a definition names none.
pub const DEFAULT_PROCESSOR_TYPE: &str = "default";

/// Machine name derived from a title: lowercased, with every run of
/// characters outside `[a-z0-9_]` collapsed to one `_`.
#[must_use]
pub fn build_name_from_title(title: &str) -> String {
    let mut name = String::with_capacity(title.len());
    let mut in_run = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            name.push(c);
            in_run = false;
        } else if !in_run {
            name.push('_');
            in_run = true;
        }
    }

    name
}

fn default_processor_type() -> String {
    DEFAULT_PROCESSOR_TYPE.to_string()
}

///
/// SourceDefinition
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SourceDefinition {
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
    #[serde(default)]
    pub configuration: Configuration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    #[serde(default)]
    pub join_configuration: Configuration,
}

///
/// FilterDefinition
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FilterDefinition {
    #[serde(rename = "type")]
    pub filter_type: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub configuration: Configuration,
}

///
/// OutputDefinition
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OutputDefinition {
    #[serde(rename = "type")]
    pub output_type: String,
    pub alias: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub configuration: Configuration,
}

///
/// ProcessorDefinition
///
/// Stored configuration document a processor is assembled from.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ProcessorDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default = "default_processor_type")]
    pub processor_type: String,
    #[serde(default)]
    pub sources: Vec<SourceDefinition>,
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
    #[serde(default)]
    pub outputs: Vec<OutputDefinition>,
}

impl Default for ProcessorDefinition {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            title: String::new(),
            processor_type: default_processor_type(),
            sources: Vec::new(),
            filters: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl ProcessorDefinition {
    pub fn from_json(input: &str) -> Result<Self, Error> {
        serde_json::from_str(input).map_err(|err| {
            Error::configuration(
                ErrorOrigin::Processor,
                format!("invalid processor definition: {err}"),
            )
        })
    }

    /// Configured name, or one built from the title.
    #[must_use]
    pub fn effective_name(&self) -> String {
        if self.name.trim().is_empty() {
            build_name_from_title(&self.title)
        } else {
            self.name.clone()
        }
    }

    /// Reject empty and reserved names.
    pub fn validate_name(&self) -> Result<String, Error> {
        let name = self.effective_name();
        if name.is_empty() {
            return Err(Error::configuration(
                ErrorOrigin::Processor,
                "processor definition needs a name or a title",
            ));
        }
        if RESERVED_NAMES.contains(&name.to_lowercase().as_str()) {
            return Err(Error::configuration(
                ErrorOrigin::Processor,
                format!("'{name}' is a reserved processor name"),
            ));
        }

        Ok(name)
    }
}

///
/// DefinitionRepository
///

pub trait DefinitionRepository {
    fn load_processor_definition(&self, id: i64) -> Result<ProcessorDefinition, Error>;
}

///
/// InMemoryDefinitions
///
/// Repository backed by a map. Names are unique across stored definitions.
///

#[derive(Debug, Default)]
pub struct InMemoryDefinitions {
    definitions: RwLock<BTreeMap<i64, ProcessorDefinition>>,
}

impl InMemoryDefinitions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition and return its id. A definition without an id is
    /// given the next free one.
    pub fn insert(&self, mut definition: ProcessorDefinition) -> Result<i64, Error> {
        let name = definition.validate_name()?;
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let id = match definition.id {
            Some(id) => id,
            None => match definitions.keys().next_back() {
                None => 1,
                Some(last) => last.checked_add(1).ok_or_else(|| {
                    Error::invariant(
                        ErrorOrigin::Processor,
                        "no processor id left after the largest stored id",
                    )
                })?,
            },
        };
        let clash = definitions
            .iter()
            .any(|(other_id, other)| *other_id != id && other.effective_name() == name);
        if clash {
            return Err(Error::configuration(
                ErrorOrigin::Processor,
                format!("a processor named '{name}' already exists"),
            ));
        }

        definition.id = Some(id);
        definition.name = name;
        definitions.insert(id, definition);

        Ok(id)
    }
}

impl DefinitionRepository for InMemoryDefinitions {
    fn load_processor_definition(&self, id: i64) -> Result<ProcessorDefinition, Error> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| {
                Error::not_found(
                    ErrorOrigin::Processor,
                    format!("processor definition {id} not found"),
                )
            })
    }
}
