use crate::{
    configuration::{Configuration, optional_str, required_str},
    error::{Error, ErrorOrigin},
    join::Join,
    plan::{JoinClause, JoinType},
    source::{Source, SourceSet},
};
use tracing::debug;

///
/// SimpleJoin
///
/// Field-equality join: `left_source.left_field = owner.right_field`.
///

#[derive(Debug, Default)]
pub struct SimpleJoin {
    owner: String,
    join_type: JoinType,
    left_source: String,
    left_field: String,
    right_field: String,
    clause: Option<JoinClause>,
}

impl SimpleJoin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn kind(&self) -> JoinType {
        self.join_type
    }

    fn owner_label(&self) -> String {
        format!("join of source '{}'", self.owner)
    }

    fn unresolvable(&self, detail: String) -> Error {
        Error::configuration(ErrorOrigin::Join, format!("{}: {detail}", self.owner_label()))
    }
}

impl Join for SimpleJoin {
    fn join_type(&self) -> &str {
        "simple_join"
    }

    fn initialize(&mut self, configuration: &Configuration, owner_id: &str) -> Result<(), Error> {
        self.owner = owner_id.to_string();
        self.clause = None;
        let owner = self.owner_label();

        self.join_type = match optional_str(configuration, "type", &owner, ErrorOrigin::Join)? {
            None => JoinType::Inner,
            Some(tag) => JoinType::parse(tag).ok_or_else(|| {
                Error::configuration(
                    ErrorOrigin::Join,
                    format!("{owner}: unknown join type '{tag}'"),
                )
            })?,
        };
        self.left_source =
            required_str(configuration, "left_source", &owner, ErrorOrigin::Join)?.to_string();
        self.left_field =
            required_str(configuration, "left_field", &owner, ErrorOrigin::Join)?.to_string();
        self.right_field =
            required_str(configuration, "right_field", &owner, ErrorOrigin::Join)?.to_string();

        Ok(())
    }

    fn resolve(&mut self, right: &mut dyn Source, earlier: &mut SourceSet) -> Result<(), Error> {
        if !earlier.contains(&self.left_source) {
            return Err(self.unresolvable(format!(
                "left source '{}' is not attached before this source",
                self.left_source
            )));
        }
        let left_spec = earlier
            .field(&self.left_source, &self.left_field)
            .map_err(|err| self.unresolvable(err.message))?;
        let right_spec = right
            .available_fields()?
            .field_specification_by_name(&self.right_field)
            .cloned()
            .map_err(|_| {
                self.unresolvable(format!(
                    "field '{}' does not exist in source '{}'",
                    self.right_field,
                    right.source_name()
                ))
            })?;

        let left = earlier
            .get_mut(&self.left_source)?
            .reference_field(&left_spec)?;
        let right_column = right.reference_field(&right_spec)?;
        let table = right.core().table()?.clone();

        debug!(
            source = %self.owner,
            left = %left,
            right = %right_column,
            "resolved join"
        );

        self.clause = Some(JoinClause {
            join_type: self.join_type,
            table,
            left,
            right: right_column,
        });

        Ok(())
    }

    fn clause(&self) -> Result<JoinClause, Error> {
        self.clause.clone().ok_or_else(|| {
            Error::invariant(
                ErrorOrigin::Join,
                format!("{}: clause requested before resolve", self.owner_label()),
            )
        })
    }
}
