//! Loading relations from and writing results to JSON.

use std::{fs::read_to_string, path::Path};

use sarasate::{
    datavalues::Value,
    management::database::{DatabaseInstance, Relation},
    sarasate_physical::schema::Schema,
};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Contents of a data file
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct DataFile {
    /// The relations, created in the given order
    pub(crate) relations: Vec<RelationData>,
}

/// A relation in serialized form
///
/// Condition lists are arrays of clause strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RelationData {
    pub(crate) name: String,
    pub(crate) schema: Schema,
    #[serde(default)]
    pub(crate) rows: Vec<Vec<Value>>,
}

impl From<&Relation> for RelationData {
    fn from(relation: &Relation) -> Self {
        Self {
            name: relation.name().to_string(),
            schema: relation.schema().clone(),
            rows: relation.rows().map(|(_, values)| values.to_vec()).collect(),
        }
    }
}

impl DataFile {
    /// Read a data file.
    pub(crate) fn load(path: &Path) -> Result<Self, CliError> {
        let content = read_to_string(path).map_err(|source| CliError::Reading {
            filename: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| CliError::Parsing {
            filename: path.to_path_buf(),
            source,
        })
    }

    /// Create a store holding all relations of this file.
    pub(crate) fn into_database(self) -> Result<DatabaseInstance, CliError> {
        let mut database = DatabaseInstance::new();

        for relation in self.relations {
            log::debug!("loading {} with {} rows", relation.name, relation.rows.len());
            database.create_relation(&relation.name, relation.schema);

            for row in relation.rows {
                database
                    .insert(&relation.name, row)
                    .map_err(|source| CliError::InvalidRelation {
                        relation: relation.name.clone(),
                        source,
                    })?;
            }
        }

        Ok(database)
    }
}
