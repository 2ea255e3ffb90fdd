//! This module defines [Schema] and [Attribute].

use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{datavalues::Domain, error::Error};

/// Conventional name of the condition-list attribute
pub const CONDITION_ATTRIBUTE: &str = "condition";

/// Named and typed column of a relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Name of the attribute
    pub name: String,
    /// Domain of the values stored under this attribute
    pub domain: Domain,
}

impl Attribute {
    /// Create a new [Attribute].
    pub fn new<S: Into<String>>(name: S, domain: Domain) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }

    /// Create the conventional condition-list attribute.
    pub fn condition() -> Self {
        Self::new(CONDITION_ATTRIBUTE, Domain::ConditionList)
    }
}

impl Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.domain)
    }
}

/// Ordered list of attributes of a relation
///
/// Attribute names are unique and at most one attribute
/// has the domain [Domain::ConditionList].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Attribute>", into = "Vec<Attribute>")]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    /// Create a new [Schema], validating its invariants.
    pub fn new(attributes: Vec<Attribute>) -> Result<Self, Error> {
        let mut condition: Option<&str> = None;

        for (index, attribute) in attributes.iter().enumerate() {
            if attributes[..index]
                .iter()
                .any(|other| other.name == attribute.name)
            {
                return Err(Error::DuplicateColumn(attribute.name.clone()));
            }

            if attribute.domain == Domain::ConditionList {
                if let Some(first) = condition {
                    return Err(Error::MultipleConditionColumns {
                        first: first.to_string(),
                        second: attribute.name.clone(),
                    });
                }
                condition = Some(&attribute.name);
            }
        }

        Ok(Self { attributes })
    }

    /// Return the attributes in order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Return an iterator over the attribute names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes.iter().map(|attribute| attribute.name.as_str())
    }

    /// Return the number of attributes.
    pub fn arity(&self) -> usize {
        self.attributes.len()
    }

    /// Return the position of the attribute with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attribute| attribute.name == name)
    }

    /// Return the attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
    }

    /// Returns `true` if an attribute with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Return the position of the condition-list attribute, if there is one.
    pub fn condition_position(&self) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attribute| attribute.domain == Domain::ConditionList)
    }

    /// Return a new schema without the given attributes.
    /// Names that are not part of this schema are ignored.
    pub fn without(&self, names: &[String]) -> Self {
        Self {
            attributes: self
                .attributes
                .iter()
                .filter(|attribute| !names.contains(&attribute.name))
                .cloned()
                .collect(),
        }
    }
}

impl TryFrom<Vec<Attribute>> for Schema {
    type Error = Error;

    fn try_from(value: Vec<Attribute>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Schema> for Vec<Attribute> {
    fn from(value: Schema) -> Self {
        value.attributes
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.attributes.iter().join(", "))
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use crate::{datavalues::Domain, error::Error};

    use super::{Attribute, Schema};

    fn policy() -> Schema {
        Schema::new(vec![
            Attribute::new("dest", Domain::String),
            Attribute::new("path", Domain::String),
            Attribute::new("min_len", Domain::Int),
            Attribute::condition(),
        ])
        .expect("valid schema")
    }

    #[test]
    fn lookup() {
        let schema = policy();
        assert_eq!(schema.arity(), 4);
        assert_eq!(schema.position("min_len"), Some(2));
        assert_eq!(schema.condition_position(), Some(3));
        assert!(!schema.contains("len_path"));
        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec!["dest", "path", "min_len", "condition"]
        );
    }

    #[test]
    fn without() {
        let schema = policy().without(&["path".to_string(), "unknown".to_string()]);
        assert_eq!(
            schema.names().collect::<Vec<_>>(),
            vec!["dest", "min_len", "condition"]
        );
    }

    #[test]
    fn invariants() {
        assert_eq!(
            Schema::new(vec![
                Attribute::new("a", Domain::Int),
                Attribute::new("a", Domain::String)
            ]),
            Err(Error::DuplicateColumn("a".to_string()))
        );

        assert!(matches!(
            Schema::new(vec![
                Attribute::condition(),
                Attribute::new("other", Domain::ConditionList)
            ]),
            Err(Error::MultipleConditionColumns { .. })
        ));
    }
}
