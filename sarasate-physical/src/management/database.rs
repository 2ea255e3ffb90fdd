//! This module defines [DatabaseInstance],
//! which is used to manage a collection of relations in memory.

use std::collections::HashMap;

use crate::{
    datavalues::Value,
    error::Error,
    expression::{
        check_references, ClauseTemplate, OutputColumn, RowContext, Source, StorePredicate,
        ValueExpr,
    },
    schema::{Attribute, Schema},
};

use super::{id::RowId, RelationRef, SchemaProvider, Store};

/// A row together with its identifier
#[derive(Debug, Clone)]
struct Row {
    id: RowId,
    values: Vec<Value>,
}

/// A named relation with its rows
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    schema: Schema,
    rows: Vec<Row>,
}

impl Relation {
    /// Return the name of this relation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the schema of this relation.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Return the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the relation has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = (RowId, &[Value])> + '_ {
        self.rows.iter().map(|row| (row.id, row.values.as_slice()))
    }

    /// Iterate over the values of one column.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Value> + '_, Error> {
        let position = self.position(name)?;
        Ok(self.rows.iter().map(move |row| &row.values[position]))
    }

    fn position(&self, column: &str) -> Result<usize, Error> {
        self.schema
            .position(column)
            .ok_or_else(|| Error::UnknownColumn {
                column: column.to_string(),
                context: format!("relation \"{}\"", self.name),
            })
    }

    fn reference(&self) -> RelationRef {
        RelationRef {
            name: self.name.clone(),
            rows: self.rows.len(),
        }
    }
}

/// Check that every value belongs to the domain of its attribute.
fn check_domains(schema: &Schema, values: &[Value]) -> Result<(), Error> {
    for (attribute, value) in schema.attributes().iter().zip(values) {
        if attribute.domain != value.domain() {
            return Err(Error::DomainMismatch {
                column: attribute.name.clone(),
                domain: attribute.domain,
                value: value.to_string(),
            });
        }
    }

    Ok(())
}

/// State restored by a rollback
#[derive(Debug, Clone)]
struct Checkpoint {
    relations: HashMap<String, Relation>,
    current_id: RowId,
}

/// Represents a collection of relations
#[derive(Debug, Default)]
pub struct DatabaseInstance {
    /// Relations by name
    relations: HashMap<String, Relation>,
    /// The lowest unused [RowId]
    ///
    /// This will be incremented for each new row.
    current_id: RowId,
    /// One checkpoint per open transaction, innermost last
    checkpoints: Vec<Checkpoint>,
}

impl DatabaseInstance {
    /// Create a new, empty [DatabaseInstance].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty relation, replacing any existing relation of that name.
    pub fn create_relation(&mut self, name: &str, schema: Schema) -> RelationRef {
        log::debug!("creating relation {name}{schema}");

        let relation = Relation {
            name: name.to_string(),
            schema,
            rows: Vec::new(),
        };
        let reference = relation.reference();
        self.relations.insert(name.to_string(), relation);

        reference
    }

    /// Insert a row into the given relation.
    pub fn insert(&mut self, name: &str, values: Vec<Value>) -> Result<RowId, Error> {
        let id = self.current_id;
        let relation = self.relation_mut(name)?;

        if values.len() != relation.schema.arity() {
            return Err(Error::ArityMismatch {
                relation: name.to_string(),
                expected: relation.schema.arity(),
                actual: values.len(),
            });
        }
        check_domains(&relation.schema, &values)?;

        relation.rows.push(Row { id, values });
        self.current_id.increment();

        Ok(id)
    }

    /// Return the relation with the given name.
    pub fn relation(&self, name: &str) -> Result<&Relation, Error> {
        self.relations
            .get(name)
            .ok_or_else(|| Error::UnknownRelation(name.to_string()))
    }

    /// Return the names of all relations in alphabetical order.
    pub fn relation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.relations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Return the number of open transactions.
    pub fn transaction_depth(&self) -> usize {
        self.checkpoints.len()
    }

    fn relation_mut(&mut self, name: &str) -> Result<&mut Relation, Error> {
        self.relations
            .get_mut(name)
            .ok_or_else(|| Error::UnknownRelation(name.to_string()))
    }

    fn project(columns: &[OutputColumn], row: &RowContext<'_>) -> Result<Vec<Value>, Error> {
        columns
            .iter()
            .map(|column| column.expression.evaluate(row))
            .collect()
    }
}

impl SchemaProvider for DatabaseInstance {
    fn schema(&self, relation: &str) -> Result<Schema, Error> {
        Ok(self.relation(relation)?.schema.clone())
    }
}

impl Store for DatabaseInstance {
    fn materialize(
        &mut self,
        target: &str,
        columns: &[OutputColumn],
        source: &Source,
        predicate: &StorePredicate,
    ) -> Result<RelationRef, Error> {
        let schema = Schema::new(
            columns
                .iter()
                .map(|column| Attribute::new(column.name.clone(), column.domain))
                .collect(),
        )?;

        let inputs = source
            .relations()
            .into_iter()
            .map(|name| self.relation(name))
            .collect::<Result<Vec<_>, _>>()?;
        let input_schemas: Vec<(&str, &Schema)> = inputs
            .iter()
            .map(|relation| (relation.name.as_str(), &relation.schema))
            .collect();

        check_references(
            columns.iter().flat_map(|column| column.expression.references()),
            &input_schemas,
        )?;
        check_references(predicate.references(), &input_schemas)?;

        let mut produced = Vec::new();
        match inputs.as_slice() {
            [relation] => {
                for row in &relation.rows {
                    let context = RowContext::new(
                        vec![(relation.name.as_str(), &relation.schema, row.values.as_slice())],
                        Some(row.id),
                    );
                    if predicate.evaluate(&context)? {
                        produced.push(Self::project(columns, &context)?);
                    }
                }
            }
            [left, right] => {
                for left_row in &left.rows {
                    for right_row in &right.rows {
                        let context = RowContext::new(
                            vec![
                                (left.name.as_str(), &left.schema, left_row.values.as_slice()),
                                (right.name.as_str(), &right.schema, right_row.values.as_slice()),
                            ],
                            None,
                        );
                        if predicate.evaluate(&context)? {
                            produced.push(Self::project(columns, &context)?);
                        }
                    }
                }
            }
            _ => unreachable!("a source has one or two inputs"),
        }

        for values in &produced {
            check_domains(&schema, values)?;
        }

        log::debug!(
            "materialized {} rows into {target} from {source} where {predicate}",
            produced.len()
        );

        let mut rows = Vec::with_capacity(produced.len());
        for values in produced {
            rows.push(Row {
                id: self.current_id.increment(),
                values,
            });
        }

        let relation = Relation {
            name: target.to_string(),
            schema,
            rows,
        };
        let reference = relation.reference();
        self.relations.insert(target.to_string(), relation);

        Ok(reference)
    }

    fn append_condition(
        &mut self,
        relation: &str,
        predicate: &StorePredicate,
        clause: &ClauseTemplate,
    ) -> Result<usize, Error> {
        let Relation { name, schema, rows } = self.relation_mut(relation)?;
        let position = schema
            .condition_position()
            .ok_or_else(|| Error::MissingConditionColumn(name.clone()))?;

        let references = predicate.references().into_iter().chain(clause.references());
        check_references(references, &[(name.as_str(), &*schema)])?;

        let mut affected = 0;
        for row in rows.iter_mut() {
            let rendered = {
                let context = RowContext::new(vec![(name.as_str(), &*schema, row.values.as_slice())], Some(row.id));
                if predicate.evaluate(&context)? {
                    Some(clause.render(&context)?)
                } else {
                    None
                }
            };

            if let Some(text) = rendered {
                match &mut row.values[position] {
                    Value::Conditions(conditions) => conditions.push(text),
                    other => {
                        return Err(Error::DomainMismatch {
                            column: schema.attributes()[position].name.clone(),
                            domain: schema.attributes()[position].domain,
                            value: other.to_string(),
                        })
                    }
                }
                affected += 1;
            }
        }

        log::trace!("appended `{clause}` to {affected} rows of {name}");

        Ok(affected)
    }

    fn update_column(
        &mut self,
        relation: &str,
        column: &str,
        value: &ValueExpr,
        predicate: &StorePredicate,
    ) -> Result<usize, Error> {
        let target = self.relation_mut(relation)?;
        let position = target.position(column)?;
        let Relation { name, schema, rows } = target;

        let references = predicate.references().into_iter().chain(value.references());
        check_references(references, &[(name.as_str(), &*schema)])?;

        let mut affected = 0;
        for row in rows.iter_mut() {
            let new_value = {
                let context = RowContext::new(vec![(name.as_str(), &*schema, row.values.as_slice())], Some(row.id));
                if predicate.evaluate(&context)? {
                    Some(value.evaluate(&context)?)
                } else {
                    None
                }
            };

            if let Some(new_value) = new_value {
                row.values[position] = new_value;
                check_domains(schema, &row.values)?;
                affected += 1;
            }
        }

        log::trace!("updated {column} = {value} in {affected} rows of {name} where {predicate}");

        Ok(affected)
    }

    fn drop_columns(&mut self, relation: &str, columns: &[String]) -> Result<(), Error> {
        let target = self.relation_mut(relation)?;

        let mut positions = columns
            .iter()
            .map(|column| target.position(column))
            .collect::<Result<Vec<_>, _>>()?;
        positions.sort_unstable();
        positions.dedup();

        for row in target.rows.iter_mut() {
            for position in positions.iter().rev() {
                row.values.remove(*position);
            }
        }
        target.schema = target.schema.without(columns);

        log::trace!("dropped columns {columns:?} of {relation}");

        Ok(())
    }

    fn delete_where(&mut self, relation: &str, predicate: &StorePredicate) -> Result<usize, Error> {
        let Relation { name, schema, rows } = self.relation_mut(relation)?;
        check_references(predicate.references(), &[(name.as_str(), &*schema)])?;

        let mut keep = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let context = RowContext::new(vec![(name.as_str(), &*schema, row.values.as_slice())], Some(row.id));
            keep.push(!predicate.evaluate(&context)?);
        }

        let before = rows.len();
        let mut flags = keep.into_iter();
        rows.retain(|_| flags.next().unwrap_or(true));
        let deleted = before - rows.len();

        log::trace!("deleted {deleted} rows of {name} where {predicate}");

        Ok(deleted)
    }

    fn scan(&self, relation: &str) -> Result<Vec<(RowId, Vec<Value>)>, Error> {
        Ok(self
            .relation(relation)?
            .rows
            .iter()
            .map(|row| (row.id, row.values.clone()))
            .collect())
    }

    fn begin(&mut self) -> Result<(), Error> {
        self.checkpoints.push(Checkpoint {
            relations: self.relations.clone(),
            current_id: self.current_id,
        });
        log::trace!("begin transaction (depth {})", self.checkpoints.len());

        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.checkpoints.pop().ok_or(Error::NoTransaction)?;
        log::trace!("commit transaction (depth {})", self.checkpoints.len());

        Ok(())
    }

    fn rollback(&mut self) -> Result<(), Error> {
        let checkpoint = self.checkpoints.pop().ok_or(Error::NoTransaction)?;
        self.relations = checkpoint.relations;
        self.current_id = checkpoint.current_id;
        log::debug!("rolled back transaction (depth {})", self.checkpoints.len());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use crate::{
        datavalues::{Domain, Value},
        error::Error,
        expression::{
            ClauseTemplate, ColumnRef, ComparisonOperator, ComparisonTemplate, OutputColumn,
            Source, StorePredicate, ValueExpr,
        },
        management::{SchemaProvider, Store},
        schema::{Attribute, Schema},
    };

    use super::DatabaseInstance;

    fn conditions(clauses: &[&str]) -> Value {
        Value::Conditions(clauses.iter().map(|clause| clause.to_string()).collect())
    }

    fn database() -> DatabaseInstance {
        let mut database = DatabaseInstance::new();

        database.create_relation(
            "policy",
            Schema::new(vec![
                Attribute::new("dest", Domain::String),
                Attribute::new("path", Domain::String),
                Attribute::new("min_len", Domain::Int),
                Attribute::condition(),
            ])
            .unwrap(),
        );
        database
            .insert(
                "policy",
                vec!["1.6.4.0/22".into(), "x531".into(), 2.into(), conditions(&["l(x531) <= 2"])],
            )
            .unwrap();
        database
            .insert(
                "policy",
                vec!["1.22.208.0/24".into(), "z2".into(), (-1).into(), conditions(&["z2 == nopath"])],
            )
            .unwrap();

        database.create_relation(
            "routes",
            Schema::new(vec![
                Attribute::new("dest", Domain::String),
                Attribute::new("path", Domain::String),
                Attribute::new("min_len", Domain::Int),
            ])
            .unwrap(),
        );
        for (dest, path) in [
            ("1.6.4.0/22", "6939 9583"),
            ("1.6.4.0/22", "3303 6453 9583"),
            ("1.22.208.0/24", "3303 9498 45528"),
        ] {
            database
                .insert("routes", vec![dest.into(), path.into(), 2.into()])
                .unwrap();
        }

        database
    }

    fn select_all(schema: &Schema) -> Vec<OutputColumn> {
        schema
            .attributes()
            .iter()
            .map(|attribute| {
                OutputColumn::new(
                    attribute.name.clone(),
                    attribute.domain,
                    ValueExpr::column(attribute.name.clone()),
                )
            })
            .collect()
    }

    #[test]
    fn insert_checks_arity_and_domain() {
        let mut database = database();

        assert!(matches!(
            database.insert("routes", vec!["1.6.4.0/22".into()]),
            Err(Error::ArityMismatch { expected: 3, actual: 1, .. })
        ));
        assert!(matches!(
            database.insert("routes", vec!["a".into(), "b".into(), "c".into()]),
            Err(Error::DomainMismatch { .. })
        ));
        assert!(matches!(
            database.insert("unknown", vec![]),
            Err(Error::UnknownRelation(_))
        ));
    }

    #[test]
    fn materialize_selection() {
        let mut database = database();
        let schema = database.schema("policy").unwrap();

        let predicate = StorePredicate::Symbolic {
            operator: ComparisonOperator::Equal,
            left: ValueExpr::column("path"),
            right: ValueExpr::Literal("6939 9583".into()),
        };
        let reference = database
            .materialize("output", &select_all(&schema), &Source::Scan("policy".into()), &predicate)
            .unwrap();

        // both rows hold variable paths
        assert_eq!(reference.rows, 2);
        assert_eq!(database.schema("output").unwrap(), schema);
    }

    #[test]
    fn materialize_join() {
        let mut database = database();

        let columns = vec![
            OutputColumn::new(
                "dest",
                Domain::String,
                ValueExpr::Column(ColumnRef::qualified(0, "policy", "dest")),
            ),
            OutputColumn::new(
                "routes_path",
                Domain::String,
                ValueExpr::Column(ColumnRef::qualified(1, "routes", "path")),
            ),
            OutputColumn::new(
                "condition",
                Domain::ConditionList,
                ValueExpr::Column(ColumnRef::qualified(0, "policy", "condition")),
            ),
        ];
        let predicate = StorePredicate::Symbolic {
            operator: ComparisonOperator::Equal,
            left: ValueExpr::Column(ColumnRef::qualified(0, "policy", "dest")),
            right: ValueExpr::Column(ColumnRef::qualified(1, "routes", "dest")),
        };

        let reference = database
            .materialize(
                "output",
                &columns,
                &Source::Join("policy".into(), "routes".into()),
                &predicate,
            )
            .unwrap();
        assert_eq!(reference.rows, 3);

        let paths: Vec<_> = database
            .relation("output")
            .unwrap()
            .column("routes_path")
            .unwrap()
            .cloned()
            .collect();
        assert_eq!(
            paths,
            vec![
                Value::from("6939 9583"),
                Value::from("3303 6453 9583"),
                Value::from("3303 9498 45528")
            ]
        );
    }

    #[test]
    fn materialize_unknown_column() {
        let mut database = database();
        let columns = vec![OutputColumn::new("flag", Domain::Int, ValueExpr::column("flag"))];

        assert!(matches!(
            database.materialize("output", &columns, &Source::Scan("routes".into()), &StorePredicate::True),
            Err(Error::UnknownColumn { .. })
        ));
    }

    #[test]
    fn append_update_drop_delete() {
        let mut database = database();

        let appended = database
            .append_condition(
                "policy",
                &StorePredicate::True,
                &ClauseTemplate::Comparison(ComparisonTemplate::new(
                    ValueExpr::column("path"),
                    ComparisonOperator::Equal,
                    ValueExpr::Literal("6939 9583".into()),
                )),
            )
            .unwrap();
        assert_eq!(appended, 2);

        let updated = database
            .update_column(
                "policy",
                "path",
                &ValueExpr::Literal("9583".into()),
                &StorePredicate::Native {
                    operator: ComparisonOperator::LessThan,
                    left: ValueExpr::column("min_len"),
                    right: ValueExpr::Literal(0.into()),
                },
            )
            .unwrap();
        assert_eq!(updated, 1);

        let rows = database.scan("policy").unwrap();
        assert_eq!(
            rows[0].1[3],
            conditions(&["l(x531) <= 2", "x531 == 6939 9583"])
        );
        assert_eq!(rows[1].1[1], Value::from("9583"));

        database
            .drop_columns("policy", &["min_len".to_string()])
            .unwrap();
        assert_eq!(
            database.schema("policy").unwrap().names().collect::<Vec<_>>(),
            vec!["dest", "path", "condition"]
        );
        assert_eq!(database.scan("policy").unwrap()[0].1.len(), 3);

        let deleted = database
            .delete_where(
                "policy",
                &StorePredicate::IsVariable(ValueExpr::column("path")),
            )
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(database.relation("policy").unwrap().len(), 1);
    }

    #[test]
    fn append_requires_condition_column() {
        let mut database = database();
        let clause = ClauseTemplate::Comparison(ComparisonTemplate::new(
            ValueExpr::column("path"),
            ComparisonOperator::Equal,
            ValueExpr::column("path"),
        ));

        assert_eq!(
            database.append_condition("routes", &StorePredicate::True, &clause),
            Err(Error::MissingConditionColumn("routes".to_string()))
        );
    }

    #[test]
    fn transactions() {
        let mut database = database();
        assert_eq!(database.commit(), Err(Error::NoTransaction));

        database.begin().unwrap();
        database.begin().unwrap();
        database
            .delete_where("routes", &StorePredicate::True)
            .unwrap();
        database.commit().unwrap();
        assert!(database.relation("routes").unwrap().is_empty());

        database.rollback().unwrap();
        assert_eq!(database.relation("routes").unwrap().len(), 3);
        assert_eq!(database.transaction_depth(), 0);
        assert_eq!(database.rollback(), Err(Error::NoTransaction));
    }
}
