//! This module defines [PlanBuilder],
//! which decides between selection and join and computes the store operations.

use std::collections::BTreeMap;

use sarasate_physical::{
    datavalues::{Domain, Value},
    error::Error as PhysicalError,
    expression::{
        ClauseTemplate, ColumnRef, ComparisonOperator, ComparisonTemplate, OutputColumn, Source,
        StorePredicate, ValueExpr,
    },
    management::SchemaProvider,
    schema::{Attribute, Schema, CONDITION_ATTRIBUTE},
};

use crate::{
    error::Error,
    query::{Comparison, Predicate, PredicateKind, Query, Selection},
};

use super::plan::{Plan, PlanStep};

/// Attribute holding the path of a route
const PATH_ATTRIBUTE: &str = "path";

/// Helper attribute that is always dropped from join results
const LENGTH_HELPER_ATTRIBUTE: &str = "len_path";

/// Operand of a comparison in a query
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand<'a> {
    /// Possibly qualified attribute
    Column {
        qualifier: Option<&'a str>,
        column: &'a str,
    },
    /// Path length of an attribute, `l(<attribute>)`
    Length {
        qualifier: Option<&'a str>,
        column: &'a str,
    },
    /// Quoted string or number
    Literal(Value),
}

impl<'a> Operand<'a> {
    fn parse(text: &'a str) -> Self {
        let text = text.trim();

        let quoted = ['\'', '"'].into_iter().find_map(|quote| {
            text.strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        });
        if let Some(inner) = quoted {
            return Operand::Literal(Value::from(inner));
        }

        if let Ok(value) = text.parse::<i64>() {
            return Operand::Literal(Value::Int(value));
        }

        if let Some((qualifier, column)) = text
            .strip_prefix("l(")
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|inner| split_attribute(inner.trim()))
        {
            return Operand::Length { qualifier, column };
        }

        match split_attribute(text) {
            Some((qualifier, column)) => Operand::Column { qualifier, column },
            None => Operand::Literal(Value::from(text)),
        }
    }
}

/// Split `[<relation>.]<attribute>` if the text has that shape.
fn split_attribute(text: &str) -> Option<(Option<&str>, &str)> {
    let is_name = |name: &str| {
        name.chars()
            .next()
            .is_some_and(|first| first.is_alphabetic() || first == '_')
            && name.chars().all(|c| c.is_alphanumeric() || c == '_')
    };

    match text.split_once('.') {
        Some((qualifier, column)) if is_name(qualifier) && is_name(column) => {
            Some((Some(qualifier), column))
        }
        None if is_name(text) => Some((None, text)),
        _ => None,
    }
}

/// Side of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Input relation of a plan
#[derive(Debug)]
struct Input {
    name: String,
    schema: Schema,
}

impl Input {
    fn condition(&self) -> Option<&Attribute> {
        self.schema
            .condition_position()
            .map(|position| &self.schema.attributes()[position])
    }

    /// Attributes other than the condition list
    fn data_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.schema
            .attributes()
            .iter()
            .filter(|attribute| attribute.domain != Domain::ConditionList)
    }
}

fn unknown_column(column: &str, context: &str) -> Error {
    Error::SchemaResolution(PhysicalError::UnknownColumn {
        column: column.to_string(),
        context: context.to_string(),
    })
}

/// Compiles a [Query] into a [Plan]
#[derive(Debug)]
pub struct PlanBuilder<'a, P: SchemaProvider + ?Sized> {
    schemas: &'a P,
    output: String,
}

impl<'a, P: SchemaProvider + ?Sized> PlanBuilder<'a, P> {
    /// Create a new [PlanBuilder] that materializes into `output`.
    pub fn new<S: Into<String>>(schemas: &'a P, output: S) -> Self {
        Self {
            schemas,
            output: output.into(),
        }
    }

    /// Compile a query.
    pub fn build(&self, query: &Query) -> Result<Plan, Error> {
        let inputs = query
            .sources()
            .iter()
            .map(|name| {
                Ok(Input {
                    name: name.clone(),
                    schema: self.schemas.schema(name)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let plan = match inputs.as_slice() {
            [input] => self.selection(query, input)?,
            [left, right] => self.join(query, left, right)?,
            _ => return Err(Error::UnsupportedJoinArity(inputs.len())),
        };

        log::debug!("plan for `{query}`:\n{plan}");

        Ok(plan)
    }

    fn selection(&self, query: &Query, input: &Input) -> Result<Plan, Error> {
        let mut columns = match query.selection() {
            Selection::Wildcard => input
                .schema
                .attributes()
                .iter()
                .map(|attribute| {
                    OutputColumn::new(
                        attribute.name.clone(),
                        attribute.domain,
                        ValueExpr::column(attribute.name.clone()),
                    )
                })
                .collect::<Vec<_>>(),
            Selection::Attributes(names) => names
                .iter()
                .map(|name| {
                    let column = match split_attribute(name) {
                        Some((Some(qualifier), column)) if qualifier == input.name => column,
                        Some((None, column)) => column,
                        _ => return Err(unknown_column(name, &input.name)),
                    };
                    let attribute = input
                        .schema
                        .attribute(column)
                        .ok_or_else(|| unknown_column(column, &input.name))?;

                    Ok(OutputColumn::new(
                        column,
                        attribute.domain,
                        ValueExpr::column(column),
                    ))
                })
                .collect::<Result<Vec<_>, Error>>()?,
        };

        if !columns
            .iter()
            .any(|column| column.domain == Domain::ConditionList)
        {
            columns.push(match input.condition() {
                Some(condition) => OutputColumn::new(
                    condition.name.clone(),
                    Domain::ConditionList,
                    ValueExpr::column(condition.name.clone()),
                ),
                None => OutputColumn::new(
                    CONDITION_ATTRIBUTE,
                    Domain::ConditionList,
                    ValueExpr::Literal(Value::no_conditions()),
                ),
            });
        }
        let schema = output_schema(&columns)?;

        let resolve = |comparison: &Comparison, side: Side| -> Result<ValueExpr, Error> {
            let text = match side {
                Side::Left => &comparison.left,
                Side::Right => &comparison.right,
            };

            let operand = Operand::parse(text);
            let (qualifier, column) = match operand {
                Operand::Literal(value) => return Ok(ValueExpr::Literal(value)),
                Operand::Column { qualifier, column } | Operand::Length { qualifier, column } => {
                    (qualifier, column)
                }
            };

            if qualifier.is_some_and(|qualifier| qualifier != input.name)
                || !input.schema.contains(column)
            {
                return Err(unknown_column(text, &input.name));
            }

            Ok(match operand {
                Operand::Length { .. } => ValueExpr::PathLength(ColumnRef::column(column)),
                _ => ValueExpr::column(column),
            })
        };

        let predicate = StorePredicate::all(
            query
                .predicates()
                .iter()
                .map(|predicate| store_predicate(predicate, &resolve))
                .collect::<Result<Vec<_>, _>>()?,
        );

        let mut steps = vec![PlanStep::Materialize {
            target: self.output.clone(),
            columns,
            source: Source::Scan(input.name.clone()),
            predicate,
        }];

        let output = |comparison: &Comparison, side: Side| -> Result<ValueExpr, Error> {
            let text = match side {
                Side::Left => &comparison.left,
                Side::Right => &comparison.right,
            };

            let operand = Operand::parse(text);
            match &operand {
                Operand::Literal(value) => Ok(ValueExpr::Literal(value.clone())),
                Operand::Column { column, .. } | Operand::Length { column, .. } => {
                    if !schema.contains(column) {
                        return Err(Error::UnsupportedProjection(format!(
                            "attribute `{column}` is used in a condition but not selected"
                        )));
                    }

                    Ok(condition_operand(&operand, column))
                }
            }
        };

        for predicate in query.conditions() {
            steps.push(PlanStep::AppendCondition {
                relation: self.output.clone(),
                predicate: StorePredicate::True,
                clause: clause_template(predicate, &output)?,
            });
        }

        Ok(Plan::new(self.output.clone(), schema, BTreeMap::new(), steps))
    }

    fn join(&self, query: &Query, left: &Input, right: &Input) -> Result<Plan, Error> {
        if *query.selection() != Selection::Wildcard {
            return Err(Error::UnsupportedProjection(format!(
                "joins only support `select *`, found `select {}`",
                query.selection()
            )));
        }

        let common: Vec<&Attribute> = left
            .data_attributes()
            .filter(|attribute| right.schema.contains(&attribute.name))
            .collect();
        let is_common = |name: &str| common.iter().any(|attribute| attribute.name == name);
        let helper = |name: &str| format!("{}_{name}", right.name);

        let mut columns = Vec::new();
        let mut aliases = BTreeMap::new();

        for attribute in left.data_attributes() {
            columns.push(OutputColumn::new(
                attribute.name.clone(),
                attribute.domain,
                ValueExpr::Column(ColumnRef::qualified(0, &left.name, &attribute.name)),
            ));
        }
        for attribute in right.data_attributes() {
            if !is_common(&attribute.name) {
                columns.push(OutputColumn::new(
                    attribute.name.clone(),
                    attribute.domain,
                    ValueExpr::Column(ColumnRef::qualified(1, &right.name, &attribute.name)),
                ));
            }
        }
        for attribute in right.data_attributes() {
            if is_common(&attribute.name) {
                let name = helper(&attribute.name);
                aliases.insert(name.clone(), format!("{}.{}", right.name, attribute.name));
                columns.push(OutputColumn::new(
                    name,
                    attribute.domain,
                    ValueExpr::Column(ColumnRef::qualified(1, &right.name, &attribute.name)),
                ));
            }
        }

        let condition = match (left.condition(), right.condition()) {
            (Some(first), Some(second)) => ValueExpr::ConcatConditions(vec![
                ColumnRef::qualified(0, &left.name, &first.name),
                ColumnRef::qualified(1, &right.name, &second.name),
            ]),
            (Some(first), None) => ValueExpr::Column(ColumnRef::qualified(0, &left.name, &first.name)),
            (None, Some(second)) => {
                ValueExpr::Column(ColumnRef::qualified(1, &right.name, &second.name))
            }
            (None, None) => ValueExpr::Literal(Value::no_conditions()),
        };
        columns.push(OutputColumn::new(
            CONDITION_ATTRIBUTE,
            Domain::ConditionList,
            condition,
        ));
        let joined = output_schema(&columns)?;

        // store predicates see both inputs
        let resolve = |comparison: &Comparison, side: Side| -> Result<ValueExpr, Error> {
            let text = match side {
                Side::Left => &comparison.left,
                Side::Right => &comparison.right,
            };

            let operand = Operand::parse(text);
            let (qualifier, column) = match operand {
                Operand::Literal(value) => return Ok(ValueExpr::Literal(value)),
                Operand::Column { qualifier, column } | Operand::Length { qualifier, column } => {
                    (qualifier, column)
                }
            };

            let candidates = match (qualifier, side) {
                (Some(qualifier), _) if qualifier == left.name => vec![(0, left)],
                (Some(qualifier), _) if qualifier == right.name => vec![(1, right)],
                (Some(_), _) => vec![],
                (None, Side::Left) => vec![(0, left), (1, right)],
                (None, Side::Right) => vec![(1, right), (0, left)],
            };
            let (index, input) = candidates
                .into_iter()
                .find(|(_, input)| input.schema.contains(column))
                .ok_or_else(|| unknown_column(text, &format!("{} or {}", left.name, right.name)))?;

            let reference = ColumnRef::qualified(index, &input.name, column);
            Ok(match operand {
                Operand::Length { .. } => ValueExpr::PathLength(reference),
                _ => ValueExpr::Column(reference),
            })
        };

        let predicate = StorePredicate::all(
            query
                .predicates()
                .iter()
                .map(|predicate| store_predicate(predicate, &resolve))
                .collect::<Result<Vec<_>, _>>()?,
        );

        let mut steps = vec![PlanStep::Materialize {
            target: self.output.clone(),
            columns,
            source: Source::Join(left.name.clone(), right.name.clone()),
            predicate,
        }];

        // conditions are rendered against the joined relation
        let output = |comparison: &Comparison, side: Side| -> Result<ValueExpr, Error> {
            let text = match side {
                Side::Left => &comparison.left,
                Side::Right => &comparison.right,
            };

            let operand = Operand::parse(text);
            let column = match &operand {
                Operand::Literal(value) => return Ok(ValueExpr::Literal(value.clone())),
                Operand::Column { qualifier, column } | Operand::Length { qualifier, column } => {
                    match qualifier {
                        Some(qualifier) if *qualifier == right.name && is_common(*column) => {
                            helper(*column)
                        }
                        Some(qualifier) if *qualifier == left.name || *qualifier == right.name => {
                            column.to_string()
                        }
                        Some(_) => return Err(unknown_column(text, &self.output)),
                        None => column.to_string(),
                    }
                }
            };

            if !joined.contains(&column) {
                return Err(unknown_column(&column, &self.output));
            }

            Ok(condition_operand(&operand, &column))
        };

        for predicate in query.conditions() {
            steps.push(PlanStep::AppendCondition {
                relation: self.output.clone(),
                predicate: StorePredicate::True,
                clause: clause_template(predicate, &output)?,
            });
        }

        if is_common(PATH_ATTRIBUTE) {
            steps.push(PlanStep::AppendCondition {
                relation: self.output.clone(),
                predicate: StorePredicate::True,
                clause: ClauseTemplate::Comparison(ComparisonTemplate::new(
                    ValueExpr::SymbolicLength(ColumnRef::column(PATH_ATTRIBUTE)),
                    ComparisonOperator::Equal,
                    ValueExpr::PathLength(ColumnRef::column(helper(PATH_ATTRIBUTE))),
                )),
            });
        }

        for attribute in &common {
            if attribute.name.contains("len") {
                continue;
            }

            steps.push(PlanStep::UpdateColumn {
                relation: self.output.clone(),
                column: attribute.name.clone(),
                value: ValueExpr::column(helper(&attribute.name)),
                predicate: StorePredicate::Not(Box::new(StorePredicate::IsVariable(
                    ValueExpr::column(attribute.name.clone()),
                ))),
            });
        }

        let mut dropped: Vec<String> = aliases.keys().cloned().collect();
        if joined.contains(LENGTH_HELPER_ATTRIBUTE) {
            dropped.push(LENGTH_HELPER_ATTRIBUTE.to_string());
        }
        let schema = joined.without(&dropped);

        if !dropped.is_empty() {
            steps.push(PlanStep::DropColumns {
                relation: self.output.clone(),
                columns: dropped,
            });
        }

        Ok(Plan::new(self.output.clone(), schema, aliases, steps))
    }
}

fn output_schema(columns: &[OutputColumn]) -> Result<Schema, Error> {
    Ok(Schema::new(
        columns
            .iter()
            .map(|column| Attribute::new(column.name.clone(), column.domain))
            .collect(),
    )?)
}

/// Value of an operand when a condition clause is rendered.
///
/// Path lengths stay symbolic so that the clause can be reasoned about later.
fn condition_operand(operand: &Operand<'_>, column: &str) -> ValueExpr {
    match operand {
        Operand::Length { .. } => ValueExpr::SymbolicLength(ColumnRef::column(column)),
        Operand::Literal(value) => ValueExpr::Literal(value.clone()),
        Operand::Column { .. } => ValueExpr::column(column),
    }
}

fn store_predicate<F>(predicate: &Predicate, resolve: &F) -> Result<StorePredicate, Error>
where
    F: Fn(&Comparison, Side) -> Result<ValueExpr, Error>,
{
    let comparisons = predicate
        .comparisons()
        .iter()
        .map(|comparison| {
            let operator = comparison.operator.into();
            let left = resolve(comparison, Side::Left)?;
            let right = resolve(comparison, Side::Right)?;

            Ok(match predicate.kind() {
                PredicateKind::Symbolic => StorePredicate::Symbolic {
                    operator,
                    left,
                    right,
                },
                PredicateKind::Native => StorePredicate::Native {
                    operator,
                    left,
                    right,
                },
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(match <[StorePredicate; 1]>::try_from(comparisons) {
        Ok([single]) => single,
        Err(comparisons) => StorePredicate::Or(comparisons),
    })
}

fn clause_template<F>(predicate: &Predicate, resolve: &F) -> Result<ClauseTemplate, Error>
where
    F: Fn(&Comparison, Side) -> Result<ValueExpr, Error>,
{
    let mut comparisons = predicate
        .comparisons()
        .iter()
        .map(|comparison| {
            Ok(ComparisonTemplate::new(
                resolve(comparison, Side::Left)?,
                comparison.operator.into(),
                resolve(comparison, Side::Right)?,
            ))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(if comparisons.len() == 1 {
        ClauseTemplate::Comparison(comparisons.remove(0))
    } else {
        ClauseTemplate::Disjunction(comparisons)
    })
}
