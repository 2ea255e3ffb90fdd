//! This module defines [Normalizer],
//! which simplifies the conditions of a materialized relation.
//!
//! Normalization runs in three stages.
//! Rows whose condition is unsatisfiable are deleted,
//! conditions that always hold are replaced by the empty list
//! and finally clauses implied by the remaining clauses of their row are removed.

use std::{collections::BTreeSet, fmt::Display};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use sarasate_physical::{
    datavalues::Value,
    expression::{StorePredicate, ValueExpr},
    management::{id::RowId, Store},
};

use crate::{
    condition::lowering::{lower_conditions, LoweredConditions},
    engine::{CancellationToken, Stage},
    error::{Error, OracleError},
    execution_parameters::{EngineParameters, FailurePolicy},
    oracle::{formula::Formula, Oracle, SatResult},
};

/// Summary of a normalization run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Rows left in the relation
    pub rows: usize,
    /// Deleted rows with unsatisfiable conditions
    pub contradictions: usize,
    /// Rows whose condition was collapsed to the empty list
    pub tautologies: usize,
    /// Removed clauses
    pub redundant_clauses: usize,
    /// Rows kept unchanged because the oracle failed on them
    pub fail_open: usize,
}

impl Display for NormalizationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} rows, {} contradictions deleted, {} tautologies collapsed, {} redundant clauses removed",
            self.rows, self.contradictions, self.tautologies, self.redundant_clauses
        )?;

        if self.fail_open > 0 {
            write!(f, ", {} rows undecided", self.fail_open)?;
        }

        Ok(())
    }
}

/// Condition of a single row
#[derive(Debug)]
struct Row {
    id: RowId,
    conditions: Vec<String>,
    lowered: LoweredConditions,
}

/// Outcome of an oracle question about one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Yes,
    No,
    Undecided,
}

/// Simplifies the condition column of a relation
#[derive(Debug)]
pub struct Normalizer<'a> {
    oracle: &'a dyn Oracle,
    parameters: &'a EngineParameters,
    cancellation: &'a CancellationToken,
}

impl<'a> Normalizer<'a> {
    /// Create a new [Normalizer].
    pub fn new(
        oracle: &'a dyn Oracle,
        parameters: &'a EngineParameters,
        cancellation: &'a CancellationToken,
    ) -> Self {
        Self {
            oracle,
            parameters,
            cancellation,
        }
    }

    /// Normalize the conditions of `relation` in place.
    pub fn normalize<S: Store + ?Sized>(
        &self,
        store: &mut S,
        relation: &str,
    ) -> Result<NormalizationReport, Error> {
        let schema = store.schema(relation)?;
        let rows = store.scan(relation)?;
        let mut report = NormalizationReport {
            rows: rows.len(),
            ..Default::default()
        };

        let Some(position) = schema.condition_position() else {
            log::debug!("{relation} has no condition column");
            return Ok(report);
        };
        let column = schema.attributes()[position].name.clone();

        let rows = rows
            .into_iter()
            .map(|(id, values)| {
                let conditions = values
                    .get(position)
                    .and_then(Value::as_conditions)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default();
                let lowered = lower_conditions(&conditions)?;

                Ok(Row {
                    id,
                    conditions,
                    lowered,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        // contradictions
        self.cancellation.check(Stage::Contradictions)?;
        let verdicts = self.decide(&rows, |row| {
            self.oracle
                .check(&row.lowered.conjunction())
                .map(|result| result == SatResult::Unsat)
        })?;

        let contradictions = select(&rows, &verdicts, Verdict::Yes);
        report.fail_open += verdicts.iter().filter(|v| **v == Verdict::Undecided).count();
        report.contradictions = store.delete_where(relation, &StorePredicate::Rows(contradictions))?;
        report.rows -= report.contradictions;
        log::debug!("deleted {} contradictory rows", report.contradictions);

        // only rows known to be satisfiable are simplified further
        let rows: Vec<Row> = rows
            .into_iter()
            .zip(verdicts)
            .filter(|(row, verdict)| *verdict == Verdict::No && !row.conditions.is_empty())
            .map(|(row, _)| row)
            .collect();

        // tautologies
        self.cancellation.check(Stage::Tautologies)?;
        let verdicts = self.decide(&rows, |row| {
            let clauses = Formula::and(row.lowered.clauses().to_vec());
            self.oracle.entails(&row.lowered.axioms(), &clauses)
        })?;

        let tautologies = select(&rows, &verdicts, Verdict::Yes);
        report.fail_open += verdicts.iter().filter(|v| **v == Verdict::Undecided).count();
        report.tautologies = store.update_column(
            relation,
            &column,
            &ValueExpr::Literal(Value::no_conditions()),
            &StorePredicate::Rows(tautologies),
        )?;
        log::debug!("collapsed {} tautological conditions", report.tautologies);

        let rows: Vec<Row> = rows
            .into_iter()
            .zip(verdicts)
            .filter(|(_, verdict)| *verdict == Verdict::No)
            .map(|(row, _)| row)
            .collect();

        // redundancy
        self.cancellation.check(Stage::Redundancy)?;
        let reduced = self.map(&rows, |row| self.remove_redundant(row))?;

        for (row, kept) in rows.iter().zip(reduced) {
            let Some(kept) = kept else {
                report.fail_open += 1;
                continue;
            };
            if kept.len() == row.conditions.len() {
                continue;
            }

            report.redundant_clauses += row.conditions.len() - kept.len();
            log::trace!("row {}: {:?} reduced to {:?}", row.id, row.conditions, kept);

            store.update_column(
                relation,
                &column,
                &ValueExpr::Literal(Value::Conditions(kept)),
                &StorePredicate::Rows(BTreeSet::from([row.id])),
            )?;
        }
        log::debug!("removed {} redundant clauses", report.redundant_clauses);

        Ok(report)
    }

    /// Remove clauses implied by the other clauses of the row until none is left.
    ///
    /// Returns `None` if the oracle failed and the row is to be kept as is.
    fn remove_redundant(&self, row: &Row) -> Result<Option<Vec<String>>, Error> {
        let formulas = row.lowered.clauses();
        let mut kept: Vec<usize> = (0..formulas.len()).collect();

        loop {
            let mut redundant = None;

            for (index, &clause) in kept.iter().enumerate() {
                let others = Formula::and(
                    std::iter::once(row.lowered.axioms())
                        .chain(
                            kept.iter()
                                .filter(|&&other| other != clause)
                                .map(|&other| formulas[other].clone()),
                        )
                        .collect(),
                );

                match self.oracle.entails(&others, &formulas[clause]) {
                    Ok(true) => {
                        redundant = Some(index);
                        break;
                    }
                    Ok(false) => {}
                    Err(error) => return self.fail(row, error).map(|_| None),
                }
            }

            let Some(index) = redundant else {
                break;
            };
            log::trace!("row {}: `{}` is redundant", row.id, row.conditions[kept[index]]);
            kept.remove(index);
        }

        Ok(Some(
            kept.into_iter()
                .map(|index| row.conditions[index].clone())
                .collect(),
        ))
    }

    /// Ask the oracle a yes/no question about every row.
    fn decide<F>(&self, rows: &[Row], question: F) -> Result<Vec<Verdict>, Error>
    where
        F: Fn(&Row) -> Result<bool, OracleError> + Sync + Send,
    {
        self.map(rows, |row| {
            Ok(match question(row) {
                Ok(true) => Verdict::Yes,
                Ok(false) => Verdict::No,
                Err(error) => self.fail(row, error).map(|_| Verdict::Undecided)?,
            })
        })
    }

    /// Apply `function` to every row, in parallel if configured.
    fn map<T, F>(&self, rows: &[Row], function: F) -> Result<Vec<T>, Error>
    where
        T: Send,
        F: Fn(&Row) -> Result<T, Error> + Sync + Send,
    {
        if self.parameters.parallel_normalization() {
            rows.par_iter().map(function).collect()
        } else {
            rows.iter().map(function).collect()
        }
    }

    /// Apply the failure policy to an oracle error.
    fn fail(&self, row: &Row, error: OracleError) -> Result<(), Error> {
        match self.parameters.failure_policy() {
            FailurePolicy::FailClosed => Err(Error::Oracle {
                conditions: row.conditions.clone(),
                source: error,
            }),
            FailurePolicy::FailOpen => {
                log::warn!(
                    "keeping row {} with condition {:?}: {error}",
                    row.id,
                    row.conditions
                );
                Ok(())
            }
        }
    }
}

fn select(rows: &[Row], verdicts: &[Verdict], verdict: Verdict) -> BTreeSet<RowId> {
    rows.iter()
        .zip(verdicts)
        .filter(|(_, v)| **v == verdict)
        .map(|(row, _)| row.id)
        .collect()
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use test_log::test;

    use sarasate_physical::{
        datavalues::{Domain, Value},
        management::database::DatabaseInstance,
        schema::{Attribute, Schema},
    };

    use crate::{
        condition::lowering::lower_conditions,
        engine::{CancellationToken, Stage},
        error::Error,
        execution_parameters::{EngineParameters, FailurePolicy},
        oracle::{solver::Z3Oracle, Oracle, SatResult},
    };

    use super::{NormalizationReport, Normalizer};

    fn database(rows: &[&[&str]]) -> DatabaseInstance {
        let mut database = DatabaseInstance::new();
        database.create_relation(
            "r",
            Schema::new(vec![
                Attribute::new("id", Domain::Int),
                Attribute::condition(),
            ])
            .unwrap(),
        );

        for (id, conditions) in rows.iter().enumerate() {
            database
                .insert(
                    "r",
                    vec![
                        Value::Int(id as i64),
                        Value::from(conditions.iter().map(|c| c.to_string()).collect::<Vec<_>>()),
                    ],
                )
                .unwrap();
        }

        database
    }

    fn normalize(
        database: &mut DatabaseInstance,
        parameters: &EngineParameters,
    ) -> Result<NormalizationReport, Error> {
        let oracle = Z3Oracle::default();
        Normalizer::new(&oracle, parameters, &CancellationToken::new()).normalize(database, "r")
    }

    fn conditions(database: &DatabaseInstance) -> Vec<(i64, Vec<String>)> {
        database
            .relation("r")
            .unwrap()
            .rows()
            .map(|(_, values)| {
                (
                    values[0].as_int().unwrap(),
                    values[1].as_conditions().unwrap().to_vec(),
                )
            })
            .collect()
    }

    #[test]
    fn contradictions() {
        let mut database = database(&[
            &["x1 == nopath"],
            &["x2 == 'a'", "x2 != 'a'"],
            &["l(x531) <= 2", "l(x531) == 3"],
            &["x3 == 'a'"],
        ]);
        let report = normalize(&mut database, &EngineParameters::default()).unwrap();

        assert_eq!(report.contradictions, 3);
        assert_eq!(report.rows, 1);
        assert_eq!(conditions(&database), vec![(3, vec!["x3 == 'a'".to_string()])]);
    }

    #[test]
    fn path_lengths() {
        let mut database = database(&[
            &["l(x1) < 0"],
            &["l(3303 6453 9583) == 2"],
            &["l(6939 9583) == 5"],
            &["l(3303 6453 9583) == 3"],
            &["l(x2) >= 0", "x3 == 'a'"],
            &["l(x4) <= l(6939 9583)"],
        ]);
        let mut parameters = EngineParameters::default();
        parameters.set_parallel_normalization(false);
        let report = normalize(&mut database, &parameters).unwrap();

        assert_eq!(report.contradictions, 3);
        assert_eq!(report.tautologies, 1);
        assert_eq!(report.redundant_clauses, 1);
        assert_eq!(
            conditions(&database),
            vec![
                (3, vec![]),
                (4, vec!["x3 == 'a'".to_string()]),
                (5, vec!["l(x4) <= l(6939 9583)".to_string()]),
            ]
        );
    }

    #[test]
    fn tautologies() {
        let mut database = database(&[
            &["x1 == x1", "Or(x2 == 'a', x2 != 'a')"],
            &[],
            &["l(x5) <= 3"],
        ]);
        let report = normalize(&mut database, &EngineParameters::default()).unwrap();

        assert_eq!(report.tautologies, 1);
        assert_eq!(
            conditions(&database),
            vec![
                (0, vec![]),
                (1, vec![]),
                (2, vec!["l(x5) <= 3".to_string()])
            ]
        );
    }

    #[test]
    fn duplicates_are_redundant() {
        let mut database = database(&[&["x2 == 5", "x2 == 5"]]);
        let report = normalize(&mut database, &EngineParameters::default()).unwrap();

        assert_eq!(report.contradictions, 0);
        assert_eq!(report.tautologies, 0);
        assert_eq!(report.redundant_clauses, 1);
        assert_eq!(conditions(&database), vec![(0, vec!["x2 == 5".to_string()])]);
    }

    #[test]
    fn implied_clauses_are_redundant() {
        let mut database = database(&[&["l(x1) <= 2", "l(x1) < 5", "x2 == 'b'"]]);
        let mut parameters = EngineParameters::default();
        parameters.set_parallel_normalization(false);
        let report = normalize(&mut database, &parameters).unwrap();

        assert_eq!(report.redundant_clauses, 1);
        assert_eq!(
            conditions(&database),
            vec![(0, vec!["l(x1) <= 2".to_string(), "x2 == 'b'".to_string()])]
        );
    }

    #[test]
    fn failure_policy() {
        let mut parameters = EngineParameters::default();
        parameters.set_oracle_timeout(Duration::ZERO);
        let oracle = Z3Oracle::new(parameters.oracle_timeout());
        let cancellation = CancellationToken::new();

        let mut database = database(&[&["x1 == 'a'"]]);
        let result = Normalizer::new(&oracle, &parameters, &cancellation).normalize(&mut database, "r");
        assert!(matches!(result, Err(Error::Oracle { .. })));

        parameters.set_failure_policy(FailurePolicy::FailOpen);
        let report = Normalizer::new(&oracle, &parameters, &cancellation)
            .normalize(&mut database, "r")
            .unwrap();
        assert_eq!(report.fail_open, 1);
        assert_eq!(report.rows, 1);
        assert_eq!(conditions(&database), vec![(0, vec!["x1 == 'a'".to_string()])]);
    }

    #[test]
    fn cancellation() {
        let mut database = database(&[&["x1 == nopath"]]);
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let oracle = Z3Oracle::default();
        let parameters = EngineParameters::default();
        let result = Normalizer::new(&oracle, &parameters, &cancellation).normalize(&mut database, "r");

        assert_eq!(
            result,
            Err(Error::Cancelled {
                stage: Stage::Contradictions
            })
        );
        assert_eq!(database.relation("r").unwrap().len(), 1);
    }

    /// Condition list over the string variables `s`, `t` and the constants `p`, `q`
    #[derive(Debug, Clone)]
    struct Conditions(Vec<String>);

    impl Arbitrary for Conditions {
        fn arbitrary(g: &mut Gen) -> Self {
            let operands = ["s", "t", "'p'", "'q'"];
            let length = usize::arbitrary(g) % 4;

            Conditions(
                (0..length)
                    .map(|_| {
                        let left = g.choose(&operands).copied().unwrap_or("s");
                        let right = g.choose(&operands).copied().unwrap_or("t");
                        let operator = g.choose(&["==", "!="]).copied().unwrap_or("==");
                        format!("{left} {operator} {right}")
                    })
                    .collect(),
            )
        }

        fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
            Box::new(self.0.shrink().map(Conditions))
        }
    }

    #[quickcheck]
    fn normalization_preserves_meaning(conditions: Conditions) -> bool {
        let clauses: Vec<&str> = conditions.0.iter().map(String::as_str).collect();
        let mut database = database(&[clauses.as_slice()]);
        normalize(&mut database, &EngineParameters::default()).unwrap();

        let oracle = Z3Oracle::default();
        let before = lower_conditions(&conditions.0).unwrap().conjunction();

        match database.relation("r").unwrap().rows().next() {
            None => oracle.check(&before).unwrap() == SatResult::Unsat,
            Some((_, values)) => {
                let after = lower_conditions(values[1].as_conditions().unwrap())
                    .unwrap()
                    .conjunction();
                oracle.entails(&before, &after).unwrap() && oracle.entails(&after, &before).unwrap()
            }
        }
    }
}
