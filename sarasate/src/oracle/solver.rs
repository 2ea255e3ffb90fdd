//! This module defines [Z3Oracle],
//! an [Oracle] that hands formulas to the z3 solver.
//!
//! Integer atoms become linear arithmetic over `Int`
//! and string atoms become equalities in the theory of strings.

use std::time::Duration;

use z3::{
    ast::{Ast, Bool, Int, String as Str},
    Config, Context, Params, Solver,
};

use crate::{condition::operator::Operator, error::OracleError};

use super::{
    formula::{Comparison, Formula, IntTerm, StrTerm},
    Oracle, SatResult,
};

/// Default time budget of a single call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Oracle backed by z3
///
/// Every call creates its own [Context] and [Solver],
/// so no assertion carries over from one call to the next
/// and calls on different threads do not share solver state.
#[derive(Debug, Clone, Copy)]
pub struct Z3Oracle {
    timeout: Duration,
}

impl Default for Z3Oracle {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Z3Oracle {
    /// Create a new [Z3Oracle] that gives up after `timeout` per call.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Timeout in the milliseconds expected by the solver parameter `timeout`.
    fn timeout_ms(&self) -> u32 {
        u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX)
    }
}

impl Oracle for Z3Oracle {
    fn check(&self, formula: &Formula) -> Result<SatResult, OracleError> {
        // z3 reads a zero timeout as no timeout at all
        let timeout = self.timeout_ms();
        if timeout == 0 {
            return Err(OracleError::Timeout(self.timeout));
        }

        let config = Config::new();
        let context = Context::new(&config);
        let solver = Solver::new(&context);

        let mut params = Params::new(&context);
        params.set_u32("timeout", timeout);
        solver.set_params(&params);

        let translator = Translator { context: &context };
        solver.assert(&translator.formula(formula)?);

        let result = match solver.check() {
            z3::SatResult::Sat => SatResult::Sat,
            z3::SatResult::Unsat => SatResult::Unsat,
            z3::SatResult::Unknown => {
                let reason = solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_string());
                log::debug!("check({formula}) = unknown: {reason}");

                return Err(if reason.contains("timeout") || reason.contains("canceled") {
                    OracleError::Timeout(self.timeout)
                } else {
                    OracleError::Backend(reason)
                });
            }
        };

        log::trace!("check({formula}) = {result}");

        Ok(result)
    }
}

/// Builds z3 terms for [Formula]s within one [Context]
struct Translator<'ctx> {
    context: &'ctx Context,
}

impl<'ctx> Translator<'ctx> {
    fn formula(&self, formula: &Formula) -> Result<Bool<'ctx>, OracleError> {
        Ok(match formula {
            Formula::True => Bool::from_bool(self.context, true),
            Formula::False => Bool::from_bool(self.context, false),
            Formula::Compare(comparison) => self.comparison(comparison)?,
            Formula::Not(inner) => self.formula(inner)?.not(),
            Formula::And(formulas) => {
                let formulas = self.formulas(formulas)?;
                Bool::and(self.context, &formulas.iter().collect::<Vec<_>>())
            }
            Formula::Or(formulas) => {
                let formulas = self.formulas(formulas)?;
                Bool::or(self.context, &formulas.iter().collect::<Vec<_>>())
            }
        })
    }

    fn formulas(&self, formulas: &[Formula]) -> Result<Vec<Bool<'ctx>>, OracleError> {
        formulas
            .iter()
            .map(|formula| self.formula(formula))
            .collect()
    }

    fn comparison(&self, comparison: &Comparison) -> Result<Bool<'ctx>, OracleError> {
        match comparison {
            Comparison::Int {
                left,
                operator,
                right,
            } => {
                let (left, right) = (self.int(left), self.int(right));

                Ok(match operator {
                    Operator::Eq => left._eq(&right),
                    Operator::Ne => left._eq(&right).not(),
                    Operator::Lt => left.lt(&right),
                    Operator::Le => left.le(&right),
                    Operator::Gt => left.gt(&right),
                    Operator::Ge => left.ge(&right),
                })
            }
            Comparison::StrEq { left, right } => Ok(self.string(left)?._eq(&self.string(right)?)),
        }
    }

    fn int(&self, term: &IntTerm) -> Int<'ctx> {
        match term {
            IntTerm::Var(name) => Int::new_const(self.context, name.as_str()),
            IntTerm::Const(value) => Int::from_i64(self.context, *value),
        }
    }

    fn string(&self, term: &StrTerm) -> Result<Str<'ctx>, OracleError> {
        match term {
            StrTerm::Var(name) => Ok(Str::new_const(self.context, name.as_str())),
            StrTerm::Const(text) => Str::from_str(self.context, text)
                .map_err(|error| OracleError::Backend(format!("string constant {text:?}: {error}"))),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, time::Duration};

    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use test_log::test;

    use crate::{
        condition::operator::Operator,
        error::OracleError,
        oracle::{
            formula::{Comparison, Formula, IntTerm, StrTerm},
            Oracle, SatResult,
        },
    };

    use super::Z3Oracle;

    fn var(name: &str) -> IntTerm {
        IntTerm::Var(name.to_string())
    }

    fn string(text: &str) -> StrTerm {
        StrTerm::Const(text.to_string())
    }

    fn string_var(name: &str) -> StrTerm {
        StrTerm::Var(name.to_string())
    }

    #[test]
    fn integers() {
        let oracle = Z3Oracle::default();

        let bounded = Formula::and(vec![
            Formula::int(var("l(x531)"), Operator::Le, IntTerm::Const(2)),
            Formula::int(var("l(x531)"), Operator::Eq, IntTerm::Const(3)),
        ]);
        assert_eq!(oracle.check(&bounded), Ok(SatResult::Unsat));

        let chain = Formula::and(vec![
            Formula::int(var("a"), Operator::Lt, var("b")),
            Formula::int(var("b"), Operator::Lt, var("c")),
            Formula::int(var("c"), Operator::Le, var("a")),
        ]);
        assert_eq!(oracle.check(&chain), Ok(SatResult::Unsat));

        let gap = Formula::and(vec![
            Formula::int(var("a"), Operator::Gt, IntTerm::Const(1)),
            Formula::int(var("a"), Operator::Lt, IntTerm::Const(3)),
            Formula::int(var("a"), Operator::Ne, IntTerm::Const(2)),
        ]);
        assert_eq!(oracle.check(&gap), Ok(SatResult::Unsat));

        let extremes = Formula::int(IntTerm::Const(i64::MIN), Operator::Lt, IntTerm::Const(i64::MAX));
        assert_eq!(oracle.is_tautology(&extremes), Ok(true));
    }

    #[test]
    fn strings() {
        let oracle = Z3Oracle::default();

        let constants = Formula::str_eq(string("1.6.4.0/22"), string("1.6.4.0/22"));
        assert_eq!(oracle.is_tautology(&constants), Ok(true));

        let conflict = Formula::and(vec![
            Formula::str_eq(string_var("x1"), string("6939 9583")),
            Formula::str_eq(string_var("x1"), string_var("x2")),
            Formula::str_eq(string_var("x2"), string("3303 9583")),
        ]);
        assert_eq!(oracle.check(&conflict), Ok(SatResult::Unsat));

        let distinct = Formula::and(vec![
            Formula::str_ne(string_var("x1"), string_var("x2")),
            Formula::str_eq(string_var("x1"), string("a")),
        ]);
        assert_eq!(oracle.check(&distinct), Ok(SatResult::Sat));
        assert_eq!(oracle.is_tautology(&distinct), Ok(false));

        let excluded = Formula::and(vec![
            Formula::or(vec![
                Formula::str_eq(string_var("x1"), string("a")),
                Formula::str_eq(string_var("x1"), string("b")),
            ]),
            Formula::str_ne(string_var("x1"), string("a")),
            Formula::str_ne(string_var("x1"), string("b")),
        ]);
        assert_eq!(oracle.check(&excluded), Ok(SatResult::Unsat));
    }

    #[test]
    fn entailment() {
        let oracle = Z3Oracle::default();
        let premise = Formula::int(var("a"), Operator::Lt, IntTerm::Const(2));
        let conclusion = Formula::int(var("a"), Operator::Le, IntTerm::Const(5));

        assert_eq!(oracle.entails(&premise, &conclusion), Ok(true));
        assert_eq!(oracle.entails(&conclusion, &premise), Ok(false));
        assert_eq!(oracle.entails(&Formula::True, &Formula::True), Ok(true));
    }

    #[test]
    fn timeout() {
        let oracle = Z3Oracle::new(Duration::ZERO);
        let formula = Formula::int(var("a"), Operator::Lt, var("b"));

        assert_eq!(
            oracle.check(&formula),
            Err(OracleError::Timeout(Duration::ZERO))
        );
    }

    #[test]
    fn calls_are_independent() {
        let oracle = Z3Oracle::default();
        let first = Formula::str_eq(string_var("x1"), string("a"));
        let second = Formula::str_eq(string_var("x1"), string("b"));

        assert_eq!(oracle.check(&first), Ok(SatResult::Sat));
        assert_eq!(oracle.check(&second), Ok(SatResult::Sat));
        assert_eq!(
            oracle.check(&Formula::and(vec![first, second])),
            Ok(SatResult::Unsat)
        );
    }

    #[test]
    fn backend_errors() {
        let oracle = Z3Oracle::default();
        let formula = Formula::str_eq(string_var("x1"), string("a\0b"));

        assert!(matches!(oracle.check(&formula), Err(OracleError::Backend(_))));
    }

    const INT_VARIABLES: [&str; 3] = ["a", "b", "c"];
    const STRING_VARIABLES: [&str; 2] = ["s", "t"];
    const STRING_CONSTANTS: [&str; 2] = ["p", "q"];

    /// Formulas over a few integer variables and small constants
    #[derive(Debug, Clone)]
    struct IntFormula(Formula);

    /// Formulas over a few string variables and constants
    #[derive(Debug, Clone)]
    struct StrFormula(Formula);

    fn operator(g: &mut Gen) -> Operator {
        *g.choose(&[
            Operator::Eq,
            Operator::Ne,
            Operator::Lt,
            Operator::Le,
            Operator::Gt,
            Operator::Ge,
        ])
        .expect("non-empty")
    }

    fn int_term(g: &mut Gen) -> IntTerm {
        if bool::arbitrary(g) {
            var(g.choose(&INT_VARIABLES).expect("non-empty"))
        } else {
            IntTerm::Const(*g.choose(&[-1, 0, 1]).expect("non-empty"))
        }
    }

    fn str_term(g: &mut Gen) -> StrTerm {
        if bool::arbitrary(g) {
            string_var(g.choose(&STRING_VARIABLES).expect("non-empty"))
        } else {
            string(g.choose(&STRING_CONSTANTS).expect("non-empty"))
        }
    }

    fn formula(g: &mut Gen, depth: usize, atom: &dyn Fn(&mut Gen) -> Formula) -> Formula {
        let choice = if depth == 0 { 0 } else { u8::arbitrary(g) % 4 };

        match choice {
            0 => atom(g),
            1 => Formula::negate(formula(g, depth - 1, atom)),
            2 => Formula::And(vec![formula(g, depth - 1, atom), formula(g, depth - 1, atom)]),
            _ => Formula::Or(vec![formula(g, depth - 1, atom), formula(g, depth - 1, atom)]),
        }
    }

    impl Arbitrary for IntFormula {
        fn arbitrary(g: &mut Gen) -> Self {
            Self(formula(g, 3, &|g| {
                Formula::int(int_term(g), operator(g), int_term(g))
            }))
        }
    }

    impl Arbitrary for StrFormula {
        fn arbitrary(g: &mut Gen) -> Self {
            Self(formula(g, 3, &|g| {
                if bool::arbitrary(g) {
                    Formula::str_eq(str_term(g), str_term(g))
                } else {
                    Formula::str_ne(str_term(g), str_term(g))
                }
            }))
        }
    }

    fn evaluate(formula: &Formula, ints: &HashMap<&str, i64>, strings: &HashMap<&str, &str>) -> bool {
        let int = |term: &IntTerm| match term {
            IntTerm::Var(name) => ints[name.as_str()],
            IntTerm::Const(value) => *value,
        };
        let text = |term: &StrTerm| match term {
            StrTerm::Var(name) => strings[name.as_str()].to_string(),
            StrTerm::Const(text) => text.clone(),
        };

        match formula {
            Formula::True => true,
            Formula::False => false,
            Formula::Compare(Comparison::Int {
                left,
                operator,
                right,
            }) => operator.holds(int(left).cmp(&int(right))),
            Formula::Compare(Comparison::StrEq { left, right }) => text(left) == text(right),
            Formula::Not(inner) => !evaluate(inner, ints, strings),
            Formula::And(formulas) => formulas.iter().all(|f| evaluate(f, ints, strings)),
            Formula::Or(formulas) => formulas.iter().any(|f| evaluate(f, ints, strings)),
        }
    }

    /// Solutions of difference constraints with constants in [-1, 1]
    /// over three variables can be found in [-9, 9].
    fn brute_force_ints(formula: &Formula) -> bool {
        let range = -9..=9;
        range.clone().any(|a| {
            range.clone().any(|b| {
                range.clone().any(|c| {
                    let ints = HashMap::from([("a", a), ("b", b), ("c", c)]);
                    evaluate(formula, &ints, &HashMap::new())
                })
            })
        })
    }

    /// Two variables need at most two values besides the constants.
    fn brute_force_strings(formula: &Formula) -> bool {
        let domain = ["p", "q", "u", "v"];
        domain.iter().any(|s| {
            domain.iter().any(|t| {
                let strings = HashMap::from([("s", *s), ("t", *t)]);
                evaluate(formula, &HashMap::new(), &strings)
            })
        })
    }

    #[quickcheck]
    fn agrees_with_brute_force_on_integers(formula: IntFormula) -> bool {
        let expected = brute_force_ints(&formula.0);
        Z3Oracle::default().check(&formula.0) == Ok(if expected {
            SatResult::Sat
        } else {
            SatResult::Unsat
        })
    }

    #[quickcheck]
    fn agrees_with_brute_force_on_strings(formula: StrFormula) -> bool {
        let expected = brute_force_strings(&formula.0);
        Z3Oracle::default().check(&formula.0) == Ok(if expected {
            SatResult::Sat
        } else {
            SatResult::Unsat
        })
    }
}
