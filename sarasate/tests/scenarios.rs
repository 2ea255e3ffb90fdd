#![cfg(not(miri))]
use sarasate::{
    condition::lowering::lower_clause,
    datavalues::{Domain, Value},
    engine::Engine,
    management::{database::DatabaseInstance, Store},
    oracle::{
        formula::{Formula, StrTerm},
        solver::Z3Oracle,
        Oracle, SatResult,
    },
};
use sarasate_physical::schema::{Attribute, Schema};
use test_log::test;

fn conditions(clauses: &[&str]) -> Value {
    Value::from(
        clauses
            .iter()
            .map(|clause| clause.to_string())
            .collect::<Vec<_>>(),
    )
}

fn forwarding() -> DatabaseInstance {
    let mut database = DatabaseInstance::new();
    database.create_relation(
        "f",
        Schema::new(vec![
            Attribute::new("dest", Domain::String),
            Attribute::new("path", Domain::String),
            Attribute::condition(),
        ])
        .unwrap(),
    );

    let rows = [
        ("1.2.3.0/24", "x1", conditions(&["x1 == nopath"])),
        ("1.2.3.0/24", "x2", conditions(&["x2 == 5", "x2 == 5"])),
        ("1.2.3.0/24", "6939 9583", conditions(&[])),
    ];
    for (dest, path, condition) in rows {
        database
            .insert("f", vec![dest.into(), path.into(), condition])
            .unwrap();
    }

    database
}

fn output_conditions(database: &DatabaseInstance) -> Vec<Vec<String>> {
    database
        .relation("output")
        .unwrap()
        .column("condition")
        .unwrap()
        .map(|value| value.as_conditions().unwrap().to_vec())
        .collect()
}

#[test]
fn contradiction_is_deleted() {
    let mut database = forwarding();
    let input = database.relation("f").unwrap().len();

    let result = Engine::default()
        .execute(&mut database, "select * from f where dest = '1.2.3.0/24';")
        .unwrap();

    assert_eq!(result.relation.rows, input - 1);
    assert_eq!(result.report.contradictions, 1);
    assert!(output_conditions(&database)
        .iter()
        .all(|conditions| !conditions.iter().any(|clause| clause.contains("nopath"))));
}

#[test]
fn duplicate_is_not_a_tautology() {
    let mut database = forwarding();

    let result = Engine::default()
        .execute(&mut database, "select * from f where dest = '1.2.3.0/24'")
        .unwrap();

    // only the route without conditions collapses
    assert_eq!(result.report.tautologies, 1);
    assert_eq!(
        output_conditions(&database),
        vec![vec!["x2 == 5".to_string()], vec![]]
    );
}

#[test]
fn join_merges_and_drops_helpers() {
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
    database.create_relation(
        "routes",
        Schema::new(vec![
            Attribute::new("dest", Domain::String),
            Attribute::new("path", Domain::String),
            Attribute::new("min_len", Domain::Int),
        ])
        .unwrap(),
    );

    database
        .insert(
            "policy",
            vec![
                "1.6.4.0/22".into(),
                "3303 6453 9583".into(),
                Value::Int(2),
                conditions(&[]),
            ],
        )
        .unwrap();
    for (dest, path, min_len) in [
        ("1.6.4.0/22", "3356 2914 9583", 3),
        ("1.6.4.0/22", "6939 9583", 2),
        ("1.6.4.0/22", "174", 1),
        ("1.2.3.0/24", "3303 6453", 2),
    ] {
        database
            .insert("routes", vec![dest.into(), path.into(), Value::Int(min_len)])
            .unwrap();
    }

    let query = "select * from policy, routes where dest = dest and min_len <= min_len";
    let engine = Engine::default();

    // before normalization only the path-length clause is not constant
    let plan = engine.explain(&database, query).unwrap();
    database.begin().unwrap();
    plan.execute(&mut database).unwrap();
    assert_eq!(
        database
            .relation("output")
            .unwrap()
            .column("condition")
            .unwrap()
            .collect::<Vec<_>>(),
        vec![
            &conditions(&["1.6.4.0/22 == 1.6.4.0/22", "l(3303 6453 9583) == 3"]),
            &conditions(&["1.6.4.0/22 == 1.6.4.0/22", "l(3303 6453 9583) == 2"]),
        ]
    );
    database.rollback().unwrap();

    let result = engine.execute(&mut database, query).unwrap();

    let output = database.relation("output").unwrap();
    assert_eq!(
        output.schema().names().collect::<Vec<_>>(),
        vec!["dest", "path", "min_len", "condition"]
    );

    // the two hop route cannot have the length of the three hop policy path
    assert_eq!(result.report.contradictions, 1);
    assert_eq!(result.report.tautologies, 1);
    let rows: Vec<Vec<Value>> = output.rows().map(|(_, values)| values.to_vec()).collect();
    assert_eq!(
        rows,
        vec![vec![
            "1.6.4.0/22".into(),
            "3356 2914 9583".into(),
            Value::Int(2),
            conditions(&[]),
        ]]
    );
}

#[test]
fn symbolic_attributes_survive_the_merge() {
    let mut database = DatabaseInstance::new();
    database.create_relation(
        "f",
        Schema::new(vec![
            Attribute::new("dest", Domain::String),
            Attribute::new("path", Domain::String),
            Attribute::condition(),
        ])
        .unwrap(),
    );
    database.create_relation(
        "routes",
        Schema::new(vec![
            Attribute::new("dest", Domain::String),
            Attribute::new("path", Domain::String),
        ])
        .unwrap(),
    );

    database
        .insert(
            "f",
            vec!["1.6.4.0/22".into(), "x1".into(), conditions(&["l(x1) <= 2"])],
        )
        .unwrap();
    for path in ["3303 6453 9583", "6939 9583"] {
        database
            .insert("routes", vec!["1.6.4.0/22".into(), path.into()])
            .unwrap();
    }

    Engine::default()
        .execute(&mut database, "select * from f, routes where dest = dest")
        .unwrap();

    // the three hop route violates the length bound of x1
    let output = database.relation("output").unwrap();
    let rows: Vec<Vec<Value>> = output.rows().map(|(_, values)| values.to_vec()).collect();
    assert_eq!(
        rows,
        vec![vec![
            "1.6.4.0/22".into(),
            "x1".into(),
            conditions(&["l(x1) == 2"]),
        ]]
    );
}

#[test]
fn qualified_operands_tie_symbolic_paths() {
    let mut database = DatabaseInstance::new();
    database.create_relation(
        "f",
        Schema::new(vec![
            Attribute::new("dest", Domain::String),
            Attribute::new("path", Domain::String),
            Attribute::condition(),
        ])
        .unwrap(),
    );
    database.create_relation(
        "routes",
        Schema::new(vec![
            Attribute::new("dest", Domain::String),
            Attribute::new("path", Domain::String),
        ])
        .unwrap(),
    );

    database
        .insert(
            "f",
            vec!["1.6.4.0/22".into(), "x1".into(), conditions(&["l(x1) <= 2"])],
        )
        .unwrap();
    for path in ["3303 6453 9583", "6939 9583"] {
        database
            .insert("routes", vec!["1.6.4.0/22".into(), path.into()])
            .unwrap();
    }

    Engine::default()
        .execute(&mut database, "select * from f, routes where path = routes.path")
        .unwrap();

    // the variable keeps its place and the clause binds it to the route
    let output = database.relation("output").unwrap();
    let rows: Vec<Vec<Value>> = output.rows().map(|(_, values)| values.to_vec()).collect();
    assert_eq!(
        rows,
        vec![vec![
            "1.6.4.0/22".into(),
            "x1".into(),
            conditions(&["x1 == 6939 9583", "l(x1) == 2"]),
        ]]
    );
}

#[test]
fn string_atoms_are_not_arithmetic() {
    let formula = lower_clause("path == '3303 6453 9583'").unwrap();

    assert_eq!(
        formula,
        Formula::str_eq(
            StrTerm::Var("path".to_string()),
            StrTerm::Const("3303 6453 9583".to_string())
        )
    );
    assert_eq!(Z3Oracle::default().check(&formula), Ok(SatResult::Sat));
}
