/*!
  Binary for the CLI of sarasate
*/

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod cli;
pub mod data;
pub mod error;
pub mod table;

use clap::Parser;
use cli::{CliApp, Format};
use colored::Colorize;
use data::{DataFile, RelationData};
use error::CliError;
use sarasate::engine::Engine;

fn run(cli: CliApp) -> Result<(), CliError> {
    log::info!("loading {}", cli.data.display());
    let mut database = DataFile::load(&cli.data)?.into_database()?;

    let engine = Engine::new(cli.engine.parameters());

    for query in &cli.queries {
        if cli.explain {
            let plan = engine.explain(&database, query)?;
            println!("{plan}");
            continue;
        }

        let result = engine.execute(&mut database, query)?;
        let relation = database.relation(&result.relation.name)?;

        match cli.format {
            Format::Table => {
                println!("{}", table::render(relation));
                println!(
                    "{} {}",
                    "Normalized:".green().bold(),
                    result.report
                );
            }
            Format::Json => {
                let data = RelationData::from(relation);
                let json =
                    serde_json::to_string(&data).map_err(|source| CliError::Serialization {
                        relation: data.name.clone(),
                        source,
                    })?;
                println!("{json}");
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = cli::CliApp::parse();

    cli.logging.initialize_logging();
    log::info!("Version: {}", clap::crate_version!());
    log::debug!("Queries: {:?}", cli.queries);

    run(cli).unwrap_or_else(|err| {
        log::error!("{} {err}", "error:".red().bold());
        std::process::exit(1)
    })
}
