//! The command line interface for the matcher.
use crate::engine::{CancellationToken, DefaultSink, RunOptions, Termination, run};
use crate::evaluate::rank;
use crate::input::{read_costs, read_recipe, read_resource_dir};
use crate::log;
use crate::settings::Settings;
use crate::solution::{FlatRecord, apply_ranking};
use ::log::info;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};

/// The command line interface for the matcher.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Commands,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Match a recipe against a directory of resource descriptions.
    Run {
        /// Path to the recipe JSON file.
        recipe: PathBuf,
        /// Directory containing resource capability descriptions.
        resource_dir: PathBuf,
        /// Stop at the first accepted solution.
        #[arg(long)]
        first: bool,
        /// Rank solutions by weighted cost, using the cost sheet in the resource directory.
        #[arg(long)]
        rank: bool,
        /// Write the structured solutions to this JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a recipe file without running the search.
    Validate {
        /// Path to the recipe JSON file.
        recipe: PathBuf,
    },
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            recipe,
            resource_dir,
            first,
            rank,
            output,
        } => handle_run_command(&recipe, &resource_dir, first, rank, output.as_deref()),
        Commands::Validate { recipe } => handle_validate_command(&recipe),
    }
}

/// Handle the `run` command.
fn handle_run_command(
    recipe_path: &Path,
    resource_dir: &Path,
    first: bool,
    rank_solutions: bool,
    output_path: Option<&Path>,
) -> Result<()> {
    let settings = Settings::load().context("Failed to load settings.")?;
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    let recipe = read_recipe(recipe_path).context("Failed to load recipe.")?;
    info!("Loaded recipe from {}", recipe_path.display());
    let resources = read_resource_dir(resource_dir).context("Failed to load resources.")?;

    let options = RunOptions {
        find_all: !first,
        generate_structured: true,
        max_attempts: settings.max_attempts,
    };
    let outcome = run(
        &recipe,
        &resources,
        &options,
        &mut DefaultSink,
        &CancellationToken::new(),
    )?;
    let structured = outcome
        .structured
        .expect("Structured solutions were requested");

    let records = if rank_solutions {
        let costs = read_costs(resource_dir)?;
        let evaluated = rank(&structured, &costs, &settings.weights);
        apply_ranking(&outcome.records, &evaluated)
    } else {
        outcome.records
    };

    print_records(&records);
    info!("Search finished ({})", outcome.termination);
    if outcome.termination == Termination::BudgetExhausted {
        info!("The solution list may be incomplete");
    }

    if let Some(output_path) = output_path {
        let json = serde_json::to_string_pretty(&structured)?;
        fs::write(output_path, json)
            .with_context(|| format!("Error writing {}", output_path.display()))?;
        info!("Wrote structured solutions to {}", output_path.display());
    }

    Ok(())
}

/// Handle the `validate` command.
fn handle_validate_command(recipe_path: &Path) -> Result<()> {
    log::init(None, None).context("Failed to initialise logging.")?;

    let recipe = read_recipe(recipe_path)?;
    println!(
        "Recipe OK: {} steps, {} materials, {} links",
        recipe.steps.len(),
        recipe.materials().count(),
        recipe.links.len()
    );

    Ok(())
}

/// Print the flat records as a table on stdout
fn print_records(records: &[FlatRecord]) {
    if records.is_empty() {
        println!("No solutions found");
        return;
    }

    println!("{:>4}  {:<12} {:<24} Capabilities", "Sol", "Step", "Resource");
    for record in records {
        match record {
            FlatRecord::Spacer => println!(),
            FlatRecord::Assignment(row) => {
                let capabilities = row.capabilities.iter().join(", ");
                let costs = row
                    .costs
                    .map(|costs| {
                        format!(
                            "  [score {:.2}, energy {:.1}, use {:.1}, co2 {:.1}]",
                            costs.score.value(),
                            costs.energy.value(),
                            costs.usage.value(),
                            costs.co2.value()
                        )
                    })
                    .unwrap_or_default();
                println!(
                    "{:>4}  {:<12} {:<24} {capabilities}{costs}",
                    row.solution_id,
                    row.step_id.as_str(),
                    row.resource.as_str()
                );
            }
        }
    }
}
