use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use pivot_lang::{CompiledModel, Compiler};
use pivot_solver::{normalize, PricingRule, Solution, SolutionStatus, Solver};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pivot")]
#[command(about = "Solve linear programs written in LP format", long_about = None)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Pricing {
    /// Most negative reduced cost
    Dantzig,
    /// Lowest index with a negative reduced cost
    Bland,
}

impl From<Pricing> for PricingRule {
    fn from(pricing: Pricing) -> Self {
        match pricing {
            Pricing::Dantzig => PricingRule::Dantzig,
            Pricing::Bland => PricingRule::Bland,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an LP file and print the optimal solution
    Solve {
        /// The LP file to solve
        file: PathBuf,
        /// Entering-variable selection rule
        #[arg(long, value_enum, default_value = "dantzig")]
        pricing: Pricing,
        /// Pivot limit for each phase
        #[arg(long, default_value_t = 10_000)]
        max_iterations: usize,
        /// Zero tolerance for reduced costs and ratios
        #[arg(long, default_value_t = 1e-9)]
        tolerance: f64,
        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
        /// Print variables at zero too
        #[arg(short, long)]
        all: bool,
    },
    /// Parse an LP file and output the AST
    Parse {
        /// The file to parse
        file: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
    },
    /// Check an LP file for errors
    Check {
        /// The file to check
        file: PathBuf,
    },
    /// Print the standard-form model the solver works on
    Normalize {
        /// The LP file to normalize
        file: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load(file: &Path) -> CompiledModel {
    match Compiler::load_file(file) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn exit_code(status: SolutionStatus) -> i32 {
    match status {
        SolutionStatus::Optimal => 0,
        SolutionStatus::Infeasible => 2,
        SolutionStatus::Unbounded => 3,
    }
}

fn print_pretty(model: &CompiledModel, solution: &Solution, all: bool) {
    println!("Status: {}", solution.status);
    if !solution.is_optimal() {
        return;
    }
    println!("Objective ({}): {}", model.objective_name, solution.objective_value);
    println!(
        "Iterations: {} (phase 1: {}, phase 2: {})",
        solution.iterations.total(),
        solution.iterations.phase_one,
        solution.iterations.phase_two
    );
    println!();
    println!("Variables:");
    let width = model.problem.variables.iter().map(|v| v.len()).max().unwrap_or(0);
    for (name, value) in model.problem.variables.iter().zip(&solution.values) {
        if all || value.abs() > 1e-9 {
            println!("  {:width$} {:>14.6}", name, value);
        }
    }
}

fn print_json(model: &CompiledModel, solution: &Solution) {
    let variables: serde_json::Map<String, serde_json::Value> = model
        .problem
        .variables
        .iter()
        .zip(&solution.values)
        .map(|(name, &value)| (name.clone(), serde_json::Value::from(value)))
        .collect();
    let output = serde_json::json!({
        "status": solution.status,
        "objective_name": model.objective_name,
        "objective_value": solution.is_optimal().then_some(solution.objective_value),
        "variables": variables,
        "basic_variables": solution.basic_variables,
        "iterations": solution.iterations,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Solve {
            file,
            pricing,
            max_iterations,
            tolerance,
            format,
            all,
        } => {
            let model = load(&file);
            let solver = Solver::new()
                .with_pricing(pricing.into())
                .with_max_iterations(max_iterations)
                .with_tolerance(tolerance);
            info!("solving {} with {:?}", file.display(), solver);

            let solution = match solver.solve(&model.problem) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Solver error: {}", e);
                    std::process::exit(1);
                }
            };

            match format {
                Format::Pretty => print_pretty(&model, &solution, all),
                Format::Json => print_json(&model, &solution),
            }
            std::process::exit(exit_code(solution.status));
        }
        Commands::Parse { file, format } => {
            let source = match std::fs::read_to_string(&file) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error reading file: {}", e);
                    std::process::exit(1);
                }
            };

            match pivot_lang::Parser::parse(&source) {
                Ok(lp) => match format {
                    Format::Json => match serde_json::to_string_pretty(&lp) {
                        Ok(text) => println!("{}", text),
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            std::process::exit(1);
                        }
                    },
                    Format::Pretty => println!("{:#?}", lp),
                },
                Err(e) => {
                    eprintln!("Parse error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Check { file } => {
            let model = load(&file);
            let bounded = model.problem.bounds.iter().filter(|b| !b.is_non_negative()).count();
            println!(
                "OK: {} variables, {} constraints, {} non-default bounds",
                model.problem.num_variables(),
                model.problem.num_constraints(),
                bounded
            );
        }
        Commands::Normalize { file } => {
            let model = load(&file);
            match normalize(&model.problem) {
                Ok(standard) => {
                    println!("{}", standard.problem);
                    if standard.negated {
                        println!("\\ objective negated from maximize");
                    }
                    for (i, offset) in standard.offsets.iter().enumerate() {
                        if *offset != 0.0 {
                            println!("\\ {} shifted by {}", model.problem.variables[i], offset);
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Normalize error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
