use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{bail, eyre, WrapErr};
use log::info;

use aomdd_rs::bucket::{BucketConfig, BucketElimination, Model, Task};
use aomdd_rs::scope::Scope;
use aomdd_rs::types::Var;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Query {
    /// Partition function.
    Pr,
    /// Value of the most probable explanation.
    Mpe,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Model file in UAI format.
    #[arg(value_name = "FILE")]
    model: PathBuf,

    /// Inference task.
    #[clap(long, value_enum, default_value = "pr")]
    task: Query,

    /// Mini-bucket i-bound (exact elimination if omitted).
    #[clap(long, value_name = "INT")]
    i_bound: Option<usize>,

    /// Elimination order as comma-separated variable ids (min-fill if omitted).
    #[clap(long, value_name = "LIST", value_delimiter = ',')]
    order: Option<Vec<u32>>,

    /// Disable garbage collection between buckets.
    #[clap(long)]
    no_gc: bool,

    /// Operation cache size (in bits).
    #[clap(long, value_name = "INT", default_value = "16")]
    cache_bits: usize,
}

/// Parse a Markov or Bayesian network in the UAI text format.
fn parse_uai(text: &str) -> color_eyre::Result<Model> {
    let mut tokens = text.split_whitespace();
    let mut next = |what: &str| {
        tokens
            .next()
            .ok_or_else(|| eyre!("Unexpected end of file, expected {}", what))
    };

    let kind = next("network type")?;
    if kind != "MARKOV" && kind != "BAYES" {
        bail!("Unsupported network type '{}'", kind);
    }

    let num_vars: usize = next("number of variables")?.parse()?;
    let mut cards = Vec::with_capacity(num_vars);
    for _ in 0..num_vars {
        cards.push(next("cardinality")?.parse::<usize>()?);
    }
    let mut model = Model::new(&cards)?;

    let num_factors: usize = next("number of functions")?.parse()?;
    let mut scopes = Vec::with_capacity(num_factors);
    for _ in 0..num_factors {
        let arity: usize = next("scope size")?.parse()?;
        let mut scope = Scope::new();
        for _ in 0..arity {
            let id: usize = next("scope variable")?.parse()?;
            let card = *cards.get(id).ok_or_else(|| eyre!("Variable {} is out of range", id))?;
            scope.add(Var::from(id), card)?;
        }
        scopes.push(scope);
    }

    for scope in scopes {
        let size: usize = next("table size")?.parse()?;
        let mut values = Vec::with_capacity(size);
        for _ in 0..size {
            values.push(next("table entry")?.parse::<f64>()?);
        }
        model.add_factor(scope, values)?;
    }
    Ok(model)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let text = std::fs::read_to_string(&args.model)
        .wrap_err_with(|| format!("Could not read {}", args.model.display()))?;
    let model = parse_uai(&text)?;
    println!(
        "Model with {} variables and {} factors, state space {}",
        model.num_vars(),
        model.factors().len(),
        model.domain().state_space()
    );

    let order: Vec<Var> = match &args.order {
        Some(ids) => ids.iter().map(|&id| Var::new(id)).collect(),
        None => {
            let time_order = std::time::Instant::now();
            let order = model.graph().min_fill_order();
            info!("Min-fill order computed in {:?}", time_order.elapsed());
            order
        }
    };

    let mut config = BucketConfig {
        i_bound: args.i_bound,
        collect_garbage: !args.no_gc,
        ..BucketConfig::default()
    };
    config.store.cache_bits = args.cache_bits;

    let task = match args.task {
        Query::Pr => Task::PartitionFunction,
        Query::Mpe => Task::MaxProduct,
    };

    let time_solve = std::time::Instant::now();
    let solution = BucketElimination::new(config).solve(&model, &order, task)?;
    let time_solve = time_solve.elapsed();

    println!("induced width = {}", solution.induced_width);
    println!(
        "buckets = {}, mini-buckets = {}",
        solution.buckets, solution.mini_buckets
    );
    println!("peak nodes = {}", solution.peak_nodes);
    match (task, args.i_bound) {
        (Task::PartitionFunction, None) => println!("Z = {}", solution.value),
        (Task::PartitionFunction, Some(_)) => println!("Z <= {}", solution.value),
        (Task::MaxProduct, None) => println!("MPE = {}", solution.value),
        (Task::MaxProduct, Some(_)) => println!("MPE <= {}", solution.value),
    }
    println!("log10 = {}", solution.value.log10());

    println!("Solved in {:.3} s", time_solve.as_secs_f64());
    println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());

    Ok(())
}
