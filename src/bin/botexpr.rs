use botexpr::{
    analyzer, config::EngineConfig, tokenizer::Lexer, Error, ExpressionFactory, Namespace,
    OperationCatalog, ResourcePool, ValueType,
};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tokens of an expression
    Tokens { expression: String },

    /// Print the syntax tree of an expression
    Parse { expression: String },

    /// Compile and evaluate an expression against the built-in catalog
    Eval {
        expression: String,

        /// Expected result type (Any, Bool, Int, Long, Double, String, List)
        #[arg(short = 't', long = "type", default_value = "Any")]
        ty: ValueType,

        /// Active provider name
        #[arg(long)]
        controller: Option<String>,
    },
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Tokens { expression } => {
            for span in Lexer::new(&expression).tokenize()? {
                println!("{:>4}..{:<4} {}", span.start, span.end, span.token);
            }
        }
        Commands::Parse { expression } => {
            println!("{}", analyzer::parse(&expression)?);
        }
        Commands::Eval {
            expression,
            ty,
            controller,
        } => {
            let config = EngineConfig::load(cli.config.as_deref())?;
            debug!("Snippet cache at {}", config.snippet.cache_dir.display());
            let factory = ExpressionFactory::new(Arc::new(OperationCatalog::new()), config);
            let namespace = match controller {
                Some(controller) => Namespace::new().with_controller(controller),
                None => Namespace::new(),
            };
            let value = factory.create_value(&expression, ty, &namespace)?;
            println!("{}", value.generate(&ResourcePool::new())?);
        }
    }
    Ok(())
}

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
