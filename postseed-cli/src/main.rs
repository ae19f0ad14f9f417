//! postseed CLI - seed a user with posts and list them back
//!
//! Subcommands:
//! - `run`: seed then list (the full flow)
//! - `seed`: seed only, prints the new user id
//! - `posts`: list the posts of an existing user
//! - `queries`: show the loaded query names

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use postseed_core::workflow::REQUIRED_QUERIES;
use postseed_core::{write_posts, PgDatabase, QueryStore, SeedOutcome, UserId, Workflow};
use tracing::info;

mod config;
mod tracing_setup;

const DEFAULT_EMAIL: &str = "jon@calhoun.io";

#[derive(Parser, Debug)]
#[command(
    name = "postseed",
    author,
    version,
    about = "Seed a PostgreSQL database with a user and posts, then list them"
)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    /// Load *.sql queries from this directory instead of the bundled ones
    #[arg(long, value_name = "DIR", global = true)]
    queries: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seed a user with ten posts, then print that user's posts
    Run(SeedArgs),
    /// Seed a user with ten posts and print the user id
    Seed(SeedArgs),
    /// Print the posts of an existing user
    Posts(PostsArgs),
    /// List the names of the loaded queries
    Queries,
}

#[derive(Args, Debug)]
struct SeedArgs {
    /// Email of the user to create
    #[arg(long, default_value = DEFAULT_EMAIL)]
    email: String,

    /// Upsert the user and skip posts that already exist (safe to re-run)
    #[arg(long)]
    idempotent: bool,
}

#[derive(Args, Debug)]
struct PostsArgs {
    /// Id of the user whose posts to print
    #[arg(long, value_name = "ID")]
    user_id: i64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let dotenv = config::load_dotenv();
    let cli = Cli::parse();
    if let Err(err) = tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }) {
        eprintln!("warning: logging disabled: {err:#}");
    }
    dotenv.log();

    let queries = config::load_queries(cli.queries.as_deref())?;

    match cli.command {
        Commands::Queries => run_queries(&queries)?,
        Commands::Run(args) => {
            let db = connect(cli.database_url, &queries).await?;
            let workflow = Workflow::new(&queries, &db)?;
            let outcome = seed(&workflow, &args).await?;
            print_posts(&workflow, outcome.user_id).await?;
            db.close().await;
        }
        Commands::Seed(args) => {
            let db = connect(cli.database_url, &queries).await?;
            let workflow = Workflow::new(&queries, &db)?;
            let outcome = seed(&workflow, &args).await?;
            println!("{}", outcome.user_id);
            db.close().await;
        }
        Commands::Posts(args) => {
            let db = connect(cli.database_url, &queries).await?;
            let workflow = Workflow::new(&queries, &db)?;
            print_posts(&workflow, UserId(args.user_id)).await?;
            db.close().await;
        }
    }
    Ok(())
}

/// Check the queries first so a bad query set never opens a connection.
async fn connect(database_url: Option<String>, queries: &QueryStore) -> Result<PgDatabase> {
    queries.validate(&REQUIRED_QUERIES)?;
    let url = config::database_url(database_url)?;
    Ok(PgDatabase::connect(&url).await?)
}

async fn seed(workflow: &Workflow<'_, PgDatabase>, args: &SeedArgs) -> Result<SeedOutcome> {
    let outcome = if args.idempotent {
        workflow.seed_idempotent(&args.email).await
    } else {
        workflow.seed(&args.email).await
    }
    .context("seed")?;

    info!(
        "seeded {} as user {} ({} new posts)",
        args.email,
        outcome.user_id,
        outcome.post_ids.len()
    );
    Ok(outcome)
}

async fn print_posts(workflow: &Workflow<'_, PgDatabase>, user_id: UserId) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = write_posts(workflow.list_posts(user_id), &mut out).await?;
    info!("printed {} posts for user {}", written, user_id);
    Ok(())
}

fn run_queries(queries: &QueryStore) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in queries.names() {
        writeln!(out, "{name}")?;
    }
    Ok(())
}
