use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use api_test_runner::collection::CollectionLoader;
use api_test_runner::prelude::*;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "api-test-runner")]
#[command(about = "Run declarative API test collections", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a collection
    Run {
        /// Path to the collection file
        #[arg(short, long, value_name = "FILE")]
        collection: PathBuf,

        /// Test mode
        #[arg(short, long, value_enum, default_value_t = ModeArg::Full)]
        mode: ModeArg,

        /// Environment name (looked up in --env-dir) or file path
        #[arg(short, long, value_name = "NAME|FILE")]
        env: Option<String>,

        /// Directory holding named environments
        #[arg(long, value_name = "DIR", default_value = "environments")]
        env_dir: PathBuf,

        /// Path to runner.yaml (default: runner.yaml next to the collection)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Number of iterations (overrides mode and config)
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        /// Stop at the first failed request
        #[arg(short, long)]
        bail: bool,

        /// Delay between requests in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Write JSON and JUnit reports into this directory
        #[arg(long, value_name = "DIR")]
        report_dir: Option<PathBuf>,

        /// Override an environment variable
        #[arg(long = "env-var", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        env_vars: Vec<(String, String)>,
    },

    /// List folders and requests in a collection
    List {
        /// Path to the collection file
        #[arg(short, long, value_name = "FILE")]
        collection: PathBuf,
    },

    /// Validate collection and environment files without running them
    Validate {
        /// Files to validate
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Smoke,
    Full,
    Performance,
}

impl From<ModeArg> for TestMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Smoke => TestMode::Smoke,
            ModeArg::Full => TestMode::Full,
            ModeArg::Performance => TestMode::Performance,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "api_test_runner=debug"
    } else {
        "api_test_runner=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(success) => {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run {
            collection,
            mode,
            env,
            env_dir,
            config,
            iterations,
            bail,
            delay_ms,
            timeout_ms,
            report_dir,
            env_vars,
        } => {
            let overrides = Overrides {
                iterations,
                bail,
                delay_ms,
                timeout_ms,
            };
            run_collection(
                &collection,
                mode.into(),
                env.as_deref(),
                &env_dir,
                config,
                overrides,
                report_dir,
                env_vars.into_iter().collect(),
                cli.verbose,
            )
            .await
        }
        Commands::List { collection } => list_collection(&collection),
        Commands::Validate { paths } => validate(&paths),
    }
}

/// Command-line overrides, applied last
struct Overrides {
    iterations: Option<u32>,
    bail: bool,
    delay_ms: Option<u64>,
    timeout_ms: Option<u64>,
}

impl Overrides {
    fn apply(&self, options: &mut RunOptions) {
        if let Some(iterations) = self.iterations {
            options.iterations = iterations;
        }
        if self.bail {
            options.bail = true;
        }
        if let Some(delay_ms) = self.delay_ms {
            options.delay_ms = delay_ms;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            options.timeout_ms = timeout_ms;
        }
    }
}

#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip_all, fields(collection = %collection_path.display(), mode = %mode))]
async fn run_collection(
    collection_path: &Path,
    mode: TestMode,
    env_selector: Option<&str>,
    env_dir: &Path,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    report_dir: Option<PathBuf>,
    env_vars: HashMap<String, String>,
    verbose: bool,
) -> anyhow::Result<bool> {
    if !collection_path.exists() {
        anyhow::bail!("Collection file not found: {}", collection_path.display());
    }

    let collection = CollectionLoader::load_collection(collection_path)?;

    let mut env = match env_selector {
        Some(selector) => {
            let path = CollectionLoader::resolve_environment(selector, env_dir)?;
            CollectionLoader::load_environment(&path)?
        }
        None => Environment::new(),
    };
    env.merge(&env_vars);

    let config_file = config_path.or_else(|| {
        let default = collection_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("runner.yaml");
        default.exists().then_some(default)
    });
    let config = match &config_file {
        Some(path) => {
            println!("Using config: {}", path.display());
            RunnerConfig::load(path)?
        }
        None => RunnerConfig::default(),
    };

    let (mut options, warnings) = config.options_for(mode);
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    overrides.apply(&mut options);

    println!(
        "Running collection: {} ({} mode, {} iteration(s))\n",
        collection.name, mode, options.iterations
    );

    let mut sink = MultiSink::new().with(ConsoleSink::stdout().verbose(verbose));
    if let Some(dir) = report_dir {
        sink = sink
            .with(JsonFileSink::new(dir.clone()))
            .with(JunitSink::new(dir));
    }

    let mut sequencer = RunSequencer::new(sink);
    let summary = sequencer.run(&collection, &mut env, &options).await?;

    Ok(summary.state == RunState::Completed)
}

fn list_collection(path: &Path) -> anyhow::Result<bool> {
    if !path.exists() {
        anyhow::bail!("Collection file not found: {}", path.display());
    }

    let collection = CollectionLoader::load_collection(path)?;

    println!("Collection: {}", collection.name);
    if let Some(description) = &collection.description {
        println!("{}", description);
    }
    println!();

    for folder in &collection.folders {
        println!("  {} ({} requests)", folder.name, folder.requests.len());
        for request in &folder.requests {
            println!(
                "    {} {} {} ({} assertions)",
                request.method.to_uppercase(),
                request.name,
                request.url,
                request.assertions.len()
            );
        }
    }

    println!(
        "\n{} folders, {} requests",
        collection.folders.len(),
        collection.request_count()
    );
    Ok(true)
}

fn validate(paths: &[PathBuf]) -> anyhow::Result<bool> {
    let mut invalid = 0;

    for path in paths {
        match validate_file(path) {
            Ok(kind) => println!("✓ {} is a valid {}", path.display(), kind),
            Err(e) => {
                invalid += 1;
                println!("✗ {}: {}", path.display(), e);
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} files are invalid", invalid, paths.len());
    }
    Ok(true)
}

/// Collections are recognised by their `folders` key
fn validate_file(path: &Path) -> anyhow::Result<&'static str> {
    let document = CollectionLoader::read_document(path)?;

    if document.get("folders").is_some() {
        CollectionLoader::collection_from_value(document, &path.display().to_string())?;
        Ok("collection")
    } else {
        CollectionLoader::environment_from_value(document, path)?;
        Ok("environment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_detects_kind() {
        let dir = tempfile::tempdir().unwrap();
        let collection = dir.path().join("collection.yaml");
        std::fs::write(
            &collection,
            "name: c\nfolders:\n  - name: A\n    requests:\n      - name: r\n        url: http://x\n        assertions:\n          - status: 200\n",
        )
        .unwrap();
        let env = dir.path().join("dev.yaml");
        std::fs::write(&env, "base_url: http://localhost:8080\n").unwrap();

        assert_eq!(validate_file(&collection).unwrap(), "collection");
        assert_eq!(validate_file(&env).unwrap(), "environment");
    }

    #[test]
    fn test_validate_file_reports_loader_errors() {
        let dir = tempfile::tempdir().unwrap();
        let typo = dir.path().join("typo.yaml");
        std::fs::write(
            &typo,
            "name: c\nfolders:\n  - name: A\n    requests:\n      - name: r\n        url: http://x\n        asserts:\n          - status: 200\n",
        )
        .unwrap();
        let err = validate_file(&typo).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Parse { .. })
        ));

        let missing = dir.path().join("missing.yaml");
        let err = validate_file(&missing).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("base_url=http://localhost:8080/a=b").unwrap(),
            ("base_url".to_string(), "http://localhost:8080/a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_overrides_apply_last() {
        let (mut options, _) = RunnerConfig::default().options_for(TestMode::Performance);
        Overrides {
            iterations: Some(2),
            bail: true,
            delay_ms: None,
            timeout_ms: Some(500),
        }
        .apply(&mut options);

        assert_eq!(options.iterations, 2);
        assert!(options.bail);
        assert_eq!(options.delay_ms, 250);
        assert_eq!(options.timeout_ms, 500);
    }
}
