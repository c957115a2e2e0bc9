//! NRL backtesting CLI
//!
//! Walk-forward evaluation of match-outcome models with point-in-time
//! features and a market-odds orientation check.

use clap::{Parser, Subcommand};
use nrl::{Config, Result};

#[derive(Parser)]
#[command(name = "nrl")]
#[command(about = "Walk-forward backtesting of NRL match predictions", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a walk-forward evaluation
    Evaluate {
        /// Match CSV to evaluate (otherwise searched under the data directory)
        #[arg(long)]
        input: Option<String>,
        /// Evaluate on generated sample data
        #[arg(long)]
        use_sample: bool,
        /// Matches to generate with --use-sample
        #[arg(long, default_value = "500")]
        n_matches: usize,
        /// Directory searched first: proc or raw
        #[arg(long, default_value = "proc")]
        prefer: String,
        /// Seasons to hold out (default: every season with enough history)
        #[arg(long, num_args = 1..)]
        test_seasons: Vec<i32>,
        /// Hold out the last N seasons with enough matches
        #[arg(long, conflicts_with = "test_seasons")]
        last_seasons: Option<usize>,
        /// Fold type: anchored or rolling
        #[arg(long, default_value = "anchored")]
        fold_type: String,
        /// Training seasons for rolling folds
        #[arg(long)]
        train_window: Option<usize>,
        /// Classifier: gbt or logistic
        #[arg(long, default_value = "gbt")]
        model: String,
        /// Skip writing artifacts
        #[arg(long)]
        no_save: bool,
        /// Artifact directory (default: <base_dir>/eval)
        #[arg(long)]
        output_dir: Option<String>,
    },
    /// Check odds orientation without modifying the data
    CheckOdds {
        /// Match CSV with closing odds
        #[arg(long)]
        input: String,
    },
    /// Generate a synthetic match CSV
    Sample {
        /// Output CSV path (default: a timestamped file under <base_dir>/proc)
        #[arg(long)]
        output: Option<String>,
        #[arg(long, default_value = "500")]
        n_matches: usize,
        #[arg(long, num_args = 1.., default_values_t = vec![2021, 2022, 2023, 2024, 2025])]
        seasons: Vec<i32>,
        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Initialize a new project with default config
    Init,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Evaluate {
            input,
            use_sample,
            n_matches,
            prefer,
            test_seasons,
            last_seasons,
            fold_type,
            train_window,
            model,
            no_save,
            output_dir,
        } => commands::evaluate(
            &config,
            commands::EvaluateArgs {
                input,
                use_sample,
                n_matches,
                prefer,
                test_seasons,
                last_seasons,
                fold_type,
                train_window,
                model,
                no_save,
                output_dir,
            },
        ),
        Commands::CheckOdds { input } => commands::check_odds(&config, &input),
        Commands::Sample {
            output,
            n_matches,
            seasons,
            seed,
        } => commands::sample(&config, output, n_matches, &seasons, seed),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use nrl::data::{generate_sample_data, validate_sample_data, DataLoader, MatchTable, Preference};
    use nrl::evaluation::artifacts::save_artifacts;
    use nrl::evaluation::folds::auto_detect_test_seasons;
    use nrl::evaluation::odds_gate::OrientationEvidence;
    use nrl::evaluation::{quick_odds_check, EvaluationHarness, EvaluationResult, FoldPolicy, OddsCheck};
    use nrl::model::{Classifier, GradientBoostedTrees, LogisticClassifier};
    use nrl::NrlError;
    use std::path::PathBuf;

    const SAMPLE_SEASONS: [i32; 5] = [2021, 2022, 2023, 2024, 2025];
    /// Matches a season needs to be picked by --last-seasons
    const MIN_MATCHES_PER_TEST_SEASON: usize = 50;

    pub struct EvaluateArgs {
        pub input: Option<String>,
        pub use_sample: bool,
        pub n_matches: usize,
        pub prefer: String,
        pub test_seasons: Vec<i32>,
        pub last_seasons: Option<usize>,
        pub fold_type: String,
        pub train_window: Option<usize>,
        pub model: String,
        pub no_save: bool,
        pub output_dir: Option<String>,
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        config.data.ensure_dirs()?;
        println!(
            "Created {}, {} and {}",
            config.data.proc_dir().display(),
            config.data.raw_dir().display(),
            config.data.eval_dir().display()
        );

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!(
            "  2. Drop match CSVs into {}",
            config.data.raw_dir().display()
        );
        println!("  3. Run 'nrl evaluate' (or 'nrl evaluate --use-sample') to backtest");

        Ok(())
    }

    fn load_table(config: &Config, args: &EvaluateArgs) -> Result<MatchTable> {
        if let Some(input) = &args.input {
            println!("Loading {}", input);
            return MatchTable::from_csv_path(input);
        }
        if args.use_sample {
            println!("Generating {} sample matches", args.n_matches);
            return Ok(generate_sample_data(
                args.n_matches,
                &SAMPLE_SEASONS,
                config.model.random_seed,
            ));
        }

        let prefer: Preference = args.prefer.parse()?;
        let loader = DataLoader::new(config.data.clone())?;
        let (table, meta) = loader.load(prefer)?;
        match &meta.path {
            Some(path) => println!("Loaded {} matches from {}", meta.n_matches, path.display()),
            None => println!("Loaded {} {} matches", meta.n_matches, meta.source),
        }
        for note in &meta.notes {
            println!("  Note: {}", note);
        }
        Ok(table)
    }

    fn run_harness<C: Classifier>(
        classifier: C,
        config: &Config,
        table: MatchTable,
        test_seasons: Option<&[i32]>,
        policy: FoldPolicy,
    ) -> Result<EvaluationResult> {
        EvaluationHarness::new(classifier, config.clone()).run(table, test_seasons, policy)
    }

    pub fn evaluate(config: &Config, args: EvaluateArgs) -> Result<()> {
        let table = load_table(config, &args)?;
        if table.is_empty() {
            return Err(NrlError::Config("no matches to evaluate".to_string()));
        }
        println!(
            "{} matches, seasons {:?}, odds: {}",
            table.len(),
            table.seasons(),
            if table.has_odds { "yes" } else { "no" }
        );

        let window = args.train_window.unwrap_or(config.evaluation.train_window);
        let policy = FoldPolicy::parse(&args.fold_type, window)?;
        let detected;
        let test_seasons = if let Some(n) = args.last_seasons {
            detected = auto_detect_test_seasons(&table.matches, MIN_MATCHES_PER_TEST_SEASON, n);
            println!("Test seasons: {:?}", detected);
            Some(detected.as_slice())
        } else if args.test_seasons.is_empty() {
            None
        } else {
            Some(args.test_seasons.as_slice())
        };

        let result = match args.model.to_lowercase().as_str() {
            "gbt" => run_harness(
                GradientBoostedTrees::from_config(&config.model),
                config,
                table,
                test_seasons,
                policy,
            )?,
            "logistic" => run_harness(
                LogisticClassifier::from_config(&config.model),
                config,
                table,
                test_seasons,
                policy,
            )?,
            other => {
                return Err(NrlError::Config(format!(
                    "unknown model '{}', expected gbt or logistic",
                    other
                )))
            }
        };

        print_summary(&result);

        if !args.no_save {
            let dir = args
                .output_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| config.data.eval_dir());
            let paths = save_artifacts(&result, &dir)?;
            println!("\nArtifacts:");
            println!("  {}", paths.predictions.display());
            println!("  {}", paths.summary.display());
            if let Some(calibration) = &paths.calibration {
                println!("  {}", calibration.display());
            }
        }

        Ok(())
    }

    fn print_summary(result: &EvaluationResult) {
        println!("\n=== Odds Orientation ===");
        match &result.odds {
            OddsCheck::Checked(report) => {
                println!("  Chosen: {}", report.chosen);
                println!("  Action: {}", report.action);
            }
            OddsCheck::Skipped => println!("  No odds columns (skipped)"),
        }

        println!("\n=== Folds ({}) ===\n", result.model_name);
        println!("{:>5} {:>8} {:>8} {:>8} {:>10}", "Fold", "Season", "Train", "Test", "Accuracy");
        println!("{}", "-".repeat(43));
        for fold in &result.fold_results {
            println!(
                "{:>5} {:>8} {:>8} {:>8} {:>9.1}%",
                fold.fold_id,
                fold.test_season,
                fold.n_train,
                fold.n_test,
                fold.accuracy * 100.0
            );
        }

        let m = &result.metrics.model_metrics;
        println!("\n=== Model Metrics ===");
        println!("  Predictions: {}", result.predictions.len());
        println!("  Features: {}", result.feature_columns.len());
        match &m.brier {
            Ok(b) => println!("  Brier: {:.4} (skill {:+.4}, base rate {:.3})", b.brier, b.brier_skill, b.base_rate),
            Err(e) => println!("  Brier: n/a ({})", e),
        }
        match &m.auc {
            Ok(a) => println!("  AUC: {:.4}", a.auc),
            Err(e) => println!("  AUC: n/a ({})", e),
        }
        match &m.accuracy {
            Ok(a) => println!("  Accuracy: {:.1}%", a.accuracy * 100.0),
            Err(e) => println!("  Accuracy: n/a ({})", e),
        }

        if let Some(market) = &result.metrics.market_metrics {
            println!("\n=== Market Metrics ===");
            match &market.clv {
                Ok(c) => println!(
                    "  CLV: mean {:+.4}, median {:+.4}, positive {:.1}% ({} matches)",
                    c.mean_clv,
                    c.median_clv,
                    c.positive_rate * 100.0,
                    c.n
                ),
                Err(e) => println!("  CLV: n/a ({})", e),
            }
            match &market.market_baseline {
                Ok(b) => println!(
                    "  Market Brier: {:.4}, correlation {:.3}, slope {}",
                    b.brier,
                    b.correlation,
                    b.slope.map(|s| format!("{:.3}", s)).unwrap_or_else(|| "n/a".to_string())
                ),
                Err(e) => println!("  Market baseline: n/a ({})", e),
            }
        }

        println!("\nPIT: {} ({})", result.pit_report.status, result.pit_report.message);
    }

    fn print_evidence(label: &str, evidence: &OrientationEvidence) {
        match &evidence.baseline {
            Ok(b) => println!(
                "{:<10} {:>6} {:>8.4} {:>8} {:>8.3} {:>8}",
                label,
                b.n,
                b.brier,
                b.slope.map(|s| format!("{:.3}", s)).unwrap_or_else(|| "n/a".to_string()),
                b.correlation,
                if evidence.healthy { "yes" } else { "no" }
            ),
            Err(e) => println!("{:<10} error: {}", label, e),
        }
    }

    pub fn check_odds(config: &Config, input: &str) -> Result<()> {
        let table = MatchTable::from_csv_path(input)?;
        if !table.has_odds {
            println!("{} has no closing odds columns", input);
            return Ok(());
        }

        let check = quick_odds_check(&table.matches, config.odds.min_rows);

        println!("\n=== Odds Orientation Check ===\n");
        println!(
            "{:<10} {:>6} {:>8} {:>8} {:>8} {:>8}",
            "", "Rows", "Brier", "Slope", "Corr", "Healthy"
        );
        println!("{}", "-".repeat(53));
        print_evidence("as-is", &check.as_is);
        print_evidence("swapped", &check.swapped);

        if check.likely_swapped {
            println!("\nOdds columns look SWAPPED; 'nrl evaluate' will fix them when odds.auto_fix is set");
        } else {
            println!("\nNo swap detected");
        }
        Ok(())
    }

    pub fn sample(
        config: &Config,
        output: Option<String>,
        n_matches: usize,
        seasons: &[i32],
        seed: u64,
    ) -> Result<()> {
        let table = generate_sample_data(n_matches, seasons, seed);
        let path = match output {
            Some(output) => {
                table.save_csv(&output)?;
                PathBuf::from(output)
            }
            None => DataLoader::new(config.data.clone())?.save_to_proc(&table, "nrl_matches")?,
        };
        println!("Wrote {} matches to {}", table.len(), path.display());

        let validation = validate_sample_data(&table);
        println!("\n=== Sample Health ===");
        println!(
            "  Market/outcome correlation: {:.3} {}",
            validation.market_outcome_correlation,
            if validation.correlation_healthy { "ok" } else { "LOW" }
        );
        println!(
            "  Home win rate: {:.1}% {}",
            validation.home_win_rate * 100.0,
            if validation.home_rate_healthy { "ok" } else { "UNUSUAL" }
        );
        println!(
            "  Favourite win rate: {:.1}% {}",
            validation.favorite_win_rate * 100.0,
            if validation.favorite_rate_healthy { "ok" } else { "UNUSUAL" }
        );
        if !validation.overall_healthy {
            log::warn!("Sample data failed health checks");
        }
        Ok(())
    }
}
