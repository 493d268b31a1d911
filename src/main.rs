use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use approval_axioms::axioms::{Axiom, find_violation};
use approval_axioms::budget::Budget;
use approval_axioms::cohesion::{CohesionMode, find_cohesive_groups};
use approval_axioms::error::{Error, Result};
use approval_axioms::generate::random_approval_profile;
use approval_axioms::prefix::{is_prefix_jr, load_preferences, prefix_jr_rankings};
use approval_axioms::profile::load_profile;
use approval_axioms::score::pav_score;
use approval_axioms::search::{LocalSearchConfig, find_all_satisfying, local_search, ls_pav};
use approval_axioms::validate::validate_known_profiles;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{LevelFilter, info};
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Check and search committees for JR, PJR and EJR under approval voting.
#[derive(Parser)]
#[command(version)]
struct Opts {
    /// More logging on stderr (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the bundled worked examples (fast, deterministic).
    Validate,
    /// Check one committee against JR, PJR and EJR.
    Check {
        /// Approval profile file.
        profile: PathBuf,
        /// Committee as comma-separated candidate ids.
        #[arg(long)]
        committee: String,
        /// Only check this axiom (jr, pjr or ejr).
        #[arg(long)]
        axiom: Option<Axiom>,
        #[command(flatten)]
        budget: BudgetArgs,
    },
    /// List every committee of a given size satisfying an axiom.
    Enumerate {
        /// Approval profile file.
        profile: PathBuf,
        /// Committee size.
        #[arg(long)]
        seats: usize,
        /// Axiom to satisfy (jr, pjr or ejr).
        #[arg(long, default_value = "jr")]
        axiom: Axiom,
        #[command(flatten)]
        budget: BudgetArgs,
    },
    /// Improve a committee by PAV local search (LS-PAV).
    LocalSearch {
        /// Approval profile file.
        profile: PathBuf,
        /// Committee size, seeding with the first candidates.
        #[arg(long)]
        seats: Option<usize>,
        /// Seed committee as comma-separated candidate ids.
        #[arg(long, conflicts_with = "seats")]
        from: Option<String>,
        /// Minimum PAV gain for a swap.
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,
        /// Maximum number of swaps.
        #[arg(long, default_value_t = 10_000)]
        max_iterations: usize,
    },
    /// Enumerate Prefix-JR search rankings of an ordinal profile.
    Prefix {
        /// Preference file (`voter: a > b > c`).
        preferences: PathBuf,
        /// Check this ranking (comma-separated ids) instead of enumerating.
        #[arg(long)]
        check: Option<String>,
        #[command(flatten)]
        budget: BudgetArgs,
    },
    /// List the cohesive groups deserving `ell` seats.
    Groups {
        /// Approval profile file.
        profile: PathBuf,
        /// Committee size.
        #[arg(long)]
        seats: usize,
        /// Deserved representatives.
        #[arg(long, default_value_t = 1)]
        ell: usize,
        /// Discovery mode.
        #[arg(long, value_enum, default_value_t = ModeArg::Union)]
        mode: ModeArg,
    },
    /// Print a random approval profile.
    Random {
        /// Number of voters.
        #[arg(long, default_value_t = 10)]
        voters: usize,
        /// Number of candidates.
        #[arg(long, default_value_t = 6)]
        candidates: usize,
        /// Approval probability.
        #[arg(long, default_value_t = 0.3)]
        p: f64,
        /// Deterministic seed (optional).
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args)]
struct BudgetArgs {
    /// Step limit for exponential searches.
    #[arg(long)]
    max_steps: Option<u64>,
    /// Wall-clock limit for exponential searches, in milliseconds.
    #[arg(long)]
    time_limit_ms: Option<u64>,
}

impl BudgetArgs {
    fn budget(&self) -> Budget {
        Budget {
            max_steps: self.max_steps,
            time_limit: self.time_limit_ms.map(Duration::from_millis),
            cancel: None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Union,
    Intersection,
}

impl From<ModeArg> for CohesionMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Union => CohesionMode::Union,
            ModeArg::Intersection => CohesionMode::Intersection,
        }
    }
}

fn main() {
    let opts = Opts::parse();
    init_logging(opts.verbose);

    if let Err(e) = run(opts.command) {
        eprintln!("error: {e}");
        process::exit(if e.is_exhausted() { 3 } else { 2 });
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S%.3f)} {h({l:<5})} {t} - {m}{n}",
        )))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));
    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                eprintln!("failed to initialise logging: {e}");
            }
        }
        Err(e) => eprintln!("invalid logging configuration: {e}"),
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Validate => match validate_known_profiles() {
            Ok(()) => println!("Validation OK: bundled examples give the expected verdicts."),
            Err(e) => {
                eprintln!("Validation FAILED: {e}");
                process::exit(1);
            }
        },
        Command::Check {
            profile,
            committee,
            axiom,
            budget,
        } => {
            let profile = load_profile(profile)?;
            let committee = profile.parse_committee(&committee)?;
            let axioms = axiom.map_or_else(|| Axiom::all().to_vec(), |a| vec![a]);
            let budget = budget.budget();
            println!(
                "committee {{{}}}: PAV score {:.4}",
                profile.format_committee(committee),
                pav_score(&profile, committee)
            );
            for axiom in axioms {
                match find_violation(&profile, committee, axiom, &budget)? {
                    None => println!("{axiom}: satisfied"),
                    Some(v) => println!("{axiom}: {}", v.describe(&profile)),
                }
            }
        }
        Command::Enumerate {
            profile,
            seats,
            axiom,
            budget,
        } => {
            let profile = load_profile(profile)?;
            let found = find_all_satisfying(&profile, seats, axiom, &budget.budget())?;
            println!("{} {axiom} committees of size {seats}:", found.len());
            for c in found {
                println!("  {}", profile.format_committee(c));
            }
        }
        Command::LocalSearch {
            profile,
            seats,
            from,
            threshold,
            max_iterations,
        } => {
            let profile = load_profile(profile)?;
            let config = LocalSearchConfig {
                improvement_threshold: threshold,
                max_iterations,
            };
            let outcome = match from {
                Some(seed) => local_search(&profile, profile.parse_committee(&seed)?, &config)?,
                None => {
                    let seats = seats.ok_or_else(|| Error::invalid("pass --seats or --from"))?;
                    ls_pav(&profile, seats, &config)?
                }
            };
            println!(
                "{{{}}}: PAV score {:.4} after {} swaps{}",
                profile.format_committee(outcome.committee),
                outcome.score,
                outcome.swaps,
                if outcome.converged { "" } else { " (iteration limit)" }
            );
        }
        Command::Prefix {
            preferences,
            check,
            budget,
        } => {
            let prefs = load_preferences(preferences)?;
            if let Some(ranking) = check {
                let ranking: Vec<String> = ranking.split(',').map(|s| s.trim().to_string()).collect();
                let verdict = is_prefix_jr(&prefs, &ranking)?;
                println!("{}: Prefix-JR {verdict}", ranking.join(" > "));
            } else {
                let rankings = prefix_jr_rankings(&prefs, &budget.budget())?;
                println!("{} rankings:", rankings.len());
                for r in rankings {
                    println!("  {}", r.join(" > "));
                }
            }
        }
        Command::Groups {
            profile,
            seats,
            ell,
            mode,
        } => {
            let profile = load_profile(profile)?;
            let groups = find_cohesive_groups(&profile, ell, seats, mode.into())?;
            println!("{} groups deserving {ell} of {seats} seats:", groups.len());
            for g in groups {
                let voters: Vec<&str> = g.voters.iter().map(|&v| profile.voter(v).as_str()).collect();
                println!(
                    "  {{{}}} common {} benefit {}",
                    voters.join(","),
                    profile.format_candidates(g.common),
                    profile.format_candidates(g.benefit)
                );
            }
        }
        Command::Random {
            voters,
            candidates,
            p,
            seed,
        } => {
            let seed = seed.unwrap_or_else(rand::random::<u64>);
            info!("random profile seed {seed}");
            let mut rng = SmallRng::seed_from_u64(seed);
            let profile = random_approval_profile(&mut rng, voters, candidates, p)?;
            profile.write_to(io::stdout().lock())?;
        }
    }
    Ok(())
}
