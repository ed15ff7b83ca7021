use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tic_tac_toe::board::Symbol;
use tic_tac_toe::offline::{OfflineConfig, OfflineMatch};
use tic_tac_toe::opponent::Difficulty;
use tic_tac_toe::profile::Profile;
use tic_tac_toe::term;

#[derive(Parser)]
#[command(name = "tic-tac-toe", about = "Play tic-tac-toe against the computer")]
struct Cli {
    /// Where the player profile (id, name, difficulty, scores) is kept
    #[arg(long, default_value = ".tic-tac-toe/profile.ron", env = "TTT_PROFILE")]
    profile: PathBuf,

    /// Change the stored display name
    #[arg(long, env = "TTT_NAME")]
    name: Option<String>,

    /// Change the stored difficulty
    #[arg(short, long, value_enum, env = "TTT_DIFFICULTY")]
    difficulty: Option<Difficulty>,

    /// How long the computer "thinks" before moving, in milliseconds
    #[arg(long, default_value = "600", env = "TTT_THINK_MS")]
    think_ms: u64,

    /// Let the computer open the game
    #[arg(long)]
    computer_first: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut profile = Profile::load_or_create(&cli.profile)?;
    let mut changed = false;
    if let Some(name) = cli.name {
        profile.player_name = name;
        changed = true;
    }
    if let Some(difficulty) = cli.difficulty {
        profile.difficulty = difficulty;
        changed = true;
    }
    if changed {
        profile.save(&cli.profile)?;
    }
    tracing::info!(
        player = %profile.player_name,
        difficulty = ?profile.difficulty,
        "starting offline game"
    );

    let human = if cli.computer_first { Symbol::O } else { Symbol::X };
    let mut offline = OfflineMatch::new(OfflineConfig {
        difficulty: profile.difficulty,
        think_delay: Duration::from_millis(cli.think_ms),
        human,
    });

    if let Some(conclusion) = term::play(&mut offline).await? {
        profile.scores.record(conclusion, human);
        profile.save(&cli.profile)?;
        let scores = profile.scores;
        println!(
            "{}: {} won, {} lost, {} drawn",
            profile.player_name, scores.wins, scores.losses, scores.draws
        );
    }

    Ok(())
}
