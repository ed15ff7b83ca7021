use std::str::FromStr;

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::board::TileId;
use crate::error::RulesError;
use crate::game::{Conclusion, State};
use crate::offline::OfflineMatch;

/// Plays one offline game on stdin/stdout. Returns `None` if stdin closed
/// before the game finished.
pub async fn play(offline: &mut OfflineMatch) -> anyhow::Result<Option<Conclusion>> {
    let human = offline.config().human;
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    offline.start().await;
    let conclusion = 'done: loop {
        if let Some(position) = offline.computer_move().await {
            println!("computer marks {}", tile_name(position));
        }

        let game = offline.snapshot().await;
        println!("\n{}\n", game.board());

        match game.state() {
            State::Concluded(conclusion) => break 'done conclusion,
            State::Playing(turn) if turn != human => {
                offline.resume().await;
                continue;
            }
            State::Playing(_) => {}
        }

        let tile = loop {
            stdout.write_all(format!("{human}'s turn: ").as_bytes()).await?;
            stdout.flush().await?;
            let Some(input) = lines.next_line().await? else {
                return Ok(None);
            };
            match TileId::from_str(input.trim()) {
                Ok(tile) => break tile,
                Err(()) => println!("Invalid input! Try again."),
            }
        };

        match offline.play(tile.index()).await {
            Ok(_) => {}
            Err(RulesError::InvalidMove(_)) => {
                println!("Invalid tile! Tile already marked. Try again.")
            }
            Err(e @ RulesError::NotYourTurn(_)) => println!("{e}"),
            Err(RulesError::GameOver) => {}
        }
    };

    match conclusion {
        Conclusion::Win { player, .. } if player == human => println!("You won!"),
        Conclusion::Win { player, .. } => println!("{player} won!"),
        Conclusion::Draw => println!("Draw."),
    };
    Ok(Some(conclusion))
}

fn tile_name(position: usize) -> String {
    TileId::new(position).map_or_else(|| position.to_string(), |tile| tile.to_string())
}
