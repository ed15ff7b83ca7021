//! Locally persisted player identity, preferred difficulty and scores.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::board::Symbol;
use crate::error::ProfileError;
use crate::game::Conclusion;
use crate::opponent::Difficulty;
use crate::remote::model::PlayerId;

pub const DEFAULT_PLAYER_NAME: &str = "Player";

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Scores {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl Scores {
    /// Counts a finished offline game from the point of view of `human`.
    pub fn record(&mut self, conclusion: Conclusion, human: Symbol) {
        match conclusion {
            Conclusion::Win { player, .. } if player == human => self.wins += 1,
            Conclusion::Win { .. } => self.losses += 1,
            Conclusion::Draw => self.draws += 1,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub player_id: PlayerId,
    pub player_name: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub scores: Scores,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            player_id: Uuid::new_v4().to_string(),
            player_name: DEFAULT_PLAYER_NAME.to_string(),
            difficulty: Difficulty::default(),
            scores: Scores::default(),
        }
    }
}

impl Profile {
    /// Reads the profile at `path`, creating it with a fresh player id if
    /// there is none yet. The id never changes once written.
    pub fn load_or_create(path: &Path) -> Result<Self, ProfileError> {
        match fs::read(path) {
            Ok(bytes) => ron::de::from_bytes(&bytes).map_err(ProfileError::Decode),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let profile = Profile::default();
                info!(path = %path.display(), player_id = %profile.player_id, "creating profile");
                profile.save(path)?;
                Ok(profile)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ProfileError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ProfileError::Encode)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        Ok(())
    }
}
