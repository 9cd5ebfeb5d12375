//! Fixed-delta MMR rule

use crate::config::MmrSettings;
use crate::matches::store::PlayerStats;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmrRule {
    pub starting_mmr: i64,
    pub win_gain: i64,
    pub loss_penalty: i64,
    pub floor: i64,
}

impl Default for MmrRule {
    fn default() -> Self {
        Self::from(&MmrSettings::default())
    }
}

impl From<&MmrSettings> for MmrRule {
    fn from(settings: &MmrSettings) -> Self {
        Self {
            starting_mmr: settings.starting_mmr,
            win_gain: settings.win_gain,
            loss_penalty: settings.loss_penalty,
            floor: settings.floor,
        }
    }
}

impl MmrRule {
    /// Stats for a player seen for the first time
    pub fn new_player(&self, id: &str, name: &str) -> PlayerStats {
        PlayerStats::new(id, name, self.starting_mmr)
    }

    /// Apply one result to a player's stats
    pub fn apply(&self, stats: &mut PlayerStats, won: bool) {
        if won {
            stats.mmr += self.win_gain;
            stats.wins += 1;
        } else {
            stats.mmr = (stats.mmr - self.loss_penalty).max(self.floor);
            stats.losses += 1;
        }
        stats.matches += 1;
        stats.last_updated = Utc::now();
    }
}
