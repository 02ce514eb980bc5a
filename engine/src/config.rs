//! Engine tuning and search parameters.

use crate::{EngineCommand, SearchLimit};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for engine performance tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub skill_level: Option<u8>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub nnue: Option<NnueConfig>,
}

/// NNUE evaluation network selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NnueConfig {
    pub enabled: bool,
    pub eval_file: Option<PathBuf>,
}

impl EngineConfig {
    /// `setoption` commands that apply this configuration.
    pub fn commands(&self) -> Vec<EngineCommand> {
        let mut commands = Vec::new();

        if let Some(level) = self.skill_level {
            commands.push(set_option("Skill Level", level.min(20)));
        }
        if let Some(threads) = self.threads {
            commands.push(set_option("Threads", threads.clamp(1, 16)));
        }
        if let Some(hash_mb) = self.hash_mb {
            commands.push(set_option("Hash", hash_mb.clamp(1, 2048)));
        }
        if let Some(nnue) = &self.nnue {
            commands.extend(nnue.commands());
        }

        commands
    }
}

impl NnueConfig {
    pub fn commands(&self) -> Vec<EngineCommand> {
        let mut commands = vec![set_option("Use NNUE", self.enabled)];
        if self.enabled {
            if let Some(path) = &self.eval_file {
                commands.push(set_option("EvalFile", path.display()));
            }
        }
        commands
    }
}

fn set_option(name: &str, value: impl std::fmt::Display) -> EngineCommand {
    EngineCommand::SetOption {
        name: name.to_string(),
        value: Some(value.to_string()),
    }
}

/// Search budget for one move request: a depth when positive, otherwise a
/// fixed move time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub depth: u32,
    pub move_time_ms: u64,
    pub skill_level: Option<u8>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            depth: 0,
            move_time_ms: 1000,
            skill_level: None,
        }
    }
}

impl SearchParams {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth,
            ..Default::default()
        }
    }

    pub fn move_time(move_time_ms: u64) -> Self {
        Self {
            depth: 0,
            move_time_ms,
            skill_level: None,
        }
    }

    /// Map a playing strength to engine parameters.
    pub fn from_elo(elo: u32) -> Self {
        let elo = elo as i64;
        let (skill, depth, move_time_ms) = if elo < 2000 {
            let skill = ((elo - 100) / 95).clamp(0, 20);
            let depth = match elo {
                e if e < 1000 => 1,
                e if e < 1500 => 3,
                _ => 5,
            };
            (skill, depth, 50)
        } else if elo < 2800 {
            (20, 5 + (elo - 2000) / 160, 100 + (elo - 2000) / 2)
        } else {
            (20, 10 + (elo - 2800) / 80, 500 + (elo - 2800) * 3 / 2)
        };

        Self {
            depth: depth as u32,
            move_time_ms: move_time_ms as u64,
            skill_level: Some(skill as u8),
        }
    }

    pub fn limit(&self) -> SearchLimit {
        if self.depth > 0 {
            SearchLimit::Depth(self.depth)
        } else {
            SearchLimit::MoveTime(self.move_time_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_takes_precedence() {
        let params = SearchParams {
            depth: 8,
            move_time_ms: 500,
            skill_level: None,
        };
        assert_eq!(params.limit(), SearchLimit::Depth(8));
        assert_eq!(SearchParams::move_time(300).limit(), SearchLimit::MoveTime(300));
    }

    #[test]
    fn test_from_elo_bands() {
        let novice = SearchParams::from_elo(800);
        assert_eq!(novice.depth, 1);
        assert_eq!(novice.move_time_ms, 50);
        assert_eq!(novice.skill_level, Some(7));

        let club = SearchParams::from_elo(2400);
        assert_eq!(club.depth, 7);
        assert_eq!(club.move_time_ms, 300);
        assert_eq!(club.skill_level, Some(20));

        let master = SearchParams::from_elo(3000);
        assert_eq!(master.depth, 12);
        assert_eq!(master.move_time_ms, 800);
    }

    #[test]
    fn test_from_elo_clamps_skill() {
        assert_eq!(SearchParams::from_elo(0).skill_level, Some(0));
        assert_eq!(SearchParams::from_elo(1999).skill_level, Some(19));
    }

    #[test]
    fn test_engine_config_commands_are_clamped() {
        let config = EngineConfig {
            skill_level: Some(30),
            threads: Some(64),
            hash_mb: Some(0),
            nnue: Some(NnueConfig {
                enabled: true,
                eval_file: Some(PathBuf::from("/nets/big.nnue")),
            }),
        };
        let lines: Vec<String> = config.commands().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "setoption name Skill Level value 20",
                "setoption name Threads value 16",
                "setoption name Hash value 1",
                "setoption name Use NNUE value true",
                "setoption name EvalFile value /nets/big.nnue",
            ]
        );
    }

    #[test]
    fn test_disabled_nnue_skips_eval_file() {
        let nnue = NnueConfig {
            enabled: false,
            eval_file: Some(PathBuf::from("/nets/big.nnue")),
        };
        let lines: Vec<String> = nnue.commands().iter().map(|c| c.to_string()).collect();
        assert_eq!(lines, vec!["setoption name Use NNUE value false"]);
    }
}
