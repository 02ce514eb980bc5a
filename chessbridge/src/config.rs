//! Engine location for the command-line front end.

use std::path::PathBuf;

/// Resolve the engine binary.
///
/// Priority:
/// 1. `--engine` on the command line
/// 2. `CHESSBRIDGE_ENGINE` env variable if set
/// 3. The first common install location that runs
pub fn engine_path(cli: Option<PathBuf>) -> Option<PathBuf> {
    engine_path_from(cli, std::env::var("CHESSBRIDGE_ENGINE").ok(), engine::find_engine_path)
}

fn engine_path_from(
    cli: Option<PathBuf>,
    env: Option<String>,
    search: impl FnOnce() -> Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = cli {
        return Some(path);
    }

    if let Some(path) = env.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }

    search()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_beats_env() {
        let path = engine_path_from(
            Some(PathBuf::from("/opt/sf")),
            Some("/usr/bin/other".to_string()),
            || None,
        );
        assert_eq!(path, Some(PathBuf::from("/opt/sf")));
    }

    #[test]
    fn test_env_beats_search() {
        let path = engine_path_from(None, Some("/usr/bin/other".to_string()), || {
            Some(PathBuf::from("/usr/games/stockfish"))
        });
        assert_eq!(path, Some(PathBuf::from("/usr/bin/other")));
    }

    #[test]
    fn test_blank_env_falls_through() {
        let path = engine_path_from(None, Some("  ".to_string()), || {
            Some(PathBuf::from("/usr/games/stockfish"))
        });
        assert_eq!(path, Some(PathBuf::from("/usr/games/stockfish")));
    }
}
