//! Minimal `server.properties` access: the one key this tool needs.

use std::fs;
use std::path::Path;

use crate::errors::ConfigError;

/// Read `level-name` from `<server_dir>/server.properties` to locate the
/// world directory. The file's presence also doubles as the check that
/// `server_dir` really is a server directory.
pub fn level_name(server_dir: &Path) -> Result<String, ConfigError> {
    let path = server_dir.join("server.properties");
    if !path.is_file() {
        return Err(ConfigError::NotAServerDir(server_dir.to_path_buf()));
    }

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        context: "reading server.properties",
        source,
    })?;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        if key.trim() == "level-name" {
            return Ok(value.trim().to_string());
        }
    }

    Err(ConfigError::MissingLevelName(path))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_properties(dir: &TempDir, content: &str) {
        fs::write(dir.path().join("server.properties"), content).unwrap();
    }

    #[test]
    fn reads_level_name() {
        let dir = TempDir::new().unwrap();
        write_properties(
            &dir,
            "#Minecraft server properties\nmotd=A Server\nlevel-name=world_main\nmax-players=20\n",
        );
        assert_eq!(level_name(dir.path()).unwrap(), "world_main");
    }

    #[test]
    fn tolerates_whitespace_and_comments() {
        let dir = TempDir::new().unwrap();
        write_properties(&dir, "# comment\n  level-name = skyblock  \n");
        assert_eq!(level_name(dir.path()).unwrap(), "skyblock");
    }

    #[test]
    fn missing_file_means_not_a_server_dir() {
        let dir = TempDir::new().unwrap();
        let err = level_name(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotAServerDir(_)));
    }

    #[test]
    fn missing_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_properties(&dir, "motd=A Server\n");
        let err = level_name(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingLevelName(_)));
    }
}
