//! `agentcontract init` command.

use std::fs;
use std::path::Path;

use crate::contract::{CONFIG_FILE, STARTER_CONFIG};
use crate::{Error, Result};

/// Write a starter `agentcontract.yml` into `dir`, refusing to overwrite.
///
/// # Errors
///
/// [`Error::AlreadyExists`] if the file is present, [`Error::Io`] if the
/// write fails.
pub fn run(dir: &Path) -> Result<()> {
    let target = dir.join(CONFIG_FILE);
    if target.exists() {
        return Err(Error::AlreadyExists(target));
    }
    fs::write(&target, STARTER_CONFIG).map_err(|source| Error::Io {
        path: target.clone(),
        source,
    })?;
    println!("Created {}", target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_once_then_refuses() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join(CONFIG_FILE);
        run(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&config).unwrap(), STARTER_CONFIG);

        fs::write(&config, "custom").unwrap();
        assert!(matches!(run(dir.path()), Err(Error::AlreadyExists(_))));
        assert_eq!(fs::read_to_string(&config).unwrap(), "custom");
    }
}
