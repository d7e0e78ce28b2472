use std::path::Path;

use ccgov_core::GovernanceConfig;

pub fn init(path: &Path, store: &Path) -> anyhow::Result<()> {
    let output = path.join("ccgov.toml");
    anyhow::ensure!(!output.exists(), "{} already exists", output.display());

    let config = GovernanceConfig::scaffold(store);
    std::fs::create_dir_all(path)?;
    std::fs::write(&output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    println!("  Run `ccgov policy apply` to load its policies into the store.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_config_once() {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path(), Path::new("state.redb")).unwrap();

        let config = GovernanceConfig::from_file(&dir.path().join("ccgov.toml")).unwrap();
        assert_eq!(config.store.path, Path::new("state.redb"));
        assert_eq!(config.approval.policies.len(), 1);

        assert!(init(dir.path(), Path::new("state.redb")).is_err());
    }
}
