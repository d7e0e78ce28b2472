use ccgov_state::{ChaincodeVersion, VersionId};
use serde_json::json;

use super::{Context, Format, emit};

fn line(v: &ChaincodeVersion) -> String {
    format!(
        "{}  {:<12} seq {:<3} install={} approve={} commit={} [{}]",
        v.id,
        v.version,
        v.sequence,
        v.install.status.as_str(),
        v.approve.status.as_str(),
        v.commit.status.as_str(),
        v.activation.as_str()
    )
}

pub fn history(ctx: &Context, name: &str, channel: &str, format: Format) -> anyhow::Result<()> {
    let versions = ctx.registry.get_version_history(name, channel)?;
    emit(format, &versions, |versions| {
        if versions.is_empty() {
            println!("No versions of {name} on {channel}");
        }
        for v in versions {
            println!("{}", line(v));
        }
    })
}

pub fn latest(ctx: &Context, name: &str, channel: &str, format: Format) -> anyhow::Result<()> {
    let latest = ctx.registry.get_latest_version(name, channel)?;
    let active = ctx.registry.get_active_version(name, channel)?;
    emit(format, &json!({ "latest": latest, "active": active }), |_| {
        match &latest {
            Some(v) => println!("latest  {}", line(v)),
            None => println!("latest  -"),
        }
        match &active {
            Some(v) => println!("active  {}", line(v)),
            None => println!("active  -"),
        }
    })
}

pub fn retire(ctx: &Context, id: VersionId, actor: &str, format: Format) -> anyhow::Result<()> {
    let version = ctx.registry.retire_version(id, actor)?;
    emit(format, &version, |v| {
        println!("✓ Retired {} {} (seq {})", v.name, v.version, v.sequence);
    })
}

pub fn compare(ctx: &Context, from: VersionId, to: VersionId, format: Format) -> anyhow::Result<()> {
    let comparison = ctx.catalog.compare_version_ids(from, to)?;
    emit(format, &comparison, |c| {
        println!("{}", c.summary);
        println!(
            "  breaking changes: {}  new features: {}  bug fixes: {}",
            c.breaking_changes, c.new_features, c.bug_fixes
        );
    })
}
