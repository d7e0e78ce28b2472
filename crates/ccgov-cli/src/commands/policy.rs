use ccgov_pipeline::apply_config;
use serde_json::json;

use super::{Context, Format, emit};

pub fn apply(ctx: &Context, format: Format) -> anyhow::Result<()> {
    let applied = apply_config(&ctx.config, &ctx.approvals, &ctx.tests)?;
    emit(format, &json!({
        "policies": applied.policies,
        "test_configurations": applied.test_configurations,
    }), |_| {
        println!(
            "✓ Applied {} approval policies and {} test configurations",
            applied.policies, applied.test_configurations
        );
    })
}

pub fn show(ctx: &Context, format: Format) -> anyhow::Result<()> {
    let policies = ctx.approvals.policies()?;
    let configurations = ctx.tests.configurations()?;
    let gate = ctx.tests.gate_test_type();
    emit(format, &json!({
        "policies": policies,
        "test_configurations": configurations,
        "gate_test_type": gate,
    }), |_| {
        if policies.is_empty() {
            println!("No approval policies; every stage is ungated.");
        }
        for p in &policies {
            println!(
                "{:<8} {} approval(s), expires after {}h{}",
                p.operation.as_str(),
                p.required_approvals,
                p.expiration_secs / 3600,
                if p.active { "" } else { " (inactive)" }
            );
        }
        for c in &configurations {
            let marker = if c.test_type == gate { " [gate]" } else { "" };
            println!(
                "tests {:<12} required={} timeout={}s{marker}",
                c.test_type, c.required_to_pass, c.timeout_secs
            );
        }
    })
}
