use ccgov_pipeline::{CaseReport, GateVerdict};
use ccgov_state::{SuiteId, TestSuite, VersionId};
use serde_json::json;

use super::{Context, Format, emit};

fn line(s: &TestSuite) -> String {
    format!(
        "{}  {:<12} {:<8} {} passed / {} failed / {} skipped of {}",
        s.id,
        s.test_type,
        s.status.as_str(),
        s.passed,
        s.failed,
        s.skipped,
        s.total
    )
}

pub fn run(
    ctx: &Context,
    version_id: VersionId,
    test_type: &str,
    triggered_by: Option<&str>,
    format: Format,
) -> anyhow::Result<()> {
    let id = ctx.tests.run_suite(version_id, test_type, triggered_by)?;
    let suite = ctx.tests.suite(id)?;
    emit(format, &suite, |s| {
        println!("✓ Started {} suite {}", s.test_type, s.id);
    })
}

pub fn record(
    ctx: &Context,
    suite_id: SuiteId,
    report: &CaseReport,
    format: Format,
) -> anyhow::Result<()> {
    let suite = ctx.tests.record_case(suite_id, report)?;
    emit(format, &suite, |s| println!("{}", line(s)))
}

pub fn skip(ctx: &Context, suite_id: SuiteId, reason: &str, format: Format) -> anyhow::Result<()> {
    let suite = ctx.tests.skip_suite(suite_id, reason)?;
    emit(format, &suite, |s| println!("✓ Skipped suite {}", s.id))
}

pub fn show(ctx: &Context, suite_id: SuiteId, format: Format) -> anyhow::Result<()> {
    let suite = ctx.tests.suite(suite_id)?;
    let cases = ctx.tests.cases(suite_id)?;
    emit(format, &json!({ "suite": suite, "cases": cases }), |_| {
        println!("{}", line(&suite));
        for c in &cases {
            println!("  {:<8} {}", c.status.as_str(), c.name);
            if let Some(error) = &c.error {
                println!("           {error}");
            }
        }
    })
}

pub fn gate(ctx: &Context, version_id: VersionId, format: Format) -> anyhow::Result<()> {
    let gate_type = ctx.tests.gate_test_type().to_string();
    let mandatory = ctx.tests.is_mandatory(&gate_type)?;
    let verdict = ctx.tests.gate_verdict(version_id, &gate_type)?;
    let value = match &verdict {
        GateVerdict::Satisfied => json!({
            "test_type": gate_type,
            "mandatory": mandatory,
            "satisfied": true,
        }),
        GateVerdict::Blocked {
            suite_id,
            failed_cases,
            status,
        } => json!({
            "test_type": gate_type,
            "mandatory": mandatory,
            "satisfied": false,
            "suite_id": suite_id,
            "failed_cases": failed_cases,
            "status": status,
        }),
    };
    emit(format, &value, |_| {
        let scope = if mandatory { "mandatory" } else { "advisory" };
        match &verdict {
            GateVerdict::Satisfied => println!("✓ {gate_type} gate ({scope}) satisfied"),
            GateVerdict::Blocked { .. } => {
                println!("✗ {gate_type} gate ({scope}) blocked");
                if let Err(err) = verdict.clone().into_result() {
                    println!("  {err}");
                }
            }
        }
    })
}
