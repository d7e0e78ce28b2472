use ccgov_pipeline::RollbackRequest;
use ccgov_state::{OperationId, RollbackOperation};
use serde_json::json;

use super::{Context, Format, emit};

fn line(op: &RollbackOperation) -> String {
    format!(
        "{}  {}@{} {} (seq {}) -> {} (seq {}) [{}]",
        op.id,
        op.name,
        op.channel,
        op.from_version,
        op.from_sequence,
        op.to_version,
        op.to_sequence,
        op.status.as_str()
    )
}

pub fn create(ctx: &Context, request: &RollbackRequest, format: Format) -> anyhow::Result<()> {
    let id = ctx.rollbacks.create_rollback(request)?;
    let op = ctx.rollbacks.operation(id)?;
    emit(format, &op, |op| {
        println!("✓ Created rollback {}", op.id);
        println!("  {}", line(op));
    })
}

pub fn execute(
    ctx: &Context,
    operation_id: OperationId,
    executor: &str,
    format: Format,
) -> anyhow::Result<()> {
    let op = ctx.rollbacks.execute_rollback(operation_id, executor)?;
    emit(format, &op, |op| {
        println!(
            "✓ Rolled back {} to {} in {}ms",
            op.name,
            op.to_version,
            op.duration_ms.unwrap_or(0)
        );
        println!(
            "  Channel definition is unchanged at sequence {}; commit {} with a higher sequence to re-assert it.",
            op.from_sequence, op.to_version
        );
    })
}

pub fn cancel(
    ctx: &Context,
    operation_id: OperationId,
    actor: &str,
    format: Format,
) -> anyhow::Result<()> {
    let op = ctx.rollbacks.cancel_rollback(operation_id, actor)?;
    emit(format, &op, |op| println!("✓ Cancelled rollback {}", op.id))
}

pub fn fail(
    ctx: &Context,
    operation_id: OperationId,
    actor: &str,
    reason: &str,
    format: Format,
) -> anyhow::Result<()> {
    let op = ctx.rollbacks.fail_rollback(operation_id, actor, reason)?;
    emit(format, &op, |op| {
        println!("✓ Marked rollback {} failed", op.id);
        println!("  {}", line(op));
    })
}

pub fn show(ctx: &Context, operation_id: OperationId, format: Format) -> anyhow::Result<()> {
    let op = ctx.rollbacks.operation(operation_id)?;
    let history = ctx.rollbacks.history(operation_id)?;
    emit(format, &json!({ "operation": op, "history": history }), |_| {
        println!("{}", line(&op));
        println!("  reason: {}", op.reason);
        if let Some(error) = &op.error {
            println!("  error: {error}");
        }
        for h in &history {
            println!(
                "  {:>2}. {} {}: {} -> {}",
                h.ordinal,
                h.version_id,
                h.stage.as_str(),
                h.previous_status,
                h.new_status
            );
        }
    })
}
