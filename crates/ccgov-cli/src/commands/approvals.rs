use ccgov_core::LifecycleStage;
use ccgov_pipeline::RequestFilter;
use ccgov_state::{ApprovalRequest, ApprovalStatus, RequestId, VersionId, VoteDecision};
use serde_json::json;

use super::{Context, Format, emit, secs};

fn line(r: &ApprovalRequest) -> String {
    format!(
        "{}  {:<7} {:<8} version {} requested by {} at {}",
        r.id,
        r.operation.as_str(),
        r.status.as_str(),
        r.version_id,
        r.requested_by,
        secs(r.requested_at)
    )
}

pub fn create(
    ctx: &Context,
    version_id: VersionId,
    operation: LifecycleStage,
    requester: &str,
    reason: Option<&str>,
    format: Format,
) -> anyhow::Result<()> {
    let id = ctx
        .approvals
        .create_request(version_id, operation, requester, reason)?;
    let request = ctx.approvals.request(id)?;
    emit(format, &request, |r| {
        println!("✓ Opened approval request {}", r.id);
        println!(
            "  needs {} approval(s){}",
            r.required_approvals,
            r.expires_at
                .map(|at| format!(", expires at {}", secs(at)))
                .unwrap_or_default()
        );
    })
}

pub fn vote(
    ctx: &Context,
    request_id: RequestId,
    approver: &str,
    decision: VoteDecision,
    comment: Option<&str>,
    format: Format,
) -> anyhow::Result<()> {
    let outcome = ctx.approvals.vote(request_id, approver, decision, comment)?;
    emit(format, &outcome, |o| {
        println!(
            "✓ Recorded {} from {approver}: {} approve / {} reject of {} required",
            decision.as_str(),
            o.approvals,
            o.rejections,
            o.required
        );
        if o.decided {
            println!("  request is now {}", o.request.status);
        }
    })
}

pub fn show(ctx: &Context, request_id: RequestId, format: Format) -> anyhow::Result<()> {
    let request = ctx.approvals.request(request_id)?;
    let votes = ctx.approvals.votes(request_id)?;
    emit(format, &json!({ "request": request, "votes": votes }), |_| {
        println!("{}", line(&request));
        if let Some(reason) = &request.reason {
            println!("  reason: {reason}");
        }
        for v in &votes {
            let comment = v.comment.as_deref().unwrap_or("");
            println!("  {:<7} {} {comment}", v.decision.as_str(), v.approver);
        }
    })
}

pub fn list(
    ctx: &Context,
    version_id: Option<VersionId>,
    operation: Option<LifecycleStage>,
    pending_only: bool,
    format: Format,
) -> anyhow::Result<()> {
    let filter = RequestFilter {
        status: pending_only.then_some(ApprovalStatus::Pending),
        operation,
        requested_by: None,
        version_id,
    };
    let requests = ctx.approvals.list_requests(&filter)?;
    emit(format, &requests, |requests| {
        for r in requests {
            println!("{}", line(r));
        }
    })
}
