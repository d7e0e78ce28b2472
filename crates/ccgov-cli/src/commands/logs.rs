use super::{Context, Format, emit, secs};

pub fn logs(
    ctx: &Context,
    name: Option<&str>,
    channel: Option<&str>,
    limit: usize,
    format: Format,
) -> anyhow::Result<()> {
    let mut entries = match (name, channel) {
        (Some(name), Some(channel)) => ctx.log.list_for_chaincode(name, channel)?,
        _ => ctx.log.recent(limit)?,
    };
    entries.truncate(limit);

    emit(format, &entries, |entries| {
        for e in entries {
            println!(
                "{} {:<7} {:<9} {}@{} v{} seq {} by {}",
                secs(e.started_at),
                e.operation.as_str(),
                e.status.as_str(),
                e.name,
                e.channel,
                e.version,
                e.sequence,
                e.actor
            );
            if let Some(error) = &e.error {
                println!("    {error}");
            }
        }
    })
}
