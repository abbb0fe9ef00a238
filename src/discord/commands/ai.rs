use crate::ai::{ReplyTarget, RequestKind, RequestQueueEntry};
use crate::discord::commands::{Context, Error};

const HOURGLASS: char = '\u{231b}';

async fn enqueue(ctx: Context<'_>, payload: String, kind: RequestKind) -> Result<(), Error> {
    let poise::Context::Prefix(prefix) = ctx else {
        return Ok(());
    };
    let origin = ReplyTarget {
        channel_id: prefix.msg.channel_id.get(),
        message_id: prefix.msg.id.get(),
    };
    let entry = RequestQueueEntry::new(ctx.author().id.get(), ctx.author().name.clone(), payload, kind, origin);

    let position = ctx.data().queue.enqueue(entry).await?;
    tracing::info!("Queued {:?} request from {} at position {}", kind, ctx.author().id, position);
    prefix.msg.react(ctx.http(), HOURGLASS).await?;
    Ok(())
}

/// Chat with the AI.
#[poise::command(prefix_command, guild_only, category = "AI")]
pub async fn chat(ctx: Context<'_>, #[rest] text: String) -> Result<(), Error> {
    enqueue(ctx, text, RequestKind::Chat).await
}

/// Draw something using the AI.
#[poise::command(prefix_command, guild_only, category = "AI")]
pub async fn draw(ctx: Context<'_>, #[rest] prompt: String) -> Result<(), Error> {
    enqueue(ctx, prompt, RequestKind::Image).await
}
