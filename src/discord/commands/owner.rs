use crate::discord::commands::{Context, Error};

/// Shuts down the bot.
#[poise::command(prefix_command, owners_only, hide_in_help, category = "Owner")]
pub async fn shutdown(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Shutting down now...").await?;
    tracing::warn!("Shutdown requested by {}", ctx.author().id);
    ctx.framework().shard_manager().shutdown_all().await;
    Ok(())
}
