use rand::rngs::StdRng;
use rand::SeedableRng;
use serenity::all::User;

use crate::discord::commands::{start_session, Context, Error};
use crate::discord::utils::actor_of;
use crate::errors::{BotError, BotResult};
use crate::games::guess::{Guess, DEFAULT_GUESSES, DEFAULT_MAX, DEFAULT_MIN};
use crate::games::memory::Memory;
use crate::games::opentdb::QuestionKind;
use crate::games::rps::Rps;
use crate::games::tictactoe::TicTacToe;
use crate::games::trivia::Trivia;

fn parse_kind(kind: Option<&str>) -> BotResult<QuestionKind> {
    match kind.map(str::to_lowercase).as_deref() {
        None => Ok(if rand::random::<bool>() { QuestionKind::Boolean } else { QuestionKind::Multiple }),
        Some("boolean") | Some("bool") => Ok(QuestionKind::Boolean),
        Some("multiple") => Ok(QuestionKind::Multiple),
        Some(other) => Err(BotError::ValidationFailed(format!("`{}` is not a trivia type. Use `boolean` or `multiple`.", other))),
    }
}

fn opponent_check(author: &User, opponent: &User) -> BotResult<()> {
    if author.id == opponent.id {
        return Err(BotError::Rejected("You can't play with yourself.".to_string()));
    }
    if opponent.bot {
        return Err(BotError::Rejected("You can't play with a bot. Are you that lonely?".to_string()));
    }
    Ok(())
}

/// Launches an interactive trivia question for the channel.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games", user_cooldown = 5)]
pub async fn trivia(ctx: Context<'_>, #[description = "boolean or multiple"] kind: Option<String>) -> Result<(), Error> {
    let kind = parse_kind(kind.as_deref())?;
    ctx.defer().await?;

    let question = ctx.data().trivia.fetch(kind).await?;
    let engine = Trivia::new(actor_of(ctx.author()), question, &mut StdRng::from_entropy());
    start_session(ctx, Box::new(engine)).await
}

/// Starts a memory game with the bot.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games")]
pub async fn memory(ctx: Context<'_>) -> Result<(), Error> {
    let engine = Memory::new(actor_of(ctx.author()), &mut StdRng::from_entropy());
    start_session(ctx, Box::new(engine)).await
}

/// Plays a tic-tac-toe game with someone.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games", aliases("ttt"))]
pub async fn tictactoe(ctx: Context<'_>, #[description = "Who to challenge"] player: User) -> Result<(), Error> {
    opponent_check(ctx.author(), &player)?;
    let engine = TicTacToe::new(actor_of(ctx.author()), actor_of(&player), &mut StdRng::from_entropy());
    start_session(ctx, Box::new(engine)).await
}

/// Play a RPS match with another user.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games")]
pub async fn rps(ctx: Context<'_>, #[description = "Your opponent"] player: User) -> Result<(), Error> {
    opponent_check(ctx.author(), &player)?;
    let engine = Rps::new(actor_of(ctx.author()), actor_of(&player));
    start_session(ctx, Box::new(engine)).await
}

/// Guess a random number. Everyone in the channel can play.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games")]
pub async fn guess(
    ctx: Context<'_>,
    #[description = "Lowest possible number"] min: Option<i64>,
    #[description = "Highest possible number"] max: Option<i64>,
    #[description = "Guesses per player"] guesses: Option<u32>,
) -> Result<(), Error> {
    let engine = Guess::new(
        &actor_of(ctx.author()),
        min.unwrap_or(DEFAULT_MIN),
        max.unwrap_or(DEFAULT_MAX),
        guesses.unwrap_or(DEFAULT_GUESSES),
        &mut StdRng::from_entropy(),
    )?;
    start_session(ctx, Box::new(engine)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivia_kind_parsing() {
        assert_eq!(parse_kind(Some("Boolean")).unwrap(), QuestionKind::Boolean);
        assert_eq!(parse_kind(Some("multiple")).unwrap(), QuestionKind::Multiple);
        assert!(parse_kind(None).is_ok());
        assert!(matches!(parse_kind(Some("essay")), Err(BotError::ValidationFailed(_))));
    }
}
