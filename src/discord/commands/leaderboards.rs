use serenity::all::{Colour, CreateEmbed, Timestamp, User};

use crate::database::{MatchRecord, MatchTable, MemoryRecord, TriviaRecord};
use crate::discord::commands::{Context, Error};
use crate::games::leaderboard_emoji;

const LEADERBOARD_SIZE: usize = 10;
const STATS_MIN_ANSWERS: i64 = 50;
const EMPTY_BOARD: &str = "No one won any matches.";

fn board_embed(title: &str, description: String) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .description(description)
        .colour(Colour::new(rand::random::<u32>() & 0xffffff))
        .timestamp(Timestamp::now())
}

pub fn trivia_board(records: &[TriviaRecord]) -> String {
    if records.is_empty() {
        return "No one answered any questions.".to_string();
    }
    records
        .iter()
        .take(LEADERBOARD_SIZE)
        .enumerate()
        .map(|(i, r)| format!("{} <@{}> (Correct: {}, Wrong: {}, Streak: {})", leaderboard_emoji(i + 1), r.user_id, r.correct, r.wrong, r.streak))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ranked accuracies, plus a separate listing of players with too few answers to rank.
pub fn accuracy_board(records: &[TriviaRecord]) -> (String, Option<String>) {
    let (mut ranked, ignored): (Vec<&TriviaRecord>, Vec<&TriviaRecord>) = records.iter().partition(|r| r.answered() > STATS_MIN_ANSWERS);
    ranked.sort_by(|a, b| b.accuracy().total_cmp(&a.accuracy()));

    let line = |i: usize, r: &TriviaRecord| format!("{} <@{}> (Percentage: **{:.2}%**)", leaderboard_emoji(i + 1), r.user_id, r.accuracy());
    let ranked = if ranked.is_empty() {
        format!("No one answered more than {} questions yet.", STATS_MIN_ANSWERS)
    } else {
        ranked.iter().take(LEADERBOARD_SIZE).enumerate().map(|(i, r)| line(i, r)).collect::<Vec<_>>().join("\n")
    };
    let ignored = (!ignored.is_empty()).then(|| ignored.iter().take(LEADERBOARD_SIZE).enumerate().map(|(i, r)| line(i, r)).collect::<Vec<_>>().join("\n"));
    (ranked, ignored)
}

pub fn memory_board(records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return "No one finished a game yet.".to_string();
    }
    records
        .iter()
        .take(LEADERBOARD_SIZE)
        .enumerate()
        .map(|(i, r)| format!("{} <@{}> (Time: {} minute(s), {} second(s))", leaderboard_emoji(i + 1), r.user_id, r.minutes, r.seconds))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn wins_board(rows: &[(u64, i64)]) -> String {
    if rows.is_empty() {
        return EMPTY_BOARD.to_string();
    }
    rows.iter()
        .take(LEADERBOARD_SIZE)
        .enumerate()
        .map(|(i, (user, wins))| format!("{} <@{}> (Wins: {})", leaderboard_emoji(i + 1), user, wins))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn match_history(user_id: u64, matches: &[MatchRecord]) -> String {
    if matches.is_empty() {
        return format!("<@{}> didn't play any matches.", user_id);
    }
    matches
        .iter()
        .map(|m| {
            if m.winner == user_id {
                format!("* <@{}> won against <@{}>.", user_id, m.rival)
            } else {
                format!("* <@{}> lost against <@{}>.", user_id, m.winner)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn send_board(ctx: Context<'_>, embed: CreateEmbed) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// The global leaderboard for trivia.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games", subcommands("trivialb_stats"))]
pub async fn trivialb(ctx: Context<'_>) -> Result<(), Error> {
    let records = ctx.data().database.begin_transaction().await?.trivia_leaderboard()?;
    send_board(ctx, board_embed("Trivia Leaderboard", trivia_board(&records))).await
}

/// Trivia accuracy of every player.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games", rename = "stats", aliases("s"))]
pub async fn trivialb_stats(ctx: Context<'_>) -> Result<(), Error> {
    let records = ctx.data().database.begin_transaction().await?.trivia_leaderboard()?;
    let (ranked, ignored) = accuracy_board(&records);

    let mut embed = board_embed("Trivia Leaderboard", ranked);
    if let Some(ignored) = ignored {
        embed = embed.field(format!("Ignored (answered {} questions or less)", STATS_MIN_ANSWERS), ignored, false);
    }
    send_board(ctx, embed).await
}

/// The global leaderboard for the memory game.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games")]
pub async fn memorylb(ctx: Context<'_>) -> Result<(), Error> {
    let records = ctx.data().database.begin_transaction().await?.memory_leaderboard()?;
    send_board(ctx, board_embed("Memory Leaderboard", memory_board(&records))).await
}

async fn wins_leaderboard(ctx: Context<'_>, table: MatchTable, title: &str) -> Result<(), Error> {
    let rows = ctx.data().database.begin_transaction().await?.match_leaderboard(table)?;
    send_board(ctx, board_embed(title, wins_board(&rows))).await
}

async fn match_info(ctx: Context<'_>, table: MatchTable, title: &str, member: Option<User>) -> Result<(), Error> {
    let user_id = member.as_ref().unwrap_or_else(|| ctx.author()).id.get();
    let matches = ctx.data().database.begin_transaction().await?.load_matches_of(table, user_id)?;
    send_board(ctx, board_embed(title, match_history(user_id, &matches))).await
}

/// The global leaderboard for tic-tac-toe.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games", subcommands("tictactoelb_info"))]
pub async fn tictactoelb(ctx: Context<'_>) -> Result<(), Error> {
    wins_leaderboard(ctx, MatchTable::TicTacToe, "Tic-Tac-Toe Leaderboard").await
}

/// Shows the individual match information of a user.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games", rename = "info")]
pub async fn tictactoelb_info(ctx: Context<'_>, #[description = "Defaults to you"] member: Option<User>) -> Result<(), Error> {
    match_info(ctx, MatchTable::TicTacToe, "Tic-Tac-Toe Individual Match Info", member).await
}

/// The global leaderboard for rock-paper-scissors.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games", subcommands("rpslb_info"))]
pub async fn rpslb(ctx: Context<'_>) -> Result<(), Error> {
    wins_leaderboard(ctx, MatchTable::Rps, "RPS Leaderboard").await
}

/// Shows the individual match information of a user.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games", rename = "info")]
pub async fn rpslb_info(ctx: Context<'_>, #[description = "Defaults to you"] member: Option<User>) -> Result<(), Error> {
    match_info(ctx, MatchTable::Rps, "RPS Individual Match Info", member).await
}

/// The global leaderboard for the number guessing game.
#[poise::command(prefix_command, slash_command, guild_only, category = "Games")]
pub async fn guesslb(ctx: Context<'_>) -> Result<(), Error> {
    let rows = ctx.data().database.begin_transaction().await?.guess_leaderboard()?;
    send_board(ctx, board_embed("Guess Leaderboard", wins_board(&rows))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trivia(user_id: u64, correct: i64, wrong: i64) -> TriviaRecord {
        TriviaRecord { user_id, correct, wrong, streak: 0 }
    }

    #[test]
    fn accuracy_board_separates_new_players() {
        let records = vec![trivia(1, 30, 30), trivia(2, 50, 10), trivia(3, 5, 0)];
        let (ranked, ignored) = accuracy_board(&records);
        let lines: Vec<&str> = ranked.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("<@2>") && lines[0].contains("83.33%"));
        assert!(lines[1].contains("<@1>") && lines[1].contains("50.00%"));
        assert!(ignored.unwrap().contains("<@3> (Percentage: **100.00%**)"));
    }

    #[test]
    fn wins_board_uses_medals_and_has_an_empty_state() {
        assert_eq!(wins_board(&[]), EMPTY_BOARD);
        let board = wins_board(&[(5, 3), (6, 2), (7, 1), (8, 1)]);
        let lines: Vec<&str> = board.lines().collect();
        assert_eq!(lines[0], "🥇 <@5> (Wins: 3)");
        assert_eq!(lines[3], "* <@8> (Wins: 1)");
    }

    #[test]
    fn match_history_is_from_the_members_perspective() {
        let matches = vec![MatchRecord { winner: 1, rival: 2 }, MatchRecord { winner: 3, rival: 1 }];
        assert_eq!(match_history(1, &matches), "* <@1> won against <@2>.\n* <@1> lost against <@3>.");
        assert_eq!(match_history(9, &[]), "<@9> didn't play any matches.");
    }

    #[test]
    fn boards_are_capped() {
        let rows: Vec<(u64, i64)> = (0..25).map(|i| (i, 25 - i as i64)).collect();
        assert_eq!(wins_board(&rows).lines().count(), LEADERBOARD_SIZE);
    }
}
