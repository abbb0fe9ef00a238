use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serenity::all::{Colour, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, Message, Timestamp, User, UserId};
use tokio::sync::Mutex;

use crate::discord::commands::{Context, Error};
use crate::errors::BotError;
use crate::games::COLOUR_BLUE;

pub const MOCK_LIMIT: usize = 250;
const NO_SNIPE: &str = "No message were deleted in this channel since bot initialization.";

pub const EIGHT_BALL_RESPONSES: [&str; 20] = [
    "It is certain.",
    "It is decidedly so.",
    "Without a doubt.",
    "Yes - definitely.",
    "You may rely on it.",
    "As I see it, yes.",
    "Most likely.",
    "Outlook good.",
    "Yes.",
    "Signs point to yes.",
    "Reply hazy, try again.",
    "Ask again later.",
    "Better not tell you now.",
    "Cannot predict now.",
    "Concentrate and ask again.",
    "Do not count on it.",
    "My reply is no.",
    "My sources say no.",
    "Outlook not so good.",
    "Very doubtful.",
];

/// What is kept of a deleted message.
#[derive(Clone, Debug, PartialEq)]
pub struct SnipedMessage {
    pub author_name: String,
    pub author_avatar: String,
    pub content: String,
    pub created_at: Timestamp,
}

impl SnipedMessage {
    pub fn from_message(message: &Message) -> Self {
        // Embed-only messages are shown by their first embed.
        let content = match message.embeds.first().and_then(|e| e.description.clone()) {
            Some(description) => description,
            None => message.content.clone(),
        };
        SnipedMessage {
            author_name: message.author.display_name().to_string(),
            author_avatar: message.author.face(),
            content,
            created_at: message.timestamp,
        }
    }
}

/// Last deleted message per channel, since startup.
#[derive(Clone, Debug, Default)]
pub struct SnipeStore {
    messages: Arc<Mutex<HashMap<u64, SnipedMessage>>>,
}

impl SnipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, channel_id: u64, message: SnipedMessage) {
        self.messages.lock().await.insert(channel_id, message);
    }

    pub async fn last(&self, channel_id: u64) -> Option<SnipedMessage> {
        self.messages.lock().await.get(&channel_id).cloned()
    }
}

/// Alternates lower and upper case, starting lower, and quotes the result.
pub fn mock_text(statement: &str) -> String {
    let mocked: String = statement
        .chars()
        .enumerate()
        .flat_map(|(i, c)| if i % 2 == 0 { c.to_lowercase().collect::<Vec<_>>() } else { c.to_uppercase().collect() })
        .collect();
    format!("\"{}\" :nerd::point_up:", mocked)
}

fn random_colour() -> Colour {
    Colour::new(rand::random::<u32>() & 0xffffff)
}

fn requested_by(user: &User) -> CreateEmbedFooter {
    CreateEmbedFooter::new(format!("Requested by {}", user.name)).icon_url(user.face())
}

/// Shows the last deleted message in a channel.
#[poise::command(prefix_command, guild_only, category = "Fun")]
pub async fn snipe(ctx: Context<'_>) -> Result<(), Error> {
    let Some(sniped) = ctx.data().snipes.last(ctx.channel_id().get()).await else {
        ctx.reply(NO_SNIPE).await?;
        return Ok(());
    };

    let embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::new(sniped.author_name).icon_url(sniped.author_avatar))
        .description(sniped.content)
        .colour(Colour::new(COLOUR_BLUE))
        .timestamp(sniped.created_at);
    ctx.send(poise::CreateReply::default().embed(embed).reply(true)).await?;
    Ok(())
}

/// An 8ball, but digital.
#[poise::command(prefix_command, guild_only, category = "Fun", rename = "8ball")]
pub async fn eight_ball(ctx: Context<'_>, #[rest] question: String) -> Result<(), Error> {
    let answer = EIGHT_BALL_RESPONSES.choose(&mut rand::thread_rng()).copied().unwrap_or("Ask again later.");
    let embed = CreateEmbed::new()
        .title(":8ball: 8ball")
        .description("The digital 8ball has spoken.")
        .field("Question", question, true)
        .field("Answer", answer, false)
        .colour(random_colour())
        .timestamp(ctx.created_at());
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Shows the avatar of a user.
#[poise::command(prefix_command, guild_only, category = "Fun", aliases("av"))]
pub async fn avatar(ctx: Context<'_>, user: Option<User>) -> Result<(), Error> {
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::new(user.display_name()).icon_url(user.face()))
        .image(user.face())
        .footer(requested_by(ctx.author()))
        .colour(Colour::new(COLOUR_BLUE))
        .timestamp(ctx.created_at());
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Finds a random ship.
#[poise::command(prefix_command, guild_only, category = "Fun")]
pub async fn ship(ctx: Context<'_>) -> Result<(), Error> {
    let members: Vec<UserId> = match ctx.guild() {
        Some(guild) => guild.members.values().filter(|m| !m.user.bot).map(|m| m.user.id).collect(),
        None => Vec::new(),
    };

    let (first, second) = {
        let mut rng = rand::thread_rng();
        (members.choose(&mut rng).copied(), members.choose(&mut rng).copied())
    };
    let (Some(first), Some(second)) = (first, second) else {
        return Err(BotError::Rejected("There is no one here to ship.".to_string()).into());
    };

    let embed = CreateEmbed::new().description(format!("I ship <@{}> and <@{}>.", first, second)).colour(random_colour());
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Mocks a statement, or the message you reply to.
#[poise::command(prefix_command, guild_only, category = "Fun")]
pub async fn mock(ctx: Context<'_>, #[rest] statement: Option<String>) -> Result<(), Error> {
    let poise::Context::Prefix(prefix) = ctx else {
        return Ok(());
    };
    let statement = statement.filter(|s| !s.trim().is_empty());
    let referencing = prefix.msg.message_reference.is_some();

    match (statement, referencing) {
        (None, false) => Err(BotError::ValidationFailed("You must either provide a statement to mock or reference a message.".to_string()).into()),
        (Some(_), true) => Err(BotError::ValidationFailed("You can't reference a message and give a statement together.".to_string()).into()),
        (Some(statement), false) => {
            if statement.chars().count() > MOCK_LIMIT {
                return Err(BotError::ValidationFailed(format!("Statement cannot exceed {} characters in length.", MOCK_LIMIT)).into());
            }
            ctx.say(mock_text(&statement)).await?;
            Ok(())
        }
        (None, true) => {
            let Some(referenced) = prefix.msg.referenced_message.as_deref() else {
                return Err(BotError::Rejected("An error occured while referencing that message.".to_string()).into());
            };
            if referenced.content.chars().count() > MOCK_LIMIT {
                return Err(BotError::ValidationFailed(format!("Message content exceeds {} characters in length.", MOCK_LIMIT)).into());
            }
            prefix.msg.delete(ctx.http()).await?;
            referenced.reply(ctx.http(), mock_text(&referenced.content)).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniped(content: &str) -> SnipedMessage {
        SnipedMessage {
            author_name: "alice".to_string(),
            author_avatar: "https://cdn.discordapp.com/embed/avatars/0.png".to_string(),
            content: content.to_string(),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn mock_alternates_case_starting_lower() {
        assert_eq!(mock_text("Hello World"), "\"hElLo wOrLd\" :nerd::point_up:");
        assert_eq!(mock_text("ABC"), "\"aBc\" :nerd::point_up:");
        // Non-letters still take a position.
        assert_eq!(mock_text("a b"), "\"a b\" :nerd::point_up:");
    }

    #[test]
    fn mock_limit_counts_characters() {
        let accented = "é".repeat(MOCK_LIMIT);
        assert!(accented.len() > MOCK_LIMIT);
        assert_eq!(accented.chars().count(), MOCK_LIMIT);
        assert!(mock_text(&accented).starts_with("\"éÉ"));
    }

    #[test]
    fn eight_ball_has_the_classic_answers() {
        let unique: std::collections::HashSet<&str> = EIGHT_BALL_RESPONSES.into_iter().collect();
        assert_eq!(unique.len(), 20);
        assert_eq!(EIGHT_BALL_RESPONSES[0], "It is certain.");
        assert_eq!(EIGHT_BALL_RESPONSES[19], "Very doubtful.");
    }

    #[tokio::test]
    async fn snipe_keeps_the_latest_deletion_per_channel() {
        let store = SnipeStore::new();
        assert_eq!(store.last(10).await, None);

        store.record(10, sniped("first")).await;
        store.record(10, sniped("second")).await;
        store.record(20, sniped("elsewhere")).await;

        assert_eq!(store.last(10).await.unwrap().content, "second");
        assert_eq!(store.last(20).await.unwrap().content, "elsewhere");
        assert_eq!(store.last(30).await, None);
    }
}
