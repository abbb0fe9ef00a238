use serenity::all::{Colour, CreateEmbed, CreateEmbedFooter, Timestamp, User};

use crate::errors::{BotError, BotResult};
use crate::games::{COLOUR_BLUE, COLOUR_GREEN, COLOUR_RED};
use crate::session::Actor;

pub const REACTION_SUCCESS: &str = "\u{2705}";
pub const REACTION_FAILURE: &str = "\u{274c}";

pub const MAX_PREFIX_LENGTH: usize = 16;
pub const MAX_PREFIXES: usize = 5;

pub fn actor_of(user: &User) -> Actor {
    Actor::new(user.id.get(), user.name.clone())
}

pub fn success_embed(description: impl AsRef<str>) -> CreateEmbed {
    CreateEmbed::new().description(format!("{} {}", REACTION_SUCCESS, description.as_ref())).colour(Colour::new(COLOUR_GREEN))
}

pub fn failure_embed(description: impl AsRef<str>) -> CreateEmbed {
    CreateEmbed::new().description(format!("{} {}", REACTION_FAILURE, description.as_ref())).colour(Colour::new(COLOUR_RED))
}

pub fn prefixes_embed(guild_name: &str, prefixes: &[String]) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("Prefixes for {}", guild_name))
        .description(prefixes.iter().map(|p| format!("`{}`", p)).collect::<Vec<_>>().join("\n"))
        .colour(Colour::new(COLOUR_BLUE))
        .timestamp(Timestamp::now())
}

/// Checks a new prefix against the guild's current ones.
pub fn validate_new_prefix(prefix: &str, existing: &[String]) -> BotResult<()> {
    if prefix.trim().is_empty() {
        return Err(BotError::ValidationFailed("Prefix cannot be empty.".to_string()));
    }
    if prefix.chars().count() > MAX_PREFIX_LENGTH {
        return Err(BotError::ValidationFailed(format!("Prefix cannot exceed {} characters in length.", MAX_PREFIX_LENGTH)));
    }
    if existing.len() >= MAX_PREFIXES {
        return Err(BotError::ValidationFailed("Only five custom prefixes are allowed per guild.".to_string()));
    }
    if existing.iter().any(|p| p.trim() == prefix.trim()) {
        return Err(BotError::ValidationFailed(format!("**{}** is already a prefix in this guild.", prefix)));
    }
    Ok(())
}

/// Longest matching prefix wins, so `j!!` is not shadowed by `j!`.
pub fn strip_any_prefix<'a>(content: &'a str, prefixes: &[String]) -> Option<(&'a str, &'a str)> {
    prefixes
        .iter()
        .filter(|p| !p.is_empty() && content.starts_with(p.as_str()))
        .max_by_key(|p| p.len())
        .map(|p| content.split_at(p.len()))
}

pub fn is_bare_mention(content: &str, bot_id: u64) -> bool {
    let content = content.trim();
    content == format!("<@{}>", bot_id) || content == format!("<@!{}>", bot_id)
}

const LOG_FIELD_LIMIT: usize = 1024;

fn clip(text: &str) -> String {
    if text.chars().count() <= LOG_FIELD_LIMIT {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(LOG_FIELD_LIMIT - 3).collect();
    clipped.push_str("...");
    clipped
}

fn log_embed(title: &str, description: String) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!(":notepad_spiral: {}", title))
        .description(description)
        .colour(Colour::new(COLOUR_BLUE))
        .timestamp(Timestamp::now())
}

pub fn message_deleted_embed(author_id: u64, channel_id: u64, message_id: u64, content: &str, attachment: Option<&str>) -> CreateEmbed {
    let mut embed = log_embed("Message Deleted", format!("Message sent by <@{}> was **deleted** in <#{}>.", author_id, channel_id))
        .footer(CreateEmbedFooter::new(format!("Message ID: {}", message_id)));
    if !content.is_empty() {
        embed = embed.field("Content", clip(content), false);
    }
    if let Some(url) = attachment {
        embed = embed.image(url);
    }
    embed
}

pub fn message_edited_embed(author_id: u64, channel_id: u64, message_id: u64, before: Option<&str>, after: &str) -> CreateEmbed {
    log_embed("Message Edited", format!("Message sent by <@{}> was **edited** in <#{}>.", author_id, channel_id))
        .footer(CreateEmbedFooter::new(format!("Message ID: {}", message_id)))
        .field("Before", clip(before.unwrap_or("*Not cached*")), false)
        .field("After", clip(after), false)
}

pub fn member_left_embed(name: &str) -> CreateEmbed {
    log_embed("Member Left", format!("**{}** left the server.", name))
}
