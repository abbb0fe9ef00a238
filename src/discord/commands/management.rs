use serenity::all::GuildChannel;

use crate::discord::commands::{Context, Data, Error};
use crate::discord::utils::{prefixes_embed, success_embed, validate_new_prefix};
use crate::errors::{BotError, BotResult};
use crate::gate::GateEntity;

/// A registered command as the gate sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub qualified_name: String,
    pub aliases: Vec<String>,
    pub category: Option<String>,
}

fn collect_catalog(commands: &[poise::Command<Data, Error>], catalog: &mut Vec<CatalogEntry>) {
    for command in commands {
        catalog.push(CatalogEntry {
            qualified_name: command.qualified_name.clone(),
            aliases: command.aliases.clone(),
            category: command.category.clone(),
        });
        collect_catalog(&command.subcommands, catalog);
    }
}

pub fn command_catalog(commands: &[poise::Command<Data, Error>]) -> Vec<CatalogEntry> {
    let mut catalog = Vec::new();
    collect_catalog(commands, &mut catalog);
    catalog
}

/// Commands are matched before modules, the way a user most likely means it.
pub fn resolve_entity(catalog: &[CatalogEntry], name: &str) -> BotResult<GateEntity> {
    let name = name.trim();
    let command = catalog
        .iter()
        .find(|c| c.qualified_name.eq_ignore_ascii_case(name) || c.aliases.iter().any(|a| a.eq_ignore_ascii_case(name)));
    if let Some(command) = command {
        return Ok(GateEntity::command(command.qualified_name.clone(), command.category.as_deref()));
    }

    catalog
        .iter()
        .filter_map(|c| c.category.as_deref())
        .find(|category| category.eq_ignore_ascii_case(name))
        .map(GateEntity::module)
        .ok_or_else(|| BotError::UnknownEntity(name.to_string()))
}

fn capitalized(entity: &GateEntity) -> String {
    crate::games::title_case(&entity.kind.to_string())
}

fn guild_of(ctx: &Context<'_>) -> BotResult<u64> {
    ctx.guild_id().map(|g| g.get()).ok_or_else(|| BotError::Rejected("This command only works in servers.".to_string()))
}

/// Enables a command or module that is disabled in the guild.
#[poise::command(prefix_command, slash_command, guild_only, category = "Management", required_permissions = "MANAGE_GUILD")]
pub async fn enable(ctx: Context<'_>, #[rest] #[description = "Command or module name"] entity: String) -> Result<(), Error> {
    let guild_id = guild_of(&ctx)?;
    let resolved = resolve_entity(&command_catalog(&ctx.framework().options().commands), &entity)?;
    ctx.data().gate.enable(guild_id, &resolved).await?;

    let message = format!("{} **{}** has been enabled.", capitalized(&resolved), resolved.name);
    ctx.send(poise::CreateReply::default().embed(success_embed(message))).await?;
    Ok(())
}

/// Renders a command or module unusable in the guild.
#[poise::command(prefix_command, slash_command, guild_only, category = "Management", required_permissions = "MANAGE_GUILD")]
pub async fn disable(ctx: Context<'_>, #[rest] #[description = "Command or module name"] entity: String) -> Result<(), Error> {
    let guild_id = guild_of(&ctx)?;
    let resolved = resolve_entity(&command_catalog(&ctx.framework().options().commands), &entity)?;
    ctx.data().gate.disable(guild_id, &resolved).await?;

    let message = format!("{} **{}** has been disabled.", capitalized(&resolved), resolved.name);
    ctx.send(poise::CreateReply::default().embed(success_embed(message))).await?;
    Ok(())
}

/// Lists everything currently disabled in the guild.
#[poise::command(prefix_command, slash_command, guild_only, category = "Management")]
pub async fn disabled(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_of(&ctx)?;
    let entities = ctx.data().gate.disabled_entities(guild_id).await?;
    let description = if entities.is_empty() {
        "Nothing is disabled in this server.".to_string()
    } else {
        entities.iter().map(|e| format!("`{}`", e)).collect::<Vec<_>>().join("\n")
    };
    ctx.send(poise::CreateReply::default().embed(success_embed(description))).await?;
    Ok(())
}

/// Manage the guild's command prefixes.
#[poise::command(prefix_command, slash_command, guild_only, category = "Management", subcommands("prefix_list", "prefix_add", "prefix_remove"), subcommand_required)]
pub async fn prefix(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Lists the guild's prefixes.
#[poise::command(prefix_command, slash_command, guild_only, category = "Management", rename = "list")]
pub async fn prefix_list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_of(&ctx)?;
    let prefixes = ctx.data().prefixes(Some(guild_id)).await?;
    let guild_name = ctx.guild().map(|g| g.name.clone()).unwrap_or_else(|| "this server".to_string());
    ctx.send(poise::CreateReply::default().embed(prefixes_embed(&guild_name, &prefixes))).await?;
    Ok(())
}

/// Adds a prefix to the guild.
#[poise::command(prefix_command, slash_command, guild_only, category = "Management", rename = "add", required_permissions = "MANAGE_GUILD")]
pub async fn prefix_add(ctx: Context<'_>, #[description = "Wrap in quotes to keep spaces"] prefix: String) -> Result<(), Error> {
    let guild_id = guild_of(&ctx)?;
    let data = ctx.data();
    let mut tx = data.database.begin_transaction().await?;
    let stored = tx.load_prefixes(guild_id)?;
    let current = if stored.is_empty() { vec![data.config.default_prefix.clone()] } else { stored.clone() };
    validate_new_prefix(&prefix, &current)?;

    // The default stays usable once the guild has its own list.
    if stored.is_empty() {
        tx.add_prefix(guild_id, &data.config.default_prefix)?;
    }
    tx.add_prefix(guild_id, &prefix)?;
    drop(tx);

    let message = format!(
        "Added `{}` to the list of prefixes.\n\nNote: If the prefix contains more than one word, it should be wrapped in quotes. E.g. `\"two words\"`. \
         If you'd like a whitespace after the end of the prefix, wrap it in quotes and leave a space at the end. E.g. `\"two words \"`.",
        prefix
    );
    ctx.send(poise::CreateReply::default().embed(success_embed(message))).await?;
    Ok(())
}

/// Removes a prefix from the guild.
#[poise::command(prefix_command, slash_command, guild_only, category = "Management", rename = "remove", required_permissions = "MANAGE_GUILD")]
pub async fn prefix_remove(ctx: Context<'_>, #[description = "The prefix to remove"] prefix: String) -> Result<(), Error> {
    let guild_id = guild_of(&ctx)?;
    let current = ctx.data().prefixes(Some(guild_id)).await?;
    if current.len() <= 1 {
        return Err(BotError::Rejected("There is only one prefix left in the server. You can't remove it unless more prefixes are added.".to_string()).into());
    }

    let mut tx = ctx.data().database.begin_transaction().await?;
    if !tx.remove_prefix(guild_id, &prefix)? {
        return Err(BotError::ValidationFailed(format!("`{}` is not a prefix in this guild.", prefix)).into());
    }
    drop(tx);

    ctx.send(poise::CreateReply::default().embed(success_embed(format!("Removed `{}` from the list of prefixes.", prefix)))).await?;
    Ok(())
}

/// Sets the logging channel for the guild. Leave empty to turn logging off.
#[poise::command(prefix_command, slash_command, guild_only, category = "Management", required_permissions = "MANAGE_GUILD")]
pub async fn setlogging(ctx: Context<'_>, #[description = "Where to log message edits and deletions"] channel: Option<GuildChannel>) -> Result<(), Error> {
    let guild_id = guild_of(&ctx)?;
    let mut tx = ctx.data().database.begin_transaction().await?;
    tx.save_log_channel(guild_id, channel.as_ref().map(|c| c.id.get()))?;
    drop(tx);

    let message = match &channel {
        Some(channel) => format!("Successfully set the logging channel to <#{}>.", channel.id),
        None => "Logging has been turned off.".to_string(),
    };
    ctx.send(poise::CreateReply::default().embed(success_embed(message))).await?;
    Ok(())
}
