use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use serenity::all::{
    ActionRowComponent, ChannelId, ComponentInteraction, Context, CreateEmbed, CreateMessage, EventHandler, GatewayIntents, Guild, GuildId, Http, Interaction,
    Member, Message, MessageId, MessageUpdateEvent, ModalInteraction, Ready, User, UserId,
};
use serenity::async_trait;
use serenity::cache::Settings as CacheSettings;
use serenity::Client;
use tracing::{error, info, warn};

use crate::ai::{OpenAiBackend, QueueConsumer, RequestQueue};
use crate::config::BotConfig;
use crate::database::Database;
use crate::discord::commands::fun::{SnipeStore, SnipedMessage};
use crate::discord::commands::{all_commands, Data, Error};
use crate::discord::render::{build_response, plan_response, DiscordRenderer, DiscordReplySink};
use crate::discord::utils::{actor_of, failure_embed, is_bare_mention, member_left_embed, message_deleted_embed, message_edited_embed, prefixes_embed, strip_any_prefix};
use crate::errors::{BotError, BotResult};
use crate::games::opentdb::TriviaClient;
use crate::gate::CommandGate;
use crate::services::GameServices;
use crate::session::SessionManager;

const CACHED_MESSAGES: usize = 500;

#[derive(Clone)]
pub struct Handler {
    pub data: Data,
}

impl Handler {
    #[tracing::instrument(skip_all)]
    async fn on_component(&self, ctx: &Context, component: &ComponentInteraction) {
        let actor = actor_of(&component.user);
        let outcome = self.data.sessions.dispatch(&component.data.custom_id, &actor, None).await;
        let (response, followup) = build_response(&component.data.custom_id, plan_response(outcome));

        if let Err(e) = component.create_response(&ctx.http, response).await {
            warn!("Failed to respond to component interaction: {}", e);
            return;
        }
        if let Some(followup) = followup {
            if let Err(e) = component.create_followup(&ctx.http, followup).await {
                warn!("Failed to send followup: {}", e);
            }
        }
    }

    #[tracing::instrument(skip_all)]
    async fn on_modal(&self, ctx: &Context, modal: &ModalInteraction) {
        let actor = actor_of(&modal.user);
        let input = modal
            .data
            .components
            .iter()
            .flat_map(|row| row.components.iter())
            .find_map(|component| match component {
                ActionRowComponent::InputText(input) => input.value.clone(),
                _ => None,
            })
            .unwrap_or_default();

        let outcome = self.data.sessions.dispatch(&modal.data.custom_id, &actor, Some(input)).await;
        let (response, followup) = build_response(&modal.data.custom_id, plan_response(outcome));

        if let Err(e) = modal.create_response(&ctx.http, response).await {
            warn!("Failed to respond to modal submit: {}", e);
            return;
        }
        if let Some(followup) = followup {
            if let Err(e) = modal.create_followup(&ctx.http, followup).await {
                warn!("Failed to send followup: {}", e);
            }
        }
    }

    async fn log_channel(&self, guild_id: GuildId) -> BotResult<Option<ChannelId>> {
        let mut tx = self.data.database.begin_transaction().await?;
        Ok(tx.load_log_channel(guild_id.get())?.map(ChannelId::new))
    }

    async fn send_log(&self, ctx: &Context, guild_id: GuildId, embed: CreateEmbed) {
        let channel = match self.log_channel(guild_id).await {
            Ok(Some(channel)) => channel,
            Ok(None) => return,
            Err(e) => {
                error!("Could not load the log channel of guild {}: {}", guild_id, e);
                return;
            }
        };
        if let Err(e) = channel.send_message(&ctx.http, CreateMessage::new().embed(embed)).await {
            warn!("Could not write to the log channel of guild {}: {}", guild_id, e);
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.guild_id.is_none() {
            return;
        }
        if !is_bare_mention(&msg.content, ctx.cache.current_user().id.get()) {
            return;
        }

        let prefixes = match self.data.prefixes(msg.guild_id.map(|g| g.get())).await {
            Ok(prefixes) => prefixes,
            Err(e) => {
                error!("Could not load prefixes: {}", e);
                return;
            }
        };
        let guild_name = msg.guild_id.and_then(|g| g.name(&ctx.cache)).unwrap_or_else(|| "this server".to_string());
        let reply = CreateMessage::new().embed(prefixes_embed(&guild_name, &prefixes)).reference_message(&msg);
        if let Err(e) = msg.channel_id.send_message(&ctx.http, reply).await {
            warn!("Could not reply with prefixes: {}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Component(component) => self.on_component(&ctx, &component).await,
            Interaction::Modal(modal) => self.on_modal(&ctx, &modal).await,
            _ => {}
        }
    }

    async fn message_delete(&self, ctx: Context, channel_id: ChannelId, deleted_message_id: MessageId, guild_id: Option<GuildId>) {
        let Some(message) = ctx.cache.message(channel_id, deleted_message_id).map(|m| Message::clone(&m)) else {
            return;
        };
        self.data.snipes.record(channel_id.get(), SnipedMessage::from_message(&message)).await;

        let Some(guild_id) = guild_id else {
            return;
        };
        if message.author.bot {
            return;
        }

        let attachment = message.attachments.first().map(|a| a.proxy_url.clone());
        let embed = message_deleted_embed(message.author.id.get(), channel_id.get(), deleted_message_id.get(), &message.content, attachment.as_deref());
        self.send_log(&ctx, guild_id, embed).await;
    }

    async fn message_update(&self, ctx: Context, old_if_available: Option<Message>, _new: Option<Message>, event: MessageUpdateEvent) {
        let Some(guild_id) = event.guild_id else {
            return;
        };
        let (Some(author), Some(content)) = (event.author.as_ref(), event.content.as_ref()) else {
            return;
        };
        if author.bot {
            return;
        }
        let before = old_if_available.as_ref().map(|m| m.content.as_str());
        if before == Some(content.as_str()) {
            return;
        }

        let embed = message_edited_embed(author.id.get(), event.channel_id.get(), event.id.get(), before, content);
        self.send_log(&ctx, guild_id, embed).await;
    }

    async fn guild_member_removal(&self, ctx: Context, guild_id: GuildId, user: User, _member_data_if_available: Option<Member>) {
        self.send_log(&ctx, guild_id, member_left_embed(&user.name)).await;
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new != Some(true) {
            return;
        }
        let registered = match self.data.database.begin_transaction().await {
            Ok(mut tx) => tx.ensure_guild(guild.id.get()),
            Err(e) => Err(e),
        };
        match registered {
            Ok(()) => info!("Joined guild {} ({})", guild.name, guild.id),
            Err(e) => error!("Could not register guild {}: {}", guild.id, e),
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Logged in as {}", ready.user.name);
    }
}

fn stripped_prefix<'a>(_ctx: &'a Context, msg: &'a Message, data: &'a Data) -> BoxFuture<'a, Result<Option<(&'a str, &'a str)>, Error>> {
    Box::pin(async move {
        let prefixes = data.prefixes(msg.guild_id.map(|g| g.get())).await?;
        Ok(strip_any_prefix(&msg.content, &prefixes))
    })
}

async fn gate_check(ctx: crate::discord::commands::Context<'_>) -> Result<bool, Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(true);
    };
    let command = ctx.command();
    ctx.data().gate.check(guild_id.get(), &command.qualified_name, command.category.as_deref()).await?;
    Ok(true)
}

async fn reply_failure(ctx: crate::discord::commands::Context<'_>, error: &Error) {
    let message = match error.downcast_ref::<BotError>() {
        Some(e) => {
            if !e.is_user_facing() {
                error!("Command {} failed: {}", ctx.command().qualified_name, e);
            }
            e.user_message()
        }
        None => {
            error!("Command {} failed: {}", ctx.command().qualified_name, error);
            "Something went wrong on my side. The error has been logged.".to_string()
        }
    };
    if let Err(e) = ctx.send(poise::CreateReply::default().embed(failure_embed(message))).await {
        warn!("Could not report a command failure: {}", e);
    }
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => reply_failure(ctx, &error).await,
        poise::FrameworkError::CommandCheckFailed { error: Some(error), ctx, .. } => reply_failure(ctx, &error).await,
        poise::FrameworkError::CommandCheckFailed { error: None, .. } => {}
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling an error: {}", e);
            }
        }
    }
}

pub struct JovanesBot {
    client: Client,
    consumer: Option<QueueConsumer>,
}

impl JovanesBot {
    pub async fn new(config: BotConfig) -> BotResult<Self> {
        let http = Arc::new(Http::new(&config.discord_token));
        let database = Database::new(&config.database_path)?;
        let sessions = SessionManager::new(GameServices::new(database.clone()), Arc::new(DiscordRenderer::new(http.clone())));
        let queue = RequestQueue::new();

        let web = reqwest::Client::new();
        let backend = Arc::new(OpenAiBackend::new(web.clone(), config.completion.clone()));
        let consumer = QueueConsumer::new(queue.clone(), backend, Arc::new(DiscordReplySink::new(http, sessions.clone())));

        let data = Data {
            config: config.clone(),
            gate: CommandGate::new(database.clone()),
            database,
            sessions,
            queue,
            trivia: TriviaClient::new(web),
            snipes: SnipeStore::new(),
        };

        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::GUILD_MEMBERS | GatewayIntents::MESSAGE_CONTENT;

        let framework_data = data.clone();
        let framework = poise::Framework::builder()
            .options(poise::FrameworkOptions {
                commands: all_commands(),
                prefix_options: poise::PrefixFrameworkOptions {
                    stripped_dynamic_prefix: Some(stripped_prefix),
                    ..Default::default()
                },
                owners: config.owner_ids.iter().map(|id| UserId::new(*id)).collect::<HashSet<_>>(),
                command_check: Some(|ctx| Box::pin(gate_check(ctx))),
                on_error: |error| Box::pin(on_error(error)),
                ..Default::default()
            })
            .setup(move |ctx, _ready, framework| {
                Box::pin(async move {
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                    Ok(framework_data)
                })
            })
            .build();

        let mut cache_settings = CacheSettings::default();
        cache_settings.max_messages = CACHED_MESSAGES;

        let client = Client::builder(&config.discord_token, intents)
            .event_handler(Handler { data })
            .framework(framework)
            .cache_settings(cache_settings)
            .await?;

        Ok(JovanesBot { client, consumer: Some(consumer) })
    }

    pub async fn run_bot(&mut self) -> BotResult<()> {
        let consumer = self.consumer.take().map(QueueConsumer::spawn);

        let result = self.client.start().await;
        if let Some(consumer) = consumer {
            consumer.abort();
        }
        info!("Bot stopped");
        Ok(result?)
    }
}
