use crate::ai::RequestQueue;
use crate::config::BotConfig;
use crate::database::Database;
use crate::discord::commands::fun::SnipeStore;
use crate::discord::render::reply_from_instruction;
use crate::errors::BotResult;
use crate::games::opentdb::TriviaClient;
use crate::gate::CommandGate;
use crate::session::{RenderTarget, SessionEngine, SessionManager};

pub mod ai;
pub mod fun;
pub mod games;
pub mod leaderboards;
pub mod management;
pub mod owner;

/// Shared state available to every command and event.
#[derive(Clone)]
pub struct Data {
    pub config: BotConfig,
    pub database: Database,
    pub sessions: SessionManager,
    pub gate: CommandGate,
    pub queue: RequestQueue,
    pub trivia: TriviaClient,
    pub snipes: SnipeStore,
}

impl Data {
    /// The guild's prefixes, or the configured default when none are stored.
    pub async fn prefixes(&self, guild_id: Option<u64>) -> BotResult<Vec<String>> {
        let Some(guild_id) = guild_id else {
            return Ok(vec![self.config.default_prefix.clone()]);
        };
        let mut tx = self.database.begin_transaction().await?;
        let prefixes = tx.load_prefixes(guild_id)?;
        if prefixes.is_empty() {
            return Ok(vec![self.config.default_prefix.clone()]);
        }
        Ok(prefixes)
    }
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

pub fn all_commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        games::trivia(),
        games::memory(),
        games::tictactoe(),
        games::rps(),
        games::guess(),
        leaderboards::trivialb(),
        leaderboards::memorylb(),
        leaderboards::tictactoelb(),
        leaderboards::rpslb(),
        leaderboards::guesslb(),
        management::enable(),
        management::disable(),
        management::disabled(),
        management::prefix(),
        management::setlogging(),
        ai::chat(),
        ai::draw(),
        fun::snipe(),
        fun::eight_ball(),
        fun::avatar(),
        fun::ship(),
        fun::mock(),
        owner::shutdown(),
    ]
}

/// Registers the engine, posts its opening render and attaches the session to the sent message.
pub async fn start_session(ctx: Context<'_>, engine: Box<dyn SessionEngine>) -> Result<(), Error> {
    let sessions = &ctx.data().sessions;
    let (id, opening) = sessions.start(engine).await;
    let Some(instruction) = opening.render else {
        return Ok(());
    };

    let sent = async {
        let handle = ctx.send(reply_from_instruction(&instruction)).await?;
        let message = handle.message().await?;
        Ok::<_, serenity::Error>(RenderTarget {
            channel_id: message.channel_id.get(),
            message_id: message.id.get(),
        })
    }
    .await;

    match sent {
        Ok(target) => {
            sessions.attach(&id, target).await;
            Ok(())
        }
        Err(e) => {
            sessions.stop(&id).await;
            Err(e.into())
        }
    }
}
