use tracing::info;

use crate::database::Database;
use crate::errors::{BotError, BotResult, EntityKind};

/// Module whose commands can never be disabled, otherwise a guild could lock itself out.
pub const PROTECTED_MODULE: &str = "Management";

/// A command or module name resolved against the registered commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateEntity {
    pub name: String,
    pub kind: EntityKind,
    /// Owning module; for a module this is the module itself.
    pub module: Option<String>,
}

impl GateEntity {
    pub fn command(name: impl Into<String>, module: Option<&str>) -> Self {
        GateEntity {
            name: name.into(),
            kind: EntityKind::Command,
            module: module.map(str::to_string),
        }
    }

    pub fn module(name: impl Into<String>) -> Self {
        let name = name.into();
        GateEntity {
            module: Some(name.clone()),
            name,
            kind: EntityKind::Module,
        }
    }

    fn is_protected(&self) -> bool {
        self.module.as_deref() == Some(PROTECTED_MODULE)
    }
}

/// Per-guild allow/deny check run before every guild command.
#[derive(Clone, Debug)]
pub struct CommandGate {
    database: Database,
}

impl CommandGate {
    pub fn new(database: Database) -> Self {
        CommandGate { database }
    }

    pub async fn is_disabled(&self, entity: &str, guild_id: u64) -> BotResult<bool> {
        if entity == PROTECTED_MODULE {
            return Ok(false);
        }
        let mut tx = self.database.begin_transaction().await?;
        tx.is_disabled(guild_id, entity)
    }

    /// Fails with `EntityDisabled` when the command or its module is disabled in the guild.
    pub async fn check(&self, guild_id: u64, command: &str, module: Option<&str>) -> BotResult<()> {
        if module == Some(PROTECTED_MODULE) {
            return Ok(());
        }
        if self.is_disabled(command, guild_id).await? {
            return Err(BotError::EntityDisabled(EntityKind::Command));
        }
        if let Some(module) = module {
            if self.is_disabled(module, guild_id).await? {
                return Err(BotError::EntityDisabled(EntityKind::Module));
            }
        }
        Ok(())
    }

    pub async fn disable(&self, guild_id: u64, entity: &GateEntity) -> BotResult<()> {
        if entity.is_protected() {
            return Err(BotError::ProtectedEntity);
        }
        let mut tx = self.database.begin_transaction().await?;
        if !tx.insert_disabled(guild_id, &entity.name)? {
            return Err(BotError::AlreadyDisabled(entity.kind));
        }
        info!("Disabled {} {} in guild {}", entity.kind, entity.name, guild_id);
        Ok(())
    }

    pub async fn enable(&self, guild_id: u64, entity: &GateEntity) -> BotResult<()> {
        let mut tx = self.database.begin_transaction().await?;
        if !tx.delete_disabled(guild_id, &entity.name)? {
            return Err(BotError::AlreadyEnabled(entity.kind));
        }
        info!("Enabled {} {} in guild {}", entity.kind, entity.name, guild_id);
        Ok(())
    }

    pub async fn disabled_entities(&self, guild_id: u64) -> BotResult<Vec<String>> {
        let mut tx = self.database.begin_transaction().await?;
        tx.load_disabled(guild_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: u64 = 10;

    fn gate() -> CommandGate {
        CommandGate::new(Database::in_memory().unwrap())
    }

    #[tokio::test]
    async fn disabling_twice_is_reported_not_applied() {
        let gate = gate();
        let trivia = GateEntity::command("trivia", Some("Games"));

        gate.disable(GUILD, &trivia).await.unwrap();
        let again = gate.disable(GUILD, &trivia).await.unwrap_err();
        assert!(matches!(again, BotError::AlreadyDisabled(EntityKind::Command)));
        assert_eq!(again.to_string(), "This **command** is already disabled.");
        assert_eq!(gate.disabled_entities(GUILD).await.unwrap(), vec!["trivia"]);

        gate.enable(GUILD, &trivia).await.unwrap();
        let again = gate.enable(GUILD, &trivia).await.unwrap_err();
        assert!(matches!(again, BotError::AlreadyEnabled(EntityKind::Command)));
        assert!(gate.disabled_entities(GUILD).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn check_blocks_on_command_or_module() {
        let gate = gate();
        gate.check(GUILD, "trivia", Some("Games")).await.unwrap();

        gate.disable(GUILD, &GateEntity::module("Games")).await.unwrap();
        let blocked = gate.check(GUILD, "memory", Some("Games")).await.unwrap_err();
        assert!(matches!(blocked, BotError::EntityDisabled(EntityKind::Module)));

        gate.disable(GUILD, &GateEntity::command("chat", Some("AI"))).await.unwrap();
        let blocked = gate.check(GUILD, "chat", Some("AI")).await.unwrap_err();
        assert_eq!(blocked.to_string(), "This command is currently disabled.");

        // Other guilds are unaffected.
        gate.check(GUILD + 1, "chat", Some("AI")).await.unwrap();
    }

    #[tokio::test]
    async fn management_cannot_be_disabled() {
        let gate = gate();
        let module = gate.disable(GUILD, &GateEntity::module(PROTECTED_MODULE)).await.unwrap_err();
        assert!(matches!(module, BotError::ProtectedEntity));
        let command = gate.disable(GUILD, &GateEntity::command("enable", Some(PROTECTED_MODULE))).await.unwrap_err();
        assert!(matches!(command, BotError::ProtectedEntity));

        assert!(!gate.is_disabled(PROTECTED_MODULE, GUILD).await.unwrap());
        gate.check(GUILD, "disable", Some(PROTECTED_MODULE)).await.unwrap();
    }
}
