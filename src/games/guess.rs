use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serenity::async_trait;

use crate::errors::{BotError, BotResult};
use crate::games::{COLOUR_BLUE, COLOUR_GREEN, COLOUR_GREYPLE};
use crate::services::GameServices;
use crate::session::control::{Control, ControlStyle};
use crate::session::session::{Actor, EmbedSpec, InteractionEvent, InteractionSession, ModalSpec, Notice, SessionEngine, Transition};

pub const GUESS_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_MIN: i64 = 1;
pub const DEFAULT_MAX: i64 = 100;
pub const DEFAULT_GUESSES: u32 = 3;

const LOG_FIELD: &str = "Guesses";
const LOG_FIELD_LIMIT: usize = 1024;
const EMPTY_LOG: &str = "No guesses yet.";
const RIGHT: &str = "\u{2713}";
const WRONG: &str = "\u{2717}";

/// Number guessing open to the whole channel, with a per-player guess budget.
pub struct Guess {
    session: InteractionSession,
    secret: i64,
    min: i64,
    max: i64,
    budget: u32,
    used: HashMap<u64, u32>,
    log: Vec<String>,
    button: String,
    embed: EmbedSpec,
}

impl Guess {
    pub fn new<R: Rng + ?Sized>(host: &Actor, min: i64, max: i64, budget: u32, rng: &mut R) -> BotResult<Self> {
        if min >= max {
            return Err(BotError::ValidationFailed("The minimum must be lower than the maximum.".to_string()));
        }
        if budget == 0 {
            return Err(BotError::ValidationFailed("Each player needs at least one guess.".to_string()));
        }
        Ok(Self::with_secret(host, min, max, budget, rng.gen_range(min..=max)))
    }

    fn with_secret(host: &Actor, min: i64, max: i64, budget: u32, secret: i64) -> Self {
        let mut session = InteractionSession::new(Some(GUESS_TIMEOUT));
        let button = session.controls.register(Control::new(ControlStyle::Secondary).label("Guess"));

        let embed = EmbedSpec::new(COLOUR_BLUE)
            .title("Guess the Number")
            .description(format!("Guess the number between `{}` and `{}`.", min, max))
            .field("Range", format!("{} - {}", min, max), true)
            .field("Guesses per player", budget.to_string(), true)
            .field(LOG_FIELD, EMPTY_LOG, false)
            .author(format!("{}'s game", host.name));

        Guess {
            session,
            secret,
            min,
            max,
            budget,
            used: HashMap::new(),
            log: Vec::new(),
            button,
            embed,
        }
    }

    pub fn remaining(&self, player: u64) -> u32 {
        self.budget.saturating_sub(self.used.get(&player).copied().unwrap_or(0))
    }

    fn parse(&self, input: &str) -> BotResult<i64> {
        let guess: i64 = input.trim().parse().map_err(|_| BotError::ValidationFailed("Input must be an integer.".to_string()))?;
        if guess < self.min || guess > self.max {
            return Err(BotError::ValidationFailed(format!("The range is `{} - {}`. Your input was `{}`.", self.min, self.max, guess)));
        }
        Ok(guess)
    }

    /// Appends a line, dropping the oldest ones once the field would overflow.
    fn push_log(&mut self, line: String) {
        self.log.push(line);
        let mut length = self.log.iter().map(|l| l.chars().count() + 1).sum::<usize>() - 1;
        while length > LOG_FIELD_LIMIT && self.log.len() > 1 {
            length -= self.log.remove(0).chars().count() + 1;
        }
        self.embed.set_field(LOG_FIELD, self.log.join("\n"), false);
    }

    fn render(&self, content: Option<String>) -> Transition {
        Transition::render(self.session.instruction(content, Some(self.embed.clone())))
    }

    async fn submit(&mut self, actor: &Actor, input: &str, services: &GameServices) -> BotResult<Transition> {
        let guess = self.parse(input)?;
        if self.remaining(actor.id) == 0 {
            return Err(BotError::Rejected("You reached your maximum guesses.".to_string()));
        }

        if guess != self.secret {
            *self.used.entry(actor.id).or_insert(0) += 1;
            self.push_log(format!("{} {}", WRONG, actor.name));
            let left = self.remaining(actor.id);
            return Ok(self.render(None).with_notice(Notice::private(format!("Your guess was wrong. You have {} guess(es) left.", left))));
        }

        let mut tx = services.database.begin_transaction().await?;
        tx.record_guess_win(actor.id)?;
        drop(tx);

        *self.used.entry(actor.id).or_insert(0) += 1;
        self.push_log(format!("{} {}", RIGHT, actor.name));
        if let Some(button) = self.session.controls.get_mut(&self.button) {
            button.label = Some(format!("Winner: {}", actor.name));
            button.disabled = true;
        }
        self.embed.colour = COLOUR_GREEN;

        let notice = Notice::public(format!("{} won the game. The number was {}.", actor.mention(), guess));
        Ok(self.render(None).with_notice(notice).terminal())
    }
}

#[async_trait]
impl SessionEngine for Guess {
    fn session(&self) -> &InteractionSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut InteractionSession {
        &mut self.session
    }

    fn authorize(&self, _actor: &Actor) -> BotResult<()> {
        Ok(())
    }

    fn opening(&mut self) -> Transition {
        self.render(None)
    }

    async fn on_interaction(&mut self, actor: &Actor, event: InteractionEvent, services: &GameServices) -> BotResult<Transition> {
        match event.input {
            Some(input) => self.submit(actor, &input, services).await,
            None => {
                if self.remaining(actor.id) == 0 {
                    return Err(BotError::Rejected("You reached your maximum guesses.".to_string()));
                }
                Ok(Transition::modal(ModalSpec {
                    token: self.button.clone(),
                    title: "Guess".to_string(),
                    input_label: "Guess".to_string(),
                    placeholder: format!("Type a number in the range {} - {}", self.min, self.max),
                }))
            }
        }
    }

    async fn on_timeout(&mut self, _services: &GameServices) -> BotResult<Transition> {
        self.session.controls.disable_all();
        self.embed.colour = COLOUR_GREYPLE;
        Ok(self.render(Some(format!("No one guessed the correct number. It was `{}`.", self.secret))))
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::time::sleep;

    use super::*;
    use crate::session::manager::component_id;
    use crate::session::testing::{alice, bob, settle_tasks, start_attached, test_manager};

    fn player() -> Actor {
        Actor::new(9, "player")
    }

    #[test]
    fn rejects_bad_settings() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(Guess::new(&alice(), 10, 10, 3, &mut rng), Err(BotError::ValidationFailed(_))));
        assert!(matches!(Guess::new(&alice(), 1, 10, 0, &mut rng), Err(BotError::ValidationFailed(_))));

        let guess = Guess::new(&alice(), 1, 10, 2, &mut rng).unwrap();
        assert!((1..=10).contains(&guess.secret));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_then_right_guess_wins_and_stops_the_timer() {
        let (manager, renderer) = test_manager();
        let game = Guess::with_secret(&alice(), 1, 100, 3, 42);
        let button = game.button.clone();
        let (id, _) = start_attached(&manager, Box::new(game)).await;
        let custom_id = component_id(&id, &button);

        let opened = manager.dispatch(&custom_id, &player(), None).await.unwrap();
        let modal = opened.modal.unwrap();
        assert_eq!(modal.token, button);
        assert_eq!(modal.placeholder, "Type a number in the range 1 - 100");

        let wrong = manager.dispatch(&custom_id, &player(), Some("10".to_string())).await.unwrap();
        assert!(!wrong.terminal);
        assert_eq!(wrong.notice.unwrap().content, "Your guess was wrong. You have 2 guess(es) left.");
        assert_eq!(wrong.render.unwrap().embed.unwrap().field_value(LOG_FIELD), Some("✗ player"));

        let right = manager.dispatch(&custom_id, &player(), Some(" 42 ".to_string())).await.unwrap();
        assert!(right.terminal);
        let notice = right.notice.unwrap();
        assert!(!notice.ephemeral);
        let render = right.render.unwrap();
        assert_eq!(render.controls[0].label.as_deref(), Some("Winner: player"));
        assert!(render.controls[0].disabled);
        assert_eq!(render.embed.unwrap().field_value(LOG_FIELD), Some("✗ player\n✓ player"));

        let mut tx = manager.services().database.begin_transaction().await.unwrap();
        assert_eq!(tx.guess_leaderboard().unwrap(), vec![(9, 1)]);
        drop(tx);

        sleep(GUESS_TIMEOUT).await;
        settle_tasks().await;
        assert!(renderer.renders().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_input_keeps_budget_and_exhausted_players_are_blocked() {
        let (manager, _renderer) = test_manager();
        let game = Guess::with_secret(&alice(), 1, 100, 1, 42);
        let custom_id = component_id(&game.session.id().to_string(), &game.button);
        let (_, _) = start_attached(&manager, Box::new(game)).await;

        let not_a_number = manager.dispatch(&custom_id, &bob(), Some("forty".to_string())).await.unwrap_err();
        assert_eq!(not_a_number.to_string(), "Input must be an integer.");
        let out_of_range = manager.dispatch(&custom_id, &bob(), Some("101".to_string())).await.unwrap_err();
        assert_eq!(out_of_range.to_string(), "The range is `1 - 100`. Your input was `101`.");

        manager.dispatch(&custom_id, &bob(), Some("7".to_string())).await.unwrap();
        let blocked = manager.dispatch(&custom_id, &bob(), None).await.unwrap_err();
        assert_eq!(blocked.to_string(), "You reached your maximum guesses.");
        let blocked = manager.dispatch(&custom_id, &bob(), Some("42".to_string())).await.unwrap_err();
        assert!(matches!(blocked, BotError::Rejected(_)));

        // Other players keep their own budget.
        assert!(manager.dispatch(&custom_id, &alice(), None).await.unwrap().modal.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn long_log_keeps_the_newest_lines() {
        let (manager, _renderer) = test_manager();
        let game = Guess::with_secret(&alice(), 1, 1000, 200, 999);
        let button = game.button.clone();
        let (id, _) = start_attached(&manager, Box::new(game)).await;
        let custom_id = component_id(&id, &button);

        let mut last = None;
        for n in 0..80 {
            let guesser = Actor::new(100 + n % 4, format!("a_rather_long_player_name_{}", n));
            last = Some(manager.dispatch(&custom_id, &guesser, Some("1".to_string())).await.unwrap());
        }

        let embed = last.unwrap().render.unwrap().embed.unwrap();
        let log = embed.field_value(LOG_FIELD).unwrap();
        assert!(log.chars().count() <= LOG_FIELD_LIMIT);
        assert!(log.ends_with("✗ a_rather_long_player_name_79"));
        assert!(!log.contains("a_rather_long_player_name_0\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn unrecorded_win_keeps_the_game_open() {
        let (manager, _renderer) = test_manager();
        let services = manager.services();
        let mut game = Guess::with_secret(&alice(), 1, 100, 2, 42);
        let submit = |input: &str| InteractionEvent { token: game.button.clone(), input: Some(input.to_string()) };
        let (wrong, right) = (submit("5"), submit("42"));

        game.on_interaction(&bob(), wrong, services).await.unwrap();
        {
            let mut tx = services.database.begin_transaction().await.unwrap();
            tx.run_sql("DROP TABLE guess").unwrap();
        }
        let failed = game.on_interaction(&bob(), right, services).await.unwrap_err();
        assert!(matches!(failed, BotError::Database(_)));

        assert_eq!(game.remaining(2), 1);
        assert_eq!(game.embed.colour, COLOUR_BLUE);
        assert_eq!(game.embed.field_value(LOG_FIELD), Some("✗ bob"));
        let button = &game.session.controls.snapshot()[0];
        assert_eq!(button.label.as_deref(), Some("Guess"));
        assert!(!button.disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn unsolved_game_reveals_the_number() {
        let (manager, renderer) = test_manager();
        let game = Guess::with_secret(&alice(), 1, 100, 3, 42);
        start_attached(&manager, Box::new(game)).await;

        sleep(GUESS_TIMEOUT).await;
        settle_tasks().await;

        let renders = renderer.renders().await;
        assert_eq!(renders[0].1.content.as_deref(), Some("No one guessed the correct number. It was `42`."));
        assert!(renders[0].1.controls[0].disabled);
        let mut tx = manager.services().database.begin_transaction().await.unwrap();
        assert!(tx.guess_leaderboard().unwrap().is_empty());
    }
}
