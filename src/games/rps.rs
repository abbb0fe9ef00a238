use std::collections::HashMap;
use std::time::Duration;

use serenity::async_trait;

use crate::database::MatchTable;
use crate::errors::{BotError, BotResult};
use crate::games::{COLOUR_BLUE, COLOUR_GREEN, COLOUR_GREYPLE};
use crate::services::GameServices;
use crate::session::control::{Control, ControlStyle};
use crate::session::session::{Actor, EmbedSpec, InteractionEvent, InteractionSession, Notice, SessionEngine, Transition};

pub const RPS_TIMEOUT: Duration = Duration::from_secs(300);

const WAITING: &str = "Waiting for response.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn beats(&self, other: Move) -> bool {
        matches!((self, other), (Move::Rock, Move::Scissors) | (Move::Paper, Move::Rock) | (Move::Scissors, Move::Paper))
    }

    fn label(&self) -> &'static str {
        match self {
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
        }
    }

    fn button_emoji(&self) -> &'static str {
        match self {
            Move::Rock => "\u{1faa8}",
            Move::Paper => "\u{1f4c4}",
            Move::Scissors => "\u{2702}",
        }
    }

    fn shortcode(&self) -> &'static str {
        match self {
            Move::Rock => ":rock:",
            Move::Paper => ":page_facing_up:",
            Move::Scissors => ":scissors:",
        }
    }
}

/// The winning move of a pair, `None` on a draw.
pub fn get_winner(a: Move, b: Move) -> Option<Move> {
    if a.beats(b) {
        Some(a)
    } else if b.beats(a) {
        Some(b)
    } else {
        None
    }
}

/// Simultaneous single-move match; choices stay hidden until both are in.
pub struct Rps {
    session: InteractionSession,
    players: [Actor; 2],
    moves: HashMap<u64, Move>,
    buttons: Vec<(String, Move)>,
    embed: EmbedSpec,
}

impl Rps {
    pub fn new(player_1: Actor, player_2: Actor) -> Self {
        let mut session = InteractionSession::new(Some(RPS_TIMEOUT));
        let buttons = Move::ALL
            .into_iter()
            .map(|m| (session.controls.register(Control::new(ControlStyle::Secondary).label(m.label()).emoji(m.button_emoji())), m))
            .collect();

        let embed = EmbedSpec::new(COLOUR_BLUE)
            .title("RPS Match")
            .description("Waiting for both players to make their move.")
            .field(player_1.name.clone(), WAITING, true)
            .field(player_2.name.clone(), WAITING, true);

        Rps {
            session,
            players: [player_1, player_2],
            moves: HashMap::new(),
            buttons,
            embed,
        }
    }

    fn set_player_field(&mut self, slot: usize, value: String) {
        if let Some(field) = self.embed.fields.get_mut(slot) {
            field.value = value;
        }
    }

    fn render(&self, content: Option<String>) -> Transition {
        Transition::render(self.session.instruction(content, Some(self.embed.clone())))
    }

    fn reveal(&mut self, first: Move, second: Move) -> Transition {
        self.set_player_field(0, format!("{} {}", first.shortcode(), first.label()));
        self.set_player_field(1, format!("{} {}", second.shortcode(), second.label()));
        self.session.controls.disable_all();

        match get_winner(first, second) {
            Some(winning) => {
                let winner = if winning == first { &self.players[0] } else { &self.players[1] };
                self.embed.description = Some(format!("{} has won the game.", winner.mention()));
                self.embed.colour = COLOUR_GREEN;
            }
            None => {
                self.embed.description = Some("Both the players made the same move. Game ended in a draw.".to_string());
                self.embed.colour = COLOUR_GREYPLE;
            }
        }
        self.render(None).terminal()
    }
}

#[async_trait]
impl SessionEngine for Rps {
    fn session(&self) -> &InteractionSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut InteractionSession {
        &mut self.session
    }

    fn authorize(&self, actor: &Actor) -> BotResult<()> {
        if self.players.iter().all(|p| p.id != actor.id) {
            return Err(BotError::Unauthorized("You are not a part of this match.".to_string()));
        }
        Ok(())
    }

    fn opening(&mut self) -> Transition {
        self.render(Some(format!("{} V/S {}", self.players[0].mention(), self.players[1].mention())))
    }

    async fn on_interaction(&mut self, actor: &Actor, event: InteractionEvent, services: &GameServices) -> BotResult<Transition> {
        if self.moves.contains_key(&actor.id) {
            return Err(BotError::Rejected("You already made your move in this match.".to_string()));
        }
        let chosen = self.buttons.iter().find(|(token, _)| *token == event.token).map(|(_, m)| *m).ok_or(BotError::SessionEnded)?;

        let slot = if self.players[0].id == actor.id { 0 } else { 1 };
        let other = self.moves.get(&self.players[1 - slot].id).copied();

        if let Some(other) = other {
            let (first, second) = if slot == 0 { (chosen, other) } else { (other, chosen) };
            if let Some(winning) = get_winner(first, second) {
                let (winner, rival) = if winning == first { (0, 1) } else { (1, 0) };
                let mut tx = services.database.begin_transaction().await?;
                tx.insert_match(MatchTable::Rps, self.players[winner].id, self.players[rival].id)?;
            }

            self.moves.insert(actor.id, chosen);
            return Ok(self.reveal(first, second));
        }

        self.moves.insert(actor.id, chosen);
        self.set_player_field(slot, "Moved.".to_string());
        Ok(self.render(None).with_notice(Notice::private(format!("You selected {} {}.", chosen.shortcode(), chosen.label()))))
    }

    async fn on_timeout(&mut self, _services: &GameServices) -> BotResult<Transition> {
        self.session.controls.disable_all();

        let unmoved: Vec<String> = self.players.iter().filter(|p| !self.moves.contains_key(&p.id)).map(|p| p.mention()).collect();
        self.embed.description = Some(format!("{} didn't move in time.", unmoved.join(" and ")));
        self.embed.colour = COLOUR_GREYPLE;
        Ok(self.render(None))
    }
}
