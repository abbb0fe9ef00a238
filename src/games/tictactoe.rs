use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serenity::async_trait;

use crate::database::MatchTable;
use crate::errors::{BotError, BotResult};
use crate::games::{COLOUR_BLUE, COLOUR_GREEN, COLOUR_GREYPLE};
use crate::services::GameServices;
use crate::session::control::{Control, ControlStyle, BLANK_LABEL};
use crate::session::session::{Actor, EmbedSpec, InteractionEvent, InteractionSession, SessionEngine, TimerChange, Transition};

pub const CHALLENGE_TIMEOUT: Duration = Duration::from_secs(60);
pub const MOVE_TIMEOUT: Duration = Duration::from_secs(120);

const TITLE: &str = "Tic-Tac-Toe";

pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    fn as_str(&self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Square {
    Empty,
    Marked(Mark),
}

pub fn winning_line(grid: &[Square; 9]) -> Option<[usize; 3]> {
    WIN_LINES.into_iter().find(|line| match grid[line[0]] {
        Square::Marked(mark) => line.iter().all(|i| grid[*i] == Square::Marked(mark)),
        Square::Empty => false,
    })
}

enum Phase {
    Challenge { accept: String, decline: String },
    Playing { squares: Vec<String> },
}

/// A challenge that turns into a 3x3 game once the challenged player accepts.
pub struct TicTacToe {
    session: InteractionSession,
    challenger: Actor,
    challenged: Actor,
    phase: Phase,
    grid: [Square; 9],
    x_player: u64,
    current_turn: u64,
    move_count: u8,
    embed: EmbedSpec,
    rng: StdRng,
}

impl TicTacToe {
    pub fn new<R: Rng + ?Sized>(challenger: Actor, challenged: Actor, rng: &mut R) -> Self {
        let mut session = InteractionSession::new(Some(CHALLENGE_TIMEOUT));
        let accept = session.controls.register(Control::new(ControlStyle::Success).label("Accept"));
        let decline = session.controls.register(Control::new(ControlStyle::Danger).label("Decline"));

        let embed = EmbedSpec::new(COLOUR_BLUE)
            .title(TITLE)
            .description(format!("{} has challenged you to a tic-tac-toe game. Do you accept?", challenger.mention()));

        TicTacToe {
            session,
            x_player: challenger.id,
            current_turn: challenged.id,
            challenger,
            challenged,
            phase: Phase::Challenge { accept, decline },
            grid: [Square::Empty; 9],
            move_count: 0,
            embed,
            rng: StdRng::seed_from_u64(rng.gen()),
        }
    }

    fn player(&self, id: u64) -> &Actor {
        if id == self.challenger.id {
            &self.challenger
        } else {
            &self.challenged
        }
    }

    fn opponent(&self, id: u64) -> &Actor {
        if id == self.challenger.id {
            &self.challenged
        } else {
            &self.challenger
        }
    }

    fn mark_of(&self, id: u64) -> Mark {
        if id == self.x_player {
            Mark::X
        } else {
            Mark::O
        }
    }

    fn turn_description(&self) -> String {
        format!("{}'s (**{}**) turn.", self.player(self.current_turn).mention(), self.mark_of(self.current_turn).as_str())
    }

    fn render(&self, content: Option<String>) -> Transition {
        Transition::render(self.session.instruction(content, Some(self.embed.clone())))
    }

    fn accept(&mut self) -> Transition {
        let x_player = if self.rng.gen_bool(0.5) { self.challenger.id } else { self.challenged.id };
        self.x_player = x_player;
        self.current_turn = x_player;

        self.session.controls.clear();
        let squares = (0..9).map(|i| self.session.controls.register(Control::new(ControlStyle::Secondary).label(BLANK_LABEL).row(i / 3))).collect();
        self.phase = Phase::Playing { squares };

        self.embed = EmbedSpec::new(COLOUR_BLUE).title(TITLE).description(self.turn_description());
        let content = format!("{} V/S {}", self.challenger.mention(), self.challenged.mention());
        self.render(Some(content)).with_timer(TimerChange::Reset(MOVE_TIMEOUT))
    }

    fn decline(&mut self) -> Transition {
        self.session.controls.clear();
        self.embed = EmbedSpec::new(COLOUR_BLUE)
            .title(TITLE)
            .description(format!("{} declined {}'s challenge to a Tic-Tac-Toe match.", self.challenged.mention(), self.challenger.mention()));
        self.render(None).terminal()
    }

    async fn play(&mut self, actor: &Actor, index: usize, services: &GameServices) -> BotResult<Transition> {
        if self.grid[index] != Square::Empty {
            return Err(BotError::Rejected("This slot has already been marked.".to_string()));
        }

        let mark = self.mark_of(actor.id);
        let mut grid = self.grid;
        grid[index] = Square::Marked(mark);
        let line = winning_line(&grid);

        if line.is_some() {
            let rival = self.opponent(actor.id).id;
            let mut tx = services.database.begin_transaction().await?;
            tx.insert_match(MatchTable::TicTacToe, actor.id, rival)?;
        }

        self.grid = grid;
        self.move_count += 1;
        if let Phase::Playing { squares } = &self.phase {
            if let Some(control) = self.session.controls.get_mut(&squares[index]) {
                control.label = Some(mark.as_str().to_string());
            }
        }

        if let Some(line) = line {
            self.session.controls.disable_all();
            if let Phase::Playing { squares } = &self.phase {
                for i in line {
                    if let Some(control) = self.session.controls.get_mut(&squares[i]) {
                        control.style = ControlStyle::Success;
                    }
                }
            }

            self.embed = EmbedSpec::new(COLOUR_GREEN).title(TITLE).description(format!("{} has won the game.", actor.mention()));
            return Ok(self.render(None).terminal());
        }

        if self.move_count == 9 {
            self.session.controls.disable_all();
            self.embed = EmbedSpec::new(COLOUR_GREYPLE).title(TITLE).description("Game ended in a draw.");
            return Ok(self.render(None).terminal());
        }

        self.current_turn = self.opponent(actor.id).id;
        self.embed.description = Some(self.turn_description());
        Ok(self.render(None).with_timer(TimerChange::Reset(MOVE_TIMEOUT)))
    }
}

#[async_trait]
impl SessionEngine for TicTacToe {
    fn session(&self) -> &InteractionSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut InteractionSession {
        &mut self.session
    }

    fn authorize(&self, actor: &Actor) -> BotResult<()> {
        match self.phase {
            Phase::Challenge { .. } if actor.id != self.challenged.id => Err(BotError::Unauthorized(format!("This can only be used by {}.", self.challenged.mention()))),
            Phase::Playing { .. } if actor.id != self.current_turn => Err(BotError::Unauthorized(format!("This is {}'s turn.", self.player(self.current_turn).mention()))),
            _ => Ok(()),
        }
    }

    fn opening(&mut self) -> Transition {
        self.render(Some(self.challenged.mention()))
    }

    async fn on_interaction(&mut self, actor: &Actor, event: InteractionEvent, services: &GameServices) -> BotResult<Transition> {
        match &self.phase {
            Phase::Challenge { accept, decline } => {
                if &event.token == accept {
                    Ok(self.accept())
                } else if &event.token == decline {
                    Ok(self.decline())
                } else {
                    Err(BotError::SessionEnded)
                }
            }
            Phase::Playing { squares } => {
                let index = squares.iter().position(|t| *t == event.token).ok_or(BotError::SessionEnded)?;
                self.play(actor, index, services).await
            }
        }
    }

    async fn on_timeout(&mut self, services: &GameServices) -> BotResult<Transition> {
        match self.phase {
            Phase::Challenge { .. } => {
                self.embed = EmbedSpec::new(COLOUR_BLUE).title(TITLE).description("Invitation timed out.");
            }
            Phase::Playing { .. } => {
                let loser = self.player(self.current_turn).clone();
                let winner = self.opponent(self.current_turn).clone();

                let mut tx = services.database.begin_transaction().await?;
                tx.insert_match(MatchTable::TicTacToe, winner.id, loser.id)?;

                self.embed = EmbedSpec::new(COLOUR_GREEN)
                    .title(TITLE)
                    .description(format!("{} has won the game because {} didn't move in time.", winner.mention(), loser.mention()));
            }
        }
        self.session.controls.disable_all();
        Ok(self.render(None))
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;
    use crate::database::MatchRecord;
    use crate::session::manager::component_id;
    use crate::session::testing::{alice, bob, carol, settle_tasks, start_attached, test_manager};
    use crate::session::SessionManager;

    #[test]
    fn every_line_wins_and_mixed_lines_do_not() {
        for line in WIN_LINES {
            let mut grid = [Square::Empty; 9];
            for i in line {
                grid[i] = Square::Marked(Mark::O);
            }
            assert_eq!(winning_line(&grid), Some(line));

            grid[line[1]] = Square::Marked(Mark::X);
            assert_eq!(winning_line(&grid), None);
        }
    }

    #[test]
    fn full_board_without_a_line_is_a_draw() {
        use Mark::*;
        let marks = [X, O, X, X, O, O, O, X, X];
        let grid = marks.map(Square::Marked);
        assert_eq!(winning_line(&grid), None);
    }

    /// Accepts the challenge and returns (session id, squares, who moves first).
    async fn accepted_game(manager: &SessionManager, seed: u64) -> (String, Vec<String>, u64) {
        let game = TicTacToe::new(alice(), bob(), &mut StdRng::seed_from_u64(seed));
        let accept = match &game.phase {
            Phase::Challenge { accept, .. } => accept.clone(),
            Phase::Playing { .. } => unreachable!(),
        };
        let (id, _) = start_attached(manager, Box::new(game)).await;

        let refused = manager.dispatch(&component_id(&id, &accept), &alice(), None).await.unwrap_err();
        assert!(matches!(refused, BotError::Unauthorized(ref m) if m.contains("<@2>")));

        let accepted = manager.dispatch(&component_id(&id, &accept), &bob(), None).await.unwrap();
        let render = accepted.render.unwrap();
        let squares: Vec<String> = render.controls.iter().map(|c| c.token.clone()).collect();
        assert_eq!(squares.len(), 9);

        let description = render.embed.unwrap().description.unwrap();
        let first = if description.starts_with("<@1>") { 1 } else { 2 };
        assert!(description.contains("(**X**)"));
        (id, squares, first)
    }

    fn actor(id: u64) -> Actor {
        if id == 1 {
            alice()
        } else {
            bob()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn diagonal_win_is_persisted() {
        let (manager, _renderer) = test_manager();
        let (id, squares, first) = accepted_game(&manager, 11).await;
        let second = if first == 1 { 2 } else { 1 };

        let moves = [(first, 0), (second, 1), (first, 4), (second, 2)];
        for (player, square) in moves {
            let transition = manager.dispatch(&component_id(&id, &squares[square]), &actor(player), None).await.unwrap();
            assert!(!transition.terminal);
        }

        let out_of_turn = manager.dispatch(&component_id(&id, &squares[8]), &actor(second), None).await.unwrap_err();
        assert!(matches!(out_of_turn, BotError::Unauthorized(_)));
        let marked = manager.dispatch(&component_id(&id, &squares[4]), &actor(first), None).await.unwrap_err();
        assert!(matches!(marked, BotError::Rejected(ref m) if m == "This slot has already been marked."));

        let winning = manager.dispatch(&component_id(&id, &squares[8]), &actor(first), None).await.unwrap();
        assert!(winning.terminal);
        let controls = winning.render.unwrap().controls;
        let green: Vec<usize> = controls.iter().enumerate().filter(|(_, c)| c.style == ControlStyle::Success).map(|(i, _)| i).collect();
        assert_eq!(green, vec![0, 4, 8]);
        assert!(controls.iter().all(|c| c.disabled));

        let mut tx = manager.services().database.begin_transaction().await.unwrap();
        assert_eq!(tx.load_matches_of(MatchTable::TicTacToe, first).unwrap(), vec![MatchRecord { winner: first, rival: second }]);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecorded_win_leaves_the_board_unmarked() {
        let (manager, renderer) = test_manager();
        let (id, squares, first) = accepted_game(&manager, 11).await;
        let second = if first == 1 { 2 } else { 1 };

        for (player, square) in [(first, 0), (second, 1), (first, 4), (second, 2)] {
            manager.dispatch(&component_id(&id, &squares[square]), &actor(player), None).await.unwrap();
        }

        {
            let mut tx = manager.services().database.begin_transaction().await.unwrap();
            tx.run_sql("DROP TABLE tictactoe").unwrap();
        }
        let failed = manager.dispatch(&component_id(&id, &squares[8]), &actor(first), None).await.unwrap_err();
        assert!(matches!(failed, BotError::Database(_)));
        assert_eq!(manager.active_sessions(), 0);

        let renders = renderer.renders().await;
        assert_eq!(renders.len(), 1);
        let controls = &renders[0].1.controls;
        assert!(controls.iter().all(|c| c.disabled && c.style != ControlStyle::Success));
        assert_eq!(controls[8].label.as_deref(), Some(BLANK_LABEL));
        assert_eq!(controls[0].label.as_deref(), Some("X"));
    }

    #[tokio::test(start_paused = true)]
    async fn draw_persists_nothing() {
        let (manager, _renderer) = test_manager();
        let (id, squares, first) = accepted_game(&manager, 5).await;
        let second = if first == 1 { 2 } else { 1 };

        // X O X / X O O / O X X
        let order = [(first, 0), (second, 1), (first, 2), (second, 4), (first, 3), (second, 5), (first, 7), (second, 6), (first, 8)];
        let mut last = None;
        for (player, square) in order {
            last = Some(manager.dispatch(&component_id(&id, &squares[square]), &actor(player), None).await.unwrap());
        }

        let last = last.unwrap();
        assert!(last.terminal);
        assert_eq!(last.render.unwrap().embed.unwrap().description.as_deref(), Some("Game ended in a draw."));

        let mut tx = manager.services().database.begin_transaction().await.unwrap();
        assert!(tx.match_leaderboard(MatchTable::TicTacToe).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_player_forfeits_after_two_minutes() {
        let (manager, renderer) = test_manager();
        let (id, squares, first) = accepted_game(&manager, 9).await;
        let second = if first == 1 { 2 } else { 1 };

        sleep(Duration::from_secs(100)).await;
        manager.dispatch(&component_id(&id, &squares[0]), &actor(first), None).await.unwrap();

        // The first player's move restarted the clock.
        sleep(Duration::from_secs(100)).await;
        settle_tasks().await;
        assert!(renderer.renders().await.is_empty());

        sleep(Duration::from_secs(21)).await;
        settle_tasks().await;
        let renders = renderer.renders().await;
        assert_eq!(renders.len(), 1);
        let description = renders[0].1.embed.clone().unwrap().description.unwrap();
        assert_eq!(description, format!("<@{}> has won the game because <@{}> didn't move in time.", first, second));

        let mut tx = manager.services().database.begin_transaction().await.unwrap();
        assert_eq!(tx.match_leaderboard(MatchTable::TicTacToe).unwrap(), vec![(first, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn challenge_can_be_declined_or_expire() {
        let (manager, renderer) = test_manager();

        let game = TicTacToe::new(alice(), bob(), &mut StdRng::seed_from_u64(1));
        let decline = match &game.phase {
            Phase::Challenge { decline, .. } => decline.clone(),
            Phase::Playing { .. } => unreachable!(),
        };
        let (id, _) = start_attached(&manager, Box::new(game)).await;
        let stranger = manager.dispatch(&component_id(&id, &decline), &carol(), None).await.unwrap_err();
        assert!(matches!(stranger, BotError::Unauthorized(_)));
        let declined = manager.dispatch(&component_id(&id, &decline), &bob(), None).await.unwrap();
        assert!(declined.terminal);
        assert!(declined.render.unwrap().controls.is_empty());

        let (_, _) = start_attached(&manager, Box::new(TicTacToe::new(alice(), bob(), &mut StdRng::seed_from_u64(2)))).await;
        sleep(CHALLENGE_TIMEOUT).await;
        settle_tasks().await;
        let renders = renderer.renders().await;
        assert_eq!(renders.len(), 1);
        assert_eq!(renders[0].1.embed.clone().unwrap().description.as_deref(), Some("Invitation timed out."));
        assert_eq!(manager.active_sessions(), 0);
    }
}
