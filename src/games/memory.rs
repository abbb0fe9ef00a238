use std::time::Duration;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use rand::Rng;
use serenity::async_trait;
use tokio::time::Instant;

use crate::errors::{BotError, BotResult};
use crate::services::GameServices;
use crate::session::control::{Control, ControlStyle, BLANK_LABEL};
use crate::session::session::{Actor, DeferredEvent, InteractionEvent, InteractionSession, SessionEngine, Transition};

pub const MEMORY_TIMEOUT: Duration = Duration::from_secs(300);
pub const PREVIEW_DURATION: Duration = Duration::from_secs(3);
pub const MISMATCH_FLASH: Duration = Duration::from_secs(1);

const BOARD_SIZE: usize = 25;
const CENTER: usize = 12;
const PAIRS: usize = 12;
const MASK: &str = "\u{2753}";

lazy_static! {
    static ref MEMORY_EMOJIS: Vec<String> = serde_json::from_str::<IndexMap<String, String>>(include_str!("../../assets/emoji_map.json"))
        .expect("bundled emoji map is valid JSON")
        .into_values()
        .collect();
}

/// Twelve distinct symbols, each placed twice, around an empty center cell.
pub fn deal_board<R: Rng + ?Sized>(rng: &mut R) -> Vec<Option<String>> {
    let mut symbols: Vec<String> = MEMORY_EMOJIS.choose_multiple(rng, PAIRS).cloned().collect();
    symbols.extend(symbols.clone());
    symbols.shuffle(rng);

    let mut board: Vec<Option<String>> = symbols.into_iter().map(Some).collect();
    board.insert(CENTER, None);
    board
}

struct Cell {
    symbol: Option<String>,
    token: String,
    matched: bool,
}

pub struct Memory {
    session: InteractionSession,
    owner: Actor,
    cells: Vec<Cell>,
    selected: Option<usize>,
    finished: usize,
    preview_ended_at: Option<Instant>,
}

impl Memory {
    pub fn new<R: Rng + ?Sized>(owner: Actor, rng: &mut R) -> Self {
        let mut session = InteractionSession::new(Some(MEMORY_TIMEOUT));
        let cells = deal_board(rng)
            .into_iter()
            .enumerate()
            .map(|(i, symbol)| {
                let row = (i / 5) as u8;
                let control = match &symbol {
                    Some(symbol) => Control::new(ControlStyle::Secondary).emoji(symbol.clone()).row(row),
                    None => Control::new(ControlStyle::Primary).label(BLANK_LABEL).disabled(true).row(row),
                };
                let token = session.controls.register(control);
                Cell { symbol, token, matched: false }
            })
            .collect();

        Memory {
            session,
            owner,
            cells,
            selected: None,
            finished: 0,
            preview_ended_at: None,
        }
    }

    fn control(&mut self, index: usize) -> Option<&mut Control> {
        let token = &self.cells[index].token;
        self.session.controls.get_mut(token)
    }

    fn style_cell(&mut self, index: usize, style: ControlStyle, emoji: Option<&str>, disabled: bool) {
        if let Some(control) = self.control(index) {
            control.style = style;
            if let Some(emoji) = emoji {
                control.emoji = Some(emoji.to_string());
            }
            control.disabled = disabled;
        }
    }

    fn render(&self, content: String) -> Transition {
        Transition::render(self.session.instruction(Some(content), None))
    }

    async fn record_finish(&self, services: &GameServices) -> BotResult<String> {
        let elapsed = self.preview_ended_at.map(|at| at.elapsed()).unwrap_or_default().as_secs();
        let (minutes, seconds) = (elapsed / 60, elapsed % 60);

        let mut tx = services.database.begin_transaction().await?;
        let improved = tx.save_memory_if_better(self.owner.id, elapsed)?;

        let mut content = format!("Congrats {}, you finished in {} minute(s) and {} seconds.", self.owner.mention(), minutes, seconds);
        if improved {
            content.push_str(" That's a new personal best!");
        }
        Ok(content)
    }
}

#[async_trait]
impl SessionEngine for Memory {
    fn session(&self) -> &InteractionSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut InteractionSession {
        &mut self.session
    }

    fn authorize(&self, actor: &Actor) -> BotResult<()> {
        if actor.id != self.owner.id {
            return Err(BotError::Unauthorized("This is not your memory game.".to_string()));
        }
        Ok(())
    }

    fn opening(&mut self) -> Transition {
        self.render(format!("The game will start soon, {}.", self.owner.mention()))
            .after(PREVIEW_DURATION, DeferredEvent::PreviewElapsed)
    }

    async fn on_interaction(&mut self, actor: &Actor, event: InteractionEvent, services: &GameServices) -> BotResult<Transition> {
        if self.preview_ended_at.is_none() {
            return Err(BotError::Rejected(format!("Calm down {}, game hasn't started yet.", actor.mention())));
        }

        let index = self.session.controls.position(&event.token).ok_or(BotError::SessionEnded)?;
        let revealed = self.session.controls.get(&event.token).map(|c| c.disabled).unwrap_or(true);
        if index == CENTER || revealed || self.cells[index].matched {
            return Err(BotError::Rejected("That cell is already revealed.".to_string()));
        }

        let symbol = self.cells[index].symbol.clone().unwrap_or_default();

        let Some(previous) = self.selected else {
            self.selected = Some(index);
            self.style_cell(index, ControlStyle::Primary, Some(symbol.as_str()), true);
            return Ok(Transition::render(self.session.instruction(None, None)));
        };

        if self.cells[previous].symbol == self.cells[index].symbol {
            let finale = if self.finished + 1 == PAIRS { Some(self.record_finish(services).await?) } else { None };

            self.selected = None;
            self.cells[previous].matched = true;
            self.cells[index].matched = true;
            self.style_cell(previous, ControlStyle::Success, None, true);
            self.style_cell(index, ControlStyle::Success, Some(symbol.as_str()), true);
            self.finished += 1;

            if let Some(content) = finale {
                return Ok(self.render(content).terminal());
            }
            return Ok(Transition::render(self.session.instruction(None, None)));
        }

        self.selected = None;
        self.style_cell(previous, ControlStyle::Danger, None, true);
        self.style_cell(index, ControlStyle::Danger, Some(symbol.as_str()), true);
        Ok(Transition::render(self.session.instruction(None, None)).after(MISMATCH_FLASH, DeferredEvent::ConcealMismatch { first: previous, second: index }))
    }

    async fn on_deferred(&mut self, event: DeferredEvent, _services: &GameServices) -> BotResult<Transition> {
        match event {
            DeferredEvent::PreviewElapsed => {
                self.preview_ended_at = Some(Instant::now());
                for index in (0..BOARD_SIZE).filter(|i| *i != CENTER) {
                    self.style_cell(index, ControlStyle::Secondary, Some(MASK), false);
                }
                Ok(self.render(format!("Game has started, {}.", self.owner.mention())))
            }
            DeferredEvent::ConcealMismatch { first, second } => {
                for index in [first, second] {
                    if !self.cells[index].matched {
                        self.style_cell(index, ControlStyle::Secondary, Some(MASK), false);
                    }
                }
                Ok(Transition::render(self.session.instruction(None, None)))
            }
        }
    }

    async fn on_timeout(&mut self, _services: &GameServices) -> BotResult<Transition> {
        for index in (0..BOARD_SIZE).filter(|i| *i != CENTER) {
            if !self.cells[index].matched {
                let symbol = self.cells[index].symbol.clone();
                self.style_cell(index, ControlStyle::Secondary, symbol.as_deref(), true);
            }
        }
        self.session.controls.disable_all();
        Ok(self.render(format!("You ran out of time, {}.", self.owner.mention())))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::time::sleep;

    use super::*;
    use crate::session::manager::component_id;
    use crate::session::testing::{alice, bob, settle_tasks, start_attached, test_manager};

    fn pairs_of(memory: &Memory) -> Vec<(String, String)> {
        let mut by_symbol: IndexMap<String, Vec<String>> = IndexMap::new();
        for cell in &memory.cells {
            if let Some(symbol) = &cell.symbol {
                by_symbol.entry(symbol.clone()).or_default().push(cell.token.clone());
            }
        }
        by_symbol.into_values().map(|tokens| (tokens[0].clone(), tokens[1].clone())).collect()
    }

    #[test]
    fn every_board_holds_twelve_pairs_around_an_empty_center() {
        for seed in 0..200 {
            let board = deal_board(&mut StdRng::seed_from_u64(seed));
            assert_eq!(board.len(), BOARD_SIZE);
            assert_eq!(board[CENTER], None);

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for symbol in board.iter().flatten() {
                *counts.entry(symbol.as_str()).or_insert(0) += 1;
            }
            assert_eq!(counts.len(), PAIRS);
            assert!(counts.values().all(|n| *n == 2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_game_with_a_mismatch_records_best_time() {
        let (manager, renderer) = test_manager();
        let memory = Memory::new(alice(), &mut StdRng::seed_from_u64(7));
        let pairs = pairs_of(&memory);
        assert_eq!(pairs.len(), PAIRS);
        let (id, opening) = start_attached(&manager, Box::new(memory)).await;
        assert!(opening.render.unwrap().controls.iter().filter(|c| c.emoji.as_deref() == Some(MASK)).count() == 0);

        let early = manager.dispatch(&component_id(&id, &pairs[0].0), &alice(), None).await.unwrap_err();
        assert!(matches!(early, BotError::Rejected(ref m) if m.contains("hasn't started yet")));
        let stranger = manager.dispatch(&component_id(&id, &pairs[0].0), &bob(), None).await.unwrap_err();
        assert!(matches!(stranger, BotError::Unauthorized(_)));

        sleep(PREVIEW_DURATION).await;
        settle_tasks().await;
        let masked = renderer.renders().await.last().unwrap().1.clone();
        assert_eq!(masked.controls.iter().filter(|c| c.emoji.as_deref() == Some(MASK)).count(), 24);

        // Mismatch, then the pair is concealed again after the flash.
        manager.dispatch(&component_id(&id, &pairs[0].0), &alice(), None).await.unwrap();
        let flash = manager.dispatch(&component_id(&id, &pairs[1].0), &alice(), None).await.unwrap();
        let danger = flash.render.unwrap().controls.iter().filter(|c| c.style == ControlStyle::Danger).count();
        assert_eq!(danger, 2);

        sleep(MISMATCH_FLASH).await;
        settle_tasks().await;
        let concealed = renderer.renders().await.last().unwrap().1.clone();
        assert_eq!(concealed.controls.iter().filter(|c| c.emoji.as_deref() == Some(MASK)).count(), 24);
        assert!(concealed.controls.iter().all(|c| c.style != ControlStyle::Danger));

        sleep(Duration::from_secs(65)).await;
        let mut last = None;
        for (first, second) in &pairs {
            manager.dispatch(&component_id(&id, first), &alice(), None).await.unwrap();
            last = Some(manager.dispatch(&component_id(&id, second), &alice(), None).await.unwrap());
        }

        let last = last.unwrap();
        assert!(last.terminal);
        let content = last.render.unwrap().content.unwrap();
        assert!(content.contains("1 minute(s) and 6 seconds"), "{}", content);
        assert_eq!(manager.active_sessions(), 0);

        let mut tx = manager.services().database.begin_transaction().await.unwrap();
        assert_eq!(tx.load_memory(1).unwrap().unwrap().total_seconds, 66);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecorded_finish_leaves_the_last_pair_open() {
        let (manager, _renderer) = test_manager();
        let services = manager.services();
        let mut memory = Memory::new(alice(), &mut StdRng::seed_from_u64(7));
        let pairs = pairs_of(&memory);
        let press = |token: &String| InteractionEvent { token: token.clone(), input: None };

        memory.on_deferred(DeferredEvent::PreviewElapsed, services).await.unwrap();
        for (first, second) in &pairs[..PAIRS - 1] {
            memory.on_interaction(&alice(), press(first), services).await.unwrap();
            memory.on_interaction(&alice(), press(second), services).await.unwrap();
        }

        {
            let mut tx = services.database.begin_transaction().await.unwrap();
            tx.run_sql("DROP TABLE memory").unwrap();
        }
        let (first, second) = &pairs[PAIRS - 1];
        memory.on_interaction(&alice(), press(first), services).await.unwrap();
        let failed = memory.on_interaction(&alice(), press(second), services).await.unwrap_err();
        assert!(matches!(failed, BotError::Database(_)));

        assert_eq!(memory.finished, PAIRS - 1);
        assert!(memory.selected.is_some());
        let open = memory.session.controls.get(second).unwrap();
        assert_eq!(open.style, ControlStyle::Secondary);
        assert!(!open.disabled);
        assert_eq!(memory.cells.iter().filter(|c| c.matched).count(), 2 * (PAIRS - 1));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reveals_remaining_cells() {
        let (manager, renderer) = test_manager();
        let memory = Memory::new(alice(), &mut StdRng::seed_from_u64(3));
        let pairs = pairs_of(&memory);
        let (id, _) = start_attached(&manager, Box::new(memory)).await;

        sleep(PREVIEW_DURATION).await;
        settle_tasks().await;
        manager.dispatch(&component_id(&id, &pairs[0].0), &alice(), None).await.unwrap();
        manager.dispatch(&component_id(&id, &pairs[0].1), &alice(), None).await.unwrap();

        sleep(MEMORY_TIMEOUT).await;
        settle_tasks().await;

        let (_, last) = renderer.renders().await.last().cloned().unwrap();
        assert!(last.content.unwrap().contains("ran out of time"));
        assert!(last.controls.iter().all(|c| c.disabled));
        assert_eq!(last.controls.iter().filter(|c| c.emoji.as_deref() == Some(MASK)).count(), 0);
        assert_eq!(last.controls.iter().filter(|c| c.style == ControlStyle::Success).count(), 2);

        let mut tx = manager.services().database.begin_transaction().await.unwrap();
        assert!(tx.load_memory(1).unwrap().is_none());
    }
}
