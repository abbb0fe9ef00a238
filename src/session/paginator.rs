use std::time::Duration;

use serenity::async_trait;

use crate::errors::BotResult;
use crate::services::GameServices;
use crate::session::control::{Control, ControlStyle};
use crate::session::session::{Actor, InteractionEvent, InteractionSession, SessionEngine, TimerChange, Transition};

pub const PAGE_SIZE: usize = 2000;
pub const PAGINATOR_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Splits on `PAGE_SIZE` characters. Empty text still yields one page.
pub fn split_pages(content: &str) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(PAGE_SIZE).map(|chunk| chunk.iter().collect()).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Navigation {
    First,
    Previous,
    Next,
    Last,
}

/// Read-only text browser over pre-split pages.
pub struct Paginator {
    session: InteractionSession,
    pages: Vec<String>,
    current: usize,
    first: String,
    previous: String,
    counter: String,
    next: String,
    last: String,
}

impl Paginator {
    pub fn new(content: &str) -> Self {
        let mut session = InteractionSession::new(Some(PAGINATOR_IDLE_TIMEOUT));
        let first = session.controls.register(Control::new(ControlStyle::Secondary).label("<<"));
        let previous = session.controls.register(Control::new(ControlStyle::Primary).label("Previous"));
        let counter = session.controls.register(Control::new(ControlStyle::Secondary).disabled(true));
        let next = session.controls.register(Control::new(ControlStyle::Primary).label("Next"));
        let last = session.controls.register(Control::new(ControlStyle::Secondary).label(">>"));

        let mut paginator = Paginator {
            session,
            pages: split_pages(content),
            current: 1,
            first,
            previous,
            counter,
            next,
            last,
        };
        paginator.refresh();
        paginator
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn page(&self) -> &str {
        &self.pages[self.current - 1]
    }

    fn refresh(&mut self) {
        let at_start = self.current == 1;
        let at_end = self.current == self.total_pages();
        let label = format!("{}/{}", self.current, self.total_pages());

        let controls = &mut self.session.controls;
        for (token, disabled) in [(&self.first, at_start), (&self.previous, at_start), (&self.next, at_end), (&self.last, at_end)] {
            if let Some(control) = controls.get_mut(token) {
                control.disabled = disabled;
            }
        }
        if let Some(counter) = controls.get_mut(&self.counter) {
            counter.label = Some(label);
            counter.disabled = true;
        }
    }

    fn navigation(&self, token: &str) -> Option<Navigation> {
        if token == self.first {
            Some(Navigation::First)
        } else if token == self.previous {
            Some(Navigation::Previous)
        } else if token == self.next {
            Some(Navigation::Next)
        } else if token == self.last {
            Some(Navigation::Last)
        } else {
            None
        }
    }

    fn navigate(&mut self, navigation: Navigation) {
        self.current = match navigation {
            Navigation::First => 1,
            Navigation::Previous => self.current.saturating_sub(1).max(1),
            Navigation::Next => (self.current + 1).min(self.total_pages()),
            Navigation::Last => self.total_pages(),
        };
        self.refresh();
    }

    fn render(&self) -> Transition {
        Transition::render(self.session.instruction(Some(self.page().to_string()), None))
    }
}

#[async_trait]
impl SessionEngine for Paginator {
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
        self.render()
    }

    async fn on_interaction(&mut self, _actor: &Actor, event: InteractionEvent, _services: &GameServices) -> BotResult<Transition> {
        if let Some(navigation) = self.navigation(&event.token) {
            self.navigate(navigation);
        }
        Ok(self.render().with_timer(TimerChange::Reset(PAGINATOR_IDLE_TIMEOUT)))
    }

    async fn on_timeout(&mut self, _services: &GameServices) -> BotResult<Transition> {
        self.session.controls.disable_all();
        Ok(self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::manager::component_id;
    use crate::session::testing::{alice, bob, settle_tasks, start_attached, test_manager};
    use tokio::time::sleep;

    fn disabled(paginator: &Paginator) -> [bool; 4] {
        [&paginator.first, &paginator.previous, &paginator.next, &paginator.last].map(|t| paginator.session.controls.get(t).unwrap().disabled)
    }

    #[test]
    fn page_count_is_ceiling_of_length() {
        assert_eq!(split_pages("").len(), 1);
        assert_eq!(split_pages(&"a".repeat(1)).len(), 1);
        assert_eq!(split_pages(&"a".repeat(2000)).len(), 1);
        assert_eq!(split_pages(&"a".repeat(2001)).len(), 2);
        assert_eq!(split_pages(&"a".repeat(6000)).len(), 3);
        assert_eq!(split_pages(&"a".repeat(6001)).len(), 4);
    }

    #[test]
    fn multibyte_text_splits_on_characters() {
        let text = "é".repeat(2500);
        let pages = split_pages(&text);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].chars().count(), 2000);
        assert_eq!(pages[1].chars().count(), 500);
    }

    #[test]
    fn affordances_follow_page_position() {
        let mut paginator = Paginator::new(&"x".repeat(4500));
        assert_eq!(paginator.total_pages(), 3);
        assert_eq!(disabled(&paginator), [true, true, false, false]);

        paginator.navigate(Navigation::Next);
        assert_eq!(disabled(&paginator), [false, false, false, false]);

        paginator.navigate(Navigation::Last);
        assert_eq!(paginator.current_page(), 3);
        assert_eq!(disabled(&paginator), [false, false, true, true]);
        assert_eq!(paginator.session.controls.get(&paginator.counter).unwrap().label.as_deref(), Some("3/3"));

        paginator.navigate(Navigation::Next);
        assert_eq!(paginator.current_page(), 3);

        paginator.navigate(Navigation::First);
        assert_eq!(paginator.page().len(), 2000);
        assert_eq!(disabled(&paginator), [true, true, false, false]);
    }

    #[test]
    fn single_page_disables_everything() {
        let paginator = Paginator::new("short answer");
        assert_eq!(disabled(&paginator), [true, true, true, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_resets_idle_timer_then_timeout_disables() {
        let (manager, renderer) = test_manager();
        let paginator = Paginator::new(&"y".repeat(2500));
        let next = paginator.next.clone();
        let (id, opening) = start_attached(&manager, Box::new(paginator)).await;
        assert_eq!(opening.render.unwrap().content.unwrap().len(), 2000);

        sleep(Duration::from_secs(200)).await;
        let transition = manager.dispatch(&component_id(&id, &next), &bob(), None).await.unwrap();
        assert_eq!(transition.render.unwrap().content.unwrap().len(), 500);

        sleep(Duration::from_secs(200)).await;
        settle_tasks().await;
        assert!(renderer.renders().await.is_empty());
        assert_eq!(manager.active_sessions(), 1);

        sleep(Duration::from_secs(101)).await;
        settle_tasks().await;
        let renders = renderer.renders().await;
        assert_eq!(renders.len(), 1);
        assert!(renders[0].1.controls.iter().all(|c| c.disabled));
        assert!(manager.dispatch(&component_id(&id, &next), &alice(), None).await.is_err());
    }
}
