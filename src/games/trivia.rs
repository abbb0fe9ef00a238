use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serenity::async_trait;
use tokio::time::Instant;

use crate::errors::{BotError, BotResult};
use crate::games::opentdb::{QuestionKind, TriviaQuestion};
use crate::games::{title_case, COLOUR_BLUE, COLOUR_GREEN, COLOUR_RED};
use crate::services::GameServices;
use crate::session::control::{Control, ControlStyle};
use crate::session::session::{Actor, EmbedSpec, InteractionEvent, InteractionSession, SessionEngine, Transition};

const STATUS_FIELD: &str = "Status";

pub fn trivia_time(difficulty: &str) -> Duration {
    match difficulty {
        "easy" => Duration::from_secs(6),
        "medium" => Duration::from_secs(7),
        "hard" => Duration::from_secs(8),
        _ => Duration::from_secs(10),
    }
}

/// One question, answerable by anyone in the channel. The first press decides it.
pub struct Trivia {
    session: InteractionSession,
    initiator: Actor,
    correct_answer: String,
    embed: EmbedSpec,
    deadline: Instant,
}

impl Trivia {
    pub fn new<R: Rng + ?Sized>(initiator: Actor, question: TriviaQuestion, rng: &mut R) -> Self {
        let time = trivia_time(&question.difficulty);
        let mut session = InteractionSession::new(Some(time));

        let answers = match question.kind {
            QuestionKind::Boolean => vec!["True".to_string(), "False".to_string()],
            QuestionKind::Multiple => {
                let mut answers = question.incorrect_answers.clone();
                answers.push(question.correct_answer.clone());
                answers.shuffle(rng);
                answers
            }
        };
        for answer in answers {
            session.controls.register(Control::new(ControlStyle::Secondary).label(answer));
        }

        let embed = EmbedSpec::new(COLOUR_BLUE)
            .description(format!("**Question**: {}\n**Time**: {} seconds.", question.question, time.as_secs()))
            .field("Category", question.category.clone(), true)
            .field("Type", question.kind.title(), true)
            .field("Difficulty", title_case(&question.difficulty), true)
            .field(STATUS_FIELD, "Waiting for a button interaction.", true)
            .author(format!("{}'s Trivia", initiator.name));

        Trivia {
            session,
            initiator,
            correct_answer: question.correct_answer,
            embed,
            deadline: Instant::now() + time,
        }
    }

    fn mark_correct_answer(&mut self) {
        for control in self.session.controls.iter_mut() {
            control.disabled = true;
            if control.label.as_deref() == Some(self.correct_answer.as_str()) {
                control.style = ControlStyle::Success;
            }
        }
    }

    /// Persists the answer first, the in-memory streak only follows a successful write.
    async fn record(&self, services: &GameServices, user_id: u64, correct: bool) -> BotResult<()> {
        let streak = services.trivia_streaks.next(user_id, correct).await;
        let mut tx = services.database.begin_transaction().await?;
        tx.record_trivia_answer(user_id, correct, streak)?;
        drop(tx);
        services.trivia_streaks.set(user_id, streak).await;
        Ok(())
    }

    fn render(&self) -> Transition {
        Transition::render(self.session.instruction(None, Some(self.embed.clone())))
    }
}

#[async_trait]
impl SessionEngine for Trivia {
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

    async fn on_interaction(&mut self, actor: &Actor, event: InteractionEvent, services: &GameServices) -> BotResult<Transition> {
        // The timer owns the outcome once the deadline has passed.
        if Instant::now() > self.deadline {
            return Err(BotError::Timeout);
        }

        let picked = self.session.controls.get(&event.token).and_then(|c| c.label.clone()).unwrap_or_default();
        let correct = picked == self.correct_answer;
        self.record(services, actor.id, correct).await?;

        self.mark_correct_answer();
        if !correct {
            if let Some(control) = self.session.controls.get_mut(&event.token) {
                control.style = ControlStyle::Danger;
            }
        }

        if correct {
            self.embed.colour = COLOUR_GREEN;
            self.embed.set_field(STATUS_FIELD, format!("{} got the **correct** answer.", actor.mention()), false);
        } else {
            self.embed.colour = COLOUR_RED;
            self.embed.set_field(STATUS_FIELD, format!("{} got the **wrong** answer.", actor.mention()), false);
        }
        Ok(self.render().terminal())
    }

    async fn on_timeout(&mut self, services: &GameServices) -> BotResult<Transition> {
        self.record(services, self.initiator.id, false).await?;
        self.mark_correct_answer();

        self.embed.colour = COLOUR_RED;
        self.embed.set_field(STATUS_FIELD, format!("{} ran out of time.", self.initiator.mention()), false);
        Ok(self.render())
    }
}
