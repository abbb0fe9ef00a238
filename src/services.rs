use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::database::Database;

/// Current correct-answer run per user. Lives for the process, not the store.
#[derive(Clone, Debug, Default)]
pub struct TriviaStreaks {
    streaks: Arc<Mutex<HashMap<u64, u32>>>,
}

impl TriviaStreaks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The run the user would have after this answer. Nothing is stored.
    pub async fn next(&self, user_id: u64, correct: bool) -> u32 {
        if correct {
            self.current(user_id).await + 1
        } else {
            0
        }
    }

    pub async fn set(&self, user_id: u64, streak: u32) {
        self.streaks.lock().await.insert(user_id, streak);
    }

    pub async fn current(&self, user_id: u64) -> u32 {
        self.streaks.lock().await.get(&user_id).copied().unwrap_or(0)
    }
}

/// Shared context handed to every engine transition.
#[derive(Clone, Debug)]
pub struct GameServices {
    pub database: Database,
    pub trivia_streaks: TriviaStreaks,
}

impl GameServices {
    pub fn new(database: Database) -> Self {
        GameServices { database, trivia_streaks: TriviaStreaks::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streak_resets_on_wrong_answer() {
        let streaks = TriviaStreaks::new();
        assert_eq!(streaks.next(1, true).await, 1);
        assert_eq!(streaks.current(1).await, 0);

        streaks.set(1, 2).await;
        assert_eq!(streaks.next(1, true).await, 3);
        assert_eq!(streaks.next(1, false).await, 0);
        assert_eq!(streaks.next(2, true).await, 1);
        assert_eq!(streaks.current(1).await, 2);
    }
}
