use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;

use crate::errors::BotResult;

const TABLES: &str = "
CREATE TABLE IF NOT EXISTS guild_data (
    guild_id INTEGER PRIMARY KEY,
    log_channel INTEGER
);
CREATE TABLE IF NOT EXISTS prefixes (
    guild_id INTEGER NOT NULL,
    prefix TEXT NOT NULL,
    PRIMARY KEY (guild_id, prefix)
);
CREATE TABLE IF NOT EXISTS disabled (
    guild_id INTEGER NOT NULL,
    entity TEXT NOT NULL,
    PRIMARY KEY (guild_id, entity)
);
CREATE TABLE IF NOT EXISTS trivia (
    user_id INTEGER PRIMARY KEY,
    correct INTEGER NOT NULL DEFAULT 0,
    wrong INTEGER NOT NULL DEFAULT 0,
    streak INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS memory (
    user_id INTEGER PRIMARY KEY,
    minutes INTEGER NOT NULL,
    seconds INTEGER NOT NULL,
    total_seconds INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS tictactoe (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    winner INTEGER NOT NULL,
    rival INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS rps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    winner INTEGER NOT NULL,
    rival INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS guess (
    user_id INTEGER PRIMARY KEY,
    wins INTEGER NOT NULL DEFAULT 0
);
";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriviaRecord {
    pub user_id: u64,
    pub correct: i64,
    pub wrong: i64,
    pub streak: i64,
}

impl TriviaRecord {
    pub fn answered(&self) -> i64 {
        self.correct + self.wrong
    }

    pub fn accuracy(&self) -> f64 {
        if self.answered() == 0 {
            return 0.0;
        }
        self.correct as f64 / self.answered() as f64 * 100.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryRecord {
    pub user_id: u64,
    pub minutes: i64,
    pub seconds: i64,
    pub total_seconds: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRecord {
    pub winner: u64,
    pub rival: u64,
}

/// Two-player games that store one row per decided match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchTable {
    TicTacToe,
    Rps,
}

impl MatchTable {
    fn table_name(&self) -> &'static str {
        match self {
            MatchTable::TicTacToe => "tictactoe",
            MatchTable::Rps => "rps",
        }
    }
}

pub struct Database {
    pool: Arc<Mutex<Pool<SqliteConnectionManager>>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").finish()
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Database { pool: self.pool.clone() }
    }
}

impl Database {
    pub fn new(path: &str) -> BotResult<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::new(manager)?;
        Self::from_pool(pool)
    }

    /// Single-connection in-memory store, every handle sees the same data.
    pub fn in_memory() -> BotResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> BotResult<Self> {
        let conn = pool.get()?;
        conn.execute_batch(TABLES)?;
        drop(conn);

        Ok(Database { pool: Arc::new(Mutex::new(pool)) })
    }

    pub async fn begin_transaction(&self) -> BotResult<DatabaseTransaction> {
        let pool_guard = self.pool.lock().await;
        let conn = pool_guard.get()?;
        Ok(DatabaseTransaction { conn })
    }
}

#[derive(Debug)]
pub struct DatabaseTransaction {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl DatabaseTransaction {
    pub fn ensure_guild(&mut self, guild_id: u64) -> BotResult<()> {
        self.conn.execute("INSERT OR IGNORE INTO guild_data (guild_id) VALUES (?1)", [guild_id as i64])?;
        Ok(())
    }

    pub fn save_log_channel(&mut self, guild_id: u64, channel_id: Option<u64>) -> BotResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("INSERT OR IGNORE INTO guild_data (guild_id) VALUES (?1)", [guild_id as i64])?;
        tx.execute("UPDATE guild_data SET log_channel = ?1 WHERE guild_id = ?2", params![channel_id.map(|c| c as i64), guild_id as i64])?;
        tx.commit()?;
        Ok(())
    }

    pub fn load_log_channel(&mut self, guild_id: u64) -> BotResult<Option<u64>> {
        let channel: Option<Option<i64>> = self
            .conn
            .query_row("SELECT log_channel FROM guild_data WHERE guild_id = ?1", [guild_id as i64], |row| row.get(0))
            .optional()?;
        Ok(channel.flatten().map(|c| c as u64))
    }

    pub fn load_prefixes(&mut self, guild_id: u64) -> BotResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT prefix FROM prefixes WHERE guild_id = ?1 ORDER BY rowid")?;
        let prefixes = stmt.query_map([guild_id as i64], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
        Ok(prefixes)
    }

    pub fn add_prefix(&mut self, guild_id: u64, prefix: &str) -> BotResult<()> {
        self.conn.execute("INSERT OR IGNORE INTO prefixes (guild_id, prefix) VALUES (?1, ?2)", params![guild_id as i64, prefix])?;
        Ok(())
    }

    pub fn remove_prefix(&mut self, guild_id: u64, prefix: &str) -> BotResult<bool> {
        let removed = self.conn.execute("DELETE FROM prefixes WHERE guild_id = ?1 AND prefix = ?2", params![guild_id as i64, prefix])?;
        Ok(removed > 0)
    }

    pub fn is_disabled(&mut self, guild_id: u64, entity: &str) -> BotResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM disabled WHERE guild_id = ?1 AND entity = ?2", params![guild_id as i64, entity], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Returns false when the entity was already disabled.
    pub fn insert_disabled(&mut self, guild_id: u64, entity: &str) -> BotResult<bool> {
        let inserted = self.conn.execute("INSERT OR IGNORE INTO disabled (guild_id, entity) VALUES (?1, ?2)", params![guild_id as i64, entity])?;
        Ok(inserted > 0)
    }

    /// Returns false when the entity was not disabled.
    pub fn delete_disabled(&mut self, guild_id: u64, entity: &str) -> BotResult<bool> {
        let deleted = self.conn.execute("DELETE FROM disabled WHERE guild_id = ?1 AND entity = ?2", params![guild_id as i64, entity])?;
        Ok(deleted > 0)
    }

    pub fn load_disabled(&mut self, guild_id: u64) -> BotResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT entity FROM disabled WHERE guild_id = ?1 ORDER BY entity")?;
        let entities = stmt.query_map([guild_id as i64], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
        Ok(entities)
    }

    pub fn load_trivia(&mut self, user_id: u64) -> BotResult<Option<TriviaRecord>> {
        let record = self
            .conn
            .query_row("SELECT user_id, correct, wrong, streak FROM trivia WHERE user_id = ?1", [user_id as i64], trivia_from_row)
            .optional()?;
        Ok(record)
    }

    /// Adds one answer to the user's totals. The streak column only ever grows,
    /// it keeps the best run seen so far.
    pub fn record_trivia_answer(&mut self, user_id: u64, correct: bool, current_streak: u32) -> BotResult<TriviaRecord> {
        let tx = self.conn.transaction()?;
        let existing = tx
            .query_row("SELECT user_id, correct, wrong, streak FROM trivia WHERE user_id = ?1", [user_id as i64], trivia_from_row)
            .optional()?;

        let mut record = existing.unwrap_or(TriviaRecord { user_id, correct: 0, wrong: 0, streak: 0 });
        if correct {
            record.correct += 1;
        } else {
            record.wrong += 1;
        }
        if current_streak as i64 > record.streak {
            record.streak = current_streak as i64;
        }

        tx.execute(
            "INSERT INTO trivia (user_id, correct, wrong, streak) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET correct = excluded.correct, wrong = excluded.wrong, streak = excluded.streak",
            params![user_id as i64, record.correct, record.wrong, record.streak],
        )?;
        tx.commit()?;

        Ok(record)
    }

    pub fn load_memory(&mut self, user_id: u64) -> BotResult<Option<MemoryRecord>> {
        let record = self
            .conn
            .query_row("SELECT user_id, minutes, seconds, total_seconds FROM memory WHERE user_id = ?1", [user_id as i64], memory_from_row)
            .optional()?;
        Ok(record)
    }

    /// Stores the time only if it beats the personal best. Returns whether it did.
    pub fn save_memory_if_better(&mut self, user_id: u64, total_seconds: u64) -> BotResult<bool> {
        let tx = self.conn.transaction()?;
        let best: Option<i64> = tx
            .query_row("SELECT total_seconds FROM memory WHERE user_id = ?1", [user_id as i64], |row| row.get(0))
            .optional()?;

        if let Some(best) = best {
            if total_seconds as i64 >= best {
                return Ok(false);
            }
        }

        let minutes = (total_seconds / 60) as i64;
        let seconds = (total_seconds % 60) as i64;
        tx.execute(
            "INSERT INTO memory (user_id, minutes, seconds, total_seconds) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET minutes = excluded.minutes, seconds = excluded.seconds, total_seconds = excluded.total_seconds",
            params![user_id as i64, minutes, seconds, total_seconds as i64],
        )?;
        tx.commit()?;

        Ok(true)
    }

    pub fn insert_match(&mut self, table: MatchTable, winner: u64, rival: u64) -> BotResult<()> {
        let query = format!("INSERT INTO {} (winner, rival) VALUES (?1, ?2)", table.table_name());
        self.conn.execute(&query, params![winner as i64, rival as i64])?;
        Ok(())
    }

    pub fn load_matches_of(&mut self, table: MatchTable, user_id: u64) -> BotResult<Vec<MatchRecord>> {
        let query = format!("SELECT winner, rival FROM {} WHERE winner = ?1 OR rival = ?1 ORDER BY id", table.table_name());
        let mut stmt = self.conn.prepare(&query)?;
        let matches = stmt
            .query_map([user_id as i64], |row| {
                let winner: i64 = row.get(0)?;
                let rival: i64 = row.get(1)?;
                Ok(MatchRecord { winner: winner as u64, rival: rival as u64 })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(matches)
    }

    pub fn record_guess_win(&mut self, user_id: u64) -> BotResult<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO guess (user_id, wins) VALUES (?1, 1) ON CONFLICT(user_id) DO UPDATE SET wins = wins + 1",
            [user_id as i64],
        )?;
        let wins = tx.query_row("SELECT wins FROM guess WHERE user_id = ?1", [user_id as i64], |row| row.get(0))?;
        tx.commit()?;
        Ok(wins)
    }

    pub fn trivia_leaderboard(&mut self) -> BotResult<Vec<TriviaRecord>> {
        let mut stmt = self.conn.prepare("SELECT user_id, correct, wrong, streak FROM trivia ORDER BY correct DESC, user_id")?;
        let rows = stmt.query_map([], trivia_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn memory_leaderboard(&mut self) -> BotResult<Vec<MemoryRecord>> {
        let mut stmt = self.conn.prepare("SELECT user_id, minutes, seconds, total_seconds FROM memory ORDER BY total_seconds ASC, user_id")?;
        let rows = stmt.query_map([], memory_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Wins per user, most wins first.
    pub fn match_leaderboard(&mut self, table: MatchTable) -> BotResult<Vec<(u64, i64)>> {
        let query = format!("SELECT winner FROM {}", table.table_name());
        let mut stmt = self.conn.prepare(&query)?;
        let winners = stmt.query_map([], |row| row.get::<_, i64>(0))?.collect::<Result<Vec<_>, _>>()?;

        let mut wins: HashMap<u64, i64> = HashMap::new();
        for winner in winners {
            *wins.entry(winner as u64).or_insert(0) += 1;
        }

        let mut board: Vec<(u64, i64)> = wins.into_iter().collect();
        board.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(board)
    }

    pub fn guess_leaderboard(&mut self) -> BotResult<Vec<(u64, i64)>> {
        let mut stmt = self.conn.prepare("SELECT user_id, wins FROM guess ORDER BY wins DESC, user_id")?;
        let rows = stmt
            .query_map([], |row| {
                let user_id: i64 = row.get(0)?;
                Ok((user_id as u64, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
impl DatabaseTransaction {
    /// Raw statements for tests that need to reshape or break the schema.
    pub fn run_sql(&mut self, sql: &str) -> BotResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

fn trivia_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TriviaRecord> {
    let user_id: i64 = row.get(0)?;
    Ok(TriviaRecord {
        user_id: user_id as u64,
        correct: row.get(1)?,
        wrong: row.get(2)?,
        streak: row.get(3)?,
    })
}

fn memory_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let user_id: i64 = row.get(0)?;
    Ok(MemoryRecord {
        user_id: user_id as u64,
        minutes: row.get(1)?,
        seconds: row.get(2)?,
        total_seconds: row.get(3)?,
    })
}
