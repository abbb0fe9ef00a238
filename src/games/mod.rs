pub mod guess;
pub mod memory;
pub mod opentdb;
pub mod rps;
pub mod tictactoe;
pub mod trivia;

pub const COLOUR_BLUE: u32 = 0x3498db;
pub const COLOUR_GREEN: u32 = 0x2ecc71;
pub const COLOUR_RED: u32 = 0xe74c3c;
pub const COLOUR_GREYPLE: u32 = 0x99aab5;

pub fn title_case(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Medal for the top three, a bullet for everyone else.
pub fn leaderboard_emoji(position: usize) -> &'static str {
    match position {
        1 => "\u{1f947}",
        2 => "\u{1f948}",
        3 => "\u{1f949}",
        _ => "*",
    }
}
