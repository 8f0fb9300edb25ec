//! Bot seats for rooms that are short of real players

use crate::identity::Identity;
use crate::types::Participant;

/// Create a bot participant with fresh, globally unique player and cat IDs
pub fn generate_synthetic() -> Participant {
    let player_id = format!("bot-{}", ulid::Ulid::new());
    let cat_id = format!("bot-cat-{}", ulid::Ulid::new());

    let identity = Identity {
        display_name: friendly_name(2).unwrap_or_else(|| "Friendly Bot".to_string()),
        avatar_name: friendly_name(1).unwrap_or_else(|| "Whiskers".to_string()),
    };

    Participant::synthetic(player_id, cat_id, identity)
}

/// Pad a roster with bot seats up to `capacity`
pub fn top_up(mut participants: Vec<Participant>, capacity: usize) -> Vec<Participant> {
    let missing = capacity.saturating_sub(participants.len());
    if missing > 0 {
        tracing::info!("Filling {} empty seat(s) with bots", missing);
        participants.extend((0..missing).map(|_| generate_synthetic()));
    }
    participants
}

/// Title-cased petname, e.g. "Gentle Otter"
fn friendly_name(words: u8) -> Option<String> {
    let name = petname::petname(words, " ")?;
    Some(
        name.split(' ')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" "),
    )
}
