use crate::types::*;
use std::collections::HashMap;

/// Count votes per cat
pub fn tally_votes(participants: &[Participant]) -> HashMap<CatId, u32> {
    let mut counts: HashMap<CatId, u32> = HashMap::new();
    for vote in participants.iter().filter_map(|p| p.voted_for()) {
        *counts.entry(vote.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Fill in `votes_received` and `reward` for every seat.
/// Depends only on the final vote assignment.
pub fn apply_rewards(participants: &mut [Participant], reward_per_vote: u32) {
    let counts = tally_votes(participants);

    for participant in participants.iter_mut() {
        let votes = counts.get(&participant.cat_id).copied().unwrap_or(0);
        participant.votes_received = votes;
        participant.reward = votes.saturating_mul(reward_per_vote);
    }
}
