//! Point distribution among the correct guessers of a round.

/// Points shared out per round among everyone who guessed correctly.
pub const ROUND_POT: u32 = 100;

/// Points each of `winners` correct guessers receives: the pot divided evenly, rounded
/// half-up, remainder discarded.
pub fn points_per_winner(winners: usize) -> u32 {
    if winners == 0 {
        return 0;
    }
    let winners = winners as u32;
    (2 * ROUND_POT + winners) / (2 * winners)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pot_is_split_evenly() {
        assert_eq!(points_per_winner(1), 100);
        assert_eq!(points_per_winner(2), 50);
        assert_eq!(points_per_winner(3), 33);
        assert_eq!(points_per_winner(4), 25);
        assert_eq!(points_per_winner(6), 17);
        assert_eq!(points_per_winner(8), 13);
    }

    #[test]
    fn nobody_scores_without_winners() {
        assert_eq!(points_per_winner(0), 0);
    }
}
