//! Guess normalization and matching.
//!
//! Matching is containment, not equality: the normalized stored answer only has to
//! appear somewhere inside the normalized guess, so a guess may carry extra words.

use super::player::PlayerStatus;

/// Shortest accepted guess field, in characters.
pub const MIN_GUESS_LEN: usize = 2;
/// Longest accepted guess field, in characters.
pub const MAX_GUESS_LEN: usize = 100;

/// Independent verdicts for the two halves of a guess.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuessVerdict {
    /// The song title matched.
    pub name_correct: bool,
    /// At least one of the credited artists matched.
    pub artist_correct: bool,
}

impl GuessVerdict {
    /// Collapse the verdict into the status shown to the room.
    pub fn status(&self) -> PlayerStatus {
        match (self.name_correct, self.artist_correct) {
            (true, true) => PlayerStatus::Correct,
            (true, false) | (false, true) => PlayerStatus::Close,
            (false, false) => PlayerStatus::Incorrect,
        }
    }
}

/// Whether both fields have a plausible length; malformed guesses are never matched.
pub fn is_well_formed(guess_name: &str, guess_artist: &str) -> bool {
    let ok = |text: &str| (MIN_GUESS_LEN..=MAX_GUESS_LEN).contains(&text.chars().count());
    ok(guess_name) && ok(guess_artist)
}

/// Compare a guess against the stored title and artist field.
pub fn match_guess(
    real_name: &str,
    real_artist: &str,
    guess_name: &str,
    guess_artist: &str,
) -> GuessVerdict {
    let guess_name = normalize(guess_name);
    let guess_artist = normalize(guess_artist);

    let name = normalize(real_name);
    let name_correct = !name.is_empty() && guess_name.contains(&name);

    let artist_correct = real_artist
        .split([',', '-'])
        .map(normalize)
        .filter(|token| !token.is_empty())
        .any(|token| guess_artist.contains(&token));

    GuessVerdict {
        name_correct,
        artist_correct,
    }
}

/// Reduce a title or artist to lowercase ASCII alphanumerics.
///
/// Everything after the first hyphen is dropped, then whitespace, then `(...)` and
/// `[...]` spans, then any remaining punctuation.
pub fn normalize(text: &str) -> String {
    let head = text.split('-').next().unwrap_or_default();
    let compact: String = head.chars().filter(|c| !c.is_whitespace()).collect();
    let without_parens = strip_spans(&compact, '(', ')');
    let without_brackets = strip_spans(&without_parens, '[', ']');
    without_brackets
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn strip_spans(text: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after = &rest[start + open.len_utf8()..];
        let Some(end) = after.find(close) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &after[end + close.len_utf8()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_decorations() {
        assert_eq!(normalize("Bohemian Rhapsody (Remastered 2011)"), "bohemianrhapsody");
        assert_eq!(normalize("Hey Jude - Remastered"), "heyjude");
        assert_eq!(normalize("Song [Live] (feat. X)!"), "song");
        assert_eq!(normalize("  Don't Stop  Me Now "), "dontstopmenow");
        assert_eq!(normalize("Open (paren"), "openparen");
    }

    #[test]
    fn name_match_is_substring_of_guess() {
        let verdict = match_guess(
            "Bohemian Rhapsody (Remastered 2011)",
            "Queen",
            "Bohemian Rhapsody",
            "Queen",
        );
        assert!(verdict.name_correct);
        assert_eq!(verdict.status(), PlayerStatus::Correct);

        let verdict = match_guess("Hello", "Adele", "Hello from the other side", "adele");
        assert!(verdict.name_correct);

        let verdict = match_guess("Hello from the other side", "Adele", "Hello", "Adele");
        assert!(!verdict.name_correct);
        assert_eq!(verdict.status(), PlayerStatus::Close);
    }

    #[test]
    fn any_credited_artist_is_enough() {
        let verdict = match_guess("Stay", "The Kid LAROI, Justin Bieber", "Stay", "justin bieber");
        assert!(verdict.artist_correct);

        let verdict = match_guess("Empire State of Mind", "JAY-Z", "Empire State of Mind", "jay");
        assert!(verdict.artist_correct);

        let verdict = match_guess("Stay", "The Kid LAROI, Justin Bieber", "Stay", "Rihanna");
        assert!(!verdict.artist_correct);
    }

    #[test]
    fn empty_tokens_never_match() {
        let verdict = match_guess("(Intro)", "Artist,", "anything", "someone");
        assert!(!verdict.name_correct);
        assert!(!verdict.artist_correct);
        assert_eq!(verdict.status(), PlayerStatus::Incorrect);
    }

    #[test]
    fn well_formed_bounds_are_inclusive() {
        assert!(is_well_formed("ab", "cd"));
        assert!(!is_well_formed("a", "cd"));
        assert!(!is_well_formed("ab", &"x".repeat(101)));
        assert!(is_well_formed(&"x".repeat(100), "ab"));
    }
}
