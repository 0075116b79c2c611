use duel_types::{Evaluation, Letter, WORD_LENGTH};

pub struct LetterEvaluator;

impl LetterEvaluator {
    /// Evaluate a guess against the secret.
    ///
    /// Both words must already be normalized to `WORD_LENGTH` upper-case
    /// ASCII letters. A letter never earns more Green/Yellow marks than it
    /// has copies in the secret.
    pub fn evaluate(secret: &str, guess: &str) -> Evaluation {
        let secret = secret.as_bytes();
        let guess = guess.as_bytes();
        debug_assert_eq!(secret.len(), WORD_LENGTH);
        debug_assert_eq!(guess.len(), WORD_LENGTH);

        let mut result = [Letter::Black; WORD_LENGTH];

        // Unmatched copies of each secret letter
        let mut remaining = [0u8; 26];

        // First pass: exact positions, everything else goes into the pool
        for i in 0..WORD_LENGTH {
            if guess[i] == secret[i] {
                result[i] = Letter::Green;
            } else {
                remaining[letter_index(secret[i])] += 1;
            }
        }

        // Second pass: left to right, spend the pool on misplaced letters
        for i in 0..WORD_LENGTH {
            if result[i] == Letter::Green {
                continue;
            }

            let slot = &mut remaining[letter_index(guess[i])];
            if *slot > 0 {
                result[i] = Letter::Yellow;
                *slot -= 1;
            }
        }

        result
    }

    pub fn is_solved(evaluation: &Evaluation) -> bool {
        evaluation.iter().all(|letter| *letter == Letter::Green)
    }
}

fn letter_index(byte: u8) -> usize {
    (byte.to_ascii_uppercase().wrapping_sub(b'A') as usize) % 26
}
