//! Token-sequence search over flag assignments.
//!
//! A reconstructed conditional starts as a sequence of flag tests joined by
//! and/or, evaluated right to left with short-circuiting. The search looks
//! for the shortest sequence that matches the expected truth value on every
//! flag assignment, first greedily, then by bounded enumeration.

use std::time::{Duration, Instant};

use indexmap::IndexMap;

pub type FlagSet = IndexMap<String, String>;

/// Per-context flag definition: the values each flag takes, in biased
/// order (On/Enabled first, Off/Disabled last).
pub type FlagDefinition = IndexMap<String, Vec<String>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchCase {
    pub expected: bool,
    pub assignment: FlagSet,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchInput {
    pub cases: Vec<SearchCase>,
    pub flags: FlagDefinition,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Join {
    Initial,
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub join: Join,
    pub negative: bool,
    pub flag: String,
    pub value: String,
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub tokens: Vec<Token>,
    pub score: usize,
    pub total: usize,
}

impl SearchResult {
    pub fn is_perfect(&self) -> bool {
        self.score == self.total
    }
}

/// Evaluates a token sequence, scanning from the last token towards the
/// first with short-circuiting.
pub fn evaluate(tokens: &[Token], assignment: &FlagSet) -> bool {
    for token in tokens.iter().rev() {
        let matches =
            assignment.get(&token.flag).map(String::as_str) == Some(token.value.as_str());
        let truth = matches ^ token.negative;

        match token.join {
            Join::And if !truth => return false,
            Join::Or if truth => return true,
            Join::Initial => return truth,
            _ => {}
        }
    }

    false
}

fn score(tokens: &[Token], cases: &[SearchCase]) -> usize {
    cases
        .iter()
        .filter(|case| evaluate(tokens, &case.assignment) == case.expected)
        .count()
}

/// Flag/value pairs in definition order.
fn pairs(flags: &FlagDefinition) -> Vec<(&str, &str)> {
    flags
        .iter()
        .flat_map(|(flag, values)| values.iter().map(move |v| (flag.as_str(), v.as_str())))
        .collect()
}

pub fn search(input: &SearchInput, timeout: Duration) -> SearchResult {
    let total = input.cases.len();
    let (mut tokens, mut best) = greedy(input);

    if best < total {
        if let Some((slow_tokens, slow_score)) = brute_force(input, timeout) {
            // The slow result only wins by strictly improving, or by
            // matching the score with a shorter sequence.
            if slow_score > best || (slow_score == best && slow_tokens.len() < tokens.len()) {
                tokens = slow_tokens;
                best = slow_score;
            }
        }
    }

    if best < total {
        tracing::warn!(
            "expression search settled for {best}/{total} matching assignments"
        );
    }

    SearchResult {
        tokens,
        score: best,
        total,
    }
}

/// Appends the locally best token each round. Candidate order is
/// negation, then join, then flag name, then flag value; ties keep the
/// first candidate seen.
fn greedy(input: &SearchInput) -> (Vec<Token>, usize) {
    let pairs = pairs(&input.flags);
    if pairs.is_empty() {
        return (Vec::new(), score(&[], &input.cases));
    }

    let rounds = input.flags.len() + 5;
    let mut sequence: Vec<Token> = Vec::new();
    let mut best_sequence = Vec::new();
    let mut best_score = score(&best_sequence, &input.cases);

    for _ in 0..rounds {
        let joins: &[Join] = if sequence.is_empty() {
            &[Join::Initial]
        } else {
            &[Join::And, Join::Or]
        };

        let mut round_best: Option<(usize, Token)> = None;
        for negative in [false, true] {
            for &join in joins {
                for &(flag, value) in &pairs {
                    let token = Token {
                        join,
                        negative,
                        flag: flag.to_owned(),
                        value: value.to_owned(),
                    };

                    sequence.push(token);
                    let candidate_score = score(&sequence, &input.cases);
                    let token = sequence.pop().unwrap();

                    if round_best
                        .as_ref()
                        .map_or(true, |(best, _)| candidate_score > *best)
                    {
                        round_best = Some((candidate_score, token));
                    }
                }
            }
        }

        let (round_score, token) = round_best.unwrap();
        sequence.push(token);

        if round_score > best_score {
            best_score = round_score;
            best_sequence = sequence.clone();
        }

        if best_score == input.cases.len() {
            break;
        }
    }

    (best_sequence, best_score)
}

/// Enumerates token sequences as a variable-length counter until a perfect
/// sequence appears, the space is exhausted, or the timeout elapses.
fn brute_force(input: &SearchInput, timeout: Duration) -> Option<(Vec<Token>, usize)> {
    let pairs = pairs(&input.flags);
    if pairs.is_empty() {
        return None;
    }

    let deadline = Instant::now() + timeout;
    let max_len = input.flags.len() + 5;

    // Digit decoding follows the greedy candidate order: negation, join,
    // then the flag/value pair.
    let initial_options = 2 * pairs.len();
    let chained_options = 4 * pairs.len();
    let token_at = |position: usize, digit: usize| -> Token {
        let (negative, join, pair) = if position == 0 {
            (digit >= pairs.len(), Join::Initial, digit % pairs.len())
        } else {
            let negative = digit >= 2 * pairs.len();
            let rem = digit % (2 * pairs.len());
            let join = if rem < pairs.len() { Join::And } else { Join::Or };
            (negative, join, rem % pairs.len())
        };
        let (flag, value) = pairs[pair];
        Token {
            join,
            negative,
            flag: flag.to_owned(),
            value: value.to_owned(),
        }
    };

    let mut best: Option<(Vec<Token>, usize)> = None;
    let mut ticks = 0u32;

    for len in 1..=max_len {
        let mut digits = vec![0usize; len];

        'sequences: loop {
            let sequence: Vec<Token> = digits
                .iter()
                .enumerate()
                .map(|(position, &digit)| token_at(position, digit))
                .collect();

            let sequence_score = score(&sequence, &input.cases);
            if best.as_ref().map_or(true, |(_, s)| sequence_score > *s) {
                let perfect = sequence_score == input.cases.len();
                best = Some((sequence, sequence_score));
                if perfect {
                    return best;
                }
            }

            ticks = ticks.wrapping_add(1);
            if ticks % 256 == 0 && Instant::now() >= deadline {
                return best;
            }

            // Increment, rightmost digit fastest.
            let mut position = len - 1;
            loop {
                digits[position] += 1;
                let limit = if position == 0 {
                    initial_options
                } else {
                    chained_options
                };
                if digits[position] < limit {
                    break;
                }
                digits[position] = 0;
                if position == 0 {
                    break 'sequences;
                }
                position -= 1;
            }
        }
    }

    best
}

/// Builds the per-context flag definition from the flag sets in play,
/// dropping flags that only ever take one value and biasing value order.
pub fn flag_definition(flag_sets: &[FlagSet]) -> FlagDefinition {
    let mut definition: FlagDefinition = IndexMap::new();

    for flags in flag_sets {
        for (flag, value) in flags {
            let values = definition.entry(flag.clone()).or_default();
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
    }

    definition.retain(|_, values| values.len() > 1);

    for values in definition.values_mut() {
        let mut front: Vec<String> = Vec::new();
        let mut middle: Vec<String> = Vec::new();
        let mut back: Vec<String> = Vec::new();
        for value in values.drain(..) {
            match value.as_str() {
                "On" | "Enabled" => front.push(value),
                "Off" | "Disabled" => back.push(value),
                _ => middle.push(value),
            }
        }
        values.extend(front);
        values.extend(middle);
        values.extend(back);
    }

    definition
}
