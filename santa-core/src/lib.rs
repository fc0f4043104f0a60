use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub type Participant = String;

/// Upper bound on shuffles tried before a draw is declared infeasible.
pub const MAX_ATTEMPTS: usize = 5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SantaError {
    #[error("roster needs at least two participants, got {0}")]
    RosterTooSmall(usize),
    #[error("participant listed twice: {0}")]
    DuplicateParticipant(Participant),
    #[error("unknown participant: {0}")]
    UnknownParticipant(Participant),
    #[error("no valid assignment found after {attempts} attempts")]
    GenerationInfeasible { attempts: usize },
    #[error("{0} is assigned to themselves")]
    SelfAssignment(Participant),
    #[error("forbidden pair {giver} -> {receiver}")]
    ForbiddenPair {
        giver: Participant,
        receiver: Participant,
    },
    #[error("assignment is not a permutation of the roster")]
    NotAPermutation,
}

/// The fixed, ordered list of people taking part in the draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Vec<Participant>", into = "Vec<Participant>")]
pub struct Roster {
    names: Vec<Participant>,
}

impl Roster {
    pub fn new<I, S>(names: I) -> Result<Self, SantaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Participant>,
    {
        let names: Vec<Participant> = names.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(SantaError::DuplicateParticipant(name.clone()));
            }
        }
        if names.len() < 2 {
            return Err(SantaError::RosterTooSmall(names.len()));
        }
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[Participant] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl TryFrom<Vec<Participant>> for Roster {
    type Error = SantaError;

    fn try_from(names: Vec<Participant>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<Roster> for Vec<Participant> {
    fn from(roster: Roster) -> Self {
        roster.names
    }
}

/// (giver, receiver) pairs that may never appear in a draw, keyed by giver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    from = "Vec<(Participant, Participant)>",
    into = "Vec<(Participant, Participant)>"
)]
pub struct ForbiddenPairs(HashMap<Participant, HashSet<Participant>>);

impl ForbiddenPairs {
    pub fn new<I, G, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (G, R)>,
        G: Into<Participant>,
        R: Into<Participant>,
    {
        let mut by_giver: HashMap<Participant, HashSet<Participant>> = HashMap::new();
        for (giver, receiver) in pairs {
            by_giver
                .entry(giver.into())
                .or_default()
                .insert(receiver.into());
        }
        Self(by_giver)
    }

    pub fn contains(&self, giver: &str, receiver: &str) -> bool {
        self.0
            .get(giver)
            .is_some_and(|receivers| receivers.contains(receiver))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Participant, &Participant)> {
        self.0
            .iter()
            .flat_map(|(giver, receivers)| receivers.iter().map(move |r| (giver, r)))
    }

    /// Every pair must name roster members.
    pub fn check_against(&self, roster: &Roster) -> Result<(), SantaError> {
        for (giver, receiver) in self.iter() {
            for name in [giver, receiver] {
                if !roster.contains(name) {
                    return Err(SantaError::UnknownParticipant(name.clone()));
                }
            }
        }
        Ok(())
    }
}

impl From<Vec<(Participant, Participant)>> for ForbiddenPairs {
    fn from(pairs: Vec<(Participant, Participant)>) -> Self {
        Self::new(pairs)
    }
}

impl From<ForbiddenPairs> for Vec<(Participant, Participant)> {
    fn from(pairs: ForbiddenPairs) -> Self {
        pairs
            .0
            .into_iter()
            .flat_map(|(giver, receivers)| receivers.into_iter().map(move |r| (giver.clone(), r)))
            .collect()
    }
}

/// Per-participant PINs used to gate reveals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinRegistry {
    pub required: bool,
    #[serde(default)]
    pub pins: HashMap<Participant, String>,
}

impl PinRegistry {
    pub fn required(pins: HashMap<Participant, String>) -> Self {
        Self {
            required: true,
            pins,
        }
    }

    /// A participant without a configured PIN can never pass when PINs are required.
    pub fn accepts(&self, giver: &str, supplied: &str) -> bool {
        if !self.required {
            return true;
        }
        self.pins
            .get(giver)
            .map(|pin| pin == supplied)
            .unwrap_or(false)
    }

    pub fn check_against(&self, roster: &Roster) -> Result<(), SantaError> {
        match self.pins.keys().find(|name| !roster.contains(name)) {
            Some(name) => Err(SantaError::UnknownParticipant(name.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pair {
    pub giver: Participant,
    pub receiver: Participant,
}

/// A complete draw: one receiver per giver, in roster order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pairs: Vec<Pair>,
}

impl Assignment {
    /// Wraps stored pairs without checking them; see [`Assignment::validate`].
    pub fn from_pairs(pairs: Vec<Pair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn receiver_of(&self, giver: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.giver == giver)
            .map(|p| p.receiver.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn validate(&self, roster: &Roster, forbidden: &ForbiddenPairs) -> Result<(), SantaError> {
        if self.pairs.len() != roster.len() {
            return Err(SantaError::NotAPermutation);
        }
        let expected: HashSet<&str> = roster.names().iter().map(String::as_str).collect();
        let givers: HashSet<&str> = self.pairs.iter().map(|p| p.giver.as_str()).collect();
        let receivers: HashSet<&str> = self.pairs.iter().map(|p| p.receiver.as_str()).collect();
        if givers != expected || receivers != expected {
            return Err(SantaError::NotAPermutation);
        }

        for pair in &self.pairs {
            if pair.giver == pair.receiver {
                return Err(SantaError::SelfAssignment(pair.giver.clone()));
            }
            if forbidden.contains(&pair.giver, &pair.receiver) {
                return Err(SantaError::ForbiddenPair {
                    giver: pair.giver.clone(),
                    receiver: pair.receiver.clone(),
                });
            }
        }
        Ok(())
    }
}

pub fn is_valid_pair(giver: &str, receiver: &str, forbidden: &ForbiddenPairs) -> bool {
    giver != receiver && !forbidden.contains(giver, receiver)
}

/// Draws receivers by shuffling the roster until every pairing is allowed.
pub fn generate<R: Rng + ?Sized>(
    roster: &Roster,
    forbidden: &ForbiddenPairs,
    rng: &mut R,
) -> Result<Assignment, SantaError> {
    let givers = roster.names();
    let mut receivers = givers.to_vec();

    for _ in 0..MAX_ATTEMPTS {
        receivers.shuffle(rng);

        let ok = givers
            .iter()
            .zip(&receivers)
            .all(|(giver, receiver)| is_valid_pair(giver, receiver, forbidden));

        if ok {
            let pairs = givers
                .iter()
                .zip(&receivers)
                .map(|(giver, receiver)| Pair {
                    giver: giver.clone(),
                    receiver: receiver.clone(),
                })
                .collect();
            return Ok(Assignment { pairs });
        }
    }

    Err(SantaError::GenerationInfeasible {
        attempts: MAX_ATTEMPTS,
    })
}

pub fn generate_with_thread_rng(
    roster: &Roster,
    forbidden: &ForbiddenPairs,
) -> Result<Assignment, SantaError> {
    generate(roster, forbidden, &mut thread_rng())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevealState {
    NotRevealed,
    Revealed,
}

impl From<bool> for RevealState {
    fn from(revealed: bool) -> Self {
        if revealed {
            Self::Revealed
        } else {
            Self::NotRevealed
        }
    }
}

#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("invalid name")]
    InvalidName,
    #[error("this name has already been used to see the result")]
    AlreadyRevealed,
    #[error("incorrect PIN")]
    BadPin,
    #[error("no assignment stored for this participant")]
    MissingAssignment,
}

impl Rejection {
    /// Internal rejections point at corrupted state rather than bad input.
    pub fn is_internal(self) -> bool {
        matches!(self, Self::MissingAssignment)
    }
}

/// Checks run before a receiver is looked up, in order; the first failure wins.
pub fn admit_reveal(
    roster: &Roster,
    pins: &PinRegistry,
    giver: &str,
    supplied_pin: &str,
    state: RevealState,
) -> Result<(), Rejection> {
    if !roster.contains(giver) {
        return Err(Rejection::InvalidName);
    }
    if state == RevealState::Revealed {
        return Err(Rejection::AlreadyRevealed);
    }
    if !pins.accepts(giver, supplied_pin) {
        return Err(Rejection::BadPin);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn roster(names: &[&str]) -> Roster {
        Roster::new(names.iter().copied()).unwrap()
    }

    fn eight() -> Roster {
        roster(&[
            "Fortis", "Mara", "Diego", "Maryem", "Zaira", "Kami", "Laila", "Alek",
        ])
    }

    fn pins(required: bool) -> PinRegistry {
        PinRegistry {
            required,
            pins: HashMap::from([("A".to_string(), "1111".to_string())]),
        }
    }

    #[test]
    fn generated_assignments_hold_invariants() {
        let roster = eight();
        let forbidden = ForbiddenPairs::new([("Fortis", "Mara"), ("Kami", "Laila")]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..200 {
            let assignment = generate(&roster, &forbidden, &mut rng).unwrap();
            assert_eq!(assignment.validate(&roster, &forbidden), Ok(()));
            assert_eq!(assignment.len(), roster.len());
            let givers: Vec<_> = assignment.pairs().iter().map(|p| p.giver.clone()).collect();
            assert_eq!(givers, roster.names());
        }
    }

    #[test]
    fn three_people_never_get_forbidden_or_self_pairs() {
        let roster = roster(&["A", "B", "C"]);
        let forbidden = ForbiddenPairs::new([("A", "B")]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..100 {
            let assignment = generate(&roster, &forbidden, &mut rng).unwrap();
            assert_ne!(assignment.receiver_of("A"), Some("B"));
            for pair in assignment.pairs() {
                assert_ne!(pair.giver, pair.receiver);
            }
            // With A->B ruled out the only derangement left is A->C, B->A, C->B.
            assert_eq!(assignment.receiver_of("A"), Some("C"));
            assert_eq!(assignment.receiver_of("B"), Some("A"));
            assert_eq!(assignment.receiver_of("C"), Some("B"));
        }
    }

    #[test]
    fn infeasible_constraints_are_reported() {
        let roster = roster(&["A", "B"]);
        let forbidden = ForbiddenPairs::new([("A", "B")]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let err = generate(&roster, &forbidden, &mut rng).unwrap_err();
        assert_eq!(
            err,
            SantaError::GenerationInfeasible {
                attempts: MAX_ATTEMPTS
            }
        );
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let roster = eight();
        let forbidden = ForbiddenPairs::default();
        let a = generate(&roster, &forbidden, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        let b = generate(&roster, &forbidden, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn roster_rejects_duplicates_and_tiny_lists() {
        assert_eq!(
            Roster::new(["A", "B", "A"]).unwrap_err(),
            SantaError::DuplicateParticipant("A".into())
        );
        assert_eq!(Roster::new(["A"]).unwrap_err(), SantaError::RosterTooSmall(1));
        assert_eq!(
            Roster::new(Vec::<String>::new()).unwrap_err(),
            SantaError::RosterTooSmall(0)
        );
    }

    #[test]
    fn roster_deserializes_through_validation() {
        let ok: Roster = serde_json::from_str(r#"["A", "B"]"#).unwrap();
        assert_eq!(ok.names(), ["A", "B"]);

        let err = serde_json::from_str::<Roster>(r#"["A", "A"]"#).unwrap_err();
        assert!(err.to_string().contains("participant listed twice"));
    }

    #[test]
    fn forbidden_pairs_deserialize_from_arrays() {
        let pairs: ForbiddenPairs = serde_json::from_str(r#"[["A", "B"]]"#).unwrap();
        assert!(pairs.contains("A", "B"));
        assert!(!pairs.contains("B", "A"));
    }

    #[test]
    fn forbidden_pairs_group_receivers_per_giver() {
        let pairs = ForbiddenPairs::new([("A", "B"), ("A", "C"), ("B", "C")]);
        assert!(pairs.contains("A", "B"));
        assert!(pairs.contains("A", "C"));
        assert!(pairs.contains("B", "C"));
        assert!(!pairs.contains("C", "A"));
        assert!(!pairs.contains("Z", "A"));
        assert_eq!(pairs.iter().count(), 3);

        let json = serde_json::to_string(&pairs).unwrap();
        let back: ForbiddenPairs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pairs);
    }

    #[test]
    fn validate_flags_each_kind_of_violation() {
        let roster = roster(&["A", "B", "C"]);
        let forbidden = ForbiddenPairs::new([("A", "B")]);
        let pair = |g: &str, r: &str| Pair {
            giver: g.into(),
            receiver: r.into(),
        };

        let selfish = Assignment::from_pairs(vec![pair("A", "A"), pair("B", "C"), pair("C", "B")]);
        assert_eq!(
            selfish.validate(&roster, &forbidden),
            Err(SantaError::SelfAssignment("A".into()))
        );

        let forbidden_pair =
            Assignment::from_pairs(vec![pair("A", "B"), pair("B", "C"), pair("C", "A")]);
        assert_eq!(
            forbidden_pair.validate(&roster, &forbidden),
            Err(SantaError::ForbiddenPair {
                giver: "A".into(),
                receiver: "B".into()
            })
        );

        let doubled = Assignment::from_pairs(vec![pair("A", "C"), pair("B", "C"), pair("C", "A")]);
        assert_eq!(
            doubled.validate(&roster, &forbidden),
            Err(SantaError::NotAPermutation)
        );

        let short = Assignment::from_pairs(vec![pair("A", "C"), pair("C", "A")]);
        assert_eq!(
            short.validate(&roster, &forbidden),
            Err(SantaError::NotAPermutation)
        );
    }

    #[test]
    fn config_entries_must_name_roster_members() {
        let roster = roster(&["A", "B"]);
        assert_eq!(
            ForbiddenPairs::new([("A", "Z")]).check_against(&roster),
            Err(SantaError::UnknownParticipant("Z".into()))
        );
        let registry = PinRegistry::required(HashMap::from([("Q".to_string(), "1".to_string())]));
        assert_eq!(
            registry.check_against(&roster),
            Err(SantaError::UnknownParticipant("Q".into()))
        );
    }

    #[test]
    fn admit_checks_run_in_order() {
        let roster = roster(&["A", "B"]);
        let pins = pins(true);

        // Unknown name wins over everything else.
        assert_eq!(
            admit_reveal(&roster, &pins, "Z", "bad", RevealState::Revealed),
            Err(Rejection::InvalidName)
        );
        // Already revealed wins over a bad PIN.
        assert_eq!(
            admit_reveal(&roster, &pins, "A", "bad", RevealState::Revealed),
            Err(Rejection::AlreadyRevealed)
        );
        assert_eq!(
            admit_reveal(&roster, &pins, "A", "bad", RevealState::NotRevealed),
            Err(Rejection::BadPin)
        );
        assert_eq!(
            admit_reveal(&roster, &pins, "A", "1111", RevealState::NotRevealed),
            Ok(())
        );
    }

    #[test]
    fn pin_gate_respects_required_flag() {
        let roster = roster(&["A", "B"]);

        // B has no PIN configured, so it can never pass while PINs are required.
        assert_eq!(
            admit_reveal(&roster, &pins(true), "B", "", RevealState::NotRevealed),
            Err(Rejection::BadPin)
        );
        assert_eq!(
            admit_reveal(&roster, &pins(false), "B", "", RevealState::NotRevealed),
            Ok(())
        );
        assert!(Rejection::MissingAssignment.is_internal());
        assert!(!Rejection::BadPin.is_internal());
    }
}
