use crate::data::Candidate;
use std::collections::HashSet;

/// Concatenate prime then non-prime results, keeping the first occurrence of
/// each player id.
pub fn merge_unique(prime: Vec<Candidate>, non_prime: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::with_capacity(prime.len() + non_prime.len());
    prime
        .into_iter()
        .chain(non_prime)
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}
