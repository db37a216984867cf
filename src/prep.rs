use rand::seq::SliceRandom;
use strsim::jaro_winkler;

const BANK: &[(&str, &[&str])] = &[
    (
        "arrays",
        &[
            "Two Sum",
            "Best Time to Buy and Sell Stock",
            "Product of Array Except Self",
        ],
    ),
    ("graphs", &["Number of Islands", "Clone Graph"]),
    (
        "behavioral",
        &[
            "Tell me about a time you disagreed with a teammate.",
            "Describe a challenging bug you fixed.",
        ],
    ),
];

pub const DEFAULT_DOMAIN: &str = "arrays";
pub const FALLBACK_DOMAIN: &str = "behavioral";
const MATCH_THRESHOLD: f64 = 0.85;

pub fn domains() -> impl Iterator<Item = &'static str> {
    BANK.iter().map(|(name, _)| *name)
}

fn questions(domain: &str) -> &'static [&'static str] {
    BANK.iter()
        .find(|(name, _)| *name == domain)
        .map(|(_, qs)| *qs)
        .unwrap_or(&[])
}

/// Map user input to a known domain: exact, then closest by Jaro-Winkler,
/// then behavioral.
pub fn resolve_domain(input: &str) -> &'static str {
    let wanted = input.trim().to_lowercase();
    if let Some(exact) = domains().find(|d| *d == wanted) {
        return exact;
    }
    domains()
        .map(|d| (d, jaro_winkler(&wanted, d)))
        .filter(|(_, score)| *score >= MATCH_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(d, _)| d)
        .unwrap_or(FALLBACK_DOMAIN)
}

pub fn ask_random(domain: &str) -> (&'static str, &'static str) {
    let resolved = resolve_domain(domain);
    let question = questions(resolved)
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Tell me about yourself.");
    (resolved, question)
}
