//! Word-prefix matching for the free-text filters on unit name and city.

/// Longest query word a prefix filter accepts. Text indexes keep prefixes up to this length.
pub const MAX_PREFIX_WORD_LEN: usize = 32;

/// Lowercased words of `raw`, split on every character that is not a letter or digit.
pub fn words(raw: &str) -> impl Iterator<Item = String> + '_ {
	raw.split(|c: char| !c.is_alphanumeric()).filter(|word| !word.is_empty()).map(str::to_lowercase)
}

/// Every word of `query` must begin some word of `text`.
pub fn prefix_matches(text: &str, query: &str) -> bool {
	let candidates = words(text).collect::<Vec<_>>();

	words(query).all(|word| candidates.iter().any(|candidate| candidate.starts_with(&word)))
}

/// Canonical form of a prefix query: its words joined by single spaces.
pub fn normalize_prefix_query(raw: &str) -> String {
	words(raw).collect::<Vec<_>>().join(" ")
}
