/// Metacharacters, in the order a word is scanned for them.
pub const OPERATORS: [char; 4] = ['&', '<', '>', '|'];

pub fn is_operator(token: &str) -> bool {
	let mut chars = token.chars();
	match (chars.next(), chars.next()) {
		(Some(c), None) => OPERATORS.contains(&c),
		_ => false,
	}
}

// Splits a word around the first metacharacter found (in OPERATORS order).
// Single-character words are left alone so a lone operator stays put.
fn split_word(word: &str) -> Option<[&str; 3]> {
	if word.len() < 2 {
		return None;
	}
	OPERATORS.iter().find_map(|&op| {
		word.find(op).map(|pos| [&word[.. pos], &word[pos .. pos + 1], &word[pos + 1 ..]])
	})
}

/// Splits a command line into words and single-character operator tokens.
///
/// Whitespace separates words first; operators glued to words (`a>b`,
/// `ls|nl`) are then cut out into tokens of their own. Nothing is quoted,
/// escaped or expanded.
pub fn tokenize(line: &str) -> Vec<String> {
	let mut tokens: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
	let mut i = 0;
	while i < tokens.len() {
		let pieces: Vec<String> = match split_word(&tokens[i]) {
			Some(pieces) => pieces.iter().filter(|p| !p.is_empty()).map(|p| p.to_string()).collect(),
			None => {
				i += 1;
				continue;
			},
		};
		// the left piece may still hold operators, so stay on index i
		tokens.splice(i ..= i, pieces);
	}
	tokens
}
