const MIN_E164_DIGITS: usize = 8;
const MAX_E164_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Phone number {raw:?} cannot be normalized to E.164.")]
pub struct InvalidPhone {
	pub raw: String,
}

/// Normalizes a stored phone number to E.164.
///
/// Formatting characters are dropped. A bare 10-digit number is treated as US and gets `+1`; an
/// 11-digit number starting with `1` gets `+`; `+`-prefixed input keeps its country code.
pub fn normalize_e164(raw: &str) -> Result<String, InvalidPhone> {
	let trimmed = raw.trim();
	let invalid = || InvalidPhone { raw: raw.to_string() };
	let (prefixed, rest) = match trimmed.strip_prefix('+') {
		Some(rest) => (true, rest),
		None => (false, trimmed),
	};
	let mut digits = String::with_capacity(rest.len());

	for c in rest.chars() {
		match c {
			'0'..='9' => digits.push(c),
			' ' | '-' | '.' | '(' | ')' => {},
			_ => return Err(invalid()),
		}
	}

	if prefixed {
		if !(MIN_E164_DIGITS..=MAX_E164_DIGITS).contains(&digits.len()) {
			return Err(invalid());
		}

		return Ok(format!("+{digits}"));
	}

	match digits.len() {
		10 => Ok(format!("+1{digits}")),
		11 if digits.starts_with('1') => Ok(format!("+{digits}")),
		_ => Err(invalid()),
	}
}
