use unicode_segmentation::UnicodeSegmentation;

use crate::EngineKind;

pub const MAX_MESSAGE_CHARS: usize = 240;
pub const OPT_OUT_MARKER: &str = "Reply STOP to opt out.";

const MAX_FIRST_NAME_GRAPHEMES: usize = 20;
const FALLBACK_GREETING: &str = "Hi there";

// Placeholders: {greeting} {amount} {link}. Only the first attempt of each table carries the
// opt-out marker.
const CHASE_FULL: [&str; 5] = [
	"{greeting}, a friendly reminder that your invoice for {amount} is ready. You can view and pay it here: {link} Reply STOP to opt out.",
	"{greeting}, just following up on your invoice for {amount}. You can pay securely here: {link}",
	"{greeting}, your invoice for {amount} is now past due. Please take a moment to pay here: {link}",
	"{greeting}, your invoice for {amount} remains unpaid. Please settle it soon to avoid further follow-up: {link}",
	"{greeting}, final notice: your invoice for {amount} is still outstanding. Please pay today: {link}",
];
const CHASE_BALANCE: [&str; 5] = [
	"{greeting}, thanks for your payment so far. A balance of {amount} remains on your invoice. Pay here: {link} Reply STOP to opt out.",
	"{greeting}, a quick follow-up on the remaining balance of {amount}. You can pay securely here: {link}",
	"{greeting}, the remaining balance of {amount} on your invoice is now past due. Please pay here: {link}",
	"{greeting}, the remaining balance of {amount} is still unpaid. Please settle it soon: {link}",
	"{greeting}, final notice: a balance of {amount} is still outstanding on your invoice. Please pay today: {link}",
];
const NUDGE_FULL: [&str; 3] = [
	"{greeting}, your estimate for {amount} is ready for review. Take a look and approve it when you are ready: {link} Reply STOP to opt out.",
	"{greeting}, checking in on your estimate for {amount}. Happy to answer any questions. Review it here: {link}",
	"{greeting}, your estimate for {amount} is still available if you would like to move forward: {link}",
];
const NUDGE_DEPOSIT: [&str; 3] = [
	"{greeting}, your estimate is ready. A deposit of {amount} gets you on the schedule. Review and approve here: {link} Reply STOP to opt out.",
	"{greeting}, checking in on your estimate. The {amount} deposit holds your spot whenever you are ready: {link}",
	"{greeting}, your estimate and {amount} deposit are still available if you would like to go ahead: {link}",
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComposeError {
	#[error("No {kind} template exists for attempt {attempt_number}.")]
	UnknownAttempt { kind: EngineKind, attempt_number: u32 },
	#[error("Rendered message is {chars} characters; the limit is {MAX_MESSAGE_CHARS}.")]
	TooLong { chars: usize },
}

#[derive(Debug, Clone)]
pub struct MessageInput<'a> {
	pub kind: EngineKind,
	/// Chase: a partial payment left a remaining balance. Nudge: a deposit is requested.
	pub balance_variant: bool,
	pub attempt_number: u32,
	pub amount: f64,
	pub currency: &'a str,
	pub link: &'a str,
	pub client_first_name: Option<&'a str>,
}

pub fn template(kind: EngineKind, balance_variant: bool, attempt_number: u32) -> Option<&'static str> {
	let table: &[&'static str] = match (kind, balance_variant) {
		(EngineKind::Chase, false) => &CHASE_FULL,
		(EngineKind::Chase, true) => &CHASE_BALANCE,
		(EngineKind::Nudge, false) => &NUDGE_FULL,
		(EngineKind::Nudge, true) => &NUDGE_DEPOSIT,
	};
	let idx = attempt_number.checked_sub(1)? as usize;

	table.get(idx).copied()
}

/// Renders the SMS body for one attempt.
///
/// The greeting drops the client's name if the personalized text would exceed
/// [`MAX_MESSAGE_CHARS`]; if even the nameless text is too long the render fails.
pub fn render(input: &MessageInput<'_>) -> Result<String, ComposeError> {
	let template = template(input.kind, input.balance_variant, input.attempt_number).ok_or(
		ComposeError::UnknownAttempt { kind: input.kind, attempt_number: input.attempt_number },
	)?;
	let amount = format_amount(input.amount, input.currency);
	let personalized = input.client_first_name.and_then(first_name).map(|name| format!("Hi {name}"));

	if let Some(greeting) = personalized {
		let body = fill(template, &greeting, &amount, input.link);

		if body.chars().count() <= MAX_MESSAGE_CHARS {
			return Ok(body);
		}
	}

	let body = fill(template, FALLBACK_GREETING, &amount, input.link);
	let chars = body.chars().count();

	if chars > MAX_MESSAGE_CHARS {
		return Err(ComposeError::TooLong { chars });
	}

	Ok(body)
}

/// First word of a client's display name, reduced to letters, apostrophes and hyphens, truncated,
/// and taken out of all-caps.
pub fn first_name(client_name: &str) -> Option<String> {
	let word = client_name.split_whitespace().next()?;
	let cleaned: String =
		word.chars().filter(|c| c.is_alphabetic() || *c == '\'' || *c == '-').collect();
	let cleaned = cleaned.trim_matches(|c| c == '\'' || c == '-');

	if cleaned.is_empty() {
		return None;
	}

	let truncated: String = cleaned.graphemes(true).take(MAX_FIRST_NAME_GRAPHEMES).collect();
	let shouting = truncated.chars().filter(|c| c.is_alphabetic()).count() > 1
		&& truncated.chars().all(|c| !c.is_lowercase());

	if !shouting {
		return Some(truncated);
	}

	let mut chars = truncated.chars();
	let mut out = String::with_capacity(truncated.len());

	if let Some(head) = chars.next() {
		out.push(head);
	}
	for c in chars {
		out.extend(c.to_lowercase());
	}

	Some(out)
}

/// Two decimals with thousands separators, prefixed by a symbol for common currencies and
/// suffixed by the ISO code otherwise.
pub fn format_amount(amount: f64, currency: &str) -> String {
	let cents = if amount.is_finite() { (amount * 100.0).round() as i64 } else { 0 };
	let negative = cents < 0;
	let cents = cents.unsigned_abs();
	let whole = group_thousands(cents / 100);
	let number = format!("{whole}.{:02}", cents % 100);
	let sign = if negative { "-" } else { "" };
	let code = currency.trim().to_ascii_uppercase();
	let symbol = match code.as_str() {
		"USD" => Some("$"),
		"CAD" => Some("CA$"),
		"AUD" => Some("A$"),
		"EUR" => Some("\u{20AC}"),
		"GBP" => Some("\u{00A3}"),
		_ => None,
	};

	match symbol {
		Some(symbol) => format!("{sign}{symbol}{number}"),
		None => format!("{sign}{number} {code}"),
	}
}

fn group_thousands(value: u64) -> String {
	let digits = value.to_string();
	let mut out = String::with_capacity(digits.len() + digits.len() / 3);

	for (idx, c) in digits.chars().enumerate() {
		if idx > 0 && (digits.len() - idx) % 3 == 0 {
			out.push(',');
		}

		out.push(c);
	}

	out
}

fn fill(template: &str, greeting: &str, amount: &str, link: &str) -> String {
	template.replace("{greeting}", greeting).replace("{amount}", amount).replace("{link}", link)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn formats_amounts() {
		assert_eq!(format_amount(1234.5, "usd"), "$1,234.50");
		assert_eq!(format_amount(0.0, "USD"), "$0.00");
		assert_eq!(format_amount(999.999, "USD"), "$1,000.00");
		assert_eq!(format_amount(1_000_000.0, "EUR"), "\u{20AC}1,000,000.00");
		assert_eq!(format_amount(42.0, "chf"), "42.00 CHF");
		assert_eq!(format_amount(75.25, "CAD"), "CA$75.25");
	}

	#[test]
	fn first_name_is_sanitized() {
		assert_eq!(first_name("Ada Lovelace").as_deref(), Some("Ada"));
		assert_eq!(first_name("  JOHN SMITH").as_deref(), Some("John"));
		assert_eq!(first_name("O'Brien").as_deref(), Some("O'Brien"));
		assert_eq!(first_name("Ana-Maria Lopez").as_deref(), Some("Ana-Maria"));
		assert_eq!(first_name("\u{1F600}").as_deref(), None);
		assert_eq!(first_name("   ").as_deref(), None);
		assert_eq!(
			first_name("Bartholomewwwwwwwwwwwwwwwwwwww").map(|name| name.chars().count()),
			Some(MAX_FIRST_NAME_GRAPHEMES)
		);
	}

	#[test]
	fn every_attempt_has_exactly_one_template() {
		for (kind, max) in [(EngineKind::Chase, 5), (EngineKind::Nudge, 3)] {
			for balance_variant in [false, true] {
				for attempt in 1..=max {
					assert!(template(kind, balance_variant, attempt).is_some());
				}

				assert!(template(kind, balance_variant, 0).is_none());
				assert!(template(kind, balance_variant, max + 1).is_none());
			}
		}
	}
}
