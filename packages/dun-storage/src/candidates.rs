use sqlx::PgExecutor;

use crate::{Error, Result, models::CandidateRow};

/// Reads up to `limit` candidates from an engine's eligibility relation, most overdue first.
///
/// `thresholds` is the engine's schedule in hours, attempt 1 first. Only rows whose next attempt
/// (`prior_attempt_count + 1`) exists and whose threshold has passed are returned, so subjects
/// that are exhausted or not yet due never crowd due ones out of the limit.
///
/// The relation name is interpolated into the statement, so it is re-checked here even though
/// config validation already rejected anything that is not a plain identifier.
pub async fn fetch_candidates<'e, E>(
	executor: E,
	relation: &str,
	thresholds: &[f64],
	limit: u32,
) -> Result<Vec<CandidateRow>>
where
	E: PgExecutor<'e>,
{
	if !dun_config::is_relation_name(relation) {
		return Err(Error::InvalidArgument(format!(
			"Candidate relation {relation:?} is not a valid identifier."
		)));
	}

	let sql = format!(
		"\
SELECT
	subject_id,
	user_id,
	client_name,
	client_phone,
	currency,
	total::float8 AS total,
	partial_amount::float8 AS partial_amount,
	status,
	tracking_id,
	hours_since_anchor::float8 AS hours_since_anchor,
	prior_attempt_count::int4 AS prior_attempt_count
FROM {relation}
WHERE GREATEST(prior_attempt_count, 0) < cardinality($1::float8[])
	AND hours_since_anchor::float8 <> 'NaN'::float8
	AND hours_since_anchor::float8 >= ($1::float8[])[GREATEST(prior_attempt_count, 0)::int4 + 1]
ORDER BY hours_since_anchor DESC, subject_id ASC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, CandidateRow>(&sql)
		.bind(thresholds)
		.bind(i64::from(limit))
		.fetch_all(executor)
		.await?;

	Ok(rows)
}
