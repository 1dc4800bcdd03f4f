use std::sync::Arc;

use dun_config::Config;
use dun_service::ReminderService;
use dun_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ReminderService>,
	/// Bearer token required on run endpoints, if configured.
	pub invoke_token: Option<Arc<str>>,
}
impl AppState {
	pub async fn new(config: &Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let service = ReminderService::from_config(config, &db)?;

		Ok(Self::with_service(service, config.security.invoke_token.as_deref()))
	}

	pub fn with_service(service: ReminderService, invoke_token: Option<&str>) -> Self {
		Self { service: Arc::new(service), invoke_token: invoke_token.map(Arc::from) }
	}
}
