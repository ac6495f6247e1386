use std::sync::Arc;

use roost_service::RoostService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RoostService>,
}
impl AppState {
	/// Connects the configured backends and makes sure both indexes exist before serving.
	pub async fn new(config: roost_config::Config) -> color_eyre::Result<Self> {
		let service = RoostService::connect(config).await?;
		let built = service.ensure_indexes().await?;

		if !built.is_empty() {
			tracing::info!(
				built = ?built.iter().map(|kind| kind.as_str()).collect::<Vec<_>>(),
				"Missing indexes built at startup."
			);
		}

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: RoostService) -> Self {
		Self { service: Arc::new(service) }
	}
}
