use std::sync::Arc;

use graphrag_service::GraphRagService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<GraphRagService>,
}
impl AppState {
	pub async fn connect(config: graphrag_config::Config) -> color_eyre::Result<Self> {
		let service = GraphRagService::connect(config).await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: GraphRagService) -> Self {
		Self { service: Arc::new(service) }
	}
}
