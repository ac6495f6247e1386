use crate::Result;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub units_collection: String,
	pub schedule_collection: String,
}
impl QdrantStore {
	pub fn new(cfg: &roost_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			units_collection: cfg.units_collection.clone(),
			schedule_collection: cfg.schedule_collection.clone(),
		})
	}
}

pub fn is_not_found_error(err: &qdrant_client::QdrantError) -> bool {
	let message = err.to_string().to_ascii_lowercase();

	message.contains("not found") || message.contains("doesn't exist") || message.contains("does not exist")
}

pub fn is_already_exists_error(err: &qdrant_client::QdrantError) -> bool {
	err.to_string().to_ascii_lowercase().contains("already exists")
}
