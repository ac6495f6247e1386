use std::sync::Arc;

use qdrant_client::qdrant::{
	CollectionStatus, CreateCollectionBuilder, CreateFieldIndexCollection,
	DeleteFieldIndexCollectionBuilder, FieldType, PayloadIndexParams, TextIndexParams, TokenizerType,
	payload_index_params::IndexParams,
};

use roost_domain::{Currency, text::MAX_PREFIX_WORD_LEN};
use roost_storage::qdrant::{QdrantStore, is_already_exists_error, is_not_found_error};

use crate::{
	BoxFuture, Result,
	lifecycle::{IndexInfo, IndexKind, IndexLifecycle},
	qdrant_payload,
};

const UNIT_FIELDS: [(&str, FieldType); 13] = [
	("unit_id", FieldType::Keyword),
	("property_id", FieldType::Keyword),
	("property_type_id", FieldType::Keyword),
	("unit_type_id", FieldType::Keyword),
	("city", FieldType::Keyword),
	("city_text", FieldType::Text),
	("name", FieldType::Text),
	("location", FieldType::Geo),
	("max_adults", FieldType::Integer),
	("max_children", FieldType::Integer),
	("rating", FieldType::Float),
	("amenity_ids", FieldType::Keyword),
	("service_ids", FieldType::Keyword),
];
const SCHEDULE_FIELDS: [(&str, FieldType); 8] = [
	("unit_id", FieldType::Keyword),
	("property_id", FieldType::Keyword),
	("day", FieldType::Integer),
	("date", FieldType::Keyword),
	("status", FieldType::Keyword),
	("amount", FieldType::Float),
	("currency", FieldType::Keyword),
	("price_type", FieldType::Keyword),
];

/// Each index is a vector-less collection whose payload fields carry filterable indexes.
pub struct QdrantLifecycle {
	qdrant: Arc<QdrantStore>,
}
impl QdrantLifecycle {
	pub fn new(qdrant: Arc<QdrantStore>) -> Self {
		Self { qdrant }
	}

	fn collection(&self, kind: IndexKind) -> &str {
		match kind {
			IndexKind::Units => &self.qdrant.units_collection,
			IndexKind::Schedule => &self.qdrant.schedule_collection,
		}
	}

	async fn create(&self, kind: IndexKind) -> Result<()> {
		let collection = self.collection(kind);

		match self.qdrant.client.create_collection(CreateCollectionBuilder::new(collection)).await {
			Ok(_) => {},
			Err(err) if is_already_exists_error(&err) => {
				tracing::debug!(collection, "Collection already exists.");
			},
			Err(err) => return Err(err.into()),
		}

		for (field_name, field_type) in payload_fields(kind) {
			let request = CreateFieldIndexCollection {
				collection_name: collection.to_string(),
				wait: Some(true),
				field_name: field_name.clone(),
				field_type: Some(field_type as i32),
				field_index_params: index_params(field_type),
				ordering: None,
			};

			match self.qdrant.client.create_field_index(request).await {
				Ok(_) => {},
				Err(err) if is_already_exists_error(&err) => {},
				Err(err) => return Err(err.into()),
			}
		}

		Ok(())
	}

	async fn drop(&self, kind: IndexKind, delete_documents: bool) -> Result<()> {
		let collection = self.collection(kind);

		if delete_documents {
			return match self.qdrant.client.delete_collection(collection.to_string()).await {
				Ok(_) => Ok(()),
				Err(err) if is_not_found_error(&err) => Ok(()),
				Err(err) => Err(err.into()),
			};
		}

		// Without document deletion only the payload indexes go; the points stay searchable by scan.
		for (field_name, _) in payload_fields(kind) {
			let request = DeleteFieldIndexCollectionBuilder::new(collection, field_name).wait(true);

			match self.qdrant.client.delete_field_index(request).await {
				Ok(_) => {},
				Err(err) if is_not_found_error(&err) => {},
				Err(err) => return Err(err.into()),
			}
		}

		Ok(())
	}

	async fn info(&self, kind: IndexKind) -> Result<IndexInfo> {
		let collection = self.collection(kind);

		if !self.qdrant.client.collection_exists(collection.to_string()).await? {
			return Ok(IndexInfo::missing(kind, collection));
		}

		let Some(info) = self.qdrant.client.collection_info(collection).await?.result else {
			return Ok(IndexInfo::missing(kind, collection));
		};

		Ok(IndexInfo {
			kind,
			name: collection.to_string(),
			exists: true,
			document_count: info.points_count.unwrap_or(0),
			record_count: info.indexed_vectors_count.unwrap_or(0),
			term_count: info.payload_schema.len() as u64,
			indexing: info.status != CollectionStatus::Green as i32,
		})
	}
}
impl IndexLifecycle for QdrantLifecycle {
	fn backend_name(&self) -> &'static str {
		"qdrant"
	}

	fn index_exists(&self, kind: IndexKind) -> BoxFuture<'_, Result<bool>> {
		Box::pin(async move { Ok(self.qdrant.client.collection_exists(self.collection(kind).to_string()).await?) })
	}

	fn create_index(&self, kind: IndexKind) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.create(kind))
	}

	fn drop_index(&self, kind: IndexKind, delete_documents: bool) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.drop(kind, delete_documents))
	}

	fn index_info(&self, kind: IndexKind) -> BoxFuture<'_, Result<IndexInfo>> {
		Box::pin(self.info(kind))
	}

	fn backend_info(&self) -> BoxFuture<'_, Result<String>> {
		Box::pin(async move {
			let reply = self.qdrant.client.health_check().await?;

			Ok(format!("{} {}", reply.title, reply.version))
		})
	}
}

/// Text fields index every word prefix, lowercased, so `matches_text` behaves as a prefix match.
fn index_params(field_type: FieldType) -> Option<PayloadIndexParams> {
	if field_type != FieldType::Text {
		return None;
	}

	let params = TextIndexParams {
		tokenizer: TokenizerType::Prefix as i32,
		lowercase: Some(true),
		min_token_len: Some(1),
		max_token_len: Some(MAX_PREFIX_WORD_LEN as u64),
		..Default::default()
	};

	Some(PayloadIndexParams { index_params: Some(IndexParams::TextIndexParams(params)) })
}

/// Payload fields that receive an index, including one float field per currency.
pub fn payload_fields(kind: IndexKind) -> Vec<(String, FieldType)> {
	match kind {
		IndexKind::Units => UNIT_FIELDS
			.iter()
			.map(|(name, field_type)| (name.to_string(), *field_type))
			.chain(
				Currency::ALL
					.into_iter()
					.map(|currency| (qdrant_payload::price_field(currency), FieldType::Float)),
			)
			.collect(),
		IndexKind::Schedule =>
			SCHEDULE_FIELDS.iter().map(|(name, field_type)| (name.to_string(), *field_type)).collect(),
	}
}
