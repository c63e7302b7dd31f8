
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::embeddings::TextEmbedder;
use crate::store::{ChunkMatch, ChunkRecord, VectorStore};
use crate::{CorpusError, Result};

/// Vector database backend using LanceDB for similarity search.
///
/// Text is embedded through the injected [`TextEmbedder`] on both the write
/// and the query path, so callers never handle raw vectors.
pub struct LanceStore {
    connection: Connection,
    table_name: String,
    embedder: Arc<dyn TextEmbedder>,
    vector_dimension: Mutex<usize>,
}

impl LanceStore {
    /// Open (or create) the collection under `db_path`.
    #[inline]
    pub async fn new(
        db_path: &Path,
        collection_name: &str,
        embedding_dimension: usize,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CorpusError::Store(format!("Failed to create vector database directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: collection_name.to_string(),
            embedder,
            vector_dimension: Mutex::new(embedding_dimension),
        };

        store.initialize_table().await?;

        info!("Vector store initialized: collection '{}'", collection_name);
        Ok(store)
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            if let Ok(dim) = self.detect_existing_vector_dimension().await {
                debug!("Detected existing vector dimension: {}", dim);
                *self.vector_dimension.lock().expect("dimension mutex poisoned") = dim;
            }
            return Ok(());
        }

        let dim = self.dimension();
        self.connection
            .create_empty_table(&self.table_name, create_schema(dim))
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to create table: {}", e)))?;

        debug!(
            "Collection '{}' created with {} dimensions",
            self.table_name, dim
        );
        Ok(())
    }

    /// Read the vector column width from an existing table's schema.
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to open existing table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(CorpusError::Store(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        *self
            .vector_dimension
            .lock()
            .expect("dimension mutex poisoned")
    }

    async fn recreate_table_with_dimension(&self, vector_dim: usize) -> Result<()> {
        warn!(
            "Vector dimension changed from {} to {}, recreating collection '{}'",
            self.dimension(),
            vector_dim,
            self.table_name
        );

        self.drop_table_if_exists().await?;
        self.connection
            .create_empty_table(&self.table_name, create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| {
                CorpusError::Store(format!("Failed to create table with new dimensions: {}", e))
            })?;

        *self
            .vector_dimension
            .lock()
            .expect("dimension mutex poisoned") = vector_dim;
        Ok(())
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to list tables for drop: {}", e)))?;

        if table_names.contains(&self.table_name) {
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| CorpusError::Store(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    fn create_record_batch(
        &self,
        records: &[ChunkRecord],
        vectors: &[Vec<f32>],
        vector_dim: usize,
    ) -> Result<RecordBatch> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        let created_at = chrono::Utc::now().to_rfc3339();
        for record in records {
            ids.push(record.id.as_str());
            sources.push(record.source.as_str());
            chunk_indices.push(record.chunk_index);
            contents.push(record.content.as_str());
            created_ats.push(created_at.clone());
        }

        let mut flat_values = Vec::with_capacity(len * vector_dim);
        for vector in vectors {
            flat_values.extend_from_slice(vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| CorpusError::Store(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(create_schema(vector_dim), arrays)
            .map_err(|e| CorpusError::Store(format!("Failed to create record batch: {}", e)))
    }

    fn parse_match_batch(batch: &RecordBatch) -> Result<Vec<ChunkMatch>> {
        let num_rows = batch.num_rows();

        let sources = string_column(batch, "source")?;
        let contents = string_column(batch, "content")?;
        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut matches = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            matches.push(ChunkMatch {
                source: sources.value(row).to_string(),
                content: contents.value(row).to_string(),
                distance,
            });
        }

        Ok(matches)
    }
}

fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| CorpusError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| CorpusError::Store(format!("Invalid {} column type", name)))
}

#[async_trait]
impl VectorStore for LanceStore {
    #[inline]
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No records to upsert");
            return Ok(());
        }

        let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;

        let vector_dim = vectors
            .first()
            .map(Vec::len)
            .ok_or_else(|| CorpusError::Store("Embedder returned no vectors".to_string()))?;
        if self.dimension() != vector_dim {
            self.recreate_table_with_dimension(vector_dim).await?;
        }

        let record_batch = self.create_record_batch(&records, &vectors, vector_dim)?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to open table: {}", e)))?;

        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema));

        // Replace-if-present keyed on id, as a single write
        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(reader)
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to upsert records: {}", e)))?;

        info!("Upserted {} chunks into '{}'", records.len(), self.table_name);
        Ok(())
    }

    #[inline]
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ChunkMatch>> {
        let query_vector = self.embedder.embed(text)?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to open table: {}", e)))?;

        let results = table
            .vector_search(query_vector.as_slice())
            .map_err(|e| CorpusError::Store(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to read result stream: {}", e)))?;

        let mut matches = Vec::new();
        for batch in &batches {
            matches.extend(Self::parse_match_batch(batch)?);
        }

        debug!("Found {} matches for query", matches.len());
        Ok(matches)
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    #[inline]
    async fn sample_sources(&self, limit: usize) -> Result<Vec<String>> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to open table: {}", e)))?;

        let results = table
            .query()
            .limit(limit)
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to scan table: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to read scan stream: {}", e)))?;

        let mut sources = Vec::new();
        for batch in &batches {
            let column = string_column(batch, "source")?;
            for row in 0..batch.num_rows() {
                sources.push(column.value(row).to_string());
            }
        }

        Ok(sources)
    }

    #[inline]
    async fn reset(&self) -> Result<()> {
        self.drop_table_if_exists().await?;
        let dim = self.dimension();
        self.connection
            .create_empty_table(&self.table_name, create_schema(dim))
            .execute()
            .await
            .map_err(|e| CorpusError::Store(format!("Failed to recreate table: {}", e)))?;

        info!("Collection '{}' cleared", self.table_name);
        Ok(())
    }

    #[inline]
    fn collection_name(&self) -> &str {
        &self.table_name
    }
}
