//! LanceDB Vector Store - 로컬 파일 기반 벡터 저장소
//!
//! 인덱스 하나가 LanceDB 테이블 하나에 대응합니다.
//! 업서트는 `id` 컬럼 기준 merge-insert, 쿼리는 코사인 거리로 수행합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::DistanceType;
use serde_json::{Map, Value};

use super::vector::{StoredHit, VectorDocument, VectorStore};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db })
    }

    /// 테이블 스키마 (id, text, metadata JSON, vector)
    fn create_schema(dimension: i32) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ]))
    }

    /// 문서들을 Arrow RecordBatch로 변환
    fn documents_to_batch(documents: &[VectorDocument]) -> Result<RecordBatch> {
        let first = documents
            .first()
            .ok_or_else(|| anyhow::anyhow!("Cannot create batch from empty documents"))?;
        let dimension = first.vector.len();

        if let Some(bad) = documents.iter().find(|d| d.vector.len() != dimension) {
            anyhow::bail!(
                "Vector dimension mismatch for '{}': expected {}, got {}",
                bad.id,
                dimension,
                bad.vector.len()
            );
        }

        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let metadata: Vec<String> = documents
            .iter()
            .map(|d| serde_json::to_string(&d.metadata))
            .collect::<std::result::Result<_, _>>()
            .context("Failed to serialize metadata")?;

        let flat: Vec<f32> = documents
            .iter()
            .flat_map(|d| d.vector.iter().copied())
            .collect();

        let dimension = dimension as i32;
        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dimension,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create vector array")?;

        RecordBatch::try_new(
            Self::create_schema(dimension),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(vectors),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn table_exists(&self, index: &str) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;
        Ok(names.iter().any(|n| n == index))
    }

    async fn open_table(&self, index: &str) -> Result<lancedb::table::Table> {
        self.db
            .open_table(index)
            .execute()
            .await
            .with_context(|| format!("Failed to open table '{}'", index))
    }
}

/// SQL 문자열 리터럴 (작은따옴표 이스케이프)
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// 지정한 ID들을 고르는 필터
fn id_in_predicate(ids: &[String]) -> String {
    let listed: Vec<String> = ids.iter().map(|id| sql_literal(id)).collect();
    format!("id IN ({})", listed.join(", "))
}

/// 결과 배치에서 문자열 컬럼 추출
fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

/// 메타데이터 JSON 파싱. 깨진 값은 경고 후 빈 맵
fn parse_metadata(id: &str, raw: &str) -> Map<String, Value> {
    match serde_json::from_str(raw) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!("Corrupt metadata for '{}', entities dropped: {}", id, e);
            Map::new()
        }
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn create_index(&self, index: &str, dimension: usize) -> Result<()> {
        if self.table_exists(index).await? {
            return Ok(());
        }

        self.db
            .create_empty_table(index, Self::create_schema(dimension as i32))
            .execute()
            .await
            .with_context(|| format!("Failed to create table '{}'", index))?;

        tracing::info!("Created vector index '{}' (dimension={})", index, dimension);
        Ok(())
    }

    async fn upsert(&self, index: &str, documents: &[VectorDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let batch = Self::documents_to_batch(documents)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists(index).await? {
            let table = self.open_table(index).await?;
            let mut merge = table.merge_insert(&["id"]);
            merge
                .when_matched_update_all(None)
                .when_not_matched_insert_all();
            merge
                .execute(Box::new(batches))
                .await
                .context("Failed to upsert vectors")?;
        } else {
            self.db
                .create_table(index, batches)
                .execute()
                .await
                .with_context(|| format!("Failed to create table '{}'", index))?;
        }

        Ok(documents.len())
    }

    async fn delete_stale(&self, index: &str, id_prefix: &str, keep: &[String]) -> Result<()> {
        if !self.table_exists(index).await? {
            return Ok(());
        }

        let table = self.open_table(index).await?;

        // 접두어는 LIKE가 아닌 정확 비교
        let batches: Vec<RecordBatch> = table
            .query()
            .select(Select::columns(&["id"]))
            .execute()
            .await
            .context("Failed to scan ids")?
            .try_collect()
            .await?;

        let mut stale = Vec::new();
        for batch in &batches {
            let ids = string_column(batch, "id")?;
            for i in 0..batch.num_rows() {
                let id = ids.value(i);
                if id.starts_with(id_prefix) && !keep.iter().any(|k| k == id) {
                    stale.push(id.to_string());
                }
            }
        }

        if stale.is_empty() {
            return Ok(());
        }

        table
            .delete(&id_in_predicate(&stale))
            .await
            .with_context(|| format!("Failed to delete stale rows with prefix '{}'", id_prefix))?;

        tracing::debug!("Deleted {} stale rows with prefix '{}'", stale.len(), id_prefix);
        Ok(())
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<StoredHit>> {
        if !self.table_exists(index).await? {
            return Ok(vec![]);
        }

        let table = self.open_table(index).await?;

        let stream = table
            .vector_search(vector.to_vec())
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;
        let mut hits = Vec::new();

        for batch in batches {
            let ids = string_column(&batch, "id")?;
            let texts = string_column(&batch, "text")?;
            let metadata = string_column(&batch, "metadata")?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                let id = ids.value(i);
                let metadata = parse_metadata(id, metadata.value(i));

                hits.push(StoredHit {
                    id: id.to_string(),
                    // 코사인 거리 -> 코사인 유사도
                    score: 1.0 - distances.value(i),
                    text: texts.value(i).to_string(),
                    metadata,
                });
            }
        }

        Ok(hits)
    }

    async fn count(&self, index: &str) -> Result<usize> {
        if !self.table_exists(index).await? {
            return Ok(0);
        }

        let table = self.open_table(index).await?;
        table.count_rows(None).await.context("Failed to count rows")
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

// ============================================================================
// Tests
// ============================================================================
