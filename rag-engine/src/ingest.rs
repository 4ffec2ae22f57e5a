//! Index write path: batched document ingestion and source deletion.

use tracing::{debug, info, warn};

use crate::chunk::{Chunk, MetadataFilter};
use crate::embed::CachedEmbedder;
use crate::errors::RetrievalError;
use crate::index::{IndexedPoint, PointSelector, VectorIndex};

/// Embeds chunks that lack vectors, then upserts everything in
/// `upsert_batch`-sized batches keyed by `chunk_id`.
///
/// Embedding runs before any index write: a provider failure aborts the
/// whole call with no partial writes and no placeholder vectors.
///
/// # Errors
/// Returns [`RetrievalError::Embedding`] or [`RetrievalError::Index`].
pub async fn add_documents(
    index: &dyn VectorIndex,
    embedder: &CachedEmbedder,
    upsert_batch: usize,
    mut chunks: Vec<Chunk>,
) -> Result<usize, RetrievalError> {
    if chunks.is_empty() {
        debug!("ingest::add_documents: nothing to add");
        return Ok(0);
    }

    // Embed only the chunks without precomputed vectors.
    let mut texts_to_embed: Vec<String> = Vec::new();
    let mut indices_to_embed: Vec<usize> = Vec::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        if chunk.embedding.is_none() {
            texts_to_embed.push(chunk.content.clone());
            indices_to_embed.push(idx);
        }
    }

    if !texts_to_embed.is_empty() {
        info!(
            "ingest::add_documents: embedding {} of {} chunks",
            texts_to_embed.len(),
            chunks.len()
        );
        let vectors = embedder.embed_batch(&texts_to_embed).await?;
        for (vec_idx, chunk_idx) in indices_to_embed.into_iter().enumerate() {
            chunks[chunk_idx].embedding = Some(vectors[vec_idx].clone());
        }
    }

    // Upsert in fixed-size batches to respect index API limits.
    let batch_size = upsert_batch.max(1);
    let total = chunks.len();
    for batch in chunks.chunks(batch_size) {
        let points: Vec<IndexedPoint> = batch
            .iter()
            .map(|chunk| IndexedPoint {
                id: chunk.chunk_id.clone(),
                vector: chunk
                    .embedding
                    .clone()
                    .expect("embedding resolved above"),
                document: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
            })
            .collect();
        index.upsert(points).await?;
    }

    info!("ingest::add_documents: upserted {total} chunks");
    Ok(total)
}

/// Removes all chunks whose metadata `source` equals `source_id`.
///
/// Works without a native metadata-filtered delete: fetches matching
/// ids first, then deletes them. With an index that cannot push the
/// filter down this costs a full scan (O(index size)).
///
/// # Errors
/// Returns [`RetrievalError::Index`] on store failures.
pub async fn delete_by_source(
    index: &dyn VectorIndex,
    source_id: &str,
) -> Result<usize, RetrievalError> {
    let filter = MetadataFilter::source(source_id);
    let stored = index.get(PointSelector::Filter(filter)).await?;

    if stored.is_empty() {
        warn!("ingest::delete_by_source: no chunks for source '{source_id}'");
        return Ok(0);
    }

    let ids: Vec<String> = stored.into_iter().map(|p| p.id).collect();
    let removed = ids.len();
    index.delete(ids).await?;

    info!("ingest::delete_by_source: removed {removed} chunks for '{source_id}'");
    Ok(removed)
}
