//! Emotion scoring and summarization of stored comments.

use std::collections::HashSet;

use anyhow::Context;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{self, CommentAnalysis, CommentsSummary, Database, EmotionUpdate, Episode};
use crate::llm::{CommentAnalyzer, EmotionScore, LlmError, SourceComment};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("episode {0} not found")]
    EpisodeNotFound(i64),
    #[error("episode {0} has no comments to summarize")]
    NoComments(i64),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Outcome of an emotion analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct EmotionRun {
    /// Comments sent to the analyzer.
    pub requested: usize,
    /// Comments updated with a result.
    pub processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub inference: Vec<EmotionScore>,
}

async fn require_episode(db: &Database, episode_id: i64) -> Result<Episode, AnalysisError> {
    db::get_episode(db.pool(), episode_id)
        .await?
        .ok_or(AnalysisError::EpisodeNotFound(episode_id))
}

/// Score every comment of the episode that has not been analyzed yet.
///
/// Results naming comments that were not sent are ignored.
///
/// # Errors
///
/// Fails if the episode is unknown, the analyzer fails, or storage fails.
pub async fn analyze_emotions(
    db: &Database,
    analyzer: &dyn CommentAnalyzer,
    episode_id: i64,
) -> Result<EmotionRun, AnalysisError> {
    require_episode(db, episode_id).await?;

    let pending = db::get_unprocessed_comments(db.pool(), episode_id).await?;
    if pending.is_empty() {
        return Ok(EmotionRun {
            requested: 0,
            processed: 0,
            message: Some("No comments left to analyze".to_string()),
            inference: Vec::new(),
        });
    }

    let sources: Vec<SourceComment> = pending
        .into_iter()
        .map(|comment| SourceComment {
            id: comment.id,
            content: comment.content,
        })
        .collect();
    let sent: HashSet<i64> = sources.iter().map(|source| source.id).collect();

    let inference = analyzer.score_emotions(&sources).await?;

    let mut updates = Vec::with_capacity(inference.len());
    for score in &inference {
        if !sent.contains(&score.id) {
            warn!(episode_id, comment_id = score.id, "Analyzer returned an unknown comment id");
            continue;
        }
        updates.push(EmotionUpdate {
            comment_id: score.id,
            score: score.score,
            reason: score.reason.clone(),
            is_spam: score.is_spam,
        });
    }

    let applied = db::apply_emotion_results(db.pool(), episode_id, &updates).await?;
    info!(
        episode_id,
        requested = sources.len(),
        processed = applied.len(),
        "Emotion analysis complete"
    );

    Ok(EmotionRun {
        requested: sources.len(),
        processed: applied.len(),
        message: None,
        inference,
    })
}

/// Stored emotion results of an episode.
///
/// # Errors
///
/// Fails if the episode is unknown or storage fails.
pub async fn emotion_results(
    db: &Database,
    episode_id: i64,
) -> Result<Vec<CommentAnalysis>, AnalysisError> {
    require_episode(db, episode_id).await?;
    Ok(db::list_analysis_results(db.pool(), episode_id).await?)
}

/// Summarize an episode's comments, newest first, and store the summary.
///
/// # Errors
///
/// Fails if the episode is unknown or has no comments, the analyzer fails,
/// or storage fails.
pub async fn summarize_episode(
    db: &Database,
    analyzer: &dyn CommentAnalyzer,
    episode_id: i64,
) -> Result<CommentsSummary, AnalysisError> {
    require_episode(db, episode_id).await?;

    let sources = db::get_summary_sources(db.pool(), episode_id).await?;
    if sources.is_empty() {
        return Err(AnalysisError::NoComments(episode_id));
    }

    let content = sources
        .iter()
        .map(|source| source.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let summary = analyzer.summarize(&content).await?;

    let source_json =
        serde_json::to_string(&sources).context("Failed to encode summary sources")?;
    let stored = db::insert_summary(db.pool(), episode_id, &source_json, &summary).await?;

    info!(
        episode_id,
        summary_id = stored.id,
        comments = sources.len(),
        "Summary stored"
    );
    Ok(stored)
}

/// Stored summaries of an episode.
///
/// # Errors
///
/// Fails if the episode is unknown or storage fails.
pub async fn summaries(db: &Database, episode_id: i64) -> Result<Vec<CommentsSummary>, AnalysisError> {
    require_episode(db, episode_id).await?;
    Ok(db::list_summaries(db.pool(), episode_id).await?)
}
