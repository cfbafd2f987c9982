//! The immutable input bundle of one analysis run

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::transport::models::ContentBlock;

/// A note as handed over by the note store, with category and curve resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub category_name: String,
    pub curve_name: String,
    #[serde(default)]
    pub curve_intervals: Vec<u32>,
    #[serde(default)]
    pub stage: u32,
    /// Unix epoch milliseconds
    pub next_review_date: i64,
    /// Unix epoch milliseconds
    pub created_at: i64,
}

/// Scheduling metadata carried into the summary stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub category_name: String,
    pub curve_name: String,
    pub curve_intervals: Vec<u32>,
    /// Number of reviews already done; 0 means the note was added today
    pub stage: u32,
    /// Unix epoch milliseconds
    pub next_review_date: i64,
    /// Unix epoch milliseconds
    pub created_at: i64,
}

impl NoteMetadata {
    pub fn next_review_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.next_review_date)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }

    /// Whether the next review date has already passed at `now`
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at().map(|due| due < now).unwrap_or(false)
    }

    /// Intervals rendered as `1, 2, 4, 7`
    pub fn intervals_label(&self) -> String {
        self.curve_intervals
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Read-only input of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisContext {
    pub title: String,
    pub body: String,
    /// Image URLs or `data:` URIs, in note order
    pub images: Vec<String>,
    pub metadata: NoteMetadata,
}

impl AnalysisContext {
    pub fn from_note(note: &NoteRecord) -> Self {
        Self {
            title: note.title.clone(),
            body: note.content.clone(),
            images: note.images.clone(),
            metadata: NoteMetadata {
                category_name: note.category_name.clone(),
                curve_name: note.curve_name.clone(),
                curve_intervals: note.curve_intervals.clone(),
                stage: note.stage,
                next_review_date: note.next_review_date,
                created_at: note.created_at,
            },
        }
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    /// The user message shared by every content-reading agent
    ///
    /// One text block with title and body, then one image block per image.
    pub fn user_content(&self) -> Vec<ContentBlock> {
        let body = if self.body.trim().is_empty() {
            "（无文字内容）"
        } else {
            self.body.as_str()
        };

        let mut blocks = Vec::with_capacity(1 + self.images.len());
        blocks.push(ContentBlock::text(format!(
            "笔记标题：{}\n笔记内容：{}",
            self.title, body
        )));
        blocks.extend(self.images.iter().map(ContentBlock::image));
        blocks
    }
}

/// The block appended to the intent agent's input after a failed review
pub fn feedback_block(feedback: &str) -> ContentBlock {
    ContentBlock::text(format!(
        "\n\n【上一次分析的问题】：{}\n请根据以上反馈重新分析。",
        feedback
    ))
}

/// Epoch milliseconds as a local `2024/3/5` date, or `未知` when out of range
pub fn format_local_date(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(date) => date.format("%Y/%-m/%-d").to_string(),
        None => "未知".to_string(),
    }
}
