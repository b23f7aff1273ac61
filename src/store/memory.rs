//! In-process store backed by fixed record lists.
//!
//! Used for offline runs (`[store] default = "memory"` with a JSON fixture)
//! and by tests. Reads are counted so callers can assert that validation
//! failures never reach the store.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;

use crate::store::{
    ColumnConfig, ExampleQuery, KnowledgeTip, ReferenceExample, StoreError, TipQuery, WritingStyle,
};

/// Fixture file shape.
#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    styles: Vec<WritingStyle>,
    #[serde(default)]
    examples: Vec<ReferenceExample>,
    #[serde(default)]
    tips: Vec<KnowledgeTip>,
    #[serde(default)]
    column_configs: Vec<ColumnConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    styles: Arc<Vec<WritingStyle>>,
    examples: Arc<Vec<ReferenceExample>>,
    tips: Arc<Vec<KnowledgeTip>>,
    column_configs: Arc<Vec<ColumnConfig>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new(styles: Vec<WritingStyle>, examples: Vec<ReferenceExample>, tips: Vec<KnowledgeTip>) -> Self {
        Self {
            styles: Arc::new(styles),
            examples: Arc::new(examples),
            tips: Arc::new(tips),
            column_configs: Arc::default(),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_column_configs(mut self, configs: Vec<ColumnConfig>) -> Self {
        self.column_configs = Arc::new(configs);
        self
    }

    /// Load `{ "styles": [...], "examples": [...], "tips": [...],
    /// "column_configs": [...] }`. Every list is optional.
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::NotConfigured(format!("cannot read fixture {}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let fixture: Fixture =
            serde_json::from_str(raw).map_err(|e| StoreError::Decode(format!("fixture: {e}")))?;
        Ok(Self::new(fixture.styles, fixture.examples, fixture.tips).with_column_configs(fixture.column_configs))
    }

    /// Total reads served, shared across clones.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn style_by_slug(&self, slug: &str) -> Result<Option<WritingStyle>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.styles.iter().find(|s| s.slug == slug).cloned())
    }

    pub fn examples(&self, query: &ExampleQuery) -> Result<Vec<ReferenceExample>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .examples
            .iter()
            .filter(|e| e.content_type == query.content_type)
            .filter(|e| query.style_id.is_none() || e.style_id == query.style_id)
            .take(query.limit)
            .cloned()
            .collect())
    }

    pub fn tips(&self, query: &TipQuery) -> Result<Vec<KnowledgeTip>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tips
            .iter()
            .filter(|t| t.category == query.category)
            .filter(|t| query.style_id.is_none() || t.style_id == query.style_id)
            .take(query.limit)
            .cloned()
            .collect())
    }

    pub fn column_config(&self, method_id: &str, template_id: &str) -> Result<Option<ColumnConfig>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .column_configs
            .iter()
            .find(|c| c.method_id == method_id && c.template_id == template_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "styles": [{"id": 1, "slug": "pana_emotion", "name": "PANA", "system_prompt": "あなたはライターです。"}],
        "examples": [
            {"title": "a", "body": "A", "content_type": "diary_logic", "style_id": 1},
            {"title": "b", "body": "B", "content_type": "diary_logic", "style_id": 2},
            {"title": "c", "body": "C", "content_type": "board_temp"}
        ],
        "tips": [
            {"content": "t1", "category": "board_writing_tip", "style_id": 1},
            {"content": "t2", "category": "board_writing_tip"},
            {"content": "t3", "category": "other"}
        ],
        "column_configs": [{"method_id": "emotion", "template_id": "secret", "system_prompt": "独自指示"}]
    }"#;

    #[test]
    fn style_lookup_by_slug() {
        let store = MemoryStore::from_json(FIXTURE).unwrap();
        assert_eq!(store.style_by_slug("pana_emotion").unwrap().unwrap().id, "1");
        assert!(store.style_by_slug("missing").unwrap().is_none());
        assert_eq!(store.reads(), 2);
    }

    #[test]
    fn examples_filter_by_type_and_style() {
        let store = MemoryStore::from_json(FIXTURE).unwrap();
        let q = ExampleQuery { content_type: "diary_logic".into(), style_id: Some("1".into()), limit: 10 };
        let rows = store.examples(&q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "a");

        let q = ExampleQuery { content_type: "diary_logic".into(), style_id: None, limit: 1 };
        assert_eq!(store.examples(&q).unwrap().len(), 1);
    }

    #[test]
    fn tips_filter_by_category_and_style() {
        let store = MemoryStore::from_json(FIXTURE).unwrap();
        let any = TipQuery { category: "board_writing_tip".into(), style_id: None, limit: 10 };
        assert_eq!(store.tips(&any).unwrap().len(), 2);
        let own = TipQuery { category: "board_writing_tip".into(), style_id: Some("1".into()), limit: 10 };
        let rows = store.tips(&own).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "t1");
    }

    #[test]
    fn column_config_by_method_and_template() {
        let store = MemoryStore::from_json(FIXTURE).unwrap();
        let found = store.column_config("emotion", "secret").unwrap().unwrap();
        assert_eq!(found.system_prompt, "独自指示");
        assert!(store.column_config("emotion", "impact").unwrap().is_none());
    }

    #[test]
    fn malformed_fixture_errors() {
        assert!(matches!(MemoryStore::from_json("{not json"), Err(StoreError::Decode(_))));
    }

    #[test]
    fn missing_fixture_file_errors() {
        let err = MemoryStore::from_json_file(Path::new("/nonexistent/fixture.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read fixture"));
    }
}
