//! Bounded in-memory call log.

use std::collections::BTreeMap;

use serde_json::Value;

use preauth_contracts::tool::CallLogEntry;

/// Appends call records and evicts the oldest in bulk.
///
/// Once the log holds more than `cap` entries it is cut back to the most
/// recent `cap / 2`, so it never exceeds `cap` after an append returns.
#[derive(Debug)]
pub struct CallLog {
    entries: Vec<CallLogEntry>,
    cap: usize,
}

impl CallLog {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, entry: CallLogEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.cap {
            let keep = self.cap / 2;
            let evict = self.entries.len() - keep;
            self.entries.drain(..evict);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<CallLogEntry> {
        let start = self.entries.len().saturating_sub(limit);
        self.entries[start..].to_vec()
    }

    pub fn successes(&self) -> usize {
        self.entries.iter().filter(|e| e.success).count()
    }

    pub fn counts_by_tool(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.tool_name.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Copy of `params` with long top-level strings cut to `max_chars`.
///
/// Nested values are kept as they are.
pub fn sanitize_params(params: &Value, max_chars: usize) -> Value {
    let Value::Object(map) = params else {
        return params.clone();
    };
    let sanitized = map
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) if s.chars().count() > max_chars => {
                    let head: String = s.chars().take(max_chars).collect();
                    Value::String(format!("{head}...[truncated]"))
                }
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn entry(tool: &str, success: bool) -> CallLogEntry {
        CallLogEntry {
            call_id: Uuid::new_v4(),
            tool_name: tool.to_string(),
            params: Value::Null,
            duration_ms: 1,
            success,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn log_is_cut_to_half_when_over_cap() {
        let mut log = CallLog::new(10);
        for i in 0..10 {
            log.push(entry(&format!("t{i}"), true));
        }
        assert_eq!(log.len(), 10);

        log.push(entry("t10", true));
        assert_eq!(log.len(), 5);
        let names: Vec<_> = log.recent(5).into_iter().map(|e| e.tool_name).collect();
        assert_eq!(names, vec!["t6", "t7", "t8", "t9", "t10"]);
    }

    #[test]
    fn never_exceeds_cap_over_many_pushes() {
        let mut log = CallLog::new(1000);
        for _ in 0..1001 {
            log.push(entry("a", true));
        }
        assert_eq!(log.len(), 500);
        for _ in 0..5000 {
            log.push(entry("a", true));
            assert!(log.len() <= 1000);
        }
    }

    #[test]
    fn recent_returns_tail_oldest_first() {
        let mut log = CallLog::new(100);
        log.push(entry("a", true));
        log.push(entry("b", false));
        log.push(entry("c", true));
        let names: Vec<_> = log.recent(2).into_iter().map(|e| e.tool_name).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(log.recent(50).len(), 3);
        assert_eq!(log.successes(), 2);
    }

    #[test]
    fn long_strings_are_truncated() {
        let long = "x".repeat(250);
        let params = json!({ "doc": long, "short": "ok", "n": 5 });
        let clean = sanitize_params(&params, 200);
        let doc = clean["doc"].as_str().unwrap();
        assert_eq!(doc.len(), 200 + "...[truncated]".len());
        assert!(doc.ends_with("...[truncated]"));
        assert_eq!(clean["short"], "ok");
        assert_eq!(clean["n"], 5);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let params = json!({ "note": "é".repeat(201) });
        let clean = sanitize_params(&params, 200);
        let note = clean["note"].as_str().unwrap();
        assert_eq!(note.chars().filter(|c| *c == 'é').count(), 200);
    }

    #[test]
    fn string_at_limit_is_kept() {
        let params = json!({ "doc": "y".repeat(200) });
        assert_eq!(sanitize_params(&params, 200), params);
    }
}
