//! Push log reconciliation
//!
//! Pairs `accepted-push` entries with `succeeded-push` entries by `seq_id`.
//! Whatever was accepted and never succeeded is a candidate for resubmission.

use pn_common::{ExtendEntry, NotificationContent, NotificationRequest, Platform, PushBatch, PushStatus};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;
use tracing::warn;

/// The push log fields needed to rebuild a notification. Loosely typed: other
/// events share the log and may use the same field names differently.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub status: Option<serde_json::Value>,
    pub seq_id: Option<u64>,
    pub platform: Option<serde_json::Value>,
    pub token: String,
    pub message: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub identifier: String,
    pub badge: Option<i64>,
    pub sound: String,
    pub category: String,
    pub content_available: bool,
    pub mutable_content: bool,
    pub expiry: i64,
    pub collapse_key: String,
    pub delay_while_idle: bool,
    pub time_to_live: u32,
    pub push_type: Option<String>,
    /// JSON array string, as written by the relay
    pub extend: String,
}

impl LogEntry {
    pub fn push_status(&self) -> Option<PushStatus> {
        let status = self.status.as_ref()?.as_str()?;
        [PushStatus::Accepted, PushStatus::Succeeded, PushStatus::Failed, PushStatus::Disabled]
            .into_iter()
            .find(|s| s.as_str() == status)
    }

    pub fn platform(&self) -> Option<Platform> {
        let name = self.platform.as_ref()?.as_str()?;
        Platform::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// The notification content this entry was accepted with.
    pub fn content(&self, platform: Platform) -> NotificationContent {
        let extend = if self.extend.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<Vec<ExtendEntry>>(&self.extend).unwrap_or_else(|e| {
                warn!(seq_id = ?self.seq_id, error = %e, "Unreadable extend field; resubmitting without it");
                Vec::new()
            })
        };

        NotificationContent {
            platform: platform.code(),
            message: self.message.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            body: self.body.clone(),
            badge: self.badge,
            category: self.category.clone(),
            sound: self.sound.clone(),
            content_available: self.content_available,
            mutable_content: self.mutable_content,
            expiry: self.expiry,
            collapse_key: self.collapse_key.clone(),
            delay_while_idle: self.delay_while_idle,
            time_to_live: self.time_to_live,
            identifier: self.identifier.clone(),
            extend,
            push_type: self.push_type.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Accepted and never delivered, ordered by sequence id
    pub undelivered: Vec<LogEntry>,
    pub accepted: usize,
    pub succeeded: usize,
    pub skipped_lines: usize,
}

/// Scan a JSON-lines push log. Lines that are not JSON, or JSON without a
/// push status, are skipped; the former with a warning.
pub fn reconcile<R: BufRead>(reader: R) -> std::io::Result<Reconciliation> {
    let mut accepted: BTreeMap<u64, LogEntry> = BTreeMap::new();
    let mut succeeded: HashSet<u64> = HashSet::new();
    let mut skipped_lines = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let entry: LogEntry = match serde_json::from_str(&line) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed log line");
                skipped_lines += 1;
                continue;
            }
        };

        match (entry.push_status(), entry.seq_id) {
            (Some(PushStatus::Accepted), Some(seq_id)) => {
                accepted.insert(seq_id, entry);
            }
            (Some(PushStatus::Succeeded), Some(seq_id)) => {
                succeeded.insert(seq_id);
            }
            _ => {}
        }
    }

    let accepted_count = accepted.len();
    let succeeded_count = succeeded.len();
    let undelivered = accepted
        .into_iter()
        .filter(|(seq_id, _)| !succeeded.contains(seq_id))
        .map(|(_, entry)| entry)
        .collect();

    Ok(Reconciliation {
        undelivered,
        accepted: accepted_count,
        succeeded: succeeded_count,
        skipped_lines,
    })
}

/// Group undelivered entries into resubmittable batches of at most
/// `batch_max` notifications. Tokens sharing identical content become one
/// notification, in order of first appearance.
pub fn build_batches(undelivered: &[LogEntry], batch_max: usize) -> Vec<PushBatch> {
    let mut grouped: Vec<NotificationRequest> = Vec::new();

    for entry in undelivered {
        let Some(platform) = entry.platform() else {
            warn!(seq_id = ?entry.seq_id, "Accepted entry has no platform; cannot resubmit");
            continue;
        };
        let content = entry.content(platform);
        match grouped.iter_mut().find(|request| request.content == content) {
            Some(request) => request.tokens.push(entry.token.clone()),
            None => grouped.push(NotificationRequest {
                tokens: vec![entry.token.clone()],
                content,
            }),
        }
    }

    grouped
        .chunks(batch_max.max(1))
        .map(|chunk| PushBatch {
            notifications: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LOG: &str = r#"{"timestamp":"2026-01-01T00:00:00Z","level":"INFO","status":"accepted-push","seq_id":1,"platform":"ios","token":"aaa","message":"hello","ptime":0.0}
{"status":"accepted-push","seq_id":2,"platform":"ios","token":"bbb","message":"hello"}
{"status":"accepted-push","seq_id":3,"platform":"android","token":"ccc","message":"yo"}
{"status":"failed-push","seq_id":2,"platform":"ios","token":"bbb","message":"hello","error":"timeout"}
{"status":"succeeded-push","seq_id":1,"platform":"ios","token":"aaa","message":"hello"}
not json at all
{"level":"INFO","message":"HTTP server listening"}
{"status":"invalid-request","platform":9,"token":"","error":"invalid platform"}
"#;

    #[test]
    fn test_finds_accepted_without_success() {
        let result = reconcile(Cursor::new(LOG)).unwrap();

        assert_eq!(result.accepted, 3);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.skipped_lines, 1);
        let ids: Vec<u64> = result.undelivered.iter().filter_map(|e| e.seq_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_batches_group_by_platform_and_content() {
        let result = reconcile(Cursor::new(LOG)).unwrap();
        let batches = build_batches(&result.undelivered, 100);

        assert_eq!(batches.len(), 1);
        let notifications = &batches[0].notifications;
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].content.platform, 1);
        assert_eq!(notifications[0].tokens, vec!["bbb"]);
        assert_eq!(notifications[1].content.platform, 2);
        assert_eq!(notifications[1].content.message, "yo");
    }

    #[test]
    fn test_batches_respect_limit() {
        let undelivered: Vec<LogEntry> = (0..5)
            .map(|i| LogEntry {
                status: Some("accepted-push".into()),
                seq_id: Some(i),
                platform: Some("android".into()),
                token: format!("t{}", i),
                message: format!("m{}", i),
                ..Default::default()
            })
            .collect();

        let batches = build_batches(&undelivered, 2);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].notifications.len(), 1);
    }

    #[test]
    fn test_resubmission_keeps_full_content() {
        let log = r#"{"status":"accepted-push","seq_id":7,"platform":"ios","token":"dev","message":"sale","badge":5,"sound":"chime","expiry":3600,"push_type":"alert","extend":"[{\"key\":\"url\",\"val\":\"https://example.com\"}]"}
{"status":"accepted-push","seq_id":8,"platform":"android","token":"droid","message":"sale","collapse_key":"promo","delay_while_idle":true,"time_to_live":120,"extend":"[]"}
"#;
        let result = reconcile(Cursor::new(log)).unwrap();
        let batches = build_batches(&result.undelivered, 100);

        let notifications = &batches[0].notifications;
        assert_eq!(notifications.len(), 2);

        let ios = &notifications[0].content;
        assert_eq!(ios.badge, Some(5));
        assert_eq!(ios.sound, "chime");
        assert_eq!(ios.expiry, 3600);
        assert_eq!(ios.push_type.as_deref(), Some("alert"));
        assert_eq!(ios.extend[0].key, "url");
        assert_eq!(ios.extend[0].value, "https://example.com");

        let android = &notifications[1].content;
        assert_eq!(android.collapse_key, "promo");
        assert!(android.delay_while_idle);
        assert_eq!(android.time_to_live, 120);
        assert!(android.extend.is_empty());
    }

    #[test]
    fn test_different_badges_stay_separate() {
        let entry = |seq_id: u64, badge: i64| LogEntry {
            status: Some("accepted-push".into()),
            seq_id: Some(seq_id),
            platform: Some("ios".into()),
            token: format!("t{}", seq_id),
            message: "same".to_string(),
            badge: Some(badge),
            ..Default::default()
        };

        let batches = build_batches(&[entry(1, 1), entry(2, 2)], 100);

        assert_eq!(batches[0].notifications.len(), 2);
    }

    #[test]
    fn test_shared_content_merges_tokens() {
        let entry = |seq_id: u64, token: &str| LogEntry {
            status: Some("accepted-push".into()),
            seq_id: Some(seq_id),
            platform: Some("ios".into()),
            token: token.to_string(),
            message: "same".to_string(),
            ..Default::default()
        };

        let batches = build_batches(&[entry(1, "x"), entry(2, "y")], 100);

        assert_eq!(batches[0].notifications.len(), 1);
        assert_eq!(batches[0].notifications[0].tokens, vec!["x", "y"]);
    }
}
