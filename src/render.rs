//! # Render
//! Turns a [`Snapshot`] into the index page.
//!
//! Only the first few upcoming events per group are shown. Groups with fewer
//! events show what they have; an empty group shows a "No Events" line.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use html_escape::encode_text;
use serde::Serialize;

use crate::ingest::types::Event;
use crate::store::Snapshot;

/// Events shown per group on the index page.
pub const DEFAULT_UPCOMING_LIMIT: usize = 3;

pub const PAGE_TITLE: &str = "Mile High Gopher Events";

/// Display row for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventView {
    pub id: String,
    pub name: String,
    pub when: String,
}

/// Display block for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub source: String,
    pub events: Vec<EventView>,
}

/// Format epoch millis like RFC1123 in UTC, e.g. `Tue, 14 Nov 2023 22:13:20 UTC`.
pub fn human_time(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S UTC").to_string(),
        None => "unknown time".to_string(),
    }
}

impl From<&Event> for EventView {
    fn from(e: &Event) -> Self {
        Self {
            id: e.id.clone(),
            name: e.name.clone(),
            when: human_time(e.time),
        }
    }
}

/// First `min(limit, len)` events of every group present in `snapshot`.
pub fn upcoming(snapshot: &Snapshot, limit: usize) -> Vec<GroupView> {
    snapshot
        .groups()
        .iter()
        .map(|(source, events)| GroupView {
            source: source.clone(),
            events: events.iter().take(limit).map(EventView::from).collect(),
        })
        .collect()
}

/// Full HTML index page.
pub fn render_index(snapshot: &Snapshot) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str("<!DOCTYPE html>\n<html>\n\t<head>\n\t\t<meta charset=\"UTF-8\">\n");
    let _ = writeln!(out, "\t\t<title>{PAGE_TITLE}</title>");
    out.push_str("\t\t<link rel=\"stylesheet\" href=\"/assets/styles.css\">\n\t</head>\n\t<body>\n");
    out.push_str("\t<img src=\"/assets/logo.png\">\n");

    if snapshot.is_empty() {
        out.push_str("\t<div><strong>No events fetched yet</strong></div>\n");
    }

    for group in upcoming(snapshot, DEFAULT_UPCOMING_LIMIT) {
        let _ = writeln!(out, "\t\t<h1>{}</h1>", encode_text(&group.source));
        out.push_str("\t\t<ul>\n");
        if group.events.is_empty() {
            out.push_str("\t\t\t<div><strong>No Events</strong></div>\n");
        }
        for ev in &group.events {
            let _ = writeln!(
                out,
                "\t\t\t<li>{} -- {}</li>",
                encode_text(&ev.when),
                encode_text(&ev.name)
            );
        }
        out.push_str("\t\t</ul>\n");
    }

    out.push_str("\t</body>\n</html>\n");
    out
}
