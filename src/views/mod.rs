//! Plain-text views printed by the CLI

use std::fmt::Write;

use crate::shared::{ResultRoute, TransientResult};
use crate::storage::{format_timestamp, OcrRecord};
use crate::vision::EngineKind;

/// Characters of recognized text shown per history entry
pub const PREVIEW_CHARS: usize = 100;

/// First `max_chars` characters of `text`
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Result screen for one run. `result` is `None` once the hand-off entry
/// was consumed or expired.
pub fn render_result(route: &ResultRoute, result: Option<&TransientResult>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "OCR Result");
    let _ = writeln!(out, "Engine: {}", route.engine);
    let _ = writeln!(out, "Time taken: {}ms", route.duration_ms);
    let _ = writeln!(out, "Engine size: {}", route.engine_size);

    match result {
        Some(result) => {
            let _ = writeln!(out, "Image: {}", result.image);
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", result.text);
        }
        None => {
            let _ = writeln!(out);
            let _ = writeln!(out, "(recognized text is no longer available)");
        }
    }
    out
}

/// History list, newest first as stored
pub fn render_history(records: &[OcrRecord]) -> String {
    if records.is_empty() {
        return "No recognitions yet\n".to_string();
    }

    let mut out = String::new();
    for record in records {
        let _ = writeln!(out, "#{}", record.id);
        let _ = writeln!(out, "  Engine: {}", record.engine);
        let _ = writeln!(out, "  Size: {}", record.engine_size);
        let _ = writeln!(out, "  Saved: {}", format_timestamp(record.timestamp));
        let _ = writeln!(out, "  Time: {} ms", record.duration_millis);
        let _ = writeln!(
            out,
            "  Text: {}",
            preview(&record.recognized_text, PREVIEW_CHARS)
        );
        let _ = writeln!(out);
    }
    out
}

/// Engine list with size tags and whether each has its model data installed
pub fn render_engines(engines: &[(EngineKind, bool)]) -> String {
    let mut out = String::new();
    for (kind, installed) in engines {
        let _ = writeln!(
            out,
            "{:<10} {:<6} {}",
            kind.display_name(),
            kind.size_tag(),
            if *installed { "ready" } else { "not installed" }
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ImageRef;

    fn record(id: i64, text: &str) -> OcrRecord {
        OcrRecord {
            id,
            engine: "Tesseract".to_string(),
            engine_size: "~22MB".to_string(),
            recognized_text: text.to_string(),
            timestamp: 1_700_000_000_000,
            duration_millis: 812,
        }
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview("héllo wörld", 4), "héll");
        let long = "x".repeat(150);
        assert_eq!(preview(&long, PREVIEW_CHARS).len(), 100);
    }

    #[test]
    fn test_render_result() {
        let route = ResultRoute {
            engine: "PaddleOCR".to_string(),
            duration_ms: 120,
            engine_size: "~10MB".to_string(),
        };
        let result = TransientResult {
            image: ImageRef::new("/photos/a.png"),
            text: "HELLO".to_string(),
        };

        let out = render_result(&route, Some(&result));
        assert!(out.starts_with(
            "OCR Result\nEngine: PaddleOCR\nTime taken: 120ms\nEngine size: ~10MB\n"
        ));
        assert!(out.contains("Image: /photos/a.png"));
        assert!(out.ends_with("HELLO\n"));

        let expired = render_result(&route, None);
        assert!(expired.contains("no longer available"));
    }

    #[test]
    fn test_render_result_from_partial_path() {
        let route = ResultRoute::from_path("PaddleOCR");
        let out = render_result(&route, None);

        assert!(out.contains("Engine: PaddleOCR\n"));
        assert!(out.contains("Time taken: 0ms\n"));
        assert!(out.contains("Engine size: Unknown\n"));
    }

    #[test]
    fn test_render_history_truncates_text() {
        let long = "a".repeat(120);
        let out = render_history(&[record(2, &long), record(1, "short")]);

        assert!(out.contains(&format!("  Text: {}\n", "a".repeat(100))));
        assert!(!out.contains(&"a".repeat(101)));
        assert!(out.contains("  Time: 812 ms"));
        assert!(out.find("#2").unwrap() < out.find("#1").unwrap());
    }

    #[test]
    fn test_render_empty_history() {
        assert_eq!(render_history(&[]), "No recognitions yet\n");
    }

    #[test]
    fn test_render_engines() {
        let out = render_engines(&[(EngineKind::Paddle, true), (EngineKind::Tesseract, false)]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("PaddleOCR"));
        assert!(lines[0].ends_with("ready"));
        assert!(lines[1].ends_with("not installed"));
    }
}
