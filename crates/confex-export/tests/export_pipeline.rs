//! End-to-end pipeline tests over an in-memory source and sink.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use confex_export::{
    AttachmentMeta, ExportError, ExportOptions, ExportReport, Exporter, PageMeta, PageSource,
    PageStatus, SourceError,
};
use confex_storage::MemorySink;
use pretty_assertions::assert_eq;

/// In-memory page source for pipeline tests.
#[derive(Default)]
struct FakeSource {
    pages: Vec<PageMeta>,
    bodies: HashMap<String, String>,
    attachments: HashMap<String, Vec<AttachmentMeta>>,
    data: HashMap<String, Vec<u8>>,
    fail_bodies: HashSet<String>,
    fail_downloads: HashSet<String>,
}

impl FakeSource {
    fn new() -> Self {
        Self::default()
    }

    fn with_page(mut self, id: &str, title: &str, parent: Option<&str>, body: &str) -> Self {
        self.pages.push(PageMeta {
            id: id.to_owned(),
            title: title.to_owned(),
            parent_id: parent.map(str::to_owned),
        });
        self.bodies.insert(id.to_owned(), body.to_owned());
        self
    }

    fn with_attachment(mut self, page: &str, id: &str, filename: &str, bytes: &[u8]) -> Self {
        self.attachments
            .entry(page.to_owned())
            .or_default()
            .push(AttachmentMeta {
                id: id.to_owned(),
                page_id: page.to_owned(),
                filename: filename.to_owned(),
                media_type: "application/octet-stream".to_owned(),
                download_link: Some(format!("/download/{id}")),
            });
        self.data.insert(id.to_owned(), bytes.to_vec());
        self
    }

    fn failing_body(mut self, id: &str) -> Self {
        self.fail_bodies.insert(id.to_owned());
        self
    }

    fn failing_download(mut self, id: &str) -> Self {
        self.fail_downloads.insert(id.to_owned());
        self
    }
}

impl PageSource for FakeSource {
    fn pages(&self, _space_key: &str) -> Result<Vec<PageMeta>, SourceError> {
        Ok(self.pages.clone())
    }

    fn attachments(&self, page_id: &str) -> Result<Vec<AttachmentMeta>, SourceError> {
        Ok(self.attachments.get(page_id).cloned().unwrap_or_default())
    }

    fn body(&self, page_id: &str) -> Result<String, SourceError> {
        if self.fail_bodies.contains(page_id) {
            return Err(SourceError::new(format!("HTTP 500 for page {page_id}")));
        }
        self.bodies
            .get(page_id)
            .cloned()
            .ok_or_else(|| SourceError::new(format!("no body for page {page_id}")))
    }

    fn attachment_data(&self, attachment: &AttachmentMeta) -> Result<Vec<u8>, SourceError> {
        if self.fail_downloads.contains(&attachment.id) {
            return Err(SourceError::new(format!(
                "HTTP 500 for attachment {}",
                attachment.id
            )));
        }
        self.data
            .get(&attachment.id)
            .cloned()
            .ok_or_else(|| SourceError::new(format!("no data for attachment {}", attachment.id)))
    }

    fn web_base_url(&self) -> Option<&str> {
        Some("https://wiki.example.com")
    }
}

fn export(source: &FakeSource, sink: &MemorySink) -> Result<ExportReport, ExportError> {
    let mut report = ExportReport::default();
    Exporter::new(source, sink, ExportOptions::new("DOCS")).run(&mut report)?;
    Ok(report)
}

fn sample_space() -> FakeSource {
    FakeSource::new()
        .with_page("1", "Dev Docs", None, "<p>Welcome.</p>")
        .with_page(
            "2",
            "Setup Guide",
            Some("1"),
            r#"<p>See <ac:link><ri:page ri:content-title="Endpoints" /></ac:link>.</p>"#,
        )
        .with_page("3", "API", Some("1"), "<p>API overview.</p>")
        .with_page(
            "4",
            "Endpoints",
            Some("3"),
            r#"<p>Back to <ac:link><ri:page ri:content-title="Setup Guide" /></ac:link>.</p>"#,
        )
}

#[test]
fn test_export_mirrors_hierarchy() {
    let source = sample_space();
    let sink = MemorySink::new();
    let report = export(&source, &sink).unwrap();

    assert_eq!(
        sink.paths(),
        vec![
            "dev-docs/api/endpoints.md".to_owned(),
            "dev-docs/api/index.md".to_owned(),
            "dev-docs/index.md".to_owned(),
            "dev-docs/setup-guide.md".to_owned(),
        ]
    );
    assert_eq!(report.pages_exported(), 4);
    assert_eq!(report.pages_failed(), 0);
    assert!(!report.has_issues());
}

#[test]
fn test_export_rewrites_links_between_pages() {
    let source = sample_space();
    let sink = MemorySink::new();
    export(&source, &sink).unwrap();

    let setup = String::from_utf8(sink.file("dev-docs/setup-guide.md").unwrap()).unwrap();
    assert!(setup.contains("[Endpoints](api/endpoints.md)"), "got: {setup}");

    let endpoints = String::from_utf8(sink.file("dev-docs/api/endpoints.md").unwrap()).unwrap();
    assert!(
        endpoints.contains("[Setup Guide](../setup-guide.md)"),
        "got: {endpoints}"
    );
}

#[test]
fn test_export_is_idempotent() {
    let source = sample_space();

    let first_sink = MemorySink::new();
    export(&source, &first_sink).unwrap();

    let second_sink = MemorySink::new();
    export(&source, &second_sink).unwrap();

    assert_eq!(first_sink.paths(), second_sink.paths());
    for path in first_sink.paths() {
        assert_eq!(first_sink.file(&path), second_sink.file(&path), "path {path}");
    }
}

#[test]
fn test_rerun_skips_unchanged_files() {
    let source = sample_space();
    let sink = MemorySink::new();
    export(&source, &sink).unwrap();

    let report = export(&source, &sink).unwrap();
    assert!(report.pages.iter().all(|p| p.unchanged), "all pages unchanged");
}

#[test]
fn test_link_integrity_of_resolved_links() {
    let source = sample_space()
        .with_attachment("2", "10", "wiring.png", b"png-bytes")
        .with_page(
            "5",
            "Embeds",
            Some("1"),
            r#"<ac:image><ri:attachment ri:filename="cover.png" /></ac:image>"#,
        )
        .with_attachment("5", "11", "cover.png", b"more-bytes");
    let sink = MemorySink::new();
    export(&source, &sink).unwrap();

    let existing: HashSet<String> = sink.paths().into_iter().collect();
    let link_re = regex_lite_links();

    for path in sink.paths().iter().filter(|p| p.ends_with(".md")) {
        let text = String::from_utf8(sink.file(path).unwrap()).unwrap();
        let base_dir = path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        for target in link_re(&text) {
            if target.starts_with("http") || target.starts_with('#') {
                continue;
            }
            let joined = join_relative(base_dir, &target);
            assert!(
                existing.contains(&joined),
                "{path}: broken link {target} -> {joined}"
            );
        }
    }
}

/// Extract Markdown link/image targets, ignoring degraded external links
/// (they carry a `"not exported"` title).
fn regex_lite_links() -> impl Fn(&str) -> Vec<String> {
    let re = regex::Regex::new(r#"\]\(([^()\s]+)\)"#).unwrap();
    move |text| {
        re.captures_iter(text)
            .map(|c| c[1].to_owned())
            .collect::<Vec<_>>()
    }
}

fn join_relative(base_dir: &str, target: &str) -> String {
    let mut parts: Vec<&str> = if base_dir.is_empty() {
        Vec::new()
    } else {
        base_dir.split('/').collect()
    };
    for piece in target.split('/') {
        match piece {
            ".." => {
                parts.pop();
            }
            "." => {}
            p => parts.push(p),
        }
    }
    parts.join("/")
}

#[test]
fn test_failed_body_fetch_degrades_gracefully() {
    // Root A with children B (fails) and C
    let source = FakeSource::new()
        .with_page("a", "Alpha", None, "<p>A</p>")
        .with_page("b", "Beta", Some("a"), "<p>B</p>")
        .with_page("c", "Gamma", Some("a"), "<p>C</p>")
        .failing_body("b");
    let sink = MemorySink::new();
    let report = export(&source, &sink).unwrap();

    assert!(sink.file("alpha/index.md").is_some());
    assert!(sink.file("alpha/gamma.md").is_some());
    assert!(sink.file("alpha/beta.md").is_none());

    let beta = report.pages.iter().find(|p| p.id == "b").unwrap();
    assert_eq!(beta.status, PageStatus::Failed);
    assert!(beta.error.as_deref().unwrap().contains("fetch failed"));
    assert_eq!(report.pages_exported(), 2);
}

#[test]
fn test_failed_parent_still_reserves_path_for_links() {
    // D links to B, whose body fetch fails; the link must still resolve
    let source = FakeSource::new()
        .with_page("a", "Alpha", None, "<p>A</p>")
        .with_page("b", "Beta", Some("a"), "<p>B</p>")
        .with_page(
            "d",
            "Delta",
            Some("a"),
            r#"<p><ac:link><ri:page ri:content-title="Beta" /></ac:link></p>"#,
        )
        .failing_body("b");
    let sink = MemorySink::new();
    let report = export(&source, &sink).unwrap();

    let delta = String::from_utf8(sink.file("alpha/delta.md").unwrap()).unwrap();
    assert!(delta.contains("[Beta](beta.md)"), "got: {delta}");
    assert_eq!(report.unresolved().count(), 0);
}

#[test]
fn test_dangling_page_reference_is_degraded_and_reported() {
    let source = FakeSource::new().with_page(
        "1",
        "Home",
        None,
        r#"<p><a href="https://wiki.example.com/pages/viewpage.action?pageId=424242">gone</a></p>"#,
    );
    let sink = MemorySink::new();
    let report = export(&source, &sink).unwrap();

    let home = String::from_utf8(sink.file("home/index.md").unwrap()).unwrap();
    assert!(
        home.contains(
            "[gone](https://wiki.example.com/pages/viewpage.action?pageId=424242 \"not exported\")"
        ),
        "got: {home}"
    );

    let unresolved: Vec<_> = report.unresolved().collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].page_id, "1");
    assert_eq!(unresolved[0].page_title, "Home");
    assert_eq!(unresolved[0].reference, "page id 424242");
}

#[test]
fn test_unknown_macro_produces_visible_marker() {
    let source = FakeSource::new().with_page(
        "1",
        "Home",
        None,
        r#"<p>Before</p><ac:structured-macro ac:name="foo-widget"></ac:structured-macro>"#,
    );
    let sink = MemorySink::new();
    export(&source, &sink).unwrap();

    let home = String::from_utf8(sink.file("home/index.md").unwrap()).unwrap();
    assert!(
        home.contains("`unsupported macro: foo-widget`"),
        "got: {home}"
    );
}

#[test]
fn test_attachment_collision_gets_distinct_names() {
    let source = FakeSource::new()
        .with_page("1", "Home", None, "<p>Files below.</p>")
        .with_attachment("1", "71", "diagram.png", b"first")
        .with_attachment("1", "72", "diagram.png", b"second");
    let sink = MemorySink::new();
    let report = export(&source, &sink).unwrap();

    assert_eq!(
        sink.file("home/attachments/diagram-71.png").unwrap(),
        b"first"
    );
    assert_eq!(
        sink.file("home/attachments/diagram-72.png").unwrap(),
        b"second"
    );
    assert_eq!(report.attachments_written(), 2);
}

#[test]
fn test_attachments_written_after_page_file() {
    let source = FakeSource::new()
        .with_page(
            "1",
            "Home",
            None,
            r#"<ac:image><ri:attachment ri:filename="pic.png" /></ac:image>"#,
        )
        .with_attachment("1", "9", "pic.png", b"bytes");
    let sink = MemorySink::new();
    export(&source, &sink).unwrap();

    assert_eq!(sink.file("home/attachments/pic.png").unwrap(), b"bytes");
    let home = String::from_utf8(sink.file("home/index.md").unwrap()).unwrap();
    assert!(home.contains("![pic.png](attachments/pic.png)"), "got: {home}");
}

#[test]
fn test_failed_attachment_download_is_partial() {
    let source = FakeSource::new()
        .with_page("1", "Home", None, "<p>Text.</p>")
        .with_attachment("1", "9", "pic.png", b"bytes")
        .failing_download("9");
    let sink = MemorySink::new();
    let report = export(&source, &sink).unwrap();

    assert!(sink.file("home/index.md").is_some());
    assert!(sink.file("home/attachments/pic.png").is_none());

    let home = &report.pages[0];
    assert_eq!(home.status, PageStatus::Partial);
    assert_eq!(home.attachment_failures.len(), 1);
    assert!(home.attachment_failures[0].starts_with("pic.png:"));
}

#[test]
fn test_cycle_aborts_before_any_write() {
    let source = FakeSource::new()
        .with_page("1", "Root", None, "<p>A</p>")
        .with_page("2", "Loop A", Some("3"), "<p>B</p>")
        .with_page("3", "Loop B", Some("2"), "<p>C</p>");
    let sink = MemorySink::new();
    let err = export(&source, &sink).unwrap_err();

    assert!(matches!(err, ExportError::HierarchyCycle { .. }));
    assert!(sink.paths().is_empty());
}

#[test]
fn test_write_failure_is_fatal() {
    let source = sample_space();
    let sink = MemorySink::new().with_failing_path("dev-docs/index.md");

    let mut report = ExportReport::default();
    let err = Exporter::new(&source, &sink, ExportOptions::new("DOCS"))
        .run(&mut report)
        .unwrap_err();

    assert!(matches!(err, ExportError::Write(_)));
}

#[test]
fn test_stop_flag_skips_remaining_pages() {
    let source = sample_space();
    let sink = MemorySink::new();
    let stop = Arc::new(AtomicBool::new(true));

    let mut report = ExportReport::default();
    Exporter::new(&source, &sink, ExportOptions::new("DOCS"))
        .with_stop_flag(Arc::clone(&stop))
        .run(&mut report)
        .unwrap();

    assert!(sink.paths().is_empty());
    assert_eq!(report.pages_skipped(), 4);
    assert!(
        report
            .pages
            .iter()
            .all(|p| p.status == PageStatus::Skipped)
    );
}

#[test]
fn test_empty_space_is_ok() {
    let source = FakeSource::new();
    let sink = MemorySink::new();
    let report = export(&source, &sink).unwrap();

    assert!(report.pages.is_empty());
    assert!(sink.paths().is_empty());
}

#[test]
fn test_sibling_title_collision_produces_distinct_files() {
    let source = FakeSource::new()
        .with_page("1", "Root", None, "<p>Root</p>")
        .with_page("21", "Notes", Some("1"), "<p>First</p>")
        .with_page("22", "Notes", Some("1"), "<p>Second</p>");
    let sink = MemorySink::new();
    export(&source, &sink).unwrap();

    assert!(sink.file("root/notes-21.md").is_some());
    assert!(sink.file("root/notes-22.md").is_some());
}
