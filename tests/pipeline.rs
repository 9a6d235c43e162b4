//! Integration tests driving the full pipeline over the in-memory backend.
//!
//! No pdfium library is needed: `MemoryBackend` synthesises pages, rasters
//! and text runs. Decks are checked by reading the `.pptx` back as a zip.

use edgequake_pdf2pptx::bridge::{Bridge, EngineKind};
use edgequake_pdf2pptx::protocol::FnSink;
use edgequake_pdf2pptx::source::memory::{MemoryBackend, MemoryPage};
use edgequake_pdf2pptx::source::Capabilities;
use edgequake_pdf2pptx::{
    convert, convert_bytes, convert_to_file, ClientMessage, ConversionConfig, ConversionRequest,
    ConversionState, EngineMessage, EnginePreference, ErrorKind, ImageEncoding, PageError,
    Pdf2PptxError, ProgressEvent, RenderConfig, RenderMode, Session,
};
use std::io::{Cursor, Read};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

const PDF: &[u8] = b"%PDF-1.7\n";
const WAIT: Duration = Duration::from_secs(10);

// ── Helpers ──────────────────────────────────────────────────────────────────

fn part_names(deck: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(deck)).expect("valid zip");
    archive.file_names().map(str::to_string).collect()
}

fn read_text(deck: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(deck)).expect("valid zip");
    let mut file = archive.by_name(name).expect("part present");
    let mut s = String::new();
    file.read_to_string(&mut s).expect("utf-8 part");
    s
}

fn read_bytes(deck: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(deck)).expect("valid zip");
    let mut file = archive.by_name(name).expect("part present");
    let mut v = Vec::new();
    file.read_to_end(&mut v).expect("readable part");
    v
}

/// The `<p:pic>…</p:pic>` element of a slide.
fn picture_xml(slide: &str) -> &str {
    let start = slide.find("<p:pic>").expect("slide has a picture");
    let end = slide.find("</p:pic>").expect("picture is closed");
    &slide[start..end]
}

fn config_for(backend: MemoryBackend) -> edgequake_pdf2pptx::ConversionConfigBuilder {
    ConversionConfig::builder().backend(Arc::new(backend))
}

fn slow_pages(count: usize) -> MemoryBackend {
    MemoryBackend::new(
        (0..count)
            .map(|_| MemoryPage::new(100.0, 100.0).with_render_delay(Duration::from_millis(150)))
            .collect(),
    )
}

fn request() -> ConversionRequest {
    ConversionRequest::new(PDF.to_vec()).with_name("talk.pdf")
}

/// Receive until (and including) the first terminal message.
fn until_terminal(rx: &mpsc::Receiver<EngineMessage>) -> Vec<EngineMessage> {
    let mut out = Vec::new();
    loop {
        let msg = rx.recv_timeout(WAIT).expect("engine message");
        let done = msg.is_terminal();
        out.push(msg);
        if done {
            return out;
        }
    }
}

fn terminal_count(messages: &[EngineMessage]) -> usize {
    messages.iter().filter(|m| m.is_terminal()).count()
}

fn is_page_start(msg: &EngineMessage, page: usize) -> bool {
    matches!(msg, EngineMessage::Progress(e) if e.label.starts_with(&format!("Rendering page {page} ")))
}

// ── Library entry points ─────────────────────────────────────────────────────

#[tokio::test]
async fn three_letter_pages_become_full_bleed_pictures() {
    let config = config_for(MemoryBackend::letter_pages(3))
        .scale(2.0)
        .image_format(ImageEncoding::Png)
        .build();
    let result = convert_bytes(PDF.to_vec(), Some("handout.pdf"), &config)
        .await
        .expect("conversion succeeds");

    assert_eq!(result.output_name, "handout.pptx");
    assert_eq!(result.stats.total_pages, 3);
    assert_eq!(result.stats.slides, 3);
    assert!(result.stats.degraded_pages.is_empty());

    let deck = &result.output_bytes;
    let names = part_names(deck);
    for n in 1..=3 {
        assert!(names.contains(&format!("ppt/slides/slide{n}.xml")));
        let slide = read_text(deck, &format!("ppt/slides/slide{n}.xml"));
        let pic = picture_xml(&slide);
        assert!(pic.contains(r#"<a:off x="0" y="0"/><a:ext cx="7772400" cy="10058400"/>"#));
    }
    assert!(!names.contains(&"ppt/slides/slide4.xml".to_string()));

    let pres = read_text(deck, "ppt/presentation.xml");
    assert!(pres.contains(r#"<p:sldSz cx="7772400" cy="10058400"/>"#));

    let media = read_bytes(deck, "ppt/media/image1.png");
    let img = image::load_from_memory(&media).expect("decodable png");
    assert_eq!((img.width(), img.height()), (1224, 1584));
}

#[tokio::test]
async fn canvas_comes_from_first_page_and_later_pages_are_fitted() {
    let backend = MemoryBackend::new(vec![MemoryPage::new(720.0, 405.0), MemoryPage::letter()]);
    let config = config_for(backend).scale(1.0).build();
    let result = convert_bytes(PDF.to_vec(), None, &config).await.unwrap();

    assert_eq!(result.output_name, "pdf2pptx-export.pptx");
    let deck = &result.output_bytes;
    let pres = read_text(deck, "ppt/presentation.xml");
    assert!(pres.contains(r#"<p:sldSz cx="9144000" cy="5143500"/>"#));

    let first = read_text(deck, "ppt/slides/slide1.xml");
    assert!(picture_xml(&first).contains(r#"<a:off x="0" y="0"/>"#));

    // Portrait page on a landscape canvas: full height, centred horizontally.
    let second = read_text(deck, "ppt/slides/slide2.xml");
    let pic = picture_xml(&second);
    assert!(!pic.contains(r#"<a:off x="0" "#));
    assert!(pic.contains(r#" y="0"/>"#));
    assert!(pic.contains(r#"cy="5143500""#));
}

#[tokio::test]
async fn slides_follow_source_page_order() {
    let pages = [
        (100.0, 100.0, [200, 0, 0]),
        (200.0, 100.0, [0, 200, 0]),
        (100.0, 200.0, [0, 0, 200]),
        (150.0, 150.0, [90, 90, 90]),
    ];
    let backend = MemoryBackend::new(
        pages
            .iter()
            .map(|&(w, h, fill)| MemoryPage::new(w, h).with_fill(fill))
            .collect(),
    );
    let config = config_for(backend).scale(1.0).build();
    let result = convert_bytes(PDF.to_vec(), None, &config).await.unwrap();
    assert_eq!(result.stats.slides, pages.len());

    let deck = &result.output_bytes;
    for (k, &(w, h, fill)) in pages.iter().enumerate() {
        let n = k + 1;
        let media = format!("image{n}.png");
        let img = image::load_from_memory(&read_bytes(deck, &format!("ppt/media/{media}")))
            .unwrap()
            .to_rgb8();
        assert_eq!((img.width(), img.height()), (w as u32, h as u32), "page {n}");
        assert_eq!(img.get_pixel(0, 0).0, fill, "page {n}");

        let rels = read_text(deck, &format!("ppt/slides/_rels/slide{n}.xml.rels"));
        assert!(rels.contains(&format!("../media/{media}")), "slide {n}: {rels}");
    }
}

#[tokio::test]
async fn hybrid_mode_writes_background_and_editable_text() {
    let backend = MemoryBackend::new(vec![MemoryPage::letter()
        .with_text("Quarterly results", 72.0, 700.0, 24.0)
        .with_text("   ", 72.0, 650.0, 12.0)]);
    let config = config_for(backend)
        .mode(RenderMode::Hybrid)
        .image_format(ImageEncoding::Jpeg { quality: 0.7 })
        .build();
    let result = convert_bytes(PDF.to_vec(), Some("q3.pdf"), &config).await.unwrap();

    let deck = &result.output_bytes;
    let slide = read_text(deck, "ppt/slides/slide1.xml");
    assert!(slide.contains("<p:bg>"));
    assert!(slide.contains("<a:t>Quarterly results</a:t>"));
    assert!(slide.contains(r#"sz="2400""#));
    assert!(slide.contains(r#"<a:srgbClr val="333333"/>"#));
    assert_eq!(slide.matches("<p:sp>").count(), 1, "blank runs are dropped");

    // Background at 1.2x regardless of the configured scale.
    let media = read_bytes(deck, "ppt/media/image1.jpeg");
    let img = image::load_from_memory(&media).expect("decodable jpeg");
    assert_eq!((img.width(), img.height()), (735, 951));
}

#[tokio::test]
async fn hybrid_pages_degrade_one_layer_at_a_time() {
    let backend = MemoryBackend::new(vec![
        MemoryPage::letter()
            .with_text("kept text", 72.0, 700.0, 18.0)
            .failing_render(),
        MemoryPage::letter().with_text("lost", 72.0, 700.0, 18.0).failing_text(),
    ]);
    let config = config_for(backend).mode(RenderMode::Hybrid).build();
    let result = convert_bytes(PDF.to_vec(), None, &config).await.unwrap();

    assert_eq!(result.stats.slides, 2);
    let pages: Vec<usize> = result.stats.degraded_pages.iter().map(PageError::page).collect();
    assert_eq!(pages, vec![1, 2]);
    assert!(matches!(
        result.stats.degraded_pages[0],
        PageError::BackgroundRenderFailed { .. }
    ));
    assert!(matches!(
        result.stats.degraded_pages[1],
        PageError::TextExtractionFailed { .. }
    ));

    let deck = &result.output_bytes;
    let first = read_text(deck, "ppt/slides/slide1.xml");
    assert!(!first.contains("<p:bg>"));
    assert!(first.contains("<a:t>kept text</a:t>"));
    let second = read_text(deck, "ppt/slides/slide2.xml");
    assert!(second.contains("<p:bg>"));
    assert!(!second.contains("<a:t>"));
}

#[tokio::test]
async fn hybrid_page_losing_both_layers_fails_the_run() {
    let backend = MemoryBackend::new(vec![MemoryPage::letter().failing_render().failing_text()]);
    let config = config_for(backend).mode(RenderMode::Hybrid).build();
    let err = convert_bytes(PDF.to_vec(), None, &config).await.unwrap_err();
    assert!(matches!(err, Pdf2PptxError::RasterisationFailed { page: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::Render);
}

#[tokio::test]
async fn out_of_range_settings_are_clamped_not_rejected() {
    let config = config_for(MemoryBackend::new(vec![MemoryPage::new(100.0, 50.0)]))
        .scale(42.0)
        .build();
    assert_eq!(config.render.scale, 3.0);
    let result = convert_bytes(PDF.to_vec(), None, &config).await.unwrap();
    let img = image::load_from_memory(&read_bytes(&result.output_bytes, "ppt/media/image1.png")).unwrap();
    assert_eq!((img.width(), img.height()), (300, 150));
}

#[tokio::test]
async fn convert_to_file_writes_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("lecture.pdf");
    std::fs::write(&input, PDF).unwrap();
    let out_dir = dir.path().join("out");
    let output = out_dir.join("lecture.pptx");

    let config = config_for(MemoryBackend::letter_pages(2)).scale(1.0).build();
    let stats = convert_to_file(&input, &output, &config).await.unwrap();
    assert_eq!(stats.slides, 2);

    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(bytes.len(), stats.output_size);
    assert!(part_names(&bytes).contains(&"ppt/slides/slide2.xml".to_string()));

    let entries: Vec<_> = std::fs::read_dir(&out_dir).unwrap().collect();
    assert_eq!(entries.len(), 1, "no temp files left behind");
}

#[tokio::test]
async fn cancelled_conversion_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("lecture.pdf");
    std::fs::write(&input, PDF).unwrap();
    let output = dir.path().join("lecture.pptx");

    let token = edgequake_pdf2pptx::CancelToken::new();
    token.cancel();
    let config = config_for(MemoryBackend::letter_pages(2))
        .cancel_token(token)
        .build();
    let err = convert_to_file(&input, &output, &config).await.unwrap_err();
    assert!(matches!(err, Pdf2PptxError::Cancelled));
    assert!(!output.exists());
}

#[tokio::test]
async fn input_files_are_validated() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(MemoryBackend::letter_pages(1)).build();

    let err = convert(dir.path().join("missing.pdf"), &config).await.unwrap_err();
    assert!(matches!(err, Pdf2PptxError::FileNotFound { .. }));

    let txt = dir.path().join("notes.txt");
    std::fs::write(&txt, PDF).unwrap();
    let err = convert(&txt, &config).await.unwrap_err();
    assert!(matches!(err, Pdf2PptxError::UnsupportedFileType { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let fake = dir.path().join("fake.pdf");
    std::fs::write(&fake, b"PK\x03\x04not a pdf").unwrap();
    let err = convert(&fake, &config).await.unwrap_err();
    assert!(matches!(err, Pdf2PptxError::NotAPdf { .. }));
    assert_eq!(err.kind(), ErrorKind::Decode);
}

// ── Execution bridge ─────────────────────────────────────────────────────────

#[test]
fn worker_run_ends_with_done_then_result() {
    let bridge = Bridge::new(Arc::new(MemoryBackend::letter_pages(2)));
    assert_eq!(bridge.select_engine().unwrap(), EngineKind::Worker);

    let (tx, rx) = mpsc::channel::<EngineMessage>();
    let session = bridge
        .start(request().with_render(RenderConfig::builder().scale(1.0).build()), Arc::new(tx))
        .unwrap();
    let messages = until_terminal(&rx);

    assert_eq!(terminal_count(&messages), 1);
    let EngineMessage::Result(ref result) = messages[messages.len() - 1] else {
        panic!("expected a result, got {:?}", messages.last());
    };
    assert_eq!(result.output_name, "talk.pptx");
    assert_eq!(
        messages[messages.len() - 2],
        EngineMessage::Progress(ProgressEvent::new("Done", 100))
    );

    let percents: Vec<u8> = messages
        .iter()
        .filter_map(|m| match m {
            EngineMessage::Progress(e) => Some(e.percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![5, 45, 80, 90, 95, 100]);
    assert_eq!(session.state(), ConversionState::Done);
    assert_eq!(bridge.active_engine(), Some(EngineKind::Worker));
}

#[test]
fn cancelling_a_worker_reports_abort_exactly_once() {
    let bridge = Bridge::new(Arc::new(slow_pages(6)));
    let (tx, rx) = mpsc::channel::<EngineMessage>();
    bridge.start(request(), Arc::new(tx)).unwrap();

    loop {
        let msg = rx.recv_timeout(WAIT).expect("progress before cancel");
        assert!(!msg.is_terminal(), "run finished before it could be cancelled");
        if is_page_start(&msg, 2) {
            break;
        }
    }
    assert!(bridge.cancel());
    assert!(!bridge.is_running());

    let rest = until_terminal(&rx);
    assert!(matches!(rest.last(), Some(EngineMessage::Cancelled)));
    assert_eq!(terminal_count(&rest), 1);
    let n = rest.len();
    assert_eq!(rest[n - 3], EngineMessage::Progress(ProgressEvent::aborted()));
    assert!(matches!(rest[n - 2], EngineMessage::Log { .. }));

    // The detached worker keeps running briefly; none of it gets through.
    assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    assert!(!bridge.cancel(), "second cancel has nothing to do");
}

#[test]
fn inline_run_honours_cancel_at_page_boundary() {
    let bridge = Bridge::new(Arc::new(MemoryBackend::new(
        (0..4).map(|_| MemoryPage::new(100.0, 100.0)).collect(),
    )))
    .with_preference(EnginePreference::Inline);
    assert_eq!(bridge.select_engine().unwrap(), EngineKind::Inline);

    let session = Arc::new(Session::new());
    let seen: Arc<Mutex<Vec<EngineMessage>>> = Arc::default();
    let sink = {
        let session = Arc::clone(&session);
        let seen = Arc::clone(&seen);
        FnSink(move |msg: EngineMessage| {
            if is_page_start(&msg, 2) {
                session.cancel();
            }
            seen.lock().unwrap().push(msg);
        })
    };
    bridge
        .start_session(request(), Arc::clone(&session), Arc::new(sink))
        .unwrap();

    // Inline: everything has been delivered by the time start returns.
    let seen = seen.lock().unwrap();
    assert_eq!(terminal_count(&seen), 1);
    assert!(matches!(seen.last(), Some(EngineMessage::Cancelled)));
    assert!(seen.contains(&EngineMessage::Progress(ProgressEvent::aborted())));
    assert!(!seen.iter().any(|m| is_page_start(m, 3)));
    assert_eq!(session.state(), ConversionState::Cancelled);
}

#[test]
fn starting_again_silently_tears_down_the_previous_run() {
    let bridge = Bridge::new(Arc::new(slow_pages(4)));

    let (tx_a, rx_a) = mpsc::channel::<EngineMessage>();
    let first = bridge.start(request(), Arc::new(tx_a)).unwrap();
    let msg = rx_a.recv_timeout(WAIT).unwrap();
    assert!(!msg.is_terminal());

    let (tx_b, rx_b) = mpsc::channel::<EngineMessage>();
    bridge.start(request(), Arc::new(tx_b)).unwrap();
    let second = until_terminal(&rx_b);
    assert!(matches!(second.last(), Some(EngineMessage::Result(_))));

    assert!(first.is_cancelled());
    assert_eq!(terminal_count(&rx_a.try_iter().collect::<Vec<_>>()), 0);
}

#[test]
fn bridge_clamps_requests_built_by_hand() {
    for preference in [EnginePreference::Auto, EnginePreference::Inline] {
        for (scale, expected_width) in [(10.0, 1836), (f32::NAN, 1224)] {
            let bridge = Bridge::new(Arc::new(MemoryBackend::letter_pages(1))).with_preference(preference);
            let mut req = request();
            req.render.scale = scale;
            // A permissive request policy is replaced by the bridge's own.
            req.clamp_policy.max_scale = 100.0;

            let (tx, rx) = mpsc::channel::<EngineMessage>();
            bridge.start(req, Arc::new(tx)).unwrap();
            let messages = until_terminal(&rx);
            let Some(EngineMessage::Result(result)) = messages.last() else {
                panic!("expected a result, got {:?}", messages.last());
            };
            let img = image::load_from_memory(&read_bytes(&result.output_bytes, "ppt/media/image1.png")).unwrap();
            assert_eq!(img.width(), expected_width, "{preference:?} scale {scale}");
        }
    }
}

#[test]
fn raw_start_payload_is_normalised() {
    let bridge = Bridge::new(Arc::new(MemoryBackend::new(vec![MemoryPage::new(50.0, 50.0)])))
        .with_preference(EnginePreference::Inline);
    let message: ClientMessage = serde_json::from_str(
        r#"{
            "type": "start",
            "payload": {
                "source_bytes": "JVBERi0xLjc=",
                "source_name": "C:\\Users\\me\\Scans\\memo.PDF",
                "render": { "scale": "9", "image_format": "jpg", "jpeg_quality": 0.1 }
            }
        }"#,
    )
    .unwrap();

    let (tx, rx) = mpsc::channel::<EngineMessage>();
    bridge.handle(message, Arc::new(tx)).unwrap();
    let messages = until_terminal(&rx);
    let Some(EngineMessage::Result(result)) = messages.last() else {
        panic!("expected a result, got {:?}", messages.last());
    };
    assert_eq!(result.output_name, "memo.pptx");
    let img = image::load_from_memory(&read_bytes(&result.output_bytes, "ppt/media/image1.jpeg"))
        .expect("jpeg media");
    assert_eq!((img.width(), img.height()), (150, 150));

    // Cancel with nothing running is harmless.
    bridge.handle(ClientMessage::Cancel, Arc::new(mpsc::channel::<EngineMessage>().0)).unwrap();
}

#[test]
fn engine_messages_round_trip_as_json() {
    let bridge = Bridge::new(Arc::new(MemoryBackend::letter_pages(1)))
        .with_preference(EnginePreference::Inline);
    let (tx, rx) = mpsc::channel::<EngineMessage>();
    bridge
        .start(request().with_render(RenderConfig::builder().scale(1.0).build()), Arc::new(tx))
        .unwrap();

    for msg in until_terminal(&rx) {
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("type").is_some());
        let back: EngineMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.is_terminal(), msg.is_terminal());
        if let EngineMessage::Result(r) = back {
            assert!(r.output_bytes.starts_with(b"PK"));
        }
    }
}

#[test]
fn no_capable_context_is_a_capability_error() {
    let backend = MemoryBackend::letter_pages(1).with_capabilities(Capabilities {
        background: false,
        inline: false,
    });
    let bridge = Bridge::new(Arc::new(backend));
    let (tx, rx) = mpsc::channel::<EngineMessage>();
    let err = bridge.start(request(), Arc::new(tx)).unwrap_err();
    assert!(matches!(err, Pdf2PptxError::ImagingUnavailable(_)));

    match rx.recv_timeout(WAIT).unwrap() {
        EngineMessage::Error { kind, .. } => assert_eq!(kind, ErrorKind::Capability),
        other => panic!("expected an error message, got {other:?}"),
    }
}

#[test]
fn decode_failure_is_delivered_as_error() {
    let bridge = Bridge::new(Arc::new(MemoryBackend::letter_pages(1).corrupt()));
    let (tx, rx) = mpsc::channel::<EngineMessage>();
    let session = bridge.start(request(), Arc::new(tx)).unwrap();
    let messages = until_terminal(&rx);
    match messages.last() {
        Some(EngineMessage::Error { kind, message }) => {
            assert_eq!(*kind, ErrorKind::Decode);
            assert!(message.contains("corrupt"));
        }
        other => panic!("expected an error, got {other:?}"),
    }
    assert_eq!(session.state(), ConversionState::Failed);
}
