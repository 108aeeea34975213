use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;
use tgfeed_core::{ChannelName, FeedDocument, Post, PostId, TranslationOutcome, TranslationStatus};
use tgfeed_engine::{
    write_feed_document, FailureKind, FeedConfig, FeedPipeline, PipelineError, ReqwestFetcher,
    TranslateError, Translator,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Prefixes the text with `EN: `; text containing "таймаут" times out and
/// ASCII-only text comes back unchanged.
#[derive(Default)]
struct PrefixTranslator {
    calls: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<String>>>,
}

impl PrefixTranslator {
    fn shared(&self) -> Self {
        Self {
            calls: self.calls.clone(),
            inputs: self.inputs.clone(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Translator for PrefixTranslator {
    fn name(&self) -> &str {
        "prefix"
    }

    async fn translate(&self, text: &str, _target_lang: &str) -> Result<String, TranslateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(text.to_string());
        if text.contains("таймаут") {
            return Err(TranslateError::Timeout);
        }
        if text.is_ascii() {
            return Ok(text.to_string());
        }
        Ok(format!("EN: {text}"))
    }
}

/// Renders a preview page; `posts` are given newest first like the feed,
/// the page lists them oldest first like Telegram does.
fn page(posts: &[(u64, &str)]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body>\
         <section class=\"tgme_channel_history js-message_history\">",
    );
    for (id, text) in posts.iter().rev() {
        html.push_str(&format!(
            r#"<div class="tgme_widget_message_wrap js-widget_message_wrap">
<div class="tgme_widget_message js-widget_message" data-post="sample_channel/{id}">
<div class="tgme_widget_message_bubble">
<div class="tgme_widget_message_text js-message_text" dir="auto">{text}</div>
<div class="tgme_widget_message_footer"><a class="tgme_widget_message_date" href="https://t.me/sample_channel/{id}"><time datetime="2024-05-01T10:{id:02}:00+00:00">10:{id:02}</time></a></div>
</div></div></div>
"#
        ));
    }
    html.push_str("</section></body></html>");
    html
}

async fn serve(server: &MockServer, html: String) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/s/sample_channel"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

fn config(server: &MockServer, output: PathBuf, limit: usize) -> FeedConfig {
    let mut config = FeedConfig::new(ChannelName::parse("sample_channel").unwrap());
    config.base_url = server.uri();
    config.output = output;
    config.limit = limit;
    config
}

fn pipeline(config: &FeedConfig, translator: Option<Box<dyn Translator>>) -> FeedPipeline {
    feed_logging::initialize_for_tests();
    let fetcher = Box::new(ReqwestFetcher::new(config.fetch.clone()));
    FeedPipeline::new(config, fetcher, translator)
        .unwrap()
        .with_clock(Arc::new(|| Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()))
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn post_ids(doc: &Value) -> Vec<u64> {
    doc["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_u64().unwrap())
        .collect()
}

#[tokio::test]
async fn limit_keeps_the_two_newest_posts() {
    let server = MockServer::start().await;
    serve(&server, page(&[(12, "Третий"), (11, "Второй"), (10, "Первый")])).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");

    let translator = PrefixTranslator::default();
    let summary = pipeline(&config(&server, out.clone(), 2), Some(Box::new(translator.shared())))
        .run()
        .await
        .unwrap();

    let doc = read_json(&out);
    assert_eq!(post_ids(&doc), vec![12, 11]);
    assert_eq!(doc["posts"][0]["translated"], true);
    assert_eq!(doc["posts"][0]["text"], "EN: Третий");
    assert_eq!(doc["posts"][1]["translated"], true);
    assert_eq!(doc["channel"], "sample_channel");
    assert_eq!(doc["generated_at"], "2024-05-02T08:00:00Z");
    assert_eq!(summary.posts, 2);
    assert_eq!(summary.translated, 2);
    assert_eq!(summary.output_path, Some(out));
    assert_eq!(translator.calls(), 2);
}

#[tokio::test]
async fn translator_none_keeps_normalized_originals() {
    let server = MockServer::start().await;
    serve(
        &server,
        page(&[(21, "Второй<br>пост"), (20, "Первый   <b>пост</b>")]),
    )
    .await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");

    let summary = pipeline(&config(&server, out.clone(), 25), None)
        .run()
        .await
        .unwrap();

    let doc = read_json(&out);
    let posts = doc["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p["translated"] == false));
    assert!(posts.iter().all(|p| p["status"] == "skipped"));
    assert_eq!(posts[0]["text"], "Второй\nпост");
    assert_eq!(posts[1]["text"], "Первый пост");
    assert_eq!(summary.skipped, 2);
}

#[tokio::test]
async fn one_timeout_downgrades_only_that_post() {
    let server = MockServer::start().await;
    serve(
        &server,
        page(&[(32, "Третий"), (31, "Второй таймаут"), (30, "Первый")]),
    )
    .await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");

    let translator = PrefixTranslator::default();
    let summary = pipeline(&config(&server, out.clone(), 25), Some(Box::new(translator.shared())))
        .run()
        .await
        .unwrap();

    let doc = read_json(&out);
    assert_eq!(post_ids(&doc), vec![32, 31, 30]);
    let translated: Vec<bool> = doc["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["translated"].as_bool().unwrap())
        .collect();
    assert_eq!(translated, vec![true, false, true]);
    assert_eq!(doc["posts"][1]["text"], "Второй таймаут");
    assert_eq!(doc["posts"][1]["status"], "failed");
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.translated, 2);
}

#[tokio::test]
async fn second_run_reuses_translations_and_is_stable() {
    let server = MockServer::start().await;
    serve(&server, page(&[(41, "Второй"), (40, "Первый")])).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");
    let config = config(&server, out.clone(), 25);

    let translator = PrefixTranslator::default();
    pipeline(&config, Some(Box::new(translator.shared())))
        .run()
        .await
        .unwrap();
    let first = fs::read_to_string(&out).unwrap();
    assert_eq!(translator.calls(), 2);

    let summary = pipeline(&config, Some(Box::new(translator.shared())))
        .with_clock(Arc::new(|| Utc.with_ymd_and_hms(2024, 5, 3, 8, 0, 0).unwrap()))
        .run()
        .await
        .unwrap();
    let second = fs::read_to_string(&out).unwrap();

    assert_eq!(translator.calls(), 2);
    assert_eq!(summary.reused, 2);
    assert_eq!(summary.translated, 0);
    let first: Value = serde_json::from_str(&first).unwrap();
    let second: Value = serde_json::from_str(&second).unwrap();
    assert_eq!(first["posts"], second["posts"]);
    assert_ne!(first["generated_at"], second["generated_at"]);
}

#[tokio::test]
async fn text_already_in_target_language_is_sent_only_once() {
    let server = MockServer::start().await;
    serve(&server, page(&[(45, "Already in English"), (44, "Привет")])).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");
    let config = config(&server, out.clone(), 25);

    let translator = PrefixTranslator::default();
    for _ in 0..3 {
        pipeline(&config, Some(Box::new(translator.shared())))
            .run()
            .await
            .unwrap();
    }

    assert_eq!(translator.calls(), 2);
    let doc = read_json(&out);
    assert_eq!(doc["posts"][0]["text"], "Already in English");
    assert_eq!(doc["posts"][0]["status"], "skipped");
    assert_eq!(doc["posts"][0]["already_in_target"], true);
    assert_eq!(doc["posts"][1]["text"], "EN: Привет");
}

#[tokio::test]
async fn prior_feed_without_a_translator_does_not_suppress_translation() {
    let server = MockServer::start().await;
    serve(&server, page(&[(46, "Hello there")])).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");
    let config = config(&server, out.clone(), 25);

    pipeline(&config, None).run().await.unwrap();
    assert!(read_json(&out)["posts"][0].get("already_in_target").is_none());

    let translator = PrefixTranslator::default();
    pipeline(&config, Some(Box::new(translator.shared())))
        .run()
        .await
        .unwrap();
    assert_eq!(translator.calls(), 1);
}

#[tokio::test]
async fn edited_post_is_translated_again() {
    let server = MockServer::start().await;
    serve(&server, page(&[(42, "Старый текст"), (41, "Без изменений")])).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");
    let config = config(&server, out.clone(), 25);

    let translator = PrefixTranslator::default();
    pipeline(&config, Some(Box::new(translator.shared())))
        .run()
        .await
        .unwrap();
    assert_eq!(read_json(&out)["posts"][0]["text"], "EN: Старый текст");

    serve(&server, page(&[(42, "Новый текст"), (41, "Без изменений")])).await;
    let summary = pipeline(&config, Some(Box::new(translator.shared())))
        .run()
        .await
        .unwrap();

    let doc = read_json(&out);
    assert_eq!(doc["posts"][0]["id"], 42);
    assert_eq!(doc["posts"][0]["text"], "EN: Новый текст");
    assert_eq!(doc["posts"][0]["original_text"], "Новый текст");
    assert_eq!(translator.calls(), 3);
    assert_eq!(translator.inputs().last().map(String::as_str), Some("Новый текст"));
    assert_eq!(summary.stale, 1);
    assert_eq!(summary.reused, 1);
}

#[tokio::test]
async fn prior_success_for_edited_post_from_disk_is_not_reused() {
    let server = MockServer::start().await;
    serve(&server, page(&[(42, "Новый текст")])).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");

    let mut prior_post = Post::new(
        PostId(42),
        None,
        "Старый текст",
        Vec::new(),
        "https://t.me/sample_channel/42",
    );
    prior_post.apply(TranslationOutcome::Translated("Old text".to_string()));
    let prior = FeedDocument::new(
        &ChannelName::parse("sample_channel").unwrap(),
        "https://t.me/sample_channel",
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        vec![prior_post],
    );
    write_feed_document(&out, &prior).unwrap();

    let translator = PrefixTranslator::default();
    pipeline(&config(&server, out.clone(), 25), Some(Box::new(translator.shared())))
        .run()
        .await
        .unwrap();

    assert_eq!(translator.calls(), 1);
    assert_eq!(read_json(&out)["posts"][0]["text"], "EN: Новый текст");
}

#[tokio::test]
async fn prior_feed_of_another_channel_is_ignored() {
    let server = MockServer::start().await;
    serve(&server, page(&[(10, "Первый")])).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");

    let mut prior_post = Post::new(PostId(10), None, "Первый", Vec::new(), "https://t.me/other_channel/10");
    prior_post.apply(TranslationOutcome::Translated("CACHED".to_string()));
    let prior = FeedDocument::new(
        &ChannelName::parse("other_channel").unwrap(),
        "https://t.me/other_channel",
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        vec![prior_post],
    );
    write_feed_document(&out, &prior).unwrap();

    let translator = PrefixTranslator::default();
    pipeline(&config(&server, out.clone(), 25), Some(Box::new(translator.shared())))
        .run()
        .await
        .unwrap();

    assert_eq!(translator.calls(), 1);
    let doc = read_json(&out);
    assert_eq!(doc["channel"], "sample_channel");
    assert_eq!(doc["posts"][0]["text"], "EN: Первый");
}

#[tokio::test]
async fn image_only_post_is_kept_and_skipped_by_translator() {
    let server = MockServer::start().await;
    let html = r#"<html><body>
<div class="tgme_widget_message js-widget_message" data-post="sample_channel/50">
  <div class="tgme_widget_message_bubble">
    <a class="tgme_widget_message_photo_wrap" style="background-image:url('https://cdn4.telesco.pe/file/abc.jpg')"></a>
    <a class="tgme_widget_message_photo_wrap" style="background-image:url('https://cdn4.telesco.pe/file/abc.jpg')"></a>
  </div>
</div>
</body></html>"#;
    serve(&server, html.to_string()).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");

    let translator = PrefixTranslator::default();
    let (doc, summary) = pipeline(&config(&server, out.clone(), 25), Some(Box::new(translator.shared())))
        .build_document(None)
        .await
        .unwrap();

    assert_eq!(translator.calls(), 0);
    assert_eq!(doc.posts.len(), 1);
    let post = &doc.posts[0];
    assert_eq!(post.translation_status, TranslationStatus::Skipped);
    assert_eq!(post.raw_text, "");
    assert_eq!(post.timestamp, None);
    assert_eq!(post.images, vec!["https://cdn4.telesco.pe/file/abc.jpg".to_string()]);
    assert_eq!(summary.skipped, 1);
    assert!(!out.exists(), "build_document must not write");
}

#[tokio::test]
async fn posts_with_only_unusable_images_do_not_count_against_the_limit() {
    let server = MockServer::start().await;
    let html = r#"<html><body>
<div class="tgme_widget_message js-widget_message" data-post="sample_channel/60">
  <div class="tgme_widget_message_bubble"><div class="tgme_widget_message_text">Первый</div></div>
</div>
<div class="tgme_widget_message js-widget_message" data-post="sample_channel/61">
  <div class="tgme_widget_message_bubble"><div class="tgme_widget_message_text">Второй</div></div>
</div>
<div class="tgme_widget_message js-widget_message" data-post="sample_channel/62">
  <div class="tgme_widget_message_bubble">
    <a class="tgme_widget_message_photo_wrap" style="background-image:url('data:image/png;base64,AAAA')"></a>
  </div>
</div>
</body></html>"#;
    serve(&server, html.to_string()).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");

    let (doc, _) = pipeline(&config(&server, out, 2), None)
        .build_document(None)
        .await
        .unwrap();

    let ids: Vec<u64> = doc.posts.iter().map(|p| p.id.0).collect();
    assert_eq!(ids, vec![61, 60]);
}

#[tokio::test]
async fn http_404_aborts_without_touching_output() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/sample_channel"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");

    let translator = PrefixTranslator::default();
    let err = pipeline(&config(&server, out.clone(), 25), Some(Box::new(translator.shared())))
        .run()
        .await
        .unwrap_err();
    match err {
        PipelineError::Fetch { source, .. } => assert_eq!(source.kind, FailureKind::HttpStatus(404)),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!out.exists());

    fs::write(&out, "previous feed").unwrap();
    let err = pipeline(&config(&server, out.clone(), 25), Some(Box::new(translator.shared())))
        .run()
        .await;
    assert!(err.is_err());
    assert_eq!(fs::read_to_string(&out).unwrap(), "previous feed");
    assert_eq!(translator.calls(), 0);
}

#[tokio::test]
async fn page_without_posts_fails_the_run() {
    let server = MockServer::start().await;
    serve(&server, "<html><body><div class=\"tgme_page\"></div></body></html>".to_string()).await;
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("feed.json");

    let err = pipeline(&config(&server, out.clone(), 25), None)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)));
    assert!(!out.exists());
}
