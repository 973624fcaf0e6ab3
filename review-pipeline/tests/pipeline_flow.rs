use async_trait::async_trait;
use database::JsonPostStore;
use llm_interface::{
    AiBackend, CompletionRequest, CompletionTask, ResilientBackend, RetryPolicy,
};
use review_pipeline::{ReviewPipeline, REVIEW_SECTIONS};
use reviewgen_core::{
    BackendError, CoreError, GeneratedOutput, ImageProvenance, PipelineConfig, Post,
    TextProvenance,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn post(id: &str, likes: u64, images: usize) -> Post {
    Post::new(id, likes)
        .with_title(format!("{id} ribs"))
        .with_text("smoky ribs, friendly staff, fair price")
        .with_images((1..=images).map(|i| format!("https://img.example.com/{id}/{i}.jpg")))
}

fn scenario_posts() -> Vec<Post> {
    vec![post("mid", 50, 2), post("top", 200, 2), post("low", 10, 2)]
}

fn config(max_images: usize) -> PipelineConfig {
    PipelineConfig {
        max_images,
        ..PipelineConfig::default()
    }
}

struct FailingBackend {
    calls: AtomicU32,
}

#[async_trait]
impl AiBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::error("model exploded"))
    }
}

struct ScriptedBackend;

#[async_trait]
impl AiBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        match request.task {
            CompletionTask::ImageCuration => Ok(r#"```json
["https://img.example.com/low/2.jpg", "https://evil.example.com/x.jpg", "https://img.example.com/top/2.jpg"]
```"#
                .to_string()),
            CompletionTask::ReviewWriting => Ok("Smoke and fire at Bull BBQ\n[Overall]\nLoved it.".to_string()),
        }
    }
}

struct SlowBackend;

#[async_trait]
impl AiBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, BackendError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("too late".to_string())
    }
}

fn assert_selection_contract(output: &GeneratedOutput, k: usize, pool_size: usize) {
    assert_eq!(output.images.len(), k.min(pool_size));
    let unique: HashSet<&String> = output.images.iter().collect();
    assert_eq!(unique.len(), output.images.len());
    assert!(output
        .images
        .iter()
        .all(|url| url.starts_with("https://img.example.com/")));
}

#[tokio::test]
async fn test_heuristic_scenario_without_backend() {
    let output = ReviewPipeline::new(config(4))
        .run("Bull BBQ", scenario_posts())
        .await
        .unwrap();

    assert_eq!(output.post_count, 3);
    let likes: Vec<u64> = output.top_posts.iter().map(|p| p.like_count).collect();
    assert_eq!(likes, vec![200, 50, 10]);

    assert_eq!(
        output.images,
        vec![
            "https://img.example.com/top/1.jpg",
            "https://img.example.com/mid/1.jpg",
            "https://img.example.com/low/1.jpg",
            "https://img.example.com/top/2.jpg",
        ]
    );
    assert_eq!(output.provenance.images, ImageProvenance::Heuristic);
    assert_eq!(output.provenance.text, TextProvenance::Template);
    for heading in REVIEW_SECTIONS {
        assert!(output.content.contains(heading), "missing {heading}");
    }
}

#[tokio::test]
async fn test_failing_backend_degrades_both_stages() {
    let backend = Arc::new(FailingBackend {
        calls: AtomicU32::new(0),
    });
    let output = ReviewPipeline::new(config(9))
        .with_backend(backend.clone())
        .run("Bull BBQ", scenario_posts())
        .await
        .unwrap();

    assert_eq!(output.provenance.images, ImageProvenance::Heuristic);
    assert_eq!(output.provenance.text, TextProvenance::Template);
    assert_selection_contract(&output, 9, 6);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_degraded_runs_are_reproducible() {
    let pipeline = ReviewPipeline::new(config(5)).with_backend(Arc::new(FailingBackend {
        calls: AtomicU32::new(0),
    }));

    let first = pipeline.run("Bull BBQ", scenario_posts()).await.unwrap();
    let second = pipeline.run("Bull BBQ", scenario_posts()).await.unwrap();
    let offline = ReviewPipeline::new(config(5))
        .run("Bull BBQ", scenario_posts())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, offline);
}

#[tokio::test]
async fn test_backend_choices_are_validated_and_topped_up() {
    let output = ReviewPipeline::new(config(4))
        .with_backend(Arc::new(ScriptedBackend))
        .run("Bull BBQ", scenario_posts())
        .await
        .unwrap();

    assert_eq!(output.provenance.images, ImageProvenance::Ai);
    assert_eq!(output.provenance.text, TextProvenance::Ai);
    assert_eq!(
        output.images,
        vec![
            "https://img.example.com/low/2.jpg",
            "https://img.example.com/top/2.jpg",
            "https://img.example.com/top/1.jpg",
            "https://img.example.com/mid/1.jpg",
        ]
    );
    assert!(output.content.starts_with("Smoke and fire"));
}

#[tokio::test]
async fn test_sequential_captioning_matches_concurrent_output() {
    let concurrent = ReviewPipeline::new(config(4))
        .with_backend(Arc::new(ScriptedBackend))
        .run("Bull BBQ", scenario_posts())
        .await
        .unwrap();
    let sequential = ReviewPipeline::new(PipelineConfig {
        sequential_captioning: true,
        ..config(4)
    })
    .with_backend(Arc::new(ScriptedBackend))
    .run("Bull BBQ", scenario_posts())
    .await
    .unwrap();

    assert_eq!(concurrent, sequential);
}

#[tokio::test]
async fn test_timed_out_backend_degrades() {
    let backend = ResilientBackend::new(
        Arc::new(SlowBackend),
        RetryPolicy {
            timeout: Duration::from_millis(50),
            max_attempts: 2,
        },
    );
    let output = ReviewPipeline::new(config(3))
        .with_backend(Arc::new(backend))
        .run("Bull BBQ", scenario_posts())
        .await
        .unwrap();

    assert_eq!(output.provenance.images, ImageProvenance::Heuristic);
    assert_eq!(output.provenance.text, TextProvenance::Template);
    assert_selection_contract(&output, 3, 6);
}

#[tokio::test]
async fn test_empty_input_is_fatal() {
    let result = ReviewPipeline::new(PipelineConfig::default())
        .run("nothing", Vec::new())
        .await;
    assert!(matches!(result, Err(CoreError::EmptyInput { keyword }) if keyword == "nothing"));
}

#[tokio::test]
async fn test_posts_without_images() {
    let posts = vec![post("a", 3, 0), post("b", 9, 0)];
    let output = ReviewPipeline::new(PipelineConfig::default())
        .run("noodles", posts)
        .await
        .unwrap();
    assert!(output.images.is_empty());
    assert_eq!(output.provenance.images, ImageProvenance::Heuristic);
    assert!(!output.content.is_empty());
}

#[tokio::test]
async fn test_runs_from_repository() {
    let store = JsonPostStore::from_posts(scenario_posts());
    let pipeline = ReviewPipeline::new(PipelineConfig {
        max_posts: 2,
        ..config(9)
    });

    let output = pipeline
        .run_from_repository(&store, "Bull BBQ")
        .await
        .unwrap();
    assert_eq!(output.post_count, 2);
    assert_eq!(output.top_posts[0].title, "top ribs");
    assert_selection_contract(&output, 9, 4);

    let json = serde_json::to_string(&output).unwrap();
    let back: GeneratedOutput = serde_json::from_str(&json).unwrap();
    assert_eq!(back, output);
}
