use crate::stats::ReviewStats;
use crate::template::{render_review, REVIEW_SECTIONS};
use llm_interface::{AiBackend, CompletionRequest, CompletionTask};
use reviewgen_core::{
    BackendError, ErrorReporter, GenerationResult, PipelineConfig, SelectionResult,
    TextProvenance, WorkingSet,
};
use serde::Serialize;
use tracing::{debug, info};

const REPORTER: ErrorReporter = ErrorReporter::new("text generator");
const TEMPLATE_FALLBACK: &str = "using template text";

const REVIEW_SYSTEM_PROMPT: &str =
    "You are an experienced restaurant reviewer writing for a popular review site. You write vivid, honest, well structured reviews.";

/// Writes the review text, through the backend when one is available and
/// through the template renderer otherwise.
#[derive(Debug, Clone)]
pub struct TextGenerator {
    sample_posts: usize,
    snippet_chars: usize,
    top_terms: usize,
}

#[derive(Serialize)]
struct ReviewContext<'a> {
    keyword: &'a str,
    stats: &'a ReviewStats,
    samples: Vec<SampleView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
}

#[derive(Serialize)]
struct SampleView {
    title: String,
    likes: u64,
    text: String,
}

impl Default for TextGenerator {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl TextGenerator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            sample_posts: config.sample_posts,
            snippet_chars: config.snippet_chars,
            top_terms: config.top_terms,
        }
    }

    /// Produces the review. `image_count` is the size of the selection the
    /// review will be published with; when the actual `selection` is known
    /// its length wins and its URLs are shown to the backend.
    pub async fn generate(
        &self,
        keyword: &str,
        working_set: &WorkingSet,
        selection: Option<&SelectionResult>,
        image_count: usize,
        backend: Option<&dyn AiBackend>,
    ) -> GenerationResult {
        let stats = ReviewStats::from_working_set(working_set, self.top_terms);
        let image_count = selection.map_or(image_count, |s| s.images.len());

        let Some(backend) = backend else {
            return self.render_template(keyword, &stats, image_count);
        };

        let request = self.review_request(keyword, working_set, &stats, selection, image_count);
        match backend.complete(&request).await {
            Ok(response) => {
                let content = response.trim();
                if content.is_empty() {
                    REPORTER.report_warning(
                        &BackendError::error(format!(
                            "'{}' returned an empty review",
                            backend.name()
                        )),
                        TEMPLATE_FALLBACK,
                    );
                    return self.render_template(keyword, &stats, image_count);
                }
                info!(
                    "Backend '{}' wrote a {} character review",
                    backend.name(),
                    content.chars().count()
                );
                GenerationResult {
                    content: content.to_string(),
                    provenance: TextProvenance::Ai,
                }
            }
            Err(e) => {
                REPORTER.report_warning(&e, TEMPLATE_FALLBACK);
                self.render_template(keyword, &stats, image_count)
            }
        }
    }

    pub fn render_template(
        &self,
        keyword: &str,
        stats: &ReviewStats,
        image_count: usize,
    ) -> GenerationResult {
        debug!("Rendering template review for '{}'", keyword);
        GenerationResult {
            content: render_review(keyword, stats, image_count),
            provenance: TextProvenance::Template,
        }
    }

    fn review_request(
        &self,
        keyword: &str,
        working_set: &WorkingSet,
        stats: &ReviewStats,
        selection: Option<&SelectionResult>,
        image_count: usize,
    ) -> CompletionRequest {
        let samples = working_set
            .top(self.sample_posts)
            .iter()
            .map(|post| SampleView {
                title: post.title.clone(),
                likes: post.like_count,
                text: post.snippet(self.snippet_chars),
            })
            .collect();
        let context = ReviewContext {
            keyword,
            stats,
            samples,
            images: selection.map(|s| s.images.as_slice()),
        };

        let sections = REVIEW_SECTIONS.join("\n");
        let prompt = format!(
            "Write a restaurant review of \"{keyword}\" based on {count} popular posts about it.\n\
             The most liked post has {max} likes and the average is {mean:.0}.\n\
             The review will be published with {image_count} photos.\n\
             \n\
             Requirements:\n\
             1. Start with a catchy, vivid title on its own line\n\
             2. Then use exactly these section headings, in this order, each on its own line:\n\
             {sections}\n\
             3. Give a star rating out of five after the taste, service, ambience and price headings\n\
             4. Keep a warm, personal tone with concrete details from the posts\n\
             5. End the verdict with a call to action and a line of hashtags\n\
             6. 200 to 300 words, no dashes and no ** formatting\n\
             \n\
             The statistics and sample posts are in the JSON block below.",
            count = stats.post_count,
            max = stats.max_likes,
            mean = stats.mean_likes,
        );

        CompletionRequest::new(CompletionTask::ReviewWriting, prompt)
            .with_system(REVIEW_SYSTEM_PROMPT)
            .with_context(serde_json::to_value(context).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reviewgen_core::{BackendError, ImageProvenance, Post};
    use std::sync::Mutex;

    struct FixedBackend {
        reply: Result<String, BackendError>,
        seen: Mutex<Option<CompletionRequest>>,
    }

    impl FixedBackend {
        fn new(reply: Result<String, BackendError>) -> Self {
            Self {
                reply,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl AiBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            self.reply.clone()
        }
    }

    fn working_set() -> WorkingSet {
        WorkingSet::from_ranked(vec![
            Post::new("a", 200)
                .with_title("Best ribs in town")
                .with_text("smoky ribs, friendly staff"),
            Post::new("b", 50).with_text("cozy decor and fair price"),
            Post::new("c", 10).with_text("ribs again"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_without_backend_renders_template() {
        let result = TextGenerator::default()
            .generate("Bull BBQ", &working_set(), None, 4, None)
            .await;
        assert_eq!(result.provenance, TextProvenance::Template);
        for heading in REVIEW_SECTIONS {
            assert!(result.content.contains(heading));
        }
        assert!(result.content.contains("4 photos attached."));
    }

    #[tokio::test]
    async fn test_backend_text_is_trimmed() {
        let backend = FixedBackend::new(Ok("  Ribs heaven!\n[Overall]\nGreat.  \n".to_string()));
        let result = TextGenerator::default()
            .generate("Bull BBQ", &working_set(), None, 2, Some(&backend))
            .await;
        assert_eq!(result.provenance, TextProvenance::Ai);
        assert_eq!(result.content, "Ribs heaven!\n[Overall]\nGreat.");

        let request = backend.seen.lock().unwrap().clone().unwrap();
        assert_eq!(request.task, CompletionTask::ReviewWriting);
        assert!(request.prompt.contains("Bull BBQ"));
        assert!(request.prompt.contains("[Taste & Presentation]"));
        let context = request.context.unwrap();
        assert_eq!(context["samples"].as_array().unwrap().len(), 3);
        assert_eq!(context["samples"][0]["likes"], 200);
        assert!(context.get("images").is_none());
    }

    #[tokio::test]
    async fn test_blank_or_failed_reply_falls_back() {
        let generator = TextGenerator::default();
        let expected = generator
            .generate("Bull BBQ", &working_set(), None, 2, None)
            .await;

        let blank = FixedBackend::new(Ok("   \n".to_string()));
        let result = generator
            .generate("Bull BBQ", &working_set(), None, 2, Some(&blank))
            .await;
        assert_eq!(result, expected);

        let failing = FixedBackend::new(Err(BackendError::Timeout { seconds: 60 }));
        let result = generator
            .generate("Bull BBQ", &working_set(), None, 2, Some(&failing))
            .await;
        assert_eq!(result, expected);
    }

    #[tokio::test]
    async fn test_known_selection_is_shared_with_backend() {
        let selection = SelectionResult {
            images: vec!["http://img/a1.jpg".to_string()],
            provenance: ImageProvenance::Ai,
        };
        let backend = FixedBackend::new(Ok("review".to_string()));
        TextGenerator::default()
            .generate("Bull BBQ", &working_set(), Some(&selection), 9, Some(&backend))
            .await;

        let request = backend.seen.lock().unwrap().clone().unwrap();
        assert!(request.prompt.contains("published with 1 photos"));
        assert_eq!(request.context.unwrap()["images"][0], "http://img/a1.jpg");
    }
}
