use crate::assembler::assemble;
use crate::generator::TextGenerator;
use crate::ranker::PostRanker;
use crate::selector::ImageSelector;
use database::PostRepository;
use llm_interface::AiBackend;
use reviewgen_core::{CoreError, GeneratedOutput, PipelineConfig, Post};
use std::sync::Arc;
use tracing::{info, instrument};

/// One keyword in, one [`GeneratedOutput`] out.
///
/// Dropping the future returned by [`ReviewPipeline::run`] abandons any
/// in-flight backend calls; nothing partial is ever returned.
#[derive(Clone)]
pub struct ReviewPipeline {
    config: PipelineConfig,
    ranker: PostRanker,
    selector: ImageSelector,
    generator: TextGenerator,
    backend: Option<Arc<dyn AiBackend>>,
}

impl ReviewPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            ranker: PostRanker::new(config.max_posts),
            selector: ImageSelector::from_config(&config),
            generator: TextGenerator::from_config(&config),
            backend: None,
            config,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn AiBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_optional_backend(mut self, backend: Option<Arc<dyn AiBackend>>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetches the keyword's most liked posts and runs the pipeline on them.
    pub async fn run_from_repository(
        &self,
        repository: &dyn PostRepository,
        keyword: &str,
    ) -> Result<GeneratedOutput, CoreError> {
        let posts = repository
            .top_n_by_likes(keyword, self.config.max_posts)
            .await?;
        info!("Repository returned {} posts for '{}'", posts.len(), keyword);
        self.run(keyword, posts).await
    }

    #[instrument(skip(self, posts), fields(posts = posts.len()))]
    pub async fn run(&self, keyword: &str, posts: Vec<Post>) -> Result<GeneratedOutput, CoreError> {
        let working_set = self.ranker.rank(keyword, posts)?;
        let pool = self.selector.build_pool(&working_set);
        let backend = self.backend.as_deref();
        info!(
            "Working set of {} posts, {} candidate images",
            working_set.len(),
            pool.len()
        );

        let (selection, generation) = if self.config.sequential_captioning {
            let selection = self.selector.select(keyword, &pool, backend).await;
            let generation = self
                .generator
                .generate(
                    keyword,
                    &working_set,
                    Some(&selection),
                    selection.images.len(),
                    backend,
                )
                .await;
            (selection, generation)
        } else {
            let expected_images = self.selector.expected_len(&pool);
            tokio::join!(
                self.selector.select(keyword, &pool, backend),
                self.generator
                    .generate(keyword, &working_set, None, expected_images, backend),
            )
        };

        let output = assemble(
            keyword,
            &working_set,
            selection,
            generation,
            self.selector.k(),
        )?;
        info!(
            "Review for '{}' ready: {} images ({}), text ({})",
            keyword,
            output.images.len(),
            output.provenance.images,
            output.provenance.text
        );
        Ok(output)
    }
}
