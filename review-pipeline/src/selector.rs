use llm_interface::{AiBackend, CompletionRequest, CompletionTask};
use reviewgen_core::{
    BackendError, CandidatePool, ErrorReporter, ImageCandidate, ImageProvenance, PipelineConfig,
    SelectionResult, WorkingSet,
};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

const REPORTER: ErrorReporter = ErrorReporter::new("image selector");
const HEURISTIC_FALLBACK: &str = "using heuristic selection";

const CURATION_SYSTEM_PROMPT: &str =
    "You are a food photography curator. You only ever answer with image URLs taken from the candidates you are given.";

/// Picks at most `k` images from the working set, asking the backend first and
/// falling back to a round-robin over the most liked posts.
#[derive(Debug, Clone)]
pub struct ImageSelector {
    k: usize,
    per_post_cap: usize,
    prompt_candidate_limit: usize,
    snippet_chars: usize,
}

#[derive(Serialize)]
struct CurationContext<'a> {
    theme: &'a str,
    max_images: usize,
    candidates: Vec<CandidateView<'a>>,
}

#[derive(Serialize)]
struct CandidateView<'a> {
    url: &'a str,
    likes: u64,
    text: &'a str,
}

impl ImageSelector {
    pub fn new(k: usize, per_post_cap: usize) -> Self {
        Self {
            k,
            per_post_cap,
            prompt_candidate_limit: 30,
            snippet_chars: 100,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            k: config.max_images,
            per_post_cap: config.per_post_image_cap,
            prompt_candidate_limit: config.prompt_candidate_limit,
            snippet_chars: config.snippet_chars,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Flattens the working set's images in ranked order, at most
    /// `per_post_cap` per post, each URL once.
    pub fn build_pool(&self, working_set: &WorkingSet) -> CandidatePool {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for (rank, post) in working_set.iter().enumerate() {
            let snippet = post.snippet(self.snippet_chars);
            let fresh = post
                .image_urls
                .iter()
                .map(|url| url.trim())
                .filter(|url| !url.is_empty())
                .filter(|url| seen.insert(url.to_string()))
                .take(self.per_post_cap);

            for url in fresh {
                candidates.push(ImageCandidate {
                    url: url.to_string(),
                    source_rank: rank,
                    source_post_id: post.id.clone(),
                    source_like_count: post.like_count,
                    snippet: snippet.clone(),
                });
            }
        }

        CandidatePool::new(candidates)
    }

    /// Number of images any selection from `pool` will contain.
    pub fn expected_len(&self, pool: &CandidatePool) -> usize {
        self.k.min(pool.len())
    }

    pub async fn select(
        &self,
        keyword: &str,
        pool: &CandidatePool,
        backend: Option<&dyn AiBackend>,
    ) -> SelectionResult {
        let target = self.expected_len(pool);
        if target == 0 {
            debug!("No candidate images for '{}'", keyword);
            return SelectionResult {
                images: Vec::new(),
                provenance: ImageProvenance::Heuristic,
            };
        }

        let Some(backend) = backend else {
            return self.heuristic_selection(pool);
        };

        let request = self.curation_request(keyword, pool);
        match backend.complete(&request).await {
            Ok(response) => {
                let mut picked = parse_selection(&response, pool, self.k);
                if picked.is_empty() {
                    REPORTER.report_warning(
                        &BackendError::error(format!(
                            "'{}' returned no usable image URLs",
                            backend.name()
                        )),
                        HEURISTIC_FALLBACK,
                    );
                    return self.heuristic_selection(pool);
                }

                if picked.len() < target {
                    debug!(
                        "Backend picked {} of {} images, topping up from heuristic order",
                        picked.len(),
                        target
                    );
                    let chosen: HashSet<String> = picked.iter().cloned().collect();
                    let extra = heuristic_order(pool)
                        .into_iter()
                        .filter(|url| !chosen.contains(url))
                        .take(target - picked.len())
                        .collect::<Vec<_>>();
                    picked.extend(extra);
                }

                info!("Backend '{}' selected {} images", backend.name(), picked.len());
                SelectionResult {
                    images: picked,
                    provenance: ImageProvenance::Ai,
                }
            }
            Err(e) => {
                REPORTER.report_warning(&e, HEURISTIC_FALLBACK);
                self.heuristic_selection(pool)
            }
        }
    }

    pub fn heuristic_selection(&self, pool: &CandidatePool) -> SelectionResult {
        let mut images = heuristic_order(pool);
        images.truncate(self.k);
        SelectionResult {
            images,
            provenance: ImageProvenance::Heuristic,
        }
    }

    fn curation_request(&self, keyword: &str, pool: &CandidatePool) -> CompletionRequest {
        let context = CurationContext {
            theme: keyword,
            max_images: self.k,
            candidates: pool
                .iter()
                .take(self.prompt_candidate_limit)
                .map(|c| CandidateView {
                    url: &c.url,
                    likes: c.source_like_count,
                    text: &c.snippet,
                })
                .collect(),
        };

        let prompt = format!(
            "As a food image analyst, choose the {k} images that best fit the theme \"{keyword}\".\n\
             \n\
             Criteria:\n\
             1. The image is clearly about {keyword}\n\
             2. The image is sharp and well composed\n\
             3. The food looks appetizing: color, texture, freshness\n\
             4. The image would work on a restaurant review site\n\
             5. Prefer images from posts with more likes\n\
             \n\
             The candidates are listed in the JSON block below.\n\
             Answer with a JSON array of at most {k} URLs copied exactly from the candidates, best first, and nothing else.",
            k = self.k,
            keyword = keyword,
        );

        CompletionRequest::new(CompletionTask::ImageCuration, prompt)
            .with_system(CURATION_SYSTEM_PROMPT)
            .with_context(serde_json::to_value(context).unwrap_or_default())
    }
}

/// Round-robin over source posts in pool order: every post's first image,
/// then every post's second image, and so on.
pub fn heuristic_order(pool: &CandidatePool) -> Vec<String> {
    let mut groups: Vec<(usize, Vec<&str>)> = Vec::new();
    for candidate in pool.iter() {
        let existing = groups
            .iter()
            .position(|(rank, _)| *rank == candidate.source_rank);
        match existing {
            Some(index) => groups[index].1.push(candidate.url.as_str()),
            None => groups.push((candidate.source_rank, vec![candidate.url.as_str()])),
        }
    }

    let rounds = groups.iter().map(|(_, urls)| urls.len()).max().unwrap_or(0);
    let mut ordered = Vec::with_capacity(pool.len());
    for round in 0..rounds {
        for (_, urls) in &groups {
            if let Some(url) = urls.get(round) {
                ordered.push(url.to_string());
            }
        }
    }
    ordered
}

/// Reads the backend's answer into at most `k` unique pool URLs, in the
/// backend's order. Accepts a JSON array, a JSON object with an `images` or
/// `urls` array, or free text with URLs scattered over lines.
pub fn parse_selection(response: &str, pool: &CandidatePool, k: usize) -> Vec<String> {
    let raw = json_urls(response).unwrap_or_else(|| text_urls(response));

    let mut seen = HashSet::new();
    let mut picked = Vec::new();
    for candidate in raw {
        if picked.len() >= k {
            break;
        }
        let candidate = candidate.trim();
        if !is_well_formed(candidate) {
            debug!("Dropping malformed URL from backend: {}", candidate);
            continue;
        }
        if !pool.contains(candidate) {
            debug!("Dropping URL not in candidate pool: {}", candidate);
            continue;
        }
        if seen.insert(candidate.to_string()) {
            picked.push(candidate.to_string());
        }
    }
    picked
}

fn is_well_formed(candidate: &str) -> bool {
    matches!(Url::parse(candidate), Ok(url) if url.scheme() == "http" || url.scheme() == "https")
}

fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

fn json_urls(response: &str) -> Option<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(response)).ok()?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map
            .remove("images")
            .or_else(|| map.remove("urls"))
        {
            Some(serde_json::Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(url) => Some(url),
                serde_json::Value::Object(map) => map
                    .get("url")
                    .and_then(|u| u.as_str())
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
    )
}

fn next_url_start(text: &str) -> Option<usize> {
    match (text.find("http://"), text.find("https://")) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn text_urls(response: &str) -> Vec<String> {
    const DELIMITERS: &[char] = &['"', '\'', '<', '>', '(', ')', '[', ']', '`', ','];

    let mut urls = Vec::new();
    for line in response.lines() {
        let mut rest = line;
        while let Some(start) = next_url_start(rest) {
            let tail = &rest[start..];
            let end = tail
                .find(|c: char| c.is_whitespace() || DELIMITERS.contains(&c))
                .unwrap_or(tail.len());
            let url = tail[..end].trim_end_matches(['.', ';', '!', '?']);
            if !url.is_empty() {
                urls.push(url.to_string());
            }
            rest = &tail[end..];
        }
    }
    urls
}
