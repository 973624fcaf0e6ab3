use reviewgen_core::{
    CoreError, GeneratedOutput, GenerationResult, PostSummary, Provenance, SelectionResult,
    WorkingSet,
};
use std::collections::HashSet;

/// Posts listed in the output's `top_posts`.
pub const TOP_POSTS_LISTED: usize = 10;

/// Folds the stage results into the output record. `max_images` is the K the
/// selection ran with.
pub fn assemble(
    keyword: &str,
    working_set: &WorkingSet,
    selection: SelectionResult,
    generation: GenerationResult,
    max_images: usize,
) -> Result<GeneratedOutput, CoreError> {
    if working_set.is_empty() {
        return Err(CoreError::invariant("cannot assemble an empty working set"));
    }
    if selection.images.len() > max_images {
        return Err(CoreError::invariant(format!(
            "selection holds {} images, limit is {}",
            selection.images.len(),
            max_images
        )));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = selection.images.iter().find(|url| !seen.insert(url.as_str())) {
        return Err(CoreError::invariant(format!(
            "image selected twice: {dup}"
        )));
    }
    if generation.content.trim().is_empty() {
        return Err(CoreError::invariant("generated review text is empty"));
    }

    Ok(GeneratedOutput {
        keyword: keyword.to_string(),
        post_count: working_set.len(),
        images: selection.images,
        content: generation.content,
        provenance: Provenance {
            images: selection.provenance,
            text: generation.provenance,
        },
        top_posts: working_set
            .top(TOP_POSTS_LISTED)
            .iter()
            .map(PostSummary::from)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewgen_core::{ImageProvenance, Post, TextProvenance};

    fn working_set(n: u64) -> WorkingSet {
        WorkingSet::from_ranked(
            (0..n)
                .rev()
                .map(|i| Post::new(format!("p{i}"), i).with_title(format!("post {i}")))
                .collect(),
        )
        .unwrap()
    }

    fn selection(images: &[&str]) -> SelectionResult {
        SelectionResult {
            images: images.iter().map(|s| s.to_string()).collect(),
            provenance: ImageProvenance::Heuristic,
        }
    }

    fn generation(text: &str) -> GenerationResult {
        GenerationResult {
            content: text.to_string(),
            provenance: TextProvenance::Template,
        }
    }

    #[test]
    fn test_assembles_record() {
        let output = assemble(
            "ribs",
            &working_set(12),
            selection(&["http://a", "http://b"]),
            generation("review"),
            9,
        )
        .unwrap();

        assert_eq!(output.keyword, "ribs");
        assert_eq!(output.post_count, 12);
        assert_eq!(output.images, vec!["http://a", "http://b"]);
        assert_eq!(output.provenance.images, ImageProvenance::Heuristic);
        assert_eq!(output.provenance.text, TextProvenance::Template);
        assert_eq!(output.top_posts.len(), TOP_POSTS_LISTED);
        assert_eq!(output.top_posts[0].title, "post 11");
        assert_eq!(output.top_posts[0].like_count, 11);
    }

    #[test]
    fn test_rejects_broken_stage_results() {
        let set = working_set(2);

        let dup = assemble("k", &set, selection(&["http://a", "http://a"]), generation("x"), 9);
        assert!(matches!(dup, Err(CoreError::InvariantViolation { .. })));

        let too_many = assemble("k", &set, selection(&["http://a", "http://b"]), generation("x"), 1);
        assert!(matches!(too_many, Err(CoreError::InvariantViolation { .. })));

        let blank = assemble("k", &set, selection(&[]), generation("  "), 9);
        assert!(matches!(blank, Err(CoreError::InvariantViolation { .. })));
    }
}
