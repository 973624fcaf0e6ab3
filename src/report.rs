use reviewgen_core::{CoreError, GeneratedOutput};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

const RULE: &str = "==================================================";

/// `output_<keyword>.json`, spaces in the keyword replaced by `_`.
pub fn default_output_path(keyword: &str) -> PathBuf {
    PathBuf::from(format!("output_{}.json", keyword.trim().replace(' ', "_")))
}

pub fn render_console_report(output: &GeneratedOutput) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "{RULE}");
    let _ = writeln!(report, "Keyword: {}", output.keyword);
    let _ = writeln!(report, "Posts analysed: {}", output.post_count);
    let _ = writeln!(
        report,
        "Images selected: {} ({})",
        output.images.len(),
        output.provenance.images
    );
    let _ = writeln!(report, "Review text: {}", output.provenance.text);
    let _ = writeln!(report, "{RULE}");
    let _ = writeln!(report);
    let _ = writeln!(report, "{}", output.content);
    let _ = writeln!(report);

    if !output.images.is_empty() {
        let _ = writeln!(report, "Selected images:");
        for (i, url) in output.images.iter().enumerate() {
            let _ = writeln!(report, "  {}. {}", i + 1, url);
        }
        let _ = writeln!(report);
    }

    if !output.top_posts.is_empty() {
        let _ = writeln!(report, "Top posts:");
        for (i, post) in output.top_posts.iter().enumerate() {
            let _ = write!(report, "  {}. {} ({} likes)", i + 1, post.title, post.like_count);
            if let Some(url) = &post.url {
                let _ = write!(report, " {url}");
            }
            let _ = writeln!(report);
        }
    }

    report
}

pub async fn write_json(path: &Path, output: &GeneratedOutput) -> Result<(), CoreError> {
    let json = serde_json::to_string_pretty(output)?;
    tokio::fs::write(path, json).await?;
    info!("Saved review to {}", path.display());
    Ok(())
}
