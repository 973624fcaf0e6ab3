use crate::stats::ReviewStats;

/// Headings every review carries, in order, whichever path wrote it.
pub const REVIEW_SECTIONS: [&str; 6] = [
    "[Overall]",
    "[Taste & Presentation]",
    "[Service]",
    "[Ambience]",
    "[Price]",
    "[Verdict]",
];

const TASTE_PHRASES: [&str; 3] = [
    "Solid, honest cooking. Nothing flashy, but the plates arrive hot and well seasoned.",
    "The flavors land well and the plating clearly gets some care. Easy to see why people keep posting it.",
    "Outstanding. Every dish looks as good as it tastes, and the signature plates are worth the trip on their own.",
];

const SERVICE_PHRASES: [&str; 3] = [
    "Service is efficient and gets the job done.",
    "Staff are friendly and happy to recommend what to order.",
    "Service is a highlight: attentive, warm and quick to help without hovering.",
];

const AMBIENCE_PHRASES: [&str; 3] = [
    "A comfortable, no-frills room that suits a casual meal.",
    "Nicely decorated with good lighting, a pleasant place to sit with friends.",
    "The space has real character and great light. Bring your camera.",
];

const PRICE_PHRASES: [&str; 3] = [
    "Prices are in line with the area.",
    "Fair prices and generous portions, good value overall.",
    "Excellent value for money, hard to beat at this quality.",
];

/// Star count for a popularity signal: 3 for modest, 4 for popular, 5 for viral.
pub fn popularity_stars(mean_likes: f64) -> u8 {
    if mean_likes >= 1000.0 {
        5
    } else if mean_likes >= 100.0 {
        4
    } else {
        3
    }
}

/// Star count for the share of posts praising an aspect.
pub fn mention_stars(share: f64) -> u8 {
    if share >= 0.5 {
        5
    } else if share >= 0.2 {
        4
    } else {
        3
    }
}

fn star_bar(stars: u8) -> String {
    let stars = stars.min(5) as usize;
    format!("{}{}", "★".repeat(stars), "☆".repeat(5 - stars))
}

fn phrase(set: &[&'static str; 3], stars: u8) -> &'static str {
    set[(stars.clamp(3, 5) - 3) as usize]
}

fn hook_line(keyword: &str, max_likes: u64) -> String {
    if max_likes >= 10_000 {
        format!("{keyword} is the place everyone is talking about, and it lives up to it.")
    } else if max_likes >= 1_000 {
        format!("{keyword} is a crowd favourite that is worth the hype.")
    } else {
        format!("{keyword} is a local find that deserves more attention.")
    }
}

fn hashtag(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    format!("#{cleaned}")
}

/// Renders the review from aggregate statistics alone. Pure: the same
/// inputs always produce the same text.
pub fn render_review(keyword: &str, stats: &ReviewStats, image_count: usize) -> String {
    let taste_stars = popularity_stars(stats.mean_likes)
        .max(mention_stars(stats.mention_share(stats.aspects.taste)));
    let service_stars = mention_stars(stats.mention_share(stats.aspects.service));
    let ambience_stars = mention_stars(stats.mention_share(stats.aspects.ambience));
    let price_stars = mention_stars(stats.mention_share(stats.aspects.value));

    let mut lines = Vec::new();
    lines.push(format!("Trying {keyword}: this one really delivered!"));
    lines.push(String::new());

    lines.push(REVIEW_SECTIONS[0].to_string());
    lines.push(hook_line(keyword, stats.max_likes));
    let mut overall = format!(
        "I went through {} popular posts about it, the top one with {} likes.",
        stats.post_count, stats.max_likes
    );
    let highlights: Vec<&str> = stats
        .top_terms
        .iter()
        .take(5)
        .map(|t| t.term.as_str())
        .collect();
    if !highlights.is_empty() {
        overall.push_str(&format!(" People keep mentioning: {}.", highlights.join(", ")));
    }
    lines.push(overall);
    lines.push(String::new());

    let sections = [
        (REVIEW_SECTIONS[1], taste_stars, phrase(&TASTE_PHRASES, taste_stars)),
        (REVIEW_SECTIONS[2], service_stars, phrase(&SERVICE_PHRASES, service_stars)),
        (REVIEW_SECTIONS[3], ambience_stars, phrase(&AMBIENCE_PHRASES, ambience_stars)),
        (REVIEW_SECTIONS[4], price_stars, phrase(&PRICE_PHRASES, price_stars)),
    ];
    for (heading, stars, text) in sections {
        lines.push(format!("{heading} {}", star_bar(stars)));
        lines.push(text.to_string());
        lines.push(String::new());
    }

    lines.push(REVIEW_SECTIONS[5].to_string());
    let mut verdict = format!("All in all, {keyword} is well worth a visit. Already planning the next trip!");
    if image_count > 0 {
        verdict.push_str(&format!(" {image_count} photos attached."));
    }
    lines.push(verdict);

    let mut tags = vec![hashtag(keyword), "#FoodReview".to_string()];
    for term in stats.top_terms.iter().take(2) {
        let tag = hashtag(&term.term);
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    lines.push(tags.join(" "));

    lines.join("\n")
}
