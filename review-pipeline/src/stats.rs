use reviewgen_core::WorkingSet;
use serde::Serialize;
use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "was", "were", "are", "is", "it", "its", "of",
    "to", "in", "on", "at", "an", "be", "we", "so", "but", "not", "you", "our", "my", "they",
    "have", "had", "has", "very", "just", "really", "too", "also", "from", "there", "here",
    "all", "can", "will", "would", "what", "when", "which", "who", "out", "up", "if", "or",
    "as", "by", "me", "us", "your", "their", "them", "do", "did", "no", "yes", "one", "get",
    "got", "been", "more", "than", "then", "some", "about", "into", "only", "again",
];

const STOP_BIGRAMS: &[&str] = &[
    "我们", "一个", "这个", "那个", "就是", "真的", "非常", "还是", "没有", "可以", "自己",
    "什么", "已经", "因为", "所以", "但是", "而且", "如果", "觉得", "大家", "一下", "一起",
    "不是", "还有", "这家", "这里", "时候", "今天",
];

const TASTE_CUES: &[&str] = &[
    "好吃", "美味", "香", "嫩", "鲜", "口感", "delicious", "tasty", "flavor", "flavour", "juicy",
    "tender", "fresh",
];
const SERVICE_CUES: &[&str] = &[
    "服务", "态度", "热情", "service", "staff", "friendly", "waiter", "attentive",
];
const AMBIENCE_CUES: &[&str] = &[
    "环境", "装修", "氛围", "店面", "ambience", "ambiance", "atmosphere", "decor", "cozy", "vibe",
];
const VALUE_CUES: &[&str] = &[
    "划算", "便宜", "实惠", "性价比", "price", "value", "cheap", "affordable", "worth",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

/// How many posts mention each review aspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AspectSignals {
    pub taste: usize,
    pub service: usize,
    pub ambience: usize,
    pub value: usize,
}

/// Aggregates shared by the AI prompt and the template renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewStats {
    pub post_count: usize,
    pub total_likes: u64,
    pub mean_likes: f64,
    pub max_likes: u64,
    pub top_terms: Vec<TermCount>,
    pub aspects: AspectSignals,
}

impl ReviewStats {
    pub fn from_working_set(working_set: &WorkingSet, top_terms: usize) -> Self {
        let post_count = working_set.len();
        let total_likes: u64 = working_set
            .iter()
            .map(|p| p.like_count)
            .fold(0u64, u64::saturating_add);
        let max_likes = working_set.iter().map(|p| p.like_count).max().unwrap_or(0);
        let mean_likes = if post_count == 0 {
            0.0
        } else {
            total_likes as f64 / post_count as f64
        };

        let texts: Vec<String> = working_set.iter().map(|p| p.full_text()).collect();

        Self {
            post_count,
            total_likes,
            mean_likes,
            max_likes,
            top_terms: top_terms_of(&texts, top_terms),
            aspects: aspects_of(&texts),
        }
    }

    /// Share of posts mentioning an aspect, in `0.0..=1.0`.
    pub fn mention_share(&self, mentions: usize) -> f64 {
        if self.post_count == 0 {
            0.0
        } else {
            mentions as f64 / self.post_count as f64
        }
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}')
}

/// Latin words of two or more characters, and overlapping bigrams of CJK runs.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut cjk_run: Vec<char> = Vec::new();

    let flush_word = |word: &mut String, tokens: &mut Vec<String>| {
        let lowered = word.to_lowercase();
        if lowered.chars().count() >= 2
            && !lowered.chars().all(|c| c.is_ascii_digit())
            && !STOP_WORDS.contains(&lowered.as_str())
        {
            tokens.push(lowered);
        }
        word.clear();
    };
    let flush_cjk = |run: &mut Vec<char>, tokens: &mut Vec<String>| {
        for pair in run.windows(2) {
            let bigram: String = pair.iter().collect();
            if !STOP_BIGRAMS.contains(&bigram.as_str()) {
                tokens.push(bigram);
            }
        }
        run.clear();
    };

    for c in text.chars() {
        if is_cjk(c) {
            flush_word(&mut word, &mut tokens);
            cjk_run.push(c);
        } else if c.is_alphanumeric() {
            flush_cjk(&mut cjk_run, &mut tokens);
            word.push(c);
        } else {
            flush_word(&mut word, &mut tokens);
            flush_cjk(&mut cjk_run, &mut tokens);
        }
    }
    flush_word(&mut word, &mut tokens);
    flush_cjk(&mut cjk_run, &mut tokens);

    tokens
}

/// Most frequent tokens, ties broken by first appearance.
fn top_terms_of(texts: &[String], n: usize) -> Vec<TermCount> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;
    for token in texts.iter().flat_map(|t| tokenize(t)) {
        let entry = counts.entry(token).or_insert_with(|| {
            order += 1;
            (0, order)
        });
        entry.0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(n)
        .map(|(term, count, _)| TermCount { term, count })
        .collect()
}

fn mentions(texts: &[String], cues: &[&str]) -> usize {
    texts
        .iter()
        .filter(|text| {
            let lowered = text.to_lowercase();
            cues.iter().any(|cue| lowered.contains(cue))
        })
        .count()
}

fn aspects_of(texts: &[String]) -> AspectSignals {
    AspectSignals {
        taste: mentions(texts, TASTE_CUES),
        service: mentions(texts, SERVICE_CUES),
        ambience: mentions(texts, AMBIENCE_CUES),
        value: mentions(texts, VALUE_CUES),
    }
}
