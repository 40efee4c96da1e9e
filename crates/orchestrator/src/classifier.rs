//! Intent classification.
//!
//! Classification runs in stages over the message text:
//!
//! 1. Commands: anchored patterns such as `help` or `use grok`. A match
//!    returns immediately with full confidence.
//! 2. Phrases: multi-word trigger phrases scored by specificity. A match at
//!    or above [`HIGH_CONFIDENCE`] skips the next stage.
//! 3. Keywords: exact and fuzzy (Jaro-Winkler) keyword hits.
//! 4. Fallback: used only when nothing above reached the minimum
//!    confidence; question-like text maps to `research`, anything else to
//!    `general_chat`.
//!
//! Entity recognizers run on every message regardless of stage. The
//! classifier holds no mutable state: the same input always produces the
//! same ranked output.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use strsim::jaro_winkler;

use crate::entities;

/// Known intent names.
pub mod intents {
    pub const CRYPTO_PRICE: &str = "crypto_price";
    pub const PORTFOLIO_ANALYSIS: &str = "portfolio_analysis";
    pub const PRICE_ALERT: &str = "price_alert";
    pub const RESEARCH: &str = "research";
    pub const GENERAL_CHAT: &str = "general_chat";
    pub const HELP: &str = "help";
    pub const SET_PREFERENCE: &str = "set_preference";
}

/// Confidence at which the phrase stage short-circuits the keyword stage.
pub const HIGH_CONFIDENCE: f64 = 0.9;

const DEFAULT_MIN_CONFIDENCE: f64 = 0.3;
const FUZZY_THRESHOLD: f64 = 0.9;
const FUZZY_MIN_LEN: usize = 5;
const FUZZY_WEIGHT: f64 = 0.75;
const ENTITY_BONUS: f64 = 0.05;
const QUESTION_FALLBACK: f64 = 0.35;
const CHAT_FALLBACK: f64 = 0.25;

static HELP_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:/?help|commands|what can you do)\s*[?!.]*\s*$").unwrap()
});

static PREFERENCE_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:use|prefer|switch to)\s+([a-z0-9_.-]+)(?:\s+(?:please|instead))?\s*[!.]*\s*$")
        .unwrap()
});

static RESET_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*reset\s+(?:my\s+)?preferences?\s*[!.]*\s*$").unwrap()
});

static QUESTION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:what|why|how|when|who|which|where|is|are|can|could|should|would|do|does|will)\b")
        .unwrap()
});

/// How an intent is served, cheapest first.
///
/// Used to break confidence ties: an intent answered by a command or a tool
/// needs fewer external calls than one answered by a generative provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backing {
    Command,
    Tool,
    Generative,
}

/// Which stage produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Command,
    Phrase,
    Keyword,
    Fallback,
}

/// One ranked classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub intent: String,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Entities extracted from the message, shared by every ranked result.
    pub entities: BTreeMap<String, String>,
    pub source: MatchSource,
}

impl IntentResult {
    /// Entities in the shape tools expect.
    pub fn entity_map(&self) -> HashMap<String, String> {
        self.entities
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(String::as_str)
    }
}

/// Trigger phrases and keywords for one intent.
#[derive(Debug, Clone)]
pub struct IntentRule {
    pub intent: &'static str,
    pub backing: Backing,
    pub phrases: Vec<&'static str>,
    pub keywords: Vec<&'static str>,
    /// Entity whose presence makes this intent more likely.
    pub expects: Option<&'static str>,
}

impl IntentRule {
    pub fn new(intent: &'static str, backing: Backing) -> Self {
        Self {
            intent,
            backing,
            phrases: Vec::new(),
            keywords: Vec::new(),
            expects: None,
        }
    }

    pub fn with_phrases(mut self, phrases: &[&'static str]) -> Self {
        self.phrases.extend_from_slice(phrases);
        self
    }

    pub fn with_keywords(mut self, keywords: &[&'static str]) -> Self {
        self.keywords.extend_from_slice(keywords);
        self
    }

    pub fn expecting(mut self, entity: &'static str) -> Self {
        self.expects = Some(entity);
        self
    }

    /// Best phrase score, if any phrase occurs in `normalized`.
    fn phrase_score(&self, normalized: &str) -> Option<f64> {
        let padded = format!(" {} ", normalized);
        self.phrases
            .iter()
            .filter(|phrase| padded.contains(&format!(" {} ", phrase)))
            .map(|phrase| {
                let words = phrase.split_whitespace().count().min(3) as f64;
                0.8 + 0.05 * words
            })
            .max_by(f64::total_cmp)
    }

    /// Score from keyword hits; fuzzy hits count for less than exact ones.
    fn keyword_score(&self, tokens: &[&str]) -> Option<f64> {
        let hits: f64 = self
            .keywords
            .iter()
            .map(|keyword| keyword_hit(keyword, tokens))
            .sum();
        (hits > 0.0).then(|| (0.25 + 0.15 * hits).min(0.8))
    }
}

fn keyword_hit(keyword: &str, tokens: &[&str]) -> f64 {
    let mut best: f64 = 0.0;
    for token in tokens {
        if *token == keyword || token.trim_end_matches('s') == keyword {
            return 1.0;
        }
        if token.len() >= FUZZY_MIN_LEN
            && keyword.len() >= FUZZY_MIN_LEN
            && jaro_winkler(token, keyword) >= FUZZY_THRESHOLD
        {
            best = FUZZY_WEIGHT;
        }
    }
    best
}

/// Lowercase, fold apostrophes and drop punctuation so phrases match on word boundaries.
fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' => '\'',
            c if c.is_alphanumeric() || c == '\'' || c == '$' || c == '.' => c,
            _ => ' ',
        })
        .collect();
    folded
        .split_whitespace()
        .map(|word| word.trim_matches('.'))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rule-based intent classifier with fuzzy keyword matching.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
    min_confidence: f64,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    /// Create a classifier with the built-in rules.
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    /// Set the confidence below which the fallback stage is used.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Add a rule, replacing any existing rule for the same intent.
    pub fn with_rule(mut self, rule: IntentRule) -> Self {
        self.rules.retain(|r| r.intent != rule.intent);
        self.rules.push(rule);
        self
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// How `intent` is served, if the classifier knows it.
    pub fn backing(&self, intent: &str) -> Option<Backing> {
        match intent {
            intents::HELP | intents::SET_PREFERENCE => Some(Backing::Command),
            _ => self.rules.iter().find(|r| r.intent == intent).map(|r| r.backing),
        }
    }

    /// Classify `text` into a ranked, non-empty list of intents.
    ///
    /// `context` is prior conversation text. It only supplies a `symbol`
    /// when the message itself names none ("and in EUR?").
    pub fn classify(&self, text: &str, context: Option<&str>) -> Vec<IntentResult> {
        let mut entities = entities::extract(text);
        if !entities.contains_key("symbol") {
            if let Some(context) = context {
                let prior = entities::extract(context);
                if let Some(symbol) = prior.get("symbol") {
                    entities.insert("symbol".to_string(), symbol.clone());
                }
            }
        }

        // 1. Commands
        if let Some(command) = self.match_command(text, &entities) {
            return vec![command];
        }

        let normalized = normalize(text);
        let tokens: Vec<&str> = normalized
            .split_whitespace()
            .map(|t| t.trim_start_matches('$'))
            .collect();

        // 2. Phrases
        let mut scores: Vec<(&IntentRule, f64, MatchSource)> = self
            .rules
            .iter()
            .filter_map(|rule| {
                rule.phrase_score(&normalized).map(|score| {
                    let score = self.with_entity_bonus(rule, score, &entities);
                    (rule, score, MatchSource::Phrase)
                })
            })
            .collect();

        let short_circuit = scores.iter().any(|(_, score, _)| *score >= HIGH_CONFIDENCE);

        // 3. Keywords
        if !short_circuit {
            for rule in &self.rules {
                let Some(score) = rule.keyword_score(&tokens) else {
                    continue;
                };
                let score = self.with_entity_bonus(rule, score, &entities);
                match scores.iter_mut().find(|(r, _, _)| r.intent == rule.intent) {
                    Some(existing) if existing.1 >= score => {}
                    Some(existing) => *existing = (rule, score, MatchSource::Keyword),
                    None => scores.push((rule, score, MatchSource::Keyword)),
                }
            }
        }

        let mut ranked: Vec<(Backing, IntentResult)> = scores
            .into_iter()
            .filter(|(_, score, _)| *score >= self.min_confidence)
            .map(|(rule, score, source)| {
                (
                    rule.backing,
                    IntentResult {
                        intent: rule.intent.to_string(),
                        confidence: score,
                        entities: entities.clone(),
                        source,
                    },
                )
            })
            .collect();

        // 4. Fallback
        if ranked.is_empty() {
            return vec![self.fallback(text, entities)];
        }

        ranked.sort_by(|(backing_a, a), (backing_b, b)| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| backing_a.cmp(backing_b))
                .then_with(|| a.intent.cmp(&b.intent))
        });
        ranked.into_iter().map(|(_, result)| result).collect()
    }

    /// Classify and return only the top result.
    pub fn classify_top(&self, text: &str, context: Option<&str>) -> IntentResult {
        let mut ranked = self.classify(text, context);
        // classify never returns an empty list
        ranked.swap_remove(0)
    }

    fn with_entity_bonus(
        &self,
        rule: &IntentRule,
        score: f64,
        entities: &BTreeMap<String, String>,
    ) -> f64 {
        let bonus = match rule.expects {
            Some(key) if entities.contains_key(key) => ENTITY_BONUS,
            _ => 0.0,
        };
        round2((score + bonus).min(1.0))
    }

    fn match_command(
        &self,
        text: &str,
        entities: &BTreeMap<String, String>,
    ) -> Option<IntentResult> {
        let command = |intent: &str, entities: BTreeMap<String, String>| IntentResult {
            intent: intent.to_string(),
            confidence: 1.0,
            entities,
            source: MatchSource::Command,
        };

        if HELP_COMMAND.is_match(text) {
            return Some(command(intents::HELP, entities.clone()));
        }
        if RESET_COMMAND.is_match(text) {
            let mut entities = entities.clone();
            entities.insert("reset".to_string(), "true".to_string());
            return Some(command(intents::SET_PREFERENCE, entities));
        }
        if let Some(caps) = PREFERENCE_COMMAND.captures(text) {
            let mut entities = entities.clone();
            entities.insert("provider".to_string(), caps[1].to_lowercase());
            return Some(command(intents::SET_PREFERENCE, entities));
        }
        None
    }

    fn fallback(&self, text: &str, entities: BTreeMap<String, String>) -> IntentResult {
        let is_question = text.trim_end().ends_with('?') || QUESTION_START.is_match(text);
        let (intent, confidence) = if is_question {
            (intents::RESEARCH, QUESTION_FALLBACK)
        } else {
            (intents::GENERAL_CHAT, CHAT_FALLBACK)
        };
        IntentResult {
            intent: intent.to_string(),
            confidence,
            entities,
            source: MatchSource::Fallback,
        }
    }
}

fn default_rules() -> Vec<IntentRule> {
    vec![
        IntentRule::new(intents::CRYPTO_PRICE, Backing::Tool)
            .with_phrases(&[
                "price of",
                "how much is",
                "current price",
                "spot price",
                "trading at",
                "price check",
            ])
            .with_keywords(&["price", "cost", "worth", "trading", "quote", "value", "rate"])
            .expecting("symbol"),
        IntentRule::new(intents::PORTFOLIO_ANALYSIS, Backing::Tool)
            .with_phrases(&[
                "my portfolio",
                "analyze my portfolio",
                "portfolio analysis",
                "my holdings",
                "how diversified",
            ])
            .with_keywords(&[
                "portfolio",
                "holdings",
                "allocation",
                "diversified",
                "diversification",
                "exposure",
                "rebalance",
            ])
            .expecting("holdings"),
        IntentRule::new(intents::PRICE_ALERT, Backing::Tool)
            .with_phrases(&[
                "alert me",
                "notify me",
                "let me know when",
                "set an alert",
                "price alert",
                "tell me when",
                "tell me if",
            ])
            .with_keywords(&["alert", "notify", "remind", "ping"])
            .expecting("amount"),
        IntentRule::new(intents::RESEARCH, Backing::Generative)
            .with_phrases(&[
                "tell me about",
                "what is",
                "explain",
                "why is",
                "why did",
                "what do you think",
                "should i buy",
                "should i sell",
                "news about",
            ])
            .with_keywords(&[
                "why",
                "explain",
                "research",
                "analysis",
                "news",
                "outlook",
                "forecast",
                "predict",
                "prediction",
                "bullish",
                "bearish",
                "compare",
                "fundamentals",
                "whitepaper",
            ]),
        IntentRule::new(intents::GENERAL_CHAT, Backing::Generative)
            .with_phrases(&[
                "hello",
                "hi",
                "hey",
                "good morning",
                "good evening",
                "thanks",
                "thank you",
                "how are you",
            ])
            .with_keywords(&["joke", "chat", "talk"]),
    ]
}
