//! Bot classification.
//!
//! A [`BotClassifier`] assigns each request a [`BotCategory`]; the active
//! [`BotAllowList`] for the operating mode decides whether that category
//! may proceed. Humans are always allowed.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::schema::BotConfig;
use crate::protection::mode::OperatingMode;
use crate::protection::{ProtectedRequest, RuleFault};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotCategory {
    Human,
    SearchEngine,
    Preview,
    Monitor,
    /// HTTP client libraries and API tools (curl, Postman, python-requests).
    Api,
    /// Headless browsers, generic crawlers, and requests with no user agent.
    Automated,
    AiCrawler,
}

impl BotCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotCategory::Human => "human",
            BotCategory::SearchEngine => "search_engine",
            BotCategory::Preview => "preview",
            BotCategory::Monitor => "monitor",
            BotCategory::Api => "api",
            BotCategory::Automated => "automated",
            BotCategory::AiCrawler => "ai_crawler",
        }
    }
}

impl fmt::Display for BotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait BotClassifier: Send + Sync {
    async fn classify(&self, request: &ProtectedRequest) -> Result<BotCategory, RuleFault>;
}

/// Categories allowed through the bot rule in one operating mode.
#[derive(Debug, Clone)]
pub struct BotAllowList {
    allowed: HashSet<BotCategory>,
}

impl BotAllowList {
    /// Configured allow-list plus the observe extras when `mode` is observe.
    pub fn for_mode(mode: OperatingMode, config: &BotConfig) -> Self {
        let mut allowed: HashSet<BotCategory> = config.allow.iter().copied().collect();
        if mode == OperatingMode::Observe {
            allowed.extend(config.observe_allow.iter().copied());
        }
        allowed.insert(BotCategory::Human);
        Self { allowed }
    }

    /// Whether `category` passes the bot rule.
    pub fn permits(&self, category: BotCategory) -> bool {
        self.allowed.contains(&category)
    }
}

// Ordered: the first matching group wins. All needles are lowercase.
// The generic `bot` needles carry a delimiter so device names such as
// "CUBOT" in handset user agents do not match.
const SIGNATURES: &[(BotCategory, &[&str])] = &[
    (
        BotCategory::AiCrawler,
        &["gptbot", "chatgpt-user", "ccbot", "claudebot", "anthropic-ai", "bytespider", "perplexitybot", "google-extended"],
    ),
    (
        BotCategory::SearchEngine,
        &["googlebot", "bingbot", "duckduckbot", "yandexbot", "baiduspider", "applebot", "slurp"],
    ),
    (
        BotCategory::Preview,
        &["facebookexternalhit", "twitterbot", "slackbot", "discordbot", "linkedinbot", "telegrambot", "whatsapp", "embedly"],
    ),
    (
        BotCategory::Monitor,
        &["uptimerobot", "pingdom", "statuscake", "datadog", "newrelicpinger", "site24x7", "better uptime"],
    ),
    (
        BotCategory::Api,
        &["curl/", "wget/", "postmanruntime", "insomnia", "httpie", "python-requests", "python-urllib", "aiohttp", "axios/", "node-fetch", "undici", "go-http-client", "okhttp", "java/", "reqwest", "libwww-perl"],
    ),
    (
        BotCategory::Automated,
        &["headlesschrome", "phantomjs", "selenium", "puppeteer", "playwright", "scrapy", "crawler", "spider", "scraper", "bot/", "bot;", "bot)", "bot-", "-bot", "_bot"],
    ),
];

/// Classifies by `User-Agent` substring signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAgentClassifier;

impl UserAgentClassifier {
    /// Classify a raw `User-Agent` value. Missing or blank is `Automated`.
    pub fn categorize(user_agent: Option<&str>) -> BotCategory {
        let ua = match user_agent.map(str::trim) {
            Some(ua) if !ua.is_empty() => ua.to_ascii_lowercase(),
            _ => return BotCategory::Automated,
        };
        SIGNATURES
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| ua.contains(n)))
            .map(|(category, _)| *category)
            .unwrap_or(BotCategory::Human)
    }
}

#[async_trait]
impl BotClassifier for UserAgentClassifier {
    async fn classify(&self, request: &ProtectedRequest) -> Result<BotCategory, RuleFault> {
        Ok(Self::categorize(request.context.user_agent.as_deref()))
    }
}
