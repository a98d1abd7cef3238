//! Deterministic extraction of the customer a query is about.
//!
//! Explicit request fields always win. Otherwise the query text is scanned
//! for a customer identifier phrase, then for a company name.

use std::sync::LazyLock;

use dealdesk_core::{ApplicationError, CustomerId};
use regex::Regex;

static CUSTOMER_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcustomer(?:[\s_-]*id)?\s*(?:is\s+|[:=#]\s*)?#?\s*(\d+)\b")
        .expect("customer id regex")
});

/// A bare `id N`, with the word before it so deal and bid numbers can be told apart.
static BARE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b([\w-]+)\s+)?\bid\s*(?:is\s+|[:=#]\s*)?#?\s*(\d+)\b")
        .expect("bare id regex")
});

static QUOTED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["“]([^"”]+)["”]"#).expect("quoted span regex"));

static POSSESSIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:[A-Z][\w&.\-]*\s+){0,3}[\w&.\-]+)['’]s\b").expect("possessive regex")
});

static PREPOSITION_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    ["for", "about", "of"].map(|word| {
        Regex::new(&format!(r"(?i)\b{word}\s+([^?!,;]+)")).expect("preposition regex")
    })
});

const LEADING_FILLER: &[&str] = &[
    "a", "about", "an", "are", "can", "company", "could", "customer", "customers", "display",
    "fetch", "find", "for", "get", "give", "i", "is", "list", "look", "lookup", "me", "need",
    "of", "please", "pull", "retrieve", "see", "show", "tell", "the", "up", "us", "want",
    "what", "what's", "whats", "you",
];

/// Words whose `'s` is a contraction, not a possessive.
const CONTRACTION_STEMS: &[&str] = &[
    "he", "here", "how", "it", "let", "she", "that", "there", "what", "where", "who",
];

/// Nouns whose `id` is not a customer id.
const OTHER_ID_OWNERS: &[&str] = &[
    "account", "bid", "deal", "invoice", "opportunity", "order", "product", "quote",
    "transaction",
];

const TRAILING_FILLER: &[&str] = &[
    "account", "accounts", "bid", "bids", "customer", "data", "deal", "deals", "detail",
    "details", "i", "id", "info", "information", "need", "now", "number", "please", "record",
    "records", "status", "summary", "terms", "the", "want",
];

pub const CLARIFYING_QUESTION: &str = "Which customer do you mean? Please give a company \
     name (for example \"Show the deal for CompanyABC\") or a customer id \
     (for example \"customer id 7\").";

/// One inbound request to the deal agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DealRequest {
    pub query: String,
    pub customer_id: Option<CustomerId>,
    pub company_name: Option<String>,
}

/// Who the request is about, once explicit fields and query text are considered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Customer(CustomerId),
    Company(String),
    Unresolved,
}

impl DealRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), customer_id: None, company_name: None }
    }

    pub fn with_customer_id(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_company_name(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = Some(company_name.into());
        self
    }

    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.query.trim().is_empty() {
            return Err(ApplicationError::InvalidInput("Query cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn target(&self) -> Target {
        if let Some(customer_id) = self.customer_id {
            return Target::Customer(customer_id);
        }
        let explicit_name = self.company_name.as_deref().map(str::trim);
        if let Some(name) = explicit_name.filter(|name| !name.is_empty()) {
            return Target::Company(name.to_string());
        }
        if let Some(customer_id) = customer_id_in(&self.query) {
            return Target::Customer(customer_id);
        }
        match company_name_in(&self.query) {
            Some(name) => Target::Company(name),
            None => Target::Unresolved,
        }
    }
}

/// Finds phrases like `customer id 7`, `customer_id: 7`, `customer #7` or `id 7`.
/// `deal id 1000` and similar are not customer ids.
pub fn customer_id_in(text: &str) -> Option<CustomerId> {
    let labelled = CUSTOMER_ID_PATTERN.captures_iter(text).filter_map(|captures| captures.get(1));
    let bare = BARE_ID_PATTERN
        .captures_iter(text)
        .filter(|captures| {
            captures.get(1).map_or(true, |owner| {
                !OTHER_ID_OWNERS.iter().any(|word| word.eq_ignore_ascii_case(owner.as_str()))
            })
        })
        .filter_map(|captures| captures.get(2));

    labelled
        .chain(bare)
        .filter_map(|digits| digits.as_str().parse::<i64>().ok())
        .find_map(|raw| CustomerId::new(raw).ok())
}

/// Finds a company name: a quoted span, a possessive, or the words after
/// `for`/`about`/`of`.
pub fn company_name_in(text: &str) -> Option<String> {
    if let Some(name) = QUOTED_PATTERN
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|span| span.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
    {
        return Some(name);
    }

    if let Some(name) = POSSESSIVE_PATTERN
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .filter(|span| !is_contraction(span.as_str()))
        .find_map(|span| clean_company(span.as_str()))
    {
        return Some(name);
    }

    PREPOSITION_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(text)
            .filter_map(|captures| captures.get(1))
            .last()
            .and_then(|span| clean_company(span.as_str()))
    })
}

fn is_contraction(span: &str) -> bool {
    span.split_whitespace()
        .last()
        .is_some_and(|stem| CONTRACTION_STEMS.iter().any(|word| word.eq_ignore_ascii_case(stem)))
}

fn clean_company(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| matches!(c, '.' | ':' | '"' | '\'')))
        .filter(|word| !word.is_empty())
        .collect();

    let is_filler = |fillers: &[&str], word: &str| {
        fillers.iter().any(|filler| filler.eq_ignore_ascii_case(word))
    };
    let start = words.iter().position(|word| !is_filler(LEADING_FILLER, *word))?;
    let end = words.iter().rposition(|word| !is_filler(TRAILING_FILLER, *word))?;
    if end < start {
        return None;
    }

    Some(words[start..=end].join(" "))
}
