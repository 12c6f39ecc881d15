//! Inclusion and exclusion rules.
//!
//! Stages run in a fixed order:
//!
//! 1. description keywords: a posting whose description contains a banned
//!    word is rejected; rejected postings are persisted separately
//! 2. title exclude
//! 3. title include (only when the list is non-empty)
//! 4. language (only when the allow-list is non-empty)
//! 5. company exclude
//!
//! Stage 1 decides which table a new posting lands in. Stages 2–5 are
//! applied live whenever the accepted set is read, against whatever the
//! config says at that moment.
//!
//! All matching is case-insensitive substring matching.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::config::Config;
use crate::models::JobPosting;

/// Language reported when detection fails.
pub const FALLBACK_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    desc_words: Vec<String>,
    title_exclude: Vec<String>,
    title_include: Vec<String>,
    company_exclude: Vec<String>,
    languages: Vec<String>,
}

fn normalize_words(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains_any(haystack: &str, words: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    words.iter().any(|w| haystack.contains(w.as_str()))
}

impl FilterRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            desc_words: normalize_words(&config.desc_words),
            title_exclude: normalize_words(&config.title_exclude),
            title_include: normalize_words(&config.title_include),
            company_exclude: normalize_words(&config.company_exclude),
            languages: normalize_words(&config.languages),
        }
    }

    /// Stage 1.
    pub fn has_banned_words(&self, job: &JobPosting) -> bool {
        contains_any(&job.job_description, &self.desc_words)
    }

    /// Stage 2.
    pub fn passes_title_exclude(&self, job: &JobPosting) -> bool {
        !contains_any(&job.title, &self.title_exclude)
    }

    /// Stage 3.
    pub fn passes_title_include(&self, job: &JobPosting) -> bool {
        self.title_include.is_empty() || contains_any(&job.title, &self.title_include)
    }

    /// Stage 4. Detection runs only when an allow-list is configured.
    pub fn passes_language(&self, job: &JobPosting) -> bool {
        self.languages.is_empty() || self.language_allowed(&detect_language(&job.job_description))
    }

    /// Stage 5.
    pub fn passes_company_exclude(&self, job: &JobPosting) -> bool {
        !contains_any(&job.company, &self.company_exclude)
    }

    pub fn language_allowed(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language)
    }

    /// Stages 2–5, the rules re-applied on every read of the accepted set.
    pub fn passes_live(&self, job: &JobPosting) -> bool {
        self.passes_title_exclude(job)
            && self.passes_title_include(job)
            && self.passes_language(job)
            && self.passes_company_exclude(job)
    }

    /// Split new postings into `(accepted, rejected)` by stage 1.
    pub fn split_by_description(&self, jobs: Vec<JobPosting>) -> (Vec<JobPosting>, Vec<JobPosting>) {
        jobs.into_iter().partition(|job| !self.has_banned_words(job))
    }
}

/// Detect the language of `text` as an ISO 639-1 code.
///
/// Never fails: when nothing can be detected (empty or too-short text) the
/// result is [`FALLBACK_LANGUAGE`].
pub fn detect_language(text: &str) -> String {
    match whatlang::detect(text) {
        Some(info) => iso_639_1(info.lang().code()).to_string(),
        None => FALLBACK_LANGUAGE.to_string(),
    }
}

/// Map the detector's ISO 639-3 codes onto the two-letter codes used in
/// `languages`. Unmapped codes pass through unchanged.
fn iso_639_1(code: &str) -> &str {
    match code {
        "afr" => "af",
        "aka" => "ak",
        "amh" => "am",
        "ara" => "ar",
        "aze" => "az",
        "bel" => "be",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh-cn",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "he",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "hye" => "hy",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jv",
        "jpn" => "ja",
        "kan" => "kn",
        "kat" => "ka",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "mkd" => "mk",
        "mya" => "my",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "no",
        "ori" => "or",
        "pan" => "pa",
        "pes" => "fa",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "slv" => "sl",
        "sna" => "sn",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tuk" => "tk",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "uzb" => "uz",
        "vie" => "vi",
        "yid" => "yi",
        "zul" => "zu",
        other => other,
    }
}

/// Whether a source-reported `YYYY-MM-DD` date is parseable and no older
/// than `days` days before `now`.
pub fn within_window(date: &str, days: i64, now: NaiveDateTime) -> bool {
    let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return false;
    };
    let Some(midnight) = parsed.and_hms_opt(0, 0, 0) else {
        return false;
    };
    // A window reaching past the representable calendar has no lower bound.
    match TimeDelta::try_days(days).and_then(|span| now.checked_sub_signed(span)) {
        Some(cutoff) => midnight >= cutoff,
        None => true,
    }
}
