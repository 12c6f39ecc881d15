use crate::models::{JobCard, JobPosting, StatusFlags};

/// Turn a scraped card into a canonical posting tagged with `source`.
///
/// All status flags start cleared; the description and load timestamp are
/// filled in later by the pipeline.
pub fn normalize(card: JobCard, source: &str) -> JobPosting {
    JobPosting {
        title: card.title,
        company: card.company,
        location: card.location,
        date: card.date,
        job_url: card.job_url,
        job_description: String::new(),
        source: source.to_string(),
        flags: StatusFlags::default(),
        date_loaded: None,
    }
}
