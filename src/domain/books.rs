//! Book input validation.

use serde::Deserialize;

use super::{error::DomainError, fields, slug::derive_slug};

/// Untrusted book fields as submitted by a form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookForm {
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub notes: Option<String>,
    pub link: Option<String>,
}

/// Validated book fields, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookInput {
    pub slug: String,
    pub title: String,
    pub author: String,
    pub summary: Option<String>,
    pub notes: Option<String>,
    pub link: Option<String>,
}

impl TryFrom<BookForm> for BookInput {
    type Error = DomainError;

    fn try_from(form: BookForm) -> Result<Self, Self::Error> {
        let title = fields::required(form.title, "title")?;
        let author = fields::required(form.author, "author")?;
        let slug = derive_slug(&title)?;

        Ok(Self {
            slug,
            title,
            author,
            summary: fields::optional(form.summary),
            // Notes are stored verbatim; they may carry intentional whitespace.
            notes: form.notes.filter(|notes| !notes.trim().is_empty()),
            link: fields::link(form.link)?,
        })
    }
}
