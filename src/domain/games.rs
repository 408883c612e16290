//! Game input validation.

use serde::Deserialize;

use super::{error::DomainError, fields, slug::derive_slug};

/// Untrusted game fields as submitted by a form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameForm {
    pub title: Option<String>,
    pub tagline: Option<String>,
    pub best_for: Option<String>,
    pub players: Option<String>,
    pub play_time: Option<String>,
    pub teach_time: Option<String>,
    pub energy: Option<String>,
    pub brain_space: Option<String>,
    pub spice_level: Option<String>,
    pub why: Option<String>,
    pub when_to_skip: Option<String>,
    pub how_to_pitch: Option<String>,
    pub additional_notes: Option<String>,
    pub conversation_spark: Option<String>,
    pub notes: Option<String>,
    pub link: Option<String>,
}

/// Validated game fields, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInput {
    pub slug: String,
    pub title: String,
    pub tagline: Option<String>,
    pub best_for: Option<String>,
    pub players: Option<String>,
    pub play_time: Option<String>,
    pub teach_time: Option<String>,
    pub energy: Option<String>,
    pub brain_space: Option<String>,
    pub spice_level: Option<String>,
    pub why: Option<String>,
    pub when_to_skip: Option<String>,
    pub how_to_pitch: Option<String>,
    pub additional_notes: Option<String>,
    pub conversation_spark: Option<String>,
    pub notes: Option<String>,
    pub link: Option<String>,
}

impl TryFrom<GameForm> for GameInput {
    type Error = DomainError;

    fn try_from(form: GameForm) -> Result<Self, Self::Error> {
        let title = fields::required(form.title, "title")?;
        let slug = derive_slug(&title)?;

        Ok(Self {
            slug,
            title,
            tagline: fields::optional(form.tagline),
            best_for: fields::optional(form.best_for),
            players: fields::optional(form.players),
            play_time: fields::optional(form.play_time),
            teach_time: fields::optional(form.teach_time),
            energy: fields::optional(form.energy),
            brain_space: fields::optional(form.brain_space),
            spice_level: fields::optional(form.spice_level),
            why: fields::optional(form.why),
            when_to_skip: fields::optional(form.when_to_skip),
            how_to_pitch: fields::optional(form.how_to_pitch),
            additional_notes: fields::optional(form.additional_notes),
            conversation_spark: fields::optional(form.conversation_spark),
            notes: form.notes.filter(|notes| !notes.trim().is_empty()),
            link: fields::link(form.link)?,
        })
    }
}
