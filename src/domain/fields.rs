//! Text normalization shared by the typed entity inputs.

use url::Url;

use super::error::DomainError;

/// Trim a required field, rejecting missing or blank values.
pub(crate) fn required(value: Option<String>, field: &'static str) -> Result<String, DomainError> {
    optional(value).ok_or(DomainError::missing(field))
}

/// Trim an optional field; blank values collapse to `None`.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Optional external link; only absolute http(s) URLs with a host are accepted.
pub(crate) fn link(value: Option<String>) -> Result<Option<String>, DomainError> {
    let Some(link) = optional(value) else {
        return Ok(None);
    };

    let parsed = Url::parse(&link)
        .map_err(|err| DomainError::validation("link", format!("not a valid url: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DomainError::validation(
            "link",
            "must use the http or https scheme",
        ));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(DomainError::validation("link", "must include a host"));
    }

    Ok(Some(link))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required(Some("  Azul ".into()), "title").unwrap(), "Azul");
        assert_eq!(
            required(Some("   ".into()), "title"),
            Err(DomainError::missing("title"))
        );
        assert_eq!(required(None, "title"), Err(DomainError::missing("title")));
    }

    #[test]
    fn link_requires_http_scheme() {
        assert_eq!(link(None).unwrap(), None);
        assert_eq!(link(Some(" ".into())).unwrap(), None);
        for rejected in [
            "javascript:alert(1)",
            "ftp://example.com/file",
            "http://",
            "https://",
            "http:// spaces here",
            "boardgamegeek.com",
        ] {
            assert!(link(Some(rejected.into())).is_err(), "`{rejected}` accepted");
        }
        assert_eq!(
            link(Some("https://boardgamegeek.com/boardgame/230802".into())).unwrap(),
            Some("https://boardgamegeek.com/boardgame/230802".into())
        );
    }
}
