//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted category label.
const MAX_CATEGORY_LEN: usize = 50;

/// Validates a YouTube video id: 11 characters from the URL-safe base64 alphabet.
///
/// # Examples
///
/// ```ignore
/// validate_youtube_id("dQw4w9WgXcQ") // Ok
/// validate_youtube_id("dQw4w9WgXc")  // Err - too short
/// validate_youtube_id("dQw4w9WgX Q") // Err - space
/// ```
pub fn validate_youtube_id(id: &str) -> Result<(), ValidationError> {
    if id.len() != 11 {
        let mut err = ValidationError::new("youtube_id_length");
        err.message =
            Some(format!("YouTube id must be exactly 11 characters (got {})", id.len()).into());
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("youtube_id_format");
        err.message = Some("YouTube id may only contain letters, digits, '-' and '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a category label: not blank and reasonably short.
pub fn validate_category(category: &str) -> Result<(), ValidationError> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("category_blank");
        err.message = Some("Category must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_CATEGORY_LEN {
        let mut err = ValidationError::new("category_length");
        err.message =
            Some(format!("Category must be at most {MAX_CATEGORY_LEN} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Validates a title: 1 to 100 characters once trimmed.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let len = title.trim().chars().count();
    if !(1..=100).contains(&len) {
        let mut err = ValidationError::new("title_length");
        err.message = Some(format!("Title must be 1 to 100 characters (got {len})").into());
        return Err(err);
    }
    Ok(())
}

/// Validates an absolute `http`/`https` URL.
pub fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') && !url.contains(char::is_whitespace) => {
            Ok(())
        }
        _ => {
            let mut err = ValidationError::new("url");
            err.message = Some("Expected an absolute http(s) URL".into());
            Err(err)
        }
    }
}
