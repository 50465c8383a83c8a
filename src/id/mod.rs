//! Notion object id normalization
//!
//! Notion hands out the same id in several spellings: 32 bare hex digits in
//! share URLs, hyphenated UUIDs in API payloads, and page slugs such as
//! `Project-Plan-0123456789abcdef0123456789abcdef`. Everything that keys on
//! ids (the visited set, the result map, link tokens) uses the canonical form
//! produced here: lowercase, hyphenated 8-4-4-4-12.

use crate::HarvestError;

/// Number of hex digits in a Notion id
const ID_HEX_LEN: usize = 32;

/// Normalizes an id, URL, or slug into canonical hyphenated form
///
/// # Arguments
///
/// * `input` - A bare id, a hyphenated id, a page slug, or a Notion URL
///
/// # Returns
///
/// * `Ok(String)` - The canonical id
/// * `Err(HarvestError::InvalidId)` - No 32-digit hex id could be found
///
/// # Example
///
/// ```
/// use notion_harvest::id::normalize_id;
///
/// let url = "https://www.notion.so/acme/Plan-0123456789ABCDEF0123456789abcdef?pvs=4";
/// let id = normalize_id(url).unwrap();
/// assert_eq!(id, "01234567-89ab-cdef-0123-456789abcdef");
/// ```
pub fn normalize_id(input: &str) -> Result<String, HarvestError> {
    let trimmed = input.trim();

    // Last path segment without query or fragment
    let segment = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let segment = segment.split(['?', '#']).next().unwrap_or(segment);

    let digits: Vec<char> = segment.chars().filter(|c| *c != '-').collect();
    if digits.len() < ID_HEX_LEN {
        return Err(HarvestError::InvalidId(input.to_string()));
    }

    let tail = &digits[digits.len() - ID_HEX_LEN..];
    if !tail.iter().all(|c| c.is_ascii_hexdigit()) {
        return Err(HarvestError::InvalidId(input.to_string()));
    }

    // In a slug the id has to be contiguous at the very end
    if digits.len() > ID_HEX_LEN && !segment.ends_with(&tail.iter().collect::<String>()) {
        return Err(HarvestError::InvalidId(input.to_string()));
    }

    let hex: String = tail.iter().map(|c| c.to_ascii_lowercase()).collect();
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

/// Canonicalizes an id taken from an API payload
///
/// Payload ids are already well formed; anything that is not is kept
/// verbatim so it still round-trips through error messages.
pub fn canonical_id(raw: &str) -> String {
    normalize_id(raw).unwrap_or_else(|_| raw.trim().to_string())
}
