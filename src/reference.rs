#![forbid(unsafe_code)]

//! Turns the URLs a user copies out of the browser into the identifiers the
//! catalog and list endpoints expect. Parsing never touches the network.

use url::Url;

use crate::error::{TransferError, TransferResult};

const SUPPORTED_COLLECTION_FORMS: &str = "supported forms:\n\
    1. https://space.bilibili.com/<owner id>/lists/<collection id>?type=season\n\
    2. https://space.bilibili.com/<owner id>/channel/seriesdetail?sid=<collection id>";

/// Owner and collection identifiers pulled out of a collection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    pub owner_id: String,
    pub collection_id: String,
}

/// Target favorites list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRef {
    pub list_id: String,
}

pub fn parse_collection_ref(input: &str) -> TransferResult<CollectionRef> {
    let url = parse_url(input)?;
    let segments = path_segments(&url);

    lists_path(&segments)
        .or_else(|| series_detail_path(&url, &segments))
        .or_else(|| generic_owner_path(&url, &segments))
        .ok_or_else(|| {
            TransferError::reference(format!(
                "no collection found in `{}`; {SUPPORTED_COLLECTION_FORMS}",
                input.trim()
            ))
        })
}

pub fn parse_list_ref(input: &str) -> TransferResult<ListRef> {
    let url = parse_url(input)?;
    query_value(&url, "fid")
        .map(|list_id| ListRef { list_id })
        .ok_or_else(|| {
            TransferError::reference(format!(
                "favorites URL `{}` has no `fid` parameter",
                input.trim()
            ))
        })
}

fn parse_url(input: &str) -> TransferResult<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TransferError::reference("input is empty"));
    }
    // Only a URL with a host counts; `space.bilibili.com/...` and `host:1/...`
    // are retried with an https scheme.
    match Url::parse(trimmed) {
        Ok(url) if url.has_host() => Ok(url),
        _ => Url::parse(&format!("https://{trimmed}")).map_err(|err| {
            TransferError::reference(format!("`{trimmed}` is not a URL: {err}"))
        }),
    }
}

fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|part| !part.is_empty()).collect())
        .unwrap_or_default()
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `.../{owner}/lists/{collection}` anywhere in the path.
fn lists_path(segments: &[&str]) -> Option<CollectionRef> {
    segments.windows(3).find_map(|window| match window {
        [owner, "lists", collection] if is_numeric(owner) && is_numeric(collection) => {
            Some(CollectionRef {
                owner_id: owner.to_string(),
                collection_id: collection.to_string(),
            })
        }
        _ => None,
    })
}

/// `.../{owner}/channel/seriesdetail?sid={collection}`.
fn series_detail_path(url: &Url, segments: &[&str]) -> Option<CollectionRef> {
    let owner = segments.windows(3).find_map(|window| match window {
        [owner, "channel", "seriesdetail"] if is_numeric(owner) => Some(*owner),
        _ => None,
    })?;
    let sid = query_value(url, "sid").filter(|sid| is_numeric(sid))?;
    Some(CollectionRef {
        owner_id: owner.to_string(),
        collection_id: sid,
    })
}

/// First path segment is the owner; the collection comes from `lists/{id}`
/// or from any `sid` query parameter.
fn generic_owner_path(url: &Url, segments: &[&str]) -> Option<CollectionRef> {
    let owner = segments.first().filter(|owner| is_numeric(owner))?;
    let collection_id = match segments {
        [_, "lists", collection, ..] if is_numeric(collection) => collection.to_string(),
        _ => query_value(url, "sid")?,
    };
    Some(CollectionRef {
        owner_id: owner.to_string(),
        collection_id,
    })
}
