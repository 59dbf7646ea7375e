#![forbid(unsafe_code)]

//! Collection resolution.
//!
//! A collection id from a URL can name a *season* or a *series*, and the
//! season endpoints are not always reliable. Resolution therefore walks an
//! ordered list of strategies and keeps the first one that produces videos:
//!
//! 1. paged season archive (`seasons_archives_list`, 30 per page)
//! 2. the owner's season listing, scanned for a matching season id
//! 3. the series archive (`series/archives`)
//!
//! Errors never leave this module; a failing strategy simply yields nothing.

use std::collections::HashSet;
use std::fmt;
use std::thread;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{Envelope, SEASON_ARCHIVES_PATH, SEASONS_SERIES_PATH, SERIES_ARCHIVES_PATH};
use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::reference::CollectionRef;
use crate::session::{Pairs, Session};

pub const ARCHIVE_PAGE_SIZE: usize = 30;
pub const SEASON_LISTING_PAGE_SIZE: usize = 10;
pub const SERIES_PAGE_SIZE: usize = 30;
/// Upper bound on season archive pages fetched in one resolution.
pub const MAX_ARCHIVE_PAGES: usize = 200;

/// A single video as the rest of the pipeline sees it. `internal_id` (the
/// numeric aid) is the identity; `external_id` (the BV id) is for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub external_id: String,
    pub internal_id: i64,
    pub title: String,
    pub thumbnail_url: String,
    pub duration_seconds: i64,
}

impl VideoRecord {
    pub fn from_entry(entry: &Value) -> TransferResult<Self> {
        Ok(Self {
            external_id: string_field(entry, "bvid")?,
            internal_id: integer_field(entry, "aid")?,
            title: string_field(entry, "title")?,
            thumbnail_url: string_field(entry, "pic")?,
            duration_seconds: integer_field(entry, "duration")?,
        })
    }
}

fn string_field(entry: &Value, field: &'static str) -> TransferResult<String> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(TransferError::RecordFieldMissing { field })
}

/// Accepts JSON numbers and numeric strings; some endpoints quote ids.
fn integer_field(entry: &Value, field: &'static str) -> TransferResult<i64> {
    match entry.get(field) {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    }
    .ok_or(TransferError::RecordFieldMissing { field })
}

/// Normalizes raw archive entries, logging and dropping the malformed ones.
pub fn normalize_entries(entries: &[Value]) -> Vec<VideoRecord> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match VideoRecord::from_entry(entry) {
            Ok(record) => {
                debug!(bvid = %record.external_id, title = %record.title, "found video");
                Some(record)
            }
            Err(err) => {
                warn!("skipping catalog entry #{index}: {err}");
                None
            }
        })
        .collect()
}

/// Keeps the first occurrence of every `internal_id`.
pub fn dedupe_records(records: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.internal_id))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    SeasonArchive,
    OwnerSeasonListing,
    SeriesArchive,
}

impl ResolutionSource {
    pub const ORDER: [ResolutionSource; 3] = [
        ResolutionSource::SeasonArchive,
        ResolutionSource::OwnerSeasonListing,
        ResolutionSource::SeriesArchive,
    ];
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResolutionSource::SeasonArchive => "season archive",
            ResolutionSource::OwnerSeasonListing => "owner season listing",
            ResolutionSource::SeriesArchive => "series archive",
        };
        f.write_str(label)
    }
}

/// Records plus the strategy that produced them. `source` is `None` when
/// every strategy came back empty.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub source: Option<ResolutionSource>,
    pub records: Vec<VideoRecord>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct CollectionResolver<'a> {
    session: &'a Session,
    config: &'a TransferConfig,
}

impl<'a> CollectionResolver<'a> {
    pub fn new(session: &'a Session, config: &'a TransferConfig) -> Self {
        Self { session, config }
    }

    pub fn resolve(&self, collection: &CollectionRef) -> Resolution {
        info!(
            owner = %collection.owner_id,
            collection = %collection.collection_id,
            "resolving collection"
        );
        for source in ResolutionSource::ORDER {
            let records = match self.run_strategy(source, collection) {
                Ok(records) => records,
                Err(err) => {
                    warn!("{source} failed: {err}");
                    continue;
                }
            };
            if records.is_empty() {
                info!("{source} returned no videos");
                continue;
            }
            let records = if self.config.dedupe {
                dedupe_records(records)
            } else {
                records
            };
            info!("{source} returned {} videos", records.len());
            return Resolution {
                source: Some(source),
                records,
            };
        }
        Resolution::default()
    }

    pub fn run_strategy(
        &self,
        source: ResolutionSource,
        collection: &CollectionRef,
    ) -> TransferResult<Vec<VideoRecord>> {
        match source {
            ResolutionSource::SeasonArchive => self.season_archive(collection),
            ResolutionSource::OwnerSeasonListing => self.owner_season_listing(collection),
            ResolutionSource::SeriesArchive => self.series_archive(collection),
        }
    }

    /// Pages through the season archive until a short or empty page. A
    /// failure on the first page fails the strategy; a later failure keeps
    /// what was already collected.
    fn season_archive(&self, collection: &CollectionRef) -> TransferResult<Vec<VideoRecord>> {
        let url = self.config.endpoint(SEASON_ARCHIVES_PATH);
        let headers: Pairs = vec![(
            "Referer",
            format!(
                "https://space.bilibili.com/{}/channel/seriesdetail?sid={}",
                collection.owner_id, collection.collection_id
            ),
        )];
        let mut records = Vec::new();
        let mut page = 1usize;

        loop {
            let params: Pairs = vec![
                ("mid", collection.owner_id.clone()),
                ("season_id", collection.collection_id.clone()),
                ("sort_reverse", "false".to_string()),
                ("page_num", page.to_string()),
                ("page_size", ARCHIVE_PAGE_SIZE.to_string()),
            ];
            let entries = match self.fetch_archive_page(&url, &params, &headers) {
                Ok(entries) => entries,
                Err(err) if page == 1 => return Err(err),
                Err(err) => {
                    warn!("season archive page {page} failed, keeping {} videos: {err}", records.len());
                    break;
                }
            };
            if entries.is_empty() {
                break;
            }
            let full_page = entries.len() >= ARCHIVE_PAGE_SIZE;
            records.extend(normalize_entries(&entries));
            if !full_page {
                break;
            }
            if page >= MAX_ARCHIVE_PAGES {
                warn!(
                    "season archive still full after {page} pages, stopping with {} videos",
                    records.len()
                );
                break;
            }
            page += 1;
            self.pause();
        }

        Ok(records)
    }

    fn fetch_archive_page(
        &self,
        url: &str,
        params: &Pairs,
        headers: &Pairs,
    ) -> TransferResult<Vec<Value>> {
        let data = Envelope::decode(self.session.get(url, params, headers)?)?.into_data()?;
        match data.get("archives") {
            Some(Value::Array(entries)) => Ok(entries.clone()),
            Some(Value::Null) => Ok(Vec::new()),
            _ => Err(TransferError::transport("response has no `archives` list")),
        }
    }

    /// Scans the first page of the owner's seasons for the collection id and
    /// returns the archives embedded in that season, unpaginated.
    fn owner_season_listing(
        &self,
        collection: &CollectionRef,
    ) -> TransferResult<Vec<VideoRecord>> {
        let url = self.config.endpoint(SEASONS_SERIES_PATH);
        let params: Pairs = vec![
            ("mid", collection.owner_id.clone()),
            ("page_num", "1".to_string()),
            ("page_size", SEASON_LISTING_PAGE_SIZE.to_string()),
        ];
        let data =
            Envelope::decode(self.session.get(&url, &params, &Pairs::new())?)?.into_data()?;
        let seasons = data
            .pointer("/items_lists/seasons_list")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let target = seasons.iter().find(|season| {
            season
                .pointer("/meta/season_id")
                .map(id_to_string)
                .is_some_and(|id| id == collection.collection_id)
        });
        let Some(season) = target else {
            debug!(
                "season {} not among {} listed seasons",
                collection.collection_id,
                seasons.len()
            );
            return Ok(Vec::new());
        };
        let entries = season
            .get("archives")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(normalize_entries(entries))
    }

    /// Treats the collection id as a series id. Single page, newest first.
    fn series_archive(&self, collection: &CollectionRef) -> TransferResult<Vec<VideoRecord>> {
        let url = self.config.endpoint(SERIES_ARCHIVES_PATH);
        let params: Pairs = vec![
            ("mid", collection.owner_id.clone()),
            ("series_id", collection.collection_id.clone()),
            ("only_normal", "true".to_string()),
            ("sort", "desc".to_string()),
            ("pn", "1".to_string()),
            ("ps", SERIES_PAGE_SIZE.to_string()),
        ];
        let data =
            Envelope::decode(self.session.get(&url, &params, &Pairs::new())?)?.into_data()?;
        let entries = data
            .get("archives")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(normalize_entries(entries))
    }

    fn pause(&self) {
        if !self.config.page_delay.is_zero() {
            thread::sleep(self.config.page_delay);
        }
    }
}

fn id_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}
