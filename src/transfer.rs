#![forbid(unsafe_code)]

//! Adds resolved videos to a favorites list, one request per video.
//!
//! Requests are strictly sequential with a fixed pause in between; the
//! favorites endpoint rate-limits aggressively. A failed video is recorded
//! and the loop moves on; nothing is retried.

use std::collections::BTreeMap;
use std::thread;

use tracing::{info, warn};

use crate::api::{Envelope, FAV_DEAL_PATH, VIDEO_RESOURCE_TYPE};
use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::reference::ListRef;
use crate::resolver::VideoRecord;
use crate::session::{Pairs, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoStatus {
    Ok,
    Failed(String),
}

impl VideoStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, VideoStatus::Ok)
    }
}

/// Result for one input record, kept in input order for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub internal_id: i64,
    pub external_id: String,
    pub title: String,
    pub status: VideoStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    /// Keyed by `internal_id`. A video submitted twice keeps its last status.
    pub per_video_status: BTreeMap<i64, VideoStatus>,
    pub records: Vec<RecordOutcome>,
}

impl TransferOutcome {
    fn push(&mut self, record: &VideoRecord, status: VideoStatus) {
        if status.is_ok() {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.per_video_status
            .insert(record.internal_id, status.clone());
        self.records.push(RecordOutcome {
            internal_id: record.internal_id,
            external_id: record.external_id.clone(),
            title: record.title.clone(),
            status,
        });
    }

    pub fn status_of(&self, internal_id: i64) -> Option<&VideoStatus> {
        self.per_video_status.get(&internal_id)
    }
}

pub struct TransferEngine<'a> {
    session: &'a Session,
    config: &'a TransferConfig,
}

impl<'a> TransferEngine<'a> {
    pub fn new(session: &'a Session, config: &'a TransferConfig) -> Self {
        Self { session, config }
    }

    pub fn transfer(&self, list: &ListRef, records: &[VideoRecord]) -> TransferOutcome {
        let mut outcome = TransferOutcome::default();
        let total = records.len();
        let csrf = self.session.csrf_token();

        if csrf.is_empty() {
            warn!("no csrf token in cookies; refusing to modify favorites list");
            for record in records {
                outcome.push(
                    record,
                    VideoStatus::Failed("missing csrf token (bili_jct)".to_string()),
                );
            }
            return outcome;
        }

        info!("adding {total} videos to favorites list {}", list.list_id);
        let url = self.config.endpoint(FAV_DEAL_PATH);
        for (index, record) in records.iter().enumerate() {
            if index > 0 {
                self.pause();
            }
            let position = index + 1;
            let status = match self.add_one(&url, list, record, csrf) {
                Ok(()) => {
                    info!("[{position}/{total}] added: {}", record.title);
                    VideoStatus::Ok
                }
                Err(err) => {
                    warn!("[{position}/{total}] failed: {} - {err}", record.title);
                    VideoStatus::Failed(err.to_string())
                }
            };
            outcome.push(record, status);
        }

        info!(
            success = outcome.success_count,
            failed = outcome.failure_count,
            "transfer finished"
        );
        outcome
    }

    fn add_one(
        &self,
        url: &str,
        list: &ListRef,
        record: &VideoRecord,
        csrf: &str,
    ) -> TransferResult<()> {
        let form: Pairs = vec![
            ("rid", record.internal_id.to_string()),
            ("type", VIDEO_RESOURCE_TYPE.to_string()),
            ("add_media_ids", list.list_id.clone()),
            ("del_media_ids", String::new()),
            ("csrf", csrf.to_string()),
        ];
        let envelope = Envelope::decode(self.session.post(url, &form)?)?;
        if envelope.is_ok() {
            Ok(())
        } else {
            Err(TransferError::transport(envelope.describe()))
        }
    }

    fn pause(&self) {
        if !self.config.transfer_delay.is_zero() {
            thread::sleep(self.config.transfer_delay);
        }
    }
}
