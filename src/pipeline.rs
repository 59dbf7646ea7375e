#![forbid(unsafe_code)]

//! End-to-end run: parse both references, gate on login, resolve the
//! collection, then fill the favorites list.
//!
//! Only three things abort a run: a reference that cannot be parsed, a login
//! that is not accepted (including incomplete cookies), and a collection that
//! resolves to nothing. Everything else is absorbed further down.

use tracing::info;

use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::login::LoginVerifier;
use crate::reference::{CollectionRef, ListRef, parse_collection_ref, parse_list_ref};
use crate::resolver::{CollectionResolver, ResolutionSource};
use crate::session::Session;
use crate::transfer::{TransferEngine, TransferOutcome};

#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub collection: CollectionRef,
    pub list: ListRef,
}

impl TransferPlan {
    pub fn parse(collection_input: &str, list_input: &str) -> TransferResult<Self> {
        Ok(Self {
            collection: parse_collection_ref(collection_input)?,
            list: parse_list_ref(list_input)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransferReport {
    pub plan: TransferPlan,
    pub source: ResolutionSource,
    pub outcome: TransferOutcome,
}

pub struct Pipeline<'a> {
    session: &'a Session,
    config: &'a TransferConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(session: &'a Session, config: &'a TransferConfig) -> Self {
        Self { session, config }
    }

    pub fn run(&self, collection_input: &str, list_input: &str) -> TransferResult<TransferReport> {
        let plan = TransferPlan::parse(collection_input, list_input)?;
        self.execute(plan)
    }

    pub fn execute(&self, plan: TransferPlan) -> TransferResult<TransferReport> {
        self.session.credential().ensure_complete()?;
        if !LoginVerifier::new(self.session, self.config).verify() {
            return Err(TransferError::authentication(
                "the service did not accept the supplied cookies",
            ));
        }

        info!(
            owner = %plan.collection.owner_id,
            collection = %plan.collection.collection_id,
            list = %plan.list.list_id,
            "starting transfer"
        );

        let resolution = CollectionResolver::new(self.session, self.config).resolve(&plan.collection);
        let Some(source) = resolution.source.filter(|_| !resolution.is_empty()) else {
            return Err(TransferError::EmptyCollection {
                owner_id: plan.collection.owner_id.clone(),
                collection_id: plan.collection.collection_id.clone(),
            });
        };

        let outcome =
            TransferEngine::new(self.session, self.config).transfer(&plan.list, &resolution.records);
        Ok(TransferReport {
            plan,
            source,
            outcome,
        })
    }
}
