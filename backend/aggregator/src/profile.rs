//! Profile reads — the on-chain DID/CID record hydrated with its
//! content-store document, backed by a last-known-good snapshot so a flaky
//! node does not blank out an already-seen profile.

use sqlx::SqlitePool;
use tracing::warn;

use crate::chain::ChainClient;
use crate::cid;
use crate::config::Config;
use crate::errors::Result;
use crate::ipfs::MetadataStore;
use crate::model::Profile;
use crate::store;

#[derive(Clone)]
pub struct ProfileService {
    chain: ChainClient,
    metadata: MetadataStore,
    pool: SqlitePool,
    config: Config,
}

impl ProfileService {
    pub fn new(
        chain: ChainClient,
        metadata: MetadataStore,
        pool: SqlitePool,
        config: Config,
    ) -> Self {
        Self {
            chain,
            metadata,
            pool,
            config,
        }
    }

    /// Load the profile registered under `address`.
    ///
    /// `Ok(None)` means the account genuinely has no profile.  A node
    /// failure falls back to the cached snapshot when one exists; only when
    /// there is nothing cached does the error surface.
    pub async fn load_profile(&self, address: &str) -> Result<Option<Profile>> {
        let resource = match self
            .chain
            .get_account_resource(address, &self.config.profile_resource_type())
            .await
        {
            Ok(resource) => resource,
            Err(e) => {
                if let Some(snapshot) = store::load_profile_snapshot(&self.pool, address).await? {
                    warn!("Profile read for {address} failed ({e}); serving snapshot");
                    return Ok(Some(snapshot));
                }
                return Err(e);
            }
        };

        let Some(resource) = resource else {
            return Ok(None);
        };

        let did = resource
            .get("did")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let profile_cid = resource.get("cid").map(cid::decode).unwrap_or_default();

        let mut profile = Profile {
            address: address.to_string(),
            did,
            cid: profile_cid.clone(),
            ..Profile::default()
        };

        if let Some(document) = self.metadata.resolve(&profile_cid).await {
            profile.name = document
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            profile.bio = document
                .get("bio")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            profile.skills = document
                .get("skills")
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
        }

        if let Err(e) = store::save_profile_snapshot(&self.pool, &profile).await {
            warn!("Profile snapshot write for {address} failed: {e}");
        }
        Ok(Some(profile))
    }
}
