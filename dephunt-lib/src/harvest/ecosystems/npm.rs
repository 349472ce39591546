//! npm: cursor-paginated `_all_docs` listing, one document per package.

use super::{Discovery, RegistryClient, endpoint_url, fetch_json_at};
use crate::Result;
use crate::harvest::{FetchOutcome, IndexSnapshot, PackageId, Store};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PAGE_SIZE: usize = 1000;
const BULK_PROGRESS_KEY: &str = "indexes/bulk_progress.json";

#[derive(Debug, Deserialize)]
struct AllDocsPage {
    #[serde(default)]
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    id: String,
}

/// Last listing key recorded by a bulk crawl.
#[derive(Debug, Serialize, Deserialize)]
struct BulkProgress {
    last_key: String,
}

/// The listing key the previous crawl stopped at, if any.
pub(super) fn last_key(store: &Store) -> Result<Option<String>> {
    Ok(store.get::<BulkProgress>(BULK_PROGRESS_KEY)?.map(|p| p.last_key))
}

pub(super) async fn discover(discovery: &mut Discovery<'_>, snapshot: &mut IndexSnapshot) -> Result<()> {
    while snapshot.packages.len() < discovery.limit {
        let mut url = endpoint_url(&discovery.client.endpoints.npm_replicate, &["_all_docs"])?;
        {
            let mut query = url.query_pairs_mut();
            _ = query.append_pair("limit", &PAGE_SIZE.to_string());
            if let Some(key) = &snapshot.cursor {
                let start_key = serde_json::to_string(key).into_app_err("encoding npm start key")?;
                _ = query.append_pair("startkey", &start_key).append_pair("skip", "1");
            }
        }

        discovery.next_page().await;
        let page: AllDocsPage = discovery.client.fetcher.fetch_json(&url).await.into_result()?;

        let Some(last) = page.rows.last().map(|row| row.id.clone()) else {
            snapshot.complete = true;
            return discovery.checkpoint(snapshot);
        };

        snapshot.packages.extend(page.rows.into_iter().map(|row| PackageId::from(row.id)));
        snapshot.cursor = Some(last.clone());

        discovery.checkpoint(snapshot)?;
        discovery.store.put(BULK_PROGRESS_KEY, &BulkProgress { last_key: last })?;
    }

    Ok(())
}

pub(super) async fn fetch_metadata(client: &RegistryClient, id: &PackageId) -> FetchOutcome<Value> {
    fetch_json_at(client, &client.endpoints.npm_registry, &[id.as_str()]).await
}
