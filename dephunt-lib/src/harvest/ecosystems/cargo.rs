//! crates.io: page-numbered listing sorted by downloads, one document per crate.

use super::{Discovery, RegistryClient, endpoint_url, fetch_json_at};
use crate::Result;
use crate::harvest::{FetchOutcome, IndexSnapshot, PackageId};
use serde::Deserialize;
use serde_json::Value;

const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct CratesPage {
    #[serde(default)]
    crates: Vec<CrateSummary>,
}

#[derive(Debug, Deserialize)]
struct CrateSummary {
    name: String,
}

/// The page to request after `cursor`, which records the last page fetched.
fn next_page_number(cursor: Option<&str>) -> u64 {
    cursor.and_then(|c| c.parse::<u64>().ok()).map_or(1, |page| page + 1)
}

pub(super) async fn discover(discovery: &mut Discovery<'_>, snapshot: &mut IndexSnapshot) -> Result<()> {
    while snapshot.packages.len() < discovery.limit {
        let page_number = next_page_number(snapshot.cursor.as_deref());

        let mut url = endpoint_url(&discovery.client.endpoints.crates_io, &["crates"])?;
        _ = url
            .query_pairs_mut()
            .append_pair("page", &page_number.to_string())
            .append_pair("per_page", &PER_PAGE.to_string())
            .append_pair("sort", "downloads");

        discovery.next_page().await;
        let page: CratesPage = discovery.client.fetcher.fetch_json(&url).await.into_result()?;

        if page.crates.is_empty() {
            snapshot.complete = true;
            return discovery.checkpoint(snapshot);
        }

        snapshot.packages.extend(page.crates.into_iter().map(|c| PackageId::from(c.name)));
        snapshot.cursor = Some(page_number.to_string());
        discovery.checkpoint(snapshot)?;
    }

    Ok(())
}

pub(super) async fn fetch_metadata(client: &RegistryClient, id: &PackageId) -> FetchOutcome<Value> {
    fetch_json_at(client, &client.endpoints.crates_io, &["crates", id.as_str()]).await
}
