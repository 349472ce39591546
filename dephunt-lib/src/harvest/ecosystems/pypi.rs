//! `PyPI`: the whole simple index in one request, one JSON document per project.

use super::{Discovery, RegistryClient, endpoint_url, fetch_json_at};
use crate::Result;
use crate::harvest::{FetchOutcome, IndexSnapshot, PackageId};
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").expect("valid CSS selector"));

/// Extract project names from a simple-index HTML page.
fn parse_simple_index(html: &str) -> Vec<PackageId> {
    Html::parse_document(html)
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| {
            let text: String = anchor.text().collect();
            let name = text.trim();
            (!name.is_empty()).then(|| PackageId::new(name))
        })
        .collect()
}

/// The simple index cannot be paged, so every crawl starts over and lists everything.
pub(super) async fn discover(discovery: &mut Discovery<'_>, snapshot: &mut IndexSnapshot) -> Result<()> {
    let url = endpoint_url(&discovery.client.endpoints.pypi, &["simple", ""])?;

    discovery.next_page().await;
    let html = discovery.client.fetcher.fetch_text(&url).await.into_result()?;

    snapshot.packages = parse_simple_index(&html);
    snapshot.cursor = None;
    snapshot.complete = true;
    discovery.checkpoint(snapshot)
}

pub(super) async fn fetch_metadata(client: &RegistryClient, id: &PackageId) -> FetchOutcome<Value> {
    fetch_json_at(client, &client.endpoints.pypi, &["pypi", id.as_str(), "json"]).await
}
