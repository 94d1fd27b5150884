//! Out-of-band corpus refresh (§4.2 "Freshness"): download a new corpus
//! archive, verify it extracts/parses, back up the previous file, and
//! replace it. Adapted from the DAT cache's download-and-replace flow,
//! collapsed to a single corpus file instead of one DAT per console.

use std::path::Path;

use crate::error::CorpusError;
use crate::xml::parse_corpus_bytes;

/// Download `url`, verify the body parses as a corpus document, back up
/// whatever is currently at `dest`, and replace it atomically.
pub async fn update_corpus_archive(client: &reqwest::Client, url: &str, dest: &Path) -> Result<usize, CorpusError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CorpusError::download(e.to_string()))?;
    if !response.status().is_success() {
        return Err(CorpusError::download(format!("HTTP {} fetching {url}", response.status())));
    }
    let bytes = response.bytes().await.map_err(|e| CorpusError::download(e.to_string()))?;

    let parsed = parse_corpus_bytes(&bytes)?;
    if parsed.entries.is_empty() {
        return Err(CorpusError::download("downloaded corpus contained no entries"));
    }

    if dest.exists() {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let backup = dest.with_extension(format!("xml.backup.{ts}"));
        tokio::fs::copy(dest, backup).await?;
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = dest.with_extension("xml.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, dest).await?;

    Ok(parsed.entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_an_empty_downloaded_corpus() {
        // A body with no <Game> elements should not be accepted, even if
        // the request itself succeeds — covered at the parse stage since
        // this test exercises parse_corpus_bytes directly without a server.
        let parsed = parse_corpus_bytes(b"<GameDatabase></GameDatabase>").unwrap();
        assert!(parsed.entries.is_empty());
    }
}
