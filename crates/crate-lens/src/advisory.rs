//! Best-effort advisory check.

use crate::error::Cancelled;
use crate::session::Session;
use lens_core::{AdvisoryCheck, CancellationToken};
use std::path::Path;

/// Runs the advisory tool for a manifest.
///
/// The availability probe is memoised on the session; a missing tool yields
/// [`AdvisoryCheck::unavailable`] without an error. When `token` fires the
/// audit future is dropped, which stops the tool, and nothing is returned.
pub async fn check_advisories(
    session: &Session,
    manifest_path: &Path,
    token: &CancellationToken,
) -> Result<AdvisoryCheck, Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }

    let installed = match session.advisory_probe.get() {
        Some(installed) => installed,
        None => {
            let installed = tokio::select! {
                () = token.cancelled() => return Err(Cancelled),
                installed = session.advisory_tool.is_installed() => installed,
            };
            session.advisory_probe.set(installed);
            installed
        }
    };

    if !installed {
        tracing::debug!("advisory tool not installed, skipping");
        return Ok(AdvisoryCheck::unavailable());
    }

    let report = tokio::select! {
        () = token.cancelled() => return Err(Cancelled),
        report = session.advisory_tool.audit(manifest_path) => report,
    };

    Ok(match report {
        Ok(advisories) => {
            tracing::info!(
                "advisory check for {}: {} affected crates",
                manifest_path.display(),
                advisories.len()
            );
            AdvisoryCheck::completed(advisories)
        }
        Err(e) => {
            tracing::warn!("advisory check failed for {}: {}", manifest_path.display(), e);
            AdvisoryCheck::failed(&e)
        }
    })
}
