//! Plain-text rendering helpers for presentation layers.

use lens_cargo::crate_url;
use lens_core::{
    Advisory, AdvisorySeverity, DependencySource, DependencyValidationResult, ResolvedVersion,
    Status,
};

/// Short marker shown next to a dependency.
pub fn status_glyph(status: Status) -> &'static str {
    match status {
        Status::Latest => "✅",
        Status::PatchBehind => "🟡",
        Status::MinorBehind => "🟠",
        Status::MajorBehind => "❌",
        Status::Error => "⚠️",
    }
}

/// Version to offer as the update target, if the dependency is behind.
pub fn suggested_update(result: &DependencyValidationResult) -> Option<&ResolvedVersion> {
    result.suggested_update()
}

/// One-line summary: glyph, status and the suggested version or error.
pub fn summary_line(result: &DependencyValidationResult) -> String {
    let glyph = status_glyph(result.status);
    if let Some(error) = &result.error {
        return format!("{} {}", glyph, error.kind);
    }
    match suggested_update(result) {
        Some(version) => format!("{} {} → {}", glyph, result.status.as_str(), version),
        None => format!("{} {}", glyph, result.status.as_str()),
    }
}

/// Long-form description of a dependency, including its advisories.
///
/// Every line, including the last, ends with `\n`.
pub fn hover_text(result: &DependencyValidationResult, advisories: &[Advisory]) -> String {
    let dep = &result.dependency;
    let mut lines = vec![format!("{} ({})", dep.name, crate_url(dep.crate_name()))];

    if dep.package.is_some() {
        lines.push(format!("Package: {}", dep.crate_name()));
    }
    if let DependencySource::Registry { registry } = &dep.source
        && !matches!(registry, lens_core::RegistryId::CratesIo)
    {
        lines.push(format!("Registry: {}", registry));
    }
    if let Some(raw) = dep.requirement.raw() {
        lines.push(format!("Requirement: {}", raw));
    }
    if let Some(locked) = &result.locked {
        lines.push(format!("Locked: {}", locked));
    }
    if let Some(stable) = &result.latest_stable {
        lines.push(format!("Latest stable: {}", stable));
    }
    if let Some(latest) = &result.latest
        && Some(latest) != result.latest_stable.as_ref()
    {
        lines.push(format!("Latest prerelease: {}", latest));
    }
    lines.push(format!("Status: {}", summary_line(result)));
    lines.extend(advisories.iter().map(advisory_line));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn advisory_line(advisory: &Advisory) -> String {
    let label = match advisory.severity {
        AdvisorySeverity::Vulnerability => "Vulnerability",
        AdvisorySeverity::Warning => "Warning",
    };
    match &advisory.url {
        Some(url) => format!("{} {}: {} ({})", label, advisory.id, advisory.title, url),
        None => format!("{} {}: {}", label, advisory.id, advisory.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::{
        Dependency, DependencySection, ErrorDetail, ErrorKind, RegistryId, RequirementSpec,
        VersionRequirement,
    };

    fn dependency(name: &str, requirement: &str) -> Dependency {
        Dependency {
            name: name.into(),
            package: None,
            requirement: RequirementSpec::from_raw(requirement),
            line: 7,
            source: DependencySource::Registry {
                registry: RegistryId::CratesIo,
            },
            section: DependencySection::Dependencies,
            target: None,
        }
    }

    fn evaluated(requirement: &str, stable: &str, latest: &str) -> DependencyValidationResult {
        DependencyValidationResult::evaluate(
            dependency("serde", requirement),
            &VersionRequirement::parse(requirement).unwrap(),
            Some(stable.parse().unwrap()),
            Some(latest.parse().unwrap()),
            Some("1.0.150".parse().unwrap()),
        )
    }

    #[test]
    fn test_summary_line() {
        let behind = evaluated("1.0.100", "1.2.0", "2.0.0-beta.1");
        assert_eq!(summary_line(&behind), "🟠 minor-behind → 1.2.0");

        let current = evaluated("1.2.0", "1.2.0", "1.2.0");
        assert_eq!(summary_line(&current), "✅ latest");
        assert!(suggested_update(&current).is_none());

        let failed = DependencyValidationResult::failed(
            dependency("serde", "1.0"),
            ErrorDetail::new(ErrorKind::CrateNotFound, "crate 'serde' not found"),
            None,
        );
        assert_eq!(summary_line(&failed), "⚠️ crate-not-found");
    }

    #[test]
    fn test_hover_text() {
        let result = evaluated("1.0.100", "1.2.0", "2.0.0-beta.1");
        let advisories = [Advisory {
            id: "RUSTSEC-2099-0001".into(),
            severity: AdvisorySeverity::Vulnerability,
            title: "Example issue".into(),
            url: Some("https://rustsec.org/advisories/RUSTSEC-2099-0001".into()),
            version: Some("1.0.150".into()),
        }];

        let text = hover_text(&result, &advisories);
        assert!(text.starts_with("serde (https://crates.io/crates/serde)\n"));
        assert!(text.contains("Requirement: 1.0.100\n"));
        assert!(text.contains("Locked: 1.0.150\n"));
        assert!(text.contains("Latest stable: 1.2.0\n"));
        assert!(text.contains("Latest prerelease: 2.0.0-beta.1\n"));
        assert!(text.contains(
            "Vulnerability RUSTSEC-2099-0001: Example issue (https://rustsec.org/advisories/RUSTSEC-2099-0001)\n"
        ));
        assert!(text.ends_with('\n'));
        assert!(!text.ends_with("\n\n"));
    }

    #[test]
    fn test_hover_text_advisory_without_url() {
        let result = DependencyValidationResult::evaluate(
            dependency("time", "0.1"),
            &VersionRequirement::parse("0.1").unwrap(),
            Some("0.3.30".parse().unwrap()),
            Some("0.3.30".parse().unwrap()),
            None,
        );
        let advisories = [Advisory {
            id: "RUSTSEC-2020-0071".into(),
            severity: AdvisorySeverity::Warning,
            title: "Potential segfault".into(),
            url: None,
            version: None,
        }];

        let text = hover_text(&result, &advisories);
        assert!(text.ends_with("Warning RUSTSEC-2020-0071: Potential segfault\n"));
    }

    #[test]
    fn test_hover_text_renamed_dependency() {
        let mut dep = dependency("serde1", "1.0");
        dep.package = Some("serde".into());
        let result = DependencyValidationResult::evaluate(
            dep,
            &VersionRequirement::parse("1.0").unwrap(),
            Some("1.0.0".parse().unwrap()),
            Some("1.0.0".parse().unwrap()),
            None,
        );

        let text = hover_text(&result, &[]);
        assert!(text.starts_with("serde1 (https://crates.io/crates/serde)\n"));
        assert!(text.contains("Package: serde\n"));
        assert!(!text.contains("Latest prerelease"));
    }
}
