//! Cargo.toml parser with line anchoring.
//!
//! Uses toml_edit's span-preserving [`Document`] so every dependency carries
//! the zero-based line of its key. Only structurally invalid TOML fails the
//! whole parse; an entry with an unexpected shape is returned with a
//! [`RequirementSpec::Malformed`] requirement and its siblings parse normally.
//!
//! Lines are unique per parse. Entries of an inline section table such as
//! `dependencies = { a = "1", b = "2" }` share one line; the first in
//! document order keeps it and the rest go to
//! [`ParsedManifest::unanchored`].
//!
//! Sections read:
//!
//! - `[dependencies]`, `[dev-dependencies]`, `[build-dependencies]`
//! - the legacy `dev_dependencies` / `build_dependencies` spellings
//! - the same three under `[target.<cfg>]`
//! - `[workspace.dependencies]`
//!
//! # Examples
//!
//! ```
//! use lens_cargo::parse_manifest;
//! use std::path::Path;
//!
//! let toml = r#"
//! [dependencies]
//! serde = "1.0"
//! tokio = { version = "1", features = ["full"] }
//! "#;
//!
//! let manifest = parse_manifest(toml, Path::new("/work/Cargo.toml")).unwrap();
//! assert_eq!(manifest.dependencies.len(), 2);
//! assert_eq!(manifest.dependencies[0].name, "serde");
//! assert_eq!(manifest.dependencies[0].line, 2);
//! ```

use crate::error::{CargoError, Result};
use lens_core::dependency::CRATES_IO;
use lens_core::{
    Dependency, DependencySection, DependencySource, GitReference, RegistryId, RequirementSpec,
};
use std::path::{Path, PathBuf};
use toml_edit::{Document, Item, TableLike, Value};

const SECTIONS: [(&str, DependencySection); 5] = [
    ("dependencies", DependencySection::Dependencies),
    ("dev-dependencies", DependencySection::DevDependencies),
    ("dev_dependencies", DependencySection::DevDependencies),
    ("build-dependencies", DependencySection::BuildDependencies),
    ("build_dependencies", DependencySection::BuildDependencies),
];

/// Dependencies declared by one Cargo.toml, ordered by line.
#[derive(Debug, Clone)]
pub struct ParsedManifest {
    pub path: PathBuf,
    pub dependencies: Vec<Dependency>,
    /// Entries declared on a line already owned by an earlier dependency.
    pub unanchored: Vec<Dependency>,
}

impl ParsedManifest {
    /// Dependencies eligible for registry resolution.
    pub fn registry_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|dep| dep.is_registry())
    }
}

/// Pre-computed line start byte offsets.
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(content.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    fn line_of(&self, offset: usize) -> u32 {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        line as u32
    }
}

struct SectionContext<'a> {
    lines: &'a LineIndex,
    section: DependencySection,
    target: Option<&'a str>,
}

/// Parses manifest text into typed dependency declarations.
///
/// # Errors
///
/// Returns [`CargoError::TomlParse`] when the text is not valid TOML.
pub fn parse_manifest(content: &str, path: &Path) -> Result<ParsedManifest> {
    let doc = Document::parse(content).map_err(|source| CargoError::TomlParse {
        file: path.display().to_string(),
        source,
    })?;

    let lines = LineIndex::new(content);
    let mut dependencies = Vec::new();

    collect_sections(doc.as_table(), None, &lines, &mut dependencies);

    if let Some(targets) = doc.get("target").and_then(Item::as_table_like) {
        for (cfg, item) in targets.iter() {
            if let Some(platform) = item.as_table_like() {
                collect_sections(platform, Some(cfg), &lines, &mut dependencies);
            }
        }
    }

    if let Some(workspace_deps) = doc
        .get("workspace")
        .and_then(Item::as_table_like)
        .and_then(|workspace| workspace.get("dependencies"))
        .and_then(Item::as_table_like)
    {
        let ctx = SectionContext {
            lines: &lines,
            section: DependencySection::WorkspaceDependencies,
            target: None,
        };
        parse_section(workspace_deps, &ctx, &mut dependencies);
    }

    // stable sort: document order decides which entry owns a shared line
    dependencies.sort_by_key(|dep| dep.line);
    let (dependencies, unanchored) = split_shared_lines(dependencies);
    for dep in &unanchored {
        tracing::warn!(
            "{}: dependency '{}' shares line {} with another entry, skipped",
            path.display(),
            dep.name,
            dep.line + 1
        );
    }
    tracing::debug!(
        "parsed {}: {} dependencies",
        path.display(),
        dependencies.len()
    );

    Ok(ParsedManifest {
        path: path.to_path_buf(),
        dependencies,
        unanchored,
    })
}

/// Keeps the first dependency on each line. Input must be sorted by line.
fn split_shared_lines(sorted: Vec<Dependency>) -> (Vec<Dependency>, Vec<Dependency>) {
    let mut anchored: Vec<Dependency> = Vec::with_capacity(sorted.len());
    let mut unanchored = Vec::new();
    for dep in sorted {
        if anchored.last().is_some_and(|prev| prev.line == dep.line) {
            unanchored.push(dep);
        } else {
            anchored.push(dep);
        }
    }
    (anchored, unanchored)
}

fn collect_sections(
    table: &dyn TableLike,
    target: Option<&str>,
    lines: &LineIndex,
    out: &mut Vec<Dependency>,
) {
    for (key, section) in SECTIONS {
        if let Some(deps) = table.get(key).and_then(Item::as_table_like) {
            let ctx = SectionContext {
                lines,
                section,
                target,
            };
            parse_section(deps, &ctx, out);
        }
    }
}

fn parse_section(table: &dyn TableLike, ctx: &SectionContext<'_>, out: &mut Vec<Dependency>) {
    for (name, item) in table.iter() {
        let key_span = table.get_key_value(name).and_then(|(key, _)| key.span());
        let offset = key_span.or_else(|| item_span(item)).map(|span| span.start);
        let line = offset.map_or(0, |offset| ctx.lines.line_of(offset));

        let (source, requirement, package) = match classify_entry(item) {
            Ok(parts) => parts,
            Err(message) => {
                tracing::debug!("malformed dependency '{}' at line {}: {}", name, line, message);
                (
                    DependencySource::Registry {
                        registry: RegistryId::CratesIo,
                    },
                    RequirementSpec::Malformed { message },
                    None,
                )
            }
        };

        out.push(Dependency {
            name: name.to_string(),
            package,
            requirement,
            line,
            source,
            section: ctx.section,
            target: ctx.target.map(String::from),
        });
    }
}

fn item_span(item: &Item) -> Option<std::ops::Range<usize>> {
    match item {
        Item::Value(value) => value.span(),
        Item::Table(table) => table.span(),
        _ => None,
    }
}

type EntryParts = (DependencySource, RequirementSpec, Option<String>);

fn classify_entry(item: &Item) -> std::result::Result<EntryParts, String> {
    match item {
        Item::Value(Value::String(version)) => Ok((
            DependencySource::Registry {
                registry: RegistryId::CratesIo,
            },
            RequirementSpec::from_raw(version.value()),
            None,
        )),
        Item::Value(Value::InlineTable(table)) => classify_table(table),
        Item::Table(table) => classify_table(table),
        _ => Err("expected a version string or a dependency table".to_string()),
    }
}

/// Decides the source of a table-shaped entry: path, then git, then
/// workspace inheritance, then registry.
fn classify_table(table: &dyn TableLike) -> std::result::Result<EntryParts, String> {
    let version = string_field(table, "version")?;
    let package = string_field(table, "package")?.map(String::from);
    let path = string_field(table, "path")?;
    let git = string_field(table, "git")?;
    let registry = string_field(table, "registry")?;
    let workspace = match table.get("workspace") {
        None => false,
        Some(item) => item
            .as_bool()
            .ok_or_else(|| "`workspace` must be a boolean".to_string())?,
    };

    let source = if let Some(path) = path {
        DependencySource::Path {
            path: path.to_string(),
        }
    } else if let Some(url) = git {
        DependencySource::Git {
            url: url.to_string(),
            reference: git_reference(table)?,
        }
    } else if workspace {
        DependencySource::Workspace
    } else {
        DependencySource::Registry {
            registry: RegistryId::from_name(registry.unwrap_or(CRATES_IO)),
        }
    };

    let requirement = version.map_or(RequirementSpec::Missing, RequirementSpec::from_raw);
    Ok((source, requirement, package))
}

fn git_reference(table: &dyn TableLike) -> std::result::Result<Option<GitReference>, String> {
    if let Some(rev) = string_field(table, "rev")? {
        return Ok(Some(GitReference::Rev(rev.to_string())));
    }
    if let Some(tag) = string_field(table, "tag")? {
        return Ok(Some(GitReference::Tag(tag.to_string())));
    }
    Ok(string_field(table, "branch")?.map(|branch| GitReference::Branch(branch.to_string())))
}

fn string_field<'a>(
    table: &'a dyn TableLike,
    key: &str,
) -> std::result::Result<Option<&'a str>, String> {
    match table.get(key) {
        None => Ok(None),
        Some(item) => item
            .as_str()
            .map(Some)
            .ok_or_else(|| format!("`{key}` must be a string")),
    }
}
