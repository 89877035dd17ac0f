//! Package descriptor (`.nuspec`) parsing.
//!
//! A descriptor is the XML metadata file at the root of every package archive:
//!
//! ```xml
//! <package>
//!   <metadata>
//!     <id>Foo</id>
//!     <version>1.0.0</version>
//!     <dependencies>
//!       <group targetFramework="net45">
//!         <dependency id="Bar" version="[1.0,2.0)" />
//!       </group>
//!     </dependencies>
//!   </metadata>
//! </package>
//! ```
//!
//! Legacy descriptors list `<dependency>` elements directly under
//! `<dependencies>`; those form a group with an empty target framework.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{FrameworkGroup, Package, PackageIdentifier};
use crate::constants::DESCRIPTOR_EXTENSION;
use crate::core::NupmError;

/// Parses descriptor XML. `label` names the file in error messages.
///
/// # Errors
///
/// Fails with [`NupmError::DescriptorParse`] on malformed XML or when the id or
/// version element is missing.
pub fn parse(xml: &str, label: &str) -> Result<Package> {
    let parse_error = |reason: String| NupmError::DescriptorParse {
        file: label.to_string(),
        reason,
    };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut package = Package::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut current_group: Option<FrameworkGroup> = None;
    let mut flat_dependencies: Vec<PackageIdentifier> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if name == "group" && in_dependencies(&stack) {
                    current_group = Some(start_group(&e).map_err(&parse_error)?);
                } else if name == "dependency" && in_dependencies(&stack) {
                    let dependency = read_dependency(&e).map_err(&parse_error)?;
                    push_dependency(&mut current_group, &mut flat_dependencies, dependency);
                }
                stack.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                if name == "group" && in_dependencies(&stack) {
                    package.add_dependency_group(start_group(&e).map_err(&parse_error)?);
                } else if name == "dependency" && in_dependencies(&stack) {
                    let dependency = read_dependency(&e).map_err(&parse_error)?;
                    push_dependency(&mut current_group, &mut flat_dependencies, dependency);
                }
            }
            Ok(Event::Text(t)) => {
                let value = t.unescape().map_err(|e| parse_error(e.to_string()))?;
                text.push_str(&value);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(_)) => {
                let name = stack.pop().unwrap_or_default();
                if name == "group" && current_group.is_some() {
                    if let Some(group) = current_group.take() {
                        package.add_dependency_group(group);
                    }
                } else if stack.last().map(String::as_str) == Some("metadata") {
                    set_metadata_field(&mut package, &name, std::mem::take(&mut text));
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(parse_error(e.to_string()).into()),
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(parse_error(format!("document ends inside <{open}>")).into());
    }
    if !flat_dependencies.is_empty() {
        package.add_dependency_group(FrameworkGroup::new("", flat_dependencies));
    }

    if package.identity.id.is_empty() {
        return Err(parse_error("missing <id> element".to_string()).into());
    }
    if package.identity.version.is_empty() {
        return Err(parse_error("missing <version> element".to_string()).into());
    }

    Ok(package)
}

/// Reads and parses a standalone descriptor file.
pub fn read_file(path: &Path) -> Result<Package> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read package descriptor: {}", path.display()))?;
    parse(&xml, &path.display().to_string())
}

/// Reads the descriptor stored at the root of a package archive.
///
/// # Errors
///
/// Fails with [`NupmError::ArchiveCorrupt`] when the archive cannot be opened or
/// holds no root-level descriptor.
pub fn read_from_archive(path: &Path) -> Result<Package> {
    let corrupt = |reason: String| NupmError::ArchiveCorrupt {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path)
        .with_context(|| format!("Failed to open package archive: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    let suffix = format!(".{DESCRIPTOR_EXTENSION}");
    let entry_name = archive
        .file_names()
        .find(|name| !name.contains('/') && name.to_ascii_lowercase().ends_with(&suffix))
        .map(str::to_string)
        .ok_or_else(|| corrupt("no package descriptor at the archive root".to_string()))?;

    let mut xml = String::new();
    archive
        .by_name(&entry_name)
        .map_err(|e| corrupt(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| corrupt(e.to_string()))?;

    parse(&xml, &format!("{}!{entry_name}", path.display()))
}

/// Local (namespace-free) element name.
pub(crate) fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Unescaped value of the attribute with the given local name.
pub(crate) fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|err| err.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn in_dependencies(stack: &[String]) -> bool {
    stack.iter().any(|name| name == "dependencies")
}

fn start_group(e: &BytesStart<'_>) -> Result<FrameworkGroup, String> {
    let framework = attribute(e, "targetFramework")?.unwrap_or_default();
    Ok(FrameworkGroup::new(framework, Vec::new()))
}

fn read_dependency(e: &BytesStart<'_>) -> Result<PackageIdentifier, String> {
    let id = attribute(e, "id")?.ok_or("<dependency> without id attribute")?;
    // A dependency without a version accepts any version.
    let version = attribute(e, "version")?.unwrap_or_else(|| "0.0.0".to_string());
    Ok(PackageIdentifier::new(id, version))
}

fn push_dependency(
    group: &mut Option<FrameworkGroup>,
    flat: &mut Vec<PackageIdentifier>,
    dependency: PackageIdentifier,
) {
    match group {
        Some(group) => group.dependencies.push(dependency),
        None => flat.push(dependency),
    }
}

fn set_metadata_field(package: &mut Package, name: &str, value: String) {
    let value = value.trim().to_string();
    match name {
        "id" => package.identity.id = value,
        "version" => package.identity.version = value,
        "title" => package.title = Some(value),
        "authors" => package.authors = Some(value),
        "description" => package.description = Some(value),
        "summary" => package.summary = Some(value),
        "releaseNotes" => package.release_notes = Some(value),
        "licenseUrl" => package.license_url = Some(value),
        "projectUrl" => package.project_url = Some(value),
        "iconUrl" => package.icon_url = Some(value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>Foo.Bar</id>
    <version>1.2.3</version>
    <title>Foo &amp; Bar</title>
    <authors>Someone</authors>
    <description><![CDATA[Does <things>]]></description>
    <projectUrl>https://example.com/foo</projectUrl>
    <dependencies>
      <group targetFramework=".NETFramework4.5">
        <dependency id="Baz" version="[1.0,2.0)" />
      </group>
      <group targetFramework=".NETStandard2.0">
        <dependency id="Baz" version="1.5.0" />
        <dependency id="Qux" version="3.0.0" />
      </group>
      <group targetFramework="net6.0" />
    </dependencies>
  </metadata>
  <files />
</package>"#;

    #[test]
    fn test_parse_grouped_descriptor() {
        let package = parse(GROUPED, "Foo.Bar.nuspec").unwrap();
        assert_eq!(package.id(), "Foo.Bar");
        assert_eq!(package.version(), "1.2.3");
        assert_eq!(package.title.as_deref(), Some("Foo & Bar"));
        assert_eq!(package.description.as_deref(), Some("Does <things>"));
        assert_eq!(package.project_url.as_deref(), Some("https://example.com/foo"));

        assert_eq!(package.dependencies.len(), 3);
        assert_eq!(package.dependencies[0].target_framework, ".NETFramework4.5");
        assert_eq!(package.dependencies[0].dependencies, vec![PackageIdentifier::new(
            "Baz",
            "[1.0,2.0)"
        )]);
        assert_eq!(package.dependencies[1].dependencies.len(), 2);
        assert!(package.dependencies[2].dependencies.is_empty());
    }

    #[test]
    fn test_parse_flat_dependencies() {
        let xml = r#"<package><metadata><id>Old</id><version>0.1</version>
            <dependencies><dependency id="A" version="1.0" /><dependency id="B" /></dependencies>
            </metadata></package>"#;
        let package = parse(xml, "old.nuspec").unwrap();
        assert_eq!(package.dependencies.len(), 1);
        assert_eq!(package.dependencies[0].target_framework, "");
        assert_eq!(package.dependencies[0].dependencies[1], PackageIdentifier::new("B", "0.0.0"));
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let err = parse("<package><metadata><version>1.0</version></metadata></package>", "x")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NupmError>(),
            Some(NupmError::DescriptorParse { .. })
        ));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(parse("<package><metadata><id>x</id></package>", "x").is_err());
    }
}
