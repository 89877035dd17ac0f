//! Builder for package archives used as test fixtures.

use anyhow::{Context, Result};
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Writes `.nupkg` archives laid out like the ones real feeds serve.
///
/// ```rust,no_run
/// use nupm_cli::test_utils::NupkgBuilder;
///
/// # fn example(feed: &std::path::Path) -> anyhow::Result<()> {
/// NupkgBuilder::new("App", "1.0.0")
///     .dependency("net45", "Lib", "[1.0,2.0)")
///     .file("lib/net45/App.dll", b"dll")
///     .write_to_dir(feed)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NupkgBuilder {
    id: String,
    version: String,
    metadata: Vec<(String, String)>,
    groups: Vec<(String, Vec<(String, String)>)>,
    files: Vec<(String, Vec<u8>)>,
}

impl NupkgBuilder {
    /// A package with no dependencies and no content.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            metadata: Vec::new(),
            groups: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Adds a dependency to the group for `framework` (`""` for any framework).
    #[must_use]
    pub fn dependency(mut self, framework: &str, id: &str, version: &str) -> Self {
        let entry = (id.to_string(), version.to_string());
        match self.groups.iter_mut().find(|(f, _)| f == framework) {
            Some((_, deps)) => deps.push(entry),
            None => self.groups.push((framework.to_string(), vec![entry])),
        }
        self
    }

    /// Adds a metadata element such as `title` or `description`.
    #[must_use]
    pub fn metadata(mut self, element: &str, value: &str) -> Self {
        self.metadata.push((element.to_string(), value.to_string()));
        self
    }

    /// Adds a content file. Spaces in the path are percent-encoded the way
    /// packing tools store them.
    #[must_use]
    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((path.replace(' ', "%20"), content.to_vec()));
        self
    }

    /// `{Id}.{Version}.nupkg`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}.nupkg", self.id, self.version)
    }

    /// The descriptor XML.
    #[must_use]
    pub fn nuspec_xml(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<package xmlns=\"http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd\">\n  <metadata>\n",
        );
        let _ = writeln!(xml, "    <id>{}</id>", escape(self.id.as_str()));
        let _ = writeln!(xml, "    <version>{}</version>", escape(self.version.as_str()));
        for (element, value) in &self.metadata {
            let _ = writeln!(xml, "    <{element}>{}</{element}>", escape(value.as_str()));
        }

        if !self.groups.is_empty() {
            xml.push_str("    <dependencies>\n");
            for (framework, deps) in &self.groups {
                if framework.is_empty() {
                    xml.push_str("      <group>\n");
                } else {
                    let _ = writeln!(xml, "      <group targetFramework=\"{}\">", escape(framework.as_str()));
                }
                for (id, version) in deps {
                    let _ = writeln!(
                        xml,
                        "        <dependency id=\"{}\" version=\"{}\" />",
                        escape(id.as_str()),
                        escape(version.as_str())
                    );
                }
                xml.push_str("      </group>\n");
            }
            xml.push_str("    </dependencies>\n");
        }

        xml.push_str("  </metadata>\n</package>\n");
        xml
    }

    /// The archive bytes.
    pub fn build(&self) -> Result<Vec<u8>> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let mut entries: Vec<(String, Vec<u8>)> = vec![
            (format!("{}.nuspec", self.id), self.nuspec_xml().into_bytes()),
            (
                "[Content_Types].xml".to_string(),
                b"<?xml version=\"1.0\" encoding=\"utf-8\"?><Types />".to_vec(),
            ),
            ("_rels/.rels".to_string(), b"<Relationships />".to_vec()),
        ];
        entries.extend(self.files.iter().cloned());

        for (name, content) in entries {
            zip.start_file(name.as_str(), options)
                .with_context(|| format!("Failed to add {name} to archive"))?;
            zip.write_all(&content)?;
        }

        Ok(zip.finish().context("Failed to finish archive")?.into_inner())
    }

    /// Writes `{dir}/{Id}.{Version}.nupkg` and returns its path.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.build()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
