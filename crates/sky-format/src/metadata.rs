use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};

/// A single file within a (possibly multi-file) skyfile.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SubfileMetadata {
    pub filename: String,
    pub content_type: String,
    pub offset: u64,
    pub len: u64,
}

/// The JSON metadata section of a base sector: the file name, the sniffed
/// content type, and — for multi-file uploads — the subfile table and the
/// default path served when a directory is requested without one.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Metadata {
    pub filename: String,
    #[serde(default)]
    pub subfiles: BTreeMap<String, SubfileMetadata>,
    #[serde(default)]
    pub default_path: Option<String>,
    #[serde(default)]
    pub disable_default_path: bool,
}

impl Metadata {
    /// A single-file skyfile's metadata: no subfile table, no default path.
    #[must_use]
    pub fn single_file(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            subfiles: BTreeMap::new(),
            default_path: None,
            disable_default_path: false,
        }
    }

    /// A single-file skyfile whose one file is recorded in the subfile table
    /// (so `for_path` can report its content type and length), as opposed to
    /// [`Metadata::single_file`], which leaves the table empty.
    #[must_use]
    pub fn single_file_with_subfile(filename: impl Into<String>, content_type: impl Into<String>, len: u64) -> Self {
        let filename = filename.into();
        let mut subfiles = BTreeMap::new();
        subfiles.insert(
            filename.clone(),
            SubfileMetadata {
                filename: filename.clone(),
                content_type: content_type.into(),
                offset: 0,
                len,
            },
        );
        Self {
            filename,
            subfiles,
            default_path: None,
            disable_default_path: false,
        }
    }

    #[must_use]
    pub fn is_multi_file(&self) -> bool {
        !self.subfiles.is_empty()
    }

    /// Validates cross-field invariants that can't be expressed in the type
    /// alone: `default_path` only makes sense for multi-file uploads, is
    /// mutually exclusive with `disable_default_path`, must be root-relative,
    /// and must name a real subfile.
    pub fn validate(&self) -> FormatResult<()> {
        if let Some(path) = &self.default_path {
            if self.disable_default_path {
                return Err(FormatError::DefaultPathAndDisableBothSet);
            }
            if !self.is_multi_file() {
                return Err(FormatError::DefaultPathOnSingleFile);
            }
            if !path.starts_with('/') {
                return Err(FormatError::DefaultPathNonRoot);
            }
            let relative = path.trim_start_matches('/');
            if !self.subfiles.contains_key(relative) {
                return Err(FormatError::DefaultPathInvalid);
            }
        }
        Ok(())
    }

    /// Resolves a requested path to the subfile that serves it.
    ///
    /// - Single-file skyfiles serve their one file regardless of `path`.
    /// - `/` (or `""`) on a multi-file skyfile resolves through
    ///   `default_path` when set; otherwise, unless `disable_default_path`
    ///   is set, it falls back to the one subfile when there's exactly one,
    ///   then to `index.html` when that exists.
    /// - Any other path must name an entry in the subfile table exactly.
    pub fn for_path(&self, path: &str) -> FormatResult<&SubfileMetadata> {
        if !self.is_multi_file() {
            return self
                .subfiles
                .values()
                .next()
                .ok_or(FormatError::InvalidPath);
        }

        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            if let Some(default) = self.default_path.as_deref() {
                return self
                    .subfiles
                    .get(default.trim_start_matches('/'))
                    .ok_or(FormatError::DefaultPathInvalid);
            }
            if !self.disable_default_path {
                if self.subfiles.len() == 1 {
                    return Ok(self.subfiles.values().next().expect("len checked above"));
                }
                if let Some(index) = self.subfiles.get("index.html") {
                    return Ok(index);
                }
            }
            return Err(FormatError::InvalidPath);
        }

        self.subfiles.get(relative).ok_or(FormatError::InvalidPath)
    }

    pub fn encode(&self) -> FormatResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| FormatError::MetadataDecode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> FormatResult<Self> {
        let metadata: Self =
            serde_json::from_slice(bytes).map_err(|e| FormatError::MetadataDecode(e.to_string()))?;
        metadata.validate()?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subfile(name: &str, offset: u64, len: u64) -> SubfileMetadata {
        SubfileMetadata {
            filename: name.to_string(),
            content_type: "application/octet-stream".to_string(),
            offset,
            len,
        }
    }

    #[test]
    fn single_file_resolves_regardless_of_path() {
        let meta = Metadata::single_file("report.pdf");
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn single_file_with_subfile_records_content_type_and_len() {
        let meta = Metadata::single_file_with_subfile("report.pdf", "application/pdf", 1024);
        meta.validate().unwrap();
        let resolved = meta.for_path("report.pdf").unwrap();
        assert_eq!(resolved.content_type, "application/pdf");
        assert_eq!(resolved.len, 1024);
    }

    #[test]
    fn multi_file_round_trips_through_json() {
        let mut meta = Metadata::single_file("site");
        meta.subfiles
            .insert("index.html".to_string(), subfile("index.html", 0, 100));
        meta.subfiles
            .insert("style.css".to_string(), subfile("style.css", 100, 50));
        meta.default_path = Some("/index.html".to_string());

        meta.validate().unwrap();

        let bytes = meta.encode().unwrap();
        let decoded = Metadata::decode(&bytes).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn default_path_must_name_a_real_subfile() {
        let mut meta = Metadata::single_file("site");
        meta.subfiles
            .insert("index.html".to_string(), subfile("index.html", 0, 100));
        meta.default_path = Some("/missing.html".to_string());

        assert!(matches!(
            meta.validate(),
            Err(FormatError::DefaultPathInvalid)
        ));
    }

    #[test]
    fn default_path_on_single_file_is_rejected() {
        let mut meta = Metadata::single_file("report.pdf");
        meta.default_path = Some("/report.pdf".to_string());
        assert!(matches!(
            meta.validate(),
            Err(FormatError::DefaultPathOnSingleFile)
        ));
    }

    #[test]
    fn default_path_and_disable_both_set_is_rejected() {
        let mut meta = Metadata::single_file("site");
        meta.subfiles
            .insert("a".to_string(), subfile("a", 0, 1));
        meta.default_path = Some("/a".to_string());
        meta.disable_default_path = true;
        assert!(matches!(
            meta.validate(),
            Err(FormatError::DefaultPathAndDisableBothSet)
        ));
    }

    #[test]
    fn for_path_resolves_default_at_root() {
        let mut meta = Metadata::single_file("site");
        meta.subfiles
            .insert("index.html".to_string(), subfile("index.html", 0, 100));
        meta.default_path = Some("/index.html".to_string());
        meta.validate().unwrap();

        let resolved = meta.for_path("/").unwrap();
        assert_eq!(resolved.filename, "index.html");
    }

    #[test]
    fn for_path_falls_back_to_the_lone_subfile_when_no_default_is_set() {
        let mut meta = Metadata::single_file("site");
        meta.subfiles
            .insert("about.html".to_string(), subfile("about.html", 0, 50));
        meta.validate().unwrap();

        let resolved = meta.for_path("/").unwrap();
        assert_eq!(resolved.filename, "about.html");
    }

    #[test]
    fn for_path_falls_back_to_index_html_among_several_subfiles() {
        let mut meta = Metadata::single_file("site");
        meta.subfiles
            .insert("index.html".to_string(), subfile("index.html", 0, 11));
        meta.subfiles
            .insert("about.html".to_string(), subfile("about.html", 11, 5));
        meta.validate().unwrap();

        let resolved = meta.for_path("/").unwrap();
        assert_eq!(resolved.filename, "index.html");
    }

    #[test]
    fn for_path_with_disabled_default_at_root_errors() {
        let mut meta = Metadata::single_file("site");
        meta.subfiles
            .insert("index.html".to_string(), subfile("index.html", 0, 100));
        meta.disable_default_path = true;
        meta.validate().unwrap();

        assert!(meta.for_path("/").is_err());
    }
}
