use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Include/exclude globs matched against `/`-separated entry names. With no
/// include patterns every name is included.
#[derive(Clone, Debug, Default)]
pub struct Filters {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl Filters {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        let include = if includes.is_empty() { None } else { Some(build_set(includes)?) };
        Ok(Self { include, exclude: build_set(excludes)? })
    }

    pub fn allows(&self, name: &str) -> bool {
        self.include.as_ref().map_or(true, |s| s.is_match(name)) && !self.exclude.is_match(name)
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for g in patterns {
        b.add(glob(g)?);
    }
    b.build().map_err(|e| Error::Config(e.to_string()))
}

fn glob(pattern: &str) -> Result<Glob> {
    Glob::new(pattern).map_err(|e| Error::Config(format!("bad glob {:?}: {}", pattern, e)))
}

/// One regular file that will become a header entry.
#[derive(Clone, Debug)]
pub struct InputFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

fn utf8_name(path: &Path, rel: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(c) => match c.to_str() {
                Some(s) => parts.push(s),
                None => {
                    return Err(Error::Format {
                        name: path.to_string_lossy().into_owned(),
                        reason: "file name is not valid UTF-8".into(),
                    })
                }
            },
            other => {
                return Err(Error::Format {
                    name: path.to_string_lossy().into_owned(),
                    reason: format!("unexpected path component {:?}", other),
                })
            }
        }
    }
    Ok(parts.join("/"))
}

/// List the files under `input` in stream order.
///
/// A regular file yields itself, named by its base name. A directory is walked
/// recursively in file-name order; symlinks and special files are skipped, as
/// is anything under `skip` (the encoder's own output directory) unless `skip`
/// is `input` itself.
pub fn discover(input: &Path, filters: &Filters, skip: Option<&Path>) -> Result<Vec<InputFile>> {
    let md = match std::fs::metadata(input) {
        Ok(md) => md,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::InvalidInput { path: input.to_path_buf(), reason: "not found".into() })
        }
        Err(e) => return Err(Error::read(input, e)),
    };

    if md.is_file() {
        let base = input.file_name().ok_or_else(|| Error::InvalidInput {
            path: input.to_path_buf(),
            reason: "no file name".into(),
        })?;
        let name = utf8_name(input, Path::new(base))?;
        return Ok(vec![InputFile { path: input.to_path_buf(), name, size: md.len() }]);
    }
    if !md.is_dir() {
        return Err(Error::InvalidInput {
            path: input.to_path_buf(),
            reason: "neither a regular file nor a directory".into(),
        });
    }

    let root = std::fs::canonicalize(input).map_err(|e| Error::read(input, e))?;
    let skip = skip.map(Path::to_path_buf);
    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || skip.as_deref() != Some(e.path()));
    for ent in walker {
        let ent = ent.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            Error::read(path, e.into())
        })?;
        if !ent.file_type().is_file() {
            continue;
        }
        let path = ent.path();
        let rel = pathdiff::diff_paths(path, &root).unwrap_or_else(|| path.to_path_buf());
        let name = utf8_name(path, &rel)?;
        if !filters.allows(&name) {
            continue;
        }
        let size = ent.metadata().map_err(|e| Error::read(path, e.into()))?.len();
        files.push(InputFile { path: path.to_path_buf(), name, size });
    }
    Ok(files)
}
