use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),
    }

    impl Error {
        pub fn path(&self) -> &std::path::Path {
            match self {
                Error::SingleIO(_, path, _) => path,
            }
        }
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        self::mkdir_all(dir)?;
    }
    self::write(filepath, contents)
}

#[must_use]
pub fn read(filepath: impl AsRef<Path>) -> Result<Vec<u8>> {
    fs::read(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn open_file(filepath: impl AsRef<Path>) -> Result<File> {
    File::open(&filepath)
        .map_err(|e| Error::SingleIO("Cannot open file", filepath.as_ref().to_owned(), e))
}

/// Create (or truncate) a file for writing.
#[must_use]
pub fn create_file(filepath: impl AsRef<Path>) -> Result<File> {
    File::create(&filepath)
        .map_err(|e| Error::SingleIO("Cannot create file", filepath.as_ref().to_owned(), e))
}

/// Looks for `filename` in `dir` and then in each of its ancestors.
pub fn find_file_in_ancestors(dir: impl AsRef<Path>, filename: &str) -> Option<PathBuf> {
    let found = dir
        .as_ref()
        .ancestors()
        .map(|dir| dir.join(filename))
        .find(|path| path.is_file());
    log::debug!("find_file_in_ancestors({}): {:?}", filename, found);
    found
}

/// Normalize the path
/// ```
/// use fsutil::normalize_path;
/// use std::path::Path;
///
/// assert_eq!(normalize_path("./TestCase/./1.in"), Path::new("TestCase/1.in"));
/// assert_eq!(normalize_path("Solution/../TestCase/."), Path::new("TestCase"));
/// assert_eq!(normalize_path("../foo/../hello"), Path::new("../hello"));
/// assert_eq!(normalize_path("/"), Path::new("/"));
/// assert_eq!(normalize_path("./foo/"), Path::new("foo"));
/// assert_eq!(normalize_path("./././."), Path::new("."));
/// ```
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    use ::std::path::Component;
    let components = path.as_ref().components();
    let mut stack = Vec::with_capacity(components.size_hint().1.unwrap_or(4));
    for c in components {
        match c {
            Component::CurDir => (),
            Component::ParentDir
                if matches!(stack.last(), Some(Component::Normal(_))) =>
            {
                stack.pop();
            }
            _ => {
                stack.push(c);
            }
        }
    }
    if stack.is_empty() {
        stack.push(Component::CurDir);
    }
    stack.iter().collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_with_mkdir_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a/b/c.txt");
        write_with_mkdir(&path, "hello").unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn read_missing_file_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nothing.txt");
        let err = read(&path).unwrap_err();
        assert_eq!(err.path(), path);
        assert!(err.to_string().starts_with("Cannot read file"));
    }

    #[test]
    fn find_file_in_ancestors_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        let deep = tmp.path().join("x/y/z");
        mkdir_all(&deep).unwrap();
        write(tmp.path().join("x/marker.toml"), "").unwrap();

        let found = find_file_in_ancestors(&deep, "marker.toml").unwrap();
        assert_eq!(found, tmp.path().join("x/marker.toml"));
        assert_eq!(find_file_in_ancestors(&deep, "absent.toml"), None);
    }
}
