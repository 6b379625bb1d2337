//! Runtime support for the code generated by `#[test_files]`.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Test source to touch when the set of files changed
    pub rs: String,
    pub dir: String,
    pub arg_specs: Vec<ArgSpec>,
}

#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub suffix: String,
}

/// Fails when the files on disk differ from the ones seen at compile time,
/// so that the generated test list never silently goes stale.
pub fn check(config: &WalkConfig, expected: Vec<String>) {
    let expected = expected.into_iter().collect::<BTreeSet<_>>();
    let actual = matched_files(config).unwrap_or_else(|e| panic!("{}", e));
    if expected == actual {
        return;
    }
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    utime::set_file_times(&config.rs, now as i64, now as i64)
        .unwrap_or_else(|e| panic!("Error touching {}: {}", config.rs, e));
    panic!(
        "Changes detected in testcases. Please rerun the test.\n  missing: {:?}\n  extra: {:?}",
        expected.difference(&actual).collect::<Vec<_>>(),
        actual.difference(&expected).collect::<Vec<_>>(),
    )
}

fn matched_files(config: &WalkConfig) -> io::Result<BTreeSet<String>> {
    let mut matched = BTreeSet::new();
    for entry in WalkDir::new(&config.dir) {
        let entry = entry?;
        let file_name = relative_name(entry.path(), Path::new(&config.dir))?;
        if config
            .arg_specs
            .iter()
            .any(|spec| file_name.ends_with(&spec.suffix))
        {
            matched.insert(file_name);
        }
    }
    Ok(matched)
}

fn relative_name(path: &Path, dir: &Path) -> io::Result<String> {
    let name = path
        .strip_prefix(dir)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    name.to_str()
        .map(str::to_owned)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Non-UTF8 file name"))
}
