//! Temporary files and directories that disappear when the test ends.

use crate::errors::Outcome;
use crate::lifecycle::TestTools;
use parking_lot::Mutex;
use std::path::PathBuf;

#[derive(Debug, Default)]
struct TempFiles {
    dir: Option<PathBuf>,
    count: usize,
}

/// Hands out scratch paths. Every directory is registered as a service on the
/// test, so it is removed during termination.
#[derive(Debug)]
pub struct FileServices {
    tools: TestTools,
    temp_files: Mutex<TempFiles>,
}

impl FileServices {
    pub fn new(tools: TestTools) -> Self {
        Self {
            tools,
            temp_files: Mutex::new(TempFiles::default()),
        }
    }

    /// Creates a fresh directory named after the test.
    #[track_caller]
    pub fn new_temp_dir(&self) -> Outcome<PathBuf> {
        let dir = self.tools.ok(
            tempfile::Builder::new()
                .prefix(&temp_prefix(self.tools.name()))
                .tempdir(),
        )?;
        let path = dir.path().to_path_buf();
        tracing::debug!(test = %self.tools.name(), dir = %path.display(), "temp dir created");
        self.tools.add_service(dir);
        Ok(path)
    }

    /// Returns a new path (`tempfile-N`) inside a directory shared by all temp
    /// files of this test. The file itself is not created.
    #[track_caller]
    pub fn new_temp_file(&self) -> Outcome<PathBuf> {
        let mut state = self.temp_files.lock();
        let dir = match &state.dir {
            Some(dir) => dir.clone(),
            None => {
                let dir = self.new_temp_dir()?;
                state.dir = Some(dir.clone());
                dir
            }
        };
        let path = dir.join(format!("tempfile-{}", state.count));
        state.count += 1;
        Ok(path)
    }
}

fn temp_prefix(test_name: &str) -> String {
    let mut prefix: String = test_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    prefix.push('-');
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::golden::MemoryStorage;
    use crate::lifecycle::TestSession;
    use crate::reporter::RecordingReporter;
    use std::sync::Arc;

    fn session() -> TestSession {
        TestSession::builder()
            .reporter(Arc::new(RecordingReporter::new("files::scratch")))
            .config(HarnessConfig::default().colors(false).testdata_root("td"))
            .storage(Arc::new(MemoryStorage::new()))
            .begin()
    }

    #[test]
    fn temp_dirs_are_removed_at_termination() {
        let session = session();
        let files = FileServices::new(session.tools().clone());
        let dir = files.new_temp_dir().unwrap();
        assert!(dir.is_dir());
        assert!(dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap()
            .starts_with("files__scratch-"));
        session.finish();
        assert!(!dir.exists());
    }

    #[test]
    fn temp_files_share_one_directory() {
        let session = session();
        let files = FileServices::new(session.tools().clone());
        let first = files.new_temp_file().unwrap();
        let second = files.new_temp_file().unwrap();
        assert_eq!(first.parent(), second.parent());
        assert!(first.ends_with("tempfile-0"));
        assert!(second.ends_with("tempfile-1"));
        assert_eq!(session.service_count(), 1);

        std::fs::write(&first, b"scratch").unwrap();
        session.finish();
        assert!(!first.exists());
    }
}
