// Shared helpers for integration tests.
//
// A temporary workspace with its own home, cache and state directories, plus
// fakes for the network-facing contracts so remote modules can be resolved
// without touching the network.
#![allow(dead_code)]

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use workspaced::cancel::CancelToken;
use workspaced::commands::Workspace;
use workspaced::config::Config;
use workspaced::error::FetchError;
use workspaced::fetch::{Fetched, Fetcher, HashAlgorithm};
use workspaced::modules::providers::github::RefLookup;
use workspaced::modules::resolver::LockMode;
use workspaced::modules::{ProviderDeps, default_providers};
use workspaced::source::DesiredFile;
use workspaced::state::State;

/// A 40-hex commit; github sources pinned to it skip ref lookup.
pub const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

/// Gzipped tarball with every path under a single `top/` directory, the way
/// GitHub archives are laid out.
pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("top/{path}"), body.as_bytes())
            .expect("append tar entry");
    }
    let mut encoder = builder.into_inner().expect("finish tar");
    encoder.flush().expect("flush gzip");
    encoder.finish().expect("finish gzip")
}

/// Serves one archive for every URL and counts downloads.
pub struct CountingFetcher {
    body: Vec<u8>,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl CountingFetcher {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            body: tarball(files),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long per download, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn hash(&self) -> String {
        HashAlgorithm::Sha256.digest(&self.body)
    }
}

impl Fetcher for CountingFetcher {
    fn fetch(&self, urls: &[String], expected: Option<&str>) -> Result<Fetched, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let url = urls.first().ok_or(FetchError::NoUrls)?;
        workspaced::fetch::verify(url, self.body.clone(), expected)
    }
}

/// Ref lookup that knows no refs.
pub struct NoRefs;

impl RefLookup for NoRefs {
    fn resolve_ref(&self, repo: &str, reference: &str) -> Result<String, FetchError> {
        Err(FetchError::RefNotFound {
            repo: repo.to_string(),
            reference: reference.to_string(),
        })
    }
}

/// An isolated workspace backed by a [`tempfile::TempDir`].
///
/// Layout: `<tmp>/ws` (root), `<tmp>/home`, `<tmp>/cache`, `<tmp>/state`.
pub struct TestWorkspace {
    pub dir: tempfile::TempDir,
    pub fetcher: Arc<CountingFetcher>,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self::with_fetcher(CountingFetcher::new(&[]))
    }

    pub fn with_fetcher(fetcher: CountingFetcher) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        for sub in ["ws/home", "home", "cache", "state"] {
            std::fs::create_dir_all(dir.path().join(sub)).expect("create dir");
        }
        let ws = Self {
            dir,
            fetcher: Arc::new(fetcher),
        };
        ws.config("");
        ws
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("ws")
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    pub fn state_file(&self) -> PathBuf {
        self.dir.path().join("state/state.json")
    }

    /// Write `workspaced.toml` with the directory settings followed by
    /// `extra`.
    pub fn config(&self, extra: &str) -> &Self {
        let base = format!(
            "[workspaced]\nhome = {:?}\ncache_dir = {:?}\nstate_file = {:?}\nbin_dir = {:?}\n\n{extra}",
            self.home().display().to_string(),
            self.dir.path().join("cache").display().to_string(),
            self.state_file().display().to_string(),
            self.home().join("bin").display().to_string(),
        );
        self.write("workspaced.toml", &base)
    }

    /// Write `body` to `rel` under the workspace root.
    pub fn write(&self, rel: &str, body: &str) -> &Self {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        std::fs::write(&path, body).expect("write file");
        self
    }

    pub fn remove(&self, rel: &str) -> &Self {
        std::fs::remove_file(self.root().join(rel)).expect("remove file");
        self
    }

    pub fn read_home(&self, rel: &str) -> String {
        std::fs::read_to_string(self.home().join(rel)).expect("read home file")
    }

    pub fn open(&self, mode: LockMode) -> anyhow::Result<Workspace> {
        let config = Config::load(&self.root())?;
        let fetcher: Arc<dyn Fetcher> = self.fetcher.clone();
        let providers = default_providers(ProviderDeps {
            core_root: config.core_modules_dir.clone(),
            cache_root: config.cache_dir.clone(),
            fetcher,
            refs: Arc::new(NoRefs),
        });
        Workspace::with_providers(config, providers, mode)
    }

    pub fn desired(&self) -> anyhow::Result<Vec<DesiredFile>> {
        self.open(LockMode::Enforce)?.desired(&CancelToken::new())
    }

    pub fn state(&self) -> State {
        State::load(&self.state_file()).expect("load state")
    }
}

pub fn rel(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .expect("under base")
        .display()
        .to_string()
}
