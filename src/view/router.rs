use parking_lot::Mutex;

/// Well-known paths of the hosting application.
pub mod routes {
    /// The public landing page.
    pub const PUBLIC_ENTRY: &str = "/";
    /// Where authenticated users land after sign-in.
    pub const PROTECTED_LANDING: &str = "/projects";
}

/// The router is consumed, not owned: the lifecycle core asks it to
/// navigate and to report the current location, nothing more.
pub trait ViewRouter: Send + Sync {
    fn current_path(&self) -> String;

    /// Navigate to `path`; `replace` swaps the current history entry
    /// instead of pushing a new one.
    fn navigate(&self, path: &str, replace: bool);
}

struct RouterInner {
    path: String,
    history: Vec<(String, bool)>,
}

/// Router that records navigations, for tests and the demo harness.
pub struct RecordingRouter {
    inner: Mutex<RouterInner>,
}

impl RecordingRouter {
    pub fn new() -> Self {
        Self::at(routes::PUBLIC_ENTRY)
    }

    pub fn at(path: &str) -> Self {
        Self {
            inner: Mutex::new(RouterInner {
                path: path.to_string(),
                history: Vec::new(),
            }),
        }
    }

    /// All navigations performed so far, as `(path, replace)` pairs.
    pub fn navigations(&self) -> Vec<(String, bool)> {
        self.inner.lock().history.clone()
    }

    /// Simulate the user moving around outside the lifecycle core.
    pub fn set_path(&self, path: &str) {
        self.inner.lock().path = path.to_string();
    }
}

impl Default for RecordingRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRouter for RecordingRouter {
    fn current_path(&self) -> String {
        self.inner.lock().path.clone()
    }

    fn navigate(&self, path: &str, replace: bool) {
        let mut inner = self.inner.lock();
        inner.path = path.to_string();
        inner.history.push((path.to_string(), replace));
    }
}
