use std::path::PathBuf;

/// Resolves shared code fragments pulled in by `Script` includes.
pub trait ModuleResolver {
    fn resolve(&self, id: &str) -> Option<String>;
}

impl<F> ModuleResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, id: &str) -> Option<String> {
        self(id)
    }
}

/// Resolver for graphs without includes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModules;

impl ModuleResolver for NoModules {
    fn resolve(&self, _id: &str) -> Option<String> {
        None
    }
}

/// Reads `<root>/<id>.wgsl`.
#[derive(Debug, Clone)]
pub struct DirectoryModules {
    root: PathBuf,
}

impl DirectoryModules {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModuleResolver for DirectoryModules {
    fn resolve(&self, id: &str) -> Option<String> {
        if id.contains("..") || id.contains('/') || id.contains('\\') {
            log::warn!("refusing module id with path separators: {id}");
            return None;
        }
        let path = self.root.join(format!("{id}.wgsl"));
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                log::debug!("module {} not readable at {}: {e}", id, path.display());
                None
            }
        }
    }
}
