//! Import path alias.
//!
//! `@/components/Button` resolves to `<source root>/components/Button`. A
//! specifier matches only when it equals the symbol or continues with `/`,
//! so scoped packages such as `@scope/pkg` pass through untouched.

use std::path::{Component, Path, PathBuf};

pub const DEFAULT_SYMBOL: &str = "@";

/// Extensions tried by `resolve_existing`, in order.
pub const DEFAULT_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "json"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAlias {
    pub symbol: String,
    pub target: PathBuf,
}

impl PathAlias {
    #[must_use]
    pub fn new(symbol: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self { symbol: symbol.into(), target: target.into() }
    }

    /// Map an aliased specifier onto the target directory.
    ///
    /// Returns `None` when the specifier does not use the alias or when its
    /// `..` components would leave the target directory.
    #[must_use]
    pub fn resolve(&self, specifier: &str) -> Option<PathBuf> {
        let rest = specifier.strip_prefix(self.symbol.as_str())?;
        if rest.is_empty() {
            return Some(self.target.clone());
        }
        let rest = rest.strip_prefix('/')?;

        let mut resolved = self.target.clone();
        let mut depth = 0usize;
        for component in Path::new(rest).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    depth = depth.checked_sub(1)?;
                    resolved.pop();
                }
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }

    /// Resolve a specifier to an existing file, probing extensions and
    /// directory `index` files the way a bundler does.
    #[must_use]
    pub fn resolve_existing(&self, specifier: &str, extensions: &[&str]) -> Option<PathBuf> {
        let base = self.resolve(specifier)?;
        if base.is_file() {
            return Some(base);
        }

        let with_ext = extensions.iter().map(|ext| append_extension(&base, ext));
        let index = extensions.iter().map(|ext| base.join(format!("index.{ext}")));
        with_ext.chain(index).find(|candidate| candidate.is_file())
    }
}

fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut raw = base.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

#[cfg(test)]
#[path = "alias_test.rs"]
mod tests;
