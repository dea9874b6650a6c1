//! Insertion-ordered kernel storage and the stock-file search order.
//!
//! A reload clears the registry, then merges every record from every resolved
//! source, in a fixed priority order:
//!
//! 1. `kernels.usr` (user-defined kernels)
//! 2. `kernels.gen` (general-purpose kernels)
//! 3. `kernels.def` (the default stock; if no such file resolves on disk,
//!    the copy embedded in the binary is used instead)
//!
//! Each name is resolved against every candidate directory in
//! [`KernelSources`], in directory order. Missing or unreadable files are
//! silently skipped; an empty directory list still yields the embedded
//! defaults. Names are not deduplicated; [`KernelRegistry::get`] returns the
//! first match, so earlier sources shadow later ones.

use super::ConvKernel;
use super::parse::parse_records;
use std::path::PathBuf;

/// User-defined stock file name.
pub const USER_STOCK: &str = "kernels.usr";
/// General-purpose stock file name.
pub const GENERAL_STOCK: &str = "kernels.gen";
/// Default stock file name (overrides the embedded copy when present).
pub const DEFAULT_STOCK: &str = "kernels.def";

const EMBEDDED_STOCK: &str = include_str!("../../data/kernels.def");

/// Candidate directories to resolve stock files against, in priority order.
#[derive(Debug, Clone, Default)]
pub struct KernelSources {
    dirs: Vec<PathBuf>,
}

impl KernelSources {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

/// Ordered, named collection of convolution kernels.
#[derive(Debug, Default)]
pub struct KernelRegistry {
    kernels: Vec<ConvKernel>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry loaded from `sources` (see the module docs for the order).
    pub fn load(sources: &KernelSources) -> Self {
        let mut registry = Self::new();
        registry.reload(sources);
        registry
    }

    /// Clear the registry and repopulate from `sources`. Deterministic for a
    /// fixed set of files: same files, same entries, same order.
    pub fn reload(&mut self, sources: &KernelSources) {
        self.kernels.clear();

        for name in [USER_STOCK, GENERAL_STOCK] {
            for dir in sources.dirs() {
                if let Ok(text) = std::fs::read_to_string(dir.join(name)) {
                    self.kernels.extend(parse_records(&text));
                }
            }
        }

        let mut found_default = false;
        for dir in sources.dirs() {
            if let Ok(text) = std::fs::read_to_string(dir.join(DEFAULT_STOCK)) {
                found_default = true;
                self.kernels.extend(parse_records(&text));
            }
        }
        if !found_default {
            self.kernels.extend(parse_records(EMBEDDED_STOCK));
        }
    }

    /// First kernel whose name equals `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ConvKernel> {
        self.kernels.iter().find(|k| k.name() == name)
    }

    /// Kernels in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ConvKernel> {
        self.kernels.iter()
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}
