//! Property-based test generators using proptest.
//!
//! Generated paths always end in an extension and directory components
//! never contain a dot, so a generated file path is never also a directory.

use proptest::prelude::*;
use shadowsave_core::Transaction;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A save tree: file contents by forward-slash relative path.
pub type SaveTree = BTreeMap<String, Vec<u8>>;

/// Strategy for generating relative save file paths.
pub fn save_path_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}(/[a-z0-9]{1,4}){0,2}\\.(sav|map|zzip)")
        .expect("Invalid regex")
}

/// Strategy for generating save file contents.
pub fn save_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for generating a save tree with `size` files.
pub fn save_tree_strategy(
    size: impl Into<prop::collection::SizeRange>,
) -> impl Strategy<Value = SaveTree> {
    prop::collection::btree_map(save_path_strategy(), save_data_strategy(), size)
}

/// An operation a save routine performs on the live directory.
#[derive(Debug, Clone)]
pub enum SaveOperation {
    /// Write (or replace) a file
    Write {
        /// Relative path
        path: String,
        /// File contents
        data: Vec<u8>,
    },
    /// Remove a file
    Remove {
        /// Relative path
        path: String,
    },
}

impl SaveOperation {
    /// Applies the operation through `txn`.
    pub fn apply(&self, txn: &Transaction) {
        match self {
            Self::Write { path, data } => {
                txn.write_file(path, data).expect("Failed to write save file");
            }
            Self::Remove { path } => {
                let _ = fs::remove_file(txn.save_dir().join(path));
            }
        }
    }

    /// Applies the operation to a model of the tree.
    pub fn apply_to_model(&self, tree: &mut SaveTree) {
        match self {
            Self::Write { path, data } => {
                tree.insert(path.clone(), data.clone());
            }
            Self::Remove { path } => {
                tree.remove(path);
            }
        }
    }
}

/// Strategy for operations against a tree holding `existing` paths.
pub fn save_operation_strategy(existing: Vec<String>) -> BoxedStrategy<SaveOperation> {
    let fresh = (save_path_strategy(), save_data_strategy())
        .prop_map(|(path, data)| SaveOperation::Write { path, data });
    if existing.is_empty() {
        return fresh.boxed();
    }

    let overwrite = (prop::sample::select(existing.clone()), save_data_strategy())
        .prop_map(|(path, data)| SaveOperation::Write { path, data });
    let remove = prop::sample::select(existing).prop_map(|path| SaveOperation::Remove { path });

    prop_oneof![
        2 => fresh,
        3 => overwrite,
        1 => remove,
    ]
    .boxed()
}

/// Strategy for an initial tree plus the operations of one save.
pub fn save_scenario_strategy() -> impl Strategy<Value = (SaveTree, Vec<SaveOperation>)> {
    save_tree_strategy(0..12).prop_flat_map(|tree| {
        let existing: Vec<String> = tree.keys().cloned().collect();
        let ops = prop::collection::vec(save_operation_strategy(existing), 0..10);
        (Just(tree), ops)
    })
}

/// Writes `tree` into `root`.
pub fn write_tree(root: &Path, tree: &SaveTree) {
    for (rel, data) in tree {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, data).expect("Failed to write save file");
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 500,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 16,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
