//! Repository handle: the on-disk layout under `.tessera/` and the
//! collaborators every command needs.
//!
//! ```text
//! <workdir>/.tessera/
//!   repo.db          refs and HEAD
//!   objects/         content-addressed objects
//!   annotations.db   diff annotation cache, created on first store
//!   working.db       working copy, only if one was created
//!   config.toml
//! ```

#![allow(clippy::result_large_err)]

use std::fs;
use std::path::{Path, PathBuf};
use tessera_core::annotations::{AnnotationStore, NullAnnotations};
use tessera_core::errors::{ExError, ExErrorKind};
use tessera_core::object::{Commit, Object, ObjectId, ObjectStore, Signature, Tree};
use tessera_core::working_copy::WorkingCopy;
use tessera_store::config::UserConfig;
use tessera_store::errors::{io_error, Result};
use tessera_store::refs::branch_ref;
use tessera_store::{CasObjectStore, RefStore, RepoConfig, SqliteAnnotations, SqliteWorkingCopy};

pub const REPO_DIRNAME: &str = ".tessera";
const REPO_DB: &str = "repo.db";
const OBJECTS_DIR: &str = "objects";
const ANNOTATIONS_DB: &str = "annotations.db";
const WORKING_COPY_DB: &str = "working.db";
const CONFIG_FILE: &str = "config.toml";

/// Options for [`Repository::init`]
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub branch: String,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    /// Also create a working copy checked out at the root commit
    pub working_copy: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            user_name: None,
            user_email: None,
            working_copy: false,
        }
    }
}

pub struct Repository {
    workdir: PathBuf,
    store: CasObjectStore,
    refs: RefStore,
    config: RepoConfig,
    annotations: Box<dyn AnnotationStore>,
    working_copy: Option<SqliteWorkingCopy>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("workdir", &self.workdir)
            .field("working_copy", &self.working_copy.is_some())
            .finish()
    }
}

/// Id of the tree with no entries, without writing it
///
/// # Errors
///
/// Only fails if the empty tree cannot be framed.
pub fn empty_tree_id() -> Result<ObjectId> {
    let framed = Object::Tree(Tree::default()).encode()?;
    Ok(ObjectId::for_framed(&framed))
}

impl Repository {
    /// Create a repository in `workdir` with an empty root commit on
    /// `options.branch`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `workdir` already holds a repository,
    /// `MissingIdentity` if no committer identity is configured, or an
    /// I/O or database failure.
    pub fn init(workdir: impl AsRef<Path>, options: &InitOptions) -> Result<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        let dot = workdir.join(REPO_DIRNAME);
        if dot.exists() {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("init")
                .with_message(format!(
                    "{} is already a tessera repository",
                    workdir.display()
                )));
        }
        let config = RepoConfig {
            user: UserConfig {
                name: options.user_name.clone(),
                email: options.user_email.clone(),
            },
            ..RepoConfig::default()
        };
        let committer = config.committer()?;

        fs::create_dir_all(dot.join(OBJECTS_DIR)).map_err(|e| io_error("init", e))?;
        config.save(&dot.join(CONFIG_FILE))?;
        let refs = RefStore::open(dot.join(REPO_DB))?;
        refs.set_head(&options.branch)?;

        let mut repo = Self::assemble(workdir, config, refs, None);
        let tree = repo.store.write_tree(&Tree::default())?;
        let head = branch_ref(&options.branch);
        repo.write_commit(&head, None, tree, committer.clone(), committer, "Initial commit")?;

        if options.working_copy {
            repo.create_working_copy()?;
        }
        tracing::info!(
            workdir = %repo.workdir.display(),
            branch = %options.branch,
            "initialised repository"
        );
        Ok(repo)
    }

    /// Open the repository in `workdir`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `workdir` holds no repository, or a config or
    /// database failure.
    pub fn open(workdir: impl AsRef<Path>) -> Result<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        let dot = workdir.join(REPO_DIRNAME);
        if !dot.join(REPO_DB).exists() {
            return Err(ExError::new(ExErrorKind::NotFound)
                .with_op("open_repository")
                .with_message(format!(
                    "Not a tessera repository: {}",
                    workdir.display()
                )));
        }

        let config = RepoConfig::load(&dot.join(CONFIG_FILE))?;
        let refs = RefStore::open(dot.join(REPO_DB))?;
        let wc_path = dot.join(WORKING_COPY_DB);
        let working_copy = if wc_path.exists() {
            Some(SqliteWorkingCopy::open(&wc_path)?)
        } else {
            None
        };
        Ok(Self::assemble(workdir, config, refs, working_copy))
    }

    fn assemble(
        workdir: PathBuf,
        config: RepoConfig,
        refs: RefStore,
        working_copy: Option<SqliteWorkingCopy>,
    ) -> Self {
        let dot = workdir.join(REPO_DIRNAME);
        let annotations: Box<dyn AnnotationStore> = if config.annotations.enabled {
            Box::new(SqliteAnnotations::new(dot.join(ANNOTATIONS_DB)))
        } else {
            Box::new(NullAnnotations)
        };
        Self {
            store: CasObjectStore::new(dot.join(OBJECTS_DIR)),
            workdir,
            refs,
            config,
            annotations,
            working_copy,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn dot_dir(&self) -> PathBuf {
        self.workdir.join(REPO_DIRNAME)
    }

    pub fn annotations_path(&self) -> PathBuf {
        self.dot_dir().join(ANNOTATIONS_DB)
    }

    pub fn store(&self) -> &CasObjectStore {
        &self.store
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn annotations(&self) -> &dyn AnnotationStore {
        self.annotations.as_ref()
    }

    pub fn working_copy(&self) -> Option<&dyn WorkingCopy> {
        self.working_copy.as_ref().map(|wc| wc as &dyn WorkingCopy)
    }

    /// Full name of the branch HEAD points at
    ///
    /// # Errors
    ///
    /// Returns `UnknownRef` if HEAD is not set.
    pub fn head_ref(&self) -> Result<String> {
        self.refs.head_branch()?.ok_or_else(|| {
            ExError::new(ExErrorKind::UnknownRef)
                .with_item("HEAD")
                .with_message("HEAD does not point at a branch")
        })
    }

    /// Resolve a ref, branch name, `HEAD` or commit id to a commit id
    ///
    /// # Errors
    ///
    /// Returns `UnknownRef` if nothing matches.
    pub fn resolve(&self, refish: &str) -> Result<ObjectId> {
        self.refs.resolve_refish(&self.store, refish)
    }

    /// # Errors
    ///
    /// Returns `NotFound` or `CorruptObject` from the object store.
    pub fn read_commit(&self, id: &ObjectId) -> Result<Commit> {
        self.store.read_commit(id)
    }

    /// Write a commit and move `ref_name` onto it
    ///
    /// The ref only moves if it still points at `parent`; `parent = None`
    /// requires the ref not to exist yet.
    ///
    /// # Errors
    ///
    /// Returns `Concurrency` if the ref moved, or a store failure.
    pub fn write_commit(
        &mut self,
        ref_name: &str,
        parent: Option<&ObjectId>,
        tree: ObjectId,
        author: Signature,
        committer: Signature,
        message: &str,
    ) -> Result<ObjectId> {
        let commit = Commit {
            tree,
            parents: parent.into_iter().cloned().collect(),
            author,
            committer,
            message: message.to_string(),
        };
        let id = self.store.write_commit(&commit)?;
        self.refs.update_ref(ref_name, &id, parent)?;
        tracing::debug!(
            commit = id.short(),
            ref_name,
            tree = commit.tree.short(),
            "wrote commit"
        );
        Ok(id)
    }

    /// Commit `tree` on top of the HEAD branch as the configured user
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentity`, `UnknownRef` on an unborn HEAD, or as
    /// [`Repository::write_commit`].
    pub fn commit_on_head(&mut self, tree: ObjectId, message: &str) -> Result<ObjectId> {
        let committer = self.config.committer()?;
        let head = self.head_ref()?;
        let parent = self.refs.read_ref(&head)?;
        self.write_commit(
            &head,
            parent.as_ref(),
            tree,
            committer.clone(),
            committer,
            message,
        )
    }

    /// Create branch `name` pointing at `target`
    ///
    /// # Errors
    ///
    /// Returns `Concurrency` if the branch already exists, or a store failure.
    pub fn create_branch(&mut self, name: &str, target: &ObjectId) -> Result<String> {
        self.read_commit(target)?;
        let ref_name = branch_ref(name);
        self.refs.update_ref(&ref_name, target, None)?;
        Ok(ref_name)
    }

    /// Create `working.db` (if needed) and check out the HEAD commit into it
    ///
    /// # Errors
    ///
    /// Returns `UnknownRef` on an unborn HEAD, or a store failure.
    pub fn create_working_copy(&mut self) -> Result<()> {
        if self.working_copy.is_none() {
            self.working_copy = Some(SqliteWorkingCopy::open(
                self.dot_dir().join(WORKING_COPY_DB),
            )?);
        }
        self.reset_working_copy()
    }

    /// Discard working copy edits and check out the HEAD commit
    ///
    /// Does nothing for a repository without a working copy.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRef` on an unborn HEAD, or a store failure.
    pub fn reset_working_copy(&self) -> Result<()> {
        let Some(wc) = &self.working_copy else {
            return Ok(());
        };
        let head = self.resolve("HEAD")?;
        let tree = self.store.read_commit(&head)?.tree;
        wc.reset(&self.store, &tree)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options() -> InitOptions {
        InitOptions {
            user_name: Some("Test User".to_string()),
            user_email: Some("test@example.com".to_string()),
            ..InitOptions::default()
        }
    }

    #[test]
    fn test_init_writes_root_commit() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), &options()).unwrap();

        assert_eq!(repo.head_ref().unwrap(), "refs/heads/main");
        let head = repo.resolve("HEAD").unwrap();
        let commit = repo.read_commit(&head).unwrap();
        assert!(commit.parents.is_empty());
        assert_eq!(commit.tree, empty_tree_id().unwrap());
        assert_eq!(commit.committer.name, "Test User");
        assert!(repo.working_copy().is_none());
    }

    #[test]
    fn test_init_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path(), &options()).unwrap();
        let err = Repository::init(dir.path(), &options()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_init_requires_identity() {
        let dir = TempDir::new().unwrap();
        let err = Repository::init(dir.path(), &InitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MissingIdentity);
        assert!(!dir.path().join(REPO_DIRNAME).exists());
    }

    #[test]
    fn test_open_missing_repository() {
        let dir = TempDir::new().unwrap();
        let err = Repository::open(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }

    #[test]
    fn test_open_finds_working_copy() {
        let dir = TempDir::new().unwrap();
        let opts = InitOptions {
            working_copy: true,
            ..options()
        };
        drop(Repository::init(dir.path(), &opts).unwrap());

        let repo = Repository::open(dir.path()).unwrap();
        let wc = repo.working_copy().unwrap();
        assert_eq!(wc.base_tree().unwrap(), Some(empty_tree_id().unwrap()));
    }

    #[test]
    fn test_commit_on_head_advances_branch() {
        let dir = TempDir::new().unwrap();
        let mut repo = Repository::init(dir.path(), &options()).unwrap();
        let root = repo.resolve("HEAD").unwrap();

        let tree = repo.read_commit(&root).unwrap().tree;
        let next = repo.commit_on_head(tree, "again").unwrap();

        assert_eq!(repo.resolve("main").unwrap(), next);
        assert_eq!(repo.resolve("HEAD^").unwrap(), root);
    }

    #[test]
    fn test_create_branch_once() {
        let dir = TempDir::new().unwrap();
        let mut repo = Repository::init(dir.path(), &options()).unwrap();
        let root = repo.resolve("HEAD").unwrap();

        assert_eq!(repo.create_branch("side", &root).unwrap(), "refs/heads/side");
        assert_eq!(repo.resolve("side").unwrap(), root);
        assert_eq!(repo.head_ref().unwrap(), "refs/heads/main");

        let err = repo.create_branch("side", &root).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Concurrency);
    }
}
