//! Version-control primitives backed by libgit2.
//!
//! Everything above this module talks to a [`ProjectRepository`]; only this
//! file touches `git2` directly.

use crate::error::{Error, Result};
use crate::models::{CommitAuthor, RemoteCredential};
use chrono::{DateTime, Utc};
use git2::build::RepoBuilder;
use git2::{
    BranchType, Cred, ErrorCode, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks,
    Repository, Signature, Time,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CREDENTIALS_REJECTED: &str = "remote rejected the supplied credentials";

/// The repository operations a watch session needs. Implementations are not
/// required to be thread-safe; callers serialize access.
pub trait ProjectRepository: Send {
    fn workdir(&self) -> &Path;

    /// Stages the whole working tree, including deletions.
    fn stage_all(&mut self) -> Result<()>;

    /// Commits the staged tree on the current branch and returns the new
    /// revision id.
    fn commit(
        &mut self,
        author: &CommitAuthor,
        message: &str,
        when: DateTime<Utc>,
    ) -> Result<String>;

    fn push(&mut self, remote: &str, refspec: &str, credential: &RemoteCredential) -> Result<()>;
}

pub struct GitRepository {
    repo: Repository,
    workdir: PathBuf,
}

impl GitRepository {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|e| match e.code() {
            ErrorCode::NotFound => Error::RepositoryNotFound(path.to_path_buf()),
            _ => Error::Git(e),
        })?;
        Self::from_repository(repo)
    }

    pub fn clone_remote(url: &str, path: &Path, credential: &RemoteCredential) -> Result<Self> {
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(credential_callbacks(credential));

        let repo = RepoBuilder::new()
            .fetch_options(fetch)
            .clone(url, path)
            .map_err(|source| {
                if is_auth_failure(&source) {
                    Error::AuthenticationFailed(credential.username.clone())
                } else {
                    Error::CloneFailed {
                        url: url.to_string(),
                        source,
                    }
                }
            })?;

        info!("Cloned {} into {:?}", url, path);
        Self::from_repository(repo)
    }

    /// Opens the repository at `path`, cloning `url` into it first when the
    /// path does not exist yet.
    pub fn open_or_clone(path: &Path, url: &str, credential: &RemoteCredential) -> Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            info!("{:?} does not exist, cloning {}", path, url);
            Self::clone_remote(url, path, credential)
        }
    }

    fn from_repository(repo: Repository) -> Result<Self> {
        let workdir = repo
            .workdir()
            .ok_or_else(|| Error::BareRepository(repo.path().to_path_buf()))?
            .to_path_buf();

        Ok(Self { repo, workdir })
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        let mut refs = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.get().name() {
                refs.push(name.to_string());
            }
        }
        Ok(refs)
    }
}

impl ProjectRepository for GitRepository {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn stage_all(&mut self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;
        Ok(())
    }

    fn commit(
        &mut self,
        author: &CommitAuthor,
        message: &str,
        when: DateTime<Utc>,
    ) -> Result<String> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree_id,
            None => tree.is_empty(),
        };
        if unchanged {
            return Err(Error::NothingToCommit);
        }

        let signature = Signature::new(&author.name, &author.email, &Time::new(when.timestamp(), 0))?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        debug!("Committed {} on {:?}", oid, self.workdir);
        Ok(oid.to_string())
    }

    fn push(&mut self, remote: &str, refspec: &str, credential: &RemoteCredential) -> Result<()> {
        let mut origin = self.repo.find_remote(remote).map_err(|e| match e.code() {
            ErrorCode::NotFound | ErrorCode::InvalidSpec => Error::RemoteNotFound(remote.to_string()),
            _ => Error::Git(e),
        })?;

        let refspecs = expand_refspec(refspec, &self.local_branches()?)?;
        if refspecs.is_empty() {
            return Err(Error::NoBranches);
        }

        let mut rejected: Vec<(String, String)> = Vec::new();
        {
            let mut callbacks = credential_callbacks(credential);
            callbacks.push_update_reference(|reference, status| {
                if let Some(reason) = status {
                    rejected.push((reference.to_string(), reason.to_string()));
                }
                Ok(())
            });

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);

            origin
                .push(&refspecs, Some(&mut options))
                .map_err(|e| {
                    if is_auth_failure(&e) {
                        Error::AuthenticationFailed(credential.username.clone())
                    } else {
                        Error::Git(e)
                    }
                })?;
        }

        if let Some((reference, reason)) = rejected.into_iter().next() {
            return Err(Error::PushRejected { reference, reason });
        }

        debug!("Pushed {} ref(s) to {}", refspecs.len(), remote);
        Ok(())
    }
}

/// Callbacks that answer a credential request exactly once per operation.
/// libgit2 re-invokes the callback after a rejection, so a second request
/// means the credential is wrong.
fn credential_callbacks(credential: &RemoteCredential) -> RemoteCallbacks<'_> {
    let mut attempted = false;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username_from_url, _allowed| {
        if attempted {
            return Err(git2::Error::from_str(CREDENTIALS_REJECTED));
        }
        attempted = true;
        Cred::userpass_plaintext(&credential.username, &credential.secret)
    });
    callbacks
}

fn is_auth_failure(error: &git2::Error) -> bool {
    error.code() == ErrorCode::Auth || error.message().contains(CREDENTIALS_REJECTED)
}

/// Expands a refspec against the given local refs. A pattern such as
/// `refs/heads/*:refs/heads/*` becomes one concrete refspec per matching ref;
/// a refspec without a wildcard is returned as is.
pub fn expand_refspec(refspec: &str, local_refs: &[String]) -> Result<Vec<String>> {
    let (force, spec) = match refspec.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", refspec),
    };

    let (src, dst) = spec
        .split_once(':')
        .ok_or_else(|| Error::InvalidRefspec(refspec.to_string()))?;

    let src_wildcards = src.matches('*').count();
    let dst_wildcards = dst.matches('*').count();
    if src_wildcards > 1 || src_wildcards != dst_wildcards || src.is_empty() || dst.is_empty() {
        return Err(Error::InvalidRefspec(refspec.to_string()));
    }

    if src_wildcards == 0 {
        return Ok(vec![refspec.to_string()]);
    }

    let (prefix, suffix) = src
        .split_once('*')
        .ok_or_else(|| Error::InvalidRefspec(refspec.to_string()))?;

    let expanded = local_refs
        .iter()
        .filter_map(|local| {
            let middle = local.strip_prefix(prefix)?.strip_suffix(suffix)?;
            (!middle.is_empty()).then(|| format!("{}{}:{}", force, local, dst.replacen('*', middle, 1)))
        })
        .collect();

    Ok(expanded)
}
