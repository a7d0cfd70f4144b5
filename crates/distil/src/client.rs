//! Wiring between the facade's per-call [`IndexClient`] needs and the
//! [`ClientRegistry`] a long-lived [`crate::Installer`] owns.
//!
//! A client keyed only by `(interpreter, index, find-links)` can be shared across
//! calls to skip re-scanning an unchanged find-links directory. But a shared client is
//! behind an `Arc`, and `IndexClient::add_find_links` takes `&mut self` — the
//! `use_dependency_links` knob (spec §4.4) needs to grow the client's search set
//! mid-resolve, which an `Arc` cannot do in place. [`ClientHandle`] resolves this by
//! only ever sharing a cached client when dependency links are disabled for the call;
//! whenever they're enabled, the facade builds a private, owned client instead so
//! mutation works as the resolver expects.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use distil_client::{ClientError, FileIndexClient, IndexClient};
use distil_distribution::{Distribution, Location};
use distil_normalize::ProjectKey;
use distil_requirement::Requirement;

pub(crate) enum ClientHandle {
    Shared(Arc<FileIndexClient>),
    Owned(FileIndexClient),
}

impl IndexClient for ClientHandle {
    fn lookup(&self, project: &ProjectKey) -> Vec<Distribution> {
        match self {
            Self::Shared(client) => client.lookup(project),
            Self::Owned(client) => client.lookup(project),
        }
    }

    fn obtain(&self, requirement: &Requirement) -> Option<Distribution> {
        match self {
            Self::Shared(client) => client.obtain(requirement),
            Self::Owned(client) => client.obtain(requirement),
        }
    }

    fn download(&self, location: &Location, scratch_dir: &Path) -> Result<PathBuf, ClientError> {
        match self {
            Self::Shared(client) => client.download(location, scratch_dir),
            Self::Owned(client) => client.download(location, scratch_dir),
        }
    }

    fn add_find_links(&mut self, urls: Vec<String>) {
        match self {
            Self::Shared(_) => {
                debug!(
                    ?urls,
                    "dependency links discovered against a registry-shared client; \
                     use_dependency_links should have forced an owned client"
                );
            }
            Self::Owned(client) => client.add_find_links(urls),
        }
    }
}
