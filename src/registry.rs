//! Process-local bookkeeping of opened headsets.
//!
//! Every logical device opened on the same HID path shares one [`Session`].
//! The registry counts those users and tears the hardware down when the last
//! one leaves. All mutations go through one mutex, so acquire/release from
//! several threads see a single session per path.

use crate::calibration::CalibrationParser;
use crate::config::SessionConfig;
use crate::device::LogicalDevice;
use crate::fusion::FusionFactory;
use crate::hid::{HidApiTransport, Transport};
use crate::session::Session;
use crate::{Result, RiftSError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Entry {
    session: Arc<Mutex<Session>>,
    /// Tokens of acquires not yet released.
    users: HashSet<u64>,
}

/// A counted reference to a registered session.
///
/// Each successful [`SessionRegistry::acquire`] must be paired with exactly
/// one [`SessionRegistry::release`]. Clones carry the same token, so
/// releasing a clone gives back the original acquire, and a second release
/// of that token is refused.
#[derive(Clone)]
pub struct SessionHandle {
    path: String,
    token: u64,
    session: Arc<Mutex<Session>>,
}

impl SessionHandle {
    /// HID path of the headset.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Lock the session for polling or inspection.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when both handles refer to the same session instance.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("path", &self.path)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`SessionRegistry::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other users remain; the hardware stays open.
    Retained { remaining: usize },
    /// That was the last user; the headset was disabled and closed.
    Closed,
}

/// Maps HID paths to their shared, use-counted [`Session`].
pub struct SessionRegistry {
    transport: Arc<dyn Transport>,
    parser: Arc<dyn CalibrationParser>,
    fusion: FusionFactory,
    config: SessionConfig,
    sessions: Mutex<HashMap<String, Entry>>,
    next_token: AtomicU64,
}

impl SessionRegistry {
    pub fn new(
        transport: Arc<dyn Transport>,
        parser: Arc<dyn CalibrationParser>,
        fusion: FusionFactory,
        config: SessionConfig,
    ) -> Self {
        SessionRegistry {
            transport,
            parser,
            fusion,
            config,
            sessions: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Registry backed by hidapi.
    pub fn with_hidapi(
        parser: Arc<dyn CalibrationParser>,
        fusion: FusionFactory,
        config: SessionConfig,
    ) -> Result<Self> {
        let transport = Arc::new(HidApiTransport::new(&config)?);
        Ok(Self::new(transport, parser, fusion, config))
    }

    /// Configuration every session is opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Paths of every attached headset.
    pub fn enumerate(&self) -> Result<Vec<String>> {
        self.transport.enumerate()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the session for `path`, opening the hardware if nobody has yet.
    pub fn acquire(&self, path: &str) -> Result<SessionHandle> {
        let mut sessions = self.sessions();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = sessions.get_mut(path) {
            entry.users.insert(token);
            log::debug!("Reusing Rift S session {} (users: {})", path, entry.users.len());
            return Ok(SessionHandle {
                path: path.to_string(),
                token,
                session: entry.session.clone(),
            });
        }

        let session = Session::open(
            path,
            self.transport.as_ref(),
            self.parser.as_ref(),
            (self.fusion)(),
            &self.config,
        )?;
        let session = Arc::new(Mutex::new(session));
        sessions.insert(
            path.to_string(),
            Entry {
                session: session.clone(),
                users: HashSet::from([token]),
            },
        );

        Ok(SessionHandle {
            path: path.to_string(),
            token,
            session,
        })
    }

    /// Open logical device `index` of the headset at `path`.
    pub fn open_device(self: &Arc<Self>, path: &str, index: u32) -> Result<LogicalDevice> {
        LogicalDevice::open(self, path, index)
    }

    /// Give back one use of `handle`'s session.
    ///
    /// Releasing a handle (or any clone of it) more than once is a contract
    /// violation, reported as [`RiftSError::SessionNotOpen`] without touching
    /// the other users.
    pub fn release(&self, handle: &SessionHandle) -> Result<Release> {
        let mut sessions = self.sessions();

        let entry = match sessions.get_mut(&handle.path) {
            Some(entry)
                if Arc::ptr_eq(&entry.session, &handle.session)
                    && entry.users.contains(&handle.token) =>
            {
                entry.users.remove(&handle.token);
                entry
            }
            _ => {
                log::error!(
                    "Rift S {} released without a matching acquire (token {})",
                    handle.path,
                    handle.token
                );
                return Err(RiftSError::SessionNotOpen(handle.path.clone()));
            }
        };

        if !entry.users.is_empty() {
            return Ok(Release::Retained {
                remaining: entry.users.len(),
            });
        }

        if let Some(entry) = sessions.remove(&handle.path) {
            entry
                .session
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .shutdown();
        }
        Ok(Release::Closed)
    }

    /// Number of users of `path`, 0 when it is not open.
    pub fn use_count(&self, path: &str) -> usize {
        self.sessions().get(path).map_or(0, |e| e.users.len())
    }

    /// True while `path` has a registered session.
    pub fn is_open(&self, path: &str) -> bool {
        self.sessions().contains_key(path)
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    /// True when no session is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
